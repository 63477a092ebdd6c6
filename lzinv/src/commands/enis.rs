use std::{net::IpAddr, time::Instant};

use anyhow::Result;
use aws_sdk_ec2::types::NetworkInterface;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::{
  commands::{self, ScopeArgs},
  credentials::AccountCredentials,
  ec2, output, utils, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct Enis {
  /// Only report network interfaces holding one of these (private or public) addresses
  #[arg(long = "ip", value_delimiter = ',')]
  pub addresses: Vec<IpAddr>,

  #[clap(flatten)]
  pub scope: ScopeArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct Eni {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "ENI")]
  pub eni_id: String,
  #[tabled(rename = "Name")]
  pub name: String,
  #[tabled(rename = "Type")]
  pub eni_type: String,
  #[tabled(rename = "Status")]
  pub status: String,
  #[tabled(rename = "VPC")]
  pub vpc_id: String,
  #[tabled(rename = "Private IP")]
  pub private_ip: String,
  #[tabled(rename = "Public IP")]
  pub public_ip: String,
}

impl Eni {
  fn new(creds: &AccountCredentials, region: &str, eni: &NetworkInterface) -> Self {
    // Unnamed interfaces fall back on their description, which usually names the owning service
    let name = ec2::name_tag(eni.tag_set()).unwrap_or_else(|| utils::owned_str(eni.description()));

    Self {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: region.to_owned(),
      eni_id: utils::owned_str(eni.network_interface_id()),
      name,
      eni_type: eni.interface_type().map(|t| t.as_str().to_owned()).unwrap_or_default(),
      status: eni.status().map(|s| s.as_str().to_owned()).unwrap_or_default(),
      vpc_id: utils::owned_str(eni.vpc_id()),
      private_ip: utils::owned_str(eni.private_ip_address()),
      public_ip: utils::owned_str(eni.association().and_then(|a| a.public_ip())),
    }
  }
}

impl Enis {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;
    let place_count = places.len();

    let addresses = self.addresses.to_owned();
    let mut enis = commands::visit(places, self.scope.workers, move |place| {
      let addresses = addresses.to_owned();
      async move {
        let client = ec2::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
        let enis = ec2::describe_network_interfaces(&client).await?;

        Ok(
          enis
            .iter()
            .filter(|eni| ec2::eni_matches_any(eni, &addresses))
            .map(|eni| Eni::new(&place.credentials, &place.region, eni))
            .collect(),
        )
      }
    })
    .await;
    enis.sort_by(|a, b| (&a.account_id, &a.region, &a.eni_id).cmp(&(&b.account_id, &b.region, &b.eni_id)));

    output::print("Network interfaces", &enis, self.scope.output)?;
    output::summary(
      true,
      &format!(
        "Found {} ENIs across {} accounts ({place_count} account/region pairs)",
        enis.len(),
        creds.len()
      ),
      self.scope.output,
      color,
    );

    self.scope.report_timing(started);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use aws_sdk_ec2::types::{NetworkInterfaceAssociation, NetworkInterfaceType, Tag};

  use super::*;
  use crate::credentials::tests::fake_credentials;

  fn eni(name: Option<&str>) -> NetworkInterface {
    let mut builder = NetworkInterface::builder()
      .network_interface_id("eni-0abc")
      .description("ELB app/web/123")
      .interface_type(NetworkInterfaceType::Interface)
      .private_ip_address("10.0.0.5")
      .association(NetworkInterfaceAssociation::builder().public_ip("3.3.3.3").build());
    if let Some(name) = name {
      builder = builder.tag_set(Tag::builder().key("Name").value(name).build());
    }
    builder.build()
  }

  #[test]
  fn it_builds_record_from_eni() {
    let record = Eni::new(&fake_credentials("111111111111", "222222222222"), "us-west-2", &eni(None));

    assert_eq!(record.name, "ELB app/web/123");
    assert_eq!(record.eni_type, "interface");
    assert_eq!(record.private_ip, "10.0.0.5");
    assert_eq!(record.public_ip, "3.3.3.3");
  }

  #[test]
  fn name_tag_wins_over_description() {
    let record = Eni::new(&fake_credentials("111111111111", "222222222222"), "us-west-2", &eni(Some("bastion")));
    assert_eq!(record.name, "bastion");
  }
}
