use std::{net::IpAddr, time::Instant};

use anyhow::Result;
use aws_sdk_ec2::types::Subnet;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::{
  commands::{self, ScopeArgs},
  credentials::AccountCredentials,
  ec2, output, utils, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct Subnets {
  /// Only report subnets whose CIDR contains one of these addresses
  #[arg(long = "ip", value_delimiter = ',')]
  pub addresses: Vec<IpAddr>,

  #[clap(flatten)]
  pub scope: ScopeArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct SubnetRecord {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "Subnet")]
  pub subnet_id: String,
  #[tabled(rename = "Name")]
  pub name: String,
  #[tabled(rename = "VPC")]
  pub vpc_id: String,
  #[tabled(rename = "CIDR")]
  pub cidr_block: String,
  #[tabled(rename = "Available IPs")]
  pub available_ips: i32,
}

impl SubnetRecord {
  fn new(creds: &AccountCredentials, region: &str, subnet: &Subnet) -> Self {
    Self {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: region.to_owned(),
      subnet_id: utils::owned_str(subnet.subnet_id()),
      name: ec2::name_tag(subnet.tags()).unwrap_or_default(),
      vpc_id: utils::owned_str(subnet.vpc_id()),
      cidr_block: utils::owned_str(subnet.cidr_block()),
      available_ips: subnet.available_ip_address_count().unwrap_or_default(),
    }
  }
}

impl Subnets {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;
    let place_count = places.len();

    let addresses = self.addresses.to_owned();
    let mut subnets = commands::visit(places, self.scope.workers, move |place| {
      let addresses = addresses.to_owned();
      async move {
        let client = ec2::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
        let subnets = ec2::describe_subnets(&client, None).await?;

        Ok(
          subnets
            .iter()
            .filter(|subnet| ec2::subnet_contains_any(subnet, &addresses))
            .map(|subnet| SubnetRecord::new(&place.credentials, &place.region, subnet))
            .collect(),
        )
      }
    })
    .await;
    subnets.sort_by(|a, b| (&a.account_id, &a.region, &a.cidr_block).cmp(&(&b.account_id, &b.region, &b.cidr_block)));

    output::print("Subnets", &subnets, self.scope.output)?;
    output::summary(
      true,
      &format!(
        "Found {} subnets across {} accounts ({place_count} account/region pairs)",
        subnets.len(),
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
  use aws_sdk_ec2::types::Tag;

  use super::*;
  use crate::credentials::tests::fake_credentials;

  #[test]
  fn it_builds_record_from_subnet() {
    let subnet = Subnet::builder()
      .subnet_id("subnet-0abc")
      .vpc_id("vpc-0abc")
      .cidr_block("10.1.0.0/20")
      .available_ip_address_count(4091)
      .tags(Tag::builder().key("Name").value("private-b").build())
      .build();

    let record = SubnetRecord::new(&fake_credentials("111111111111", "222222222222"), "eu-west-1", &subnet);
    assert_eq!(record.name, "private-b");
    assert_eq!(record.cidr_block, "10.1.0.0/20");
    assert_eq!(record.available_ips, 4091);
    assert_eq!(record.region, "eu-west-1");
  }
}
