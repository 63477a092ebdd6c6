use std::time::Instant;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::error;

use crate::{
  commands::{self, DeleteArgs, ScopeArgs},
  ec2, output, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct DefaultVpcs {
  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct DefaultVpc {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "VPC")]
  pub vpc_id: String,
  #[tabled(rename = "CIDR")]
  pub cidr_block: String,
  #[tabled(rename = "Name")]
  pub name: String,
}

impl DefaultVpcs {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;
    let place_count = places.len();

    let mut vpcs = commands::visit(places, self.scope.workers, |place| async move {
      let client = ec2::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
      let vpcs = ec2::describe_default_vpcs(&client).await?;

      Ok(
        vpcs
          .iter()
          .map(|vpc| DefaultVpc {
            management_account_id: place.credentials.management_account_id.to_owned(),
            account_id: place.credentials.account_id.to_owned(),
            region: place.region.to_owned(),
            vpc_id: ec2::vpc_id(vpc),
            cidr_block: vpc.cidr_block().unwrap_or_default().to_owned(),
            name: ec2::name_tag(vpc.tags()).unwrap_or_default(),
          })
          .collect(),
      )
    })
    .await;
    vpcs.sort_by(|a, b| (&a.account_id, &a.region, &a.vpc_id).cmp(&(&b.account_id, &b.region, &b.vpc_id)));

    output::print("Default VPCs", &vpcs, self.scope.output)?;
    output::summary(
      vpcs.is_empty(),
      &format!("Found {} default VPCs across {place_count} account/region pairs", vpcs.len()),
      self.scope.output,
      color,
    );

    if self.delete.enabled() {
      for vpc in &vpcs {
        let question = format!("Delete default VPC {} in {} {}?", vpc.vpc_id, vpc.account_id, vpc.region);
        if !self.delete.confirm(&question)? {
          continue;
        }
        let Some(account) = commands::credentials_for(&creds, &vpc.account_id) else {
          continue;
        };

        let client = ec2::get_client(&account.config_for(&vpc.region), CLIENT_RETRIES);
        if let Err(err) = ec2::delete_vpc(&client, &vpc.vpc_id).await {
          error!("Unable to delete {} in {} {}: {err:#}", vpc.vpc_id, vpc.account_id, vpc.region);
        }
      }
    }

    self.scope.report_timing(started);
    Ok(())
  }
}
