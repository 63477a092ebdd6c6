use std::time::Instant;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info};

use crate::{
  commands::{self, DeleteArgs, ScopeArgs},
  configservice,
  credentials::AccountCredentials,
  output, utils, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct ConfigRecorders {
  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct ConfigRecorder {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "Recorder")]
  pub name: String,
  #[tabled(rename = "Role")]
  pub role_arn: String,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct DeliveryChannel {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "Channel")]
  pub name: String,
  #[tabled(rename = "Bucket")]
  pub bucket: String,
}

/// What Config has set up in one place
#[derive(Clone, Debug, Default)]
pub struct ConfigSetup {
  pub recorders: Vec<ConfigRecorder>,
  pub channels: Vec<DeliveryChannel>,
}

impl ConfigSetup {
  pub fn is_empty(&self) -> bool {
    self.recorders.is_empty() && self.channels.is_empty()
  }
}

/// Recorders and delivery channels of the account in the region
pub async fn describe(creds: &AccountCredentials, region: &str) -> Result<ConfigSetup> {
  let client = configservice::get_client(&creds.config_for(region), CLIENT_RETRIES);

  let recorders = configservice::describe_configuration_recorders(&client)
    .await?
    .iter()
    .map(|recorder| ConfigRecorder {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: region.to_owned(),
      name: utils::owned_str(recorder.name()),
      role_arn: utils::owned_str(recorder.role_arn()),
    })
    .collect();

  let channels = configservice::describe_delivery_channels(&client)
    .await?
    .iter()
    .map(|channel| DeliveryChannel {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: region.to_owned(),
      name: utils::owned_str(channel.name()),
      bucket: utils::owned_str(channel.s3_bucket_name()),
    })
    .collect();

  Ok(ConfigSetup { recorders, channels })
}

/// Remove Config from the account in the region
///
/// Recorders are stopped first, then delivery channels are deleted, then the recorders.
/// Returns how many recorders and channels were deleted, along with the failure that
/// stopped the removal part way, if any
pub async fn remove(creds: &AccountCredentials, region: &str, setup: &ConfigSetup) -> (usize, Result<()>) {
  let client = configservice::get_client(&creds.config_for(region), CLIENT_RETRIES);
  let mut removed = 0;

  let result = async {
    for recorder in &setup.recorders {
      configservice::stop_configuration_recorder(&client, &recorder.name).await?;
    }
    for channel in &setup.channels {
      configservice::delete_delivery_channel(&client, &channel.name).await?;
      info!("Deleted delivery channel {} in {} {region}", channel.name, creds.account_id);
      removed += 1;
    }
    for recorder in &setup.recorders {
      configservice::delete_configuration_recorder(&client, &recorder.name).await?;
      info!("Deleted configuration recorder {} in {} {region}", recorder.name, creds.account_id);
      removed += 1;
    }
    Ok::<(), anyhow::Error>(())
  }
  .await;

  (removed, result)
}

impl ConfigRecorders {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;

    let setups = commands::visit(places, self.scope.workers, |place| async move {
      let setup = describe(&place.credentials, &place.region).await?;
      Ok(vec![setup])
    })
    .await;

    let mut recorders: Vec<ConfigRecorder> = setups.iter().flat_map(|s| s.recorders.clone()).collect();
    let mut channels: Vec<DeliveryChannel> = setups.iter().flat_map(|s| s.channels.clone()).collect();
    recorders.sort_by(|a, b| (&a.account_id, &a.region).cmp(&(&b.account_id, &b.region)));
    channels.sort_by(|a, b| (&a.account_id, &a.region).cmp(&(&b.account_id, &b.region)));

    let mut report = output::Report::new(self.scope.output);
    report.add("recorders", "Configuration recorders", &recorders)?;
    report.add("channels", "Delivery channels", &channels)?;
    report.finish()?;
    output::summary(
      recorders.is_empty() && channels.is_empty(),
      &format!(
        "Found {} configuration recorders and {} delivery channels",
        recorders.len(),
        channels.len()
      ),
      self.scope.output,
      color,
    );

    if self.delete.enabled() {
      for setup in setups.iter().filter(|s| !s.is_empty()) {
        let (account_id, region) = match (setup.recorders.first(), setup.channels.first()) {
          (Some(r), _) => (&r.account_id, &r.region),
          (None, Some(c)) => (&c.account_id, &c.region),
          (None, None) => continue,
        };
        let question = format!("Delete the Config recorder and delivery channel in {account_id} {region}?");
        if !self.delete.confirm(&question)? {
          continue;
        }
        let Some(account) = commands::credentials_for(&creds, account_id) else {
          continue;
        };

        let (removed, result) = remove(account, region, setup).await;
        if let Err(err) = result {
          error!("Unable to remove Config from {account_id} {region} after {removed} deletions: {err:#}");
        }
      }
    }

    self.scope.report_timing(started);
    Ok(())
  }
}
