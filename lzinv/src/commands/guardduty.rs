use std::{collections::BTreeMap, time::Instant};

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info};

use crate::{
  commands::{self, DeleteArgs, ScopeArgs},
  credentials::AccountCredentials,
  guardduty, output, utils, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct GuardDuty {
  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct Detector {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "Detector")]
  pub detector_id: String,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct Invitation {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "From")]
  pub from_account_id: String,
  #[tabled(rename = "Invitation")]
  pub invitation_id: String,
  #[tabled(rename = "Status")]
  pub status: String,
}

/// GuardDuty resources found in one place
#[derive(Clone, Debug, Default)]
pub struct Findings {
  pub detectors: Vec<Detector>,
  pub invitations: Vec<Invitation>,
}

pub async fn list_invitations(creds: &AccountCredentials, region: &str) -> Result<Vec<Invitation>> {
  let client = guardduty::get_client(&creds.config_for(region), CLIENT_RETRIES);

  Ok(
    guardduty::list_invitations(&client)
      .await?
      .iter()
      .map(|invite| Invitation {
        management_account_id: creds.management_account_id.to_owned(),
        account_id: creds.account_id.to_owned(),
        region: region.to_owned(),
        from_account_id: utils::owned_str(invite.account_id()),
        invitation_id: utils::owned_str(invite.invitation_id()),
        status: utils::owned_str(invite.relationship_status()),
      })
      .collect(),
  )
}

/// Delete the invitations, returning how many were deleted
pub async fn delete_invitations(creds: &AccountCredentials, region: &str, invitations: &[Invitation]) -> Result<usize> {
  let client = guardduty::get_client(&creds.config_for(region), CLIENT_RETRIES);

  let mut deleted = 0;
  for invite in invitations {
    guardduty::delete_invitations(&client, &invite.from_account_id).await?;
    info!(
      "Deleted GuardDuty invitation from {} in {} {region}",
      invite.from_account_id, creds.account_id
    );
    deleted += 1;
  }

  Ok(deleted)
}

async fn describe(creds: &AccountCredentials, region: &str) -> Result<Findings> {
  let client = guardduty::get_client(&creds.config_for(region), CLIENT_RETRIES);

  let detectors = guardduty::list_detectors(&client)
    .await?
    .into_iter()
    .map(|detector_id| Detector {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: region.to_owned(),
      detector_id,
    })
    .collect();
  let invitations = list_invitations(creds, region).await?;

  Ok(Findings { detectors, invitations })
}

impl GuardDuty {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;

    let findings = commands::visit(places, self.scope.workers, |place| async move {
      Ok(vec![describe(&place.credentials, &place.region).await?])
    })
    .await;

    let mut detectors: Vec<Detector> = findings.iter().flat_map(|f| f.detectors.clone()).collect();
    let mut invitations: Vec<Invitation> = findings.iter().flat_map(|f| f.invitations.clone()).collect();
    detectors.sort_by(|a, b| (&a.account_id, &a.region).cmp(&(&b.account_id, &b.region)));
    invitations.sort_by(|a, b| (&a.account_id, &a.region).cmp(&(&b.account_id, &b.region)));

    let mut report = output::Report::new(self.scope.output);
    report.add("detectors", "GuardDuty detectors", &detectors)?;
    report.add("invitations", "GuardDuty invitations", &invitations)?;
    report.finish()?;
    output::summary(
      detectors.is_empty() && invitations.is_empty(),
      &format!("Found {} detectors and {} invitations", detectors.len(), invitations.len()),
      self.scope.output,
      color,
    );

    if !self.delete.enabled() {
      self.scope.report_timing(started);
      return Ok(());
    }

    // Grouped by place so each account/region is torn down in one go
    let mut grouped: BTreeMap<(String, String), Findings> = BTreeMap::new();
    for detector in detectors {
      let key = (detector.account_id.to_owned(), detector.region.to_owned());
      grouped.entry(key).or_default().detectors.push(detector);
    }
    for invite in invitations {
      let key = (invite.account_id.to_owned(), invite.region.to_owned());
      grouped.entry(key).or_default().invitations.push(invite);
    }

    for ((account_id, region), found) in &grouped {
      let question = format!(
        "Delete {} detectors and {} invitations in {account_id} {region}?",
        found.detectors.len(),
        found.invitations.len()
      );
      if !self.delete.confirm(&question)? {
        continue;
      }
      let Some(account) = commands::credentials_for(&creds, account_id) else {
        continue;
      };

      if let Err(err) = delete_invitations(account, region, &found.invitations).await {
        error!("Unable to delete GuardDuty invitations in {account_id} {region}: {err:#}");
      }

      let client = guardduty::get_client(&account.config_for(region), CLIENT_RETRIES);
      for detector in &found.detectors {
        match guardduty::delete_detector(&client, &detector.detector_id).await {
          Ok(_) => info!("Deleted detector {} in {account_id} {region}", detector.detector_id),
          Err(err) => error!("Unable to delete detector {}: {err:#}", detector.detector_id),
        }
      }
    }

    self.scope.report_timing(started);
    Ok(())
  }
}
