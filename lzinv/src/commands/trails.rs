use std::{collections::BTreeSet, time::Instant};

use anyhow::Result;
use aws_sdk_cloudtrail::types::Trail;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info};

use crate::{
  cloudtrail,
  commands::{self, DeleteArgs, ScopeArgs},
  credentials::AccountCredentials,
  output, utils, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct Trails {
  /// Only report trails with these name(s)
  #[arg(long = "trail-name", value_delimiter = ',')]
  pub trail_names: Vec<String>,

  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct TrailRecord {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "Trail Name")]
  pub name: String,
  #[tabled(rename = "Multi Region")]
  pub multi_region: bool,
  #[tabled(rename = "Org Trail")]
  pub org_trail: bool,
  /// Account the trail belongs to; differs from `account_id` for organization trails
  #[tabled(rename = "Owner")]
  pub owner_account_id: String,
  #[tabled(rename = "Bucket")]
  pub bucket: String,
  #[tabled(rename = "KMS Key")]
  pub kms_key_id: String,
  #[tabled(rename = "Log Group")]
  pub log_group: String,
  #[tabled(rename = "SNS Topic")]
  pub sns_topic: String,
  #[tabled(skip)]
  pub arn: String,
}

impl TrailRecord {
  fn new(creds: &AccountCredentials, region: &str, trail: &Trail) -> Self {
    Self {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: cloudtrail::home_region(trail, region).to_owned(),
      name: utils::owned_str(trail.name()),
      multi_region: trail.is_multi_region_trail().unwrap_or_default(),
      org_trail: trail.is_organization_trail().unwrap_or_default(),
      owner_account_id: cloudtrail::owner_account_id(trail).to_owned(),
      bucket: utils::owned_str(trail.s3_bucket_name()),
      kms_key_id: utils::owned_str(trail.kms_key_id()),
      log_group: utils::owned_str(trail.cloud_watch_logs_log_group_arn()),
      sns_topic: utils::owned_str(trail.sns_topic_arn()),
      arn: utils::owned_str(trail.trail_arn()),
    }
  }
}

impl TrailRecord {
  /// Whether the trail belongs to the account it was found in, so it can be deleted from there
  pub fn is_owned(&self) -> bool {
    self.owner_account_id == self.account_id
  }
}

/// One record per trail and account, sorted
///
/// Shadow trails make the same trail show up in every region it covers
fn distinct(mut trails: Vec<TrailRecord>) -> Vec<TrailRecord> {
  trails.sort_by(|a, b| (&a.account_id, &a.region, &a.name, &a.arn).cmp(&(&b.account_id, &b.region, &b.name, &b.arn)));
  trails.dedup_by(|a, b| a.account_id == b.account_id && a.arn == b.arn);
  trails
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct Untrailed {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
}

/// Accounts without any of the trails found
fn untrailed(creds: &[AccountCredentials], trails: &[TrailRecord]) -> Vec<Untrailed> {
  let trailed: BTreeSet<&str> = trails.iter().map(|t| t.account_id.as_str()).collect();

  creds
    .iter()
    .filter(|c| !trailed.contains(c.account_id.as_str()))
    .map(|c| Untrailed {
      management_account_id: c.management_account_id.to_owned(),
      account_id: c.account_id.to_owned(),
    })
    .collect()
}

fn name_matches(names: &[String], name: &str) -> bool {
  names.is_empty() || names.iter().any(|n| n == name)
}

impl Trails {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;

    let names = self.trail_names.to_owned();
    let trails = commands::visit(places, self.scope.workers, move |place| {
      let names = names.to_owned();
      async move {
        let client = cloudtrail::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
        let trails = cloudtrail::describe_trails(&client).await?;

        Ok(
          trails
            .iter()
            .map(|trail| TrailRecord::new(&place.credentials, &place.region, trail))
            .filter(|record| name_matches(&names, &record.name))
            .collect(),
        )
      }
    })
    .await;
    let trails = distinct(trails);

    let missing = untrailed(&creds, &trails);
    let mut report = output::Report::new(self.scope.output);
    report.add("trails", "CloudTrail trails", &trails)?;
    if self.trail_names.is_empty() {
      report.add("untrailed", "Accounts without a trail", &missing)?;
    }
    report.finish()?;
    output::summary(
      missing.is_empty(),
      &format!("Found {} trails across {} accounts", trails.len(), creds.len()),
      self.scope.output,
      color,
    );

    if self.delete.enabled() {
      for trail in &trails {
        if !trail.is_owned() {
          info!(
            "Trail {} in {} belongs to {}; it can only be deleted from there",
            trail.name, trail.account_id, trail.owner_account_id
          );
          continue;
        }
        let question = format!("Delete trail {} in {} {}?", trail.name, trail.account_id, trail.region);
        if !self.delete.confirm(&question)? {
          continue;
        }
        let Some(account) = commands::credentials_for(&creds, &trail.account_id) else {
          continue;
        };

        let client = cloudtrail::get_client(&account.config_for(&trail.region), CLIENT_RETRIES);
        match cloudtrail::delete_trail(&client, &trail.arn).await {
          Ok(_) => info!("Deleted trail {} in {}", trail.name, trail.account_id),
          Err(err) => error!("Unable to delete trail {}: {err:#}", trail.arn),
        }
      }
    }

    self.scope.report_timing(started);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;
  use crate::credentials::tests::fake_credentials;

  fn trail(owner: &str, home_region: &str, name: &str) -> Trail {
    Trail::builder()
      .name(name)
      .home_region(home_region)
      .is_multi_region_trail(true)
      .s3_bucket_name("audit-logs")
      .trail_arn(format!("arn:aws:cloudtrail:{home_region}:{owner}:trail/{name}"))
      .build()
  }

  fn record(account_id: &str, name: &str) -> TrailRecord {
    TrailRecord::new(
      &fake_credentials("111111111111", account_id),
      "us-east-1",
      &trail(account_id, "us-east-1", name),
    )
  }

  #[test]
  fn it_builds_record_from_trail() {
    let record = record("222222222222", cloudtrail::LZ_TRAIL_NAME);

    assert_eq!(record.name, cloudtrail::LZ_TRAIL_NAME);
    assert!(record.multi_region);
    assert!(!record.org_trail);
    assert_eq!(record.bucket, "audit-logs");
    assert_eq!(record.kms_key_id, "");
    assert!(record.is_owned());
  }

  #[test]
  fn member_account_is_covered_by_organization_trail() {
    let member = fake_credentials("111111111111", "222222222222");
    let org_trail = Trail::builder()
      .name("org-trail")
      .home_region("us-east-1")
      .is_multi_region_trail(true)
      .is_organization_trail(true)
      .trail_arn("arn:aws:cloudtrail:us-east-1:111111111111:trail/org-trail")
      .build();

    let record = TrailRecord::new(&member, "eu-west-1", &org_trail);
    assert!(record.org_trail);
    assert!(!record.is_owned());
    assert_eq!(record.owner_account_id, "111111111111");
    assert_eq!(record.region, "us-east-1");

    assert!(untrailed(&[member], &[record]).is_empty());
  }

  #[test]
  fn multi_region_trail_is_reported_once_in_its_home_region() {
    let creds = fake_credentials("111111111111", "222222222222");
    let home = trail("222222222222", "eu-west-1", "audit");

    let seen: Vec<TrailRecord> = ["us-east-1", "eu-west-1", "ap-southeast-2"]
      .iter()
      .map(|region| TrailRecord::new(&creds, region, &home))
      .chain(std::iter::once(record("222222222222", "other")))
      .collect();

    let trails = distinct(seen);
    let found: Vec<(&str, &str)> = trails.iter().map(|t| (t.name.as_str(), t.region.as_str())).collect();
    assert_eq!(found, vec![("audit", "eu-west-1"), ("other", "us-east-1")]);
  }

  #[test]
  fn it_reports_accounts_without_trails() {
    let creds = vec![
      fake_credentials("111111111111", "111111111111"),
      fake_credentials("111111111111", "222222222222"),
      fake_credentials("111111111111", "333333333333"),
    ];
    let trails = vec![record("222222222222", "org-trail")];

    let missing: Vec<String> = untrailed(&creds, &trails).into_iter().map(|u| u.account_id).collect();
    assert_eq!(missing, vec!["111111111111", "333333333333"]);
  }

  #[rstest]
  #[case(vec![], "anything", true)]
  #[case(vec!["org-trail"], "org-trail", true)]
  #[case(vec!["org-trail"], "org-trail-2", false)]
  fn name_matches_test(#[case] names: Vec<&str>, #[case] name: &str, #[case] expected: bool) {
    let names: Vec<String> = names.into_iter().map(String::from).collect();
    assert_eq!(name_matches(&names, name), expected);
  }
}
