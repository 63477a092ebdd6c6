pub mod check_account;
pub mod config_recorders;
pub mod default_vpcs;
pub mod enis;
pub mod guardduty;
pub mod roles;
pub mod saml_providers;
pub mod stacks;
pub mod subnets;
pub mod trails;

use std::{future::Future, sync::Arc, time::Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{debug, error, info, warn};

use crate::{
  account::{self, AccountFilter},
  credentials::{self, AccountCredentials},
  ec2,
  errors::{self, ErrorKind},
  fanout::{self, Place},
  output::OutputFormat,
  prompt, regions, utils, CLIENT_RETRIES,
};

/// Which accounts and regions a command covers, and how it reports
#[derive(Args, Clone, Debug, Default)]
pub struct ScopeArgs {
  /// Profile(s) of the management accounts to start from; the default credential chain is used when omitted
  #[arg(short, long = "profile", env = "AWS_PROFILE", value_delimiter = ',')]
  pub profiles: Vec<String>,

  /// Region(s) to check; fragments are matched (`us-` for every US region), `all` for every region
  #[arg(short, long = "region", value_delimiter = ',')]
  pub regions: Vec<String>,

  /// Account(s) to leave alone
  #[arg(short = 'k', long, value_delimiter = ',', value_parser = utils::parse_account_id)]
  pub skip_accounts: Vec<String>,

  /// Profile(s) to leave out
  #[arg(long, value_delimiter = ',')]
  pub skip_profiles: Vec<String>,

  /// Only check these account(s)
  #[arg(short, long, value_delimiter = ',', value_parser = utils::parse_account_id)]
  pub accounts: Vec<String>,

  /// Only check the management account(s)
  #[arg(long)]
  pub root_only: bool,

  /// Role(s) tried, in order, to get into each child account
  #[arg(long = "access-role")]
  pub access_roles: Vec<String>,

  /// Number of accounts and regions checked concurrently
  #[arg(long, env = "LZINV_WORKERS", default_value_t = fanout::DEFAULT_WORKERS)]
  pub workers: usize,

  /// Report how long the command took
  #[arg(long)]
  pub timing: bool,

  /// Output format of the records found
  #[arg(short, long, value_enum, default_value_t)]
  pub output: OutputFormat,
}

impl ScopeArgs {
  pub fn filter(&self) -> AccountFilter {
    AccountFilter {
      skip: self.skip_accounts.to_owned(),
      only: self.accounts.to_owned(),
      root_only: self.root_only,
    }
  }

  /// Credentials for every account in scope
  pub async fn credentials(&self) -> Result<Vec<AccountCredentials>> {
    let accesses = account::resolve_profiles(&self.profiles, &self.skip_profiles).await;
    if accesses.is_empty() {
      bail!("None of the profiles provided could be used to access AWS");
    }

    let accounts = account::child_accounts(&accesses, &self.filter()).await;
    info!("Found {} accounts to check", accounts.len());

    let roles = credentials::access_roles(&self.access_roles);
    let creds = credentials::gather(&accesses, accounts, &roles, self.workers).await;
    if creds.is_empty() {
      bail!("Unable to access any of the accounts in scope");
    }

    Ok(creds)
  }

  /// Regions in scope, resolved against those enabled for the first account
  pub async fn regions(&self, credentials: &[AccountCredentials]) -> Result<Vec<String>> {
    if self.regions.is_empty() {
      return Ok(regions::select_regions::<&str>(&[], &[]));
    }

    let first = credentials.first().context("No accounts to look up regions with")?;
    let client = ec2::get_client(&first.config_for(regions::DEFAULT_REGION), CLIENT_RETRIES);
    let available = ec2::describe_regions(&client)
      .await
      .context("Unable to list the regions enabled for the account")?;

    let selected = regions::select_regions(&available, &self.regions);
    if selected.is_empty() {
      bail!("None of the regions requested ({}) are enabled", self.regions.join(", "));
    }
    debug!("Regions in scope: {}", selected.join(", "));

    Ok(selected)
  }

  /// Every (account, region) combination in scope, along with the credentials they were built from
  pub async fn places(&self) -> Result<(Vec<AccountCredentials>, Vec<Place>)> {
    let creds = self.credentials().await?;
    let regions = self.regions(&creds).await?;
    let places = fanout::places(&creds, &regions);

    Ok((creds, places))
  }

  /// Print the elapsed time when `--timing` was requested
  pub fn report_timing(&self, started: Instant) {
    if self.timing {
      eprintln!("This command took {:.3} seconds", started.elapsed().as_secs_f64());
    }
  }
}

/// Flags controlling deletion of the resources found
#[derive(Args, Clone, Debug, Default)]
pub struct DeleteArgs {
  /// Delete the resources found, asking before each one
  #[arg(long)]
  pub delete: bool,

  /// Do not ask before deleting; only used along with `--delete`
  #[arg(long)]
  pub force: bool,
}

impl DeleteArgs {
  /// Whether any deletion was requested
  pub fn enabled(&self) -> bool {
    if self.force && !self.delete {
      warn!("--force was provided without --delete; nothing will be deleted");
    }
    self.delete
  }

  pub fn confirm(&self, question: &str) -> Result<bool> {
    prompt::should_delete(self.delete, self.force, question)
  }
}

/// The credentials gathered for the account
pub fn credentials_for<'a>(creds: &'a [AccountCredentials], account_id: &str) -> Option<&'a AccountCredentials> {
  creds.iter().find(|c| c.account_id == account_id)
}

/// Run `work` in every place, keeping each place's failure alongside the results of the others
pub async fn survey<R, F, Fut>(places: Vec<Place>, workers: usize, work: F) -> Vec<Result<Vec<R>>>
where
  R: Send + 'static,
  F: Fn(Place) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
{
  let work = Arc::new(work);

  fanout::fan_out(places, workers, move |place| {
    let work = Arc::clone(&work);
    async move {
      let label = format!("{} in {}", place.credentials.account_id, place.region);
      debug!("Checking {label}");
      work(place).await.with_context(|| label)
    }
  })
  .await
}

/// Run `work` in every place, logging and skipping the places that fail
pub async fn visit<R, F, Fut>(places: Vec<Place>, workers: usize, work: F) -> Vec<R>
where
  R: Send + 'static,
  F: Fn(Place) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
{
  survey(places, workers, work)
    .await
    .into_iter()
    .filter_map(|result| match result {
      Ok(records) => Some(records),
      Err(err) => {
        report(&err);
        None
      }
    })
    .flatten()
    .collect()
}

/// Log a failure, noting what the user can do about it when the kind of failure is known
pub fn report(err: &anyhow::Error) {
  let kind = errors::kind_of(err);
  match (kind, errors::hint(kind)) {
    (ErrorKind::InvalidToken, Some(hint)) => warn!("{err:#} ({hint})"),
    (_, Some(hint)) => error!("{err:#} ({hint})"),
    _ => error!("{err:#}"),
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Debug, Parser)]
  struct Harness {
    #[clap(flatten)]
    scope: ScopeArgs,
    #[clap(flatten)]
    delete: DeleteArgs,
  }

  #[test]
  fn it_parses_scope_flags() {
    let harness = Harness::try_parse_from([
      "lzinv",
      "-p",
      "org-a,org-b",
      "-r",
      "us-",
      "-k",
      "111111111111",
      "--access-role",
      "Admin",
      "--workers",
      "4",
      "--output",
      "json",
    ])
    .unwrap();

    assert_eq!(harness.scope.profiles, vec!["org-a", "org-b"]);
    assert_eq!(harness.scope.regions, vec!["us-"]);
    assert_eq!(harness.scope.skip_accounts, vec!["111111111111"]);
    assert_eq!(harness.scope.access_roles, vec!["Admin"]);
    assert_eq!(harness.scope.workers, 4);
    assert_eq!(harness.scope.output, OutputFormat::Json);
    assert!(!harness.delete.delete);
  }

  #[test]
  fn it_rejects_malformed_account_ids() {
    assert!(Harness::try_parse_from(["lzinv", "-a", "12345"]).is_err());
    assert!(Harness::try_parse_from(["lzinv", "-k", "abcdefghijkl"]).is_err());
  }

  #[test]
  fn it_builds_account_filter() {
    let scope = ScopeArgs {
      skip_accounts: vec!["111111111111".to_string()],
      accounts: vec!["222222222222".to_string()],
      root_only: true,
      ..Default::default()
    };
    let filter = scope.filter();

    assert_eq!(filter.skip, vec!["111111111111"]);
    assert_eq!(filter.only, vec!["222222222222"]);
    assert!(filter.root_only);
  }

  #[tokio::test]
  async fn it_defaults_to_a_single_region_without_aws() {
    let regions = ScopeArgs::default().regions(&[]).await.unwrap();
    assert_eq!(regions, vec![regions::DEFAULT_REGION]);
  }

  #[test]
  fn force_alone_does_not_enable_deletion() {
    let delete = DeleteArgs {
      delete: false,
      force: true,
    };
    assert!(!delete.enabled());
  }

  #[test]
  fn it_finds_credentials_by_account() {
    let creds = vec![
      credentials::tests::fake_credentials("111111111111", "111111111111"),
      credentials::tests::fake_credentials("111111111111", "222222222222"),
    ];

    assert_eq!(
      credentials_for(&creds, "222222222222").map(|c| c.account_id.as_str()),
      Some("222222222222")
    );
    assert!(credentials_for(&creds, "333333333333").is_none());
  }

  #[tokio::test]
  async fn visit_skips_failing_places() {
    let places = fanout::places(
      &[
        credentials::tests::fake_credentials("111111111111", "111111111111"),
        credentials::tests::fake_credentials("111111111111", "222222222222"),
      ],
      &["us-east-1".to_string(), "eu-west-1".to_string()],
    );

    let mut records = visit(places, 2, |place| async move {
      match place.region.as_str() {
        "eu-west-1" => bail!("region not enabled"),
        _ => Ok(vec![place.credentials.account_id]),
      }
    })
    .await;
    records.sort();

    assert_eq!(records, vec!["111111111111", "222222222222"]);
  }

  #[tokio::test]
  async fn survey_labels_failures_with_place() {
    let places = fanout::places(
      &[credentials::tests::fake_credentials("111111111111", "222222222222")],
      &["eu-west-1".to_string()],
    );

    let results = survey(places, 1, |_| async move { Err::<Vec<()>, _>(anyhow::anyhow!("boom")) }).await;
    let err = results.into_iter().next().unwrap().unwrap_err();

    assert_eq!(err.to_string(), "222222222222 in eu-west-1");
    assert_eq!(format!("{err:#}"), "222222222222 in eu-west-1: boom");
  }
}
