use std::{fmt, time::Instant};

use anyhow::{Context, Result};
use aws_sdk_cloudtrail::types::Trail;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info, warn};

use crate::{
  account::{AccountAccess, AccountType, ChildAccount, ACTIVE},
  cloudtrail,
  commands::{self, config_recorders, guardduty},
  credentials::{self, AccountCredentials},
  ec2,
  errors::{self, ErrorKind},
  fanout::{self, Place},
  organizations,
  output::{self, OutputFormat},
  prompt, regions, utils, CLIENT_RETRIES,
};

const EXPLANATION: &str = r#"
An existing account can be adopted into a Landing Zone once it passes the following checks:

0. The management account can get into the account through one of the access roles
   (AWSCloudFormationStackSetExecutionRole by default), which must trust the management account.
   StackSets deploy stack instances through that role. STS must also be active in every region;
   getting in at all proves the former, and every later step proves the latter region by region.

1. No default VPC exists in any Landing Zone region. The Landing Zone deletes them, and any dependency
   left behind (security groups, elastic IPs, ...) fails that deletion and rolls the deployment back.

2. No Config recorder or delivery channel exists, since there can only be one of each per region.
   Turning Config off in the console is not enough; both must be deleted through the API:
     aws configservice stop-configuration-recorder --configuration-recorder-name <name>
     aws configservice delete-delivery-channel --delivery-channel-name <name>
     aws configservice delete-configuration-recorder --configuration-recorder-name <name>

3. No CloudTrail trail is named AWS-Landing-Zone-BaselineCloudTrail.

4. No GuardDuty invitation is pending.

5. The account is a member of the Organization. The email given to the Landing Zone must match the
   account's, otherwise the Landing Zone reports the email as already in use.

6. The account is not in any Organizational Unit managed by the Landing Zone (Core and Applications
   by default); it has to sit directly under the organization root.
"#;

#[derive(Args, Debug)]
pub struct CheckAccount {
  /// The account to check for Landing Zone readiness
  #[arg(short, long, value_parser = utils::parse_account_id, required_unless_present = "explain")]
  pub account: Option<String>,

  /// Profile of the Organization's management account
  #[arg(short, long, env = "AWS_PROFILE")]
  pub profile: Option<String>,

  /// Role(s) tried, in order, to get into the account
  #[arg(long = "access-role")]
  pub access_roles: Vec<String>,

  /// Only check us-east-1 instead of every Landing Zone region
  #[arg(long)]
  pub quick: bool,

  /// Fix the issues found, asking before each fix
  #[arg(long)]
  pub fix: bool,

  /// Do not ask before fixing; only used along with `--fix`
  #[arg(long)]
  pub force: bool,

  /// Describe the checks made and exit
  #[arg(long)]
  pub explain: bool,

  /// Number of regions checked concurrently
  #[arg(long, env = "LZINV_WORKERS", default_value_t = fanout::DEFAULT_WORKERS)]
  pub workers: usize,

  /// Report how long the check took
  #[arg(long)]
  pub timing: bool,
}

/// How a step of the check went
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StepStatus {
  pub success: bool,
  pub issues_found: usize,
  pub issues_fixed: usize,
  /// The step could not look everywhere it needed to
  pub blocked: bool,
}

impl Default for StepStatus {
  fn default() -> Self {
    Self {
      success: true,
      issues_found: 0,
      issues_fixed: 0,
      blocked: false,
    }
  }
}

/// The verdict of a step once it has run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
  Clean,
  /// Every issue found was fixed
  Fixed(usize),
  /// Issues left unfixed
  Unfixed(usize),
  Blocked,
}

impl StepStatus {
  pub fn issue(&mut self) {
    self.success = false;
    self.issues_found += 1;
  }

  pub fn fixed(&mut self, count: usize) {
    self.issues_fixed += count;
  }

  pub fn block(&mut self) {
    self.success = false;
    self.blocked = true;
  }

  /// Settle the step; a step whose issues were all fixed counts as a success
  pub fn finish(&mut self) -> Outcome {
    let outcome = if self.blocked {
      Outcome::Blocked
    } else if self.issues_found == 0 {
      Outcome::Clean
    } else if self.issues_fixed >= self.issues_found {
      Outcome::Fixed(self.issues_found)
    } else {
      Outcome::Unfixed(self.issues_found - self.issues_fixed)
    };

    self.success = matches!(outcome, Outcome::Clean | Outcome::Fixed(_));
    outcome
  }
}

impl fmt::Display for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Clean => write!(f, "completed with no issues"),
      Self::Fixed(count) => write!(f, "found {count} issues, but they were fixed"),
      Self::Unfixed(count) => write!(f, "completed, but {count} issues could not be fixed"),
      Self::Blocked => write!(f, "completed with blockers found"),
    }
  }
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct StepRow {
  #[tabled(rename = "Step")]
  pub step: usize,
  #[tabled(rename = "Check")]
  pub check: &'static str,
  #[tabled(rename = "Found")]
  pub issues_found: usize,
  #[tabled(rename = "Fixed")]
  pub issues_fixed: usize,
  #[tabled(rename = "Ready")]
  pub success: bool,
}

const CHECKS: [&str; 6] = [
  "Default VPCs",
  "Config recorders and delivery channels",
  "Landing Zone CloudTrail trail",
  "GuardDuty invitations",
  "Organization membership",
  "Account sits under the organization root",
];

/// Whether the account is ready given the status of steps 1 through 6
pub fn is_ready(steps: &[StepStatus]) -> bool {
  steps.len() == CHECKS.len() && steps.iter().all(|s| s.success)
}

/// Results from every place, with failures logged and marking the step as blocked
///
/// Regions that are not enabled for the account are skipped rather than blocking
fn settle<R>(status: &mut StepStatus, results: Vec<Result<Vec<R>>>) -> Vec<R> {
  let mut found = Vec::new();
  for result in results {
    match result {
      Ok(mut records) => found.append(&mut records),
      Err(err) => {
        commands::report(&err);
        if errors::kind_of(&err) != ErrorKind::InvalidToken {
          status.block();
        }
      }
    }
  }
  found
}

/// The Landing Zone trails the account owns, as (home region, ARN)
///
/// Trails seen from `region` include shadows of multi-region trails homed elsewhere, so a
/// trail is keyed on its home region where it has to be deleted. Organization trails owned
/// by another account are left out since they cannot be deleted from this one
fn baseline_trails(account_id: &str, region: &str, trails: &[Trail]) -> Vec<(String, String)> {
  trails
    .iter()
    .filter(|trail| trail.name() == Some(cloudtrail::LZ_TRAIL_NAME))
    .filter(|trail| {
      let owner = cloudtrail::owner_account_id(trail);
      if owner != account_id {
        warn!(
          "Trail {} seen in {account_id} belongs to {owner}; it is not counted against this account",
          cloudtrail::LZ_TRAIL_NAME
        );
      }
      owner == account_id
    })
    .map(|trail| {
      (
        cloudtrail::home_region(trail, region).to_owned(),
        utils::owned_str(trail.trail_arn()),
      )
    })
    .collect()
}

impl CheckAccount {
  fn confirm(&self, question: &str) -> Result<bool> {
    match self.fix {
      true => prompt::should_delete(self.fix, self.force, question),
      false => Ok(false),
    }
  }

  /// Run every step, returning whether the account is ready to be adopted
  pub async fn run(&self, color: bool) -> Result<bool> {
    if self.explain {
      println!("{EXPLANATION}");
      return Ok(true);
    }

    if self.force && !self.fix {
      warn!("--force was provided without --fix; nothing will be changed");
    }

    let started = Instant::now();
    let account_id = self.account.as_deref().context("An account to check is required")?;
    let access = AccountAccess::new(self.profile.as_deref()).await?;
    let regions = regions::lz_regions(self.quick);
    info!(
      "Checking account {account_id} from {} across {} regions",
      access.account_id(),
      regions.len()
    );

    let creds = match self.step_zero(&access, account_id).await {
      Ok(creds) => {
        println!("{}", output::paint(true, "** Step 0 completed with no issues", color));
        creds
      }
      Err(err) => {
        println!("{}", output::paint(false, &format!("** Step 0 failed: {err:#}"), color));
        println!(
          "The role in account {account_id} must trust the management account {}",
          access.management_account_id
        );
        return Ok(false);
      }
    };
    let places = fanout::places(&[creds.to_owned()], &regions);

    let mut steps = vec![
      self.default_vpcs(&creds, places.to_owned()).await?,
      self.config(&creds, places.to_owned()).await?,
      self.trails(&creds, places.to_owned()).await?,
      self.invitations(&creds, places).await?,
      self.membership(&access, account_id).await,
      self.parent(&access, account_id).await,
    ];

    for (idx, step) in steps.iter_mut().enumerate() {
      let outcome = step.finish();
      let line = format!("** Step {} ({}) {outcome}", idx + 1, CHECKS[idx]);
      println!("{}", output::paint(step.success, &line, color));
    }

    let rows: Vec<StepRow> = steps
      .iter()
      .enumerate()
      .map(|(idx, step)| StepRow {
        step: idx + 1,
        check: CHECKS[idx],
        issues_found: step.issues_found,
        issues_fixed: step.issues_fixed,
        success: step.success,
      })
      .collect();
    output::print("Summary", &rows, OutputFormat::Table)?;

    let ready = is_ready(&steps);
    let found: usize = steps.iter().map(|s| s.issues_found).sum();
    let fixed: usize = steps.iter().map(|s| s.issues_fixed).sum();
    let verdict = match ready {
      true => format!("Account {account_id} is ready to be adopted into the Landing Zone"),
      false => format!("Account {account_id} is not ready to be adopted ({found} issues found, {fixed} fixed)"),
    };
    println!();
    println!("{}", output::paint(ready, &verdict, color));

    if self.timing {
      eprintln!("This check took {:.3} seconds", started.elapsed().as_secs_f64());
    }

    Ok(ready)
  }

  /// Step 0: get into the account
  async fn step_zero(&self, access: &AccountAccess, account_id: &str) -> Result<AccountCredentials> {
    let target = ChildAccount {
      management_account_id: access.management_account_id.to_owned(),
      account_id: account_id.to_owned(),
      email: String::new(),
      status: ACTIVE.to_string(),
      parent_profile: access.profile.to_owned().unwrap_or_else(|| "default".to_string()),
    };
    let roles = credentials::access_roles(&self.access_roles);

    credentials::assume(access, &target, &roles).await
  }

  /// Step 1: default VPCs
  async fn default_vpcs(&self, creds: &AccountCredentials, places: Vec<Place>) -> Result<StepStatus> {
    let mut status = StepStatus::default();
    let results = commands::survey(places, self.workers, |place| async move {
      let client = ec2::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
      let vpcs = ec2::describe_default_vpcs(&client).await?;
      Ok(vpcs.iter().map(|vpc| (place.region.to_owned(), ec2::vpc_id(vpc))).collect())
    })
    .await;

    let mut vpcs = settle(&mut status, results);
    vpcs.sort();
    for (region, vpc_id) in vpcs {
      error!("Found default VPC {vpc_id} in {region}");
      status.issue();

      if self.confirm(&format!("Delete default VPC {vpc_id} in {region}?"))? {
        let client = ec2::get_client(&creds.config_for(&region), CLIENT_RETRIES);
        match ec2::delete_vpc(&client, &vpc_id).await {
          Ok(_) => status.fixed(1),
          Err(err) => error!("Unable to delete {vpc_id} in {region}: {err:#}"),
        }
      }
    }

    Ok(status)
  }

  /// Step 2: Config recorders and delivery channels
  async fn config(&self, creds: &AccountCredentials, places: Vec<Place>) -> Result<StepStatus> {
    let mut status = StepStatus::default();
    let results = commands::survey(places, self.workers, |place| async move {
      let setup = config_recorders::describe(&place.credentials, &place.region).await?;
      Ok(vec![(place.region.to_owned(), setup)])
    })
    .await;

    let mut setups = settle(&mut status, results);
    setups.sort_by(|a, b| a.0.cmp(&b.0));
    for (region, setup) in setups.iter().filter(|(_, setup)| !setup.is_empty()) {
      for recorder in &setup.recorders {
        error!("Found configuration recorder {} in {region}", recorder.name);
        status.issue();
      }
      for channel in &setup.channels {
        error!("Found delivery channel {} in {region}", channel.name);
        status.issue();
      }

      if self.confirm(&format!("Delete the Config recorder and delivery channel in {region}?"))? {
        let (removed, result) = config_recorders::remove(creds, region, setup).await;
        status.fixed(removed);
        if let Err(err) = result {
          error!("Unable to remove Config from {region}: {err:#}");
        }
      }
    }

    Ok(status)
  }

  /// Step 3: a trail with the name the Landing Zone uses
  async fn trails(&self, creds: &AccountCredentials, places: Vec<Place>) -> Result<StepStatus> {
    let mut status = StepStatus::default();
    let results = commands::survey(places, self.workers, |place| async move {
      let client = cloudtrail::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
      let trails = cloudtrail::describe_trails(&client).await?;

      Ok(baseline_trails(&place.credentials.account_id, &place.region, &trails))
    })
    .await;

    let mut trails = settle(&mut status, results);
    trails.sort();
    trails.dedup();
    for (region, arn) in trails {
      error!("Found trail {} in {region}", cloudtrail::LZ_TRAIL_NAME);
      status.issue();

      if self.confirm(&format!("Delete trail {} in {region}?", cloudtrail::LZ_TRAIL_NAME))? {
        let client = cloudtrail::get_client(&creds.config_for(&region), CLIENT_RETRIES);
        match cloudtrail::delete_trail(&client, &arn).await {
          Ok(_) => status.fixed(1),
          Err(err) => error!("Unable to delete trail {arn}: {err:#}"),
        }
      }
    }

    Ok(status)
  }

  /// Step 4: pending GuardDuty invitations
  async fn invitations(&self, creds: &AccountCredentials, places: Vec<Place>) -> Result<StepStatus> {
    let mut status = StepStatus::default();
    let results = commands::survey(places, self.workers, |place| async move {
      guardduty::list_invitations(&place.credentials, &place.region).await
    })
    .await;

    let mut invitations = settle(&mut status, results);
    invitations.sort_by(|a, b| (&a.region, &a.from_account_id).cmp(&(&b.region, &b.from_account_id)));
    for invite in invitations {
      error!(
        "Found GuardDuty invitation from {} in {}",
        invite.from_account_id, invite.region
      );
      status.issue();

      let question = format!("Delete the GuardDuty invitation from {} in {}?", invite.from_account_id, invite.region);
      if self.confirm(&question)? {
        let region = invite.region.to_owned();
        match guardduty::delete_invitations(creds, &region, &[invite]).await {
          Ok(deleted) => status.fixed(deleted),
          Err(err) => error!("Unable to delete the GuardDuty invitation in {region}: {err:#}"),
        }
      }
    }

    Ok(status)
  }

  /// Step 5: the account is a member of the management account's Organization
  async fn membership(&self, access: &AccountAccess, account_id: &str) -> StepStatus {
    let mut status = StepStatus::default();

    if access.account_type != AccountType::Root {
      warn!(
        "Account {} is not the management account of an Organization ({})",
        access.account_id(),
        access.account_type
      );
      status.issue();
      return status;
    }

    match access.child_accounts().await {
      Ok(accounts) if accounts.iter().any(|a| a.account_id == account_id) => {}
      Ok(_) => {
        error!(
          "Account {account_id} is not part of the Organization of {}; it has to be invited into it",
          access.account_id()
        );
        status.issue();
      }
      Err(err) => {
        commands::report(&err);
        status.block();
      }
    }

    status
  }

  /// Step 6: the account is directly under the organization root
  async fn parent(&self, access: &AccountAccess, account_id: &str) -> StepStatus {
    let mut status = StepStatus::default();

    if access.account_type != AccountType::Root {
      warn!("The parent of {account_id} can only be checked from the management account");
      status.block();
      return status;
    }

    let client = organizations::get_client(&access.config, CLIENT_RETRIES);
    match organizations::parent_is_root(&client, account_id).await {
      Ok(true) => {}
      Ok(false) => {
        error!("Account {account_id} is within an Organizational Unit; move it to the organization root");
        status.issue();
      }
      Err(err) => {
        commands::report(&err);
        status.block();
      }
    }

    status
  }
}
