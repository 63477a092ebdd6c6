use std::time::Instant;

use anyhow::Result;
use aws_sdk_cloudformation::types::{StackStatus, StackSummary};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info};

use crate::{
  cloudformation,
  commands::{self, DeleteArgs, ScopeArgs},
  credentials::AccountCredentials,
  output, utils, CLIENT_RETRIES,
};

/// Status reported by CloudFormation when a stack could not be deleted
const DELETE_FAILED: &str = "DELETE_FAILED";

#[derive(Args, Debug)]
pub struct Stacks {
  /// Only report stacks whose name contains one of these fragments
  #[arg(short, long = "fragment", value_delimiter = ',')]
  pub fragments: Vec<String>,

  /// Only report stacks in these statuses (e.g. `CREATE_COMPLETE`); every stack not yet deleted by default
  #[arg(short, long = "status", value_delimiter = ',')]
  pub statuses: Vec<String>,

  /// Logical resource id(s) to keep when deleting a stack in `DELETE_FAILED`
  #[arg(long = "retain", value_delimiter = ',')]
  pub retain: Vec<String>,

  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct StackRecord {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Region")]
  pub region: String,
  #[tabled(rename = "Status")]
  pub status: String,
  #[tabled(rename = "Stack Name")]
  pub name: String,
  #[tabled(skip)]
  pub stack_id: String,
}

impl StackRecord {
  fn new(creds: &AccountCredentials, region: &str, stack: &StackSummary) -> Self {
    Self {
      management_account_id: creds.management_account_id.to_owned(),
      account_id: creds.account_id.to_owned(),
      region: region.to_owned(),
      status: stack.stack_status().map(|s| s.as_str().to_owned()).unwrap_or_default(),
      name: utils::owned_str(stack.stack_name()),
      stack_id: utils::owned_str(stack.stack_id()),
    }
  }
}

fn statuses(requested: &[String]) -> Vec<StackStatus> {
  requested
    .iter()
    .map(|s| StackStatus::from(s.trim().to_uppercase().as_str()))
    .collect()
}

fn matches_any(fragments: &[String], name: &str) -> bool {
  fragments.is_empty() || fragments.iter().any(|f| f.eq_ignore_ascii_case("all") || name.contains(f.as_str()))
}

impl Stacks {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let (creds, places) = self.scope.places().await?;

    let wanted = statuses(&self.statuses);
    let fragments = self.fragments.to_owned();
    let mut stacks = commands::visit(places, self.scope.workers, move |place| {
      let wanted = wanted.to_owned();
      let fragments = fragments.to_owned();
      async move {
        let client = cloudformation::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
        let stacks = cloudformation::list_stacks(&client, &wanted).await?;

        Ok(
          stacks
            .iter()
            .map(|stack| StackRecord::new(&place.credentials, &place.region, stack))
            .filter(|record| matches_any(&fragments, &record.name))
            .collect(),
        )
      }
    })
    .await;
    stacks.sort_by(|a, b| (&a.account_id, &a.region, &a.name).cmp(&(&b.account_id, &b.region, &b.name)));

    output::print("CloudFormation stacks", &stacks, self.scope.output)?;
    output::summary(
      true,
      &format!("Found {} stacks across {} accounts", stacks.len(), creds.len()),
      self.scope.output,
      color,
    );

    if self.delete.enabled() {
      for stack in &stacks {
        let question = format!(
          "Delete stack {} ({}) in {} {}?",
          stack.name, stack.status, stack.account_id, stack.region
        );
        if !self.delete.confirm(&question)? {
          continue;
        }
        let Some(account) = commands::credentials_for(&creds, &stack.account_id) else {
          continue;
        };

        // Resources can only be retained when the previous deletion failed
        let retain: &[String] = match stack.status == DELETE_FAILED {
          true => self.retain.as_slice(),
          false => &[],
        };
        let client = cloudformation::get_client(&account.config_for(&stack.region), CLIENT_RETRIES);
        match cloudformation::delete_stack(&client, &stack.stack_id, retain).await {
          Ok(_) => info!("Deletion of {} in {} {} started", stack.name, stack.account_id, stack.region),
          Err(err) => error!("Unable to delete stack {}: {err:#}", stack.name),
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

  #[test]
  fn it_normalizes_statuses() {
    let requested = vec!["create_complete".to_string(), " DELETE_FAILED ".to_string()];
    assert_eq!(
      statuses(&requested),
      vec![StackStatus::CreateComplete, StackStatus::DeleteFailed]
    );
  }

  #[rstest]
  #[case(vec![], "StackSet-GuardDuty-1234", true)]
  #[case(vec!["all"], "StackSet-GuardDuty-1234", true)]
  #[case(vec!["GuardDuty"], "StackSet-GuardDuty-1234", true)]
  #[case(vec!["Config", "Trail"], "StackSet-GuardDuty-1234", false)]
  fn matches_any_test(#[case] fragments: Vec<&str>, #[case] name: &str, #[case] expected: bool) {
    let fragments: Vec<String> = fragments.into_iter().map(String::from).collect();
    assert_eq!(matches_any(&fragments, name), expected);
  }
}
