use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_cloudformation::{
  config::{self, retry::RetryConfig},
  types::{StackStatus, StackSummary},
  Client,
};

use crate::errors::AwsError;

/// Get the CloudFormation client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

/// Stacks in the region with one of the statuses provided
///
/// Without statuses, every stack that has not been deleted is returned; deleted stacks are
/// only returned when `DELETE_COMPLETE` is asked for
pub async fn list_stacks(client: &Client, statuses: &[StackStatus]) -> Result<Vec<StackSummary>> {
  let stacks = client
    .list_stacks()
    .set_stack_status_filter(match statuses.is_empty() {
      true => None,
      false => Some(statuses.to_vec()),
    })
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(
    stacks
      .into_iter()
      .filter(|stack| is_listed(stack.stack_status(), statuses))
      .collect(),
  )
}

/// Whether a stack in `status` is kept for the statuses requested
fn is_listed(status: Option<&StackStatus>, statuses: &[StackStatus]) -> bool {
  match statuses.is_empty() {
    true => status != Some(&StackStatus::DeleteComplete),
    false => status.is_some_and(|status| statuses.contains(status)),
  }
}

/// Delete the stack, identified by name or stack ID
///
/// Resources listed in `retain` are left in place; only valid for stacks in `DELETE_FAILED`
pub async fn delete_stack(client: &Client, stack: &str, retain: &[String]) -> Result<()> {
  client
    .delete_stack()
    .stack_name(stack)
    .set_retain_resources(match retain.is_empty() {
      true => None,
      false => Some(retain.to_vec()),
    })
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  #[rstest]
  #[case(StackStatus::CreateComplete, vec![], true)]
  #[case(StackStatus::DeleteComplete, vec![], false)]
  #[case(StackStatus::DeleteComplete, vec![StackStatus::DeleteComplete], true)]
  #[case(StackStatus::DeleteFailed, vec![StackStatus::DeleteComplete, StackStatus::DeleteFailed], true)]
  #[case(StackStatus::CreateComplete, vec![StackStatus::DeleteFailed], false)]
  fn is_listed_test(#[case] status: StackStatus, #[case] statuses: Vec<StackStatus>, #[case] expected: bool) {
    assert_eq!(is_listed(Some(&status), &statuses), expected);
  }
}
