use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_organizations::{
  config::{self, retry::RetryConfig},
  types::ParentType,
  Client,
};

use crate::{errors::AwsError, utils};

/// Get the Organizations client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

/// The organization the caller belongs to
#[derive(Clone, Debug)]
pub struct Organization {
  pub id: String,
  pub management_account_id: String,
}

/// Describe the organization of the caller
///
/// Fails with `ErrorKind::OrgNotInUse` when the account is standalone
pub async fn describe_organization(client: &Client) -> Result<Organization> {
  let response = client
    .describe_organization()
    .send()
    .await
    .map_err(AwsError::from_sdk)?;
  let org = response.organization();

  Ok(Organization {
    id: utils::owned_str(org.and_then(|o| o.id())),
    management_account_id: utils::owned_str(org.and_then(|o| o.master_account_id())),
  })
}

/// An account as reported by the organization
#[derive(Clone, Debug)]
pub struct OrgAccount {
  pub id: String,
  pub name: String,
  pub email: String,
  pub status: String,
}

/// List every account in the organization
pub async fn list_accounts(client: &Client) -> Result<Vec<OrgAccount>> {
  let accounts = client
    .list_accounts()
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(
    accounts
      .iter()
      .map(|account| OrgAccount {
        id: utils::owned_str(account.id()),
        name: utils::owned_str(account.name()),
        email: utils::owned_str(account.email()),
        status: account.status().map(|s| s.as_str().to_owned()).unwrap_or_default(),
      })
      .collect(),
  )
}

/// Whether the account sits directly under the organization root (as opposed to within an OU)
pub async fn parent_is_root(client: &Client, account_id: &str) -> Result<bool> {
  let response = client
    .list_parents()
    .child_id(account_id)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(
    response
      .parents()
      .iter()
      .any(|parent| matches!(parent.r#type(), Some(ParentType::Root))),
  )
}
