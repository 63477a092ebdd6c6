use std::time::SystemTime;

use anyhow::{anyhow, Result};
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_sdk_sts::{
  config::{self, retry::RetryConfig},
  Client,
};

use crate::{errors::AwsError, utils};

/// Session name recorded in CloudTrail for every role assumed by this tool
pub const SESSION_NAME: &str = "lzinv";

/// Get the STS client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

/// Identity of the credentials in use
#[derive(Clone, Debug)]
pub struct CallerIdentity {
  pub account_id: String,
  pub arn: String,
}

impl CallerIdentity {
  /// The principal name, e.g. `assumed-role/Admin/session`
  pub fn short(&self) -> &str {
    utils::short_arn(&self.arn)
  }

  pub fn partition(&self) -> &str {
    utils::partition_of(&self.arn)
  }
}

pub async fn get_caller_identity(client: &Client) -> Result<CallerIdentity> {
  let response = client
    .get_caller_identity()
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(CallerIdentity {
    account_id: utils::owned_str(response.account()),
    arn: utils::owned_str(response.arn()),
  })
}

/// Assume the role and return the temporary credentials
pub async fn assume_role(client: &Client, role_arn: &str) -> Result<Credentials> {
  let response = client
    .assume_role()
    .role_arn(role_arn)
    .role_session_name(SESSION_NAME)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  let creds = response
    .credentials()
    .ok_or_else(|| anyhow!("AssumeRole returned no credentials for {role_arn}"))?;

  Ok(Credentials::new(
    creds.access_key_id(),
    creds.secret_access_key(),
    Some(creds.session_token().to_owned()),
    SystemTime::try_from(*creds.expiration()).ok(),
    "AssumeRole",
  ))
}
