use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_iam::{
  config::{self, retry::RetryConfig},
  Client,
};
use tracing::debug;

use crate::{errors::AwsError, utils};

/// Get the IAM client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

/// The name and ARN of an IAM resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedArn {
  pub name: String,
  pub arn: String,
}

/// Every role in the account
pub async fn list_roles(client: &Client) -> Result<Vec<NamedArn>> {
  let roles = client
    .list_roles()
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(
    roles
      .iter()
      .map(|role| NamedArn {
        name: utils::owned_str(role.role_name()),
        arn: utils::owned_str(role.arn()),
      })
      .collect(),
  )
}

/// Delete the role, first removing everything attached to it
///
/// IAM refuses to delete a role that still has managed policies attached,
/// inline policies, or membership in instance profiles
pub async fn delete_role(client: &Client, role_name: &str) -> Result<()> {
  let attached = client
    .list_attached_role_policies()
    .role_name(role_name)
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;
  for policy_arn in attached.iter().filter_map(|policy| policy.policy_arn()) {
    debug!("Detaching {policy_arn} from {role_name}");
    client
      .detach_role_policy()
      .role_name(role_name)
      .policy_arn(policy_arn)
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
  }

  let inline = client
    .list_role_policies()
    .role_name(role_name)
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;
  for policy_name in inline {
    debug!("Deleting inline policy {policy_name} from {role_name}");
    client
      .delete_role_policy()
      .role_name(role_name)
      .policy_name(policy_name)
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
  }

  let profiles = client
    .list_instance_profiles_for_role()
    .role_name(role_name)
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;
  for profile in profiles {
    let profile_name = utils::owned_str(profile.instance_profile_name());
    debug!("Removing {role_name} from instance profile {profile_name}");
    client
      .remove_role_from_instance_profile()
      .instance_profile_name(profile_name)
      .role_name(role_name)
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
  }

  client
    .delete_role()
    .role_name(role_name)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}

/// Every SAML identity provider in the account
pub async fn list_saml_providers(client: &Client) -> Result<Vec<NamedArn>> {
  let response = client
    .list_saml_providers()
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(
    response
      .saml_provider_list()
      .iter()
      .filter_map(|provider| provider.arn())
      .map(|arn| NamedArn {
        name: utils::name_from_arn(arn).to_owned(),
        arn: arn.to_owned(),
      })
      .collect(),
  )
}

pub async fn delete_saml_provider(client: &Client, arn: &str) -> Result<()> {
  client
    .delete_saml_provider()
    .saml_provider_arn(arn)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}
