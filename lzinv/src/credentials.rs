use std::sync::Arc;

use anyhow::{bail, Result};
use aws_config::SdkConfig;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_types::region::Region;
use tracing::{debug, error, info, warn};

use crate::{
  account::{AccountAccess, ChildAccount},
  errors::{self, ErrorKind},
  fanout, sts, utils, CLIENT_RETRIES,
};

/// Roles tried, in order, when accessing a child account from its management account
pub const DEFAULT_ACCESS_ROLES: &[&str] = &[
  "AWSCloudFormationStackSetExecutionRole",
  "AWSControlTowerExecution",
  "OrganizationAccountAccessRole",
];

/// Marker used as the role when the profile's own credentials are used
pub const PROFILE_CREDENTIALS: &str = "(profile credentials)";

/// Credentials to work within a single account
#[derive(Clone, Debug)]
pub struct AccountCredentials {
  pub management_account_id: String,
  pub account_id: String,
  /// The role assumed to get into the account
  pub role: String,
  pub parent_profile: String,
  config: SdkConfig,
}

impl AccountCredentials {
  /// Configuration for clients in the region provided
  pub fn config_for(&self, region: &str) -> SdkConfig {
    self
      .config
      .to_builder()
      .region(Region::new(region.to_owned()))
      .build()
  }
}

/// Access roles from the user, or the defaults when none were provided
pub fn access_roles(requested: &[String]) -> Vec<String> {
  match requested.is_empty() {
    true => DEFAULT_ACCESS_ROLES.iter().map(|r| r.to_string()).collect(),
    false => requested.to_vec(),
  }
}

/// Get credentials for the account, assuming the first role in `roles` that lets us in
///
/// The management account is accessed with the profile's own credentials
pub async fn assume(access: &AccountAccess, account: &ChildAccount, roles: &[String]) -> Result<AccountCredentials> {
  if account.account_id == access.account_id() {
    return Ok(AccountCredentials {
      management_account_id: account.management_account_id.to_owned(),
      account_id: account.account_id.to_owned(),
      role: PROFILE_CREDENTIALS.to_string(),
      parent_profile: account.parent_profile.to_owned(),
      config: access.config.clone(),
    });
  }

  let client = sts::get_client(&access.config, CLIENT_RETRIES);
  let partition = access.identity.partition();

  for role in roles {
    let role_arn = utils::role_arn(partition, &account.account_id, role);
    debug!("Trying {role_arn}");

    match sts::assume_role(&client, &role_arn).await {
      Ok(creds) => {
        info!("Connected to account {} using role {role}", account.account_id);
        let config = access
          .config
          .to_builder()
          .credentials_provider(SharedCredentialsProvider::new(creds))
          .build();

        return Ok(AccountCredentials {
          management_account_id: account.management_account_id.to_owned(),
          account_id: account.account_id.to_owned(),
          role: role.to_owned(),
          parent_profile: account.parent_profile.to_owned(),
          config,
        });
      }
      Err(err) => match errors::kind_of(&err) {
        ErrorKind::AccessDenied | ErrorKind::AuthFailure => {
          debug!("Role {role} is not accessible in {}: {err}", account.account_id)
        }
        _ => warn!("Unexpected failure assuming {role_arn}: {err}"),
      },
    }
  }

  bail!(
    "Unable to access account {} from {} using any of the roles: {}",
    account.account_id,
    access.account_id(),
    roles.join(", ")
  )
}

/// Get credentials for every account, skipping those that cannot be accessed
pub async fn gather(
  accesses: &[AccountAccess],
  accounts: Vec<(usize, ChildAccount)>,
  roles: &[String],
  workers: usize,
) -> Vec<AccountCredentials> {
  let roles = Arc::new(roles.to_vec());
  let items: Vec<(AccountAccess, ChildAccount)> = accounts
    .into_iter()
    .filter_map(|(idx, account)| accesses.get(idx).map(|access| (access.clone(), account)))
    .collect();

  let results = fanout::fan_out(items, workers, move |(access, account)| {
    let roles = Arc::clone(&roles);
    async move {
      match assume(&access, &account, &roles).await {
        Ok(creds) => Some(creds),
        Err(err) => {
          error!("{err:#}");
          None
        }
      }
    }
  })
  .await;

  let mut credentials: Vec<AccountCredentials> = results.into_iter().flatten().collect();
  credentials.sort_by(|a, b| {
    (&a.management_account_id, &a.account_id).cmp(&(&b.management_account_id, &b.account_id))
  });
  credentials
}
