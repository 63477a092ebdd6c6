use std::fmt;

use anyhow::{Context, Result};
use aws_config::SdkConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
  errors::{self, ErrorKind},
  organizations, sts, CLIENT_RETRIES,
};

/// Where an account sits in relation to an AWS Organization
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
  /// The management (root) account of an organization
  Root,
  /// A member account of an organization
  Child,
  /// An account that is not part of any organization
  StandAlone,
  /// The account could not be classified, typically due to missing permissions
  Unknown,
}

impl fmt::Display for AccountType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Root => "Root",
      Self::Child => "Child",
      Self::StandAlone => "StandAlone",
      Self::Unknown => "Unknown",
    };
    write!(f, "{name}")
  }
}

/// Access into an account through a local profile (or the default credential chain)
#[derive(Clone, Debug)]
pub struct AccountAccess {
  /// Name of the profile used, `None` for the default credential chain
  pub profile: Option<String>,
  pub config: SdkConfig,
  pub identity: sts::CallerIdentity,
  pub account_type: AccountType,
  /// Management account of the organization; the account itself when standalone
  pub management_account_id: String,
  pub org_id: Option<String>,
}

impl AccountAccess {
  /// Resolve the profile into an account and work out its place in the organization
  pub async fn new(profile: Option<&str>) -> Result<Self> {
    let config = crate::get_sdk_config(profile, None).await?;
    let label = profile.unwrap_or("default");

    let identity = sts::get_caller_identity(&sts::get_client(&config, CLIENT_RETRIES))
      .await
      .with_context(|| format!("Unable to get the caller identity for profile {label}"))?;
    debug!("Profile {label} resolves to {}", identity.arn);

    let org_client = organizations::get_client(&config, CLIENT_RETRIES);
    let (account_type, management_account_id, org_id) =
      match organizations::describe_organization(&org_client).await {
        Ok(org) => (
          classify(&identity.account_id, &org.management_account_id),
          org.management_account_id,
          Some(org.id),
        ),
        Err(err) => {
          let kind = errors::kind_of(&err);
          if kind != ErrorKind::OrgNotInUse {
            error!("{}: unable to describe the organization: {err}", identity.account_id);
          }
          let account_type = match kind {
            ErrorKind::OrgNotInUse => AccountType::StandAlone,
            _ => AccountType::Unknown,
          };
          (account_type, identity.account_id.to_owned(), None)
        }
      };

    match &org_id {
      Some(org) => debug!("{} ({}) is a {account_type} account of {org}", identity.account_id, identity.short()),
      None => debug!("{} ({}) is a {account_type} account", identity.account_id, identity.short()),
    }

    Ok(Self {
      profile: profile.map(str::to_owned),
      config,
      identity,
      account_type,
      management_account_id,
      org_id,
    })
  }

  pub fn account_id(&self) -> &str {
    &self.identity.account_id
  }

  /// The accounts reachable from this access
  ///
  /// A management account yields every account in the organization; any other
  /// account yields only itself, which must be active or the profile wouldn't work
  pub async fn child_accounts(&self) -> Result<Vec<ChildAccount>> {
    let parent_profile = self.profile.to_owned().unwrap_or_else(|| "default".to_string());

    match self.account_type {
      AccountType::Root => {
        let client = organizations::get_client(&self.config, CLIENT_RETRIES);
        let accounts = organizations::list_accounts(&client)
          .await
          .with_context(|| format!("Unable to list the accounts of organization {}", self.account_id()))?;

        Ok(
          accounts
            .into_iter()
            .map(|account| ChildAccount {
              management_account_id: self.management_account_id.to_owned(),
              account_id: account.id,
              email: account.email,
              status: account.status,
              parent_profile: parent_profile.to_owned(),
            })
            .collect(),
        )
      }
      AccountType::Child | AccountType::StandAlone => Ok(vec![ChildAccount {
        management_account_id: self.management_account_id.to_owned(),
        account_id: self.account_id().to_owned(),
        email: "NotAnOrgRoot@example.com".to_string(),
        status: ACTIVE.to_string(),
        parent_profile,
      }]),
      AccountType::Unknown => {
        warn!("Account {} could not be classified; skipping", self.account_id());
        Ok(Vec::new())
      }
    }
  }
}

/// Root when the caller is the management account, Child otherwise
fn classify(account_id: &str, management_account_id: &str) -> AccountType {
  match account_id == management_account_id {
    true => AccountType::Root,
    false => AccountType::Child,
  }
}

pub const ACTIVE: &str = "ACTIVE";
pub const SUSPENDED: &str = "SUSPENDED";

/// An account to be inspected
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildAccount {
  pub management_account_id: String,
  pub account_id: String,
  pub email: String,
  pub status: String,
  pub parent_profile: String,
}

impl ChildAccount {
  pub fn is_management(&self) -> bool {
    self.account_id == self.management_account_id
  }
}

/// Which accounts to keep
#[derive(Clone, Debug, Default)]
pub struct AccountFilter {
  /// Accounts to leave alone
  pub skip: Vec<String>,
  /// When not empty, only these accounts are kept
  pub only: Vec<String>,
  /// Keep only management accounts
  pub root_only: bool,
}

impl AccountFilter {
  /// Drop suspended, skipped, and unrequested accounts
  pub fn apply(&self, accounts: Vec<ChildAccount>) -> Vec<ChildAccount> {
    accounts
      .into_iter()
      .filter(|account| {
        if account.status == SUSPENDED {
          debug!("Skipping suspended account {}", account.account_id);
          return false;
        }
        if self.skip.contains(&account.account_id) {
          debug!("Skipping account {} as requested", account.account_id);
          return false;
        }
        if !self.only.is_empty() && !self.only.contains(&account.account_id) {
          return false;
        }
        !self.root_only || account.is_management()
      })
      .collect()
  }
}

/// Resolve every profile into account access, skipping those that fail or are excluded
pub async fn resolve_profiles(profiles: &[String], skip_profiles: &[String]) -> Vec<AccountAccess> {
  let requested: Vec<Option<&str>> = match profiles.is_empty() {
    true => vec![None],
    false => profiles
      .iter()
      .filter(|p| !skip_profiles.contains(p))
      .map(|p| Some(p.as_str()))
      .collect(),
  };

  let mut accesses: Vec<AccountAccess> = Vec::new();
  for profile in requested {
    match AccountAccess::new(profile).await {
      Ok(access) => {
        if accesses.iter().any(|a| a.account_id() == access.account_id()) {
          debug!("Profile {profile:?} points at an account already resolved");
          continue;
        }
        accesses.push(access)
      }
      Err(err) => error!("Skipping profile {}: {err:#}", profile.unwrap_or("default")),
    }
  }

  accesses
}

/// Every child account reachable from the accesses, filtered and de-duplicated
pub async fn child_accounts(accesses: &[AccountAccess], filter: &AccountFilter) -> Vec<(usize, ChildAccount)> {
  let mut result: Vec<(usize, ChildAccount)> = Vec::new();

  for (idx, access) in accesses.iter().enumerate() {
    match access.child_accounts().await {
      Ok(accounts) => {
        for account in filter.apply(accounts) {
          if result.iter().any(|(_, a)| a.account_id == account.account_id) {
            continue;
          }
          result.push((idx, account));
        }
      }
      Err(err) => error!("{}: {err:#}", access.account_id()),
    }
  }

  result
}
