use std::time::Instant;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::{error, info};

use crate::{
  commands::{self, DeleteArgs, ScopeArgs},
  fanout, iam, output, regions, CLIENT_RETRIES,
};

#[derive(Args, Debug)]
pub struct Roles {
  /// Only report roles whose name contains one of these fragments
  #[arg(long = "role", value_delimiter = ',')]
  pub fragments: Vec<String>,

  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct RoleRecord {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "Role Name")]
  pub name: String,
  #[tabled(skip)]
  pub arn: String,
}

fn matches_any(fragments: &[String], name: &str) -> bool {
  fragments.is_empty() || fragments.iter().any(|f| name.contains(f.as_str()))
}

impl Roles {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let creds = self.scope.credentials().await?;
    // IAM is global; one visit per account is enough
    let places = fanout::places(&creds, &[regions::DEFAULT_REGION.to_string()]);

    let fragments = self.fragments.to_owned();
    let mut roles = commands::visit(places, self.scope.workers, move |place| {
      let fragments = fragments.to_owned();
      async move {
        let client = iam::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
        let roles = iam::list_roles(&client).await?;

        Ok(
          roles
            .into_iter()
            .filter(|role| matches_any(&fragments, &role.name))
            .map(|role| RoleRecord {
              management_account_id: place.credentials.management_account_id.to_owned(),
              account_id: place.credentials.account_id.to_owned(),
              name: role.name,
              arn: role.arn,
            })
            .collect(),
        )
      }
    })
    .await;
    roles.sort_by(|a, b| (&a.account_id, &a.name).cmp(&(&b.account_id, &b.name)));

    output::print("IAM roles", &roles, self.scope.output)?;
    output::summary(
      true,
      &format!("Found {} roles across {} accounts", roles.len(), creds.len()),
      self.scope.output,
      color,
    );

    if self.delete.enabled() {
      let mut deleted = 0;
      for role in &roles {
        let question = format!("Delete role {} in {}?", role.name, role.account_id);
        if !self.delete.confirm(&question)? {
          continue;
        }
        let Some(account) = commands::credentials_for(&creds, &role.account_id) else {
          continue;
        };

        let client = iam::get_client(&account.config_for(regions::DEFAULT_REGION), CLIENT_RETRIES);
        match iam::delete_role(&client, &role.name).await {
          Ok(_) => {
            info!("Deleted role {} in {}", role.name, role.account_id);
            deleted += 1;
          }
          Err(err) => error!("Unable to delete role {} in {}: {err:#}", role.name, role.account_id),
        }
      }
      output::summary(true, &format!("Deleted {deleted} roles"), self.scope.output, color);
    }

    self.scope.report_timing(started);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  #[rstest]
  #[case(vec![], "AnyRole", true)]
  #[case(vec!["Admin"], "OrgAdminRole", true)]
  #[case(vec!["admin"], "OrgAdminRole", false)]
  #[case(vec!["Audit", "StackSet"], "AWSCloudFormationStackSetExecutionRole", true)]
  #[case(vec!["Audit"], "AWSControlTowerExecution", false)]
  fn matches_any_test(#[case] fragments: Vec<&str>, #[case] name: &str, #[case] expected: bool) {
    let fragments: Vec<String> = fragments.into_iter().map(String::from).collect();
    assert_eq!(matches_any(&fragments, name), expected);
  }
}
