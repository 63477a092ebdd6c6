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
pub struct SamlProviders {
  #[clap(flatten)]
  pub scope: ScopeArgs,

  #[clap(flatten)]
  pub delete: DeleteArgs,
}

#[derive(Clone, Debug, Serialize, Tabled)]
pub struct SamlProvider {
  #[tabled(rename = "Mgmt Acct")]
  pub management_account_id: String,
  #[tabled(rename = "Account")]
  pub account_id: String,
  #[tabled(rename = "IdP Name")]
  pub name: String,
  #[tabled(rename = "ARN")]
  pub arn: String,
}

impl SamlProviders {
  pub async fn run(&self, color: bool) -> Result<()> {
    let started = Instant::now();
    let creds = self.scope.credentials().await?;
    let places = fanout::places(&creds, &[regions::DEFAULT_REGION.to_string()]);

    let mut providers = commands::visit(places, self.scope.workers, |place| async move {
      let client = iam::get_client(&place.credentials.config_for(&place.region), CLIENT_RETRIES);
      let providers = iam::list_saml_providers(&client).await?;

      Ok(
        providers
          .into_iter()
          .map(|provider| SamlProvider {
            management_account_id: place.credentials.management_account_id.to_owned(),
            account_id: place.credentials.account_id.to_owned(),
            name: provider.name,
            arn: provider.arn,
          })
          .collect(),
      )
    })
    .await;
    providers.sort_by(|a, b| (&a.account_id, &a.name).cmp(&(&b.account_id, &b.name)));

    output::print("SAML identity providers", &providers, self.scope.output)?;
    output::summary(
      providers.is_empty(),
      &format!("Found {} identity providers across {} accounts", providers.len(), creds.len()),
      self.scope.output,
      color,
    );

    if self.delete.enabled() {
      for provider in &providers {
        let question = format!("Delete identity provider {} in {}?", provider.name, provider.account_id);
        if !self.delete.confirm(&question)? {
          continue;
        }
        let Some(account) = commands::credentials_for(&creds, &provider.account_id) else {
          continue;
        };

        let client = iam::get_client(&account.config_for(regions::DEFAULT_REGION), CLIENT_RETRIES);
        match iam::delete_saml_provider(&client, &provider.arn).await {
          Ok(_) => info!("Deleted identity provider {} in {}", provider.name, provider.account_id),
          Err(err) => error!("Unable to delete identity provider {}: {err:#}", provider.arn),
        }
      }
    }

    self.scope.report_timing(started);
    Ok(())
  }
}
