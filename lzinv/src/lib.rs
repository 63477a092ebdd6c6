pub mod account;
pub mod cli;
pub mod cloudformation;
pub mod cloudtrail;
pub mod commands;
pub mod configservice;
pub mod credentials;
pub mod ec2;
pub mod errors;
pub mod fanout;
pub mod guardduty;
pub mod iam;
pub mod organizations;
pub mod output;
pub mod prompt;
pub mod regions;
pub mod sts;
#[cfg(test)]
pub(crate) mod testing;
pub mod utils;

use std::env;

use anyhow::Result;
use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, SdkConfig};
use aws_types::region::Region;
pub use cli::{Cli, Commands};

/// Number of attempts made by each AWS client before giving up on a request
pub const CLIENT_RETRIES: u32 = 3;

/// Get the configuration to authn/authz with AWS that will be used across AWS clients
///
/// When no profile is provided the default credential chain is used
pub async fn get_sdk_config(profile: Option<&str>, region: Option<String>) -> Result<SdkConfig> {
  let aws_region = match region {
    Some(region) => Some(Region::new(region)),
    None => env::var("AWS_DEFAULT_REGION").ok().map(Region::new),
  };

  let region_provider = RegionProviderChain::first_try(aws_region)
    .or_default_provider()
    .or_else(Region::new(regions::DEFAULT_REGION));

  let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
  if let Some(profile) = profile {
    loader = loader.profile_name(profile);
  }

  Ok(loader.load().await)
}
