use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_cloudtrail::{
  config::{self, retry::RetryConfig},
  types::Trail,
  Client,
};

use crate::errors::AwsError;

/// Name of the trail created by the Landing Zone baseline
pub const LZ_TRAIL_NAME: &str = "AWS-Landing-Zone-BaselineCloudTrail";

/// Get the CloudTrail client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

/// Every trail that applies to the account in the client's region
///
/// Shadow trails are included: a multi-region trail shows up in every region it covers and
/// an organization trail shows up in every member account. Use [`home_region`] and
/// [`owner_account_id`] to tell them apart from the trail itself
pub async fn describe_trails(client: &Client) -> Result<Vec<Trail>> {
  let response = client
    .describe_trails()
    .include_shadow_trails(true)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(response.trail_list().to_vec())
}

/// The region the trail was created in, or `region` when CloudTrail does not say
pub fn home_region<'a>(trail: &'a Trail, region: &'a str) -> &'a str {
  trail.home_region().unwrap_or(region)
}

/// The account that owns the trail, taken from its ARN
pub fn owner_account_id(trail: &Trail) -> &str {
  trail
    .trail_arn()
    .and_then(|arn| arn.split(':').nth(4))
    .unwrap_or_default()
}

/// Delete the trail, identified by name or ARN
pub async fn delete_trail(client: &Client, trail: &str) -> Result<()> {
  client
    .delete_trail()
    .name(trail)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn it_reads_owner_and_home_region() {
    let trail = Trail::builder()
      .name("org-trail")
      .home_region("eu-west-1")
      .trail_arn("arn:aws:cloudtrail:eu-west-1:111111111111:trail/org-trail")
      .build();

    assert_eq!(owner_account_id(&trail), "111111111111");
    assert_eq!(home_region(&trail, "us-east-1"), "eu-west-1");
  }

  #[test]
  fn it_falls_back_without_arn_or_home_region() {
    let trail = Trail::builder().name("bare").build();

    assert_eq!(owner_account_id(&trail), "");
    assert_eq!(home_region(&trail, "us-east-1"), "us-east-1");
  }
}
