use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_config::{
  config::{self, retry::RetryConfig},
  types::{ConfigurationRecorder, DeliveryChannel},
  Client,
};
use tracing::debug;

use crate::errors::AwsError;

/// Get the Config client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

pub async fn describe_configuration_recorders(client: &Client) -> Result<Vec<ConfigurationRecorder>> {
  let response = client
    .describe_configuration_recorders()
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(response.configuration_recorders().to_vec())
}

pub async fn describe_delivery_channels(client: &Client) -> Result<Vec<DeliveryChannel>> {
  let response = client
    .describe_delivery_channels()
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(response.delivery_channels().to_vec())
}

/// Stop the configuration recorder
///
/// A recorder must be stopped before its delivery channel can be deleted. Switching
/// Config off in the console is not enough for a Landing Zone to create its own
pub async fn stop_configuration_recorder(client: &Client, name: &str) -> Result<()> {
  debug!("Stopping configuration recorder {name}");
  client
    .stop_configuration_recorder()
    .configuration_recorder_name(name)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}

pub async fn delete_configuration_recorder(client: &Client, name: &str) -> Result<()> {
  client
    .delete_configuration_recorder()
    .configuration_recorder_name(name)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}

pub async fn delete_delivery_channel(client: &Client, name: &str) -> Result<()> {
  client
    .delete_delivery_channel()
    .delivery_channel_name(name)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}
