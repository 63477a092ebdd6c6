use anyhow::Result;
use aws_config::SdkConfig;
use aws_sdk_guardduty::{
  config::{self, retry::RetryConfig},
  types::Invitation,
  Client,
};
use tracing::{debug, warn};

use crate::{
  errors::{AwsError, ErrorKind},
  utils,
};

/// Get the GuardDuty client
pub fn get_client(config: &SdkConfig, retries: u32) -> Client {
  Client::from_conf(
    config::Builder::from(config)
      .retry_config(RetryConfig::standard().with_max_attempts(retries))
      .build(),
  )
}

pub async fn list_detectors(client: &Client) -> Result<Vec<String>> {
  let response = client.list_detectors().send().await.map_err(AwsError::from_sdk)?;

  Ok(response.detector_ids().to_vec())
}

/// Pending membership invitations sent to the account
pub async fn list_invitations(client: &Client) -> Result<Vec<Invitation>> {
  let invitations = client
    .list_invitations()
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(invitations)
}

/// Delete the invitations sent from the (administrator) account
pub async fn delete_invitations(client: &Client, from_account_id: &str) -> Result<()> {
  let result = client
    .delete_invitations()
    .account_ids(from_account_id)
    .send()
    .await
    .map_err(AwsError::from_sdk);

  match result {
    Ok(_) => Ok(()),
    Err(err) if err.kind == ErrorKind::BadRequest => {
      warn!("Invitation from {from_account_id} could not be deleted: {err}");
      Ok(())
    }
    Err(err) => Err(err.into()),
  }
}

/// Every member account of the detector, associated or not
pub async fn list_members(client: &Client, detector_id: &str) -> Result<Vec<String>> {
  let members = client
    .list_members()
    .detector_id(detector_id)
    .only_associated("FALSE")
    .into_paginator()
    .items()
    .send()
    .collect::<Result<Vec<_>, _>>()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(
    members
      .iter()
      .map(|member| utils::owned_str(member.account_id()))
      .filter(|id| !id.is_empty())
      .collect(),
  )
}

/// Tear down a detector so the Landing Zone can create its own
///
/// The detector leaves its administrator, drops all of its members, and is then deleted.
/// A detector that was never associated with an administrator rejects the disassociation
/// with a bad request, which is expected
pub async fn delete_detector(client: &Client, detector_id: &str) -> Result<()> {
  if let Err(err) = client
    .disassociate_from_administrator_account()
    .detector_id(detector_id)
    .send()
    .await
    .map_err(AwsError::from_sdk)
  {
    match err.kind {
      ErrorKind::BadRequest => debug!("Detector {detector_id} has no administrator: {err}"),
      _ => return Err(err.into()),
    }
  }

  let members = list_members(client, detector_id).await?;
  if !members.is_empty() {
    debug!("Removing {} members from detector {detector_id}", members.len());
    client
      .disassociate_members()
      .detector_id(detector_id)
      .set_account_ids(Some(members.to_owned()))
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
    client
      .delete_members()
      .detector_id(detector_id)
      .set_account_ids(Some(members))
      .send()
      .await
      .map_err(AwsError::from_sdk)?;
  }

  client
    .delete_detector()
    .detector_id(detector_id)
    .send()
    .await
    .map_err(AwsError::from_sdk)?;

  Ok(())
}
