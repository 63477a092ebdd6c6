use std::fmt;

use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Broad classes of AWS API failures that change how a command proceeds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
  /// The credentials were rejected for the account
  AuthFailure,
  /// The caller is not permitted to perform the action (or assume the role)
  AccessDenied,
  /// The token is not valid for the endpoint; most often an opt-in region that is not enabled
  InvalidToken,
  /// The account is not part of an AWS Organization
  OrgNotInUse,
  /// The resource no longer exists
  NotFound,
  /// The request was rejected as malformed for the current state of the resource
  BadRequest,
  Other,
}

impl ErrorKind {
  /// Classify an error from its AWS error code, falling back to the message text
  ///
  /// Some services only surface the interesting part of the failure in the message,
  /// so both are searched for well known markers
  pub fn classify(code: Option<&str>, message: &str) -> Self {
    let haystacks = [code.unwrap_or_default(), message];

    let matches = |needles: &[&str]| {
      haystacks
        .iter()
        .any(|hay| needles.iter().any(|needle| hay.contains(needle)))
    };

    if matches(&["AWSOrganizationsNotInUseException"]) {
      Self::OrgNotInUse
    } else if matches(&[
      "UnrecognizedClientException",
      "InvalidClientTokenId",
      "security token included in the request is invalid",
    ]) {
      Self::InvalidToken
    } else if matches(&["AuthFailure"]) {
      Self::AuthFailure
    } else if matches(&["AccessDenied", "UnauthorizedOperation"]) {
      Self::AccessDenied
    } else if matches(&["NoSuchEntity", "NotFound"]) {
      Self::NotFound
    } else if matches(&["BadRequestException"]) {
      Self::BadRequest
    } else {
      Self::Other
    }
  }
}

/// An AWS API error reduced to the parts used for reporting and control flow
#[derive(Debug)]
pub struct AwsError {
  pub kind: ErrorKind,
  pub code: Option<String>,
  pub message: String,
}

impl AwsError {
  /// Convert an SDK error from any of the service clients
  pub fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
  where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
  {
    let code = err.code().map(str::to_owned);
    let message = match err.message() {
      Some(message) => message.to_owned(),
      None => DisplayErrorContext(&err).to_string(),
    };

    Self {
      kind: ErrorKind::classify(code.as_deref(), &message),
      code,
      message,
    }
  }
}

impl fmt::Display for AwsError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.code {
      Some(code) => write!(f, "{code}: {}", self.message),
      None => write!(f, "{}", self.message),
    }
  }
}

impl std::error::Error for AwsError {}

/// Recover the AWS error classification from an `anyhow::Error`, if there is one in the chain
pub fn kind_of(err: &anyhow::Error) -> ErrorKind {
  err
    .chain()
    .find_map(|cause| cause.downcast_ref::<AwsError>())
    .map(|aws| aws.kind)
    .unwrap_or(ErrorKind::Other)
}

/// Human readable hint for the classes of failures that users can act on
pub fn hint(kind: ErrorKind) -> Option<&'static str> {
  match kind {
    ErrorKind::AuthFailure => Some("authorization failure"),
    ErrorKind::AccessDenied => Some("access denied"),
    ErrorKind::InvalidToken => Some("it's likely the region isn't enabled for the account"),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use anyhow::Context;
  use rstest::*;

  use super::*;

  #[rstest]
  #[case(Some("AuthFailure"), "", ErrorKind::AuthFailure)]
  #[case(Some("AccessDenied"), "User is not authorized", ErrorKind::AccessDenied)]
  #[case(Some("AccessDeniedException"), "", ErrorKind::AccessDenied)]
  #[case(Some("UnauthorizedOperation"), "", ErrorKind::AccessDenied)]
  #[case(Some("InvalidClientTokenId"), "", ErrorKind::InvalidToken)]
  #[case(None, "The security token included in the request is invalid.", ErrorKind::InvalidToken)]
  #[case(Some("AWSOrganizationsNotInUseException"), "", ErrorKind::OrgNotInUse)]
  #[case(Some("NoSuchEntity"), "", ErrorKind::NotFound)]
  #[case(Some("BadRequestException"), "", ErrorKind::BadRequest)]
  #[case(None, "dispatch failure", ErrorKind::Other)]
  #[case(Some("Throttling"), "Rate exceeded", ErrorKind::Other)]
  fn classify_test(#[case] code: Option<&str>, #[case] message: &str, #[case] expected: ErrorKind) {
    assert_eq!(ErrorKind::classify(code, message), expected);
  }

  #[test]
  fn it_finds_kind_through_context() {
    let aws = AwsError {
      kind: ErrorKind::AccessDenied,
      code: Some("AccessDenied".to_string()),
      message: "nope".to_string(),
    };
    let err = Err::<(), _>(aws)
      .context("assuming role in 111111111111")
      .unwrap_err();

    assert_eq!(kind_of(&err), ErrorKind::AccessDenied);
  }

  #[test]
  fn it_defaults_to_other() {
    let err = anyhow::anyhow!("something unrelated");
    assert_eq!(kind_of(&err), ErrorKind::Other);
  }

  #[test]
  fn it_displays_code_and_message() {
    let aws = AwsError {
      kind: ErrorKind::AuthFailure,
      code: Some("AuthFailure".to_string()),
      message: "bad creds".to_string(),
    };
    assert_eq!(aws.to_string(), "AuthFailure: bad creds");
  }
}
