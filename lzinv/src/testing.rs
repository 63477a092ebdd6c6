//! Helpers for tests that talk to a local stand-in for the AWS APIs

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::{provider::SharedCredentialsProvider, Credentials};
use aws_types::region::Region;
use wiremock::{MockServer, Request, ResponseTemplate};

/// Configuration whose clients send every request to the mock server
pub(crate) fn mock_config(server: &MockServer) -> SdkConfig {
  SdkConfig::builder()
    .behavior_version(BehaviorVersion::latest())
    .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
      "AKIDEXAMPLE",
      "secret",
      None,
      None,
      "test",
    )))
    .region(Region::new("us-east-1"))
    .endpoint_url(server.uri())
    .build()
}

/// Name of the operation a request was made for
///
/// JSON protocols carry it in `x-amz-target`, query protocols in the `Action` form field
/// and REST protocols in the method and path
pub(crate) fn operation(request: &Request) -> String {
  if let Some(target) = request.headers.get("x-amz-target").and_then(|v| v.to_str().ok()) {
    return target.rsplit('.').next().unwrap_or(target).to_string();
  }

  let body = String::from_utf8_lossy(&request.body);
  if let Some(action) = body.split('&').find_map(|pair| pair.strip_prefix("Action=")) {
    return action.to_string();
  }

  format!("{} {}", request.method, request.url.path())
}

/// Operations received by the server, in the order they were made
pub(crate) async fn operations(server: &MockServer) -> Vec<String> {
  server
    .received_requests()
    .await
    .unwrap_or_default()
    .iter()
    .map(operation)
    .collect()
}

/// Requests received for the operation, as body text
pub(crate) async fn bodies_of(server: &MockServer, op: &str) -> Vec<String> {
  server
    .received_requests()
    .await
    .unwrap_or_default()
    .iter()
    .filter(|request| operation(request) == op)
    .map(|request| String::from_utf8_lossy(&request.body).into_owned())
    .collect()
}

pub(crate) fn json(status: u16, body: &str) -> ResponseTemplate {
  ResponseTemplate::new(status).set_body_raw(body.to_owned(), "application/x-amz-json-1.1")
}

pub(crate) fn xml(status: u16, body: &str) -> ResponseTemplate {
  ResponseTemplate::new(status).set_body_raw(body.to_owned(), "text/xml")
}

/// A JSON protocol error such as `{"__type": "BadRequestException", ...}`
pub(crate) fn json_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
  json(
    status,
    &serde_json::json!({ "__type": code, "message": message }).to_string(),
  )
}

/// A query protocol (STS, IAM) error
pub(crate) fn query_error(status: u16, code: &str, message: &str) -> ResponseTemplate {
  xml(
    status,
    &format!(
      "<ErrorResponse><Error><Type>Sender</Type><Code>{code}</Code><Message>{message}</Message></Error>\
       <RequestId>00000000-0000-0000-0000-000000000000</RequestId></ErrorResponse>"
    ),
  )
}
