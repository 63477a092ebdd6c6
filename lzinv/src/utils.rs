use anyhow::{anyhow, Result};
use regex_lite::Regex;

/// Own a string field from an SDK shape, whether the SDK models it as required or optional
///
/// Missing values become an empty string
pub fn owned_str<'a>(value: impl Into<Option<&'a str>>) -> String {
  value.into().unwrap_or_default().to_owned()
}

/// Validate an AWS account ID (12 digits)
///
/// Used as a clap value parser
pub fn parse_account_id(id: &str) -> Result<String> {
  let re = Regex::new(r"^\d{12}$")?;
  match re.is_match(id.trim()) {
    true => Ok(id.trim().to_owned()),
    false => Err(anyhow!("{id} is not a valid 12 digit AWS account ID")),
  }
}

/// The partition portion of an ARN (`aws`, `aws-cn`, `aws-us-gov`), defaulting to `aws`
pub fn partition_of(arn: &str) -> &str {
  arn
    .split(':')
    .nth(1)
    .filter(|partition| !partition.is_empty())
    .unwrap_or("aws")
}

/// The role ARN used to access a child account
pub fn role_arn(partition: &str, account_id: &str, role: &str) -> String {
  format!("arn:{partition}:iam::{account_id}:role/{role}")
}

/// The short name of a caller ARN, i.e. whatever follows the last `:`
pub fn short_arn(arn: &str) -> &str {
  arn.rsplit(':').next().unwrap_or(arn)
}

/// Name of a resource given its ARN, which is everything after the first `/`
///
/// `arn:aws:iam::111111111111:saml-provider/Okta` -> `Okta`
pub fn name_from_arn(arn: &str) -> &str {
  match arn.find('/') {
    Some(idx) => &arn[idx + 1..],
    None => arn,
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  #[test]
  fn it_owns_required_and_optional() {
    assert_eq!(owned_str("vpc-123"), "vpc-123");
    assert_eq!(owned_str(Some("vpc-123")), "vpc-123");
    assert_eq!(owned_str(None::<&str>), "");
  }

  #[rstest]
  #[case("123456789012", true)]
  #[case(" 123456789012 ", true)]
  #[case("12345678901", false)]
  #[case("1234567890123", false)]
  #[case("12345678901a", false)]
  #[case("", false)]
  fn parse_account_id_test(#[case] id: &str, #[case] valid: bool) {
    assert_eq!(parse_account_id(id).is_ok(), valid);
  }

  #[rstest]
  #[case("arn:aws:iam::111111111111:user/admin", "aws")]
  #[case("arn:aws-us-gov:iam::111111111111:user/admin", "aws-us-gov")]
  #[case("arn:aws-cn:sts::111111111111:assumed-role/Admin/me", "aws-cn")]
  #[case("not-an-arn", "aws")]
  fn partition_of_test(#[case] arn: &str, #[case] expected: &str) {
    assert_eq!(partition_of(arn), expected);
  }

  #[test]
  fn it_builds_role_arn() {
    assert_eq!(
      role_arn("aws", "222222222222", "AWSControlTowerExecution"),
      "arn:aws:iam::222222222222:role/AWSControlTowerExecution"
    );
  }

  #[rstest]
  #[case("arn:aws:iam::111111111111:saml-provider/Okta", "Okta")]
  #[case("arn:aws:iam::111111111111:saml-provider/org/Okta", "org/Okta")]
  #[case("no-slash", "no-slash")]
  fn name_from_arn_test(#[case] arn: &str, #[case] expected: &str) {
    assert_eq!(name_from_arn(arn), expected);
  }

  #[test]
  fn it_shortens_arn() {
    assert_eq!(short_arn("arn:aws:iam::111111111111:user/admin"), "user/admin");
  }
}
