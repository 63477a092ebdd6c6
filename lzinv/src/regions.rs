use std::collections::BTreeSet;

/// Region used when none are requested
pub const DEFAULT_REGION: &str = "us-east-1";

/// Regions supported by the Landing Zone
///
/// `ap-northeast-3` is left out since it does not support Config, and therefore cannot host a Landing Zone
pub const LZ_REGIONS: &[&str] = &[
  "ap-northeast-1",
  "ap-northeast-2",
  "ap-south-1",
  "ap-southeast-1",
  "ap-southeast-2",
  "ca-central-1",
  "eu-central-1",
  "eu-north-1",
  "eu-west-1",
  "eu-west-2",
  "eu-west-3",
  "sa-east-1",
  "us-east-1",
  "us-east-2",
  "us-west-1",
  "us-west-2",
];

/// Select the regions to work in from those available to the account
///
/// - nothing requested: `us-east-1`
/// - `all` anywhere in the request: every available region
/// - otherwise: every available region containing one of the requested fragments (`us-` -> all US regions)
pub fn select_regions<S: AsRef<str>>(available: &[String], requested: &[S]) -> Vec<String> {
  if requested.is_empty() {
    return vec![DEFAULT_REGION.to_string()];
  }

  let all = requested.iter().any(|r| r.as_ref().eq_ignore_ascii_case("all"));

  available
    .iter()
    .filter(|region| all || requested.iter().any(|fragment| region.contains(fragment.as_ref())))
    .cloned()
    .collect::<BTreeSet<String>>()
    .into_iter()
    .collect()
}

/// The regions `check-account` walks through
pub fn lz_regions(quick: bool) -> Vec<String> {
  match quick {
    true => vec![DEFAULT_REGION.to_string()],
    false => LZ_REGIONS.iter().map(|r| r.to_string()).collect(),
  }
}

#[cfg(test)]
mod tests {
  use rstest::*;

  use super::*;

  fn available() -> Vec<String> {
    ["us-east-1", "us-west-2", "eu-west-1", "eu-central-1", "ap-southeast-2", "us-east-2"]
      .iter()
      .map(|r| r.to_string())
      .collect()
  }

  #[rstest]
  #[case(vec![], vec!["us-east-1"])]
  #[case(vec!["all"], vec!["ap-southeast-2", "eu-central-1", "eu-west-1", "us-east-1", "us-east-2", "us-west-2"])]
  #[case(vec!["ALL"], vec!["ap-southeast-2", "eu-central-1", "eu-west-1", "us-east-1", "us-east-2", "us-west-2"])]
  #[case(vec!["us-"], vec!["us-east-1", "us-east-2", "us-west-2"])]
  #[case(vec!["eu-west-1", "us-east-1"], vec!["eu-west-1", "us-east-1"])]
  #[case(vec!["us-east", "east"], vec!["us-east-1", "us-east-2"])]
  #[case(vec!["mars-1"], vec![])]
  fn select_regions_test(#[case] requested: Vec<&str>, #[case] expected: Vec<&str>) {
    let result = select_regions(&available(), &requested);
    assert_eq!(result, expected);
  }

  #[test]
  fn it_uses_single_region_when_quick() {
    assert_eq!(lz_regions(true), vec!["us-east-1"]);
  }

  #[test]
  fn it_excludes_osaka_from_lz_regions() {
    let regions = lz_regions(false);
    assert_eq!(regions.len(), LZ_REGIONS.len());
    assert!(!regions.contains(&"ap-northeast-3".to_string()));
  }
}
