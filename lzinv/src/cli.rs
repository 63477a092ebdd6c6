use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;

use crate::commands;

/// Styles for CLI
fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .literal(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightCyan))),
    )
    .usage(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
}

/// Inventory and clean up the resources that block adopting accounts into an AWS Landing Zone
#[derive(Debug, Parser)]
#[command(author, about, version)]
#[command(propagate_version = true)]
#[command(styles=get_styles())]
pub struct Cli {
  #[command(subcommand)]
  pub command: Commands,

  #[clap(flatten)]
  pub verbose: Verbosity,

  /// Disable colored output
  #[arg(long, global = true)]
  pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Find (and delete) the default VPCs of every account
  DefaultVpcs(commands::default_vpcs::DefaultVpcs),

  /// Find (and delete) CloudTrail trails, and the accounts without any
  Trails(commands::trails::Trails),

  /// Find (and delete) AWS Config recorders and delivery channels
  ConfigRecorders(commands::config_recorders::ConfigRecorders),

  /// Find (and delete) GuardDuty detectors and invitations
  #[command(name = "guardduty")]
  GuardDuty(commands::guardduty::GuardDuty),

  /// Find (and delete) IAM roles
  Roles(commands::roles::Roles),

  /// Find (and delete) IAM SAML identity providers
  SamlProviders(commands::saml_providers::SamlProviders),

  /// Find elastic network interfaces, optionally by IP address
  Enis(commands::enis::Enis),

  /// Find subnets, optionally those containing an IP address
  Subnets(commands::subnets::Subnets),

  /// Find (and delete) CloudFormation stacks
  Stacks(commands::stacks::Stacks),

  /// Check whether an account is ready to be adopted into a Landing Zone
  ///
  /// Exits with status 1 when the account is not ready
  CheckAccount(commands::check_account::CheckAccount),
}

#[cfg(test)]
mod tests {
  use assert_cmd::prelude::*;
  use clap::CommandFactory;
  use rstest::*;

  use super::*;

  fn bin_under_test() -> escargot::CargoRun {
    escargot::CargoBuild::new()
      .bin("lzinv")
      .current_release()
      .current_target()
      .run()
      .unwrap()
  }

  #[test]
  fn verify_cli() {
    Cli::command().debug_assert();
  }

  #[rstest]
  #[case("default-vpcs")]
  #[case("trails")]
  #[case("config-recorders")]
  #[case("guardduty")]
  #[case("roles")]
  #[case("saml-providers")]
  #[case("enis")]
  #[case("subnets")]
  #[case("stacks")]
  #[case("check-account")]
  fn help_test(#[case] command: &str) {
    bin_under_test().command().arg(command).arg("--help").assert().success();
  }

  #[rstest]
  #[case(vec!["check-account"])]
  #[case(vec!["check-account", "--account", "12345"])]
  #[case(vec!["default-vpcs", "--skip-accounts", "not-an-account"])]
  #[case(vec!["enis", "--ip", "10.0.0.300"])]
  #[case(vec!["stacks", "--output", "yaml"])]
  fn invalid_args_test(#[case] args: Vec<&str>) {
    bin_under_test().command().args(args).assert().failure().code(2);
  }

  #[test]
  fn it_parses_subcommand_with_global_flags() {
    let cli = Cli::try_parse_from(["lzinv", "-vv", "subnets", "--ip", "10.0.0.1", "--no-color"]).unwrap();

    assert!(cli.no_color);
    match cli.command {
      Commands::Subnets(subnets) => assert_eq!(subnets.addresses.len(), 1),
      other => panic!("unexpected command {other:?}"),
    }
  }
}
