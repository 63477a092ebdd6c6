use std::process;

use anyhow::Result;
use clap::Parser;
use lzinv::{Cli, Commands};
use tracing_log::AsTrace;
use tracing_subscriber::FmtSubscriber;

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let subscriber = FmtSubscriber::builder()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .with_writer(std::io::stderr)
    .without_time()
    .with_ansi(!cli.no_color)
    .finish();
  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");

  let color = !cli.no_color;
  let result = match &cli.command {
    Commands::DefaultVpcs(vpcs) => vpcs.run(color).await,
    Commands::Trails(trails) => trails.run(color).await,
    Commands::ConfigRecorders(recorders) => recorders.run(color).await,
    Commands::GuardDuty(guardduty) => guardduty.run(color).await,
    Commands::Roles(roles) => roles.run(color).await,
    Commands::SamlProviders(providers) => providers.run(color).await,
    Commands::Enis(enis) => enis.run(color).await,
    Commands::Subnets(subnets) => subnets.run(color).await,
    Commands::Stacks(stacks) => stacks.run(color).await,
    Commands::CheckAccount(check) => match check.run(color).await {
      Ok(true) => Ok(()),
      Ok(false) => process::exit(1),
      Err(err) => Err(err),
    },
  };

  if let Err(err) = result {
    eprintln!("{err:#}");
    process::exit(2);
  }

  Ok(())
}
