use super::EndpointArgs;
use crate::config::ConfigLoader;
use anyhow::{Context, Result};
use beacon_core::EndpointResolver;
use clap::Args;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

pub fn run(args: ResolveArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    args.endpoint.apply(&mut config);

    let resolver =
        EndpointResolver::from_config(&config.endpoint).context("Failed to resolve endpoint")?;
    println!("{}", resolver.redacted());
    Ok(())
}
