#![doc = include_str!("../README.md")]
use ::lib::config::Args;
use ::lib::{configure_dns, setup_tracing};
use anyhow::{Context, Result};

#[paw::main]
fn main(args: Args) -> Result<()> {
    setup_tracing(&args)?;
    let config = args
        .merge_config_and_params()
        .context("Loading configuration")?
        .validate()
        .context("Validating configuration")?;

    configure_dns(&config)
}
