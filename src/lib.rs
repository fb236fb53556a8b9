#![warn(missing_docs)]
//! dnsmasq-provisioner main components and helper functions used by `main`
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub mod command;
pub mod config;
pub mod dnsmasq;
pub mod filesystem;
pub mod provisioner;
pub use command::{CommandRunner, SystemCommandRunner};
pub use config::{AppConfig, Args};
pub use dnsmasq::{ConfigureDnsmasq, ConfigureError};
pub use filesystem::{FileSystem, LocalFs};
pub use provisioner::{Distribution, ProvisionCommand};

/// Setup logging to stdout
/// (Tracing is a bit more involving to set up but will provide much more feature if needed)
pub fn setup_tracing(args: &Args) -> Result<()> {
    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer =
        EnvFilter::try_new(args.verbose.get_level_filter()).context("Initializing log filter")?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .context("Initializing tracing subscriber")?;
    Ok(())
}

/// Build the dnsmasq provisioning command for `config` on top of the real
/// system commands and local filesystem.
pub fn configure_dnsmasq_command(config: &AppConfig) -> ConfigureDnsmasq {
    ConfigureDnsmasq::new(
        Box::new(SystemCommandRunner),
        Box::new(LocalFs),
        config.domain.clone(),
        config.external_ip.clone(),
    )
}

/// Configure dnsmasq on this machine according to `config`.
pub fn configure_dns(config: &AppConfig) -> Result<()> {
    let command = configure_dnsmasq_command(config);
    info!(
        "Configuring dnsmasq for `{}` ({} distribution)",
        config.domain,
        command.distro()
    );
    ProvisionCommand::run(&command).context("Configuring dnsmasq")?;
    info!("dnsmasq configured, /etc/resolv.conf now points to it");
    Ok(())
}
