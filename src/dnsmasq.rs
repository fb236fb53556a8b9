//! Configure dnsmasq as the local resolver of the machine.
//!
//! [`ConfigureDnsmasq::run`] stops dnsmasq, writes its configuration
//! fragments, preserves the upstream nameservers found in `/etc/resolv.conf`
//! and finally points `/etc/resolv.conf` at the internal IP so that local
//! queries go through dnsmasq.
//!
//! The pure parts are exposed as helpers:
//! ```
//! use lib::dnsmasq::{domain_config, external_nameservers, parse_internal_ip};
//! let ip = parse_internal_ip("1.0.0.0 via 10.0.2.2 dev eth0  src 10.0.2.15\n    cache ");
//! assert_eq!(ip, Some("10.0.2.15"));
//! assert_eq!(
//!     domain_config("local.pcfdev.io", "192.168.11.11"),
//!     "address=/.local.pcfdev.io/192.168.11.11\naddress=/.cf.internal/127.0.0.1"
//! );
//! assert_eq!(
//!     external_nameservers("nameserver 127.0.0.1\nnameserver 8.8.8.8", "10.0.2.15"),
//!     vec!["nameserver 8.8.8.8"]
//! );
//! ```
use anyhow::Result;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::filesystem::{FileSystem, FILE_MODE_ROOT_WRITE_WORLD_READ};
use crate::provisioner::{Distribution, ProvisionCommand};

/// dnsmasq fragment holding the address rules.
pub const DOMAIN_CONFIG_PATH: &str = "/etc/dnsmasq.d/domain";
/// dnsmasq fragment holding the listen address.
pub const INTERFACE_CONFIG_PATH: &str = "/etc/dnsmasq.d/interface";
/// Main dnsmasq configuration.
pub const DNSMASQ_CONFIG_PATH: &str = "/etc/dnsmasq.conf";
/// Upstream nameservers used by dnsmasq. Written once, never overwritten.
pub const EXTERNAL_RESOLV_CONF_PATH: &str = "/var/pcfdev/external-resolv.conf";
/// System resolver configuration.
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

const LOOPBACK: &str = "127.0.0.1";
const NAMESERVER_PREFIX: &str = "nameserver ";

/// Error returned by [`ConfigureDnsmasq::run`].
#[derive(Debug, Error)]
pub enum ConfigureError {
    /// A command or filesystem operation failed. The error is kept untouched.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
    /// `ip route get 1` did not report a source address.
    #[error("internal ip could not be parsed from output: {0}")]
    InternalIpUnparsable(String),
}

/// Return the address following `src` in the output of `ip route get`.
pub fn parse_internal_ip(output: &str) -> Option<&str> {
    let mut tokens = output.split_whitespace();
    tokens.find(|t| *t == "src")?;
    tokens.next()
}

/// Render the address rules routing `domain` to `external_ip` and the
/// internal cluster domain to loopback.
pub fn domain_config(domain: &str, external_ip: &str) -> String {
    [
        format!("address=/.{domain}/{external_ip}"),
        format!("address=/.cf.internal/{LOOPBACK}"),
    ]
    .join("\n")
}

/// Keep the `nameserver` lines of `resolv_conf` which do not point back at
/// this machine, in their original order.
pub fn external_nameservers(resolv_conf: &str, internal_ip: &str) -> Vec<String> {
    resolv_conf
        .lines()
        .filter_map(|line| line.strip_prefix(NAMESERVER_PREFIX))
        .map(str::trim)
        .filter(|addr| !addr.is_empty() && *addr != LOOPBACK && *addr != internal_ip)
        .map(|addr| format!("{NAMESERVER_PREFIX}{addr}"))
        .collect()
}

/// Provisioning command making dnsmasq the resolver of the machine.
pub struct ConfigureDnsmasq {
    runner: Box<dyn CommandRunner>,
    fs: Box<dyn FileSystem>,
    /// System domain routed to `external_ip`
    pub domain: String,
    /// Address at which the machine is reachable from the outside
    pub external_ip: String,
}

impl fmt::Debug for ConfigureDnsmasq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigureDnsmasq")
            .field("domain", &self.domain)
            .field("external_ip", &self.external_ip)
            .finish()
    }
}

impl ConfigureDnsmasq {
    /// Create the command from its collaborators and configuration.
    pub fn new(
        runner: Box<dyn CommandRunner>,
        fs: Box<dyn FileSystem>,
        domain: impl Into<String>,
        external_ip: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            fs,
            domain: domain.into(),
            external_ip: external_ip.into(),
        }
    }

    /// Configure dnsmasq and point `/etc/resolv.conf` at it.
    ///
    /// Steps are applied in order and the first failure is returned as is;
    /// steps already applied are not rolled back.
    pub fn run(&self) -> Result<(), ConfigureError> {
        info!("Disabling resolvconf updates");
        self.runner
            .run("resolvconf", vec!["--disable-updates".into()])?;
        info!("Stopping dnsmasq");
        self.runner
            .run("service", vec!["dnsmasq".into(), "stop".into()])?;

        let internal_ip = self.internal_ip()?;
        info!("Internal ip is {}", internal_ip);

        self.write(
            DOMAIN_CONFIG_PATH,
            &domain_config(&self.domain, &self.external_ip),
        )?;
        self.write(
            INTERFACE_CONFIG_PATH,
            &format!("listen-address={internal_ip}"),
        )?;
        self.write(
            DNSMASQ_CONFIG_PATH,
            &format!("resolv-file={EXTERNAL_RESOLV_CONF_PATH}"),
        )?;
        self.save_external_nameservers(&internal_ip)?;

        info!("Starting dnsmasq");
        self.runner
            .run("service", vec!["dnsmasq".into(), "start".into()])?;
        self.write(
            RESOLV_CONF_PATH,
            &format!("{NAMESERVER_PREFIX}{internal_ip}"),
        )?;
        Ok(())
    }

    /// Distribution this command is meant for.
    pub fn distro(&self) -> Distribution {
        Distribution::Oss
    }

    fn internal_ip(&self) -> Result<String, ConfigureError> {
        let output = self
            .runner
            .output("ip", vec!["route".into(), "get".into(), "1".into()])?;
        let output = String::from_utf8_lossy(&output);
        debug!("ip route output: {:?}", output);
        match parse_internal_ip(&output) {
            Some(ip) => Ok(ip.to_owned()),
            None => Err(ConfigureError::InternalIpUnparsable(output.to_string())),
        }
    }

    /// Copy the upstream nameservers of `/etc/resolv.conf` aside, unless a
    /// previous run already did.
    fn save_external_nameservers(&self, internal_ip: &str) -> Result<()> {
        let external_resolv_conf = Path::new(EXTERNAL_RESOLV_CONF_PATH);
        if self.fs.exists(external_resolv_conf)? {
            warn!(
                "{} already exists, keeping its nameservers",
                EXTERNAL_RESOLV_CONF_PATH
            );
            return Ok(());
        }
        let resolv_conf = self.fs.read(Path::new(RESOLV_CONF_PATH))?;
        let nameservers =
            external_nameservers(&String::from_utf8_lossy(&resolv_conf), internal_ip);
        debug!("External nameservers: {:?}", nameservers);
        self.write(EXTERNAL_RESOLV_CONF_PATH, &nameservers.join("\n"))
    }

    fn write(&self, path: &str, contents: &str) -> Result<()> {
        info!("Writing {}", path);
        debug!("{} content: {:?}", path, contents);
        self.fs.write(
            Path::new(path),
            contents.as_bytes(),
            FILE_MODE_ROOT_WRITE_WORLD_READ,
        )
    }
}

impl ProvisionCommand for ConfigureDnsmasq {
    fn run(&self) -> Result<()> {
        match ConfigureDnsmasq::run(self) {
            Ok(()) => Ok(()),
            Err(ConfigureError::Collaborator(e)) => Err(e),
            Err(e) => Err(e.into()),
        }
    }

    fn distro(&self) -> Distribution {
        ConfigureDnsmasq::distro(self)
    }
}
