//! This module olds struct and helpers for parameters and configuration
use ::structopt::clap::AppSettings;
use anyhow::{bail, Context, Result};
use directories_next::ProjectDirs;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use tracing::debug;

// Courtesy of structopt_flags crate
#[derive(structopt::StructOpt, Debug, Clone, PartialEq)]
pub struct QuietVerbose {
    /// Increase the output's verbosity level
    ///
    /// Pass many times to increase verbosity level, up to 3.
    #[structopt(
        name = "quietverbose",
        long = "verbose",
        short = "v",
        parse(from_occurrences),
        conflicts_with = "quietquiet",
        global = true
    )]
    verbosity_level: u8,

    /// Decrease the output's verbosity level.
    ///
    /// Used once, it will set error log level.
    /// Used twice, will silent the log completely
    #[structopt(
        name = "quietquiet",
        long = "quiet",
        short = "q",
        parse(from_occurrences),
        conflicts_with = "quietverbose",
        global = true
    )]
    quiet_level: u8,
}

impl Default for QuietVerbose {
    fn default() -> Self {
        QuietVerbose {
            verbosity_level: 1,
            quiet_level: 0,
        }
    }
}

impl Serialize for QuietVerbose {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.get_level_filter())
    }
}

fn de_from_str<'de, D>(deserializer: D) -> Result<QuietVerbose, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let (verbosity_level, quiet_level) = match s.to_ascii_lowercase().as_ref() {
        "off" => (0, 2),
        "error" => (0, 1),
        "warn" => (0, 0),
        "info" => (1, 0),
        "debug" => (2, 0),
        _ => (3, 0),
    };
    Ok(QuietVerbose {
        verbosity_level,
        quiet_level,
    })
}

impl QuietVerbose {
    /// Return the log level matching the number of `-v` and `-q` flags.
    pub fn get_level_filter(&self) -> &str {
        let quiet: i8 = self.quiet_level.min(2) as i8;
        let verbose: i8 = self.verbosity_level.min(3) as i8;
        match verbose - quiet {
            -2 => "Off",
            -1 => "Error",
            0 => "Warn",
            1 => "Info",
            2 => "Debug",
            _ => "Trace",
        }
    }
}

/// Validated configuration of the dnsmasq provisioning.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// System domain whose subdomains resolve to `external_ip`
    pub domain: String,
    /// Address at which the machine is reachable from the outside
    pub external_ip: String,
}

#[derive(structopt::StructOpt, Serialize, Deserialize, Debug)]
/// Configure dnsmasq as the local resolver of a provisioned machine
///
/// Route `*.<domain>` to the external IP, keep the upstream nameservers of
/// /etc/resolv.conf for dnsmasq and point /etc/resolv.conf at the internal IP.
/// Must be run as root.
#[structopt(global_settings(&[AppSettings::ColoredHelp, AppSettings::ColorAuto]))]
pub struct Args {
    /// system domain
    #[serde(skip_serializing_if = "Option::is_none")]
    #[structopt(short, long, env)]
    pub domain: Option<String>,

    /// IP at which the machine is reachable from the outside
    #[serde(skip_serializing_if = "Option::is_none")]
    #[structopt(short, long, env)]
    pub external_ip: Option<String>,

    /// configuration file (TOML)
    ///
    /// Values given on the command line take precedence over the file.
    #[serde(skip)]
    #[structopt(short, long, env = "DNSMASQ_PROVISIONER_CONFIG", parse(from_os_str))]
    pub config: Option<PathBuf>,

    #[structopt(flatten)]
    #[serde(deserialize_with = "de_from_str")]
    pub verbose: QuietVerbose,
}

/// Default location of the configuration file.
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("io", "pcfdev", "dnsmasq-provisioner")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Default for Args {
    fn default() -> Args {
        let res = Args {
            domain: None,
            external_ip: None,
            config: default_config_file(),
            verbose: QuietVerbose::default(),
        };
        debug!("Args::default : {:#?}", res);
        res
    }
}

impl Args {
    /// Merge config Default → Config File → command line args
    pub fn merge_config_and_params(self) -> Result<Args> {
        let config_file = self.config.clone().or_else(default_config_file);
        let mut figment = Figment::from(Serialized::defaults(Args::default()));
        if let Some(ref path) = config_file {
            debug!("Reading configuration file {:?}", path);
            figment = figment.merge(Toml::file(path));
        }
        let mut args: Args = figment
            .merge(Serialized::defaults(self))
            .extract()
            .context("Merging configuration file and parameters")?;
        args.config = config_file;
        debug!("Merge config and parameters : {:#?}", args);
        Ok(args)
    }

    /// Check that every mandatory parameter is set.
    pub fn validate(self) -> Result<AppConfig> {
        let domain = match self.domain {
            Some(d) if !d.trim().is_empty() => d.trim().to_owned(),
            _ => bail!("Missing `domain` parameter (--domain or `domain` in config file)"),
        };
        let external_ip = match self.external_ip {
            Some(ip) if !ip.trim().is_empty() => ip.trim().to_owned(),
            _ => bail!(
                "Missing `external_ip` parameter (--external-ip or `external_ip` in config file)"
            ),
        };
        Ok(AppConfig {
            domain,
            external_ip,
        })
    }
}
