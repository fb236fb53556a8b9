//! Abstraction over external command execution.
//!
//! [`CommandRunner`] allows swapping the real system command execution
//! ([`SystemCommandRunner`]) with a mock in tests. Provisioning calls
//! `resolvconf`, `service` and `ip`, which need root and a real network
//! stack; injecting a [`CommandRunner`] makes the dnsmasq configuration
//! testable without touching the host.

use anyhow::{bail, Context, Result};
use std::process::{Command, Output};
use tracing::debug;

/// Trait for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` with the given `args`, discarding its stdout.
    fn run(&self, cmd: &str, args: Vec<String>) -> Result<()>;

    /// Run `cmd` with the given `args` and return its stdout.
    fn output(&self, cmd: &str, args: Vec<String>) -> Result<Vec<u8>>;
}

/// Default implementation that delegates to [`std::process::Command`].
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    fn execute(cmd: &str, args: &[String]) -> Result<Output> {
        debug!("Running {} {}", cmd, args.join(" "));
        let output = Command::new(cmd)
            .args(args)
            .output()
            .with_context(|| format!("Running {cmd}"))?;
        if !output.status.success() {
            bail!(
                "{} {} failed with {}, stderr: {}",
                cmd,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(output)
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, cmd: &str, args: Vec<String>) -> Result<()> {
        Self::execute(cmd, &args)?;
        Ok(())
    }

    fn output(&self, cmd: &str, args: Vec<String>) -> Result<Vec<u8>> {
        Ok(Self::execute(cmd, &args)?.stdout)
    }
}
