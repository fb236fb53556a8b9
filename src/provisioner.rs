//! Common surface of provisioning commands.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distribution variant a provisioning command belongs to.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Open source distribution
    Oss,
    /// Distribution bundling the commercial components
    Pcf,
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Oss => write!(f, "oss"),
            Distribution::Pcf => write!(f, "pcf"),
        }
    }
}

/// A single provisioning step.
///
/// Callers use [`ProvisionCommand::distro`] to pick the commands matching the
/// distribution being provisioned and then [`ProvisionCommand::run`] them.
pub trait ProvisionCommand {
    /// Apply the step to the machine.
    fn run(&self) -> Result<()>;

    /// Distribution this step is meant for.
    fn distro(&self) -> Distribution;
}
