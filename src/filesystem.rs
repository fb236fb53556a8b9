//! Abstraction over the few filesystem operations provisioning needs.
//!
//! Like [`crate::command::CommandRunner`], [`FileSystem`] is injected so the
//! dnsmasq configuration can be exercised against a mock instead of `/etc`.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use tracing::trace;

/// Mode of every file written during provisioning: read/write for root,
/// read-only for everyone else. Resolvers running as other users must be
/// able to read `/etc/resolv.conf`.
pub const FILE_MODE_ROOT_WRITE_WORLD_READ: u32 = 0o644;

/// Mode of parent directories created on write.
const DIR_MODE: u32 = 0o755;

/// Trait for reading and writing whole files.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem: Send + Sync {
    /// Replace the content of `path` with `contents` and set its permissions
    /// to `mode`. Missing parent directories are created.
    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()>;

    /// Return the whole content of `path`.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Tell whether `path` exists. Failing to find out is an error.
    fn exists(&self, path: &Path) -> Result<bool>;
}

/// [`FileSystem`] backed by the local disk.
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::DirBuilder::new()
                    .recursive(true)
                    .mode(DIR_MODE)
                    .create(parent)
                    .with_context(|| format!("Creating directory {:?}", parent))?;
            }
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .with_context(|| format!("Opening {:?} for writing", path))?;
        // `mode` only applies on creation, existing files keep theirs otherwise.
        file.set_permissions(Permissions::from_mode(mode))
            .with_context(|| format!("Setting permissions of {:?}", path))?;
        file.write_all(contents)
            .with_context(|| format!("Writing to {:?}", path))?;
        trace!("Wrote {} bytes to {:?}", contents.len(), path);
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("Reading {:?}", path))
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        path.try_exists()
            .with_context(|| format!("Checking existence of {:?}", path))
    }
}
