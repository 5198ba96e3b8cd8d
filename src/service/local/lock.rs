//! Exclusive session lock for a local instance.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TransferError;

/// Held for as long as a session is open; released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    released: bool,
}

impl InstanceLock {
    /// Creates the lock file, failing if another session holds it.
    pub fn acquire(path: &Path) -> Result<Self, TransferError> {
        Self::acquire_with(path, |file| writeln!(file, "{}", std::process::id()))
    }

    /// The lock owns the file as soon as it exists, so a failed `stamp`
    /// removes it again on drop.
    fn acquire_with(
        path: &Path,
        stamp: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<Self, TransferError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(TransferError::SessionBusy {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let lock = Self {
            path: path.to_path_buf(),
            released: false,
        };
        stamp(&mut file)?;
        debug!("acquired {}", path.display());
        Ok(lock)
    }

    /// Removes the lock file. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), TransferError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("released {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
