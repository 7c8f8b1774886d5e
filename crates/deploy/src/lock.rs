//! Run-level exclusive lock per (network, account).
//!
//! Two runs that sign for the same account on the same network would race
//! for nonces. Callers take an [`AccountLock`] before building a
//! [`crate::RecipeRunner`]; the runner refuses to exist without one.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use fs2::FileExt;

use crate::{
    error::{Error, Result},
    network::NetworkId,
};

/// Held for as long as the value lives; released on drop.
#[derive(Debug)]
pub struct AccountLock {
    file: File,
    path: PathBuf,
    network: NetworkId,
    account: Address,
}

impl AccountLock {
    /// Take the lock without blocking. Fails with [`Error::AccountBusy`] if
    /// another run holds it.
    pub fn acquire(dir: &Path, network: NetworkId, account: Address) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::io(format!("failed to create lock directory {}: {e}", dir.display()))
        })?;

        let path = dir.join(format!("{network}-{account:#x}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| Error::io(format!("failed to open {}: {e}", path.display())))?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(Error::AccountBusy { network, account });
            }
            return Err(Error::io(format!("failed to lock {}: {e}", path.display())));
        }

        tracing::debug!(path = %path.display(), %network, %account, "Account lock acquired");

        Ok(Self {
            file,
            path,
            network,
            account,
        })
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release account lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    const ACCOUNT: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[test]
    fn test_second_acquire_is_busy() {
        let temp_dir = TempDir::new("helix-lock").expect("Failed to create temp dir");

        let held = AccountLock::acquire(temp_dir.path(), NetworkId(97), ACCOUNT).unwrap();
        let err = AccountLock::acquire(temp_dir.path(), NetworkId(97), ACCOUNT).unwrap_err();
        assert!(matches!(err, Error::AccountBusy { .. }));

        drop(held);
        assert!(AccountLock::acquire(temp_dir.path(), NetworkId(97), ACCOUNT).is_ok());
    }

    #[test]
    fn test_other_network_or_account_is_independent() {
        let temp_dir = TempDir::new("helix-lock").expect("Failed to create temp dir");

        let _bsc = AccountLock::acquire(temp_dir.path(), NetworkId(97), ACCOUNT).unwrap();
        let _rinkeby = AccountLock::acquire(temp_dir.path(), NetworkId(4), ACCOUNT).unwrap();
        let _other = AccountLock::acquire(temp_dir.path(), NetworkId(97), Address::ZERO).unwrap();
    }
}
