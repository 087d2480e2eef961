//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Opaque persistence of private-key blobs and identity metadata, scoped to
//! the device. Two backends ship: the OS secret store (production) and a
//! permission-restricted file directory (tests, and platforms without a
//! keyring).

use std::fs;
use std::path::PathBuf;

use svault_types::VaultError;

/// Opaque key/value persistence keyed by an account string. Accounts are
/// opaque strings, values are opaque blobs; `load` fails when the account
/// does not exist.
pub trait SecretStore: Send + Sync {
    fn save(&self, account: &str, bytes: &[u8]) -> Result<(), VaultError>;
    fn load(&self, account: &str) -> Result<Vec<u8>, VaultError>;
    fn delete(&self, account: &str) -> Result<(), VaultError>;
    fn exists(&self, account: &str) -> bool;
}

/// Configuration for [`FileKeyStore`]: a single base directory, not an
/// environment variable or CLI flag.
#[derive(Debug, Clone)]
pub struct KeyStoreConfig {
    pub base_dir: PathBuf,
}

/// A directory of permission-restricted files, one per account. Used in
/// tests and on platforms without an OS keyring.
pub struct FileKeyStore {
    config: KeyStoreConfig,
}

impl FileKeyStore {
    pub fn new(config: KeyStoreConfig) -> Result<Self, VaultError> {
        fs::create_dir_all(&config.base_dir)
            .map_err(|e| VaultError::KeyStore(format!("failed to create key store directory: {e}")))?;
        Ok(Self { config })
    }

    fn path_for(&self, account: &str) -> PathBuf {
        self.config.base_dir.join(account)
    }
}

impl SecretStore for FileKeyStore {
    fn save(&self, account: &str, bytes: &[u8]) -> Result<(), VaultError> {
        tracing::debug!(account, "saving key material to file store");
        let path = self.path_for(account);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .map_err(|e| VaultError::KeyStore(format!("failed to open {account}: {e}")))?;
            use std::io::Write;
            file.write_all(bytes)
                .map_err(|e| VaultError::KeyStore(format!("failed to write {account}: {e}")))?;
        }
        #[cfg(not(unix))]
        {
            fs::write(&path, bytes)
                .map_err(|e| VaultError::KeyStore(format!("failed to write {account}: {e}")))?;
        }
        Ok(())
    }

    fn load(&self, account: &str) -> Result<Vec<u8>, VaultError> {
        let path = self.path_for(account);
        if !path.exists() {
            tracing::warn!(account, "key material not found in file store");
            return Err(VaultError::IdentityNotFound);
        }
        fs::read(&path).map_err(|e| VaultError::KeyStore(format!("failed to read {account}: {e}")))
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        tracing::debug!(account, "deleting key material from file store");
        let path = self.path_for(account);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path)
            .map_err(|e| VaultError::KeyStore(format!("failed to delete {account}: {e}")))
    }

    fn exists(&self, account: &str) -> bool {
        self.path_for(account).exists()
    }
}

/// The OS secret store (Keychain / Secret Service / Credential Manager),
/// via the `keyring` crate. This is the production `SecretStore`.
#[cfg(feature = "keyring")]
pub struct OsKeyringStore {
    service: String,
}

#[cfg(feature = "keyring")]
impl OsKeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[cfg(feature = "keyring")]
impl SecretStore for OsKeyringStore {
    fn save(&self, account: &str, bytes: &[u8]) -> Result<(), VaultError> {
        tracing::debug!(account, service = %self.service, "saving key material to OS keyring");
        let entry = keyring::Entry::new(&self.service, account)
            .map_err(|e| VaultError::KeyStore(format!("failed to open keyring entry: {e}")))?;
        entry
            .set_password(&encode_blob(bytes))
            .map_err(|e| VaultError::KeyStore(format!("failed to save to keyring: {e}")))
    }

    fn load(&self, account: &str) -> Result<Vec<u8>, VaultError> {
        let entry = keyring::Entry::new(&self.service, account)
            .map_err(|e| VaultError::KeyStore(format!("failed to open keyring entry: {e}")))?;
        let encoded = entry.get_password().map_err(|e| {
            tracing::warn!(account, "key material not found in OS keyring");
            match e {
                keyring::Error::NoEntry => VaultError::IdentityNotFound,
                other => VaultError::KeyStore(format!("failed to load from keyring: {other}")),
            }
        })?;
        decode_blob(&encoded)
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        tracing::debug!(account, service = %self.service, "deleting key material from OS keyring");
        let entry = keyring::Entry::new(&self.service, account)
            .map_err(|e| VaultError::KeyStore(format!("failed to open keyring entry: {e}")))?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::KeyStore(format!("failed to delete from keyring: {e}"))),
        }
    }

    fn exists(&self, account: &str) -> bool {
        keyring::Entry::new(&self.service, account)
            .and_then(|entry| entry.get_password())
            .is_ok()
    }
}

/// The OS keyring stores passwords as UTF-8 strings; key material is
/// arbitrary bytes, so it is base64-encoded before `set_password` and
/// decoded after `get_password`.
#[cfg(feature = "keyring")]
fn encode_blob(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD.encode(bytes)
}

#[cfg(feature = "keyring")]
fn decode_blob(encoded: &str) -> Result<Vec<u8>, VaultError> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    STANDARD
        .decode(encoded)
        .map_err(|e| VaultError::KeyStore(format!("corrupt keyring entry: {e}")))
}
