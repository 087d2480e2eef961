//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Persistent, ordered set of known remote identities and their
//! verification state. All operations serialize through a single owner —
//! concurrent mutation from multiple callers is forbidden by the interface.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use svault_types::{TrustedContact, VaultError, VerificationMethod};
use uuid::Uuid;

/// A persistent ordered collection of trusted contacts.
pub trait ContactRegistry: Send + Sync {
    fn all(&self) -> Result<Vec<TrustedContact>, VaultError>;
    fn by_id(&self, contact_id: Uuid) -> Result<Option<TrustedContact>, VaultError>;
    fn by_remote_user_id(&self, user_id: Uuid) -> Result<Option<TrustedContact>, VaultError>;
    fn upsert(&self, contact: TrustedContact) -> Result<(), VaultError>;
    fn delete(&self, contact_id: Uuid) -> Result<(), VaultError>;
    fn mark_verified(&self, contact_id: Uuid, method: VerificationMethod) -> Result<(), VaultError>;
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after 1970-01-01")
        .as_secs()
}

/// In-memory registry suitable for embedding behind whatever persistence
/// layer a caller supplies. Serializes all access through a single mutex.
#[derive(Default)]
pub struct MemoryContactRegistry {
    contacts: Mutex<Vec<TrustedContact>>,
}

impl MemoryContactRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContactRegistry for MemoryContactRegistry {
    fn all(&self) -> Result<Vec<TrustedContact>, VaultError> {
        Ok(self.contacts.lock().expect("contact registry mutex poisoned").clone())
    }

    fn by_id(&self, contact_id: Uuid) -> Result<Option<TrustedContact>, VaultError> {
        Ok(self
            .contacts
            .lock()
            .expect("contact registry mutex poisoned")
            .iter()
            .find(|c| c.contact_id == contact_id)
            .cloned())
    }

    fn by_remote_user_id(&self, user_id: Uuid) -> Result<Option<TrustedContact>, VaultError> {
        Ok(self
            .contacts
            .lock()
            .expect("contact registry mutex poisoned")
            .iter()
            .find(|c| c.remote_user_id == user_id)
            .cloned())
    }

    fn upsert(&self, contact: TrustedContact) -> Result<(), VaultError> {
        let mut contacts = self.contacts.lock().expect("contact registry mutex poisoned");
        match contacts.iter_mut().find(|c| c.contact_id == contact.contact_id) {
            Some(existing) => *existing = contact,
            None => contacts.push(contact),
        }
        Ok(())
    }

    fn delete(&self, contact_id: Uuid) -> Result<(), VaultError> {
        let mut contacts = self.contacts.lock().expect("contact registry mutex poisoned");
        contacts.retain(|c| c.contact_id != contact_id);
        Ok(())
    }

    fn mark_verified(&self, contact_id: Uuid, method: VerificationMethod) -> Result<(), VaultError> {
        let mut contacts = self.contacts.lock().expect("contact registry mutex poisoned");
        let contact = contacts
            .iter_mut()
            .find(|c| c.contact_id == contact_id)
            .ok_or_else(|| VaultError::ContactNotFound(contact_id.to_string()))?;
        contact.verified_at = Some(now_unix_seconds());
        contact.verification_method = method;
        Ok(())
    }
}

/// JSON-file-backed registry: atomic write (temp file, then rename) so a
/// crash mid-write never corrupts the file on disk.
pub struct FileContactRegistry {
    path: PathBuf,
    contacts: Mutex<Vec<TrustedContact>>,
}

impl FileContactRegistry {
    pub fn open(path: PathBuf) -> Result<Self, VaultError> {
        let contacts = if path.exists() {
            let bytes = fs::read(&path)
                .map_err(|e| VaultError::KeyStore(format!("failed to read contact registry: {e}")))?;
            serde_json::from_slice(&bytes)?
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            contacts: Mutex::new(contacts),
        })
    }

    fn persist(&self, contacts: &[TrustedContact]) -> Result<(), VaultError> {
        let json = serde_json::to_vec_pretty(contacts)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, json)
            .map_err(|e| VaultError::KeyStore(format!("failed to write contact registry: {e}")))?;
        fs::rename(&tmp_path, &self.path)
            .map_err(|e| VaultError::KeyStore(format!("failed to commit contact registry: {e}")))?;
        tracing::debug!(path = %self.path.display(), "contact registry persisted");
        Ok(())
    }
}

impl ContactRegistry for FileContactRegistry {
    fn all(&self) -> Result<Vec<TrustedContact>, VaultError> {
        Ok(self.contacts.lock().expect("contact registry mutex poisoned").clone())
    }

    fn by_id(&self, contact_id: Uuid) -> Result<Option<TrustedContact>, VaultError> {
        Ok(self
            .contacts
            .lock()
            .expect("contact registry mutex poisoned")
            .iter()
            .find(|c| c.contact_id == contact_id)
            .cloned())
    }

    fn by_remote_user_id(&self, user_id: Uuid) -> Result<Option<TrustedContact>, VaultError> {
        Ok(self
            .contacts
            .lock()
            .expect("contact registry mutex poisoned")
            .iter()
            .find(|c| c.remote_user_id == user_id)
            .cloned())
    }

    fn upsert(&self, contact: TrustedContact) -> Result<(), VaultError> {
        let mut contacts = self.contacts.lock().expect("contact registry mutex poisoned");
        match contacts.iter_mut().find(|c| c.contact_id == contact.contact_id) {
            Some(existing) => *existing = contact,
            None => contacts.push(contact),
        }
        self.persist(&contacts)?;
        tracing::info!("trusted contact upserted");
        Ok(())
    }

    fn delete(&self, contact_id: Uuid) -> Result<(), VaultError> {
        let mut contacts = self.contacts.lock().expect("contact registry mutex poisoned");
        contacts.retain(|c| c.contact_id != contact_id);
        self.persist(&contacts)?;
        tracing::info!("trusted contact deleted");
        Ok(())
    }

    fn mark_verified(&self, contact_id: Uuid, method: VerificationMethod) -> Result<(), VaultError> {
        let mut contacts = self.contacts.lock().expect("contact registry mutex poisoned");
        let contact = contacts
            .iter_mut()
            .find(|c| c.contact_id == contact_id)
            .ok_or_else(|| VaultError::ContactNotFound(contact_id.to_string()))?;
        contact.verified_at = Some(now_unix_seconds());
        contact.verification_method = method;
        self.persist(&contacts)?;
        tracing::info!("trusted contact marked verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contact() -> TrustedContact {
        TrustedContact {
            contact_id: Uuid::new_v4(),
            remote_user_id: Uuid::new_v4(),
            display_name: "Alice".to_string(),
            encryption_public_key: vec![1; 65],
            signing_public_key: vec![2; 65],
            added_at: now_unix_seconds(),
            verified_at: None,
            verification_method: VerificationMethod::Unverified,
        }
    }

    #[test]
    fn memory_registry_upsert_then_lookup() {
        let registry = MemoryContactRegistry::new();
        let contact = sample_contact();
        registry.upsert(contact.clone()).unwrap();
        assert_eq!(registry.all().unwrap().len(), 1);
        assert_eq!(registry.by_id(contact.contact_id).unwrap().unwrap().contact_id, contact.contact_id);
        assert!(registry.by_remote_user_id(contact.remote_user_id).unwrap().is_some());
    }

    #[test]
    fn memory_registry_upsert_replaces_existing() {
        let registry = MemoryContactRegistry::new();
        let mut contact = sample_contact();
        registry.upsert(contact.clone()).unwrap();
        contact.display_name = "Alice Renamed".to_string();
        registry.upsert(contact.clone()).unwrap();
        assert_eq!(registry.all().unwrap().len(), 1);
        assert_eq!(registry.by_id(contact.contact_id).unwrap().unwrap().display_name, "Alice Renamed");
    }

    #[test]
    fn mark_verified_sets_method_and_timestamp() {
        let registry = MemoryContactRegistry::new();
        let contact = sample_contact();
        registry.upsert(contact.clone()).unwrap();
        registry.mark_verified(contact.contact_id, VerificationMethod::QrScan).unwrap();
        let updated = registry.by_id(contact.contact_id).unwrap().unwrap();
        assert!(updated.verified_at.is_some());
        assert_eq!(updated.verification_method, VerificationMethod::QrScan);
    }

    #[test]
    fn delete_removes_contact() {
        let registry = MemoryContactRegistry::new();
        let contact = sample_contact();
        registry.upsert(contact.clone()).unwrap();
        registry.delete(contact.contact_id).unwrap();
        assert!(registry.all().unwrap().is_empty());
    }

    #[test]
    fn file_registry_persists_across_instances() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("contacts.json");
        let contact = sample_contact();
        {
            let registry = FileContactRegistry::open(path.clone()).unwrap();
            registry.upsert(contact.clone()).unwrap();
        }
        let reopened = FileContactRegistry::open(path).unwrap();
        assert_eq!(reopened.all().unwrap().len(), 1);
        assert_eq!(reopened.by_id(contact.contact_id).unwrap().unwrap().display_name, "Alice");
    }
}
