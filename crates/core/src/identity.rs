//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Generates, loads, updates, and destroys a device's long-term key pair
//! (encryption + signing). Holds no long-term state in memory — every call
//! re-reads from the key store.

use std::time::{SystemTime, UNIX_EPOCH};

use p256::ecdsa::SigningKey;
use p256::PublicKey;
use serde::{Deserialize, Serialize};
use svault_types::{Identity, KeyPairKind, VaultError};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::keystore::SecretStore;
use crate::primitives;

const ACCOUNT_IDENTITY: &str = "identity";
const ACCOUNT_ENC_PRIVATE: &str = "enc-private";
const ACCOUNT_SIGN_PRIVATE: &str = "sign-private";

/// Delegate for hardware-backed P-256 operations (YubiKey, platform secure
/// enclave, PKCS#11 token, …). A software-only stub ships for environments
/// with no enrolled hardware; both variants expose the same
/// `shared_secret`/`sign` surface per the identity model's invariant.
pub trait HardwareKeyBackend: Send + Sync {
    /// Whether this device currently exposes a usable hardware-backed
    /// identity slot.
    fn is_available(&self) -> bool;

    /// Generate a hardware-backed encryption key pair, returning the
    /// backend's opaque handle blob and the public point.
    fn generate_encryption_keypair(&self) -> Result<(Vec<u8>, [u8; 65]), VaultError>;

    /// Generate a hardware-backed signing key pair.
    fn generate_signing_keypair(&self) -> Result<(Vec<u8>, [u8; 65]), VaultError>;

    /// ECDH against the holder of `handle`.
    fn ecdh(&self, handle: &[u8], peer_public: &PublicKey) -> Result<Zeroizing<[u8; 32]>, VaultError>;

    /// ECDSA-P256 sign with the holder of `handle`.
    fn sign(&self, handle: &[u8], payload: &[u8]) -> Result<Vec<u8>, VaultError>;
}

/// No hardware enrolled: reports unavailable and refuses every operation.
/// `IdentityService::generate` falls back to software keys whenever this
/// backend (or any other reporting `is_available() == false`) is in use.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableHardwareBackend;

impl HardwareKeyBackend for UnavailableHardwareBackend {
    fn is_available(&self) -> bool {
        false
    }

    fn generate_encryption_keypair(&self) -> Result<(Vec<u8>, [u8; 65]), VaultError> {
        Err(VaultError::KeyGenerationFailed(
            "no hardware-backed key backend is available".to_string(),
        ))
    }

    fn generate_signing_keypair(&self) -> Result<(Vec<u8>, [u8; 65]), VaultError> {
        Err(VaultError::KeyGenerationFailed(
            "no hardware-backed key backend is available".to_string(),
        ))
    }

    fn ecdh(&self, _handle: &[u8], _peer_public: &PublicKey) -> Result<Zeroizing<[u8; 32]>, VaultError> {
        Err(VaultError::KeyGenerationFailed(
            "no hardware-backed key backend is available".to_string(),
        ))
    }

    fn sign(&self, _handle: &[u8], _payload: &[u8]) -> Result<Vec<u8>, VaultError> {
        Err(VaultError::KeyGenerationFailed(
            "no hardware-backed key backend is available".to_string(),
        ))
    }
}

/// A private key, either an opaque hardware-bound handle or a 32-byte
/// software scalar. Never copied beyond the owning `KeyPair`'s lifetime.
pub enum PrivateKey {
    Software(Zeroizing<[u8; 32]>),
    Hardware(Zeroizing<Vec<u8>>),
}

/// The identity plus its two private keys, resident only in memory.
pub struct KeyPair {
    pub identity: Identity,
    pub kind: KeyPairKind,
    encryption_private: PrivateKey,
    signing_private: PrivateKey,
}

impl KeyPair {
    pub fn encryption_public_key(&self) -> &[u8] {
        &self.identity.encryption_public_key
    }

    pub fn signing_public_key(&self) -> &[u8] {
        &self.identity.signing_public_key
    }

    /// ECDH between this key pair's encryption private key and `peer_public`.
    /// Identical in shape whether the private key is hardware- or
    /// software-backed.
    pub fn shared_secret(
        &self,
        peer_public: &PublicKey,
        backend: &dyn HardwareKeyBackend,
    ) -> Result<Zeroizing<[u8; 32]>, VaultError> {
        match &self.encryption_private {
            PrivateKey::Software(scalar) => {
                let secret = primitives::decode_secret_key(scalar)?;
                Ok(primitives::ecdh(&secret, peer_public))
            }
            PrivateKey::Hardware(handle) => backend.ecdh(handle, peer_public),
        }
    }

    /// ECDSA-P256 sign with this key pair's signing private key.
    pub fn sign(&self, payload: &[u8], backend: &dyn HardwareKeyBackend) -> Result<Vec<u8>, VaultError> {
        match &self.signing_private {
            PrivateKey::Software(scalar) => {
                let secret = primitives::decode_secret_key(scalar)?;
                let signing_key = SigningKey::from(secret);
                Ok(primitives::sign(&signing_key, payload))
            }
            PrivateKey::Hardware(handle) => backend.sign(handle, payload),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    identity: Identity,
    kind: KeyPairKind,
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after 1970-01-01")
        .as_secs()
}

/// Generates, loads, updates, and destroys a device's long-term key pair.
pub struct IdentityService<S: SecretStore, H: HardwareKeyBackend> {
    store: S,
    hardware: H,
}

impl<S: SecretStore, H: HardwareKeyBackend> IdentityService<S, H> {
    pub fn new(store: S, hardware: H) -> Self {
        Self { store, hardware }
    }

    /// Produce fresh encryption and signing key pairs, hardware-backed when
    /// available, software otherwise. Persists atomically: if any of the
    /// three items fails to save, every already-written item is removed and
    /// the call fails with `IdentityInit`.
    pub fn generate(&self, display_name: &str) -> Result<Identity, VaultError> {
        let (kind, enc_handle, enc_public, sign_handle, sign_public) = if self.hardware.is_available() {
            let (enc_handle, enc_public) = self.hardware.generate_encryption_keypair()?;
            let (sign_handle, sign_public) = self.hardware.generate_signing_keypair()?;
            (KeyPairKind::Hardware, enc_handle, enc_public, sign_handle, sign_public)
        } else {
            let (enc_scalar, enc_public) = primitives::generate_p256_keypair();
            let (sign_scalar, sign_public) = primitives::generate_p256_keypair();
            (
                KeyPairKind::Software,
                enc_scalar.to_vec(),
                enc_public,
                sign_scalar.to_vec(),
                sign_public,
            )
        };

        let identity = Identity {
            user_id: Uuid::new_v4(),
            encryption_public_key: enc_public.to_vec(),
            signing_public_key: sign_public.to_vec(),
            created_at: now_unix_seconds(),
            display_name: display_name.to_string(),
        };
        let descriptor = StoredIdentity {
            identity: identity.clone(),
            kind,
        };

        let persist = || -> Result<(), VaultError> {
            self.store.save(ACCOUNT_ENC_PRIVATE, &enc_handle)?;
            self.store.save(ACCOUNT_SIGN_PRIVATE, &sign_handle)?;
            let descriptor_json = serde_json::to_vec(&descriptor)?;
            self.store.save(ACCOUNT_IDENTITY, &descriptor_json)?;
            Ok(())
        };

        if let Err(e) = persist() {
            tracing::error!(error = %e, "identity generation failed, rolling back partial state");
            let _ = self.store.delete(ACCOUNT_ENC_PRIVATE);
            let _ = self.store.delete(ACCOUNT_SIGN_PRIVATE);
            let _ = self.store.delete(ACCOUNT_IDENTITY);
            return Err(VaultError::IdentityInit(e.to_string()));
        }

        tracing::info!(user_id = %identity.user_id, hardware_backed = matches!(kind, KeyPairKind::Hardware), "identity generated");
        Ok(identity)
    }

    fn load_descriptor(&self) -> Result<StoredIdentity, VaultError> {
        let bytes = self.store.load(ACCOUNT_IDENTITY)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The stored public-only descriptor.
    pub fn load_identity(&self) -> Result<Identity, VaultError> {
        self.load_descriptor().map(|d| d.identity)
    }

    /// Reconstruct both private keys. Does not attempt a silent downgrade
    /// from hardware- to software-backed: if the stored blob is
    /// hardware-shaped but this device's backend cannot use it, a software
    /// reconstruction is only attempted when the blob's own shape (32 raw
    /// bytes) is consistent with a software scalar; otherwise the call
    /// fails outright.
    pub fn load_key_pair(&self) -> Result<KeyPair, VaultError> {
        let descriptor = self.load_descriptor()?;
        let enc_blob = self.store.load(ACCOUNT_ENC_PRIVATE)?;
        let sign_blob = self.store.load(ACCOUNT_SIGN_PRIVATE)?;

        let encryption_private = self.reconstruct_private(descriptor.kind, &enc_blob)?;
        let signing_private = self.reconstruct_private(descriptor.kind, &sign_blob)?;

        tracing::info!(user_id = %descriptor.identity.user_id, "key pair loaded");
        Ok(KeyPair {
            identity: descriptor.identity,
            kind: descriptor.kind,
            encryption_private,
            signing_private,
        })
    }

    fn reconstruct_private(&self, kind: KeyPairKind, blob: &[u8]) -> Result<PrivateKey, VaultError> {
        match kind {
            KeyPairKind::Hardware if self.hardware.is_available() => {
                Ok(PrivateKey::Hardware(Zeroizing::new(blob.to_vec())))
            }
            KeyPairKind::Hardware => {
                tracing::warn!("hardware backend unavailable on this device, attempting software reconstruction");
                let scalar: [u8; 32] = blob.try_into().map_err(|_| {
                    VaultError::IdentityInit(
                        "hardware-backed key material is unavailable on this device".to_string(),
                    )
                })?;
                Ok(PrivateKey::Software(Zeroizing::new(scalar)))
            }
            KeyPairKind::Software => {
                let scalar: [u8; 32] = blob
                    .try_into()
                    .map_err(|_| VaultError::IdentityInit("stored software key has unexpected length".to_string()))?;
                Ok(PrivateKey::Software(Zeroizing::new(scalar)))
            }
        }
    }

    /// Re-persist the identity descriptor with a new display name, leaving
    /// all key material untouched.
    pub fn update_display_name(&self, name: &str) -> Result<(), VaultError> {
        let mut descriptor = self.load_descriptor()?;
        descriptor.identity.display_name = name.to_string();
        let bytes = serde_json::to_vec(&descriptor)?;
        self.store.save(ACCOUNT_IDENTITY, &bytes)?;
        tracing::info!("identity display name updated");
        Ok(())
    }

    /// Non-throwing existence probe.
    pub fn has_identity(&self) -> bool {
        self.store.exists(ACCOUNT_IDENTITY)
    }

    /// Best-effort removal of all three persisted items. A missing item is
    /// not an error; every item is attempted regardless of earlier failures,
    /// and the first error encountered (if any) is returned.
    pub fn delete_identity(&self) -> Result<(), VaultError> {
        let results = [
            self.store.delete(ACCOUNT_ENC_PRIVATE),
            self.store.delete(ACCOUNT_SIGN_PRIVATE),
            self.store.delete(ACCOUNT_IDENTITY),
        ];
        tracing::info!("identity deletion attempted");
        for result in results {
            result?;
        }
        Ok(())
    }
}
