//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Data model shared by the container codecs, the sharing engine, the
//! identity service, and the contact registry. No cryptographic logic lives
//! here — only shapes, serde, and construction-time validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A P-256 point, x9.63 uncompressed encoding: `0x04 || X(32) || Y(32)`.
pub const PUBLIC_KEY_LEN: usize = 65;
/// HKDF salt length used throughout the FEK-wrapping protocol.
pub const SALT_LEN: usize = 16;
/// `nonce(12) || ciphertext(32) || tag(16)` — a wrapped 32-byte FEK.
pub const WRAPPED_FEK_LEN: usize = 60;

pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// How a trusted contact's identity was authenticated out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationMethod {
    QrScan,
    SafetyNumber,
    Unverified,
}

impl VerificationMethod {
    /// `true` for any out-of-band-confirmed method; `false` for `Unverified`.
    pub fn is_verified(self) -> bool {
        !matches!(self, VerificationMethod::Unverified)
    }
}

/// A device's long-term identity: its public keys and descriptive metadata.
///
/// Private key material is never a field of this type — see `KeyPairKind`
/// and the secret-holding key pair type in the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    #[serde(with = "base64_bytes")]
    pub encryption_public_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub signing_public_key: Vec<u8>,
    pub created_at: u64,
    pub display_name: String,
}

/// Tag distinguishing an opaque hardware-bound private key from a software
/// scalar. Never exposed beyond "is hardware-backed?" to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPairKind {
    Hardware,
    Software,
}

/// Local record of a remote identity, plus this device's verification state
/// for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedContact {
    pub contact_id: Uuid,
    pub remote_user_id: Uuid,
    pub display_name: String,
    #[serde(with = "base64_bytes")]
    pub encryption_public_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub signing_public_key: Vec<u8>,
    pub added_at: u64,
    pub verified_at: Option<u64>,
    pub verification_method: VerificationMethod,
}

impl TrustedContact {
    /// Project this contact as a read-only `Identity` view. A pure
    /// derivation, not ownership — there is no back-reference the other way.
    pub fn as_identity(&self) -> Identity {
        Identity {
            user_id: self.remote_user_id,
            encryption_public_key: self.encryption_public_key.clone(),
            signing_public_key: self.signing_public_key.clone(),
            created_at: self.added_at,
            display_name: self.display_name.clone(),
        }
    }
}

/// Which holder a FEK block authorizes: the file's creator, or a recipient
/// it was later shared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Owner,
    Recipient,
}

/// A per-holder FEK grant: cryptographic evidence that `holder_public_key`
/// was authorized by the file's owner to unwrap this file's FEK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FekBlock {
    #[serde(rename = "blockType")]
    pub block_type: BlockKind,
    #[serde(rename = "holderPublicKeyData", with = "base64_bytes")]
    pub holder_public_key: Vec<u8>,
    #[serde(rename = "ephemeralPublicKeyData", with = "base64_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    #[serde(rename = "wrappedFEKCombined", with = "base64_bytes")]
    pub wrapped_fek: Vec<u8>,
    pub timestamp: u64,
    #[serde(rename = "signatureData", with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl FekBlock {
    /// `true` for the owner block (`timestamp == 0` by construction).
    pub fn is_owner(&self) -> bool {
        matches!(self.block_type, BlockKind::Owner)
    }
}

/// Magic bytes identifying an SCV2 container header.
pub const SCV2_MAGIC: &str = "SCV2";
/// The only SCV2 version this crate writes or accepts.
pub const SCV2_VERSION: u32 = 2;

/// The SCV2 container header: everything except the sealed body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scv2Header {
    pub magic: String,
    pub version: u32,
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(rename = "originalSize")]
    pub original_size: u64,
    #[serde(rename = "ownerEncryptionPublicKeyData", with = "base64_bytes")]
    pub owner_encryption_public_key: Vec<u8>,
    #[serde(rename = "ownerSigningPublicKeyData", with = "base64_bytes")]
    pub owner_signing_public_key: Vec<u8>,
    #[serde(rename = "fekBlocks")]
    pub fek_blocks: Vec<FekBlock>,
}

impl Scv2Header {
    /// The unique block whose `holder_public_key` matches `public_key`.
    pub fn block_for_holder(&self, public_key: &[u8]) -> Option<&FekBlock> {
        self.fek_blocks
            .iter()
            .find(|b| b.holder_public_key == public_key)
    }

    /// The file's owner block. A well-formed header has exactly one.
    pub fn owner_block(&self) -> Option<&FekBlock> {
        self.fek_blocks.iter().find(|b| b.is_owner())
    }
}

/// The JSON payload embedded in a QR code when exchanging identities
/// out-of-band, per the trusted-contact verification flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrIdentityPayload {
    #[serde(rename = "user_id")]
    pub user_id: Uuid,
    #[serde(rename = "encPK", with = "base64_bytes")]
    pub encryption_public_key: Vec<u8>,
    #[serde(rename = "signPK", with = "base64_bytes")]
    pub signing_public_key: Vec<u8>,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_method_is_verified() {
        assert!(!VerificationMethod::Unverified.is_verified());
        assert!(VerificationMethod::QrScan.is_verified());
        assert!(VerificationMethod::SafetyNumber.is_verified());
    }

    #[test]
    fn contact_as_identity_projects_fields() {
        let contact = TrustedContact {
            contact_id: Uuid::new_v4(),
            remote_user_id: Uuid::new_v4(),
            display_name: "Alice".to_string(),
            encryption_public_key: vec![1; PUBLIC_KEY_LEN],
            signing_public_key: vec![2; PUBLIC_KEY_LEN],
            added_at: 1000,
            verified_at: Some(2000),
            verification_method: VerificationMethod::QrScan,
        };
        let identity = contact.as_identity();
        assert_eq!(identity.user_id, contact.remote_user_id);
        assert_eq!(identity.encryption_public_key, contact.encryption_public_key);
        assert_eq!(identity.display_name, "Alice");
    }

    #[test]
    fn header_finds_owner_and_holder_blocks() {
        let owner_key = vec![9u8; PUBLIC_KEY_LEN];
        let recipient_key = vec![7u8; PUBLIC_KEY_LEN];
        let header = Scv2Header {
            magic: SCV2_MAGIC.to_string(),
            version: SCV2_VERSION,
            file_id: Uuid::new_v4(),
            filename: "f.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            original_size: 0,
            owner_encryption_public_key: owner_key.clone(),
            owner_signing_public_key: owner_key.clone(),
            fek_blocks: vec![
                FekBlock {
                    block_type: BlockKind::Owner,
                    holder_public_key: owner_key.clone(),
                    ephemeral_public_key: vec![1; PUBLIC_KEY_LEN],
                    salt: vec![0; SALT_LEN],
                    wrapped_fek: vec![0; WRAPPED_FEK_LEN],
                    timestamp: 0,
                    signature: vec![0; 70],
                },
                FekBlock {
                    block_type: BlockKind::Recipient,
                    holder_public_key: recipient_key.clone(),
                    ephemeral_public_key: vec![2; PUBLIC_KEY_LEN],
                    salt: vec![1; SALT_LEN],
                    wrapped_fek: vec![1; WRAPPED_FEK_LEN],
                    timestamp: 12345,
                    signature: vec![0; 70],
                },
            ],
        };
        assert!(header.owner_block().is_some());
        assert_eq!(header.block_for_holder(&recipient_key).unwrap().timestamp, 12345);
        assert!(header.block_for_holder(&[0u8; PUBLIC_KEY_LEN]).is_none());
    }

    #[test]
    fn header_round_trips_through_json() {
        let header = Scv2Header {
            magic: SCV2_MAGIC.to_string(),
            version: SCV2_VERSION,
            file_id: Uuid::new_v4(),
            filename: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            original_size: 42,
            owner_encryption_public_key: vec![3; PUBLIC_KEY_LEN],
            owner_signing_public_key: vec![4; PUBLIC_KEY_LEN],
            fek_blocks: vec![],
        };
        let json = serde_json::to_string(&header).unwrap();
        assert!(json.contains("\"fekBlocks\""));
        let back: Scv2Header = serde_json::from_str(&json).unwrap();
        assert_eq!(back.file_id, header.file_id);
        assert_eq!(back.owner_encryption_public_key, header.owner_encryption_public_key);
    }
}
