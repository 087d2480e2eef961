//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! The core orchestration: encrypt, decrypt, add recipient, remove
//! recipient. Composes the primitives (C1), the identity key pair (C3), the
//! fingerprint/verification service (C4), and the SCV2 codec (C6).
//!
//! No operation ever partially mutates a file: callers either receive new
//! bytes or an error and unchanged inputs. Every operation emits a single
//! `tracing` line with the file id and block count — never plaintext, never
//! key material.

use std::time::{SystemTime, UNIX_EPOCH};

use svault_types::{BlockKind, FekBlock, Scv2Header, TrustedContact, VaultError, SCV2_MAGIC, SCV2_VERSION};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::container;
use crate::identity::{HardwareKeyBackend, KeyPair};
use crate::primitives;
use crate::verify;

/// HKDF `info` for owner FEK blocks.
const OWNER_INFO: &[u8] = b"SecureCloud-FEK-Owner-v2";
/// HKDF `info` for recipient FEK blocks.
const RECIPIENT_INFO: &[u8] = b"SecureCloud-FEK-Recipient-v2";

/// Staleness window for recipient block timestamps.
const MAX_GRANT_AGE_SECS: i64 = 365 * 24 * 60 * 60;
const MAX_FUTURE_SKEW_SECS: i64 = 300;

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after 1970-01-01")
        .as_secs()
}

fn domain_info(kind: BlockKind) -> &'static [u8] {
    match kind {
        BlockKind::Owner => OWNER_INFO,
        BlockKind::Recipient => RECIPIENT_INFO,
    }
}

/// Build a single FEK block: a fresh ephemeral key pair, a fresh salt, an
/// ECDH+HKDF-wrapped copy of `fek`, and a grant signature from the owner's
/// signing key over the full grant payload.
fn build_block(
    kind: BlockKind,
    fek: &[u8; 32],
    holder_public_key: &[u8],
    owner_signing: &KeyPair,
    hardware: &dyn HardwareKeyBackend,
    file_id: &Uuid,
    timestamp: u64,
) -> Result<FekBlock, VaultError> {
    let holder_public = primitives::decode_public_key(holder_public_key)?;
    let (ephemeral_scalar, ephemeral_public) = primitives::generate_p256_keypair();
    let ephemeral_secret = primitives::decode_secret_key(&ephemeral_scalar)?;
    let salt = primitives::random_bytes::<16>();

    let shared_secret = primitives::ecdh(&ephemeral_secret, &holder_public);
    let wrapping_key = primitives::hkdf_sha256(&*shared_secret, &salt, domain_info(kind));
    let wrapped_fek = primitives::aead_seal(&wrapping_key, fek);

    let payload = primitives::grant_payload(
        file_id,
        holder_public_key,
        &ephemeral_public,
        &salt,
        &wrapped_fek,
        timestamp,
    );
    let signature = owner_signing.sign(&payload, hardware)?;

    Ok(FekBlock {
        block_type: kind,
        holder_public_key: holder_public_key.to_vec(),
        ephemeral_public_key: ephemeral_public.to_vec(),
        salt: salt.to_vec(),
        wrapped_fek,
        timestamp,
        signature,
    })
}

/// Recover the FEK wrapped in `block`, given the private key of the party
/// that holds it.
fn unwrap_fek(
    block: &FekBlock,
    holder: &KeyPair,
    hardware: &dyn HardwareKeyBackend,
) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let ephemeral_public = primitives::decode_public_key(&block.ephemeral_public_key)?;
    let shared_secret = holder.shared_secret(&ephemeral_public, hardware)?;
    let salt: [u8; 16] = block
        .salt
        .clone()
        .try_into()
        .map_err(|_| VaultError::InvalidFormat("FEK block salt is not 16 bytes".to_string()))?;
    let wrapping_key = primitives::hkdf_sha256(&*shared_secret, &salt, domain_info(block.block_type));
    let unwrapped = primitives::aead_open(&wrapping_key, &block.wrapped_fek)?;
    if unwrapped.len() != 32 {
        return Err(VaultError::DecryptionFailed);
    }
    let mut fek = [0u8; 32];
    fek.copy_from_slice(&unwrapped);
    Ok(Zeroizing::new(fek))
}

/// Seal `plaintext` under a fresh FEK, build the owner's grant, and emit
/// the framed SCV2 file.
pub fn encrypt(
    plaintext: &[u8],
    owner: &KeyPair,
    hardware: &dyn HardwareKeyBackend,
    filename: &str,
    content_type: &str,
) -> Result<Vec<u8>, VaultError> {
    let file_id = Uuid::new_v4();
    let fek = primitives::generate_fek();
    let body = primitives::aead_seal(&fek, plaintext);

    let owner_block = build_block(
        BlockKind::Owner,
        &fek,
        owner.encryption_public_key(),
        owner,
        hardware,
        &file_id,
        0,
    )?;

    let header = Scv2Header {
        magic: SCV2_MAGIC.to_string(),
        version: SCV2_VERSION,
        file_id,
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        original_size: plaintext.len() as u64,
        owner_encryption_public_key: owner.encryption_public_key().to_vec(),
        owner_signing_public_key: owner.signing_public_key().to_vec(),
        fek_blocks: vec![owner_block],
    };

    let file_bytes = container::build(&header, &body)?;
    tracing::info!(file_id = %file_id, block_count = 1, "file encrypted");
    Ok(file_bytes)
}

/// Decrypted output of [`decrypt`]: the plaintext and the parsed header.
pub struct DecryptedFile {
    pub plaintext: Vec<u8>,
    pub header: Scv2Header,
}

/// Locate the caller's block, verify its grant, check staleness for
/// recipient blocks, unwrap the FEK, and open the sealed body.
pub fn decrypt(
    file_bytes: &[u8],
    caller: &KeyPair,
    hardware: &dyn HardwareKeyBackend,
) -> Result<DecryptedFile, VaultError> {
    let (header, sealed_body) = container::parse(file_bytes)?;

    let caller_public_key = caller.encryption_public_key();
    let block = if caller_public_key == header.owner_encryption_public_key.as_slice() {
        header.owner_block().ok_or(VaultError::MissingOwnerBlock)?
    } else {
        header
            .block_for_holder(caller_public_key)
            .ok_or(VaultError::NoRecipientBlock)?
    };

    verify::verify_grant(block, &header)?;

    if !block.is_owner() {
        let age = now_unix_seconds() as i64 - block.timestamp as i64;
        if age < -MAX_FUTURE_SKEW_SECS || age >= MAX_GRANT_AGE_SECS {
            return Err(VaultError::ReplayAttackDetected);
        }
    }

    let fek = unwrap_fek(block, caller, hardware)?;
    let plaintext = primitives::aead_open(&fek, sealed_body)?;

    tracing::info!(file_id = %header.file_id, block_count = header.fek_blocks.len(), "file decrypted");
    Ok(DecryptedFile { plaintext, header })
}

/// Grant `recipient_contact` access to an already-encrypted file, without
/// re-encrypting the body. Requires the contact to already be verified.
pub fn add_recipient(
    file_bytes: &[u8],
    recipient_contact: &TrustedContact,
    owner: &KeyPair,
    hardware: &dyn HardwareKeyBackend,
) -> Result<(Vec<u8>, String), VaultError> {
    if !recipient_contact.verification_method.is_verified() {
        return Err(VaultError::ContactNotVerified);
    }

    let (mut header, sealed_body) = container::parse(file_bytes)?;
    let owner_block = header.owner_block().ok_or(VaultError::MissingOwnerBlock)?.clone();
    verify::verify_grant(&owner_block, &header)?;

    let fek = unwrap_fek(&owner_block, owner, hardware)?;

    let recipient_block = build_block(
        BlockKind::Recipient,
        &fek,
        &recipient_contact.encryption_public_key,
        owner,
        hardware,
        &header.file_id,
        now_unix_seconds(),
    )?;

    let safety_code = verify::safety_code(
        &recipient_block.ephemeral_public_key,
        &recipient_contact.encryption_public_key,
    );

    header.fek_blocks.push(recipient_block);
    let new_file_bytes = container::build(&header, sealed_body)?;

    tracing::info!(file_id = %header.file_id, block_count = header.fek_blocks.len(), "recipient added");
    Ok((new_file_bytes, safety_code))
}

/// Revoke a recipient's access. Idempotent: removing a non-existent
/// recipient succeeds without changing the file. Does not re-encrypt the
/// body — any retained copy of the previous bytes is unaffected.
pub fn remove_recipient(
    file_bytes: &[u8],
    recipient_public_key: &[u8],
    owner: &KeyPair,
) -> Result<Vec<u8>, VaultError> {
    let (mut header, sealed_body) = container::parse(file_bytes)?;
    if header.owner_encryption_public_key != owner.encryption_public_key() {
        return Err(VaultError::DecryptionFailed);
    }

    header
        .fek_blocks
        .retain(|b| b.is_owner() || b.holder_public_key != recipient_public_key);

    let new_file_bytes = container::build(&header, sealed_body)?;
    tracing::info!(file_id = %header.file_id, block_count = header.fek_blocks.len(), "recipient removed");
    Ok(new_file_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityService, UnavailableHardwareBackend};
    use crate::keystore::{FileKeyStore, KeyStoreConfig};
    use svault_types::VerificationMethod;
    use tempfile::TempDir;

    fn fresh_key_pair(name: &str) -> (KeyPair, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(KeyStoreConfig {
            base_dir: dir.path().to_path_buf(),
        })
        .unwrap();
        let service = IdentityService::new(store, UnavailableHardwareBackend);
        service.generate(name).unwrap();
        (service.load_key_pair().unwrap(), dir)
    }

    fn contact_for(key_pair: &KeyPair, method: VerificationMethod) -> TrustedContact {
        TrustedContact {
            contact_id: Uuid::new_v4(),
            remote_user_id: key_pair.identity.user_id,
            display_name: key_pair.identity.display_name.clone(),
            encryption_public_key: key_pair.encryption_public_key().to_vec(),
            signing_public_key: key_pair.signing_public_key().to_vec(),
            added_at: 0,
            verified_at: Some(0),
            verification_method: method,
        }
    }

    #[test]
    fn owner_round_trip() {
        let (owner, _dir) = fresh_key_pair("Owner");
        let plaintext = b"Hello, SecureCloud!";
        let file = encrypt(plaintext, &owner, &UnavailableHardwareBackend, "hello.txt", "public.plain-text").unwrap();
        let decrypted = decrypt(&file, &owner, &UnavailableHardwareBackend).unwrap();
        assert_eq!(decrypted.plaintext, plaintext);
        assert_eq!(decrypted.header.filename, "hello.txt");
        assert_eq!(decrypted.header.original_size, plaintext.len() as u64);
    }

    #[test]
    fn large_payload_round_trip() {
        let (owner, _dir) = fresh_key_pair("Owner");
        let plaintext = vec![0x42u8; 2 * 1024 * 1024];
        let file = encrypt(&plaintext, &owner, &UnavailableHardwareBackend, "big.bin", "application/octet-stream").unwrap();
        let decrypted = decrypt(&file, &owner, &UnavailableHardwareBackend).unwrap();
        assert_eq!(decrypted.plaintext, plaintext);
    }

    #[test]
    fn empty_payload_round_trip() {
        let (owner, _dir) = fresh_key_pair("Owner");
        let file = encrypt(b"", &owner, &UnavailableHardwareBackend, "empty.bin", "application/octet-stream").unwrap();
        let decrypted = decrypt(&file, &owner, &UnavailableHardwareBackend).unwrap();
        assert_eq!(decrypted.plaintext, Vec::<u8>::new());
    }

    #[test]
    fn share_round_trip_yields_two_blocks() {
        let (owner, _odir) = fresh_key_pair("Owner");
        let (recipient, _rdir) = fresh_key_pair("Recipient");
        let contact = contact_for(&recipient, VerificationMethod::QrScan);

        let file = encrypt(b"shared secret payload", &owner, &UnavailableHardwareBackend, "share.pdf", "com.adobe.pdf").unwrap();
        let (shared_file, safety_code) = add_recipient(&file, &contact, &owner, &UnavailableHardwareBackend).unwrap();

        let decrypted = decrypt(&shared_file, &recipient, &UnavailableHardwareBackend).unwrap();
        assert_eq!(decrypted.plaintext, b"shared secret payload");
        assert_eq!(decrypted.header.fek_blocks.len(), 2);
        assert_eq!(
            decrypted.header.fek_blocks.iter().filter(|b| !b.is_owner()).count(),
            1
        );
        assert_eq!(safety_code.len(), 9);
    }

    #[test]
    fn safety_code_matches_independent_computation() {
        let (owner, _odir) = fresh_key_pair("Owner");
        let (recipient, _rdir) = fresh_key_pair("Recipient");
        let contact = contact_for(&recipient, VerificationMethod::SafetyNumber);

        let file = encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
        let (shared_file, safety_code) = add_recipient(&file, &contact, &owner, &UnavailableHardwareBackend).unwrap();
        let (header, _body) = container::parse(&shared_file).unwrap();
        let recipient_block = header.fek_blocks.iter().find(|b| !b.is_owner()).unwrap();

        let recomputed = verify::safety_code(&recipient_block.ephemeral_public_key, &contact.encryption_public_key);
        assert_eq!(safety_code, recomputed);
    }

    #[test]
    fn wrong_identity_has_no_access() {
        let (owner, _odir) = fresh_key_pair("Owner");
        let (stranger, _sdir) = fresh_key_pair("Stranger");
        let file = encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
        assert!(matches!(
            decrypt(&file, &stranger, &UnavailableHardwareBackend),
            Err(VaultError::NoRecipientBlock)
        ));
    }

    #[test]
    fn tampered_signature_is_detected() {
        let (owner, _dir) = fresh_key_pair("Owner");
        let file = encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
        let (mut header, body) = container::parse(&file).unwrap();
        header.fek_blocks[0].signature[0] ^= 0xFF;
        let tampered = container::build(&header, body).unwrap();
        assert!(matches!(
            decrypt(&tampered, &owner, &UnavailableHardwareBackend),
            Err(VaultError::SignatureVerificationFailed)
        ));
    }

    #[test]
    fn unverified_contact_is_rejected_and_leaves_input_unchanged() {
        let (owner, _odir) = fresh_key_pair("Owner");
        let (recipient, _rdir) = fresh_key_pair("Recipient");
        let contact = contact_for(&recipient, VerificationMethod::Unverified);

        let file = encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
        let original = file.clone();
        let result = add_recipient(&file, &contact, &owner, &UnavailableHardwareBackend);
        assert!(matches!(result, Err(VaultError::ContactNotVerified)));
        assert_eq!(file, original);
    }

    #[test]
    fn remove_recipient_revokes_access_and_keeps_owner_access() {
        let (owner, _odir) = fresh_key_pair("Owner");
        let (recipient, _rdir) = fresh_key_pair("Recipient");
        let contact = contact_for(&recipient, VerificationMethod::QrScan);

        let file = encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
        let (shared_file, _code) = add_recipient(&file, &contact, &owner, &UnavailableHardwareBackend).unwrap();
        let removed = remove_recipient(&shared_file, &recipient.encryption_public_key().to_vec(), &owner).unwrap();

        let (header, _body) = container::parse(&removed).unwrap();
        assert_eq!(header.fek_blocks.len(), 1);
        assert!(header.fek_blocks[0].is_owner());

        assert!(matches!(
            decrypt(&removed, &recipient, &UnavailableHardwareBackend),
            Err(VaultError::NoRecipientBlock)
        ));
        let owner_decrypted = decrypt(&removed, &owner, &UnavailableHardwareBackend).unwrap();
        assert_eq!(owner_decrypted.plaintext, b"payload");
    }

    #[test]
    fn removal_of_nonexistent_recipient_is_idempotent() {
        let (owner, _dir) = fresh_key_pair("Owner");
        let file = encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
        let removed = remove_recipient(&file, &[0u8; 65], &owner).unwrap();
        let (original_header, _) = container::parse(&file).unwrap();
        let (removed_header, _) = container::parse(&removed).unwrap();
        assert_eq!(original_header.fek_blocks.len(), removed_header.fek_blocks.len());
    }
}
