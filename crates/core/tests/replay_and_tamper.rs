// Copyright (c) 2025 TRUSTEDGE LABS LLC
// MPL-2.0: https://mozilla.org/MPL/2.0/
// Project: trustedge — Privacy and trust at the edge.

//! Replay and tamper detection on recipient grants, driven by hand-built
//! FEK blocks rather than through `add_recipient`, so the timestamp can be
//! back-dated independently of the wall clock.

use svault_core::container;
use svault_core::engine;
use svault_core::identity::{IdentityService, UnavailableHardwareBackend};
use svault_core::keystore::{FileKeyStore, KeyStoreConfig};
use svault_core::primitives;
use svault_types::{BlockKind, FekBlock, VaultError};
use tempfile::TempDir;

fn key_pair(name: &str) -> (svault_core::identity::KeyPair, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = FileKeyStore::new(KeyStoreConfig {
        base_dir: dir.path().to_path_buf(),
    })
    .unwrap();
    let service = IdentityService::new(store, UnavailableHardwareBackend);
    service.generate(name).unwrap();
    (service.load_key_pair().unwrap(), dir)
}

fn recipient_block(
    owner: &svault_core::identity::KeyPair,
    recipient: &svault_core::identity::KeyPair,
    fek: &[u8; 32],
    file_id: &uuid::Uuid,
    timestamp: u64,
) -> FekBlock {
    let recipient_public = primitives::decode_public_key(recipient.encryption_public_key()).unwrap();
    let (ephemeral_scalar, ephemeral_public) = primitives::generate_p256_keypair();
    let ephemeral_secret = primitives::decode_secret_key(&ephemeral_scalar).unwrap();
    let salt = primitives::random_bytes::<16>();

    let shared_secret = primitives::ecdh(&ephemeral_secret, &recipient_public);
    let wrapping_key = primitives::hkdf_sha256(&shared_secret, &salt, b"SecureCloud-FEK-Recipient-v2");
    let wrapped_fek = primitives::aead_seal(&wrapping_key, fek);

    let payload = primitives::grant_payload(
        file_id,
        recipient.encryption_public_key(),
        &ephemeral_public,
        &salt,
        &wrapped_fek,
        timestamp,
    );
    let signature = owner.sign(&payload, &UnavailableHardwareBackend).unwrap();

    FekBlock {
        block_type: BlockKind::Recipient,
        holder_public_key: recipient.encryption_public_key().to_vec(),
        ephemeral_public_key: ephemeral_public.to_vec(),
        salt: salt.to_vec(),
        wrapped_fek,
        timestamp,
        signature,
    }
}

#[test]
fn validly_signed_but_stale_grant_is_rejected_as_replay() {
    let (owner, _odir) = key_pair("Owner");
    let (recipient, _rdir) = key_pair("Recipient");

    let file = engine::encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
    let (mut header, body) = container::parse(&file).unwrap();
    let owner_block = header.owner_block().unwrap().clone();

    // Recover the FEK the same way decrypt() would, then re-wrap it for the
    // recipient with a timestamp 400 days in the past, signed validly.
    let ephemeral_public = primitives::decode_public_key(&owner_block.ephemeral_public_key).unwrap();
    let shared_secret = owner.shared_secret(&ephemeral_public, &UnavailableHardwareBackend).unwrap();
    let salt: [u8; 16] = owner_block.salt.clone().try_into().unwrap();
    let wrapping_key = primitives::hkdf_sha256(&shared_secret, &salt, b"SecureCloud-FEK-Owner-v2");
    let fek_vec = primitives::aead_open(&wrapping_key, &owner_block.wrapped_fek).unwrap();
    let mut fek = [0u8; 32];
    fek.copy_from_slice(&fek_vec);

    const SECS_PER_DAY: u64 = 24 * 60 * 60;
    let stale_timestamp = 1_700_000_000u64.saturating_sub(400 * SECS_PER_DAY);
    let stale_block = recipient_block(&owner, &recipient, &fek, &header.file_id, stale_timestamp);

    header.fek_blocks.push(stale_block);
    let stale_file = container::build(&header, body).unwrap();

    assert!(matches!(
        engine::decrypt(&stale_file, &recipient, &UnavailableHardwareBackend),
        Err(VaultError::ReplayAttackDetected)
    ));
}

#[test]
fn flipping_any_block_signature_bit_breaks_decryption() {
    let (owner, _dir) = key_pair("Owner");
    let file = engine::encrypt(b"payload", &owner, &UnavailableHardwareBackend, "f", "t").unwrap();
    let (header, body) = container::parse(&file).unwrap();

    for bit in [0u8, 3, 7] {
        let mut tampered_header = header.clone();
        tampered_header.fek_blocks[0].signature[0] ^= 1 << bit;
        let tampered = container::build(&tampered_header, body).unwrap();
        assert!(matches!(
            engine::decrypt(&tampered, &owner, &UnavailableHardwareBackend),
            Err(VaultError::SignatureVerificationFailed)
        ));
    }
}
