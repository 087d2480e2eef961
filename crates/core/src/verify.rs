//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Derives fingerprints, safety codes, and QR payloads; validates incoming
//! identities; verifies grant signatures. Pure functions throughout — no
//! I/O, no logging.

use p256::ecdsa::VerifyingKey;
use subtle::ConstantTimeEq;
use svault_types::{FekBlock, Identity, QrIdentityPayload, Scv2Header, VaultError};

use crate::primitives;

/// `SHA-256(enc_pk || sign_pk)` — the raw 32-byte fingerprint.
pub fn fingerprint_bytes(identity: &Identity) -> [u8; 32] {
    let mut buf = Vec::with_capacity(identity.encryption_public_key.len() + identity.signing_public_key.len());
    buf.extend_from_slice(&identity.encryption_public_key);
    buf.extend_from_slice(&identity.signing_public_key);
    primitives::sha256(&buf)
}

fn hex_grouped(bytes: &[u8], group_separator: &str) -> String {
    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    hex.chunks(2)
        .map(|pair| pair.concat())
        .collect::<Vec<_>>()
        .join(group_separator)
}

/// Uppercase-hex of the first 16 bytes of the fingerprint, grouped 4 chars
/// with a space: 8 groups of 4 hex chars, 39 characters total.
pub fn full_fingerprint(identity: &Identity) -> String {
    let bytes = fingerprint_bytes(identity);
    hex_grouped(&bytes[..16], " ")
}

/// Uppercase-hex of the first 8 bytes, grouped 4 chars with `-`: 19 characters.
pub fn short_fingerprint(identity: &Identity) -> String {
    let bytes = fingerprint_bytes(identity);
    hex_grouped(&bytes[..8], "-")
}

/// XOR-fold both parties' 32-byte fingerprints into 4 bytes, formatted as
/// two 4-char hex groups separated by a space.
pub fn cross_fingerprint(me: &Identity, them: &Identity) -> String {
    let mine = fingerprint_bytes(me);
    let theirs = fingerprint_bytes(them);
    let mut out = [0u8; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let mut folded = 0u8;
        for j in 0..8 {
            let idx = (i * 8 + j) % 32;
            folded ^= mine[idx] ^ theirs[idx];
        }
        *slot = folded;
    }
    hex_grouped(&out, " ")
}

/// Compare two fingerprint-shaped byte strings in constant time, for use on
/// any verification path that compares caller-controlled bytes against a
/// value derived from secret material.
pub fn fingerprints_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// `SHA-256(ephemeral_pk || recipient_pk)[..4]`, uppercase hex, two 4-char
/// groups separated by a space — nine characters total. Used identically by
/// the sharing engine and by any caller independently re-deriving the code
/// for out-of-band confirmation.
pub fn safety_code(ephemeral_public_key: &[u8], recipient_public_key: &[u8]) -> String {
    let mut buf = Vec::with_capacity(ephemeral_public_key.len() + recipient_public_key.len());
    buf.extend_from_slice(ephemeral_public_key);
    buf.extend_from_slice(recipient_public_key);
    let digest = primitives::sha256(&buf);
    hex_grouped(&digest[..4], " ")
}

/// Verify a FEK block's grant signature against the header's owner signing
/// key. Any failure — a malformed key, a malformed signature, or a
/// signature that does not verify — produces `SignatureVerificationFailed`,
/// never `InvalidFormat`, so callers can't distinguish parsing failures from
/// cryptographic ones on this path.
pub fn verify_grant(block: &FekBlock, header: &Scv2Header) -> Result<(), VaultError> {
    let owner_verifying_key = decode_verifying_key(&header.owner_signing_public_key)
        .ok_or(VaultError::SignatureVerificationFailed)?;
    let payload = primitives::grant_payload(
        &header.file_id,
        &block.holder_public_key,
        &block.ephemeral_public_key,
        &block.salt,
        &block.wrapped_fek,
        block.timestamp,
    );
    if primitives::verify(&owner_verifying_key, &payload, &block.signature) {
        Ok(())
    } else {
        Err(VaultError::SignatureVerificationFailed)
    }
}

fn decode_verifying_key(bytes: &[u8]) -> Option<VerifyingKey> {
    let public_key = primitives::decode_public_key(bytes).ok()?;
    Some(VerifyingKey::from(public_key))
}

/// Encode an identity as the JSON payload exchanged via QR code.
pub fn qr_for(identity: &Identity) -> QrIdentityPayload {
    QrIdentityPayload {
        user_id: identity.user_id,
        encryption_public_key: identity.encryption_public_key.clone(),
        signing_public_key: identity.signing_public_key.clone(),
        display_name: identity.display_name.clone(),
    }
}

/// Decode a QR payload into an `Identity`, validating that both public keys
/// are valid P-256 points before constructing it.
pub fn identity_from_qr(payload: &QrIdentityPayload) -> Result<Identity, VaultError> {
    primitives::decode_public_key(&payload.encryption_public_key)?;
    primitives::decode_public_key(&payload.signing_public_key)?;
    Ok(Identity {
        user_id: payload.user_id,
        encryption_public_key: payload.encryption_public_key.clone(),
        signing_public_key: payload.signing_public_key.clone(),
        created_at: 0,
        display_name: payload.display_name.clone(),
    })
}
