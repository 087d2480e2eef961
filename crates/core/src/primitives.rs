//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Cryptographic primitives: AEAD (AES-256-GCM), ECDH (P-256), ECDSA
//! (P-256), HKDF-SHA256, SHA-256, and the CSPRNG.
//!
//! Every function here takes or returns fixed-size arrays, never `Vec<u8>`,
//! so a caller can't pass a buffer of the wrong length. No I/O, no logging —
//! this module is deliberately silent.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use p256::ecdsa::{
    signature::Signer as _, signature::Verifier as _, Signature, SigningKey, VerifyingKey,
};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, PublicKey, SecretKey};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use svault_types::VaultError;
use zeroize::Zeroizing;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const FEK_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
/// `nonce(12) || ciphertext(32) || tag(16)`.
pub const WRAPPED_FEK_LEN: usize = NONCE_LEN + FEK_LEN + TAG_LEN;
/// SEC1 x9.63 uncompressed P-256 point: `0x04 || X(32) || Y(32)`.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Fresh cryptographically-random bytes of fixed length `N`.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// A fresh 32-byte File Encryption Key.
pub fn generate_fek() -> Zeroizing<[u8; FEK_LEN]> {
    Zeroizing::new(random_bytes::<FEK_LEN>())
}

/// Generate a software P-256 key pair for either the encryption or the
/// signing role. Returns the raw 32-byte scalar alongside its public point.
pub fn generate_p256_keypair() -> (Zeroizing<[u8; 32]>, [u8; PUBLIC_KEY_LEN]) {
    let secret = SecretKey::random(&mut OsRng);
    let public = encode_public_key(&secret.public_key());
    (Zeroizing::new(secret.to_bytes().into()), public)
}

/// Encode a P-256 public key as a 65-byte SEC1 uncompressed point.
pub fn encode_public_key(public_key: &PublicKey) -> [u8; PUBLIC_KEY_LEN] {
    let encoded = public_key.to_encoded_point(false);
    let bytes = encoded.as_bytes();
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(bytes);
    out
}

/// Decode a 65-byte SEC1 uncompressed point, rejecting anything that is not
/// a valid point on the P-256 curve.
pub fn decode_public_key(bytes: &[u8]) -> Result<PublicKey, VaultError> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(VaultError::InvalidFormat(format!(
            "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|e| VaultError::InvalidFormat(format!("malformed P-256 point: {e}")))?;
    Option::<PublicKey>::from(PublicKey::from_encoded_point(&encoded))
        .ok_or_else(|| VaultError::InvalidFormat("point is not on the P-256 curve".to_string()))
}

/// Decode a 32-byte scalar into a P-256 secret key.
pub fn decode_secret_key(bytes: &[u8; 32]) -> Result<SecretKey, VaultError> {
    SecretKey::from_bytes(bytes.into())
        .map_err(|e| VaultError::InvalidFormat(format!("invalid P-256 scalar: {e}")))
}

/// ECDH(P-256): the raw shared secret (the x-coordinate of the shared
/// point). By curve commutativity this is identical regardless of which
/// side's secret and which side's public key are passed, as long as they
/// form a matching pair.
pub fn ecdh(secret: &SecretKey, peer_public: &PublicKey) -> Zeroizing<[u8; 32]> {
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer_public.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Zeroizing::new(out)
}

/// HKDF-SHA256 with the given domain-separation `info`, producing a
/// 32-byte key.
pub fn hkdf_sha256(ikm: &[u8], salt: &[u8; SALT_LEN], info: &[u8]) -> Zeroizing<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out)
        .expect("32 bytes is within HKDF-SHA256's output range");
    Zeroizing::new(out)
}

/// Seal `plaintext` with AES-256-GCM under a fresh random 12-byte nonce.
/// Returns `nonce || ciphertext || tag`.
pub fn aead_seal(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    let nonce_bytes = random_bytes::<NONCE_LEN>();
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-256-GCM encryption does not fail for in-memory buffers");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Open a `nonce || ciphertext || tag` buffer produced by [`aead_seal`].
pub fn aead_open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, VaultError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::InvalidFormat(
            "sealed buffer shorter than nonce + tag".to_string(),
        ));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::DecryptionFailed)
}

/// Seal with additional authenticated data that is not itself encrypted.
pub fn aead_seal_with_aad(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let nonce_bytes = random_bytes::<NONCE_LEN>();
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .expect("AES-256-GCM encryption does not fail for in-memory buffers");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Open a buffer produced by [`aead_seal_with_aad`].
pub fn aead_open_with_aad(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::InvalidFormat(
            "sealed buffer shorter than nonce + tag".to_string(),
        ));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| VaultError::DecryptionFailed)
}

/// ECDSA-P256 sign. The signer hashes `payload` with SHA-256 internally,
/// matching the protocol's "sign SHA-256(payload)" step.
pub fn sign(signing_key: &SigningKey, payload: &[u8]) -> Vec<u8> {
    let signature: Signature = signing_key.sign(payload);
    signature.to_der().as_bytes().to_vec()
}

/// ECDSA-P256 verify against a DER-encoded signature.
pub fn verify(verifying_key: &VerifyingKey, payload: &[u8], signature_der: &[u8]) -> bool {
    match Signature::from_der(signature_der) {
        Ok(signature) => verifying_key.verify(payload, &signature).is_ok(),
        Err(_) => false,
    }
}

/// SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// The canonical grant payload signed (and verified) for every FEK block:
/// `file_id(16) || holder_pk || ephemeral_pk || salt || wrapped_fek || ts_LE(8)`.
/// Shared verbatim between block construction and grant verification so the
/// two sides can never drift apart.
pub fn grant_payload(
    file_id: &uuid::Uuid,
    holder_public_key: &[u8],
    ephemeral_public_key: &[u8],
    salt: &[u8],
    wrapped_fek: &[u8],
    timestamp: u64,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + holder_public_key.len() + ephemeral_public_key.len() + salt.len() + wrapped_fek.len() + 8);
    out.extend_from_slice(file_id.as_bytes());
    out.extend_from_slice(holder_public_key);
    out.extend_from_slice(ephemeral_public_key);
    out.extend_from_slice(salt);
    out.extend_from_slice(wrapped_fek);
    out.extend_from_slice(&timestamp.to_le_bytes());
    out
}
