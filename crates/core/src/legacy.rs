//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Legacy password-based AEAD container ("SCV1"), used only when no
//! hardware- or software-backed identity has been provisioned on this
//! device. Self-contained: independent of the identity, verification, and
//! sharing components.

use svault_types::VaultError;

use crate::primitives;

const MAGIC: [u8; 4] = *b"SC_V";
const VERSION: u16 = 0x0001;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 4 + 2 + SALT_LEN + NONCE_LEN + 8; // 42
const HKDF_INFO: &[u8] = b"SecureCloud-AES256GCM";

/// Key derivation: `HKDF-SHA256(IKM=utf8(password), salt, info)`.
///
/// A PBKDF2-SHA-256 derivation at 310,000 iterations is an acceptable
/// stronger alternative and is offered as [`derive_key_pbkdf2`]; this crate
/// exposes HKDF as the specified default.
fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> zeroize::Zeroizing<[u8; 32]> {
    primitives::hkdf_sha256(password.as_bytes(), salt, HKDF_INFO)
}

/// Documented optional alternative to [`derive_key`]: PBKDF2-HMAC-SHA256
/// at 310,000 iterations, matching the iteration count named in the
/// protocol this container format was adapted from.
pub fn derive_key_pbkdf2(password: &str, salt: &[u8; SALT_LEN]) -> zeroize::Zeroizing<[u8; 32]> {
    const ITERATIONS: u32 = 310_000;
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), salt, ITERATIONS, &mut out);
    zeroize::Zeroizing::new(out)
}

/// Encrypt `data` under `password`, producing the SCV1 on-disk layout:
/// `magic(4) || version(2) || salt(16) || nonce(12) || original_size(8) || ciphertext || tag(16)`.
pub fn encrypt(data: &[u8], password: &str) -> Vec<u8> {
    let salt = primitives::random_bytes::<SALT_LEN>();
    let key = derive_key(password, &salt);
    let sealed = primitives::aead_seal(&key, data);
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&salt);
    out.extend_from_slice(nonce);
    out.extend_from_slice(&(data.len() as u64).to_le_bytes());
    out.extend_from_slice(ciphertext);
    out
}

/// Decrypt an SCV1 file with `password`. Any pre-AEAD structural failure
/// (too short, bad magic) produces `InvalidFormat`; any AEAD failure
/// produces `DecryptionFailed` — the two are distinguishable.
pub fn decrypt(bytes: &[u8], password: &str) -> Result<Vec<u8>, VaultError> {
    if bytes.len() <= HEADER_LEN {
        return Err(VaultError::InvalidFormat(
            "file is not larger than the SCV1 header".to_string(),
        ));
    }
    if bytes[..4] != MAGIC {
        return Err(VaultError::InvalidFormat("bad SCV1 magic".to_string()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(VaultError::InvalidFormat(format!(
            "unsupported SCV1 version: {version}"
        )));
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&bytes[6..6 + SALT_LEN]);
    let nonce_start = 6 + SALT_LEN;
    let nonce = &bytes[nonce_start..nonce_start + NONCE_LEN];
    let size_start = nonce_start + NONCE_LEN;
    let mut size_bytes = [0u8; 8];
    size_bytes.copy_from_slice(&bytes[size_start..size_start + 8]);
    let _original_size = u64::from_le_bytes(size_bytes);

    let ciphertext = &bytes[HEADER_LEN..];
    let key = derive_key(password, &salt);

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(nonce);
    sealed.extend_from_slice(ciphertext);
    primitives::aead_open(&key, &sealed)
}
