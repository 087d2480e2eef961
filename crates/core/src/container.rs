//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Parse and build the framed SCV2 binary file: an 8-byte little-endian
//! length prefix, the JSON header, then the sealed body verbatim. Performs
//! no cryptographic validation — that is the sharing engine's job.

use svault_types::{Scv2Header, VaultError, SCV2_MAGIC, SCV2_VERSION};

const LENGTH_PREFIX_LEN: usize = 8;

/// Build the framed file: `header_json_len(u64 LE) || header_json || sealed_body`.
pub fn build(header: &Scv2Header, sealed_body: &[u8]) -> Result<Vec<u8>, VaultError> {
    let header_json = serde_json::to_vec(header)?;
    let len = header_json.len() as u64;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + header_json.len() + sealed_body.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&header_json);
    out.extend_from_slice(sealed_body);
    Ok(out)
}

/// Parse a framed file into its header and sealed body.
pub fn parse(bytes: &[u8]) -> Result<(Scv2Header, &[u8]), VaultError> {
    if bytes.len() < LENGTH_PREFIX_LEN {
        return Err(VaultError::InvalidFormat(
            "file is shorter than the length prefix".to_string(),
        ));
    }
    let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
    len_bytes.copy_from_slice(&bytes[..LENGTH_PREFIX_LEN]);
    let header_len = u64::from_le_bytes(len_bytes) as usize;

    if header_len == 0 {
        return Err(VaultError::InvalidFormat("header length is zero".to_string()));
    }
    if header_len > bytes.len() - LENGTH_PREFIX_LEN {
        return Err(VaultError::InvalidFormat(
            "header length exceeds remaining file length".to_string(),
        ));
    }

    let header_json = &bytes[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + header_len];
    let header: Scv2Header = serde_json::from_slice(header_json)
        .map_err(|e| VaultError::InvalidFormat(format!("malformed header JSON: {e}")))?;

    if header.magic != SCV2_MAGIC {
        return Err(VaultError::InvalidFormat(format!(
            "unexpected magic: {:?}",
            header.magic
        )));
    }
    if header.version != SCV2_VERSION {
        return Err(VaultError::InvalidFormat(format!(
            "unsupported version: {}",
            header.version
        )));
    }

    let sealed_body = &bytes[LENGTH_PREFIX_LEN + header_len..];
    Ok((header, sealed_body))
}
