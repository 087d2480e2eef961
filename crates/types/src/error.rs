//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Unified error hierarchy for the SecureVault container and its services.

use thiserror::Error;

/// Top-level error type shared by the container codecs, the sharing engine,
/// the identity service, and the contact registry.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("invalid container format: {0}")]
    InvalidFormat(String),

    #[error("container is missing its owner block")]
    MissingOwnerBlock,

    #[error("no block in this container grants access to the caller's identity")]
    NoRecipientBlock,

    #[error("grant signature verification failed")]
    SignatureVerificationFailed,

    #[error("replay attack detected: recipient block timestamp is out of the trust window")]
    ReplayAttackDetected,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("recipient contact has not been verified")]
    ContactNotVerified,

    #[error("no identity has been provisioned on this device")]
    IdentityNotFound,

    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("identity initialization failed: {0}")]
    IdentityInit(String),

    #[error("key store operation failed: {0}")]
    KeyStore(String),

    #[error("contact not found: {0}")]
    ContactNotFound(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
