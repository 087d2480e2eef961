//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! End-to-end encrypted file container: identity, sharing, and the SCV2/SCV1
//! codecs.
//!
//! `primitives` is the only module that touches a cryptographic library
//! directly; every other module builds on it. `engine` is the component most
//! callers want: [`engine::encrypt`], [`engine::decrypt`],
//! [`engine::add_recipient`], and [`engine::remove_recipient`] compose the
//! identity, verification, and container modules into the full sharing
//! protocol.

pub mod contacts;
pub mod container;
pub mod engine;
pub mod identity;
pub mod keystore;
pub mod legacy;
pub mod primitives;
pub mod verify;

pub mod prelude {
    pub use crate::contacts::{ContactRegistry, FileContactRegistry, MemoryContactRegistry};
    pub use crate::engine::{add_recipient, decrypt, encrypt, remove_recipient, DecryptedFile};
    pub use crate::identity::{HardwareKeyBackend, IdentityService, KeyPair, UnavailableHardwareBackend};
    pub use crate::keystore::{FileKeyStore, KeyStoreConfig, SecretStore};
    pub use svault_types::prelude::*;
}
