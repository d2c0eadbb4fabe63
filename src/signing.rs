/*
signing.rs

Copyright 2025 Hervé Quatremain

This file is part of Boxpool.

Boxpool is free software: you can redistribute it and/or modify it under the
terms of the GNU General Public License as published by the Free Software
Foundation, either version 3 of the License, or (at your option) any later
version.

Boxpool is distributed in the hope that it will be useful, but WITHOUT ANY
WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
A PARTICULAR PURPOSE. See the GNU General Public License for more details.

You should have received a copy of the GNU General Public License along with
Boxpool. If not, see <https://www.gnu.org/licenses/>.

SPDX-License-Identifier: GPL-3.0-or-later
*/

//! Sign and verify submission payloads.
//!
//! The payload binds a result to a user and a puzzle:
//!
//! ```text
//! {user_id}:{puzzle_key}:{steps}:{elapsed_ms}:{moves}
//! ```
//!
//! The code is the lower case hexadecimal form of the HMAC-SHA256 of the payload.

use hmac::{Hmac, Mac, digest::KeyInit};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

use crate::puzzle::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Length of a code in hexadecimal characters.
const CODE_LEN: usize = 64;

#[derive(Debug, Error, PartialEq)]
pub enum SignerError {
    #[error("the signing secret is empty")]
    EmptySecret,

    #[error("the signing secret is not a valid key")]
    InvalidSecret,
}

/// Build the canonical payload string.
///
/// The puzzle segment is the puzzle key for pooled puzzles, and the level number for personal
/// levels. It does not change when the player replays a puzzle that they already solved.
pub fn canonical_payload(
    user: UserId,
    puzzle: &impl fmt::Display,
    steps: u32,
    elapsed_ms: u64,
    moves: &str,
) -> String {
    format!("{user}:{puzzle}:{steps}:{elapsed_ms}:{moves}")
}

/// Keyed signer. The secret never leaves the object.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Signer { .. }")
    }
}

impl Signer {
    /// Create a [`Signer`] object from the shared secret.
    pub fn new(secret: &[u8]) -> Result<Self, SignerError> {
        if secret.is_empty() {
            return Err(SignerError::EmptySecret);
        }
        let mac: HmacSha256 =
            KeyInit::new_from_slice(secret).map_err(|_| SignerError::InvalidSecret)?;
        Ok(Self { mac })
    }

    /// Return the code for the given payload.
    pub fn sign(&self, payload: &str) -> String {
        let mut h: HmacSha256 = self.mac.clone();
        Mac::update(&mut h, payload.as_bytes());
        hex::encode(h.finalize().into_bytes())
    }

    /// Whether the code matches the payload.
    ///
    /// Only the exact lower case form produced by [`Signer::sign`] is accepted. The comparison of
    /// the digests runs in constant time.
    pub fn verify(&self, payload: &str, code: &str) -> bool {
        if code.len() != CODE_LEN || code.bytes().any(|b| b.is_ascii_uppercase()) {
            return false;
        }
        let Ok(tag) = hex::decode(code) else {
            return false;
        };
        let mut h: HmacSha256 = self.mac.clone();
        Mac::update(&mut h, payload.as_bytes());
        h.verify_slice(&tag).is_ok()
    }
}
