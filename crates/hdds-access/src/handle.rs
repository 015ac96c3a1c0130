// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Permissions handle encoding.
//!
//! A permissions handle ties a domain decision to a participant decision in a
//! single opaque 32-bit value:
//!
//! ```text
//!  31            16 15             0
//! +----------------+----------------+
//! | domain handle  | participant    |
//! +----------------+----------------+
//! ```
//!
//! Two values are reserved: `0` is never a valid handle, and `1` means the
//! domain has no matching rule and is treated as open (unsecured). Since
//! domain handle `0` is never issued, `1` cannot collide with a real pair.

use std::fmt;

use crate::model::Handle;

/// Opaque handle returned by permissions validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionsHandle(u32);

impl PermissionsHandle {
    /// Denied / invalid handle.
    pub const INVALID: Self = Self(0);

    /// No domain rule matched: open domain, every check accepts.
    pub const UNSECURED: Self = Self(1);

    /// Pack a domain handle and a participant handle.
    pub const fn encode(domain: u16, participant: u16) -> Self {
        Self(((domain as u32) << 16) | participant as u32)
    }

    /// Split back into `(domain, participant)`.
    ///
    /// Returns `None` for the two reserved values; callers must test for
    /// [`PermissionsHandle::UNSECURED`] before decoding.
    pub const fn decode(self) -> Option<(u16, u16)> {
        if self.0 == Self::INVALID.0 || self.0 == Self::UNSECURED.0 {
            return None;
        }
        Some(((self.0 >> 16) as u16, self.0 as u16))
    }

    /// Build a handle from store handles, rejecting anything that does not
    /// fit in 16 bits.
    pub fn from_handles(domain: Handle, participant: Handle) -> Option<Self> {
        let domain = u16::try_from(domain).ok()?;
        let participant = u16::try_from(participant).ok()?;
        if domain == 0 || participant == 0 {
            return None;
        }
        Some(Self::encode(domain, participant))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_unsecured(self) -> bool {
        self.0 == Self::UNSECURED.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Display for PermissionsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some((domain, participant)) => write!(f, "perm({}:{})", domain, participant),
            None if self.is_unsecured() => f.write_str("perm(unsecured)"),
            None => f.write_str("perm(invalid)"),
        }
    }
}
