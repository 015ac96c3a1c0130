// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Access engine error types

use std::collections::TryReserveError;
use std::fmt;

use crate::model::Handle;

/// Kind of record a handle refers to (used in `NotFound` errors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Domain,
    Participant,
    Topic,
    Partition,
    PermissionsHandle,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Domain => "domain",
            Self::Participant => "participant",
            Self::Topic => "topic rule",
            Self::Partition => "partition rule",
            Self::PermissionsHandle => "permissions handle",
        };
        f.write_str(name)
    }
}

/// Errors returned by the access engine.
///
/// `AccessDenied` is the only variant that represents a security decision;
/// every other variant is an operation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Unknown or stale handle
    #[error("{kind} {handle} not found")]
    NotFound { kind: EntityKind, handle: Handle },

    /// Malformed input (e.g. a wildcard where only names are allowed)
    #[error("Bad parameter: {0}")]
    BadParameter(String),

    /// Allocation failure or handle space exhaustion
    #[error("Out of resources: {0}")]
    OutOfResources(String),

    /// Operation not valid in the current state
    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    /// Well-formed request denied by policy
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Operation not implemented by this plugin
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration or policy document error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Crypto provider or credential failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

impl AccessError {
    pub(crate) fn not_found(kind: EntityKind, handle: Handle) -> Self {
        Self::NotFound { kind, handle }
    }

    pub(crate) fn denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    /// True for [`AccessError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for [`AccessError::AccessDenied`].
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

impl From<TryReserveError> for AccessError {
    fn from(err: TryReserveError) -> Self {
        Self::OutOfResources(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccessError::not_found(EntityKind::Domain, 7);
        assert_eq!(err.to_string(), "domain 7 not found");

        let err = AccessError::denied("blacklisted topic 'a'");
        assert_eq!(err.to_string(), "Access denied: blacklisted topic 'a'");
    }

    #[test]
    fn test_error_predicates() {
        assert!(AccessError::not_found(EntityKind::Topic, 1).is_not_found());
        assert!(AccessError::denied("x").is_access_denied());
        assert!(!AccessError::Unsupported("x".into()).is_access_denied());
    }

    #[test]
    fn test_try_reserve_maps_to_out_of_resources() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert!(matches!(
            AccessError::from(err),
            AccessError::OutOfResources(_)
        ));
    }
}
