// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule database records.
//!
//! ```text
//! Domain ----------+-- topics:     RuleList -> TopicRule (+ FineGrainedTopic)
//!                  +-- partitions: RuleList -> PartitionRule
//!
//! Participant -----+-- kind: Template | Clone(template) | Unchecked
//!                  +-- topics:     RuleList -> TopicRule   (user scoped)
//!                  +-- partitions: RuleList -> PartitionRule
//! ```
//!
//! Records only refer to each other through handles. The store owns every
//! record; lists hold handles in precedence order.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::Deserialize;

mod domain;
mod fine_grained;
mod participant;
mod rules;

pub use domain::{Domain, DomainAccess, DomainSecurity};
pub use fine_grained::{Direction, FineGrainedTier, FineGrainedTopic};
pub use participant::{IdentityKey, Participant, ParticipantAccess, ParticipantKind};
pub use rules::{
    PartitionAccess, PartitionRule, Rule, RuleKind, RuleList, RuleParent, TopicAccess, TopicRule,
    TopicSecurity,
};

/// Store handle. `0` is never issued.
pub type Handle = u32;

/// DDS domain identifier.
pub type DomainId = u32;

/// Wildcard domain id: "every domain without an explicit record".
pub const ANY_DOMAIN: DomainId = !0;

/// Mandatory access classification, ordered from least to most restricted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    Unclassified = 0,
    Confidential = 1,
    Secret = 2,
    TopSecret = 3,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unclassified => "unclassified",
            Self::Confidential => "confidential",
            Self::Secret => "secret",
            Self::TopSecret => "top_secret",
        };
        f.write_str(name)
    }
}

/// Operation bitmask granted by a topic or partition rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Mode(u32);

impl Mode {
    pub const NONE: Self = Self(0);
    pub const CREATE: Self = Self(1 << 0);
    pub const DELETE: Self = Self(1 << 1);
    pub const READ: Self = Self(1 << 2);
    pub const WRITE: Self = Self(1 << 3);
    pub const ALL: Self = Self(0xF);

    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// At least one bit of `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Parse a mode keyword (`create`, `delete`, `read`, `write`, `all`).
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Self::CREATE),
            "delete" => Some(Self::DELETE),
            "read" | "subscribe" => Some(Self::READ),
            "write" | "publish" => Some(Self::WRITE),
            "all" => Some(Self::ALL),
            _ => None,
        }
    }
}

impl BitOr for Mode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Mode {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Mode {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Self::CREATE, 'C'),
            (Self::DELETE, 'D'),
            (Self::READ, 'R'),
            (Self::WRITE, 'W'),
        ];
        for (flag, c) in flags {
            let shown = if self.contains(flag) { c } else { '-' };
            write!(f, "{}", shown)?;
        }
        Ok(())
    }
}

/// Protection applied to a class of traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protection {
    #[default]
    None,
    Sign,
    Encrypt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_order() {
        assert!(AccessLevel::Unclassified < AccessLevel::Confidential);
        assert!(AccessLevel::Confidential < AccessLevel::Secret);
        assert!(AccessLevel::Secret < AccessLevel::TopSecret);
    }

    #[test]
    fn test_mode_ops() {
        let rw = Mode::READ | Mode::WRITE;
        assert!(rw.contains(Mode::READ));
        assert!(!rw.contains(Mode::READ | Mode::CREATE));
        assert!(rw.intersects(Mode::WRITE | Mode::CREATE));
        assert!(!rw.intersects(Mode::CREATE));
        assert!(Mode::ALL.contains(rw));
        assert_eq!(Mode::from_bits_truncate(0xFF), Mode::ALL);
        assert_eq!(rw.to_string(), "--RW");
        assert_eq!(Mode::ALL.to_string(), "CDRW");
    }

    #[test]
    fn test_mode_keywords() {
        assert_eq!(Mode::from_keyword("READ"), Some(Mode::READ));
        assert_eq!(Mode::from_keyword("publish"), Some(Mode::WRITE));
        assert_eq!(Mode::from_keyword("all"), Some(Mode::ALL));
        assert_eq!(Mode::from_keyword("bogus"), None);
    }
}
