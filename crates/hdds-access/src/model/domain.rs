// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{AccessLevel, DomainId, Handle, Protection, RuleList, ANY_DOMAIN};

/// Transport and message protection a domain requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainSecurity {
    /// Protection of whole RTPS messages
    pub rtps_protection: Protection,
    /// Secure transport (DTLS/TLS) required
    pub secure_transport: bool,
    /// Discovery traffic must be protected
    pub discovery_protection: Protection,
}

/// Administrator-controlled attributes of a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAccess {
    /// Domain id, or [`ANY_DOMAIN`] for "all others"
    pub domain_id: DomainId,
    /// Minimum participant classification
    pub level: AccessLevel,
    /// Participants must list this domain among their own topic rules
    pub exclusive: bool,
    /// Deny every participant
    pub blacklist: bool,
    pub security: DomainSecurity,
}

impl Default for DomainAccess {
    fn default() -> Self {
        Self {
            domain_id: ANY_DOMAIN,
            level: AccessLevel::Unclassified,
            exclusive: false,
            blacklist: false,
            security: DomainSecurity::default(),
        }
    }
}

/// A communication domain's security posture.
#[derive(Debug, Clone)]
pub struct Domain {
    pub(crate) handle: Handle,
    pub(crate) access: DomainAccess,
    pub(crate) refreshed: bool,
    pub(crate) topics: RuleList,
    pub(crate) partitions: RuleList,
}

impl Domain {
    pub(crate) fn new(handle: Handle) -> Self {
        Self {
            handle,
            access: DomainAccess::default(),
            refreshed: true,
            topics: RuleList::implicit(),
            partitions: RuleList::implicit(),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn access(&self) -> &DomainAccess {
        &self.access
    }

    pub fn domain_id(&self) -> DomainId {
        self.access.domain_id
    }

    pub fn level(&self) -> AccessLevel {
        self.access.level
    }

    pub fn is_exclusive(&self) -> bool {
        self.access.exclusive
    }

    pub fn is_blacklisted(&self) -> bool {
        self.access.blacklist
    }

    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn topics(&self) -> &RuleList {
        &self.topics
    }

    pub fn partitions(&self) -> &RuleList {
        &self.partitions
    }

    /// Applies to `domain_id`, either exactly or as the wildcard domain.
    pub fn covers(&self, domain_id: DomainId) -> bool {
        self.access.domain_id == ANY_DOMAIN || self.access.domain_id == domain_id
    }
}
