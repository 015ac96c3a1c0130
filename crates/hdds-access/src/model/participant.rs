// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{AccessLevel, Handle, RuleList};
use crate::handle::PermissionsHandle;

/// Role a participant record plays.
///
/// Replaces the nullable/self-referential back pointer: a template is a
/// declarative rule, a clone is a concrete authenticated peer linked to the
/// template it matched, and an unchecked participant is a peer still in the
/// middle of its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantKind {
    Template,
    Clone(Handle),
    Unchecked,
}

/// 16-byte content hash of an identity plus the length of the hashed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub digest: [u8; 16],
    pub length: usize,
}

impl IdentityKey {
    /// MD5 fingerprint of raw identity bytes.
    pub fn fingerprint(identity: &[u8]) -> Self {
        use md5::{Digest, Md5};

        let mut hasher = Md5::new();
        hasher.update(identity);
        let result = hasher.finalize();

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&result);
        Self {
            digest,
            length: identity.len(),
        }
    }
}

/// Administrator-controlled attributes of a participant template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantAccess {
    /// Identity name or pattern. Empty matches every identity.
    pub name: String,
    pub level: AccessLevel,
    pub blacklist: bool,
}

/// A named identity rule (template) or a concrete authenticated peer.
#[derive(Debug, Clone)]
pub struct Participant {
    pub(crate) handle: Handle,
    pub(crate) access: ParticipantAccess,
    pub(crate) kind: ParticipantKind,
    pub(crate) key: Option<IdentityKey>,
    pub(crate) permission_handle: PermissionsHandle,
    pub(crate) updated_permission_handle: Option<PermissionsHandle>,
    pub(crate) topics: RuleList,
    pub(crate) partitions: RuleList,
    pub(crate) refreshed: bool,
    pub(crate) input_order: u32,
}

impl Participant {
    pub(crate) fn new(handle: Handle, kind: ParticipantKind) -> Self {
        Self {
            handle,
            access: ParticipantAccess::default(),
            kind,
            key: None,
            permission_handle: PermissionsHandle::INVALID,
            updated_permission_handle: None,
            topics: RuleList::implicit(),
            partitions: RuleList::implicit(),
            refreshed: true,
            input_order: 0,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.access.name
    }

    pub fn access(&self) -> &ParticipantAccess {
        &self.access
    }

    pub fn level(&self) -> AccessLevel {
        self.access.level
    }

    pub fn is_blacklisted(&self) -> bool {
        self.access.blacklist
    }

    pub fn kind(&self) -> ParticipantKind {
        self.kind
    }

    pub fn is_template(&self) -> bool {
        self.kind == ParticipantKind::Template
    }

    pub fn is_unchecked(&self) -> bool {
        self.kind == ParticipantKind::Unchecked
    }

    /// Template this clone was created from.
    pub fn template(&self) -> Option<Handle> {
        match self.kind {
            ParticipantKind::Clone(template) => Some(template),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&IdentityKey> {
        self.key.as_ref()
    }

    pub fn permission_handle(&self) -> PermissionsHandle {
        self.permission_handle
    }

    pub fn updated_permission_handle(&self) -> Option<PermissionsHandle> {
        self.updated_permission_handle
    }

    pub fn topics(&self) -> &RuleList {
        &self.topics
    }

    pub fn partitions(&self) -> &RuleList {
        &self.partitions
    }

    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    pub fn input_order(&self) -> u32 {
        self.input_order
    }
}
