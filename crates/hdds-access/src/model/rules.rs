// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic and partition rules and the ordered lists that hold them.

use super::{DomainId, FineGrainedTier, FineGrainedTopic, Handle, Mode, Protection, ANY_DOMAIN};
use crate::error::{EntityKind, Result};

/// Which rule table a list refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Topic,
    Partition,
}

impl RuleKind {
    pub fn entity(self) -> EntityKind {
        match self {
            Self::Topic => EntityKind::Topic,
            Self::Partition => EntityKind::Partition,
        }
    }
}

/// Owner of a rule list: a domain (admin scope) or a participant (user scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleParent {
    Domain(Handle),
    Participant(Handle),
}

/// Ordered rule handles of one parent.
///
/// Either the implicit allow-all placeholder (handle 0, no entries) or an
/// explicit list. List order is precedence: lookups take the first match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleList {
    implicit: bool,
    entries: Vec<Handle>,
}

impl RuleList {
    /// List holding only the allow-all placeholder.
    pub fn implicit() -> Self {
        Self {
            implicit: true,
            entries: Vec::new(),
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// No explicit rules (placeholder or not).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn handles(&self) -> &[Handle] {
        &self.entries
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains(&handle)
    }

    /// Append an explicit rule, dropping the placeholder.
    pub(crate) fn push_back(&mut self, handle: Handle) -> Result<()> {
        self.entries.try_reserve(1)?;
        self.implicit = false;
        self.entries.push(handle);
        Ok(())
    }

    /// Move `handle` to the head of the list. Returns false if absent.
    pub(crate) fn move_to_front(&mut self, handle: Handle) -> bool {
        match self.entries.iter().position(|&h| h == handle) {
            Some(0) => true,
            Some(pos) => {
                self.entries[..=pos].rotate_right(1);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> bool {
        match self.entries.iter().position(|&h| h == handle) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Put the placeholder back if no explicit rule is left.
    pub(crate) fn reinstate_placeholder(&mut self) -> bool {
        if self.entries.is_empty() && !self.implicit {
            self.implicit = true;
            return true;
        }
        false
    }
}

/// Cryptographic attributes attached to a topic rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicSecurity {
    /// Access to the topic is checked at all
    pub controlled: bool,
    /// Endpoint discovery information is protected
    pub discovery_protection: bool,
    pub submessage_protection: Protection,
    pub payload_protection: Protection,
}

impl TopicSecurity {
    pub const NONE: Self = Self {
        controlled: false,
        discovery_protection: false,
        submessage_protection: Protection::None,
        payload_protection: Protection::None,
    };
}

/// Mutable attributes of a topic rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicAccess {
    /// Topic name pattern. `None` reads as `*`.
    pub name: Option<String>,
    pub mode: Mode,
    /// Domain a participant-scoped rule applies to
    pub domain_id: DomainId,
    pub security: TopicSecurity,
    pub blacklist: bool,
}

impl Default for TopicAccess {
    fn default() -> Self {
        Self {
            name: None,
            mode: Mode::NONE,
            domain_id: ANY_DOMAIN,
            security: TopicSecurity::NONE,
            blacklist: false,
        }
    }
}

/// Mutable attributes of a partition rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAccess {
    /// Partition name pattern. `None` reads as `*`.
    pub name: Option<String>,
    pub mode: Mode,
    pub domain_id: DomainId,
    pub blacklist: bool,
}

impl Default for PartitionAccess {
    fn default() -> Self {
        Self {
            name: None,
            mode: Mode::NONE,
            domain_id: ANY_DOMAIN,
            blacklist: false,
        }
    }
}

/// Named-pattern rule granting a mode bitmask on a topic.
#[derive(Debug, Clone)]
pub struct TopicRule {
    pub(crate) handle: Handle,
    pub(crate) access: TopicAccess,
    pub(crate) refreshed: bool,
    pub(crate) fine_grained: Option<FineGrainedTopic>,
    pub(crate) app_fine_grained: Option<FineGrainedTopic>,
}

/// Named-pattern rule granting a mode bitmask on a partition.
#[derive(Debug, Clone)]
pub struct PartitionRule {
    pub(crate) handle: Handle,
    pub(crate) access: PartitionAccess,
    pub(crate) refreshed: bool,
}

static ALLOW_ALL_TOPIC: TopicRule = TopicRule {
    handle: 0,
    access: TopicAccess {
        name: None,
        mode: Mode::ALL,
        domain_id: ANY_DOMAIN,
        security: TopicSecurity::NONE,
        blacklist: false,
    },
    refreshed: true,
    fine_grained: None,
    app_fine_grained: None,
};

static ALLOW_ALL_PARTITION: PartitionRule = PartitionRule {
    handle: 0,
    access: PartitionAccess {
        name: None,
        mode: Mode::ALL,
        domain_id: ANY_DOMAIN,
        blacklist: false,
    },
    refreshed: true,
};

/// Behaviour shared by topic and partition rules.
pub trait Rule: Clone + 'static {
    const KIND: RuleKind;

    /// Attributes written by `set_*_access`.
    type Access: Clone;

    fn new(handle: Handle) -> Self;

    /// The implicit allow-all placeholder (handle 0, name `*`, mode ALL).
    fn allow_all() -> &'static Self;

    fn handle(&self) -> Handle;
    fn name(&self) -> Option<&str>;
    fn mode(&self) -> Mode;
    fn domain_id(&self) -> DomainId;
    fn is_blacklisted(&self) -> bool;
    fn is_refreshed(&self) -> bool;
    fn set_refreshed(&mut self, refreshed: bool);
    fn access(&self) -> &Self::Access;
    fn set_access(&mut self, access: Self::Access);
    fn access_name(access: &Self::Access) -> Option<&str>;

    /// Applies to `domain_id` (wildcard or exact).
    fn covers(&self, domain_id: DomainId) -> bool {
        self.domain_id() == ANY_DOMAIN || self.domain_id() == domain_id
    }
}

impl TopicRule {
    /// Fine-grained list of the given tier, if any.
    pub fn fine_grained(&self, tier: FineGrainedTier) -> Option<&FineGrainedTopic> {
        match tier {
            FineGrainedTier::Admin => self.fine_grained.as_ref(),
            FineGrainedTier::App => self.app_fine_grained.as_ref(),
        }
    }

    pub(crate) fn fine_grained_slot(
        &mut self,
        tier: FineGrainedTier,
    ) -> &mut Option<FineGrainedTopic> {
        match tier {
            FineGrainedTier::Admin => &mut self.fine_grained,
            FineGrainedTier::App => &mut self.app_fine_grained,
        }
    }

    /// App-level list wins over the admin-level one when both exist.
    pub fn effective_fine_grained(&self) -> Option<&FineGrainedTopic> {
        self.app_fine_grained.as_ref().or(self.fine_grained.as_ref())
    }

    pub fn security(&self) -> TopicSecurity {
        self.access.security
    }
}

impl Rule for TopicRule {
    const KIND: RuleKind = RuleKind::Topic;
    type Access = TopicAccess;

    fn new(handle: Handle) -> Self {
        Self {
            handle,
            access: TopicAccess::default(),
            refreshed: true,
            fine_grained: None,
            app_fine_grained: None,
        }
    }

    fn allow_all() -> &'static Self {
        &ALLOW_ALL_TOPIC
    }

    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> Option<&str> {
        self.access.name.as_deref()
    }

    fn mode(&self) -> Mode {
        self.access.mode
    }

    fn domain_id(&self) -> DomainId {
        self.access.domain_id
    }

    fn is_blacklisted(&self) -> bool {
        self.access.blacklist
    }

    fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    fn set_refreshed(&mut self, refreshed: bool) {
        self.refreshed = refreshed;
    }

    fn access(&self) -> &TopicAccess {
        &self.access
    }

    fn set_access(&mut self, access: TopicAccess) {
        self.access = access;
    }

    fn access_name(access: &TopicAccess) -> Option<&str> {
        access.name.as_deref()
    }
}

impl Rule for PartitionRule {
    const KIND: RuleKind = RuleKind::Partition;
    type Access = PartitionAccess;

    fn new(handle: Handle) -> Self {
        Self {
            handle,
            access: PartitionAccess::default(),
            refreshed: true,
        }
    }

    fn allow_all() -> &'static Self {
        &ALLOW_ALL_PARTITION
    }

    fn handle(&self) -> Handle {
        self.handle
    }

    fn name(&self) -> Option<&str> {
        self.access.name.as_deref()
    }

    fn mode(&self) -> Mode {
        self.access.mode
    }

    fn domain_id(&self) -> DomainId {
        self.access.domain_id
    }

    fn is_blacklisted(&self) -> bool {
        self.access.blacklist
    }

    fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    fn set_refreshed(&mut self, refreshed: bool) {
        self.refreshed = refreshed;
    }

    fn access(&self) -> &PartitionAccess {
        &self.access
    }

    fn set_access(&mut self, access: PartitionAccess) {
        self.access = access;
    }

    fn access_name(access: &PartitionAccess) -> Option<&str> {
        access.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_list_placeholder_lifecycle() {
        let mut list = RuleList::implicit();
        assert!(list.is_implicit());
        assert!(list.is_empty());

        list.push_back(5).unwrap();
        assert!(!list.is_implicit());
        assert_eq!(list.handles(), &[5]);

        assert!(list.remove(5));
        assert!(!list.is_implicit());
        assert!(list.reinstate_placeholder());
        assert!(list.is_implicit());
        assert!(!list.reinstate_placeholder());
    }

    #[test]
    fn test_rule_list_move_to_front_keeps_relative_order() {
        let mut list = RuleList::implicit();
        for h in [1, 2, 3, 4] {
            list.push_back(h).unwrap();
        }
        assert!(list.move_to_front(3));
        assert_eq!(list.handles(), &[3, 1, 2, 4]);
        assert!(list.move_to_front(3));
        assert_eq!(list.handles(), &[3, 1, 2, 4]);
        assert!(!list.move_to_front(9));
    }

    #[test]
    fn test_placeholders_allow_everything() {
        let topic = TopicRule::allow_all();
        assert_eq!(topic.handle(), 0);
        assert_eq!(topic.name(), None);
        assert_eq!(topic.mode(), Mode::ALL);
        assert!(topic.covers(12));

        let partition = PartitionRule::allow_all();
        assert_eq!(partition.mode(), Mode::ALL);
        assert!(!partition.is_blacklisted());
    }

    #[test]
    fn test_app_fine_grained_takes_precedence() {
        let mut rule = TopicRule::new(1);
        assert!(rule.effective_fine_grained().is_none());

        rule.fine_grained = Some(FineGrainedTopic::from_lists(&[1], &[], 8).unwrap());
        assert_eq!(rule.effective_fine_grained().unwrap().read(), &[1]);

        rule.app_fine_grained = Some(FineGrainedTopic::from_lists(&[2], &[], 8).unwrap());
        assert_eq!(rule.effective_fine_grained().unwrap().read(), &[2]);
    }
}
