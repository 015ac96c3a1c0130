// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory rule database.
//!
//! # Layout
//!
//! ```text
//! RuleStore
//! +-- domains:       HashMap<Handle, Domain>       + domain_order
//! +-- participants:  HashMap<Handle, Participant>  + participant_order
//! +-- topics:        RuleTable<TopicRule>          (shared by every parent)
//! +-- partitions:    RuleTable<PartitionRule>
//! ```
//!
//! Records are keyed by monotonically issued handles that are never reused.
//! Each domain and participant keeps ordered [`RuleList`]s of rule handles;
//! list order is lookup precedence.
//!
//! The store itself is not synchronized. [`crate::AccessEngine`] owns it behind
//! a single mutex.

use std::collections::HashMap;

use crate::error::{AccessError, EntityKind, Result};
use crate::matcher::has_wildcards;
use crate::model::{
    Direction, Domain, DomainAccess, DomainId, FineGrainedTier, FineGrainedTopic, Handle,
    Participant, ParticipantAccess, ParticipantKind, PartitionAccess, PartitionRule, Rule,
    RuleKind, RuleList, RuleParent, TopicAccess, TopicRule, ANY_DOMAIN,
};

/// Highest handle a domain or participant may carry (permissions handles
/// hold 16 bits for each).
pub const MAX_ENTITY_HANDLE: Handle = 0xFFFF;

/// Resource bounds applied by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_rules_per_list: usize,
    pub fine_grained_capacity: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_rules_per_list: 4096,
            fine_grained_capacity: 64,
        }
    }
}

/// Handle-keyed table of one rule kind.
#[derive(Debug, Clone)]
pub(crate) struct RuleTable<R> {
    pub(crate) rules: HashMap<Handle, R>,
    next: Handle,
}

impl<R> Default for RuleTable<R> {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            next: 1,
        }
    }
}

/// Access to the table holding a rule type.
pub(crate) trait StoredRule: Rule {
    fn table(store: &RuleStore) -> &RuleTable<Self>;
    fn table_mut(store: &mut RuleStore) -> &mut RuleTable<Self>;
}

impl StoredRule for TopicRule {
    fn table(store: &RuleStore) -> &RuleTable<Self> {
        &store.topics
    }

    fn table_mut(store: &mut RuleStore) -> &mut RuleTable<Self> {
        &mut store.topics
    }
}

impl StoredRule for PartitionRule {
    fn table(store: &RuleStore) -> &RuleTable<Self> {
        &store.partitions
    }

    fn table_mut(store: &mut RuleStore) -> &mut RuleTable<Self> {
        &mut store.partitions
    }
}

/// The rule database.
#[derive(Debug, Clone)]
pub struct RuleStore {
    pub(crate) domains: HashMap<Handle, Domain>,
    pub(crate) domain_order: Vec<Handle>,
    pub(crate) participants: HashMap<Handle, Participant>,
    pub(crate) participant_order: Vec<Handle>,
    pub(crate) topics: RuleTable<TopicRule>,
    pub(crate) partitions: RuleTable<PartitionRule>,
    next_domain: Handle,
    next_participant: Handle,
    pub(crate) next_input_order: u32,
    pub(crate) limits: StoreLimits,
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

fn issue(next: &mut Handle, max: Handle, kind: EntityKind) -> Result<Handle> {
    if *next > max {
        return Err(AccessError::OutOfResources(format!(
            "{} handle space exhausted",
            kind
        )));
    }
    let handle = *next;
    *next = next.checked_add(1).ok_or_else(|| {
        AccessError::OutOfResources(format!("{} handle space exhausted", kind))
    })?;
    Ok(handle)
}

impl RuleStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            domains: HashMap::new(),
            domain_order: Vec::new(),
            participants: HashMap::new(),
            participant_order: Vec::new(),
            topics: RuleTable::default(),
            partitions: RuleTable::default(),
            next_domain: 1,
            next_participant: 1,
            next_input_order: 1,
            limits,
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Roll the records back to `snapshot`. Handle counters keep their
    /// current values so handles issued since the snapshot are not reissued.
    pub(crate) fn restore(&mut self, snapshot: RuleStore) {
        let next_domain = self.next_domain.max(snapshot.next_domain);
        let next_participant = self.next_participant.max(snapshot.next_participant);
        let next_topic = self.topics.next.max(snapshot.topics.next);
        let next_partition = self.partitions.next.max(snapshot.partitions.next);
        *self = snapshot;
        self.next_domain = next_domain;
        self.next_participant = next_participant;
        self.topics.next = next_topic;
        self.partitions.next = next_partition;
    }

    // ------------------------------------------------------------------
    // Domains
    // ------------------------------------------------------------------

    /// Create a domain record with default attributes and an implicit
    /// allow-all rule list.
    pub fn add_domain(&mut self) -> Result<Handle> {
        self.domains.try_reserve(1)?;
        self.domain_order.try_reserve(1)?;
        let handle = issue(
            &mut self.next_domain,
            MAX_ENTITY_HANDLE,
            EntityKind::Domain,
        )?;
        self.domains.insert(handle, Domain::new(handle));
        self.domain_order.push(handle);
        log::debug!("[access] added domain {}", handle);
        Ok(handle)
    }

    pub fn domain(&self, handle: Handle) -> Result<&Domain> {
        self.domains
            .get(&handle)
            .ok_or_else(|| AccessError::not_found(EntityKind::Domain, handle))
    }

    pub(crate) fn domain_mut(&mut self, handle: Handle) -> Result<&mut Domain> {
        self.domains
            .get_mut(&handle)
            .ok_or_else(|| AccessError::not_found(EntityKind::Domain, handle))
    }

    /// Overwrite a domain's attributes and mark it refreshed.
    pub fn set_domain_access(&mut self, handle: Handle, access: DomainAccess) -> Result<()> {
        let domain = self.domain_mut(handle)?;
        log::debug!(
            "[access] domain {} -> id={:#x} level={} exclusive={} blacklist={}",
            handle,
            access.domain_id,
            access.level,
            access.exclusive,
            access.blacklist
        );
        domain.access = access;
        domain.refreshed = true;
        Ok(())
    }

    /// Remove a domain. Its explicit rules must have been removed first.
    pub fn remove_domain(&mut self, handle: Handle) -> Result<()> {
        let domain = self.domain(handle)?;
        if !domain.topics.is_empty() || !domain.partitions.is_empty() {
            return Err(AccessError::PreconditionNotMet(format!(
                "domain {} still owns {} topic and {} partition rules",
                handle,
                domain.topics.len(),
                domain.partitions.len()
            )));
        }
        self.domains.remove(&handle);
        self.domain_order.retain(|&h| h != handle);
        log::debug!("[access] removed domain {}", handle);
        Ok(())
    }

    /// Remove a domain together with every rule it owns.
    pub(crate) fn remove_domain_cascade(&mut self, handle: Handle) -> Result<()> {
        let parent = RuleParent::Domain(handle);
        let domain = self.domain(handle)?;
        let topics = domain.topics.handles().to_vec();
        let partitions = domain.partitions.handles().to_vec();
        for topic in topics {
            self.remove_topic(parent, topic)?;
        }
        for partition in partitions {
            self.remove_partition(parent, partition)?;
        }
        self.remove_domain(handle)
    }

    /// Domain record for a domain id: exact id first, then the wildcard
    /// domain, each in store order.
    pub fn find_domain(&self, domain_id: DomainId) -> Option<Handle> {
        if domain_id != ANY_DOMAIN {
            if let Some(handle) = self.find_domain_exact(domain_id) {
                return Some(handle);
            }
        }
        self.find_domain_exact(ANY_DOMAIN)
    }

    /// Domain record whose id is exactly `domain_id` (no wildcard fallback).
    pub fn find_domain_exact(&self, domain_id: DomainId) -> Option<Handle> {
        self.domain_order
            .iter()
            .filter_map(|h| self.domains.get(h))
            .find(|d| d.access.domain_id == domain_id)
            .map(|d| d.handle)
    }

    pub fn domain_handles(&self) -> &[Handle] {
        &self.domain_order
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    /// Create a participant template.
    pub fn add_participant(&mut self) -> Result<Handle> {
        let handle = self.insert_participant(ParticipantKind::Template)?;
        log::debug!("[access] added participant template {}", handle);
        Ok(handle)
    }

    pub(crate) fn insert_participant(&mut self, kind: ParticipantKind) -> Result<Handle> {
        self.participants.try_reserve(1)?;
        self.participant_order.try_reserve(1)?;
        let handle = issue(
            &mut self.next_participant,
            MAX_ENTITY_HANDLE,
            EntityKind::Participant,
        )?;
        let mut participant = Participant::new(handle, kind);
        if kind == ParticipantKind::Template {
            participant.input_order = self.take_input_order();
        }
        self.participants.insert(handle, participant);
        self.participant_order.push(handle);
        Ok(handle)
    }

    fn take_input_order(&mut self) -> u32 {
        let order = self.next_input_order;
        self.next_input_order = self.next_input_order.saturating_add(1);
        order
    }

    pub fn participant(&self, handle: Handle) -> Result<&Participant> {
        self.participants
            .get(&handle)
            .ok_or_else(|| AccessError::not_found(EntityKind::Participant, handle))
    }

    pub(crate) fn participant_mut(&mut self, handle: Handle) -> Result<&mut Participant> {
        self.participants
            .get_mut(&handle)
            .ok_or_else(|| AccessError::not_found(EntityKind::Participant, handle))
    }

    /// The record whose rules decide for `handle`: the template for a clone,
    /// the participant itself otherwise.
    pub fn effective_participant(&self, handle: Handle) -> Result<&Participant> {
        let participant = self.participant(handle)?;
        match participant.kind {
            ParticipantKind::Clone(template) => self.participant(template),
            _ => Ok(participant),
        }
    }

    /// Overwrite a template's attributes and mark it refreshed.
    pub fn set_participant_access(
        &mut self,
        handle: Handle,
        access: ParticipantAccess,
    ) -> Result<()> {
        let order = self.next_input_order;
        let participant = self.participant_mut(handle)?;
        if !participant.is_template() {
            return Err(AccessError::PreconditionNotMet(format!(
                "participant {} is not a template",
                handle
            )));
        }
        log::debug!(
            "[access] participant {} -> name='{}' level={} blacklist={}",
            handle,
            access.name,
            access.level,
            access.blacklist
        );
        participant.access = access;
        participant.refreshed = true;
        if participant.input_order == 0 {
            participant.input_order = order;
            self.next_input_order = order.saturating_add(1);
        }
        Ok(())
    }

    /// First participant (store order) whose name is exactly `name`.
    pub fn participant_by_name(&self, name: &str) -> Option<Handle> {
        self.participants()
            .find(|p| p.access.name == name)
            .map(|p| p.handle)
    }

    /// First template (store order) whose pattern is exactly `name`.
    pub fn template_by_name(&self, name: &str) -> Option<Handle> {
        self.participants()
            .find(|p| p.is_template() && p.access.name == name)
            .map(|p| p.handle)
    }

    /// Remove a participant and every rule it owns.
    pub fn remove_participant(&mut self, handle: Handle) -> Result<Participant> {
        let parent = RuleParent::Participant(handle);
        let participant = self.participant(handle)?;
        let topics = participant.topics.handles().to_vec();
        let partitions = participant.partitions.handles().to_vec();
        for topic in topics {
            self.remove_topic(parent, topic)?;
        }
        for partition in partitions {
            self.remove_partition(parent, partition)?;
        }
        self.participant_order.retain(|&h| h != handle);
        let removed = self
            .participants
            .remove(&handle)
            .ok_or_else(|| AccessError::not_found(EntityKind::Participant, handle))?;
        log::debug!("[access] removed participant {}", handle);
        Ok(removed)
    }

    /// Participants in store order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.participant_order
            .iter()
            .filter_map(move |h| self.participants.get(h))
    }

    pub fn participant_handles(&self) -> &[Handle] {
        &self.participant_order
    }

    /// Clones whose template is `template`.
    pub fn clones_of(&self, template: Handle) -> Vec<Handle> {
        self.participants()
            .filter(|p| p.kind == ParticipantKind::Clone(template))
            .map(|p| p.handle)
            .collect()
    }

    // ------------------------------------------------------------------
    // Rule lists
    // ------------------------------------------------------------------

    pub fn rule_list(&self, parent: RuleParent, kind: RuleKind) -> Result<&RuleList> {
        Ok(match parent {
            RuleParent::Domain(h) => {
                let domain = self.domain(h)?;
                match kind {
                    RuleKind::Topic => &domain.topics,
                    RuleKind::Partition => &domain.partitions,
                }
            }
            RuleParent::Participant(h) => {
                let participant = self.participant(h)?;
                match kind {
                    RuleKind::Topic => &participant.topics,
                    RuleKind::Partition => &participant.partitions,
                }
            }
        })
    }

    pub(crate) fn rule_list_mut(
        &mut self,
        parent: RuleParent,
        kind: RuleKind,
    ) -> Result<&mut RuleList> {
        Ok(match parent {
            RuleParent::Domain(h) => {
                let domain = self.domain_mut(h)?;
                match kind {
                    RuleKind::Topic => &mut domain.topics,
                    RuleKind::Partition => &mut domain.partitions,
                }
            }
            RuleParent::Participant(h) => {
                let participant = self.participant_mut(h)?;
                match kind {
                    RuleKind::Topic => &mut participant.topics,
                    RuleKind::Partition => &mut participant.partitions,
                }
            }
        })
    }

    fn mark_parent_refreshed(&mut self, parent: RuleParent) -> Result<()> {
        match parent {
            RuleParent::Domain(h) => self.domain_mut(h)?.refreshed = true,
            RuleParent::Participant(h) => self.participant_mut(h)?.refreshed = true,
        }
        Ok(())
    }

    fn add_rule<R: StoredRule>(&mut self, parent: RuleParent) -> Result<Handle> {
        let max = self.limits.max_rules_per_list;
        let len = self.rule_list(parent, R::KIND)?.len();
        if len >= max {
            return Err(AccessError::OutOfResources(format!(
                "{:?} already holds {} {} entries",
                parent,
                len,
                R::KIND.entity()
            )));
        }

        let table = R::table_mut(self);
        table.rules.try_reserve(1)?;
        let handle = issue(&mut table.next, Handle::MAX - 1, R::KIND.entity())?;
        table.rules.insert(handle, R::new(handle));

        if let Err(e) = self
            .rule_list_mut(parent, R::KIND)
            .and_then(|list| list.push_back(handle))
        {
            R::table_mut(self).rules.remove(&handle);
            return Err(e);
        }
        log::debug!("[access] added {} {} to {:?}", R::KIND.entity(), handle, parent);
        Ok(handle)
    }

    fn rule<R: StoredRule>(&self, parent: RuleParent, handle: Handle) -> Result<&R> {
        if !self.rule_list(parent, R::KIND)?.contains(handle) {
            return Err(AccessError::not_found(R::KIND.entity(), handle));
        }
        R::table(self)
            .rules
            .get(&handle)
            .ok_or_else(|| AccessError::not_found(R::KIND.entity(), handle))
    }

    fn rule_mut<R: StoredRule>(&mut self, parent: RuleParent, handle: Handle) -> Result<&mut R> {
        if !self.rule_list(parent, R::KIND)?.contains(handle) {
            return Err(AccessError::not_found(R::KIND.entity(), handle));
        }
        R::table_mut(self)
            .rules
            .get_mut(&handle)
            .ok_or_else(|| AccessError::not_found(R::KIND.entity(), handle))
    }

    fn set_rule_access<R: StoredRule>(
        &mut self,
        parent: RuleParent,
        handle: Handle,
        access: R::Access,
    ) -> Result<()> {
        let exact = R::access_name(&access).is_some_and(|name| !has_wildcards(name));
        let rule = self.rule_mut::<R>(parent, handle)?;
        rule.set_access(access);
        rule.set_refreshed(true);
        self.mark_parent_refreshed(parent)?;
        if exact {
            self.rule_list_mut(parent, R::KIND)?.move_to_front(handle);
        }
        Ok(())
    }

    fn remove_rule<R: StoredRule>(&mut self, parent: RuleParent, handle: Handle) -> Result<R> {
        if !self.rule_list_mut(parent, R::KIND)?.remove(handle) {
            return Err(AccessError::not_found(R::KIND.entity(), handle));
        }
        let removed = R::table_mut(self)
            .rules
            .remove(&handle)
            .ok_or_else(|| AccessError::not_found(R::KIND.entity(), handle))?;
        log::debug!(
            "[access] removed {} {} from {:?}",
            R::KIND.entity(),
            handle,
            parent
        );
        Ok(removed)
    }

    /// Rules of `parent` in precedence order. An implicit list yields the
    /// allow-all placeholder.
    pub(crate) fn rules<R: StoredRule>(&self, parent: RuleParent) -> Result<Vec<&R>> {
        let list = self.rule_list(parent, R::KIND)?;
        if list.is_implicit() {
            return Ok(vec![R::allow_all()]);
        }
        Ok(list
            .handles()
            .iter()
            .filter_map(|h| R::table(self).rules.get(h))
            .collect())
    }

    fn find_rule<R: StoredRule>(&self, parent: RuleParent, name: Option<&str>) -> Option<Handle> {
        let list = self.rule_list(parent, R::KIND).ok()?;
        list.handles()
            .iter()
            .filter_map(|h| R::table(self).rules.get(h))
            .find(|r| r.name() == name)
            .map(|r| r.handle())
    }

    // ------------------------------------------------------------------
    // Topic rules
    // ------------------------------------------------------------------

    /// Append a topic rule to `parent`, replacing the implicit placeholder.
    pub fn add_topic(&mut self, parent: RuleParent) -> Result<Handle> {
        self.add_rule::<TopicRule>(parent)
    }

    pub fn topic(&self, parent: RuleParent, handle: Handle) -> Result<&TopicRule> {
        self.rule(parent, handle)
    }

    /// Overwrite a topic rule and mark it and its parent refreshed. An exact
    /// (wildcard-free) name moves the rule to the head of its list.
    pub fn set_topic_access(
        &mut self,
        parent: RuleParent,
        handle: Handle,
        access: TopicAccess,
    ) -> Result<()> {
        self.set_rule_access::<TopicRule>(parent, handle, access)
    }

    pub fn remove_topic(&mut self, parent: RuleParent, handle: Handle) -> Result<()> {
        self.remove_rule::<TopicRule>(parent, handle).map(|_| ())
    }

    pub fn topics(&self, parent: RuleParent) -> Result<Vec<&TopicRule>> {
        self.rules(parent)
    }

    /// Explicit topic rule of `parent` whose pattern is exactly `name`.
    pub fn find_topic(&self, parent: RuleParent, name: Option<&str>) -> Option<Handle> {
        self.find_rule::<TopicRule>(parent, name)
    }

    #[cfg(test)]
    pub(crate) fn topic_by_handle(&self, handle: Handle) -> Option<&TopicRule> {
        self.topics.rules.get(&handle)
    }

    // ------------------------------------------------------------------
    // Partition rules
    // ------------------------------------------------------------------

    pub fn add_partition(&mut self, parent: RuleParent) -> Result<Handle> {
        self.add_rule::<PartitionRule>(parent)
    }

    pub fn partition(&self, parent: RuleParent, handle: Handle) -> Result<&PartitionRule> {
        self.rule(parent, handle)
    }

    pub fn set_partition_access(
        &mut self,
        parent: RuleParent,
        handle: Handle,
        access: PartitionAccess,
    ) -> Result<()> {
        self.set_rule_access::<PartitionRule>(parent, handle, access)
    }

    pub fn remove_partition(&mut self, parent: RuleParent, handle: Handle) -> Result<()> {
        self.remove_rule::<PartitionRule>(parent, handle).map(|_| ())
    }

    pub fn partitions(&self, parent: RuleParent) -> Result<Vec<&PartitionRule>> {
        self.rules(parent)
    }

    pub fn find_partition(&self, parent: RuleParent, name: Option<&str>) -> Option<Handle> {
        self.find_rule::<PartitionRule>(parent, name)
    }

    // ------------------------------------------------------------------
    // Fine-grained lists
    // ------------------------------------------------------------------

    /// Attach (or replace) the fine-grained list of one tier on a topic rule.
    pub fn set_fine_grained(
        &mut self,
        parent: RuleParent,
        topic: Handle,
        tier: FineGrainedTier,
        list: FineGrainedTopic,
    ) -> Result<()> {
        let capacity = self.limits.fine_grained_capacity;
        if list.read().len() > capacity || list.write().len() > capacity {
            return Err(AccessError::OutOfResources(format!(
                "fine-grained list exceeds capacity {}",
                capacity
            )));
        }
        let rule = self.rule_mut::<TopicRule>(parent, topic)?;
        *rule.fine_grained_slot(tier) = Some(list);
        Ok(())
    }

    /// Allow one more participant on a topic rule's fine-grained list,
    /// creating the list on demand.
    pub fn add_fine_grained_peer(
        &mut self,
        parent: RuleParent,
        topic: Handle,
        tier: FineGrainedTier,
        direction: Direction,
        participant: Handle,
    ) -> Result<()> {
        let capacity = self.limits.fine_grained_capacity;
        let rule = self.rule_mut::<TopicRule>(parent, topic)?;
        rule.fine_grained_slot(tier)
            .get_or_insert_with(FineGrainedTopic::new)
            .add(direction, participant, capacity)
    }

    pub fn clear_fine_grained(
        &mut self,
        parent: RuleParent,
        topic: Handle,
        tier: FineGrainedTier,
    ) -> Result<Option<FineGrainedTopic>> {
        let rule = self.rule_mut::<TopicRule>(parent, topic)?;
        Ok(rule.fine_grained_slot(tier).take())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
