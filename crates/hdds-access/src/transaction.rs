// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bulk policy updates.
//!
//! An update is bracketed by [`crate::AccessEngine::update_start`] and
//! [`UpdateGuard::update_done`]. The guard holds the store lock for the whole
//! batch; dropping it (early return, `?`, panic) releases the lock without
//! running the commit pass.
//!
//! # Commit pass
//!
//! 1. **Reorder**: templates sorted by the order they were declared in this
//!    update. Clones and unchecked participants follow, in their old order.
//! 2. **Cleanup**: domains and templates not refreshed are removed with their
//!    rules; rules not refreshed are removed from surviving owners.
//! 3. **Rematch**: clones whose template was removed or changed re-run the
//!    template scan. A match re-parents the clone, no match removes it.
//!    Unchecked participants are exempt.
//! 4. **Optimize**: empty rule lists get the allow-all placeholder back.
//!
//! The pass is best-effort: the first error aborts it and whatever was already
//! cleaned up stays cleaned up.

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};

use parking_lot::MutexGuard;

use crate::error::Result;
use crate::identity::{self, Rematch};
use crate::model::{Handle, ParticipantAccess, ParticipantKind, Rule, RuleKind, RuleParent};
use crate::store::RuleStore;

/// What a commit pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub removed_domains: usize,
    pub removed_participants: usize,
    pub removed_rules: usize,
    /// Clones linked to a different template
    pub reparented: usize,
    /// Clones removed because no template matches them any more
    pub released: usize,
    /// Rule lists folded back to the allow-all placeholder
    pub placeholders: usize,
}

/// State captured when an update starts.
#[derive(Debug)]
pub(crate) struct Transaction {
    templates: HashMap<Handle, ParticipantAccess>,
}

impl Transaction {
    /// Reset refreshed flags and input ordering.
    pub(crate) fn begin(store: &mut RuleStore) -> Self {
        store.next_input_order = 1;
        for domain in store.domains.values_mut() {
            domain.refreshed = false;
        }
        let mut templates = HashMap::new();
        for participant in store.participants.values_mut() {
            if participant.is_template() {
                participant.refreshed = false;
                participant.input_order = 0;
                templates.insert(participant.handle, participant.access.clone());
            }
        }
        for rule in store.topics.rules.values_mut() {
            rule.set_refreshed(false);
        }
        for rule in store.partitions.rules.values_mut() {
            rule.set_refreshed(false);
        }
        log::debug!(
            "[access] update started ({} domains, {} templates)",
            store.domains.len(),
            templates.len()
        );
        Self { templates }
    }

    pub(crate) fn commit(self, store: &mut RuleStore) -> Result<CommitReport> {
        let mut report = CommitReport::default();

        reorder(store);
        let orphans = cleanup(store, &mut report)?;

        let mut changed: HashSet<Handle> = HashSet::new();
        for (handle, before) in &self.templates {
            if let Ok(template) = store.participant(*handle) {
                if template.access() != before {
                    changed.insert(*handle);
                }
            }
        }
        rematch_clones(store, orphans, &changed, &mut report)?;
        optimize(store, &mut report)?;

        log::info!(
            "[access] update committed: -{} domains, -{} participants, -{} rules, {} reparented, {} released, {} placeholders",
            report.removed_domains,
            report.removed_participants,
            report.removed_rules,
            report.reparented,
            report.released,
            report.placeholders
        );
        Ok(report)
    }
}

fn reorder(store: &mut RuleStore) {
    let mut keyed: Vec<(u32, Handle)> = store
        .participant_order
        .iter()
        .filter_map(|h| store.participants.get(h))
        .map(|p| {
            let key = if p.is_template() && p.input_order != 0 {
                p.input_order
            } else {
                u32::MAX
            };
            (key, p.handle)
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    store.participant_order = keyed.into_iter().map(|(_, h)| h).collect();
}

/// Remove stale records. Returns clones orphaned by removed templates.
fn cleanup(store: &mut RuleStore, report: &mut CommitReport) -> Result<Vec<Handle>> {
    for handle in store.domain_order.clone() {
        let refreshed = store.domain(handle)?.refreshed;
        if !refreshed {
            log::debug!("[access] domain {} not refreshed, removing", handle);
            report.removed_rules += owned_rule_count(store, RuleParent::Domain(handle))?;
            store.remove_domain_cascade(handle)?;
            report.removed_domains += 1;
        } else {
            report.removed_rules += remove_stale_rules(store, RuleParent::Domain(handle))?;
        }
    }

    let mut orphans = Vec::new();
    for handle in store.participant_order.clone() {
        let participant = store.participant(handle)?;
        if !participant.is_template() {
            continue;
        }
        if !participant.refreshed {
            log::debug!("[access] template {} not refreshed, removing", handle);
            orphans.extend(store.clones_of(handle));
            report.removed_rules += owned_rule_count(store, RuleParent::Participant(handle))?;
            store.remove_participant(handle)?;
            report.removed_participants += 1;
        } else {
            report.removed_rules += remove_stale_rules(store, RuleParent::Participant(handle))?;
        }
    }
    Ok(orphans)
}

fn owned_rule_count(store: &RuleStore, parent: RuleParent) -> Result<usize> {
    Ok(store.rule_list(parent, RuleKind::Topic)?.len()
        + store.rule_list(parent, RuleKind::Partition)?.len())
}

fn remove_stale_rules(store: &mut RuleStore, parent: RuleParent) -> Result<usize> {
    let stale_topics: Vec<Handle> = store
        .topics(parent)?
        .into_iter()
        .filter(|r| r.handle() != 0 && !r.is_refreshed())
        .map(|r| r.handle())
        .collect();
    let stale_partitions: Vec<Handle> = store
        .partitions(parent)?
        .into_iter()
        .filter(|r| r.handle() != 0 && !r.is_refreshed())
        .map(|r| r.handle())
        .collect();

    for &topic in &stale_topics {
        store.remove_topic(parent, topic)?;
    }
    for &partition in &stale_partitions {
        store.remove_partition(parent, partition)?;
    }
    Ok(stale_topics.len() + stale_partitions.len())
}

fn rematch_clones(
    store: &mut RuleStore,
    orphans: Vec<Handle>,
    changed: &HashSet<Handle>,
    report: &mut CommitReport,
) -> Result<()> {
    let mut candidates = orphans;
    for participant in store.participants() {
        if let ParticipantKind::Clone(template) = participant.kind() {
            let orphaned = store.participant(template).is_err();
            if (orphaned || changed.contains(&template))
                && !candidates.contains(&participant.handle())
            {
                candidates.push(participant.handle());
            }
        }
    }

    for clone in candidates {
        if store.participant(clone).is_err() {
            continue;
        }
        match identity::rematch(store, clone)? {
            Rematch::Reparented { .. } => report.reparented += 1,
            Rematch::Released => {
                report.released += 1;
                report.removed_participants += 1;
            }
            Rematch::Unchanged => identity::flag_updated_permissions(store, clone)?,
        }
    }
    Ok(())
}

fn optimize(store: &mut RuleStore, report: &mut CommitReport) -> Result<()> {
    let mut parents: Vec<RuleParent> = store
        .domain_order
        .iter()
        .map(|&h| RuleParent::Domain(h))
        .collect();
    parents.extend(
        store
            .participants()
            .filter(|p| p.is_template())
            .map(|p| RuleParent::Participant(p.handle())),
    );

    for parent in parents {
        for kind in [RuleKind::Topic, RuleKind::Partition] {
            if store.rule_list_mut(parent, kind)?.reinstate_placeholder() {
                log::debug!("[access] {:?} {:?} list back to allow-all", parent, kind);
                report.placeholders += 1;
            }
        }
    }
    Ok(())
}

/// Exclusive access to the rule store for the duration of a bulk update.
///
/// Dereferences to [`RuleStore`] so the batch uses the ordinary store API.
/// Call [`UpdateGuard::update_done`] to run the commit pass.
pub struct UpdateGuard<'a> {
    store: MutexGuard<'a, RuleStore>,
    transaction: Option<Transaction>,
}

impl<'a> UpdateGuard<'a> {
    pub(crate) fn new(mut store: MutexGuard<'a, RuleStore>) -> Self {
        let transaction = Transaction::begin(&mut store);
        Self {
            store,
            transaction: Some(transaction),
        }
    }

    /// Run the commit pass and release the lock.
    ///
    /// The lock is released whether or not the pass succeeds.
    pub fn update_done(mut self) -> Result<CommitReport> {
        match self.transaction.take() {
            Some(transaction) => transaction.commit(&mut self.store),
            None => Ok(CommitReport::default()),
        }
    }
}

impl UpdateGuard<'_> {
    /// Put the store back to `snapshot` and release the lock without
    /// committing.
    pub(crate) fn rollback(mut self, snapshot: RuleStore) {
        self.transaction = None;
        self.store.restore(snapshot);
        log::debug!("[access] update rolled back");
    }
}

impl Deref for UpdateGuard<'_> {
    type Target = RuleStore;

    fn deref(&self) -> &RuleStore {
        &self.store
    }
}

impl DerefMut for UpdateGuard<'_> {
    fn deref_mut(&mut self) -> &mut RuleStore {
        &mut self.store
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            log::warn!("[access] update dropped without commit, stale entries kept");
        }
    }
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
