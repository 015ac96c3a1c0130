// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule resolution.
//!
//! # Evaluation order
//!
//! 1. Participant-scoped rules (the template's, for a clone) in list order.
//!    The first pattern that matches decides; a blacklisted match denies
//!    without falling through to the domain.
//! 2. Domain rules in list order, same first-match semantics. An implicit
//!    domain list is the allow-all placeholder.
//!
//! First match wins, not best match. Exact names sit ahead of wildcard
//! patterns in every list, so the first match is also the most specific one.

use crate::error::Result;
use crate::matcher::name_match;
use crate::model::{
    AccessLevel, Direction, Domain, Handle, Mode, Participant, PartitionRule, Rule, RuleParent,
    TopicRule,
};
use crate::store::{RuleStore, StoredRule};

/// Whether `participant` may join `domain`.
///
/// Blacklisted domains and participants are refused. A domain without a
/// classification admits everyone else. Otherwise the participant (its
/// template, for a clone) must reach the domain's level, and an exclusive
/// domain additionally requires one of the participant's own topic rules to
/// name this domain (or any domain) with a non-empty mode.
pub fn allow_access(store: &RuleStore, domain: Handle, participant: Handle) -> Result<bool> {
    let domain = store.domain(domain)?;
    let effective = store.effective_participant(participant)?;

    if domain.is_blacklisted() {
        log::warn!("[access] domain {} is blacklisted", domain.handle());
        return Ok(false);
    }
    if effective.is_blacklisted() {
        log::warn!(
            "[access] participant '{}' ({}) is blacklisted",
            effective.name(),
            participant
        );
        return Ok(false);
    }
    if domain.level() == AccessLevel::Unclassified {
        return Ok(true);
    }
    if effective.level() < domain.level() {
        log::warn!(
            "[access] participant {} level {} below domain {} level {}",
            participant,
            effective.level(),
            domain.handle(),
            domain.level()
        );
        return Ok(false);
    }
    if !domain.is_exclusive() {
        return Ok(true);
    }

    let listed = explicit_rules::<TopicRule>(store, RuleParent::Participant(effective.handle()))?
        .any(|rule| !rule.mode().is_empty() && rule.covers(domain.domain_id()));
    if !listed {
        log::warn!(
            "[access] participant {} does not list exclusive domain {}",
            participant,
            domain.handle()
        );
    }
    Ok(listed)
}

/// First topic rule matching `topic` for `participant` in `domain`.
///
/// `None` means denied: either nothing matched or the first match is
/// blacklisted.
pub fn lookup_topic<'a>(
    store: &'a RuleStore,
    domain: Handle,
    participant: Handle,
    topic: &str,
) -> Result<Option<&'a TopicRule>> {
    lookup::<TopicRule>(store, domain, participant, topic, |_| true)
}

/// First partition rule matching `partition` whose mode intersects `mode`.
pub fn lookup_partition<'a>(
    store: &'a RuleStore,
    domain: Handle,
    participant: Handle,
    partition: &str,
    mode: Mode,
) -> Result<Option<&'a PartitionRule>> {
    lookup::<PartitionRule>(store, domain, participant, partition, |rule| {
        rule.mode().intersects(mode)
    })
}

fn lookup<'a, R: StoredRule>(
    store: &'a RuleStore,
    domain: Handle,
    participant: Handle,
    name: &str,
    candidate: impl Fn(&R) -> bool,
) -> Result<Option<&'a R>> {
    let domain = store.domain(domain)?;
    let effective = store.effective_participant(participant)?;

    let user = explicit_rules::<R>(store, RuleParent::Participant(effective.handle()))?
        .filter(|rule| applies_to(*rule, domain))
        .find(|rule| candidate(*rule) && name_match(rule.name(), name));
    if let Some(rule) = user {
        return Ok(decide(rule, "participant", name));
    }

    let admin = store
        .rules::<R>(RuleParent::Domain(domain.handle()))?
        .into_iter()
        .find(|rule| candidate(*rule) && name_match(rule.name(), name));
    Ok(admin.and_then(|rule| decide(rule, "domain", name)))
}

fn decide<'a, R: Rule>(rule: &'a R, scope: &str, name: &str) -> Option<&'a R> {
    if rule.is_blacklisted() {
        log::warn!(
            "[access] {} '{}' blacklisted by {} rule {}",
            R::KIND.entity(),
            name,
            scope,
            rule.handle()
        );
        return None;
    }
    Some(rule)
}

/// Explicit rules of a parent in list order. A placeholder list yields
/// nothing.
fn explicit_rules<'a, R: StoredRule>(
    store: &'a RuleStore,
    parent: RuleParent,
) -> Result<impl Iterator<Item = &'a R> + 'a> {
    let list = store.rule_list(parent, R::KIND)?;
    let table = &R::table(store).rules;
    Ok(list.handles().iter().filter_map(move |h| table.get(h)))
}

/// A participant-scoped rule applies to domains carrying its id. Either side
/// being the wildcard id matches everything.
fn applies_to<R: Rule>(rule: &R, domain: &Domain) -> bool {
    domain.covers(rule.domain_id()) || rule.covers(domain.domain_id())
}

// ----------------------------------------------------------------------------
// Fine-grained
// ----------------------------------------------------------------------------

/// Whether `peer` passes the fine-grained list of `rule` for `direction`.
///
/// The app-level list shadows the admin-level list. No list at all allows.
/// A peer is listed either by its own handle or, for a clone, by its
/// template's handle.
pub fn fine_grained_allows(
    rule: &TopicRule,
    direction: Direction,
    peer: Option<&Participant>,
) -> bool {
    let Some(list) = rule.effective_fine_grained() else {
        return true;
    };
    match peer {
        Some(peer) => {
            list.allows(direction, peer.handle())
                || peer
                    .template()
                    .is_some_and(|template| list.allows(direction, template))
        }
        None => false,
    }
}

/// Fine-grained check between a writer-side and a reader-side rule.
///
/// The writer's rule must let the reader read, and the reader's rule must let
/// the writer write. A side without a rule (open domain) imposes nothing, and
/// its peer is unlisted.
pub fn fine_grained_match(
    writer_rule: Option<&TopicRule>,
    writer: Option<&Participant>,
    reader_rule: Option<&TopicRule>,
    reader: Option<&Participant>,
) -> bool {
    let read_ok =
        writer_rule.map_or(true, |rule| fine_grained_allows(rule, Direction::Read, reader));
    let write_ok =
        reader_rule.map_or(true, |rule| fine_grained_allows(rule, Direction::Write, writer));
    read_ok && write_ok
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
