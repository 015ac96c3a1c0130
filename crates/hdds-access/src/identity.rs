// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity cloning.
//!
//! Turns an authenticated peer into a concrete participant record linked to
//! the first template that matches its name:
//!
//! ```text
//! validate_local(name)  ---------------------------> Clone(template)
//! validate_remote(handshake method) -> Unchecked --> Clone(template)
//!                                         |     verify_remote_credentials
//!                                         +--------> removed (no match)
//! ```
//!
//! Peers are recognized again through an MD5 fingerprint of their identity so
//! repeated validation hands back the same clone.

use crate::error::{AccessError, Result};
use crate::handle::PermissionsHandle;
use crate::matcher::name_match;
use crate::model::{Handle, IdentityKey, ParticipantKind};
use crate::resolver;
use crate::store::RuleStore;

/// Outcome of re-running the template scan for an existing clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rematch {
    /// Still linked to the same template
    Unchanged,
    /// Linked to a different template
    Reparented { from: Handle, to: Handle },
    /// No live template matches; the clone was removed
    Released,
}

/// First template (store order) whose pattern is empty or matches `name`.
///
/// First match wins, not best match: a blacklisted template that comes first
/// rejects the identity even if a later template would admit it.
pub fn find_template(store: &RuleStore, name: &str) -> Option<Handle> {
    store
        .participants()
        .filter(|p| p.is_template())
        .find(|p| p.name().is_empty() || name_match(Some(p.name()), name))
        .map(|p| p.handle())
}

fn matching_template(store: &RuleStore, name: &str) -> Result<Handle> {
    let template = find_template(store, name)
        .ok_or_else(|| AccessError::denied(format!("no participant rule matches '{}'", name)))?;
    if store.participant(template)?.is_blacklisted() {
        log::warn!(
            "[access] identity '{}' rejected by blacklisted template {}",
            name,
            template
        );
        return Err(AccessError::denied(format!(
            "identity '{}' is blacklisted",
            name
        )));
    }
    Ok(template)
}

fn find_by_key(store: &RuleStore, key: &IdentityKey, unchecked: bool) -> Option<Handle> {
    store
        .participants()
        .filter(|p| p.is_unchecked() == unchecked && !p.is_template())
        .find(|p| p.key() == Some(key))
        .map(|p| p.handle())
}

/// Hand back an existing clone unless its template now blacklists it.
fn reuse_clone(store: &RuleStore, existing: Handle, name: &str) -> Result<Handle> {
    if store.effective_participant(existing)?.is_blacklisted() {
        return Err(AccessError::denied(format!(
            "identity '{}' is blacklisted",
            name
        )));
    }
    log::debug!("[access] identity '{}' reuses clone {}", name, existing);
    Ok(existing)
}

/// Resolve a locally authenticated identity to a clone.
///
/// An identity seen before (same fingerprint) gets its existing clone back,
/// provided its template still admits it.
pub fn validate_local(store: &mut RuleStore, name: &str) -> Result<Handle> {
    let key = IdentityKey::fingerprint(name.as_bytes());
    if let Some(existing) = find_by_key(store, &key, false) {
        return reuse_clone(store, existing, name);
    }

    let template = matching_template(store, name)?;
    let handle = store.insert_participant(ParticipantKind::Clone(template))?;
    let clone = store.participant_mut(handle)?;
    clone.access.name = name.to_string();
    clone.key = Some(key);
    log::debug!(
        "[access] identity '{}' -> clone {} of template {}",
        name,
        handle,
        template
    );
    Ok(handle)
}

/// Resolve a remote identity.
///
/// When `method` is one of `handshake_methods`, resolution is deferred: the
/// peer gets an unchecked record keyed by the fingerprint of `identity`, to
/// be settled by [`verify_remote_credentials`]. Any other method resolves
/// like a local identity.
pub fn validate_remote(
    store: &mut RuleStore,
    handshake_methods: &[String],
    method: &str,
    identity: &str,
) -> Result<Handle> {
    if !handshake_methods.iter().any(|m| m == method) {
        return validate_local(store, identity);
    }

    let key = IdentityKey::fingerprint(identity.as_bytes());
    if let Some(existing) = find_by_key(store, &key, false) {
        let name = store.participant(existing)?.name().to_string();
        return reuse_clone(store, existing, &name);
    }
    if let Some(existing) = find_by_key(store, &key, true) {
        log::debug!(
            "[access] remote identity reuses unchecked participant {}",
            existing
        );
        return Ok(existing);
    }
    let handle = store.insert_participant(ParticipantKind::Unchecked)?;
    store.participant_mut(handle)?.key = Some(key);
    log::debug!(
        "[access] remote identity pending {} handshake as {}",
        method,
        handle
    );
    Ok(handle)
}

/// Settle an unchecked participant once its handshake revealed `name`.
///
/// On a match the record becomes a clone of the template and its handle is
/// returned. If a clone with the same fingerprint and name already exists,
/// the unchecked record is folded into it and the existing handle is
/// returned instead. No match removes the record and denies the identity.
pub fn verify_remote_credentials(
    store: &mut RuleStore,
    handle: Handle,
    name: &str,
) -> Result<Handle> {
    let participant = store.participant(handle)?;
    match participant.kind() {
        ParticipantKind::Unchecked => {}
        ParticipantKind::Clone(_) => return Ok(handle),
        ParticipantKind::Template => {
            return Err(AccessError::PreconditionNotMet(format!(
                "participant {} is a template",
                handle
            )))
        }
    }
    let key = participant.key().copied();

    let template = match matching_template(store, name) {
        Ok(template) => template,
        Err(e) => {
            store.remove_participant(handle)?;
            log::warn!("[access] remote identity '{}' rejected: {}", name, e);
            return Err(e);
        }
    };

    let duplicate = key.and_then(|key| {
        store
            .participants()
            .filter(|p| p.handle() != handle && p.template().is_some())
            .find(|p| p.key() == Some(&key) && p.name() == name)
            .map(|p| p.handle())
    });
    if let Some(existing) = duplicate {
        store.remove_participant(handle)?;
        log::debug!(
            "[access] remote identity '{}' ({}) folded into clone {}",
            name,
            handle,
            existing
        );
        return Ok(existing);
    }

    let participant = store.participant_mut(handle)?;
    participant.kind = ParticipantKind::Clone(template);
    participant.access.name = name.to_string();
    log::debug!(
        "[access] remote identity '{}' ({}) linked to template {}",
        name,
        handle,
        template
    );
    Ok(handle)
}

/// Drop a clone or unchecked participant.
pub fn release(store: &mut RuleStore, handle: Handle) -> Result<()> {
    if store.participant(handle)?.is_template() {
        return Err(AccessError::PreconditionNotMet(format!(
            "participant {} is a template, not an identity",
            handle
        )));
    }
    store.remove_participant(handle)?;
    Ok(())
}

/// Re-run the template scan for `clone` against the live templates.
///
/// A clone that finds a different template is re-parented and flagged with an
/// updated permissions handle; one that finds nothing (or a blacklisted
/// template) is removed. Unchecked participants are left alone.
pub fn rematch(store: &mut RuleStore, clone: Handle) -> Result<Rematch> {
    let participant = store.participant(clone)?;
    let ParticipantKind::Clone(from) = participant.kind() else {
        return Ok(Rematch::Unchanged);
    };
    let name = participant.name().to_string();

    let target = find_template(store, &name)
        .filter(|t| store.participant(*t).is_ok_and(|p| !p.is_blacklisted()));
    let Some(to) = target else {
        store.remove_participant(clone)?;
        log::info!("[access] clone {} ('{}') released: no template left", clone, name);
        return Ok(Rematch::Released);
    };
    if to == from {
        return Ok(Rematch::Unchanged);
    }

    store.participant_mut(clone)?.kind = ParticipantKind::Clone(to);
    flag_updated_permissions(store, clone)?;
    log::info!(
        "[access] clone {} ('{}') moved from template {} to {}",
        clone,
        name,
        from,
        to
    );
    Ok(Rematch::Reparented { from, to })
}

/// Recompute the permissions handle of `participant` after its effective
/// rules changed and queue it for the host.
pub(crate) fn flag_updated_permissions(store: &mut RuleStore, participant: Handle) -> Result<()> {
    let current = store.participant(participant)?.permission_handle();
    let updated = match current.decode() {
        Some((domain, _)) => {
            let domain = Handle::from(domain);
            if store.domain(domain).is_ok() && resolver::allow_access(store, domain, participant)? {
                current
            } else {
                PermissionsHandle::INVALID
            }
        }
        None if current.is_unsecured() => current,
        None => return Ok(()),
    };
    let record = store.participant_mut(participant)?;
    record.permission_handle = updated;
    record.updated_permission_handle = Some(updated);
    Ok(())
}
