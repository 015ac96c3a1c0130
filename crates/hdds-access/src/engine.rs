// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The access engine: rule store behind one lock, plus every decision the
//! security plugin exposes.
//!
//! # Permission checks
//!
//! Every check takes the [`PermissionsHandle`] produced by permissions
//! validation:
//!
//! 1. `UNSECURED` accepts without looking at the store.
//! 2. The handle is split into `(domain, participant)`.
//! 3. The topic rule is resolved (participant rules, then domain rules) and
//!    must grant the requested mode.
//! 4. Writers and readers also resolve every partition. Partition names are
//!    identities, not patterns, so wildcards are rejected.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::{AccessError, EntityKind, Result};
use crate::handle::PermissionsHandle;
use crate::hooks::{EndpointMatch, PolicyContentHook, UserDataMatchHook};
use crate::identity;
use crate::matcher::has_wildcards;
use crate::model::{DomainId, DomainSecurity, Handle, Mode, Rule, TopicRule, TopicSecurity};
use crate::provider::{CredentialStore, CryptoProvider};
use crate::resolver;
use crate::store::RuleStore;
use crate::transaction::UpdateGuard;

/// A policy document and its signature, as exchanged between participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsToken {
    pub document: Vec<u8>,
    pub signature: Vec<u8>,
}

impl PermissionsToken {
    /// `u32` big-endian document length, document, signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.document.len() + self.signature.len());
        out.extend_from_slice(&(self.document.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.document);
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let malformed = || AccessError::BadParameter("malformed permissions token".to_string());
        if bytes.len() < 4 {
            return Err(malformed());
        }
        let (len, rest) = bytes.split_at(4);
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        if rest.len() < len {
            return Err(malformed());
        }
        let (document, signature) = rest.split_at(len);
        Ok(Self {
            document: document.to_vec(),
            signature: signature.to_vec(),
        })
    }
}

/// Which side asked for a decision (only used in log lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Remote,
}

impl Origin {
    fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Builder for [`AccessEngine`].
pub struct AccessEngineBuilder {
    config: EngineConfig,
    crypto: Option<Arc<dyn CryptoProvider>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    policy_hook: Option<Arc<dyn PolicyContentHook>>,
    user_data_hook: Option<Arc<dyn UserDataMatchHook>>,
}

impl Default for AccessEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            crypto: default_crypto(),
            credentials: None,
            policy_hook: None,
            user_data_hook: None,
        }
    }
}

#[cfg(feature = "pki")]
fn default_crypto() -> Option<Arc<dyn CryptoProvider>> {
    Some(Arc::new(crate::provider::RingCryptoProvider::new()))
}

#[cfg(not(feature = "pki"))]
fn default_crypto() -> Option<Arc<dyn CryptoProvider>> {
    None
}

impl AccessEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn policy_hook(mut self, hook: Arc<dyn PolicyContentHook>) -> Self {
        self.policy_hook = Some(hook);
        self
    }

    pub fn user_data_hook(mut self, hook: Arc<dyn UserDataMatchHook>) -> Self {
        self.user_data_hook = Some(hook);
        self
    }

    pub fn build(self) -> Result<AccessEngine> {
        self.config.validate()?;
        Ok(AccessEngine {
            store: Mutex::new(RuleStore::new(self.config.store_limits())),
            config: self.config,
            crypto: self.crypto,
            credentials: self.credentials,
            policy_hook: self.policy_hook,
            user_data_hook: self.user_data_hook,
        })
    }
}

/// Access-control engine.
///
/// One mutex guards the whole rule store. Every call takes it for its
/// duration; [`AccessEngine::update_start`] holds it across a batch.
pub struct AccessEngine {
    store: Mutex<RuleStore>,
    config: EngineConfig,
    crypto: Option<Arc<dyn CryptoProvider>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    policy_hook: Option<Arc<dyn PolicyContentHook>>,
    user_data_hook: Option<Arc<dyn UserDataMatchHook>>,
}

impl AccessEngine {
    pub fn builder() -> AccessEngineBuilder {
        AccessEngineBuilder::default()
    }

    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Store access
    // ------------------------------------------------------------------

    /// Start a bulk update. The returned guard holds the store lock until
    /// [`UpdateGuard::update_done`] or drop.
    pub fn update_start(&self) -> UpdateGuard<'_> {
        UpdateGuard::new(self.store.lock())
    }

    /// Run one mutation under the lock, outside any update bracket.
    pub fn edit<T>(&self, f: impl FnOnce(&mut RuleStore) -> Result<T>) -> Result<T> {
        f(&mut *self.store.lock())
    }

    /// Read the store under the lock.
    pub fn inspect<T>(&self, f: impl FnOnce(&RuleStore) -> T) -> T {
        f(&*self.store.lock())
    }

    /// Remove a participant. Clones of a removed template are matched again
    /// right away: re-parented if another template admits them, released
    /// otherwise.
    pub fn remove_participant(&self, handle: Handle) -> Result<()> {
        let mut store = self.store.lock();
        let clones = store.clones_of(handle);
        store.remove_participant(handle)?;
        for clone in clones {
            identity::rematch(&mut store, clone)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------

    pub fn validate_local_identity(&self, name: &str) -> Result<Handle> {
        identity::validate_local(&mut self.store.lock(), name)
    }

    pub fn validate_remote_identity(&self, method: &str, identity: &str) -> Result<Handle> {
        identity::validate_remote(
            &mut self.store.lock(),
            &self.config.handshake_methods,
            method,
            identity,
        )
    }

    /// Returns the settled identity handle, which differs from `identity`
    /// when the peer already had a clone.
    pub fn verify_remote_credentials(&self, identity: Handle, name: &str) -> Result<Handle> {
        identity::verify_remote_credentials(&mut self.store.lock(), identity, name)
    }

    pub fn release_identity(&self, identity: Handle) -> Result<()> {
        identity::release(&mut self.store.lock(), identity)
    }

    // ------------------------------------------------------------------
    // Permissions validation
    // ------------------------------------------------------------------

    pub fn validate_local_permissions(
        &self,
        identity: Handle,
        domain_id: DomainId,
    ) -> Result<PermissionsHandle> {
        self.validate_permissions(identity, domain_id, Origin::Local)
    }

    pub fn validate_remote_permissions(
        &self,
        identity: Handle,
        domain_id: DomainId,
    ) -> Result<PermissionsHandle> {
        self.validate_permissions(identity, domain_id, Origin::Remote)
    }

    fn validate_permissions(
        &self,
        identity: Handle,
        domain_id: DomainId,
        origin: Origin,
    ) -> Result<PermissionsHandle> {
        let mut store = self.store.lock();
        store.participant(identity)?;

        let perm = match store.find_domain(domain_id) {
            None => PermissionsHandle::UNSECURED,
            Some(domain) => {
                if !resolver::allow_access(&store, domain, identity)? {
                    return Err(AccessError::denied(format!(
                        "{} participant {} may not join domain {}",
                        origin.as_str(),
                        identity,
                        domain_id
                    )));
                }
                PermissionsHandle::from_handles(domain, identity).ok_or_else(|| {
                    AccessError::OutOfResources(format!(
                        "handles {}:{} do not fit a permissions handle",
                        domain, identity
                    ))
                })?
            }
        };
        store.participant_mut(identity)?.permission_handle = perm;
        if self.config.log_decisions {
            log::debug!(
                "[access] {} participant {} domain {} -> {}",
                origin.as_str(),
                identity,
                domain_id,
                perm
            );
        }
        Ok(perm)
    }

    /// Drain permissions handles changed by re-matching since the last call.
    pub fn take_updated_permissions(&self) -> Vec<(Handle, PermissionsHandle)> {
        let mut guard = self.store.lock();
        let store = &mut *guard;
        let mut updated = Vec::new();
        for handle in &store.participant_order {
            if let Some(participant) = store.participants.get_mut(handle) {
                if let Some(perm) = participant.updated_permission_handle.take() {
                    updated.push((*handle, perm));
                }
            }
        }
        updated
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    pub fn allow_access(&self, domain: Handle, participant: Handle) -> Result<bool> {
        resolver::allow_access(&self.store.lock(), domain, participant)
    }

    /// Snapshot of the topic rule deciding for `participant` in `domain`.
    pub fn lookup_topic(
        &self,
        domain: Handle,
        participant: Handle,
        topic: &str,
    ) -> Result<Option<TopicRule>> {
        let store = self.store.lock();
        Ok(resolver::lookup_topic(&store, domain, participant, topic)?.cloned())
    }

    pub fn check_create_participant(
        &self,
        perm: PermissionsHandle,
        domain_id: DomainId,
    ) -> Result<()> {
        self.check_participant(perm, domain_id, Origin::Local)
    }

    pub fn check_remote_participant(
        &self,
        perm: PermissionsHandle,
        domain_id: DomainId,
    ) -> Result<()> {
        self.check_participant(perm, domain_id, Origin::Remote)
    }

    /// Local topic creation needs the CREATE bit.
    pub fn check_create_topic(&self, perm: PermissionsHandle, topic: &str) -> Result<()> {
        self.check_endpoint(perm, topic, &[], Mode::CREATE, Origin::Local)
    }

    /// A remote topic is acceptable if the peer may read or write it.
    pub fn check_remote_topic(&self, perm: PermissionsHandle, topic: &str) -> Result<()> {
        self.check_endpoint(perm, topic, &[], Mode::READ | Mode::WRITE, Origin::Remote)
    }

    pub fn check_create_writer(
        &self,
        perm: PermissionsHandle,
        topic: &str,
        partitions: &[&str],
    ) -> Result<()> {
        self.check_endpoint(perm, topic, partitions, Mode::WRITE, Origin::Local)
    }

    pub fn check_create_reader(
        &self,
        perm: PermissionsHandle,
        topic: &str,
        partitions: &[&str],
    ) -> Result<()> {
        self.check_endpoint(perm, topic, partitions, Mode::READ, Origin::Local)
    }

    pub fn check_remote_writer(
        &self,
        perm: PermissionsHandle,
        topic: &str,
        partitions: &[&str],
    ) -> Result<()> {
        self.check_endpoint(perm, topic, partitions, Mode::WRITE, Origin::Remote)
    }

    pub fn check_remote_reader(
        &self,
        perm: PermissionsHandle,
        topic: &str,
        partitions: &[&str],
    ) -> Result<()> {
        self.check_endpoint(perm, topic, partitions, Mode::READ, Origin::Remote)
    }

    fn check_participant(
        &self,
        perm: PermissionsHandle,
        domain_id: DomainId,
        origin: Origin,
    ) -> Result<()> {
        let store = self.store.lock();
        let Some((domain, participant)) = resolve(&store, perm)? else {
            return Ok(());
        };
        let result = if !store.domain(domain)?.covers(domain_id) {
            Err(AccessError::denied(format!(
                "{} does not cover domain {}",
                perm, domain_id
            )))
        } else if !resolver::allow_access(&store, domain, participant)? {
            Err(AccessError::denied(format!(
                "participant {} may not join domain {}",
                participant, domain_id
            )))
        } else {
            Ok(())
        };
        self.log_decision(origin, "participant", &domain_id.to_string(), &result);
        result
    }

    fn check_endpoint(
        &self,
        perm: PermissionsHandle,
        topic: &str,
        partitions: &[&str],
        mode: Mode,
        origin: Origin,
    ) -> Result<()> {
        let store = self.store.lock();
        let Some((domain, participant)) = resolve(&store, perm)? else {
            return Ok(());
        };
        let result = check_rules(&store, domain, participant, topic, partitions, mode);
        self.log_decision(origin, "topic", topic, &result);
        result
    }

    fn log_decision(&self, origin: Origin, what: &str, subject: &str, result: &Result<()>) {
        if !self.config.log_decisions {
            return;
        }
        match result {
            Ok(()) => log::debug!("[access] {} {} '{}' allowed", origin.as_str(), what, subject),
            Err(e) => log::debug!(
                "[access] {} {} '{}' refused: {}",
                origin.as_str(),
                what,
                subject,
                e
            ),
        }
    }

    // ------------------------------------------------------------------
    // Endpoint matching
    // ------------------------------------------------------------------

    /// A local writer against a discovered reader.
    pub fn check_datawriter_match(
        &self,
        writer: &EndpointMatch<'_>,
        reader: &EndpointMatch<'_>,
    ) -> Result<()> {
        self.check_match(writer, reader)
    }

    /// A local reader against a discovered writer.
    pub fn check_datareader_match(
        &self,
        reader: &EndpointMatch<'_>,
        writer: &EndpointMatch<'_>,
    ) -> Result<()> {
        self.check_match(writer, reader)
    }

    fn check_match(&self, writer: &EndpointMatch<'_>, reader: &EndpointMatch<'_>) -> Result<()> {
        {
            let store = self.store.lock();
            let writer_side = resolve(&store, writer.permissions)?;
            let reader_side = resolve(&store, reader.permissions)?;
            for (side, perm) in [
                (writer_side, writer.permissions),
                (reader_side, reader.permissions),
            ] {
                if let Some((d, p)) = side {
                    if !resolver::allow_access(&store, d, p)? {
                        log::warn!("[access] {} no longer admitted to its domain", perm);
                        return Err(AccessError::denied(format!(
                            "{} is not admitted to domain {}",
                            perm, d
                        )));
                    }
                }
            }

            let writer_rule = match writer_side {
                Some((d, p)) => Some(matched_rule(&store, d, p, writer.topic)?),
                None => None,
            };
            let reader_rule = match reader_side {
                Some((d, p)) => Some(matched_rule(&store, d, p, reader.topic)?),
                None => None,
            };
            let writer_participant = writer_side
                .map(|(_, p)| store.participant(p))
                .transpose()?;
            let reader_participant = reader_side
                .map(|(_, p)| store.participant(p))
                .transpose()?;

            if !resolver::fine_grained_match(
                writer_rule,
                writer_participant,
                reader_rule,
                reader_participant,
            ) {
                log::warn!(
                    "[access] {} -> {} on '{}' refused by fine-grained lists",
                    writer.permissions,
                    reader.permissions,
                    writer.topic
                );
                return Err(AccessError::denied(format!(
                    "fine-grained lists of '{}' refuse {} -> {}",
                    writer.topic, writer.permissions, reader.permissions
                )));
            }
        }

        if let Some(hook) = &self.user_data_hook {
            if !hook.check_match(writer, reader) {
                return Err(AccessError::denied(format!(
                    "user data match refused {} -> {}",
                    writer.permissions, reader.permissions
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Security attributes
    // ------------------------------------------------------------------

    /// Protection the domain behind `perm` requires. An open domain requires
    /// none.
    pub fn domain_security(&self, perm: PermissionsHandle) -> Result<DomainSecurity> {
        let store = self.store.lock();
        match resolve(&store, perm)? {
            None => Ok(DomainSecurity::default()),
            Some((domain, _)) => Ok(store.domain(domain)?.access().security),
        }
    }

    /// Protection flags of the rule deciding `topic` for `perm`.
    pub fn topic_security(&self, perm: PermissionsHandle, topic: &str) -> Result<TopicSecurity> {
        let store = self.store.lock();
        match resolve(&store, perm)? {
            None => Ok(TopicSecurity::NONE),
            Some((d, p)) => Ok(matched_rule(&store, d, p, topic)?.security()),
        }
    }

    // ------------------------------------------------------------------
    // Permissions credentials
    // ------------------------------------------------------------------

    fn policy_hook(&self) -> Result<&Arc<dyn PolicyContentHook>> {
        self.policy_hook
            .as_ref()
            .ok_or_else(|| AccessError::Unsupported("no policy content hook installed".into()))
    }

    fn crypto(&self) -> Result<&Arc<dyn CryptoProvider>> {
        self.crypto
            .as_ref()
            .ok_or_else(|| AccessError::Unsupported("no crypto provider installed".into()))
    }

    fn credential_store(&self) -> Result<&Arc<dyn CredentialStore>> {
        self.credentials
            .as_ref()
            .ok_or_else(|| AccessError::Unsupported("no credential store installed".into()))
    }

    /// Signed policy document for a local identity.
    pub fn permissions_credential(&self, identity: Handle) -> Result<PermissionsToken> {
        let hook = self.policy_hook()?;
        let crypto = self.crypto()?;
        let credentials = self.credential_store()?;
        self.inspect(|store| store.participant(identity).map(|_| ()))?;

        let document = hook.local_policy(identity)?;
        let key = credentials.get_key(identity)?;
        let signature = crypto.sign(&key, &document)?;
        Ok(PermissionsToken {
            document,
            signature,
        })
    }

    /// Verify a peer's signed policy document and hand it to the policy hook.
    pub fn set_remote_permissions_credential(
        &self,
        identity: Handle,
        token: &PermissionsToken,
    ) -> Result<()> {
        let hook = self.policy_hook()?;
        let crypto = self.crypto()?;
        let credentials = self.credential_store()?;
        self.inspect(|store| store.participant(identity).map(|_| ()))?;

        let cert = credentials.get_cert(identity)?;
        if !crypto.verify(&cert, &token.document, &token.signature)? {
            log::warn!(
                "[access] permissions credential of {} failed verification",
                identity
            );
            return Err(AccessError::denied(format!(
                "permissions credential of {} has a bad signature",
                identity
            )));
        }
        hook.remote_policy(identity, &token.document)
    }
}

impl Default for AccessEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            store: Mutex::new(RuleStore::new(config.store_limits())),
            config,
            crypto: default_crypto(),
            credentials: None,
            policy_hook: None,
            user_data_hook: None,
        }
    }
}

/// Split a permissions handle into live `(domain, participant)` handles.
/// `None` is an open domain.
fn resolve(store: &RuleStore, perm: PermissionsHandle) -> Result<Option<(Handle, Handle)>> {
    if perm.is_unsecured() {
        return Ok(None);
    }
    let (domain, participant) = perm
        .decode()
        .ok_or_else(|| AccessError::not_found(EntityKind::PermissionsHandle, perm.raw()))?;
    let (domain, participant) = (Handle::from(domain), Handle::from(participant));
    store.domain(domain)?;
    store.participant(participant)?;
    Ok(Some((domain, participant)))
}

fn matched_rule<'a>(
    store: &'a RuleStore,
    domain: Handle,
    participant: Handle,
    topic: &str,
) -> Result<&'a TopicRule> {
    resolver::lookup_topic(store, domain, participant, topic)?
        .ok_or_else(|| AccessError::denied(format!("no rule grants topic '{}'", topic)))
}

fn check_rules(
    store: &RuleStore,
    domain: Handle,
    participant: Handle,
    topic: &str,
    partitions: &[&str],
    mode: Mode,
) -> Result<()> {
    let rule = matched_rule(store, domain, participant, topic)?;
    if !rule.mode().intersects(mode) {
        return Err(AccessError::denied(format!(
            "rule for topic '{}' grants {} but {} is required",
            topic,
            rule.mode(),
            mode
        )));
    }
    for partition in partitions {
        if has_wildcards(partition) {
            return Err(AccessError::BadParameter(format!(
                "partition '{}' contains wildcards",
                partition
            )));
        }
        if resolver::lookup_partition(store, domain, participant, partition, mode)?.is_none() {
            return Err(AccessError::denied(format!(
                "no rule grants partition '{}'",
                partition
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
