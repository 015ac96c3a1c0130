// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Policy loading.
//!
//! A [`ConfigLoader`] turns an administrator document into the same
//! add/set calls the [`RuleStore`] API exposes. Every entry is looked up
//! before it is added, so loading the same document again inside an update
//! refreshes the existing records instead of duplicating them.
//!
//! # TOML layout
//!
//! ```toml
//! [[domains]]
//! domain_id = 0              # omitted: every domain without its own record
//! level = "secret"
//! exclusive = false
//! security = { rtps_protection = "encrypt" }
//!
//! [[domains.topics]]
//! name = "sensor/*"
//! mode = ["read", "write"]
//! fine_grained = { read = ["dev-*"], write = ["dev-*"] }
//!
//! [[domains.partitions]]
//! name = "plant-a"
//! mode = ["read", "write"]
//!
//! [[participants]]
//! name = "dev-*"
//! level = "top_secret"
//!
//! [[participants.topics]]
//! name = "debug/*"
//! domain_id = 0
//! mode = ["all"]
//! ```
//!
//! Fine-grained lists name participant templates. They are resolved once
//! every participant of the document is declared.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::engine::AccessEngine;
use crate::error::{AccessError, Result};
use crate::model::{
    AccessLevel, DomainAccess, DomainId, DomainSecurity, FineGrainedTier, FineGrainedTopic, Handle,
    Mode, ParticipantAccess, PartitionAccess, Protection, Rule, RuleParent, TopicAccess,
    TopicSecurity, ANY_DOMAIN,
};
use crate::store::RuleStore;
use crate::transaction::CommitReport;

/// Source of rule-creation calls.
pub trait ConfigLoader {
    /// Declare every record of the policy in `store`.
    fn apply(&self, store: &mut RuleStore) -> Result<()>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    #[serde(default)]
    domains: Vec<DomainDoc>,
    #[serde(default)]
    participants: Vec<ParticipantDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DomainDoc {
    domain_id: Option<DomainId>,
    #[serde(default)]
    level: AccessLevel,
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    blacklist: bool,
    #[serde(default)]
    security: DomainSecurityDoc,
    #[serde(default)]
    topics: Vec<TopicDoc>,
    #[serde(default)]
    partitions: Vec<PartitionDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DomainSecurityDoc {
    #[serde(default)]
    rtps_protection: Protection,
    #[serde(default)]
    secure_transport: bool,
    #[serde(default)]
    discovery_protection: Protection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParticipantDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    level: AccessLevel,
    #[serde(default)]
    blacklist: bool,
    #[serde(default)]
    topics: Vec<TopicDoc>,
    #[serde(default)]
    partitions: Vec<PartitionDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopicDoc {
    name: Option<String>,
    domain_id: Option<DomainId>,
    #[serde(default)]
    mode: Vec<String>,
    #[serde(default)]
    blacklist: bool,
    #[serde(default)]
    security: TopicSecurityDoc,
    fine_grained: Option<FineGrainedDoc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TopicSecurityDoc {
    #[serde(default)]
    controlled: bool,
    #[serde(default)]
    discovery_protection: bool,
    #[serde(default)]
    submessage_protection: Protection,
    #[serde(default)]
    payload_protection: Protection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FineGrainedDoc {
    #[serde(default)]
    read: Vec<String>,
    #[serde(default)]
    write: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartitionDoc {
    name: Option<String>,
    domain_id: Option<DomainId>,
    #[serde(default)]
    mode: Vec<String>,
    #[serde(default)]
    blacklist: bool,
}

impl PolicyDocument {
    fn validate(&self) -> Result<()> {
        let declared: HashSet<&str> = self
            .participants
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        let topics = self
            .domains
            .iter()
            .flat_map(|d| &d.topics)
            .chain(self.participants.iter().flat_map(|p| &p.topics));
        for topic in topics {
            parse_mode(&topic.mode)?;
            let Some(names) = &topic.fine_grained else {
                continue;
            };
            if let Some(name) = names
                .read
                .iter()
                .chain(&names.write)
                .find(|name| !declared.contains(name.as_str()))
            {
                return Err(AccessError::Config(format!(
                    "fine-grained list names unknown participant '{}'",
                    name
                )));
            }
        }

        let partitions = self
            .domains
            .iter()
            .flat_map(|d| &d.partitions)
            .chain(self.participants.iter().flat_map(|p| &p.partitions));
        for partition in partitions {
            parse_mode(&partition.mode)?;
        }
        Ok(())
    }
}

fn parse_mode(words: &[String]) -> Result<Mode> {
    let mut mode = Mode::NONE;
    for word in words {
        mode |= Mode::from_keyword(word)
            .ok_or_else(|| AccessError::Config(format!("unknown mode '{}'", word)))?;
    }
    Ok(mode)
}

/// A fine-grained list waiting for its template names to be resolved.
struct PendingList<'a> {
    parent: RuleParent,
    topic: Handle,
    names: &'a FineGrainedDoc,
}

/// Policy loader for TOML documents.
#[derive(Debug, Clone, Default)]
pub struct TomlPolicyLoader {
    document: PolicyDocument,
}

impl TomlPolicyLoader {
    /// Parse and check a document. Unknown mode keywords and fine-grained
    /// names without a matching `[[participants]]` entry are rejected here,
    /// before any store is touched.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: PolicyDocument = toml::from_str(content)
            .map_err(|e| AccessError::Config(format!("invalid policy document: {}", e)))?;
        document.validate()?;
        Ok(Self { document })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AccessError::Config(format!("cannot read policy {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn domain_count(&self) -> usize {
        self.document.domains.len()
    }

    pub fn participant_count(&self) -> usize {
        self.document.participants.len()
    }

    fn declare_domain<'a>(
        store: &mut RuleStore,
        doc: &'a DomainDoc,
        pending: &mut Vec<PendingList<'a>>,
    ) -> Result<()> {
        let domain_id = doc.domain_id.unwrap_or(ANY_DOMAIN);
        let handle = match store.find_domain_exact(domain_id) {
            Some(handle) => handle,
            None => store.add_domain()?,
        };
        store.set_domain_access(
            handle,
            DomainAccess {
                domain_id,
                level: doc.level,
                exclusive: doc.exclusive,
                blacklist: doc.blacklist,
                security: DomainSecurity {
                    rtps_protection: doc.security.rtps_protection,
                    secure_transport: doc.security.secure_transport,
                    discovery_protection: doc.security.discovery_protection,
                },
            },
        )?;
        let parent = RuleParent::Domain(handle);
        for topic in &doc.topics {
            declare_topic(store, parent, topic, pending)?;
        }
        for partition in &doc.partitions {
            declare_partition(store, parent, partition)?;
        }
        Ok(())
    }

    fn declare_participant<'a>(
        store: &mut RuleStore,
        doc: &'a ParticipantDoc,
        pending: &mut Vec<PendingList<'a>>,
    ) -> Result<()> {
        let handle = match store.template_by_name(&doc.name) {
            Some(handle) => handle,
            None => store.add_participant()?,
        };
        store.set_participant_access(
            handle,
            ParticipantAccess {
                name: doc.name.clone(),
                level: doc.level,
                blacklist: doc.blacklist,
            },
        )?;
        let parent = RuleParent::Participant(handle);
        for topic in &doc.topics {
            declare_topic(store, parent, topic, pending)?;
        }
        for partition in &doc.partitions {
            declare_partition(store, parent, partition)?;
        }
        Ok(())
    }
}

/// Explicit rule of `parent` with this exact name and domain id.
fn find_rule<R: Rule>(rules: Vec<&R>, name: Option<&str>, domain_id: DomainId) -> Option<Handle> {
    rules
        .into_iter()
        .find(|r| r.handle() != 0 && r.name() == name && r.domain_id() == domain_id)
        .map(|r| r.handle())
}

fn declare_topic<'a>(
    store: &mut RuleStore,
    parent: RuleParent,
    doc: &'a TopicDoc,
    pending: &mut Vec<PendingList<'a>>,
) -> Result<()> {
    let domain_id = doc.domain_id.unwrap_or(ANY_DOMAIN);
    let name = doc.name.as_deref();
    let existing = find_rule(store.topics(parent)?, name, domain_id);
    let handle = match existing {
        Some(handle) => handle,
        None => store.add_topic(parent)?,
    };
    store.set_topic_access(
        parent,
        handle,
        TopicAccess {
            name: doc.name.clone(),
            mode: parse_mode(&doc.mode)?,
            domain_id,
            security: TopicSecurity {
                controlled: doc.security.controlled,
                discovery_protection: doc.security.discovery_protection,
                submessage_protection: doc.security.submessage_protection,
                payload_protection: doc.security.payload_protection,
            },
            blacklist: doc.blacklist,
        },
    )?;
    match &doc.fine_grained {
        Some(names) => pending.push(PendingList {
            parent,
            topic: handle,
            names,
        }),
        None => {
            store.clear_fine_grained(parent, handle, FineGrainedTier::Admin)?;
        }
    }
    Ok(())
}

fn declare_partition(store: &mut RuleStore, parent: RuleParent, doc: &PartitionDoc) -> Result<()> {
    let domain_id = doc.domain_id.unwrap_or(ANY_DOMAIN);
    let name = doc.name.as_deref();
    let existing = find_rule(store.partitions(parent)?, name, domain_id);
    let handle = match existing {
        Some(handle) => handle,
        None => store.add_partition(parent)?,
    };
    store.set_partition_access(
        parent,
        handle,
        PartitionAccess {
            name: doc.name.clone(),
            mode: parse_mode(&doc.mode)?,
            domain_id,
            blacklist: doc.blacklist,
        },
    )
}

fn resolve_templates(store: &RuleStore, names: &[String]) -> Result<Vec<Handle>> {
    names
        .iter()
        .map(|name| {
            store.template_by_name(name).ok_or_else(|| {
                AccessError::Config(format!(
                    "fine-grained list names unknown participant '{}'",
                    name
                ))
            })
        })
        .collect()
}

impl ConfigLoader for TomlPolicyLoader {
    fn apply(&self, store: &mut RuleStore) -> Result<()> {
        let mut pending = Vec::new();
        for domain in &self.document.domains {
            Self::declare_domain(store, domain, &mut pending)?;
        }
        for participant in &self.document.participants {
            Self::declare_participant(store, participant, &mut pending)?;
        }

        let capacity = store.limits().fine_grained_capacity;
        for list in pending {
            let read = resolve_templates(store, &list.names.read)?;
            let write = resolve_templates(store, &list.names.write)?;
            let topic = FineGrainedTopic::from_lists(&read, &write, capacity)?;
            store.set_fine_grained(list.parent, list.topic, FineGrainedTier::Admin, topic)?;
        }
        log::debug!(
            "[access] policy applied: {} domains, {} participants",
            self.domain_count(),
            self.participant_count()
        );
        Ok(())
    }
}

impl AccessEngine {
    /// Load a policy inside one update bracket and commit it.
    ///
    /// Records the policy no longer declares are removed by the commit. If
    /// the loader fails, the store is rolled back to the rules it held before
    /// the load.
    pub fn load_policy(&self, loader: &dyn ConfigLoader) -> Result<CommitReport> {
        let mut guard = self.update_start();
        let snapshot = RuleStore::clone(&guard);
        if let Err(e) = loader.apply(&mut guard) {
            log::warn!("[access] policy load failed, previous rules kept: {}", e);
            guard.rollback(snapshot);
            return Err(e);
        }
        guard.update_done()
    }
}
