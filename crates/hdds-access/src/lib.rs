// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS Access Control Engine
//!
//! Decides whether participants may join a domain, create or match topics,
//! and use partitions, based on an administrator rule set. Authenticated
//! identities are matched against participant templates and cloned into
//! concrete records.
//!
//! # Features
//!
//! - **Rule store**: domains, participant templates, topic and partition
//!   rules addressed by stable handles
//! - **Resolution**: participant rules first, then domain rules; first
//!   matching pattern decides, exact names ahead of wildcards
//! - **Identity cloning**: local and remote identities linked to the first
//!   matching template, re-matched when the policy changes
//! - **Bulk updates**: `update_start` / `update_done` brackets with stale
//!   entry cleanup
//! - **Fine-grained lists**: per-topic read/write allow-lists of peers
//!
//! # Quick Start
//!
//! ```no_run
//! use hdds_access::{AccessEngine, TomlPolicyLoader};
//!
//! # fn main() -> hdds_access::Result<()> {
//! let engine = AccessEngine::default();
//! engine.load_policy(&TomlPolicyLoader::from_file("policy.toml")?)?;
//!
//! let identity = engine.validate_local_identity("dev-1")?;
//! let perm = engine.validate_local_permissions(identity, 0)?;
//! engine.check_create_writer(perm, "sensor/temperature", &["plant-a"])?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod hooks;
pub mod identity;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod plugin;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod transaction;

pub use config::{EngineConfig, PKI_DH_METHOD};
pub use engine::{AccessEngine, AccessEngineBuilder, PermissionsToken};
pub use error::{AccessError, EntityKind, Result};
pub use handle::PermissionsHandle;
pub use hooks::{EndpointMatch, PolicyContentHook, UserDataMatchHook};
pub use identity::Rematch;
pub use loader::{ConfigLoader, TomlPolicyLoader};
pub use matcher::{has_wildcards, name_match};
pub use model::{
    AccessLevel, Direction, Domain, DomainAccess, DomainId, DomainSecurity, FineGrainedTier,
    FineGrainedTopic, Handle, Mode, Participant, ParticipantAccess, ParticipantKind,
    PartitionAccess, PartitionRule, Protection, Rule, RuleKind, RuleList, RuleParent, TopicAccess,
    TopicRule, TopicSecurity, ANY_DOMAIN,
};
pub use plugin::{SecurityAction, SecurityReply, SecurityRequest};
pub use provider::{AesCtrStream, CredentialStore, CryptoProvider};
#[cfg(feature = "pki")]
pub use provider::{MemoryCredentialStore, RingCryptoProvider};
pub use store::{RuleStore, StoreLimits, MAX_ENTITY_HANDLE};
pub use transaction::{CommitReport, UpdateGuard};
