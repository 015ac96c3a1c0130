// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! ```toml
//! fine_grained_capacity = 64
//! max_rules_per_list = 4096
//! log_decisions = true
//! handshake_methods = ["DDS:Auth:PKI-DH:1.0"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};
use crate::store::StoreLimits;

/// Authentication method that defers identity resolution to a handshake.
pub const PKI_DH_METHOD: &str = "DDS:Auth:PKI-DH:1.0";

/// Access engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Participant handles per fine-grained list and direction.
    #[serde(default = "default_fine_grained_capacity")]
    pub fine_grained_capacity: usize,

    /// Rules per domain or participant list.
    #[serde(default = "default_max_rules_per_list")]
    pub max_rules_per_list: usize,

    /// Emit a debug line per access decision.
    #[serde(default = "default_true")]
    pub log_decisions: bool,

    /// Remote authentication methods resolved only after a handshake.
    #[serde(default = "default_handshake_methods")]
    pub handshake_methods: Vec<String>,
}

fn default_fine_grained_capacity() -> usize {
    64
}

fn default_max_rules_per_list() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

fn default_handshake_methods() -> Vec<String> {
    vec![PKI_DH_METHOD.to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fine_grained_capacity: default_fine_grained_capacity(),
            max_rules_per_list: default_max_rules_per_list(),
            log_decisions: true,
            handshake_methods: default_handshake_methods(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AccessError::Config(format!("TOML parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AccessError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fine_grained_capacity == 0 {
            return Err(AccessError::Config(
                "fine_grained_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_rules_per_list == 0 {
            return Err(AccessError::Config(
                "max_rules_per_list must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            max_rules_per_list: self.max_rules_per_list,
            fine_grained_capacity: self.fine_grained_capacity,
        }
    }
}
