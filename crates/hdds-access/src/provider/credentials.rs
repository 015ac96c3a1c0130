// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::collections::HashMap;

use parking_lot::Mutex;
use zeroize::Zeroizing;

use super::CredentialStore;
use crate::error::{AccessError, Result};
use crate::model::Handle;

struct Credential {
    name: Option<String>,
    cert_pem: Vec<u8>,
    key_pem: Option<Zeroizing<Vec<u8>>>,
}

/// In-process credential store. Private keys are wiped on removal.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<Handle, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Subject name recorded with an identity's credentials.
    pub fn name(&self, id: Handle) -> Option<String> {
        self.entries.lock().get(&id).and_then(|c| c.name.clone())
    }
}

fn missing(what: &str, id: Handle) -> AccessError {
    AccessError::Crypto(format!("no {} stored for identity {}", what, id))
}

impl CredentialStore for MemoryCredentialStore {
    fn add(
        &self,
        id: Handle,
        name: Option<&str>,
        cert_pem: &[u8],
        key_pem: Option<&[u8]>,
    ) -> Result<()> {
        if cert_pem.is_empty() {
            return Err(AccessError::BadParameter("empty certificate".to_string()));
        }
        let mut entries = self.entries.lock();
        entries.try_reserve(1)?;
        entries.insert(
            id,
            Credential {
                name: name.map(str::to_string),
                cert_pem: cert_pem.to_vec(),
                key_pem: key_pem.map(|k| Zeroizing::new(k.to_vec())),
            },
        );
        log::debug!("[access] stored credentials for identity {}", id);
        Ok(())
    }

    fn get_cert(&self, id: Handle) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .get(&id)
            .map(|c| c.cert_pem.clone())
            .ok_or_else(|| missing("certificate", id))
    }

    fn get_key(&self, id: Handle) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .get(&id)
            .and_then(|c| c.key_pem.as_ref())
            .map(|k| k.to_vec())
            .ok_or_else(|| missing("private key", id))
    }

    fn remove(&self, id: Handle) -> Result<()> {
        self.entries
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| missing("credentials", id))
    }
}
