// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Extension points for the host application.

use crate::error::Result;
use crate::handle::PermissionsHandle;
use crate::model::Handle;

/// One side of a writer/reader match.
#[derive(Debug, Clone, Copy)]
pub struct EndpointMatch<'a> {
    pub permissions: PermissionsHandle,
    pub topic: &'a str,
    /// Opaque user data announced by the endpoint.
    pub user_data: &'a [u8],
}

impl<'a> EndpointMatch<'a> {
    pub fn new(permissions: PermissionsHandle, topic: &'a str) -> Self {
        Self {
            permissions,
            topic,
            user_data: &[],
        }
    }

    pub fn with_user_data(mut self, user_data: &'a [u8]) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Source and sink of signed policy documents exchanged with peers.
pub trait PolicyContentHook: Send + Sync {
    /// Policy document describing the local identity's permissions.
    fn local_policy(&self, identity: Handle) -> Result<Vec<u8>>;

    /// A peer's verified policy document.
    fn remote_policy(&self, identity: Handle, document: &[u8]) -> Result<()>;
}

/// Custom accept/reject logic applied after fine-grained matching passed.
pub trait UserDataMatchHook: Send + Sync {
    fn check_match(&self, writer: &EndpointMatch<'_>, reader: &EndpointMatch<'_>) -> bool;
}
