// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Access Control Plugin SPI
//!
//! The host middleware talks to the engine through one entry point,
//! [`AccessEngine::handle_request`]. Each request is an operation code with a
//! typed payload; each reply is a handle, an accept/reject action, a token, or
//! an error.
//!
//! Check operations never fail with `AccessDenied`: a denial is a
//! [`SecurityAction::Reject`]. Errors are reserved for malformed or stale
//! input.

use crate::engine::{AccessEngine, PermissionsToken};
use crate::error::{AccessError, Result};
use crate::handle::PermissionsHandle;
use crate::model::{DomainId, Handle};

/// Inbound request from the host middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityRequest {
    ValidateLocalIdentity {
        name: String,
    },
    ValidateRemoteIdentity {
        method: String,
        identity: String,
    },
    /// Accepted with [`SecurityReply::Handle`] instead of an action when the
    /// peer already had a clone: the host switches to that handle.
    VerifyRemoteCredentials {
        identity: Handle,
        name: String,
    },
    ReleaseIdentity {
        identity: Handle,
    },
    ValidateLocalPermissions {
        identity: Handle,
        domain_id: DomainId,
    },
    ValidateRemotePermissions {
        identity: Handle,
        domain_id: DomainId,
    },
    CheckCreateParticipant {
        permissions: PermissionsHandle,
        domain_id: DomainId,
    },
    CheckRemoteParticipant {
        permissions: PermissionsHandle,
        domain_id: DomainId,
    },
    CheckCreateTopic {
        permissions: PermissionsHandle,
        topic: String,
    },
    CheckRemoteTopic {
        permissions: PermissionsHandle,
        topic: String,
    },
    CheckCreateWriter {
        permissions: PermissionsHandle,
        topic: String,
        partitions: Vec<String>,
    },
    CheckCreateReader {
        permissions: PermissionsHandle,
        topic: String,
        partitions: Vec<String>,
    },
    CheckRemoteWriter {
        permissions: PermissionsHandle,
        topic: String,
        partitions: Vec<String>,
    },
    CheckRemoteReader {
        permissions: PermissionsHandle,
        topic: String,
        partitions: Vec<String>,
    },
    GetPermissionsCredential {
        identity: Handle,
    },
    SetPermissionsCredential {
        identity: Handle,
        token: Vec<u8>,
    },
    /// Operation code this plugin does not implement.
    Other {
        code: u32,
    },
}

impl SecurityRequest {
    /// Wire operation code.
    pub fn code(&self) -> u32 {
        match self {
            Self::ValidateLocalIdentity { .. } => 1,
            Self::ValidateRemoteIdentity { .. } => 2,
            Self::VerifyRemoteCredentials { .. } => 3,
            Self::ReleaseIdentity { .. } => 4,
            Self::ValidateLocalPermissions { .. } => 5,
            Self::ValidateRemotePermissions { .. } => 6,
            Self::CheckCreateParticipant { .. } => 7,
            Self::CheckRemoteParticipant { .. } => 8,
            Self::CheckCreateTopic { .. } => 9,
            Self::CheckRemoteTopic { .. } => 10,
            Self::CheckCreateWriter { .. } => 11,
            Self::CheckCreateReader { .. } => 12,
            Self::CheckRemoteWriter { .. } => 13,
            Self::CheckRemoteReader { .. } => 14,
            Self::GetPermissionsCredential { .. } => 15,
            Self::SetPermissionsCredential { .. } => 16,
            Self::Other { code } => *code,
        }
    }
}

/// Accept/reject outcome of a check operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityAction {
    Accept,
    Reject,
}

/// Reply to a [`SecurityRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityReply {
    /// Identity handle
    Handle(Handle),
    Permissions(PermissionsHandle),
    Action(SecurityAction),
    /// Serialized [`PermissionsToken`]
    Token(Vec<u8>),
    Done,
}

/// Map a check result to an action, keeping real failures as errors.
fn action(result: Result<()>) -> Result<SecurityReply> {
    match result {
        Ok(()) => Ok(SecurityReply::Action(SecurityAction::Accept)),
        Err(AccessError::AccessDenied(_)) => Ok(SecurityReply::Action(SecurityAction::Reject)),
        Err(e) => Err(e),
    }
}

fn partition_refs(partitions: &[String]) -> Vec<&str> {
    partitions.iter().map(String::as_str).collect()
}

impl AccessEngine {
    /// Dispatch one host request.
    pub fn handle_request(&self, request: &SecurityRequest) -> Result<SecurityReply> {
        log::trace!("[access] request op={}", request.code());
        match request {
            SecurityRequest::ValidateLocalIdentity { name } => {
                self.validate_local_identity(name).map(SecurityReply::Handle)
            }
            SecurityRequest::ValidateRemoteIdentity { method, identity } => self
                .validate_remote_identity(method, identity)
                .map(SecurityReply::Handle),
            SecurityRequest::VerifyRemoteCredentials { identity, name } => {
                match self.verify_remote_credentials(*identity, name) {
                    Ok(settled) if settled == *identity => {
                        Ok(SecurityReply::Action(SecurityAction::Accept))
                    }
                    Ok(settled) => Ok(SecurityReply::Handle(settled)),
                    Err(e) => action(Err(e)),
                }
            }
            SecurityRequest::ReleaseIdentity { identity } => {
                self.release_identity(*identity).map(|()| SecurityReply::Done)
            }
            SecurityRequest::ValidateLocalPermissions {
                identity,
                domain_id,
            } => self
                .validate_local_permissions(*identity, *domain_id)
                .map(SecurityReply::Permissions),
            SecurityRequest::ValidateRemotePermissions {
                identity,
                domain_id,
            } => self
                .validate_remote_permissions(*identity, *domain_id)
                .map(SecurityReply::Permissions),
            SecurityRequest::CheckCreateParticipant {
                permissions,
                domain_id,
            } => action(self.check_create_participant(*permissions, *domain_id)),
            SecurityRequest::CheckRemoteParticipant {
                permissions,
                domain_id,
            } => action(self.check_remote_participant(*permissions, *domain_id)),
            SecurityRequest::CheckCreateTopic { permissions, topic } => {
                action(self.check_create_topic(*permissions, topic))
            }
            SecurityRequest::CheckRemoteTopic { permissions, topic } => {
                action(self.check_remote_topic(*permissions, topic))
            }
            SecurityRequest::CheckCreateWriter {
                permissions,
                topic,
                partitions,
            } => action(self.check_create_writer(*permissions, topic, &partition_refs(partitions))),
            SecurityRequest::CheckCreateReader {
                permissions,
                topic,
                partitions,
            } => action(self.check_create_reader(*permissions, topic, &partition_refs(partitions))),
            SecurityRequest::CheckRemoteWriter {
                permissions,
                topic,
                partitions,
            } => action(self.check_remote_writer(*permissions, topic, &partition_refs(partitions))),
            SecurityRequest::CheckRemoteReader {
                permissions,
                topic,
                partitions,
            } => action(self.check_remote_reader(*permissions, topic, &partition_refs(partitions))),
            SecurityRequest::GetPermissionsCredential { identity } => self
                .permissions_credential(*identity)
                .map(|token| SecurityReply::Token(token.to_bytes())),
            SecurityRequest::SetPermissionsCredential { identity, token } => {
                let token = PermissionsToken::from_bytes(token)?;
                self.set_remote_permissions_credential(*identity, &token)
                    .map(|()| SecurityReply::Done)
            }
            SecurityRequest::Other { code } => Err(AccessError::Unsupported(format!(
                "operation code {} is not an access control request",
                code
            ))),
        }
    }
}
