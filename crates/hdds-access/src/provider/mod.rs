// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cryptographic and credential backends the engine calls out to.
//!
//! Backends are selected at construction time through
//! [`crate::AccessEngineBuilder`]. With the `pki` feature the crate ships a
//! ring-based [`RingCryptoProvider`] and an in-memory
//! [`MemoryCredentialStore`].

use crate::error::Result;
use crate::model::Handle;

#[cfg(feature = "pki")]
mod credentials;
#[cfg(feature = "pki")]
mod pki;

#[cfg(feature = "pki")]
pub use credentials::MemoryCredentialStore;
#[cfg(feature = "pki")]
pub use pki::RingCryptoProvider;

/// Running AES-CTR key stream.
pub trait AesCtrStream: Send {
    /// Encrypt or decrypt `data` in place, continuing the key stream.
    fn update(&mut self, data: &mut [u8]);

    /// Release the key stream.
    fn end(self: Box<Self>) {}
}

/// Hashing, MAC, stream cipher and signature primitives.
pub trait CryptoProvider: Send + Sync {
    fn hash(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Start an AES-CTR stream. The first counter block is `iv || counter`
    /// (12-byte IV, big-endian 32-bit counter).
    fn aes_ctr_begin(&self, key: &[u8], iv: &[u8], counter: u32) -> Result<Box<dyn AesCtrStream>>;

    /// One-shot AES-CTR over `data`.
    fn aes_ctr(&self, key: &[u8], iv: &[u8], counter: u32, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = data.to_vec();
        let mut stream = self.aes_ctr_begin(key, iv, counter)?;
        stream.update(&mut out);
        stream.end();
        Ok(out)
    }

    /// Sign `data` with a PEM encoded private key.
    fn sign(&self, key_pem: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Check `signature` over `data` against a PEM encoded certificate.
    fn verify(&self, cert_pem: &[u8], data: &[u8], signature: &[u8]) -> Result<bool>;
}

/// Certificates and private keys of known identities.
pub trait CredentialStore: Send + Sync {
    fn add(
        &self,
        id: Handle,
        name: Option<&str>,
        cert_pem: &[u8],
        key_pem: Option<&[u8]>,
    ) -> Result<()>;

    fn get_cert(&self, id: Handle) -> Result<Vec<u8>>;

    fn get_key(&self, id: Handle) -> Result<Vec<u8>>;

    fn remove(&self, id: Handle) -> Result<()>;
}
