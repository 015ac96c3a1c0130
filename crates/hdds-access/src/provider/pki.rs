// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ring-backed crypto provider.
//!
//! - hash: SHA-256
//! - hmac: HMAC-SHA256
//! - aes_ctr: AES-128/256 in CTR mode (key length selects the variant)
//! - sign/verify: ECDSA P-256, fixed (r||s) signatures, DER accepted on verify

use aes::{Aes128, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, UnparsedPublicKey};
use ring::{digest, hmac};

use super::{AesCtrStream, CryptoProvider};
use crate::error::{AccessError, Result};

const IV_LEN: usize = 12;

enum CtrStream {
    Aes128(ctr::Ctr128BE<Aes128>),
    Aes256(ctr::Ctr128BE<Aes256>),
}

impl AesCtrStream for CtrStream {
    fn update(&mut self, data: &mut [u8]) {
        match self {
            Self::Aes128(cipher) => cipher.apply_keystream(data),
            Self::Aes256(cipher) => cipher.apply_keystream(data),
        }
    }
}

/// [`CryptoProvider`] built on ring, RustCrypto AES and x509-parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct RingCryptoProvider;

impl RingCryptoProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoProvider for RingCryptoProvider {
    fn hash(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(digest::digest(&digest::SHA256, data).as_ref().to_vec())
    }

    fn hmac(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        Ok(hmac::sign(&key, data).as_ref().to_vec())
    }

    fn aes_ctr_begin(&self, key: &[u8], iv: &[u8], counter: u32) -> Result<Box<dyn AesCtrStream>> {
        if iv.len() != IV_LEN {
            return Err(AccessError::Crypto(format!(
                "AES-CTR IV must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }
        let mut block = [0u8; 16];
        block[..IV_LEN].copy_from_slice(iv);
        block[IV_LEN..].copy_from_slice(&counter.to_be_bytes());

        let invalid = |_| AccessError::Crypto("invalid AES-CTR key or IV".to_string());
        let stream = match key.len() {
            16 => CtrStream::Aes128(
                ctr::Ctr128BE::<Aes128>::new_from_slices(key, &block).map_err(invalid)?,
            ),
            32 => CtrStream::Aes256(
                ctr::Ctr128BE::<Aes256>::new_from_slices(key, &block).map_err(invalid)?,
            ),
            n => {
                return Err(AccessError::Crypto(format!(
                    "AES key must be 16 or 32 bytes, got {}",
                    n
                )))
            }
        };
        Ok(Box::new(stream))
    }

    fn sign(&self, key_pem: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let pem = ::pem::parse(key_pem)
            .map_err(|e| AccessError::Crypto(format!("Failed to parse private key PEM: {}", e)))?;
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(
            &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            pem.contents(),
            &rng,
        )
        .map_err(|e| AccessError::Crypto(format!("Unsupported private key: {}", e)))?;
        let sig = key_pair
            .sign(&rng, data)
            .map_err(|e| AccessError::Crypto(format!("ECDSA signing failed: {:?}", e)))?;
        Ok(sig.as_ref().to_vec())
    }

    fn verify(&self, cert_pem: &[u8], data: &[u8], sig: &[u8]) -> Result<bool> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem)
            .map_err(|e| AccessError::Crypto(format!("Failed to parse certificate: {:?}", e)))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| AccessError::Crypto(format!("Failed to parse certificate: {:?}", e)))?;
        let public_key: &[u8] = &cert.public_key().subject_public_key.data;

        let fixed = UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_FIXED, public_key);
        if fixed.verify(data, sig).is_ok() {
            return Ok(true);
        }
        let der = UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, public_key);
        Ok(der.verify(data, sig).is_ok())
    }
}
