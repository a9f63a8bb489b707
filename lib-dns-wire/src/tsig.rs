//! Transaction signatures, RFC 8945.
//!
//! This module owns the *shape* of TSIG: the key and algorithm
//! naming, the to-be-signed blob layout, and the signing context
//! threaded between the envelopes of a multi-message transfer.  The
//! MAC itself comes from a [`Signer`] implementation supplied by the
//! embedding application; no cryptographic primitive lives here.

use std::fmt;

use crate::message::types::RdataClass;
use crate::name::{Name, NameError};

pub const HMAC_SHA1: &str = "hmac-sha1.";
pub const HMAC_SHA256: &str = "hmac-sha256.";
pub const HMAC_SHA384: &str = "hmac-sha384.";
pub const HMAC_SHA512: &str = "hmac-sha512.";
pub const GSS_TSIG: &str = "gss-tsig.";

/// The algorithm used when none is specified.
pub fn default_algorithm() -> Name {
    Name::from_text(HMAC_SHA256, None).expect("static algorithm name is valid")
}

/// A shared secret under a key name, bound to a MAC algorithm.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Key {
    pub name: Name,
    pub algorithm: Name,
    pub secret: Vec<u8>,
}

impl Key {
    pub fn new(name: Name, secret: Vec<u8>) -> Self {
        Self {
            name,
            algorithm: default_algorithm(),
            secret,
        }
    }
}

/// The state carried between successive envelopes of a signed
/// multi-message transaction: the MAC of the previous envelope.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Context {
    pub mac: Vec<u8>,
}

/// Errors from the signing capability.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SignError {
    /// The signer does not implement the requested algorithm.
    UnknownAlgorithm(Name),
    /// The key material is inconsistent with the requested algorithm.
    AlgorithmKeyMismatch { key: Name, algorithm: Name },
    /// Any other failure inside the crypto provider.
    Crypto(String),
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignError::UnknownAlgorithm(algorithm) => {
                write!(f, "unknown TSIG algorithm: {algorithm}")
            }
            SignError::AlgorithmKeyMismatch { key, algorithm } => {
                write!(f, "key {key} cannot be used with algorithm {algorithm}")
            }
            SignError::Crypto(detail) => write!(f, "signing failed: {detail}"),
        }
    }
}

impl std::error::Error for SignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// The capability boundary to the crypto library: compute a MAC over
/// *data* with the named algorithm.
pub trait Signer {
    /// # Errors
    ///
    /// If the algorithm is unknown or the key unusable.
    fn sign(&self, algorithm: &Name, secret: &[u8], data: &[u8]) -> Result<Vec<u8>, SignError>;
}

/// The to-be-signed blob for a single signed message (or the first
/// envelope of a chain): the request MAC when answering a signed
/// request, the message as rendered, and the TSIG variables.
///
/// See RFC 8945 section 4.3.
///
/// # Errors
///
/// If the key or algorithm name cannot be written.
pub fn signing_blob(
    message: &[u8],
    key: &Key,
    time_signed: u64,
    fudge: u16,
    error: u16,
    other: &[u8],
    request_mac: &[u8],
) -> Result<Vec<u8>, NameError> {
    let mut blob = Vec::with_capacity(message.len() + 64);
    if !request_mac.is_empty() {
        blob.extend_from_slice(&(request_mac.len() as u16).to_be_bytes());
        blob.extend_from_slice(request_mac);
    }
    blob.extend_from_slice(message);
    blob.extend_from_slice(&key.name.to_digestable(None)?);
    blob.extend_from_slice(&u16::from(RdataClass::ANY).to_be_bytes());
    blob.extend_from_slice(&0u32.to_be_bytes());
    blob.extend_from_slice(&key.algorithm.to_digestable(None)?);
    push_u48(&mut blob, time_signed);
    blob.extend_from_slice(&fudge.to_be_bytes());
    blob.extend_from_slice(&error.to_be_bytes());
    blob.extend_from_slice(&(other.len() as u16).to_be_bytes());
    blob.extend_from_slice(other);
    Ok(blob)
}

/// The to-be-signed blob for the second and later envelopes of a
/// chain: the prior MAC, the message, and just the timers.
///
/// See RFC 8945 section 5.3.1.
pub fn multi_signing_blob(
    prior_mac: &[u8],
    message: &[u8],
    time_signed: u64,
    fudge: u16,
) -> Vec<u8> {
    let mut blob = Vec::with_capacity(message.len() + prior_mac.len() + 10);
    blob.extend_from_slice(&(prior_mac.len() as u16).to_be_bytes());
    blob.extend_from_slice(prior_mac);
    blob.extend_from_slice(message);
    push_u48(&mut blob, time_signed);
    blob.extend_from_slice(&fudge.to_be_bytes());
    blob
}

pub(crate) fn push_u48(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&((value >> 32) as u16).to_be_bytes());
    buf.extend_from_slice(&(value as u32).to_be_bytes());
}
