//! Typed topic decoding.
//!
//! Marketplace logs store their arguments as base64 topics:
//!
//! - numbers are big-endian unsigned integers of minimal width (empty = `0`)
//! - addresses are 32-byte public keys, rendered as bech32 with the `erd` prefix
//! - token identifiers and other strings are UTF-8
//!
//! [`Topics`] reads these by index. Required readers fail with a
//! [`TopicError`]; the `*_or_default` readers treat a topic that is absent
//! (older contract versions emit fewer) as zero / empty.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bech32::{Bech32, Hrp};

use crate::error::TopicError;

/// Human-readable part of account addresses.
pub const ADDRESS_HRP: &str = "erd";

/// Length of an account public key.
pub const PUBKEY_LEN: usize = 32;

/// Index-based reader over the topics of one raw event.
#[derive(Debug, Clone, Copy)]
pub struct Topics<'a> {
    topics: &'a [String],
}

impl<'a> Topics<'a> {
    pub fn new(topics: &'a [String]) -> Self {
        Self { topics }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Raw bytes of topic `index`; `None` when the topic is absent.
    pub fn raw(&self, index: usize) -> Result<Option<Vec<u8>>, TopicError> {
        match self.topics.get(index) {
            None => Ok(None),
            Some(topic) => STANDARD
                .decode(topic)
                .map(Some)
                .map_err(|e| TopicError::Base64 {
                    index,
                    reason: e.to_string(),
                }),
        }
    }

    pub fn bytes(&self, index: usize) -> Result<Vec<u8>, TopicError> {
        self.raw(index)?.ok_or(TopicError::Missing { index })
    }

    pub fn u64(&self, index: usize) -> Result<u64, TopicError> {
        let bytes = self.bytes(index)?;
        Ok(be_uint(&bytes, index, 8)? as u64)
    }

    pub fn u128(&self, index: usize) -> Result<u128, TopicError> {
        let bytes = self.bytes(index)?;
        be_uint(&bytes, index, 16)
    }

    pub fn u64_or_default(&self, index: usize) -> Result<u64, TopicError> {
        match self.raw(index)? {
            Some(bytes) => Ok(be_uint(&bytes, index, 8)? as u64),
            None => Ok(0),
        }
    }

    pub fn u128_or_default(&self, index: usize) -> Result<u128, TopicError> {
        match self.raw(index)? {
            Some(bytes) => be_uint(&bytes, index, 16),
            None => Ok(0),
        }
    }

    /// Timestamps are unsigned on chain; values past `i64::MAX` saturate.
    pub fn timestamp_or_default(&self, index: usize) -> Result<i64, TopicError> {
        Ok(i64::try_from(self.u64_or_default(index)?).unwrap_or(i64::MAX))
    }

    pub fn string(&self, index: usize) -> Result<String, TopicError> {
        let bytes = self.bytes(index)?;
        String::from_utf8(bytes).map_err(|_| TopicError::Utf8 { index })
    }

    /// `None` when the topic is absent or empty.
    pub fn string_opt(&self, index: usize) -> Result<Option<String>, TopicError> {
        match self.raw(index)? {
            Some(bytes) if !bytes.is_empty() => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| TopicError::Utf8 { index }),
            _ => Ok(None),
        }
    }

    pub fn address(&self, index: usize) -> Result<String, TopicError> {
        let bytes = self.bytes(index)?;
        pubkey_to_address(&bytes).map_err(|reason| TopicError::Address { index, reason })
    }

    /// `None` when the topic is absent or empty.
    pub fn address_opt(&self, index: usize) -> Result<Option<String>, TopicError> {
        match self.raw(index)? {
            Some(bytes) if !bytes.is_empty() => pubkey_to_address(&bytes)
                .map(Some)
                .map_err(|reason| TopicError::Address { index, reason }),
            _ => Ok(None),
        }
    }
}

fn be_uint(bytes: &[u8], index: usize, max: usize) -> Result<u128, TopicError> {
    let significant = match bytes.iter().position(|b| *b != 0) {
        Some(first) => &bytes[first..],
        None => return Ok(0),
    };
    if significant.len() > max {
        return Err(TopicError::TooWide {
            index,
            len: significant.len(),
            max,
        });
    }
    Ok(significant
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

fn address_hrp() -> Result<Hrp, String> {
    Hrp::parse(ADDRESS_HRP).map_err(|e| e.to_string())
}

/// Encode a 32-byte public key as an `erd1…` address.
pub fn pubkey_to_address(pubkey: &[u8]) -> Result<String, String> {
    if pubkey.len() != PUBKEY_LEN {
        return Err(format!("expected {PUBKEY_LEN} bytes, got {}", pubkey.len()));
    }
    bech32::encode::<Bech32>(address_hrp()?, pubkey).map_err(|e| e.to_string())
}

/// Decode an `erd1…` address back to its public key.
pub fn address_to_pubkey(address: &str) -> Result<Vec<u8>, String> {
    let (hrp, data) = bech32::decode(address).map_err(|e| e.to_string())?;
    if hrp.as_str() != ADDRESS_HRP {
        return Err(format!("unexpected prefix '{hrp}'"));
    }
    if data.len() != PUBKEY_LEN {
        return Err(format!("expected {PUBKEY_LEN} bytes, got {}", data.len()));
    }
    Ok(data)
}

// ─── Encoding ────────────────────────────────────────────────────────────────
//
// The inverse of the readers above, for building logs in fixtures and tools.

pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Minimal big-endian encoding; zero encodes as the empty topic.
pub fn encode_uint(value: u128) -> String {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    encode_bytes(&bytes[first..])
}

pub fn encode_str(value: &str) -> String {
    encode_bytes(value.as_bytes())
}

pub fn encode_address(address: &str) -> Result<String, String> {
    address_to_pubkey(address).map(|pk| encode_bytes(&pk))
}
