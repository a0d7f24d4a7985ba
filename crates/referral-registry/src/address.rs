//! Caller and affiliate identities.
//!
//! An [`Address`] is opaque to the registry: the host environment
//! authenticates whoever is behind it and passes it in as a plain value. The
//! registry only ever compares addresses and stores them, so the type is a
//! fixed-width byte array with hex encoding at the serialization boundary.

use std::fmt;
use std::str::FromStr;

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RegistryError;

/// Byte width of a registry address.
pub const ADDRESS_LEN: usize = 20;

/// An authenticated caller identity, or the control address of an affiliate.
///
/// [`Address::ZERO`] is reserved: lookups return it to mean "no affiliate"
/// and operations reject it wherever a real address is required.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero sentinel address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    /// Build an address from a slice, rejecting any length other than
    /// [`ADDRESS_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RegistryError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(RegistryError::MalformedAddress {
                reason: format!("expected {ADDRESS_LEN} bytes, got {}", bytes.len()),
            });
        }
        let mut inner = [0u8; ADDRESS_LEN];
        inner.copy_from_slice(bytes);
        Ok(Address(inner))
    }

    /// Decode a hex string, with or without a leading `0x`.
    pub fn from_hex(encoded: &str) -> Result<Self, RegistryError> {
        let digits = encoded
            .strip_prefix("0x")
            .or_else(|| encoded.strip_prefix("0X"))
            .unwrap_or(encoded);
        let bytes = hex::decode(digits).map_err(|err| RegistryError::MalformedAddress {
            reason: err.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Addresses serialize as `0x`-prefixed hex strings so they stay readable in
// JSON snapshots and are usable as JSON object keys.
impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Address::from_hex(&encoded).map_err(D::Error::custom)
    }
}
