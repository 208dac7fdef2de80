//! Dynamic values flowing between deployment actions.
//!
//! Constructor arguments, call arguments, event arguments and action results
//! are all carried as JSON. Addresses and hashes use their 0x-prefixed hex
//! string form, so they survive a round trip through the journal unchanged.

use crate::error::{IgnisError, Result};
use crate::types::{Address, TxHash};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A resolved argument or result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub JsonValue);

impl Value {
    /// Create a null value.
    pub fn null() -> Self {
        Self(JsonValue::Null)
    }

    /// Create a boolean value.
    pub fn bool(v: bool) -> Self {
        Self(JsonValue::Bool(v))
    }

    /// Create an integer value.
    pub fn int(v: i64) -> Self {
        Self(JsonValue::Number(v.into()))
    }

    /// Create an unsigned integer value (token amounts, wei).
    pub fn uint(v: u64) -> Self {
        Self(JsonValue::Number(v.into()))
    }

    /// Create a string value.
    pub fn string(v: impl Into<String>) -> Self {
        Self(JsonValue::String(v.into()))
    }

    /// Create an address value.
    pub fn address(addr: Address) -> Self {
        Self(JsonValue::String(addr.to_string()))
    }

    /// Create a transaction hash value.
    pub fn tx_hash(hash: TxHash) -> Self {
        Self(JsonValue::String(hash.to_string()))
    }

    /// Create a hex-encoded bytes value (`0x` prefixed).
    pub fn bytes(data: &[u8]) -> Self {
        Self(JsonValue::String(format!("0x{}", hex::encode(data))))
    }

    /// Create a list value.
    pub fn list(items: Vec<Value>) -> Self {
        Self(JsonValue::Array(items.into_iter().map(|v| v.0).collect()))
    }

    /// Create a value from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::null());
        }
        serde_json::from_slice(bytes)
            .map(Self)
            .map_err(|e| IgnisError::Serialization(format!("Failed to parse value: {}", e)))
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
            .map_err(|e| IgnisError::Serialization(format!("Failed to serialize value: {}", e)))
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Get as an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.as_i64()
    }

    /// Interpret the value as an address.
    pub fn as_address(&self) -> Option<Address> {
        self.as_str().and_then(|s| s.parse().ok())
    }

    /// Interpret the value as a transaction hash.
    pub fn as_tx_hash(&self) -> Option<TxHash> {
        self.as_str().and_then(|s| s.parse().ok())
    }

    /// Get the inner JSON value.
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Consume and return the inner JSON value.
    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Self(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::uint(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::string(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Self::address(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            JsonValue::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_value_round_trips_through_string() {
        let addr = Address::new([0x11; 20]);
        let v = Value::address(addr);
        assert_eq!(v.as_address(), Some(addr));
        assert_eq!(v.to_string(), addr.to_string());
    }

    #[test]
    fn empty_bytes_is_null() {
        assert!(Value::from_bytes(&[]).unwrap().is_null());
    }

    #[test]
    fn bytes_are_hex_encoded() {
        assert_eq!(Value::bytes(&[]).as_str(), Some("0x"));
        assert_eq!(Value::bytes(&[0xd0, 0x9d]).as_str(), Some("0xd09d"));
    }

    #[test]
    fn non_address_string_is_not_an_address() {
        assert_eq!(Value::string("0x").as_address(), None);
        assert_eq!(Value::int(7).as_address(), None);
    }
}
