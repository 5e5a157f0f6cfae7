//! Scalar values read from node value handles.

use serde::{Deserialize, Serialize};

/// Driver handle addressing one value of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u64);

/// A single scalar value.
///
/// Serializes as a bare JSON boolean or number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Binary sensor state.
    Bool(bool),
    /// Integral reading (battery level, counters).
    Integer(i64),
    /// Measured reading.
    Float(f64),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u8> for Scalar {
    fn from(value: u8) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// A labeled value as returned by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Human-readable label, e.g. `"Temperature"`.
    pub label: String,
    /// Current value.
    pub value: Scalar,
}

impl Reading {
    /// Creates a new reading.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}
