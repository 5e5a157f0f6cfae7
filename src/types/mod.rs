//! Data types shared between the driver boundary and the connector core.
//!
//! This module contains:
//! - Node and network identifiers
//! - Per-node value tables exposed by the controller driver
//! - Scalar readings and the labeled records built from them

pub mod node;
pub mod value;

pub use node::{HomeId, NodeId, NodeValues};
pub use value::{Reading, Scalar, ValueId};
