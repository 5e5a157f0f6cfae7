//! Node and network identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::value::ValueId;

/// Identifier of a node on the mesh network.
pub type NodeId = u16;

/// Opaque identifier of the mesh network the controller belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HomeId(pub u32);

impl fmt::Display for HomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Value table of a single node as exposed by the controller driver.
///
/// Identity fields are raw driver strings such as `"0x0086"`. Sensor and
/// battery values are kept as separate collections of handles; read them
/// through [`crate::driver::ControllerDriver::read_value`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeValues {
    /// Raw manufacturer id.
    pub manufacturer_id: String,
    /// Raw product type.
    pub product_type: String,
    /// Raw product id.
    pub product_id: String,
    sensors: Vec<ValueId>,
    batteries: Vec<ValueId>,
}

impl NodeValues {
    /// Creates a value table with the given identity fields and no values.
    #[must_use]
    pub fn new(
        manufacturer_id: impl Into<String>,
        product_type: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer_id: manufacturer_id.into(),
            product_type: product_type.into(),
            product_id: product_id.into(),
            sensors: Vec::new(),
            batteries: Vec::new(),
        }
    }

    /// Adds a sensor value handle.
    #[must_use]
    pub fn with_sensor(mut self, id: ValueId) -> Self {
        self.sensors.push(id);
        self
    }

    /// Adds a battery value handle.
    #[must_use]
    pub fn with_battery(mut self, id: ValueId) -> Self {
        self.batteries.push(id);
        self
    }

    /// Sensor value handles.
    #[must_use]
    pub fn sensors(&self) -> &[ValueId] {
        &self.sensors
    }

    /// Battery level value handles.
    #[must_use]
    pub fn batteries(&self) -> &[ValueId] {
        &self.batteries
    }
}
