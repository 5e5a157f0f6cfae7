//! Per-node record aggregation.
//!
//! [`Aggregator::extract`] collects a node's identity, sensor readings and
//! battery levels into one flat [`NodeRecord`] and wraps it as a
//! [`SensorDataEnvelope`]:
//!
//! ```json
//! {
//!   "sensor_data": {
//!     "Battery Level": 100,
//!     "Luminance": 173.0,
//!     "Sensor": true,
//!     "Temperature": 66.4,
//!     "mac_id": "00:86:00:02:00:64"
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::driver::ControllerDriver;
use crate::error::{Error, Result};
use crate::identity::NodeIdentity;
use crate::network::Network;
use crate::types::{NodeId, NodeValues, Scalar, ValueId};

/// Label under which the derived identity is stored.
pub const IDENTITY_LABEL: &str = "mac_id";

/// A record value: a reading, or the derived identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// Scalar reading.
    Scalar(Scalar),
    /// Text field such as the identity.
    Text(String),
}

impl From<Scalar> for RecordValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

/// Flat label → value record of one node.
pub type NodeRecord = BTreeMap<String, RecordValue>;

/// Final per-node output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorDataEnvelope {
    /// Collected fields.
    pub sensor_data: NodeRecord,
}

impl SensorDataEnvelope {
    /// Serializes the envelope to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Clears the record when dropped, on success and on error alike.
struct OpenRecord<'a>(&'a mut NodeRecord);

impl Deref for OpenRecord<'_> {
    type Target = NodeRecord;

    fn deref(&self) -> &NodeRecord {
        self.0
    }
}

impl DerefMut for OpenRecord<'_> {
    fn deref_mut(&mut self) -> &mut NodeRecord {
        self.0
    }
}

impl Drop for OpenRecord<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// Builds node records through a reusable accumulation buffer.
///
/// `extract` borrows the aggregator mutably, so extractions on one buffer
/// are serialized.
#[derive(Debug, Default)]
pub struct Aggregator {
    buffer: NodeRecord,
}

impl Aggregator {
    /// Creates an aggregator with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no record is being accumulated.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Collects identity, sensor and battery values of one node.
    ///
    /// On a later label collision the last value wins.
    pub fn extract<D: ControllerDriver>(
        &mut self,
        network: &Network<'_, D>,
        node_id: NodeId,
    ) -> Result<SensorDataEnvelope> {
        if node_id == 0 {
            return Err(Error::InvalidNode(node_id));
        }

        let mut record = OpenRecord(&mut self.buffer);
        record.clear();

        let driver = network.driver();
        let values = driver.node_values(node_id)?;

        let identity = derive_identity(node_id, &values)?;
        record.insert(IDENTITY_LABEL.to_string(), RecordValue::Text(identity.to_string()));
        collect_sensor_values(driver, node_id, values.sensors(), &mut record)?;
        collect_battery_values(driver, node_id, values.batteries(), &mut record)?;

        tracing::debug!("node [{}] yielded {} fields", node_id, record.len());
        Ok(SensorDataEnvelope {
            sensor_data: std::mem::take(&mut *record),
        })
    }
}

/// Derives the identity of a node from its value table.
pub fn derive_identity(node_id: NodeId, values: &NodeValues) -> Result<NodeIdentity> {
    NodeIdentity::derive(&values.manufacturer_id, &values.product_type, &values.product_id)
        .map_err(|source| Error::Identity { node_id, source })
}

/// Reads every sensor value into the record.
pub fn collect_sensor_values<D: ControllerDriver>(
    driver: &D,
    node_id: NodeId,
    sensors: &[ValueId],
    record: &mut NodeRecord,
) -> Result<()> {
    collect(driver, node_id, sensors, record)
}

/// Reads every battery level into the record.
pub fn collect_battery_values<D: ControllerDriver>(
    driver: &D,
    node_id: NodeId,
    batteries: &[ValueId],
    record: &mut NodeRecord,
) -> Result<()> {
    collect(driver, node_id, batteries, record)
}

fn collect<D: ControllerDriver>(
    driver: &D,
    node_id: NodeId,
    handles: &[ValueId],
    record: &mut NodeRecord,
) -> Result<()> {
    for &handle in handles {
        let reading = driver.read_value(node_id, handle)?;
        // JSON has no NaN or infinity.
        if let Scalar::Float(value) = reading.value {
            if !value.is_finite() {
                return Err(Error::Driver {
                    message: format!("node {node_id} reported {value} for '{}'", reading.label),
                });
            }
        }
        record.insert(reading.label, reading.value.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectorConfig;
    use crate::driver::simulated::{NetworkSnapshot, SimulatedController, SimulatedNode};
    use crate::network::{CancelToken, NetworkController};
    use crate::types::Reading;

    fn multisensor() -> SimulatedNode {
        SimulatedNode::new("0x0086", "0x0002", "0x0064")
            .sensor(Reading::new("Luminance", 173.0))
            .sensor(Reading::new("Temperature", 66.4))
            .sensor(Reading::new("Sensor", true))
            .battery(Reading::new("Battery Level", 100_i64))
    }

    fn door_sensor() -> SimulatedNode {
        SimulatedNode::new("0x010F", "0x0700", "0x1000")
            .sensor(Reading::new("Access Control", 22_i64))
            .battery(Reading::new("Battery Level", 64_i64))
    }

    async fn ready(driver: SimulatedController) -> NetworkController<SimulatedController> {
        let mut controller = NetworkController::new(driver);
        controller
            .start(&ConnectorConfig::new("/dev/ttyACM0"), &mut CancelToken::never())
            .await
            .unwrap();
        controller
    }

    #[tokio::test]
    async fn test_extract_envelope() {
        let controller = ready(
            SimulatedController::new(NetworkSnapshot::default()).with_node(2, multisensor()),
        )
        .await;
        let network = controller.network().unwrap();
        let mut aggregator = Aggregator::new();

        let envelope = aggregator.extract(&network, 2).unwrap();

        let data = &envelope.sensor_data;
        assert_eq!(data.len(), 5);
        assert_eq!(
            data[IDENTITY_LABEL],
            RecordValue::Text("00:86:00:02:00:64".into())
        );
        assert_eq!(data["Sensor"], RecordValue::Scalar(Scalar::Bool(true)));
        assert_eq!(data["Battery Level"], RecordValue::Scalar(Scalar::Integer(100)));
        assert!(aggregator.is_clear());
    }

    #[tokio::test]
    async fn test_envelope_json_shape() {
        let controller = ready(
            SimulatedController::new(NetworkSnapshot::default()).with_node(5, door_sensor()),
        )
        .await;
        let network = controller.network().unwrap();

        let json = Aggregator::new().extract(&network, 5).unwrap().to_json().unwrap();

        assert_eq!(
            json,
            r#"{"sensor_data":{"Access Control":22,"Battery Level":64,"mac_id":"01:0f:07:00:10:00"}}"#
        );
    }

    #[tokio::test]
    async fn test_no_field_leaks_between_nodes() {
        let controller = ready(
            SimulatedController::new(NetworkSnapshot::default())
                .with_node(2, multisensor())
                .with_node(3, door_sensor()),
        )
        .await;
        let network = controller.network().unwrap();
        let mut aggregator = Aggregator::new();

        let a = aggregator.extract(&network, 2).unwrap();
        assert!(aggregator.is_clear());
        let b = aggregator.extract(&network, 3).unwrap();
        assert!(aggregator.is_clear());

        for label in a.sensor_data.keys() {
            if !door_sensor_labels().contains(&label.as_str()) {
                assert!(!b.sensor_data.contains_key(label), "{label} leaked");
            }
        }
        assert_eq!(b.sensor_data.len(), 3);
    }

    fn door_sensor_labels() -> [&'static str; 3] {
        [IDENTITY_LABEL, "Access Control", "Battery Level"]
    }

    #[tokio::test]
    async fn test_buffer_cleared_after_failure() {
        let broken = SimulatedNode::new("0x0086", "0x0002", "0064")
            .sensor(Reading::new("Temperature", 70.0));
        let controller = ready(
            SimulatedController::new(NetworkSnapshot::default())
                .with_node(2, multisensor())
                .with_node(3, broken),
        )
        .await;
        let network = controller.network().unwrap();
        let mut aggregator = Aggregator::new();

        let err = aggregator.extract(&network, 3).unwrap_err();
        assert!(matches!(err, Error::Identity { node_id: 3, .. }));
        assert!(aggregator.is_clear());

        let next = aggregator.extract(&network, 2).unwrap();
        assert_eq!(next.sensor_data.len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_and_zero_nodes_rejected() {
        let controller = ready(
            SimulatedController::new(NetworkSnapshot::default()).with_node(2, multisensor()),
        )
        .await;
        let network = controller.network().unwrap();
        let mut aggregator = Aggregator::new();

        assert!(matches!(
            aggregator.extract(&network, 0),
            Err(Error::InvalidNode(0))
        ));
        assert!(matches!(
            aggregator.extract(&network, 9),
            Err(Error::Driver { .. })
        ));
        assert!(aggregator.is_clear());
    }

    #[tokio::test]
    async fn test_non_finite_reading_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let node = SimulatedNode::new("0x0086", "0x0002", "0x0064")
                .sensor(Reading::new("Temperature", bad));
            let controller = ready(
                SimulatedController::new(NetworkSnapshot::default()).with_node(2, node),
            )
            .await;
            let network = controller.network().unwrap();
            let mut aggregator = Aggregator::new();

            assert!(matches!(
                aggregator.extract(&network, 2),
                Err(Error::Driver { .. })
            ));
            assert!(aggregator.is_clear());
        }
    }

    #[tokio::test]
    async fn test_battery_overrides_colliding_sensor_label() {
        let node = SimulatedNode::new("0x0086", "0x0002", "0x0064")
            .sensor(Reading::new("Level", 1_i64))
            .battery(Reading::new("Level", 2_i64));
        let controller = ready(
            SimulatedController::new(NetworkSnapshot::default()).with_node(2, node),
        )
        .await;
        let network = controller.network().unwrap();

        let envelope = Aggregator::new().extract(&network, 2).unwrap();
        assert_eq!(envelope.sensor_data["Level"], RecordValue::Scalar(Scalar::Integer(2)));
    }
}
