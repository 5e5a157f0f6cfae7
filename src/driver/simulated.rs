//! In-memory controller driver.
//!
//! Serves a node table from a [`NetworkSnapshot`] and scripts the driver's
//! state progression by poll count, so the lifecycle can be exercised
//! without controller hardware. Snapshots are plain JSON:
//!
//! ```json
//! {
//!   "home_id": 3237305246,
//!   "awake_after_polls": 3,
//!   "ready_after_polls": 8,
//!   "failed_nodes": [3],
//!   "nodes": {
//!     "2": {
//!       "manufacturer_id": "0x0086",
//!       "product_type": "0x0002",
//!       "product_id": "0x0064",
//!       "sensors": [{ "label": "Temperature", "value": 66.4 }],
//!       "batteries": [{ "label": "Battery Level", "value": 100 }]
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::driver::{ControllerDriver, DriverOptions, NetworkState};
use crate::error::{Error, Result};
use crate::types::{HomeId, NodeId, NodeValues, Reading, ValueId};

/// Marks battery handles in the low half of a [`ValueId`].
const BATTERY_FLAG: u64 = 0x8000;

/// A simulated node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedNode {
    /// Raw manufacturer id.
    pub manufacturer_id: String,
    /// Raw product type.
    pub product_type: String,
    /// Raw product id.
    pub product_id: String,
    /// Sensor readings.
    #[serde(default)]
    pub sensors: Vec<Reading>,
    /// Battery readings.
    #[serde(default)]
    pub batteries: Vec<Reading>,
}

impl SimulatedNode {
    /// Creates a node with the given identity fields and no values.
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

    /// Adds a sensor reading.
    #[must_use]
    pub fn sensor(mut self, reading: Reading) -> Self {
        self.sensors.push(reading);
        self
    }

    /// Adds a battery reading.
    #[must_use]
    pub fn battery(mut self, reading: Reading) -> Self {
        self.batteries.push(reading);
        self
    }
}

/// Serializable description of a simulated network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSnapshot {
    /// Network id reported once the session is created.
    pub home_id: HomeId,
    /// Node table keyed by node id.
    pub nodes: BTreeMap<NodeId, SimulatedNode>,
    /// Nodes the driver reports as failed.
    pub failed_nodes: BTreeSet<NodeId>,
    /// Poll at which the network reports awaked (`None` = never).
    pub awake_after_polls: Option<u32>,
    /// Poll at which the network reports ready (`None` = never). Only
    /// reached once the network is also awaked.
    pub ready_after_polls: Option<u32>,
    /// Refuse to lock options, as for a missing device.
    pub reject_device: bool,
}

impl Default for NetworkSnapshot {
    fn default() -> Self {
        Self {
            home_id: HomeId::default(),
            nodes: BTreeMap::new(),
            failed_nodes: BTreeSet::new(),
            awake_after_polls: Some(0),
            ready_after_polls: Some(0),
            reject_device: false,
        }
    }
}

/// Controller driver backed by a [`NetworkSnapshot`].
#[derive(Debug)]
pub struct SimulatedController {
    snapshot: NetworkSnapshot,
    options: Option<DriverOptions>,
    session: Option<HomeId>,
    stopped: bool,
    polls: AtomicU32,
    polled_nodes: Mutex<Vec<NodeId>>,
}

impl SimulatedController {
    /// Creates a controller serving the given snapshot.
    #[must_use]
    pub fn new(snapshot: NetworkSnapshot) -> Self {
        Self {
            snapshot,
            options: None,
            session: None,
            stopped: false,
            polls: AtomicU32::new(0),
            polled_nodes: Mutex::new(Vec::new()),
        }
    }

    /// Loads a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("loading network snapshot from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: NetworkSnapshot = serde_json::from_str(&content)?;
        Ok(Self::new(snapshot))
    }

    /// Sets the network id.
    #[must_use]
    pub const fn home_id(mut self, home_id: HomeId) -> Self {
        self.snapshot.home_id = home_id;
        self
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node_id: NodeId, node: SimulatedNode) -> Self {
        self.snapshot.nodes.insert(node_id, node);
        self
    }

    /// Marks a node as failed.
    #[must_use]
    pub fn fail_node(mut self, node_id: NodeId) -> Self {
        self.snapshot.failed_nodes.insert(node_id);
        self
    }

    /// Sets the poll at which the network reports awaked.
    #[must_use]
    pub const fn awake_after(mut self, polls: Option<u32>) -> Self {
        self.snapshot.awake_after_polls = polls;
        self
    }

    /// Sets the poll at which the network reports ready.
    #[must_use]
    pub const fn ready_after(mut self, polls: Option<u32>) -> Self {
        self.snapshot.ready_after_polls = polls;
        self
    }

    /// Makes `lock_options` fail.
    #[must_use]
    pub const fn reject_device(mut self) -> Self {
        self.snapshot.reject_device = true;
        self
    }

    /// Number of `state` polls so far.
    #[must_use]
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    /// Nodes whose value tables were requested, in request order.
    #[must_use]
    pub fn polled_nodes(&self) -> Vec<NodeId> {
        self.polled_nodes
            .lock()
            .map(|nodes| nodes.clone())
            .unwrap_or_default()
    }

    /// Returns true once `stop` was called.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Options passed to `lock_options`, if locked.
    #[must_use]
    pub const fn locked_options(&self) -> Option<&DriverOptions> {
        self.options.as_ref()
    }

    fn state_at(&self, poll: u32) -> NetworkState {
        if self.stopped || self.session.is_none() {
            return NetworkState::Stopped;
        }
        let reached = |threshold: Option<u32>| threshold.is_some_and(|n| poll >= n);
        // Ready implies awaked: a network that never wakes is never ready.
        match (
            reached(self.snapshot.awake_after_polls),
            reached(self.snapshot.ready_after_polls),
        ) {
            (true, true) => NetworkState::Ready,
            (true, false) => NetworkState::Awaked,
            (false, _) => NetworkState::Started,
        }
    }

    fn node(&self, node_id: NodeId) -> Result<&SimulatedNode> {
        self.snapshot.nodes.get(&node_id).ok_or_else(|| Error::Driver {
            message: format!("unknown node {node_id}"),
        })
    }
}

fn value_id(node_id: NodeId, index: usize, battery: bool) -> ValueId {
    let index = u64::try_from(index).unwrap_or(u64::MAX) & (BATTERY_FLAG - 1);
    let flag = if battery { BATTERY_FLAG } else { 0 };
    ValueId((u64::from(node_id) << 16) | flag | index)
}

impl ControllerDriver for SimulatedController {
    fn lock_options(&mut self, options: &DriverOptions) -> Result<()> {
        if options.device.trim().is_empty() {
            return Err(Error::DeviceInit {
                device: options.device.clone(),
                reason: "device path is empty".into(),
            });
        }
        if self.snapshot.reject_device {
            return Err(Error::DeviceInit {
                device: options.device.clone(),
                reason: "no controller answered on this port".into(),
            });
        }
        tracing::debug!("locked driver options for {}", options.device);
        self.options = Some(options.clone());
        Ok(())
    }

    fn create_session(&mut self) -> Pin<Box<dyn Future<Output = Result<HomeId>> + Send + '_>> {
        Box::pin(async move {
            if self.options.is_none() {
                return Err(Error::Driver {
                    message: "options must be locked before starting".into(),
                });
            }
            self.stopped = false;
            self.polls.store(0, Ordering::SeqCst);
            self.session = Some(self.snapshot.home_id);
            Ok(self.snapshot.home_id)
        })
    }

    fn state(&self) -> NetworkState {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        self.state_at(poll)
    }

    fn is_ready(&self) -> bool {
        // The last `state` call consumed poll n - 1; report what it saw.
        let poll = self.polls.load(Ordering::SeqCst).saturating_sub(1);
        self.state_at(poll) == NetworkState::Ready
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.stopped = true;
            self.session = None;
            Ok(())
        })
    }

    fn is_node_failed(&self, home_id: HomeId, node_id: NodeId) -> bool {
        self.session == Some(home_id) && self.snapshot.failed_nodes.contains(&node_id)
    }

    fn list_nodes(&self) -> Vec<NodeId> {
        self.snapshot.nodes.keys().copied().collect()
    }

    fn node_values(&self, node_id: NodeId) -> Result<NodeValues> {
        let node = self.node(node_id)?;
        if let Ok(mut polled) = self.polled_nodes.lock() {
            polled.push(node_id);
        }

        let mut values = NodeValues::new(
            node.manufacturer_id.clone(),
            node.product_type.clone(),
            node.product_id.clone(),
        );
        for index in 0..node.sensors.len() {
            values = values.with_sensor(value_id(node_id, index, false));
        }
        for index in 0..node.batteries.len() {
            values = values.with_battery(value_id(node_id, index, true));
        }
        Ok(values)
    }

    fn read_value(&self, node_id: NodeId, value: ValueId) -> Result<Reading> {
        let node = self.node(node_id)?;
        let missing = || Error::Driver {
            message: format!("node {node_id} has no value {:#x}", value.0),
        };

        if value.0 >> 16 != u64::from(node_id) {
            return Err(missing());
        }
        let index = usize::try_from(value.0 & (BATTERY_FLAG - 1)).map_err(|_| missing())?;
        let readings = if value.0 & BATTERY_FLAG == 0 {
            &node.sensors
        } else {
            &node.batteries
        };
        readings.get(index).cloned().ok_or_else(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multisensor() -> SimulatedNode {
        SimulatedNode::new("0x0086", "0x0002", "0x0064")
            .sensor(Reading::new("Temperature", 66.4))
            .sensor(Reading::new("Sensor", true))
            .battery(Reading::new("Battery Level", 87_i64))
    }

    async fn started(controller: SimulatedController) -> SimulatedController {
        let mut controller = controller;
        controller
            .lock_options(&DriverOptions::new("/dev/ttyACM0"))
            .unwrap();
        controller.create_session().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_state_progression_by_poll() {
        let controller = started(
            SimulatedController::new(NetworkSnapshot::default())
                .awake_after(Some(2))
                .ready_after(Some(4)),
        )
        .await;

        let states: Vec<_> = (0..5).map(|_| controller.state()).collect();
        assert_eq!(
            states,
            vec![
                NetworkState::Started,
                NetworkState::Started,
                NetworkState::Awaked,
                NetworkState::Awaked,
                NetworkState::Ready,
            ]
        );
        assert!(controller.is_ready());
        assert_eq!(controller.polls(), 5);
    }

    #[tokio::test]
    async fn test_never_awake_is_never_ready() {
        let controller = started(
            SimulatedController::new(NetworkSnapshot::default()).awake_after(None),
        )
        .await;

        for _ in 0..10 {
            assert_eq!(controller.state(), NetworkState::Started);
        }
        assert!(!controller.is_ready());
    }

    #[tokio::test]
    async fn test_ready_waits_for_late_awake() {
        let controller = started(
            SimulatedController::new(NetworkSnapshot::default())
                .awake_after(Some(3))
                .ready_after(Some(1)),
        )
        .await;

        let states: Vec<_> = (0..4).map(|_| controller.state()).collect();
        assert_eq!(
            states,
            vec![
                NetworkState::Started,
                NetworkState::Started,
                NetworkState::Started,
                NetworkState::Ready,
            ]
        );
    }

    #[tokio::test]
    async fn test_stopped_before_session() {
        let controller = SimulatedController::new(NetworkSnapshot::default());
        assert_eq!(controller.state(), NetworkState::Stopped);
        assert!(!controller.is_ready());
    }

    #[tokio::test]
    async fn test_create_session_requires_locked_options() {
        let mut controller = SimulatedController::new(NetworkSnapshot::default());
        assert!(matches!(
            controller.create_session().await,
            Err(Error::Driver { .. })
        ));
    }

    #[test]
    fn test_lock_rejects_empty_and_rejected_devices() {
        let mut controller = SimulatedController::new(NetworkSnapshot::default());
        assert!(matches!(
            controller.lock_options(&DriverOptions::new("  ")),
            Err(Error::DeviceInit { .. })
        ));

        let mut controller = controller.reject_device();
        assert!(matches!(
            controller.lock_options(&DriverOptions::new("/dev/ttyACM0")),
            Err(Error::DeviceInit { .. })
        ));
        assert!(controller.locked_options().is_none());
    }

    #[tokio::test]
    async fn test_values_read_back_through_handles() {
        let controller = started(
            SimulatedController::new(NetworkSnapshot::default()).with_node(2, multisensor()),
        )
        .await;

        let values = controller.node_values(2).unwrap();
        assert_eq!(values.manufacturer_id, "0x0086");
        assert_eq!(values.sensors().len(), 2);
        assert_eq!(values.batteries().len(), 1);

        let battery = controller.read_value(2, values.batteries()[0]).unwrap();
        assert_eq!(battery, Reading::new("Battery Level", 87_i64));
        let sensor = controller.read_value(2, values.sensors()[1]).unwrap();
        assert_eq!(sensor, Reading::new("Sensor", true));

        assert!(controller.read_value(2, ValueId(0xdead_0000)).is_err());
        assert_eq!(controller.polled_nodes(), vec![2]);
    }

    #[tokio::test]
    async fn test_failed_nodes_scoped_to_session() {
        let controller = started(
            SimulatedController::new(NetworkSnapshot::default())
                .home_id(HomeId(7))
                .with_node(3, multisensor())
                .fail_node(3),
        )
        .await;

        assert!(controller.is_node_failed(HomeId(7), 3));
        assert!(!controller.is_node_failed(HomeId(8), 3));
        assert!(!controller.is_node_failed(HomeId(7), 2));
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "home_id": 3237305246,
            "awake_after_polls": 3,
            "ready_after_polls": null,
            "failed_nodes": [3],
            "nodes": {
                "2": {
                    "manufacturer_id": "0x0086",
                    "product_type": "0x0002",
                    "product_id": "0x0064",
                    "sensors": [{ "label": "Luminance", "value": 173.0 }]
                }
            }
        }"#;
        let snapshot: NetworkSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.home_id, HomeId(3_237_305_246));
        assert_eq!(snapshot.awake_after_polls, Some(3));
        assert_eq!(snapshot.ready_after_polls, None);
        assert!(snapshot.failed_nodes.contains(&3));
        let node = &snapshot.nodes[&2];
        assert!(node.batteries.is_empty());
        assert_eq!(node.sensors[0], Reading::new("Luminance", 173.0));
    }
}
