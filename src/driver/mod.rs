//! Controller driver boundary.
//!
//! The mesh controller driver owns radio communication, node discovery and
//! value caching. This module defines the interface the connector consumes
//! from it. The only bundled implementation is the
//! [`simulated::SimulatedController`], which serves a node table from memory.

pub mod simulated;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::types::{HomeId, NodeId, NodeValues, Reading, ValueId};

/// Default location of the driver's device database.
pub const DEFAULT_CONFIG_PATH: &str = "../openzwave/config";

/// Default location of the driver's user data directory.
pub const DEFAULT_USER_PATH: &str = ".";

/// Network state as reported by the driver.
///
/// Variants are ordered: a network that is `Ready` is also past `Awaked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkState {
    /// Driver not running.
    Stopped,
    /// Driver failed to start.
    Failed,
    /// Controller was reset.
    Reset,
    /// Driver started, radio not yet up.
    Started,
    /// Radio up, awake nodes queried.
    Awaked,
    /// Node table fully populated.
    Ready,
}

/// Driver option set, locked before a session is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOptions {
    /// Controller device path (e.g., "/dev/ttyACM0").
    pub device: String,
    /// Driver device database directory.
    pub config_path: String,
    /// Driver user data directory.
    pub user_path: String,
    /// Driver log file.
    pub log_file: Option<String>,
    /// Level at which the driver saves its log.
    pub log_level: String,
    /// Append to the driver log instead of truncating it.
    pub append_log_file: bool,
    /// Echo driver log lines to the console.
    pub console_output: bool,
    /// Enable driver-side logging.
    pub logging: bool,
}

impl DriverOptions {
    /// Creates options for the given device with default settings.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            user_path: DEFAULT_USER_PATH.to_string(),
            log_file: None,
            log_level: "info".to_string(),
            append_log_file: false,
            console_output: false,
            logging: false,
        }
    }

    /// Sets the device database directory.
    #[must_use]
    pub fn config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Sets the user data directory.
    #[must_use]
    pub fn user_path(mut self, path: impl Into<String>) -> Self {
        self.user_path = path.into();
        self
    }

    /// Sets the driver log file.
    #[must_use]
    pub fn log_file(mut self, path: Option<String>) -> Self {
        self.log_file = path;
        self
    }

    /// Sets the driver log level.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

/// Trait for controller driver implementations.
pub trait ControllerDriver: Send + Sync {
    /// Validates and locks the option set. Must precede `create_session`.
    fn lock_options(&mut self, options: &DriverOptions) -> Result<()>;

    /// Starts the driver and returns the id of the network it joined.
    fn create_session(&mut self) -> Pin<Box<dyn Future<Output = Result<HomeId>> + Send + '_>>;

    /// Current network state. Each call is one poll.
    fn state(&self) -> NetworkState;

    /// Returns true once the node table is fully populated.
    fn is_ready(&self) -> bool;

    /// Requests driver shutdown.
    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns true if the driver marked the node as failed.
    fn is_node_failed(&self, home_id: HomeId, node_id: NodeId) -> bool;

    /// Ids of all nodes currently known to the driver, ascending.
    fn list_nodes(&self) -> Vec<NodeId>;

    /// Value table of a node.
    fn node_values(&self, node_id: NodeId) -> Result<NodeValues>;

    /// Reads the label and current value behind a value handle.
    fn read_value(&self, node_id: NodeId, value: ValueId) -> Result<Reading>;
}

pub use simulated::SimulatedController;
