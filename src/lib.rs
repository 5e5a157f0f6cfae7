//! # zwave-connector
//!
//! A device connector bridging a Z-Wave style mesh controller to a sensor
//! data backend.
//!
//! The connector brings a network session up, waits for the mesh to become
//! operational, then polls each requested node and emits one normalized
//! record per live node.
//!
//! ## Features
//!
//! - Bounded two-phase readiness wait (awaked, then ready) with cancellation
//! - Per-node liveness gate so stale cached values are never emitted
//! - Flat per-node records with a derived hardware identity
//! - Stdout (JSON lines) or HTTP backend publishing
//!
//! ## Quick Start
//!
//! ```no_run
//! use zwave_connector::{
//!     CancelToken, Command, ConnectorConfig, JsonLinesPublisher, NetworkController,
//!     SimulatedController, acquisition,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), zwave_connector::Error> {
//!     let config = ConnectorConfig::load("zwave.json").await?;
//!     let driver = SimulatedController::from_file("network.json").await?;
//!     let mut controller = NetworkController::with_policy(driver, config.wait_policy());
//!     let mut publisher = JsonLinesPublisher::stdout();
//!
//!     let report = acquisition::execute(
//!         &mut controller,
//!         &config,
//!         Command::Read { start: -1, end: -1 },
//!         &mut publisher,
//!         &mut CancelToken::never(),
//!     )
//!     .await?;
//!     println!("emitted {} records", report.emitted.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`driver`] - Controller driver boundary and the simulated controller
//! - [`network`] - Session lifecycle and readiness waits
//! - [`liveness`] - Node liveness checks on a ready network
//! - [`identity`] - Hardware identity derivation
//! - [`aggregator`] - Per-node record aggregation
//! - [`acquisition`] - Range validation and the acquisition pass
//! - [`publish`] - Envelope publishers
//! - [`config`] / [`logging`] - Configuration file and log setup

pub mod acquisition;
pub mod aggregator;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod liveness;
pub mod logging;
pub mod network;
pub mod publish;
pub mod types;

// Re-exports for convenience
pub use acquisition::{AcquisitionReport, Command, NodeRange};
pub use aggregator::{Aggregator, NodeRecord, RecordValue, SensorDataEnvelope};
pub use config::ConnectorConfig;
pub use driver::{ControllerDriver, DriverOptions, NetworkState, SimulatedController};
pub use error::{Error, IdentityError, Result};
pub use identity::NodeIdentity;
pub use network::{
    CancelHandle, CancelToken, LifecycleState, Network, NetworkController, NetworkSession,
    WaitPolicy,
};
pub use publish::{ConfiguredPublisher, HttpPublisher, JsonLinesPublisher, Publisher};
pub use types::{HomeId, NodeId, NodeValues, Reading, Scalar, ValueId};
