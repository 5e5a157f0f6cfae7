//! Node acquisition.
//!
//! Validates the requested node range against the ready network, then for
//! every node in it: checks liveness, extracts the node record and hands
//! the envelope to the publisher. Nodes that are failed, unreadable or
//! unpublishable are skipped; acquisition carries on with the rest.

use crate::aggregator::Aggregator;
use crate::config::ConnectorConfig;
use crate::driver::ControllerDriver;
use crate::error::{Error, Result};
use crate::network::{CancelToken, Network, NetworkController, NetworkSession};
use crate::publish::Publisher;
use crate::types::NodeId;

/// Range bound meaning "every node".
pub const ALL_NODES: i64 = -1;

/// Command requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read nodes `[start, end)`, or all nodes for `(-1, -1)`.
    Read { start: i64, end: i64 },
    /// Actuate nodes. Not supported.
    Write,
}

/// Validated set of nodes to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRange {
    /// Every node known to the session.
    All,
    /// Half-open id range.
    Span { start: NodeId, end: NodeId },
}

impl NodeRange {
    /// Validates raw bounds against the number of known nodes.
    ///
    /// Accepts `(-1, -1)`, or `0 < start <= node_count` with
    /// `start < end <= node_count + 1`.
    pub fn validate(start: i64, end: i64, node_count: usize) -> Result<Self> {
        if start == ALL_NODES && end == ALL_NODES {
            return Ok(Self::All);
        }

        let count = i64::try_from(node_count).unwrap_or(i64::MAX);
        let in_bounds =
            start > 0 && start <= count && end > start && end <= count.saturating_add(1);
        match (NodeId::try_from(start), NodeId::try_from(end)) {
            (Ok(first), Ok(last)) if in_bounds => Ok(Self::Span {
                start: first,
                end: last,
            }),
            _ => Err(Error::InvalidRange {
                start,
                end,
                node_count,
            }),
        }
    }

    /// Node ids to visit, ascending, each once.
    #[must_use]
    pub fn node_ids(&self, session: &NetworkSession) -> Vec<NodeId> {
        match *self {
            Self::All => session.node_ids.clone(),
            Self::Span { start, end } => (start..end).collect(),
        }
    }
}

/// Outcome of one acquisition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Every node visited, in order.
    pub visited: Vec<NodeId>,
    /// Nodes whose envelope was published.
    pub emitted: Vec<NodeId>,
    /// Nodes skipped as failed.
    pub skipped: Vec<NodeId>,
    /// Nodes whose extraction or publishing failed.
    pub failed: Vec<NodeId>,
}

/// Visits every node of `range` and publishes its envelope.
pub async fn run<D, P>(
    network: &Network<'_, D>,
    aggregator: &mut Aggregator,
    range: NodeRange,
    publisher: &mut P,
) -> AcquisitionReport
where
    D: ControllerDriver,
    P: Publisher,
{
    let mut report = AcquisitionReport::default();

    for node_id in range.node_ids(network.session()) {
        report.visited.push(node_id);

        if !network.is_node_connected(node_id) {
            report.skipped.push(node_id);
            continue;
        }

        let envelope = match aggregator.extract(network, node_id) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("failed to read node [{}]: {}", node_id, e);
                report.failed.push(node_id);
                continue;
            }
        };

        match publisher.publish(&envelope).await {
            Ok(()) => {
                tracing::info!("published node [{}]", node_id);
                report.emitted.push(node_id);
            }
            Err(e) => {
                tracing::warn!("failed to publish node [{}]: {}", node_id, e);
                report.failed.push(node_id);
            }
        }
    }

    tracing::info!(
        "acquisition done: {} emitted, {} skipped, {} failed",
        report.emitted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    report
}

/// Executes a command end to end: bring-up, acquisition, shutdown.
///
/// The network is stopped on every path once a session exists. A failing
/// stop is logged and does not replace the outcome.
pub async fn execute<D, P>(
    controller: &mut NetworkController<D>,
    config: &ConnectorConfig,
    command: Command,
    publisher: &mut P,
    cancel: &mut CancelToken,
) -> Result<AcquisitionReport>
where
    D: ControllerDriver,
    P: Publisher,
{
    let Command::Read { start, end } = command else {
        return Err(Error::NotImplemented("write"));
    };

    if let Err(e) = controller.start(config, cancel).await {
        shutdown(controller).await;
        return Err(e);
    }

    let outcome = acquire(controller, start, end, publisher).await;
    shutdown(controller).await;
    outcome
}

async fn acquire<D, P>(
    controller: &NetworkController<D>,
    start: i64,
    end: i64,
    publisher: &mut P,
) -> Result<AcquisitionReport>
where
    D: ControllerDriver,
    P: Publisher,
{
    let network = controller.network()?;
    let range = NodeRange::validate(start, end, network.node_count())?;
    let mut aggregator = Aggregator::new();
    Ok(run(&network, &mut aggregator, range, publisher).await)
}

async fn shutdown<D: ControllerDriver>(controller: &mut NetworkController<D>) {
    if controller.session().is_none() {
        return;
    }
    if let Err(e) = controller.stop().await {
        tracing::warn!("failed to stop network: {}", e);
    }
}
