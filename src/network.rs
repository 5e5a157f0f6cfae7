//! Network lifecycle controller.
//!
//! [`NetworkController`] owns the controller driver and the single
//! [`NetworkSession`] of a run. Bring-up is a fixed sequence:
//!
//! 1. lock driver options and create the session (`initialize`)
//! 2. poll until the radio is up (`await_awake`)
//! 3. poll until the node table is populated (`await_ready`)
//!
//! Each wait is bounded by an iteration count, not a wall-clock deadline,
//! and can be interrupted through a [`CancelToken`]. Once ready, the session
//! is handed out read-only as a [`Network`].

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::ConnectorConfig;
use crate::driver::{ControllerDriver, NetworkState};
use crate::error::{Error, Result};
use crate::types::{HomeId, NodeId};

/// Default number of polls per readiness phase.
pub const DEFAULT_MAX_TICKS: u32 = 300;

/// Default delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a network session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Nothing done yet.
    Uninitialized,
    /// Driver options locked.
    OptionsLocked,
    /// Session created, driver starting.
    Instantiated,
    /// Driver reported the radio up.
    Awaked,
    /// Node table populated; acquisition may start.
    Ready,
    /// Driver shut down.
    Stopped,
    /// Bring-up failed; terminal.
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::OptionsLocked => "options locked",
            Self::Instantiated => "instantiated",
            Self::Awaked => "awaked",
            Self::Ready => "ready",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Bounds of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Maximum number of sleeps per phase.
    pub max_ticks: u32,
    /// Sleep between two polls.
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_ticks: DEFAULT_MAX_TICKS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One active connection to the controller driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSession {
    /// Network id reported by the driver.
    pub home_id: HomeId,
    /// Lifecycle state of this session.
    pub state: LifecycleState,
    /// Node ids known when the session became ready.
    pub node_ids: Vec<NodeId>,
}

impl NetworkSession {
    /// Number of known nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }
}

/// Fires a [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels every token created from this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Lets a supervisor interrupt a readiness wait.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a connected handle/token pair.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx })
    }

    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        Self::pair().1
    }

    /// Returns true if the handle fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the handle fires. Never resolves if the handle was dropped.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Read-only view of a ready network.
pub struct Network<'a, D> {
    session: &'a NetworkSession,
    driver: &'a D,
}

impl<'a, D: ControllerDriver> Network<'a, D> {
    /// Creates a view over a session and its driver.
    #[must_use]
    pub const fn new(session: &'a NetworkSession, driver: &'a D) -> Self {
        Self { session, driver }
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &NetworkSession {
        self.session
    }

    /// The controller driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        self.driver
    }

    /// Network id.
    #[must_use]
    pub const fn home_id(&self) -> HomeId {
        self.session.home_id
    }

    /// Number of known nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.session.node_count()
    }
}

/// Owns the driver and drives the session through its lifecycle.
pub struct NetworkController<D> {
    driver: D,
    policy: WaitPolicy,
    state: LifecycleState,
    session: Option<NetworkSession>,
}

impl<D: ControllerDriver> NetworkController<D> {
    /// Creates a controller with the default wait policy.
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self::with_policy(driver, WaitPolicy::default())
    }

    /// Creates a controller with a custom wait policy.
    #[must_use]
    pub const fn with_policy(driver: D, policy: WaitPolicy) -> Self {
        Self {
            driver,
            policy,
            state: LifecycleState::Uninitialized,
            session: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// The session, once created.
    #[must_use]
    pub const fn session(&self) -> Option<&NetworkSession> {
        self.session.as_ref()
    }

    /// The controller driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Returns the ready network.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the session is ready.
    pub fn network(&self) -> Result<Network<'_, D>> {
        match (&self.session, self.state) {
            (Some(session), LifecycleState::Ready) => Ok(Network::new(session, &self.driver)),
            _ => Err(self.invalid("acquire nodes")),
        }
    }

    /// Runs the whole bring-up: initialize, await awake, await ready.
    pub async fn start(&mut self, config: &ConnectorConfig, cancel: &mut CancelToken) -> Result<()> {
        self.initialize(config).await?;
        self.await_awake(cancel).await?;
        self.await_ready(cancel).await
    }

    /// Locks driver options and creates the session.
    ///
    /// Failures are fatal: the controller moves to `Failed`.
    pub async fn initialize(&mut self, config: &ConnectorConfig) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.invalid("initialize"));
        }

        let options = config.driver_options();
        tracing::info!("initializing controller on {}", options.device);

        if let Err(e) = self.driver.lock_options(&options) {
            tracing::error!("controller initialization failed, check the controller port: {}", e);
            return Err(self.fail(e));
        }
        self.transition(LifecycleState::OptionsLocked);

        let home_id = match self.driver.create_session().await {
            Ok(home_id) => home_id,
            Err(e) => {
                tracing::error!("failed to create network session: {}", e);
                return Err(self.fail(e));
            }
        };
        self.session = Some(NetworkSession {
            home_id,
            state: LifecycleState::Instantiated,
            node_ids: Vec::new(),
        });
        self.transition(LifecycleState::Instantiated);
        Ok(())
    }

    /// Waits until the driver reports the network awaked.
    pub async fn await_awake(&mut self, cancel: &mut CancelToken) -> Result<()> {
        if self.state != LifecycleState::Instantiated {
            return Err(self.invalid("await awake"));
        }

        tracing::info!("waiting for network awake");
        let awake = self.poll_until("awake", NetworkState::Awaked, cancel).await?
            || self.driver.state() >= NetworkState::Awaked;
        if !awake {
            let ticks = self.policy.max_ticks;
            tracing::error!("network is not awake after {} polls, aborting", ticks);
            return Err(self.fail(Error::AwakeTimeout { ticks }));
        }

        self.transition(LifecycleState::Awaked);
        Ok(())
    }

    /// Waits until the driver reports the network ready and captures its nodes.
    pub async fn await_ready(&mut self, cancel: &mut CancelToken) -> Result<()> {
        if self.state != LifecycleState::Awaked {
            return Err(self.invalid("await ready"));
        }

        tracing::info!("waiting for network ready");
        let ready = self.poll_until("ready", NetworkState::Ready, cancel).await?
            || self.driver.is_ready();
        if !ready {
            let ticks = self.policy.max_ticks;
            tracing::error!("network is not ready after {} polls, aborting", ticks);
            return Err(self.fail(Error::ReadyTimeout { ticks }));
        }

        let node_ids = self.driver.list_nodes();
        if let Some(session) = self.session.as_mut() {
            session.node_ids = node_ids;
            tracing::info!(
                "network [{}] awaked with {} nodes",
                session.home_id,
                session.node_count()
            );
        }
        self.transition(LifecycleState::Ready);
        Ok(())
    }

    /// Requests driver shutdown. Call once per session.
    pub async fn stop(&mut self) -> Result<()> {
        if matches!(
            self.state,
            LifecycleState::Uninitialized | LifecycleState::Stopped
        ) {
            return Err(self.invalid("stop"));
        }

        if self.session.is_some() {
            self.driver.stop().await?;
        }
        self.transition(LifecycleState::Stopped);
        tracing::info!("network stopped");
        Ok(())
    }

    /// Polls the driver until `target` is reached or the tick budget runs out.
    async fn poll_until(
        &mut self,
        phase: &'static str,
        target: NetworkState,
        cancel: &mut CancelToken,
    ) -> Result<bool> {
        for tick in 1..=self.policy.max_ticks {
            if self.driver.state() >= target {
                return Ok(true);
            }
            tracing::debug!("network not {} yet (poll {}/{})", phase, tick, self.policy.max_ticks);

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::warn!("wait for network {} cancelled", phase);
                    return Err(self.fail(Error::Cancelled { phase }));
                }
                () = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }
        Ok(false)
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::debug!("lifecycle {} -> {}", self.state, next);
        self.state = next;
        if let Some(session) = self.session.as_mut() {
            session.state = next;
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.transition(LifecycleState::Failed);
        error
    }

    const fn invalid(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }
}
