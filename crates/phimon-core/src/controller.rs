// ── Reconciliation engine ──
//
// Owns the connection lifecycle against the backend: session restore on
// start, operator connect/disconnect, the periodic poll cycle, and loss
// detection. All sensor state flows into the SensorRegistry.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use phimon_api::{
    ApiClient, ConnectionRequest, ConnectionStatus, SensorRegistration, base_url_for,
    strip_scheme,
};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{NewSensor, SensorRecord};
use crate::session::{SessionBackend, SessionStore};
use crate::store::SensorRegistry;
use crate::stream::SensorStream;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ── Phase / ConnectionState ──────────────────────────────────────

/// Lifecycle phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EnginePhase {
    /// Not started, or stopped.
    Idle,
    /// Restoring a saved session or opening a new connection.
    Checking,
    /// Poll cycle running.
    Connected,
    /// No connection; waiting for the operator.
    Disconnected,
}

/// Coarse connection state for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl From<EnginePhase> for ConnectionState {
    fn from(phase: EnginePhase) -> Self {
        match phase {
            EnginePhase::Checking => Self::Connecting,
            EnginePhase::Connected => Self::Connected,
            EnginePhase::Idle | EnginePhase::Disconnected => Self::Disconnected,
        }
    }
}

/// Result of a single poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Inventory and readings were applied.
    Applied { sensors: usize },
    /// The tick failed but the backend still reports a live connection.
    Transient,
    /// The tick failed and the connection is gone; the engine disconnected.
    Lost,
    /// The cycle was stopped while the tick was in flight; nothing applied.
    Discarded,
}

/// Address and port of the server the engine is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub address: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Drives the connection
/// lifecycle and keeps the [`SensorRegistry`] in step with the backend.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: MonitorConfig,
    registry: Arc<SensorRegistry>,
    sessions: SessionStore,
    phase: watch::Sender<EnginePhase>,
    server: watch::Sender<Option<ServerEndpoint>>,
    last_error: watch::Sender<Option<String>>,
    /// The running poll cycle. Held while a tick applies results and while
    /// teardown clears state, so the two never interleave.
    cycle: Mutex<Option<PollCycle>>,
    /// Bumped on every teardown. Attempts and cycles started under an
    /// older value are stale.
    epoch: AtomicU64,
}

#[derive(Clone)]
struct PollCycle {
    epoch: u64,
    client: ApiClient,
    cancel: CancellationToken,
    /// One tick at a time, whether periodic or from `refresh()`.
    tick_lock: Arc<Mutex<()>>,
}

impl Controller {
    /// Create an idle engine. Call [`start()`](Self::start) to restore a
    /// saved session, or [`connect()`](Self::connect) directly.
    pub fn new(config: MonitorConfig, backend: Arc<dyn SessionBackend>) -> Self {
        let sessions = SessionStore::new(backend).with_ttl(config.session_ttl);
        let (phase, _) = watch::channel(EnginePhase::Idle);
        let (server, _) = watch::channel(None);
        let (last_error, _) = watch::channel(None);

        Self {
            inner: Arc::new(ControllerInner {
                config,
                registry: Arc::new(SensorRegistry::new()),
                sessions,
                phase,
                server,
                last_error,
                cycle: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<SensorRegistry> {
        &self.inner.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Restore the saved session if there is one.
    ///
    /// Only acts from [`EnginePhase::Idle`]. A fresh session whose server
    /// still reports a live link is resumed; anything else leaves the
    /// engine [`Disconnected`](EnginePhase::Disconnected). Never fails.
    pub async fn start(&self) -> EnginePhase {
        let began = self.inner.phase.send_if_modified(|phase| {
            if *phase == EnginePhase::Idle {
                *phase = EnginePhase::Checking;
                true
            } else {
                false
            }
        });
        if !began {
            debug!(phase = %self.phase(), "start ignored; engine already running");
            return self.phase();
        }
        let epoch = self.current_epoch();

        let Some(session) = self.inner.sessions.load() else {
            debug!("no saved session");
            self.abandon_attempt(epoch, false).await;
            return self.phase();
        };
        info!(server = %session.server_address, port = session.port, "checking saved session");

        let client = match self.client_for(&session.server_address, session.port) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "saved session is unusable");
                self.abandon_attempt(epoch, true).await;
                return self.phase();
            }
        };

        match client.status().await {
            Ok(status) if status.connected => {
                let endpoint = ServerEndpoint::new(session.server_address, session.port);
                if let Err(e) = self.enter_connected(client, endpoint, epoch).await {
                    debug!(error = %e, "session restore abandoned");
                }
            }
            Ok(status) => {
                info!(message = %status.message, "backend not connected; discarding saved session");
                self.abandon_attempt(epoch, true).await;
            }
            Err(e) => {
                let e = CoreError::from(e);
                info!(error = %e, "saved server unreachable; discarding saved session");
                self.record_error(&e);
                self.abandon_attempt(epoch, true).await;
            }
        }
        self.phase()
    }

    /// Ask the backend to open its hardware link and start polling.
    ///
    /// Fails with [`CoreError::AlreadyConnected`] while connected and
    /// [`CoreError::Busy`] while another attempt is in flight. A reply
    /// with `connected: false` is [`CoreError::Rejected`]. If the first
    /// poll tick finds the link already gone the result is
    /// [`CoreError::ConnectionLost`] and the engine is `Disconnected`.
    pub async fn connect(
        &self,
        address: &str,
        port: u16,
        password: Option<&SecretString>,
    ) -> Result<ConnectionStatus, CoreError> {
        let address = address.trim();
        let current = self.server().map(|s| s.to_string()).unwrap_or_default();
        let mut refused = None;
        self.inner.phase.send_if_modified(|phase| match phase {
            EnginePhase::Idle | EnginePhase::Disconnected => {
                *phase = EnginePhase::Checking;
                true
            }
            EnginePhase::Checking => {
                refused = Some(CoreError::Busy);
                false
            }
            EnginePhase::Connected => {
                refused = Some(CoreError::AlreadyConnected { server: current });
                false
            }
        });
        if let Some(err) = refused {
            return Err(err);
        }
        let epoch = self.current_epoch();

        info!(server = address, port, "connecting");
        match self.open_link(address, port, password).await {
            Ok((client, status)) => {
                let endpoint = ServerEndpoint::new(address, port);
                match self.enter_connected(client.clone(), endpoint, epoch).await {
                    Ok(()) => Ok(status),
                    Err(CoreError::Cancelled) if self.phase() == EnginePhase::Disconnected => {
                        // A disconnect() overtook this attempt after the link opened.
                        debug!("closing link opened by a superseded connect");
                        if let Err(e) = client.disconnect().await {
                            warn!(error = %e, "disconnect request failed (non-fatal)");
                        }
                        Err(CoreError::Cancelled)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                warn!(error = %e, "connection failed");
                self.record_error(&e);
                self.abandon_attempt(epoch, false).await;
                Err(e)
            }
        }
    }

    /// Close the backend link and drop all local state.
    ///
    /// The remote call is best-effort; local cleanup always happens.
    pub async fn disconnect(&self) {
        let client = self
            .inner
            .cycle
            .lock()
            .await
            .as_ref()
            .map(|c| c.client.clone());

        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                warn!(error = %e, "disconnect request failed (non-fatal)");
            }
        }

        self.teardown(None, true, EnginePhase::Disconnected).await;
        info!("disconnected");
    }

    /// Halt polling and return to [`EnginePhase::Idle`].
    ///
    /// The saved session is kept so a later [`start()`](Self::start) can
    /// resume it.
    pub async fn stop(&self) {
        self.teardown(None, false, EnginePhase::Idle).await;
        debug!("engine stopped");
    }

    /// Run one poll tick now, outside the periodic schedule.
    pub async fn refresh(&self) -> Result<TickOutcome, CoreError> {
        let cycle = self
            .inner
            .cycle
            .lock()
            .await
            .clone()
            .ok_or(CoreError::NotConnected)?;
        Ok(self.poll_once(&cycle).await)
    }

    // ── Sensor operations ────────────────────────────────────────

    /// Fetch one sensor's latest reading straight from the backend.
    pub async fn sensor_reading(&self, sensor_id: &str) -> Result<SensorRecord, CoreError> {
        let client = self.active_client().await?;
        match client.sensor_data(sensor_id).await {
            Ok(data) => Ok(data.into()),
            Err(e) if e.is_not_found() => Err(CoreError::SensorNotFound {
                sensor_id: sensor_id.to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Register a sensor channel. It joins the registry on the next tick.
    pub async fn register_sensor(&self, sensor: &NewSensor) -> Result<SensorRecord, CoreError> {
        let client = self.active_client().await?;
        let summary = client
            .register_sensor(&SensorRegistration::from(sensor))
            .await?;
        info!(sensor_id = %summary.sensor_id, "sensor registered");
        Ok(summary.into())
    }

    /// Remove a sensor. It leaves the registry on the next tick.
    pub async fn unregister_sensor(&self, sensor_id: &str) -> Result<(), CoreError> {
        let client = self.active_client().await?;
        match client.unregister_sensor(sensor_id).await {
            Ok(()) => {
                info!(sensor_id, "sensor unregistered");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(CoreError::SensorNotFound {
                sensor_id: sensor_id.to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ── State observation ────────────────────────────────────────

    pub fn phase(&self) -> EnginePhase {
        *self.inner.phase.borrow()
    }

    /// Subscribe to phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<EnginePhase> {
        self.inner.phase.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.phase().into()
    }

    /// The server the engine is attached to, while connected.
    pub fn server(&self) -> Option<ServerEndpoint> {
        self.inner.server.borrow().clone()
    }

    /// Address of the attached server, while connected.
    pub fn server_address(&self) -> Option<String> {
        self.inner.server.borrow().as_ref().map(|s| s.address.clone())
    }

    /// Message from the most recent failure, cleared on success.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.borrow().clone()
    }

    pub fn sensors(&self) -> SensorStream {
        self.inner.registry.subscribe()
    }

    pub fn sensors_snapshot(&self) -> Arc<Vec<Arc<SensorRecord>>> {
        self.inner.registry.snapshot()
    }

    // ── Internals ────────────────────────────────────────────────

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn client_for(&self, address: &str, port: u16) -> Result<ApiClient, CoreError> {
        if address.trim().is_empty() {
            return Err(CoreError::Config {
                message: "server address is required".into(),
            });
        }
        let base = match &self.inner.config.backend_url {
            Some(url) => url.clone(),
            None => base_url_for(address, port, &self.inner.config.api_path)?,
        };
        Ok(ApiClient::new(base, &self.inner.config.transport())?)
    }

    async fn open_link(
        &self,
        address: &str,
        port: u16,
        password: Option<&SecretString>,
    ) -> Result<(ApiClient, ConnectionStatus), CoreError> {
        let client = self.client_for(address, port)?;
        let request = ConnectionRequest {
            server_address: strip_scheme(address).to_owned(),
            port,
            password: password.map(|p| p.expose_secret().to_owned()),
        };
        let status = client.connect(&request).await?;
        if !status.connected {
            return Err(CoreError::Rejected {
                message: status.message,
            });
        }
        Ok((client, status))
    }

    async fn active_client(&self) -> Result<ApiClient, CoreError> {
        self.inner
            .cycle
            .lock()
            .await
            .as_ref()
            .map(|c| c.client.clone())
            .ok_or(CoreError::NotConnected)
    }

    /// Install a poll cycle, run its first tick inline, then hand it to a
    /// background task.
    async fn enter_connected(
        &self,
        client: ApiClient,
        endpoint: ServerEndpoint,
        epoch: u64,
    ) -> Result<(), CoreError> {
        let cycle = PollCycle {
            epoch,
            client,
            cancel: CancellationToken::new(),
            tick_lock: Arc::new(Mutex::new(())),
        };

        {
            let mut slot = self.inner.cycle.lock().await;
            if self.current_epoch() != epoch || self.phase() != EnginePhase::Checking {
                debug!("connection attempt superseded");
                return Err(CoreError::Cancelled);
            }
            if let Some(previous) = slot.replace(cycle.clone()) {
                previous.cancel.cancel();
            }
            self.inner
                .sessions
                .save(&endpoint.address, endpoint.port);
            self.inner.server.send_replace(Some(endpoint.clone()));
            self.inner.last_error.send_replace(None);
            self.set_phase(EnginePhase::Connected);
        }
        info!(server = %endpoint, "connected");

        if self.poll_once(&cycle).await == TickOutcome::Lost {
            return Err(CoreError::ConnectionLost {
                message: self
                    .last_error()
                    .unwrap_or_else(|| "backend reports no hardware link".into()),
            });
        }

        let period = self.inner.config.poll_interval.max(MIN_POLL_INTERVAL);
        tokio::spawn(poll_task(self.clone(), cycle, period));
        Ok(())
    }

    /// Back out of a failed `Checking` attempt, unless something newer
    /// has already taken over.
    async fn abandon_attempt(&self, epoch: u64, forget_session: bool) {
        let _slot = self.inner.cycle.lock().await;
        if self.current_epoch() != epoch {
            return;
        }
        if forget_session {
            self.inner.sessions.clear();
        }
        self.inner.phase.send_if_modified(|phase| {
            if *phase == EnginePhase::Checking {
                *phase = EnginePhase::Disconnected;
                true
            } else {
                false
            }
        });
    }

    /// Cancel the poll cycle and clear local state.
    ///
    /// With `expected_epoch`, only acts if no other teardown happened
    /// since that epoch. Returns whether it acted.
    async fn teardown(
        &self,
        expected_epoch: Option<u64>,
        forget_session: bool,
        next: EnginePhase,
    ) -> bool {
        let mut slot = self.inner.cycle.lock().await;
        if expected_epoch.is_some_and(|e| e != self.current_epoch()) {
            return false;
        }

        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(cycle) = slot.take() {
            cycle.cancel.cancel();
        }
        self.inner.registry.clear();
        if forget_session {
            self.inner.sessions.clear();
        }
        self.inner.server.send_replace(None);
        self.set_phase(next);
        true
    }

    /// One tick plus, on failure, a status check to tell a blip from a
    /// lost connection.
    async fn poll_once(&self, cycle: &PollCycle) -> TickOutcome {
        let _tick = cycle.tick_lock.lock().await;
        if cycle.cancel.is_cancelled() {
            return TickOutcome::Discarded;
        }

        let error = match self.run_tick(cycle).await {
            Ok(outcome) => {
                if matches!(outcome, TickOutcome::Applied { .. }) {
                    self.inner.last_error.send_if_modified(|e| e.take().is_some());
                }
                return outcome;
            }
            Err(e) => e,
        };

        warn!(error = %error, "poll failed; verifying connection");
        self.record_error(&error);
        if cycle.cancel.is_cancelled() {
            return TickOutcome::Discarded;
        }

        match cycle.client.status().await {
            Ok(status) if status.connected => {
                debug!("backend still connected; retrying on next tick");
                TickOutcome::Transient
            }
            Ok(status) => {
                warn!(message = %status.message, "backend reports connection lost");
                self.handle_loss(cycle).await
            }
            Err(e) => {
                warn!(error = %e, "server unreachable; connection lost");
                self.handle_loss(cycle).await
            }
        }
    }

    async fn run_tick(&self, cycle: &PollCycle) -> Result<TickOutcome, CoreError> {
        let inventory = cycle.client.list_sensors().await?;
        let pruned: HashSet<String> = {
            let _slot = self.inner.cycle.lock().await;
            if cycle.cancel.is_cancelled() {
                debug!("discarding inventory from a stopped cycle");
                return Ok(TickOutcome::Discarded);
            }
            self.inner
                .registry
                .reconcile_inventory(inventory.into_values())
                .into_iter()
                .collect()
        };

        let readings = cycle.client.all_sensor_data().await?;
        let _slot = self.inner.cycle.lock().await;
        if cycle.cancel.is_cancelled() {
            debug!("discarding readings from a stopped cycle");
            return Ok(TickOutcome::Discarded);
        }

        // A reading for a sensor this tick just removed must not bring it back.
        let mut dropped = 0_usize;
        let records: Vec<SensorRecord> = readings
            .into_values()
            .filter(|d| {
                let keep = !pruned.contains(&d.sensor_id);
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .map(SensorRecord::from)
            .collect();
        if dropped > 0 {
            debug!(dropped, "ignoring readings for removed sensors");
        }

        self.inner.registry.apply_readings(records);
        Ok(TickOutcome::Applied {
            sensors: self.inner.registry.len(),
        })
    }

    async fn handle_loss(&self, cycle: &PollCycle) -> TickOutcome {
        if self
            .teardown(Some(cycle.epoch), true, EnginePhase::Disconnected)
            .await
        {
            info!("connection lost");
            TickOutcome::Lost
        } else {
            TickOutcome::Discarded
        }
    }

    fn set_phase(&self, phase: EnginePhase) {
        let previous = self.inner.phase.send_replace(phase);
        if previous != phase {
            debug!(from = %previous, to = %phase, "phase changed");
        }
    }

    fn record_error(&self, error: &CoreError) {
        self.inner.last_error.send_replace(Some(error.to_string()));
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Tick the poll cycle until it is cancelled or the connection is lost.
async fn poll_task(controller: Controller, cycle: PollCycle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cycle.cancel.cancelled() => break,
            _ = interval.tick() => {
                if controller.poll_once(&cycle).await == TickOutcome::Lost {
                    break;
                }
            }
        }
    }
    debug!(epoch = cycle.epoch, "poll cycle ended");
}
