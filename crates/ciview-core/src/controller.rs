// ── Controller ──
//
// Lifecycle, command routing and reactive state for one protocol engine.
// A reconciler task owns the registry by value; port events and
// registry-side operations are serialized through it. Commands travel
// over a bounded channel to a processor task that owns port access.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{Diagnostic, Notification, ObservationBus};
use crate::command::{
    Command, CommandEnvelope, CommandResult, RefreshPropertyRequest, SetProfileRequest,
};
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::model::{
    ConnectionSnapshot, LocalProperty, LogEntry, MessageDirection, Muid, ProfileState,
    PropertyMetadata, PropertyValue, SubscriptionState,
};
use crate::port::{PortEvent, ProtocolPort};
use crate::store::{ChangeSet, Registry, Scoped, Snapshot};
use crate::stream::EntityStream;

// ── ControllerState ──────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    ShutDown,
}

/// Work for the reconciler task other than port events.
enum RegistryOp {
    ClearLogs { ack: oneshot::Sender<()> },
    Apply(PortEvent),
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the protocol port,
/// the background tasks and the observation bus.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    port: Arc<dyn ProtocolPort>,
    bus: ObservationBus,
    state: watch::Sender<ControllerState>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    registry_tx: mpsc::Sender<RegistryOp>,
    registry_rx: Mutex<Option<mpsc::Receiver<RegistryOp>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller around `port`. Does NOT initialize the port;
    /// call [`init()`](Self::init) to start background tasks.
    pub fn new(config: ControllerConfig, port: Arc<dyn ProtocolPort>) -> Self {
        let bus = ObservationBus::new(config.event_channel_size);
        let (state, _) = watch::channel(ControllerState::Uninitialized);
        let (command_tx, command_rx) = mpsc::channel(config.command_channel_size.max(1));
        let (registry_tx, registry_rx) = mpsc::channel(config.command_channel_size.max(1));

        Self {
            inner: Arc::new(ControllerInner {
                config,
                port,
                bus,
                state,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                registry_tx,
                registry_rx: Mutex::new(Some(registry_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Initialize the port, seed the log and start background tasks.
    ///
    /// Calling this on a ready controller is a no-op. A failed attempt
    /// leaves the controller in [`ControllerState::Failed`] and may be
    /// retried.
    pub async fn init(&self) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        match self.state() {
            ControllerState::Ready => return Ok(()),
            ControllerState::ShutDown => return Err(CoreError::NotInitialized),
            _ => {}
        }
        self.set_state(ControllerState::Initializing);

        // Subscribe first so nothing emitted during initialize is lost.
        let events = self.inner.port.subscribe();
        if let Err(e) = self.inner.port.initialize().await {
            warn!(error = %e, "protocol engine failed to initialize");
            self.set_state(ControllerState::Failed);
            return Err(e.into());
        }

        let mut registry = Registry::new(self.inner.config.log_retention);
        match self.inner.port.get_logs().await {
            Ok(entries) => registry.seed_logs(entries),
            Err(e) => warn!(error = %e, "could not fetch transport log (non-fatal)"),
        }
        self.inner.bus.publish_logs(&registry);

        if let Some(ops) = self.inner.registry_rx.lock().await.take() {
            let ctrl = self.clone();
            handles.push(tokio::spawn(reconciler_task(ctrl, registry, ops, events)));
        }

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let ctrl = self.clone();
            handles.push(tokio::spawn(command_processor_task(ctrl, rx)));
        }

        if let Some(interval) = self.inner.config.poll_interval {
            let ctrl = self.clone();
            handles.push(tokio::spawn(poll_task(ctrl, interval)));
        }

        self.set_state(ControllerState::Ready);
        info!("controller ready");
        Ok(())
    }

    /// Stop background tasks and shut the port down.
    ///
    /// Idempotent. Commands afterwards fail with `NotInitialized`.
    pub async fn shutdown(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        let was_ready = self.state() == ControllerState::Ready;
        self.set_state(ControllerState::ShutDown);
        self.inner.cancel.cancel();

        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        if was_ready {
            if let Err(e) = self.inner.port.shutdown().await {
                warn!(error = %e, "protocol engine shutdown failed (non-fatal)");
            }
            info!("controller shut down");
        }
    }

    /// One-shot: init, run closure, shut down.
    pub async fn oneshot<F, Fut, T>(
        config: ControllerConfig,
        port: Arc<dyn ProtocolPort>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.poll_interval = None;

        let controller = Controller::new(cfg, port);
        controller.init().await?;
        let result = f(controller.clone()).await;
        controller.shutdown().await;
        result
    }

    pub fn state(&self) -> ControllerState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn state_changes(&self) -> watch::Receiver<ControllerState> {
        self.inner.state.subscribe()
    }

    fn set_state(&self, state: ControllerState) {
        self.inner.state.send_replace(state);
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command against the protocol engine.
    ///
    /// Validates, then sends the command to the processor task and waits
    /// until the port has accepted it. Registry changes arrive later as
    /// confirmation events.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.state() != ControllerState::Ready {
            return Err(CoreError::NotInitialized);
        }
        cmd.validate()?;
        if let Command::SelectConnection { target } = &cmd {
            if self.connection(*target).is_none() {
                return Err(CoreError::invalid(format!("no connection {target}")));
            }
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::NotInitialized)?;

        rx.await.map_err(|_| CoreError::NotInitialized)?
    }

    // ── Command conveniences ─────────────────────────────────────

    pub async fn send_discovery(&self) -> Result<(), CoreError> {
        self.execute(Command::SendDiscovery).await.map(drop)
    }

    pub async fn select_connection(&self, target: Muid) -> Result<(), CoreError> {
        self.execute(Command::SelectConnection { target })
            .await
            .map(drop)
    }

    pub async fn set_profile(&self, request: &SetProfileRequest) -> Result<(), CoreError> {
        let valid = request.validate()?;
        self.execute(Command::SetProfile {
            key: valid.key,
            enabled: valid.enabled,
            num_channels: valid.num_channels,
        })
        .await
        .map(drop)
    }

    pub async fn subscribe_property(
        &self,
        property_id: &str,
        encoding: Option<&str>,
    ) -> Result<(), CoreError> {
        self.execute(Command::SubscribeProperty {
            property_id: property_id.to_owned(),
            encoding: encoding.map(str::to_owned),
        })
        .await
        .map(drop)
    }

    pub async fn unsubscribe_property(&self, property_id: &str) -> Result<(), CoreError> {
        self.execute(Command::UnsubscribeProperty {
            property_id: property_id.to_owned(),
        })
        .await
        .map(drop)
    }

    pub async fn refresh_property_value(
        &self,
        request: RefreshPropertyRequest,
    ) -> Result<(), CoreError> {
        self.execute(Command::RefreshPropertyValue(request))
            .await
            .map(drop)
    }

    pub async fn create_property(&self, metadata: PropertyMetadata) -> Result<(), CoreError> {
        self.execute(Command::CreateProperty { metadata })
            .await
            .map(drop)
    }

    pub async fn update_property_metadata(
        &self,
        property_id: &str,
        metadata: PropertyMetadata,
    ) -> Result<(), CoreError> {
        self.execute(Command::UpdatePropertyMetadata {
            property_id: property_id.to_owned(),
            metadata,
        })
        .await
        .map(drop)
    }

    pub async fn update_property_value(
        &self,
        property_id: &str,
        res_id: Option<&str>,
        data: impl Into<Bytes>,
    ) -> Result<(), CoreError> {
        self.execute(Command::UpdatePropertyValue {
            property_id: property_id.to_owned(),
            res_id: res_id.map(str::to_owned),
            data: data.into(),
        })
        .await
        .map(drop)
    }

    pub async fn remove_property(&self, property_id: &str) -> Result<(), CoreError> {
        self.execute(Command::RemoveProperty {
            property_id: property_id.to_owned(),
        })
        .await
        .map(drop)
    }

    /// Clear the port's log, then the registry's. `logs_snapshot()` is
    /// empty once this returns.
    pub async fn clear_logs(&self) -> Result<(), CoreError> {
        self.execute(Command::ClearLogs).await.map(drop)
    }

    pub async fn get_muid(&self) -> Result<Muid, CoreError> {
        match self.execute(Command::GetMuid).await? {
            CommandResult::Muid(muid) => Ok(muid),
            other => Err(CoreError::Internal(format!(
                "unexpected result for get_muid: {other:?}"
            ))),
        }
    }

    // ── State observation ────────────────────────────────────────

    /// Every notification in emission order. Nothing is replayed.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.bus.subscribe()
    }

    // ── Snapshot accessors ───────────────────────────────────────

    pub fn connections_snapshot(&self) -> Snapshot<ConnectionSnapshot> {
        self.inner.bus.connections_snapshot()
    }

    pub fn connection(&self, target: Muid) -> Option<Arc<ConnectionSnapshot>> {
        self.connections_snapshot()
            .iter()
            .find(|c| c.target() == target)
            .cloned()
    }

    pub fn profiles_snapshot(&self) -> Snapshot<Scoped<ProfileState>> {
        self.inner.bus.profiles_snapshot()
    }

    pub fn properties_snapshot(&self) -> Snapshot<Scoped<PropertyValue>> {
        self.inner.bus.properties_snapshot()
    }

    pub fn local_properties_snapshot(&self) -> Snapshot<LocalProperty> {
        self.inner.bus.local_properties_snapshot()
    }

    pub fn logs_snapshot(&self) -> Snapshot<LogEntry> {
        self.inner.bus.logs_snapshot()
    }

    /// Confirmed subscription state, `None` if never subscribed.
    pub fn subscription(&self, target: Muid, property_id: &str) -> Option<SubscriptionState> {
        self.connection(target)?
            .subscription(property_id)
            .map(|s| s.state)
    }

    // ── Stream accessors ─────────────────────────────────────────

    pub fn connections(&self) -> EntityStream<ConnectionSnapshot> {
        self.inner.bus.connections()
    }

    pub fn profiles(&self) -> EntityStream<Scoped<ProfileState>> {
        self.inner.bus.profiles()
    }

    pub fn properties(&self) -> EntityStream<Scoped<PropertyValue>> {
        self.inner.bus.properties()
    }

    pub fn local_properties(&self) -> EntityStream<LocalProperty> {
        self.inner.bus.local_properties()
    }

    pub fn logs(&self) -> EntityStream<LogEntry> {
        self.inner.bus.logs()
    }

    // ── Reconciliation ───────────────────────────────────────────

    fn reconcile(&self, registry: &mut Registry, event: &PortEvent) {
        match registry.apply(event) {
            Ok(changes) => self.inner.bus.publish(registry, &changes),
            Err(err) => self.report(registry, event, &err),
        }
    }

    /// Surface an event-side failure. The registry itself is untouched.
    fn report(&self, registry: &mut Registry, event: &PortEvent, err: &CoreError) {
        warn!(event = event.kind(), error = %err, "failed to apply port event");
        self.inner.bus.publish_diagnostic(Diagnostic::from_error(err));

        if self.inner.config.diagnostics_to_log {
            let entry = LogEntry::now(MessageDirection::In, format!("diagnostic: {err}"));
            let changes = ChangeSet {
                log: registry.append_log(entry),
                ..ChangeSet::default()
            };
            self.inner.bus.publish(registry, &changes);
        }
    }

    async fn registry_op(&self, op: RegistryOp) -> Result<(), CoreError> {
        self.inner
            .registry_tx
            .send(op)
            .await
            .map_err(|_| CoreError::NotInitialized)
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Own the registry and apply everything that changes it, one step at
/// a time.
async fn reconciler_task(
    controller: Controller,
    mut registry: Registry,
    mut ops: mpsc::Receiver<RegistryOp>,
    mut events: broadcast::Receiver<Arc<PortEvent>>,
) {
    let cancel = controller.inner.cancel.clone();
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            op = ops.recv() => {
                let Some(op) = op else { break };
                match op {
                    RegistryOp::ClearLogs { ack } => {
                        // Anything the port emitted before the clear lands first.
                        drain_pending(&controller, &mut registry, &mut events);
                        registry.clear_logs();
                        controller.inner.bus.publish_logs_cleared();
                        debug!("registry log cleared");
                        let _ = ack.send(());
                    }
                    RegistryOp::Apply(event) => controller.reconcile(&mut registry, &event),
                }
            }
            event = events.recv(), if events_open => match event {
                Ok(event) => controller.reconcile(&mut registry, &event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "port event stream lagged; events were dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("port event stream closed");
                    events_open = false;
                }
            },
        }
    }
}

fn drain_pending(
    controller: &Controller,
    registry: &mut Registry,
    events: &mut broadcast::Receiver<Arc<PortEvent>>,
) {
    loop {
        match events.try_recv() {
            Ok(event) => controller.reconcile(registry, &event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "port event stream lagged; events were dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

/// Process commands from the mpsc channel, routing each to the port.
async fn command_processor_task(controller: Controller, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = controller.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&controller, envelope.command).await;
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

/// Periodically pull connections from the port and merge them in as
/// discovery results.
async fn poll_task(controller: Controller, interval: Duration) {
    let cancel = controller.inner.cancel.clone();
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let results = match controller.inner.port.get_connections().await {
                    Ok(results) => results,
                    Err(e) => {
                        warn!(error = %e, "connection poll failed");
                        continue;
                    }
                };
                debug!(connections = results.len(), "connection poll complete");
                for result in results {
                    if controller.registry_op(RegistryOp::Apply(PortEvent::Discovered(result))).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(controller: &Controller, cmd: Command) -> Result<CommandResult, CoreError> {
    let port = &controller.inner.port;
    debug!(command = cmd.name(), "forwarding command");

    match cmd {
        // ── Discovery ────────────────────────────────────────────
        Command::SendDiscovery => port.send_discovery().await?,
        Command::SelectConnection { target } => port.select_connection(target).await?,

        // ── Profiles ─────────────────────────────────────────────
        Command::SetProfile {
            key,
            enabled,
            num_channels,
        } => port.set_profile(key, enabled, num_channels).await?,

        // ── Remote properties ────────────────────────────────────
        Command::SubscribeProperty {
            property_id,
            encoding,
        } => {
            port.subscribe_property(&property_id, encoding.as_deref())
                .await?;
        }
        Command::UnsubscribeProperty { property_id } => {
            port.unsubscribe_property(&property_id).await?;
        }
        Command::RefreshPropertyValue(request) => {
            port.refresh_property_value(
                &request.property_id,
                request.encoding.as_deref(),
                request.offset,
                request.limit,
            )
            .await?;
        }

        // ── Local properties ─────────────────────────────────────
        Command::CreateProperty { metadata } => port.create_property(&metadata).await?,
        Command::UpdatePropertyMetadata {
            property_id,
            metadata,
        } => {
            port.update_property_metadata(&property_id, &metadata)
                .await?;
        }
        Command::UpdatePropertyValue {
            property_id,
            res_id,
            data,
        } => {
            port.update_property_value(&property_id, res_id.as_deref(), &data)
                .await?;
        }
        Command::RemoveProperty { property_id } => port.remove_property(&property_id).await?,

        // ── Transport ────────────────────────────────────────────
        Command::ClearLogs => {
            port.clear_logs().await?;
            let (ack, done) = oneshot::channel();
            controller.registry_op(RegistryOp::ClearLogs { ack }).await?;
            done.await.map_err(|_| CoreError::NotInitialized)?;
        }
        Command::GetMuid => return Ok(CommandResult::Muid(port.get_muid().await?)),
    }

    Ok(CommandResult::Forwarded)
}
