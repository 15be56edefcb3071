// ── Observation bus ──
//
// Fan-out of registry changes to observers. Each collection has a watch
// channel holding its latest snapshot; a single broadcast channel carries
// every notification in emission order. Nothing is replayed to late
// subscribers beyond the current snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::error::CoreError;
use crate::model::{ConnectionSnapshot, LocalProperty, LogEntry, ProfileState, PropertyValue};
use crate::store::{ChangeSet, Registry, Scoped, Snapshot};
use crate::stream::EntityStream;

// ── Diagnostics ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
    Reconciliation,
    IllegalTransition,
}

/// A background failure while applying an inbound event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    pub(crate) fn from_error(err: &CoreError) -> Self {
        let kind = match err {
            CoreError::IllegalTransition { .. } => DiagnosticKind::IllegalTransition,
            _ => DiagnosticKind::Reconciliation,
        };
        Self {
            kind,
            message: err.to_string(),
            timestamp: Utc::now(),
        }
    }
}

// ── Notifications ────────────────────────────────────────────────────

/// One observable change, in the order it was emitted.
#[derive(Debug, Clone)]
pub enum Notification {
    ConnectionsChanged(Snapshot<ConnectionSnapshot>),
    ProfilesChanged(Snapshot<Scoped<ProfileState>>),
    PropertiesChanged(Snapshot<Scoped<PropertyValue>>),
    LocalPropertiesChanged(Snapshot<LocalProperty>),
    LogAppended(Arc<LogEntry>),
    LogsCleared,
    Diagnostic(Diagnostic),
}

impl Notification {
    /// Short label for tracing and display.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionsChanged(_) => "connections",
            Self::ProfilesChanged(_) => "profiles",
            Self::PropertiesChanged(_) => "properties",
            Self::LocalPropertiesChanged(_) => "local_properties",
            Self::LogAppended(_) => "log",
            Self::LogsCleared => "logs_cleared",
            Self::Diagnostic(_) => "diagnostic",
        }
    }
}

// ── ObservationBus ───────────────────────────────────────────────────

pub(crate) struct ObservationBus {
    connections: watch::Sender<Snapshot<ConnectionSnapshot>>,
    profiles: watch::Sender<Snapshot<Scoped<ProfileState>>>,
    properties: watch::Sender<Snapshot<Scoped<PropertyValue>>>,
    local_properties: watch::Sender<Snapshot<LocalProperty>>,
    logs: watch::Sender<Snapshot<LogEntry>>,
    notifications: broadcast::Sender<Notification>,
}

impl ObservationBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (connections, _) = watch::channel(Arc::new(Vec::new()));
        let (profiles, _) = watch::channel(Arc::new(Vec::new()));
        let (properties, _) = watch::channel(Arc::new(Vec::new()));
        let (local_properties, _) = watch::channel(Arc::new(Vec::new()));
        let (logs, _) = watch::channel(Arc::new(Vec::new()));
        let (notifications, _) = broadcast::channel(capacity.max(1));

        Self {
            connections,
            profiles,
            properties,
            local_properties,
            logs,
            notifications,
        }
    }

    /// Publish whatever `changes` touched. Connections, profiles and
    /// properties go out in that order, then local properties, then the log.
    pub(crate) fn publish(&self, registry: &Registry, changes: &ChangeSet) {
        if changes.is_empty() {
            return;
        }
        trace!(?changes, "publishing registry changes");

        if changes.connections {
            let snap = Arc::new(registry.connections());
            self.connections.send_replace(Arc::clone(&snap));
            self.notify(Notification::ConnectionsChanged(snap));
        }
        if changes.profiles {
            let snap = Arc::new(registry.profiles());
            self.profiles.send_replace(Arc::clone(&snap));
            self.notify(Notification::ProfilesChanged(snap));
        }
        if changes.properties {
            let snap = Arc::new(registry.properties());
            self.properties.send_replace(Arc::clone(&snap));
            self.notify(Notification::PropertiesChanged(snap));
        }
        if changes.local_properties {
            let snap = Arc::new(registry.local_properties());
            self.local_properties.send_replace(Arc::clone(&snap));
            self.notify(Notification::LocalPropertiesChanged(snap));
        }
        if let Some(entry) = &changes.log {
            self.logs.send_replace(Arc::new(registry.logs()));
            self.notify(Notification::LogAppended(Arc::clone(entry)));
        }
    }

    /// Refresh the log snapshot without a notification (initial seed).
    pub(crate) fn publish_logs(&self, registry: &Registry) {
        self.logs.send_replace(Arc::new(registry.logs()));
    }

    pub(crate) fn publish_logs_cleared(&self) {
        self.logs.send_replace(Arc::new(Vec::new()));
        self.notify(Notification::LogsCleared);
    }

    pub(crate) fn publish_diagnostic(&self, diagnostic: Diagnostic) {
        self.notify(Notification::Diagnostic(diagnostic));
    }

    fn notify(&self, notification: Notification) {
        // No subscribers is fine; snapshots are still current.
        let _ = self.notifications.send(notification);
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub(crate) fn connections(&self) -> EntityStream<ConnectionSnapshot> {
        EntityStream::new(self.connections.subscribe())
    }

    pub(crate) fn profiles(&self) -> EntityStream<Scoped<ProfileState>> {
        EntityStream::new(self.profiles.subscribe())
    }

    pub(crate) fn properties(&self) -> EntityStream<Scoped<PropertyValue>> {
        EntityStream::new(self.properties.subscribe())
    }

    pub(crate) fn local_properties(&self) -> EntityStream<LocalProperty> {
        EntityStream::new(self.local_properties.subscribe())
    }

    pub(crate) fn logs(&self) -> EntityStream<LogEntry> {
        EntityStream::new(self.logs.subscribe())
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub(crate) fn connections_snapshot(&self) -> Snapshot<ConnectionSnapshot> {
        self.connections.borrow().clone()
    }

    pub(crate) fn profiles_snapshot(&self) -> Snapshot<Scoped<ProfileState>> {
        self.profiles.borrow().clone()
    }

    pub(crate) fn properties_snapshot(&self) -> Snapshot<Scoped<PropertyValue>> {
        self.properties.borrow().clone()
    }

    pub(crate) fn local_properties_snapshot(&self) -> Snapshot<LocalProperty> {
        self.local_properties.borrow().clone()
    }

    pub(crate) fn logs_snapshot(&self) -> Snapshot<LogEntry> {
        self.logs.borrow().clone()
    }
}
