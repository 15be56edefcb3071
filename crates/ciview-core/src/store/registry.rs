// ── Entity registry ──
//
// Authoritative in-memory state: connections with their nested profile,
// property, metadata and subscription sets, the local property catalogue,
// and the transport log. Mutation goes through `Registry::apply`; reads
// return freshly built immutable snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use super::collection::OrderedCollection;
use crate::config::LogRetention;
use crate::model::{
    Connection, ConnectionSnapshot, LocalProperty, LogEntry, Muid, ProfileKey, ProfileState,
    PropertyMetadata, PropertyValue, Subscription, SubscriptionState,
};

/// Immutable, cheaply cloneable list published to readers.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// An item from a flattened cross-connection list, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scoped<T> {
    pub target: Muid,
    #[serde(flatten)]
    pub item: Arc<T>,
}

// ── ConnectionRecord ─────────────────────────────────────────────────

pub(crate) struct ConnectionRecord {
    pub(crate) connection: Arc<Connection>,
    pub(crate) profiles: OrderedCollection<ProfileKey, ProfileState>,
    pub(crate) properties: OrderedCollection<String, PropertyValue>,
    pub(crate) metadata: OrderedCollection<String, PropertyMetadata>,
    pub(crate) subscriptions: OrderedCollection<String, Subscription>,
}

impl ConnectionRecord {
    pub(crate) fn new(connection: Connection) -> Self {
        Self {
            connection: Arc::new(connection),
            profiles: OrderedCollection::new(),
            properties: OrderedCollection::new(),
            metadata: OrderedCollection::new(),
            subscriptions: OrderedCollection::new(),
        }
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            connection: Arc::clone(&self.connection),
            profiles: self.profiles.snapshot(),
            properties: self.properties.snapshot(),
            metadata: self.metadata.snapshot(),
            subscriptions: self.subscriptions.snapshot(),
        }
    }

    pub(crate) fn subscription_state(&self, property_id: &str) -> SubscriptionState {
        self.subscriptions
            .get(property_id)
            .map_or(SubscriptionState::Unsubscribed, |s| s.state)
    }
}

// ── LogBuffer ────────────────────────────────────────────────────────

pub(crate) struct LogBuffer {
    entries: VecDeque<Arc<LogEntry>>,
    retention: LogRetention,
}

impl LogBuffer {
    fn new(retention: LogRetention) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
        }
    }

    /// Append unless an equal entry is still retained. Returns the stored entry.
    pub(crate) fn push(&mut self, entry: LogEntry) -> Option<Arc<LogEntry>> {
        if self.entries.iter().any(|kept| **kept == entry) {
            return None;
        }
        let entry = Arc::new(entry);
        self.entries.push_back(Arc::clone(&entry));
        if let LogRetention::MaxEntries(max) = self.retention {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
        Some(entry)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.entries.iter().cloned().collect()
    }
}

// ── Registry ─────────────────────────────────────────────────────────

pub struct Registry {
    pub(crate) connections: IndexMap<Muid, ConnectionRecord>,
    pub(crate) local: OrderedCollection<String, LocalProperty>,
    pub(crate) logs: LogBuffer,
}

impl Registry {
    pub fn new(retention: LogRetention) -> Self {
        Self {
            connections: IndexMap::new(),
            local: OrderedCollection::new(),
            logs: LogBuffer::new(retention),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Every connection, deep, in discovery order.
    pub fn connections(&self) -> Vec<Arc<ConnectionSnapshot>> {
        self.connections
            .values()
            .map(|record| Arc::new(record.snapshot()))
            .collect()
    }

    pub fn connection(&self, target: Muid) -> Option<ConnectionSnapshot> {
        self.connections.get(&target).map(ConnectionRecord::snapshot)
    }

    /// Profiles of all connections, flattened in connection order.
    pub fn profiles(&self) -> Vec<Arc<Scoped<ProfileState>>> {
        self.connections
            .iter()
            .flat_map(|(target, record)| {
                record.profiles.values().map(|item| {
                    Arc::new(Scoped {
                        target: *target,
                        item: Arc::clone(item),
                    })
                })
            })
            .collect()
    }

    /// Property values of all connections, flattened in connection order.
    pub fn properties(&self) -> Vec<Arc<Scoped<PropertyValue>>> {
        self.connections
            .iter()
            .flat_map(|(target, record)| {
                record.properties.values().map(|item| {
                    Arc::new(Scoped {
                        target: *target,
                        item: Arc::clone(item),
                    })
                })
            })
            .collect()
    }

    pub fn subscription(&self, target: Muid, property_id: &str) -> Option<SubscriptionState> {
        self.connections
            .get(&target)?
            .subscriptions
            .get(property_id)
            .map(|s| s.state)
    }

    pub fn local_properties(&self) -> Vec<Arc<LocalProperty>> {
        self.local.snapshot()
    }

    pub fn logs(&self) -> Vec<Arc<LogEntry>> {
        self.logs.snapshot()
    }

    // ── Log maintenance ──────────────────────────────────────────────

    /// Append entries fetched from the port before live events start.
    pub fn seed_logs(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        for entry in entries {
            self.logs.push(entry);
        }
    }

    pub fn append_log(&mut self, entry: LogEntry) -> Option<Arc<LogEntry>> {
        self.logs.push(entry)
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::MessageDirection;

    #[test]
    fn log_retention_drops_oldest() {
        let mut registry = Registry::new(LogRetention::MaxEntries(2));
        for i in 0..4 {
            registry.append_log(LogEntry::now(MessageDirection::In, format!("m{i}")));
        }
        let messages: Vec<_> = registry.logs().iter().map(|l| l.message.clone()).collect();
        assert_eq!(messages, vec!["m2", "m3"]);
    }

    #[test]
    fn identical_redelivery_is_dropped() {
        let mut registry = Registry::new(LogRetention::Unbounded);
        let entry = LogEntry::now(MessageDirection::Out, "Discovery inquiry sent");
        assert!(registry.append_log(entry.clone()).is_some());
        assert!(registry.append_log(entry).is_none());
        assert_eq!(registry.logs().len(), 1);
    }

    #[test]
    fn redelivery_after_newer_entries_is_dropped() {
        let mut registry = Registry::new(LogRetention::Unbounded);
        let a = LogEntry::now(MessageDirection::Out, "a");
        let b = LogEntry::now(MessageDirection::In, "b");
        assert!(registry.append_log(a.clone()).is_some());
        assert!(registry.append_log(b).is_some());
        assert!(registry.append_log(a).is_none());

        let messages: Vec<_> = registry.logs().iter().map(|l| l.message.clone()).collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn evicted_entry_can_be_appended_again() {
        let mut registry = Registry::new(LogRetention::MaxEntries(1));
        let a = LogEntry::now(MessageDirection::Out, "a");
        registry.append_log(a.clone());
        registry.append_log(LogEntry::now(MessageDirection::Out, "b"));
        assert!(registry.append_log(a).is_some());
        assert_eq!(registry.logs()[0].message, "a");
    }

    #[test]
    fn clear_truncates_everything() {
        let mut registry = Registry::new(LogRetention::Unbounded);
        registry.seed_logs([
            LogEntry::now(MessageDirection::Out, "a"),
            LogEntry::now(MessageDirection::In, "b"),
        ]);
        registry.clear_logs();
        assert!(registry.logs().is_empty());
    }

    #[test]
    fn empty_registry_reads() {
        let registry = Registry::new(LogRetention::Unbounded);
        assert!(registry.connections().is_empty());
        assert!(registry.profiles().is_empty());
        assert!(registry.connection(Muid(1)).is_none());
        assert!(registry.subscription(Muid(1), "x").is_none());
    }
}
