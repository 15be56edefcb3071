// ── Remote connections ──
//
// A connection is one discovered MIDI-CI responder. Identity is the
// responder's MUID; everything else is replaced wholesale on rediscovery.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::muid::Muid;
use super::profile::ProfileState;
use super::property::{PropertyMetadata, PropertyValue};
use super::subscription::Subscription;

/// Numeric identifier with an optional human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamedId {
    pub id: u32,
    pub name: Option<String>,
}

impl NamedId {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// The label if present, otherwise the id as hex.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("0x{:X}", self.id))
    }
}

/// Identity block reported in a discovery reply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub manufacturer: NamedId,
    pub family: NamedId,
    pub model: NamedId,
    pub version: NamedId,
    pub serial_number: Option<String>,
}

/// A discovered remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub target_muid: Muid,
    pub product_instance_id: String,
    pub max_simultaneous_property_requests: u32,
    pub device_info: DeviceInfo,
}

/// Deep read-only view of one connection and everything it owns.
///
/// Built by the registry after every applied event; never mutated after
/// publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub connection: Arc<Connection>,
    pub profiles: Vec<Arc<ProfileState>>,
    pub properties: Vec<Arc<PropertyValue>>,
    pub metadata: Vec<Arc<PropertyMetadata>>,
    pub subscriptions: Vec<Arc<Subscription>>,
}

impl ConnectionSnapshot {
    pub fn target(&self) -> Muid {
        self.connection.target_muid
    }

    pub fn property(&self, property_id: &str) -> Option<&Arc<PropertyValue>> {
        self.properties.iter().find(|p| p.id == property_id)
    }

    pub fn subscription(&self, property_id: &str) -> Option<&Arc<Subscription>> {
        self.subscriptions
            .iter()
            .find(|s| s.property_id == property_id)
    }
}
