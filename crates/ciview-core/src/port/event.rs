// ── Inbound protocol events ──
//
// Everything the protocol engine reports back. The reconciler is the only
// consumer that mutates state from these.

use bytes::Bytes;

use crate::model::{
    DeviceInfo, LogEntry, Muid, ProfileKey, ProfileState, PropertyMetadata, PropertyValue,
    SubscriptionState,
};

/// A discovery reply, or a polled snapshot of a known connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryResult {
    pub target: Muid,
    pub product_instance_id: String,
    pub max_simultaneous_property_requests: u32,
    pub device_info: DeviceInfo,
    pub profiles: Vec<ProfileState>,
    pub properties: Vec<PropertyValue>,
    pub metadata: Vec<PropertyMetadata>,
}

/// How a partial property body is merged into the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialUpdate {
    /// Overwrite bytes starting at `offset`, extending the body if needed.
    ByteRange { offset: usize },
    /// Body is a JSON object mapping JSON pointers to replacement values.
    JsonPointer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub target: Muid,
    pub property_id: String,
    /// Selects a sub-resource; not part of the property's identity.
    pub res_id: Option<String>,
    pub media_type: String,
    pub body: Bytes,
    pub partial: Option<PartialUpdate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortEvent {
    // ── Connections ──────────────────────────────────────────────────
    Discovered(DiscoveryResult),
    ConnectionRemoved {
        target: Muid,
    },

    // ── Profiles ─────────────────────────────────────────────────────
    ProfileChanged {
        target: Muid,
        profile: ProfileState,
    },
    ProfileRemoved {
        target: Muid,
        key: ProfileKey,
    },

    // ── Remote properties ────────────────────────────────────────────
    PropertyUpdated(PropertyUpdate),
    PropertyMetadataChanged {
        target: Muid,
        metadata: Vec<PropertyMetadata>,
    },
    PropertyRemoved {
        target: Muid,
        property_id: String,
    },

    // ── Subscriptions ────────────────────────────────────────────────
    SubscriptionChanged {
        target: Muid,
        property_id: String,
        state: SubscriptionState,
    },
    SubscriptionCancelled {
        target: Muid,
        property_id: String,
    },

    // ── Local (responder) properties ─────────────────────────────────
    LocalPropertyDefined {
        /// Set when the metadata update renamed the property.
        previous_id: Option<String>,
        metadata: PropertyMetadata,
    },
    LocalPropertyValueChanged {
        property_id: String,
        media_type: String,
        body: Bytes,
    },
    LocalPropertyRemoved {
        property_id: String,
    },

    // ── Transport log ────────────────────────────────────────────────
    LogAppended(LogEntry),
}

impl PortEvent {
    /// Short label for tracing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovered(_) => "discovered",
            Self::ConnectionRemoved { .. } => "connection_removed",
            Self::ProfileChanged { .. } => "profile_changed",
            Self::ProfileRemoved { .. } => "profile_removed",
            Self::PropertyUpdated(_) => "property_updated",
            Self::PropertyMetadataChanged { .. } => "property_metadata_changed",
            Self::PropertyRemoved { .. } => "property_removed",
            Self::SubscriptionChanged { .. } => "subscription_changed",
            Self::SubscriptionCancelled { .. } => "subscription_cancelled",
            Self::LocalPropertyDefined { .. } => "local_property_defined",
            Self::LocalPropertyValueChanged { .. } => "local_property_value_changed",
            Self::LocalPropertyRemoved { .. } => "local_property_removed",
            Self::LogAppended(_) => "log_appended",
        }
    }
}
