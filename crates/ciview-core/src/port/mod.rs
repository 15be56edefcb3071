// ── Protocol port ──
//
// The contract between the core and an external MIDI-CI protocol engine.
// Requests go out through `ProtocolPort`; confirmations come back as
// `PortEvent`s on the receiver returned by `subscribe()`.

mod devices;
mod event;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::model::{LogEntry, Muid, ProfileKey, PropertyMetadata};

pub use devices::{AvailableDevices, DeviceEnumerator, MidiDevice, MockDevices};
pub use event::{DiscoveryResult, PartialUpdate, PortEvent, PropertyUpdate};
pub use mock::{MockPort, MockPortConfig, PortCall};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("protocol engine unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected by protocol engine: {0}")]
    Rejected(String),

    #[error("protocol engine not initialized")]
    NotInitialized,
}

/// Asynchronous capability surface of a MIDI-CI protocol engine.
///
/// Every request completes when the engine has accepted it. Whether it
/// took effect is reported later through [`PortEvent`]s.
#[async_trait]
pub trait ProtocolPort: Send + Sync {
    async fn initialize(&self) -> Result<(), PortError>;

    async fn shutdown(&self) -> Result<(), PortError>;

    async fn send_discovery(&self) -> Result<(), PortError>;

    async fn set_profile(
        &self,
        key: ProfileKey,
        enabled: bool,
        num_channels: u16,
    ) -> Result<(), PortError>;

    async fn subscribe_property(
        &self,
        property_id: &str,
        encoding: Option<&str>,
    ) -> Result<(), PortError>;

    async fn unsubscribe_property(&self, property_id: &str) -> Result<(), PortError>;

    async fn refresh_property_value(
        &self,
        property_id: &str,
        encoding: Option<&str>,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<(), PortError>;

    async fn create_property(&self, metadata: &PropertyMetadata) -> Result<(), PortError>;

    async fn update_property_metadata(
        &self,
        property_id: &str,
        metadata: &PropertyMetadata,
    ) -> Result<(), PortError>;

    async fn update_property_value(
        &self,
        property_id: &str,
        res_id: Option<&str>,
        data: &[u8],
    ) -> Result<(), PortError>;

    async fn remove_property(&self, property_id: &str) -> Result<(), PortError>;

    async fn get_logs(&self) -> Result<Vec<LogEntry>, PortError>;

    async fn clear_logs(&self) -> Result<(), PortError>;

    async fn get_muid(&self) -> Result<Muid, PortError>;

    /// Make `target` the destination of subsequent property requests.
    async fn select_connection(&self, target: Muid) -> Result<(), PortError>;

    /// Current view of every known connection, for engines that cannot push.
    async fn get_connections(&self) -> Result<Vec<DiscoveryResult>, PortError> {
        Ok(Vec::new())
    }

    /// Receive inbound events. Events sent before the call are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<Arc<PortEvent>>;
}
