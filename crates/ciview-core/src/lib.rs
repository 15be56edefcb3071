// ciview-core: Reactive MIDI-CI state layer between a protocol engine and consumers (CLI/UI).

pub mod bus;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod port;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{Diagnostic, DiagnosticKind, Notification};
pub use command::requests::*;
pub use command::{Command, CommandResult};
pub use config::{ControllerConfig, LogRetention};
pub use controller::{Controller, ControllerState};
pub use error::CoreError;
pub use port::{
    AvailableDevices, DeviceEnumerator, DiscoveryResult, MidiDevice, MockDevices, MockPort,
    MockPortConfig, PartialUpdate, PortCall, PortError, PortEvent, PropertyUpdate, ProtocolPort,
};
pub use store::{Registry, Scoped, Snapshot};
pub use stream::EntityStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Connections
    Connection, ConnectionSnapshot, DeviceInfo, Muid, NamedId,
    // Profiles
    ProfileAddress, ProfileGroup, ProfileId, ProfileKey, ProfileState,
    // Properties
    ColumnTarget, JSON_MEDIA_TYPE, LocalProperty, Originator, PropertyColumn, PropertyMetadata,
    PropertyValue, SetAccess, Subscription, SubscriptionState,
    // Transport log
    LogEntry, MessageDirection,
};
