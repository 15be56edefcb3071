// ── Domain model ──
//
// Plain data types shared by the port contract, the registry and
// consumers. Nothing in here knows about channels or tasks.

pub mod connection;
pub mod log;
pub mod muid;
pub mod profile;
pub mod property;
pub mod subscription;

pub use connection::{Connection, ConnectionSnapshot, DeviceInfo, NamedId};
pub use log::{LogEntry, MessageDirection};
pub use muid::Muid;
pub use profile::{ProfileAddress, ProfileGroup, ProfileId, ProfileKey, ProfileState};
pub use property::{
    ColumnTarget, JSON_MEDIA_TYPE, LocalProperty, Originator, PropertyColumn, PropertyMetadata,
    PropertyValue, SetAccess, is_json_media_type,
};
pub use subscription::{Subscription, SubscriptionState, Transition};
