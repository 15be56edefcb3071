// ── Mock protocol engine ──
//
// In-memory `ProtocolPort` that behaves like a single remote responder.
// Requests are acknowledged immediately; confirmations arrive as events
// after `response_delay`. Every call is recorded so tests can assert on
// what reached the port (and what did not).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use tokio::sync::{Mutex, MutexGuard, broadcast};
use tracing::debug;

use super::{DiscoveryResult, PortError, PortEvent, PropertyUpdate, ProtocolPort};
use crate::model::{
    DeviceInfo, JSON_MEDIA_TYPE, LocalProperty, LogEntry, MessageDirection, Muid, NamedId,
    ProfileAddress, ProfileGroup, ProfileId, ProfileKey, ProfileState, PropertyMetadata,
    PropertyValue, SetAccess, SubscriptionState,
};

const EVENT_CHANNEL_SIZE: usize = 256;

/// MUID of the responder the mock pretends to discover.
pub const MOCK_TARGET: Muid = Muid(0x8765_4321);

/// Profile the mock responder advertises.
pub const MOCK_PROFILE_ID: ProfileId = ProfileId::new([0x7E, 0x00, 0x01, 0x02, 0x03]);

/// Property the mock responder advertises.
pub const MOCK_PROPERTY_ID: &str = "mock.property.1";

// ── Configuration ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MockPortConfig {
    /// MUID reported by `get_muid()`.
    pub muid: Muid,
    /// Delay before confirmation events are emitted. Zero emits inline.
    pub response_delay: Duration,
}

impl Default for MockPortConfig {
    fn default() -> Self {
        Self {
            muid: Muid(0x1234_5678),
            response_delay: Duration::ZERO,
        }
    }
}

// ── Call journal ─────────────────────────────────────────────────────

/// A request as it reached the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum PortCall {
    Initialize,
    Shutdown,
    SendDiscovery,
    SetProfile {
        key: ProfileKey,
        enabled: bool,
        num_channels: u16,
    },
    SubscribeProperty {
        property_id: String,
        encoding: Option<String>,
    },
    UnsubscribeProperty {
        property_id: String,
    },
    RefreshPropertyValue {
        property_id: String,
        encoding: Option<String>,
        offset: Option<u32>,
        limit: Option<u32>,
    },
    CreateProperty {
        resource: String,
    },
    UpdatePropertyMetadata {
        property_id: String,
        resource: String,
    },
    UpdatePropertyValue {
        property_id: String,
        res_id: Option<String>,
        data: Vec<u8>,
    },
    RemoveProperty {
        property_id: String,
    },
    GetLogs,
    ClearLogs,
    GetMuid,
    SelectConnection {
        target: Muid,
    },
    GetConnections,
}

// ── Mock state ───────────────────────────────────────────────────────

struct MockRemote {
    profiles: IndexMap<ProfileKey, ProfileState>,
    properties: IndexMap<String, PropertyValue>,
    metadata: Vec<PropertyMetadata>,
    subscriptions: IndexMap<String, SubscriptionState>,
}

impl MockRemote {
    fn seeded() -> Self {
        let profile = ProfileState {
            group: ProfileGroup::Index(0),
            address: ProfileAddress::FUNCTION_BLOCK,
            profile_id: MOCK_PROFILE_ID,
            enabled: false,
            num_channels_requested: 0,
        };
        let property = PropertyValue::new(
            MOCK_PROPERTY_ID,
            JSON_MEDIA_TYPE,
            Bytes::from_static(br#"{"value":123}"#),
        );
        let metadata = PropertyMetadata {
            can_set: SetAccess::Full,
            can_subscribe: true,
            ..PropertyMetadata::new(MOCK_PROPERTY_ID)
        };

        Self {
            profiles: IndexMap::from([(profile.key(), profile)]),
            properties: IndexMap::from([(property.id.clone(), property)]),
            metadata: vec![metadata],
            subscriptions: IndexMap::new(),
        }
    }

    fn discovery_result(&self) -> DiscoveryResult {
        DiscoveryResult {
            target: MOCK_TARGET,
            product_instance_id: "Mock Device".into(),
            max_simultaneous_property_requests: 4,
            device_info: DeviceInfo {
                manufacturer: NamedId::new(0x7D, "Mock Manufacturer"),
                family: NamedId::new(0x1234, "Mock Family"),
                model: NamedId::new(0x5678, "Mock Model"),
                version: NamedId::new(0x0100, "1.0.0"),
                serial_number: Some("MOCK001".into()),
            },
            profiles: self.profiles.values().cloned().collect(),
            properties: self.properties.values().cloned().collect(),
            metadata: self.metadata.clone(),
        }
    }

    fn subscription(&self, property_id: &str) -> SubscriptionState {
        self.subscriptions
            .get(property_id)
            .copied()
            .unwrap_or(SubscriptionState::Unsubscribed)
    }
}

#[derive(Default)]
struct MockState {
    initialized: bool,
    remote: Option<MockRemote>,
    selected: Option<Muid>,
    local: IndexMap<String, LocalProperty>,
    logs: Vec<LogEntry>,
    calls: Vec<PortCall>,
}

impl MockState {
    fn log(&mut self, direction: MessageDirection, message: impl Into<String>) -> PortEvent {
        let entry = LogEntry::now(direction, message);
        self.logs.push(entry.clone());
        PortEvent::LogAppended(entry)
    }

    fn remote(&mut self) -> Result<&mut MockRemote, PortError> {
        self.remote
            .as_mut()
            .ok_or_else(|| PortError::Rejected("no MIDI-CI connection discovered".into()))
    }

    fn require_local(&self, property_id: &str) -> Result<(), PortError> {
        if self.local.contains_key(property_id) {
            Ok(())
        } else {
            Err(PortError::Rejected(format!(
                "no local property '{property_id}'"
            )))
        }
    }
}

struct MockInner {
    config: MockPortConfig,
    available: AtomicBool,
    events: broadcast::Sender<Arc<PortEvent>>,
    state: Mutex<MockState>,
}

impl MockInner {
    fn send(&self, events: Vec<PortEvent>) {
        for event in events {
            // No receivers is fine; events are fire-and-forget.
            let _ = self.events.send(Arc::new(event));
        }
    }
}

// ── MockPort ─────────────────────────────────────────────────────────

/// Cheaply cloneable mock protocol engine.
#[derive(Clone)]
pub struct MockPort {
    inner: Arc<MockInner>,
}

impl MockPort {
    pub fn new(config: MockPortConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(MockInner {
                config,
                available: AtomicBool::new(true),
                events,
                state: Mutex::new(MockState::default()),
            }),
        }
    }

    pub fn config(&self) -> &MockPortConfig {
        &self.inner.config
    }

    /// Simulate the engine going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Inject an event as if the engine had produced it.
    pub fn emit(&self, event: PortEvent) {
        self.inner.send(vec![event]);
    }

    /// Every call received so far, including rejected ones.
    pub async fn calls(&self) -> Vec<PortCall> {
        self.inner.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.inner.state.lock().await.calls.clear();
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Journal the call, then check availability and initialization.
    async fn accept(&self, call: PortCall) -> Result<MutexGuard<'_, MockState>, PortError> {
        let mut state = self.inner.state.lock().await;
        state.calls.push(call);
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("mock port offline".into()));
        }
        if !state.initialized {
            return Err(PortError::NotInitialized);
        }
        Ok(state)
    }

    /// Run `respond` against the mock state after the configured delay
    /// and emit whatever events it returns.
    fn respond<F>(&self, respond: F)
    where
        F: FnOnce(&mut MockState) -> Vec<PortEvent> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let delay = inner.config.response_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let events = respond(&mut *inner.state.lock().await);
            inner.send(events);
        });
    }

    /// Like [`respond`](Self::respond), but inline when there is no delay
    /// so callers observe the confirmation before the request returns.
    fn respond_now_or_later<F>(&self, state: &mut MockState, respond: F)
    where
        F: FnOnce(&mut MockState) -> Vec<PortEvent> + Send + 'static,
    {
        if self.inner.config.response_delay.is_zero() {
            let events = respond(state);
            self.inner.send(events);
        } else {
            self.respond(respond);
        }
    }
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new(MockPortConfig::default())
    }
}

#[async_trait]
impl ProtocolPort for MockPort {
    async fn initialize(&self) -> Result<(), PortError> {
        let mut state = self.inner.state.lock().await;
        state.calls.push(PortCall::Initialize);
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("mock port offline".into()));
        }
        state.initialized = true;
        let event = state.log(MessageDirection::Out, "MIDI-CI Bridge initialized");
        self.inner.send(vec![event]);
        debug!(muid = %self.inner.config.muid, "mock port initialized");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PortError> {
        let mut state = self.accept(PortCall::Shutdown).await?;
        state.initialized = false;
        let event = state.log(MessageDirection::Out, "MIDI-CI Bridge shutdown");
        self.inner.send(vec![event]);
        Ok(())
    }

    async fn send_discovery(&self) -> Result<(), PortError> {
        let mut state = self.accept(PortCall::SendDiscovery).await?;
        let event = state.log(MessageDirection::Out, "Discovery inquiry sent");
        self.inner.send(vec![event]);

        self.respond_now_or_later(&mut state, |state| {
            let discovered = state
                .remote
                .get_or_insert_with(MockRemote::seeded)
                .discovery_result();
            vec![
                PortEvent::Discovered(discovered),
                state.log(MessageDirection::In, "Discovery response received"),
            ]
        });
        Ok(())
    }

    async fn set_profile(
        &self,
        key: ProfileKey,
        enabled: bool,
        num_channels: u16,
    ) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::SetProfile {
                key,
                enabled,
                num_channels,
            })
            .await?;
        state.remote()?;

        let verb = if enabled { "enabled" } else { "disabled" };
        let event = state.log(
            MessageDirection::Out,
            format!(
                "Profile {verb}: Group {}, Address {}",
                key.group,
                key.address.value()
            ),
        );
        self.inner.send(vec![event]);

        self.respond_now_or_later(&mut state, move |state| {
            let Ok(remote) = state.remote() else {
                return Vec::new();
            };
            let profile = ProfileState {
                group: key.group,
                address: key.address,
                profile_id: key.profile_id,
                enabled,
                num_channels_requested: num_channels,
            };
            remote.profiles.insert(key, profile.clone());
            vec![PortEvent::ProfileChanged {
                target: MOCK_TARGET,
                profile,
            }]
        });
        Ok(())
    }

    async fn subscribe_property(
        &self,
        property_id: &str,
        encoding: Option<&str>,
    ) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::SubscribeProperty {
                property_id: property_id.to_owned(),
                encoding: encoding.map(str::to_owned),
            })
            .await?;
        let target = state.selected.unwrap_or(MOCK_TARGET);
        let current = state.remote()?.subscription(property_id);

        let suffix = encoding.map(|e| format!(" ({e})")).unwrap_or_default();
        let mut events = vec![state.log(
            MessageDirection::Out,
            format!("Subscribing to property: {property_id}{suffix}"),
        )];

        if current != SubscriptionState::Unsubscribed {
            // Already pending or active; the outstanding confirmation stands.
            self.inner.send(events);
            return Ok(());
        }

        state
            .remote()?
            .subscriptions
            .insert(property_id.to_owned(), SubscriptionState::Subscribing);
        events.push(PortEvent::SubscriptionChanged {
            target,
            property_id: property_id.to_owned(),
            state: SubscriptionState::Subscribing,
        });
        self.inner.send(events);

        let property_id = property_id.to_owned();
        self.respond_now_or_later(&mut state, move |state| {
            let Ok(remote) = state.remote() else {
                return Vec::new();
            };
            // Cancelled before the reply landed.
            if remote.subscription(&property_id) != SubscriptionState::Subscribing {
                return Vec::new();
            }
            remote
                .subscriptions
                .insert(property_id.clone(), SubscriptionState::Subscribed);

            let mut events = vec![PortEvent::SubscriptionChanged {
                target,
                property_id: property_id.clone(),
                state: SubscriptionState::Subscribed,
            }];
            if let Some(value) = remote.properties.get(&property_id) {
                events.push(PortEvent::PropertyUpdated(PropertyUpdate {
                    target,
                    property_id: value.id.clone(),
                    res_id: None,
                    media_type: value.media_type.clone(),
                    body: value.body.clone(),
                    partial: None,
                }));
            }
            events
        });
        Ok(())
    }

    async fn unsubscribe_property(&self, property_id: &str) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::UnsubscribeProperty {
                property_id: property_id.to_owned(),
            })
            .await?;
        let target = state.selected.unwrap_or(MOCK_TARGET);
        let current = state.remote()?.subscription(property_id);

        let mut events = vec![state.log(
            MessageDirection::Out,
            format!("Unsubscribing from property: {property_id}"),
        )];

        let confirmation = match current {
            SubscriptionState::Subscribing => Some(PortEvent::SubscriptionCancelled {
                target,
                property_id: property_id.to_owned(),
            }),
            SubscriptionState::Subscribed => Some(PortEvent::SubscriptionChanged {
                target,
                property_id: property_id.to_owned(),
                state: SubscriptionState::Unsubscribed,
            }),
            SubscriptionState::Unsubscribed => None,
        };
        if let Some(confirmation) = confirmation {
            state
                .remote()?
                .subscriptions
                .insert(property_id.to_owned(), SubscriptionState::Unsubscribed);
            events.push(confirmation);
        }
        self.inner.send(events);
        Ok(())
    }

    async fn refresh_property_value(
        &self,
        property_id: &str,
        encoding: Option<&str>,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::RefreshPropertyValue {
                property_id: property_id.to_owned(),
                encoding: encoding.map(str::to_owned),
                offset,
                limit,
            })
            .await?;
        let target = state.selected.unwrap_or(MOCK_TARGET);
        if !state.remote()?.properties.contains_key(property_id) {
            return Err(PortError::Rejected(format!(
                "unknown property '{property_id}'"
            )));
        }

        let event = state.log(
            MessageDirection::Out,
            format!("Refreshing property value: {property_id}"),
        );
        self.inner.send(vec![event]);

        let property_id = property_id.to_owned();
        self.respond_now_or_later(&mut state, move |state| {
            let Some(value) = state
                .remote()
                .ok()
                .and_then(|remote| remote.properties.get(&property_id).cloned())
            else {
                return Vec::new();
            };
            vec![
                PortEvent::PropertyUpdated(PropertyUpdate {
                    target,
                    property_id: value.id,
                    res_id: None,
                    media_type: value.media_type,
                    body: value.body,
                    partial: None,
                }),
                state.log(
                    MessageDirection::In,
                    format!("Property value refreshed: {property_id}"),
                ),
            ]
        });
        Ok(())
    }

    async fn create_property(&self, metadata: &PropertyMetadata) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::CreateProperty {
                resource: metadata.resource.clone(),
            })
            .await?;
        if state.local.contains_key(&metadata.resource) {
            return Err(PortError::Rejected(format!(
                "local property '{}' already exists",
                metadata.resource
            )));
        }

        let event = state.log(
            MessageDirection::Out,
            format!("Creating property: {}", metadata.resource),
        );
        self.inner.send(vec![event]);

        let metadata = metadata.clone();
        self.respond_now_or_later(&mut state, move |state| {
            state.local.insert(
                metadata.resource.clone(),
                LocalProperty {
                    metadata: metadata.clone(),
                    value: None,
                },
            );
            vec![PortEvent::LocalPropertyDefined {
                previous_id: None,
                metadata,
            }]
        });
        Ok(())
    }

    async fn update_property_metadata(
        &self,
        property_id: &str,
        metadata: &PropertyMetadata,
    ) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::UpdatePropertyMetadata {
                property_id: property_id.to_owned(),
                resource: metadata.resource.clone(),
            })
            .await?;
        state.require_local(property_id)?;

        let event = state.log(
            MessageDirection::Out,
            format!("Updating property metadata: {property_id}"),
        );
        self.inner.send(vec![event]);

        let previous_id = property_id.to_owned();
        let metadata = metadata.clone();
        self.respond_now_or_later(&mut state, move |state| {
            let Some(index) = state.local.get_index_of(&previous_id) else {
                return Vec::new();
            };
            let value = state
                .local
                .shift_remove(&previous_id)
                .and_then(|property| property.value);
            state.local.shift_insert(
                index,
                metadata.resource.clone(),
                LocalProperty {
                    metadata: metadata.clone(),
                    value,
                },
            );
            vec![PortEvent::LocalPropertyDefined {
                previous_id: Some(previous_id),
                metadata,
            }]
        });
        Ok(())
    }

    async fn update_property_value(
        &self,
        property_id: &str,
        res_id: Option<&str>,
        data: &[u8],
    ) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::UpdatePropertyValue {
                property_id: property_id.to_owned(),
                res_id: res_id.map(str::to_owned),
                data: data.to_vec(),
            })
            .await?;
        state.require_local(property_id)?;

        let event = state.log(
            MessageDirection::Out,
            format!("Updating property value: {property_id}"),
        );
        self.inner.send(vec![event]);

        let property_id = property_id.to_owned();
        let body = Bytes::copy_from_slice(data);
        self.respond_now_or_later(&mut state, move |state| {
            let Some(property) = state.local.get_mut(&property_id) else {
                return Vec::new();
            };
            let media_type = property.metadata.primary_media_type().to_owned();
            property.value = Some(PropertyValue::new(
                property_id.clone(),
                media_type.clone(),
                body.clone(),
            ));
            vec![PortEvent::LocalPropertyValueChanged {
                property_id,
                media_type,
                body,
            }]
        });
        Ok(())
    }

    async fn remove_property(&self, property_id: &str) -> Result<(), PortError> {
        let mut state = self
            .accept(PortCall::RemoveProperty {
                property_id: property_id.to_owned(),
            })
            .await?;
        state.require_local(property_id)?;

        let event = state.log(
            MessageDirection::Out,
            format!("Removing property: {property_id}"),
        );
        self.inner.send(vec![event]);

        let property_id = property_id.to_owned();
        self.respond_now_or_later(&mut state, move |state| {
            if state.local.shift_remove(&property_id).is_none() {
                return Vec::new();
            }
            vec![PortEvent::LocalPropertyRemoved { property_id }]
        });
        Ok(())
    }

    async fn get_logs(&self) -> Result<Vec<LogEntry>, PortError> {
        let state = self.accept(PortCall::GetLogs).await?;
        Ok(state.logs.clone())
    }

    async fn clear_logs(&self) -> Result<(), PortError> {
        let mut state = self.accept(PortCall::ClearLogs).await?;
        state.logs.clear();
        debug!("mock port logs cleared");
        Ok(())
    }

    async fn get_muid(&self) -> Result<Muid, PortError> {
        drop(self.accept(PortCall::GetMuid).await?);
        Ok(self.inner.config.muid)
    }

    async fn select_connection(&self, target: Muid) -> Result<(), PortError> {
        let mut state = self.accept(PortCall::SelectConnection { target }).await?;
        if state.remote.is_none() || target != MOCK_TARGET {
            return Err(PortError::Rejected(format!("unknown connection {target}")));
        }
        state.selected = Some(target);
        Ok(())
    }

    async fn get_connections(&self) -> Result<Vec<DiscoveryResult>, PortError> {
        let state = self.accept(PortCall::GetConnections).await?;
        Ok(state
            .remote
            .as_ref()
            .map(MockRemote::discovery_result)
            .into_iter()
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<PortEvent>> {
        self.inner.events.subscribe()
    }
}
