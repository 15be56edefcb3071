// ── Event reconciliation ──
//
// Merges inbound port events into the registry. Every event is validated
// before anything is written, so a failing event leaves the registry as it
// was. Applying the same event twice yields the same state.

use std::sync::Arc;

use indexmap::map::Entry;
use tracing::{debug, trace};

use super::collection::Upsert;
use super::partial;
use super::registry::{ConnectionRecord, Registry};
use crate::command::MAX_PROFILE_CHANNELS;
use crate::error::CoreError;
use crate::model::{
    Connection, LocalProperty, LogEntry, Muid, ProfileState, PropertyMetadata, PropertyValue,
    Subscription, SubscriptionState, Transition,
};
use crate::port::{DiscoveryResult, PortEvent, PropertyUpdate};

/// Which observable collections one applied event touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub connections: bool,
    pub profiles: bool,
    pub properties: bool,
    pub local_properties: bool,
    pub log: Option<Arc<LogEntry>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        !self.connections
            && !self.profiles
            && !self.properties
            && !self.local_properties
            && self.log.is_none()
    }

    fn profile(&mut self, outcome: Upsert) {
        if outcome.changed() {
            self.connections = true;
            self.profiles = true;
        }
    }

    fn property(&mut self, outcome: Upsert) {
        if outcome.changed() {
            self.connections = true;
            self.properties = true;
        }
    }

    fn nested(&mut self, outcome: Upsert) {
        if outcome.changed() {
            self.connections = true;
        }
    }
}

impl Registry {
    /// Apply one inbound event.
    pub fn apply(&mut self, event: &PortEvent) -> Result<ChangeSet, CoreError> {
        trace!(kind = event.kind(), "applying port event");
        let mut changes = ChangeSet::default();

        match event {
            // ── Connections ──────────────────────────────────────────
            PortEvent::Discovered(result) => self.apply_discovery(result, &mut changes)?,

            PortEvent::ConnectionRemoved { target } => {
                if let Some(record) = self.connections.shift_remove(target) {
                    debug!(target = %target, "connection removed");
                    changes.connections = true;
                    changes.profiles = !record.profiles.is_empty();
                    changes.properties = !record.properties.is_empty();
                }
            }

            // ── Profiles ─────────────────────────────────────────────
            PortEvent::ProfileChanged { target, profile } => {
                check_profile(*target, profile)?;
                let record = self.record_mut(*target)?;
                changes.profile(record.profiles.upsert(profile.key(), profile.clone()));
            }

            PortEvent::ProfileRemoved { target, key } => {
                let record = self.record_mut(*target)?;
                if record.profiles.remove(key).is_some() {
                    changes.connections = true;
                    changes.profiles = true;
                }
            }

            // ── Remote properties ────────────────────────────────────
            PortEvent::PropertyUpdated(update) => {
                let record = self.record_mut(update.target)?;
                let value = merged_value(record, update)?;
                changes.property(record.properties.upsert(update.property_id.clone(), value));
            }

            PortEvent::PropertyMetadataChanged { target, metadata } => {
                let record = self.record_mut(*target)?;
                for entry in metadata {
                    changes.nested(record.metadata.upsert(entry.resource.clone(), entry.clone()));
                }
            }

            PortEvent::PropertyRemoved {
                target,
                property_id,
            } => {
                let record = self.record_mut(*target)?;
                if record.properties.remove(property_id.as_str()).is_some() {
                    changes.connections = true;
                    changes.properties = true;
                }
            }

            // ── Subscriptions ────────────────────────────────────────
            PortEvent::SubscriptionChanged {
                target,
                property_id,
                state,
            } => {
                let record = self.record_mut(*target)?;
                let current = record.subscription_state(property_id);
                let transition = current.transition_to(*state);
                set_subscription(record, *target, property_id, current, *state, transition)
                    .map(|outcome| changes.nested(outcome))?;
            }

            PortEvent::SubscriptionCancelled {
                target,
                property_id,
            } => {
                let record = self.record_mut(*target)?;
                let current = record.subscription_state(property_id);
                let next = SubscriptionState::Unsubscribed;
                set_subscription(record, *target, property_id, current, next, current.cancel())
                    .map(|outcome| changes.nested(outcome))?;
            }

            // ── Local properties ─────────────────────────────────────
            PortEvent::LocalPropertyDefined {
                previous_id,
                metadata,
            } => self.apply_local_definition(previous_id.as_deref(), metadata, &mut changes)?,

            PortEvent::LocalPropertyValueChanged {
                property_id,
                media_type,
                body,
            } => {
                let existing = self.local.get(property_id.as_str()).ok_or_else(|| {
                    CoreError::reconciliation(format!(
                        "value change for unknown local property '{property_id}'"
                    ))
                })?;
                let property = LocalProperty {
                    metadata: existing.metadata.clone(),
                    value: Some(PropertyValue::new(
                        property_id.clone(),
                        media_type.clone(),
                        body.clone(),
                    )),
                };
                changes.local_properties = self.local.upsert(property_id.clone(), property).changed();
            }

            PortEvent::LocalPropertyRemoved { property_id } => {
                changes.local_properties = self.local.remove(property_id.as_str()).is_some();
            }

            // ── Transport log ────────────────────────────────────────
            PortEvent::LogAppended(entry) => {
                changes.log = self.logs.push(entry.clone());
            }
        }

        Ok(changes)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn record_mut(&mut self, target: Muid) -> Result<&mut ConnectionRecord, CoreError> {
        self.connections
            .get_mut(&target)
            .ok_or_else(|| CoreError::unknown_target(target))
    }

    /// Upsert the connection and merge nested lists by key. Entries missing
    /// from the payload are kept.
    fn apply_discovery(
        &mut self,
        result: &DiscoveryResult,
        changes: &mut ChangeSet,
    ) -> Result<(), CoreError> {
        for profile in &result.profiles {
            check_profile(result.target, profile)?;
        }

        let connection = Connection {
            target_muid: result.target,
            product_instance_id: result.product_instance_id.clone(),
            max_simultaneous_property_requests: result.max_simultaneous_property_requests,
            device_info: result.device_info.clone(),
        };

        let record = match self.connections.entry(result.target) {
            Entry::Occupied(entry) => {
                let record = entry.into_mut();
                if *record.connection != connection {
                    record.connection = Arc::new(connection);
                    changes.connections = true;
                }
                record
            }
            Entry::Vacant(entry) => {
                debug!(target = %result.target, "new connection discovered");
                changes.connections = true;
                entry.insert(ConnectionRecord::new(connection))
            }
        };

        for profile in &result.profiles {
            changes.profile(record.profiles.upsert(profile.key(), profile.clone()));
        }
        for property in &result.properties {
            changes.property(record.properties.upsert(property.id.clone(), property.clone()));
        }
        for metadata in &result.metadata {
            changes.nested(record.metadata.upsert(metadata.resource.clone(), metadata.clone()));
        }
        Ok(())
    }

    fn apply_local_definition(
        &mut self,
        previous_id: Option<&str>,
        metadata: &PropertyMetadata,
        changes: &mut ChangeSet,
    ) -> Result<(), CoreError> {
        if metadata.resource.is_empty() {
            return Err(CoreError::reconciliation(
                "local property definition without a resource id",
            ));
        }
        let id = metadata.resource.clone();

        let renamed_from =
            previous_id.filter(|previous| *previous != id && self.local.contains(*previous));

        if let Some(previous) = renamed_from {
            let value = self
                .local
                .get(previous)
                .and_then(|p| p.value.clone())
                .map(|value| PropertyValue { id: id.clone(), ..value });
            let property = LocalProperty {
                metadata: metadata.clone(),
                value,
            };
            changes.local_properties = self.local.rename(previous, id, property);
            return Ok(());
        }

        let value = self.local.get(id.as_str()).and_then(|p| p.value.clone());
        let property = LocalProperty {
            metadata: metadata.clone(),
            value,
        };
        changes.local_properties = self.local.upsert(id, property).changed();
        Ok(())
    }
}

/// New value for a property update, merging partial bodies into the
/// current one.
fn check_profile(target: Muid, profile: &ProfileState) -> Result<(), CoreError> {
    if profile.num_channels_requested > MAX_PROFILE_CHANNELS {
        return Err(CoreError::reconciliation(format!(
            "profile {} on {target} requests {} channels, at most {MAX_PROFILE_CHANNELS} allowed",
            profile.profile_id, profile.num_channels_requested
        )));
    }
    Ok(())
}

fn merged_value(record: &ConnectionRecord, update: &PropertyUpdate) -> Result<PropertyValue, CoreError> {
    let Some(partial) = update.partial else {
        return Ok(PropertyValue::new(
            update.property_id.clone(),
            update.media_type.clone(),
            update.body.clone(),
        ));
    };

    let current = record
        .properties
        .get(update.property_id.as_str())
        .ok_or_else(|| {
            CoreError::reconciliation(format!(
                "partial update for '{}' on {} without a current value",
                update.property_id, update.target
            ))
        })?;

    let body = partial::merge(current, partial, &update.body)?;
    Ok(PropertyValue {
        id: current.id.clone(),
        media_type: current.media_type.clone(),
        body,
    })
}

fn set_subscription(
    record: &mut ConnectionRecord,
    target: Muid,
    property_id: &str,
    current: SubscriptionState,
    next: SubscriptionState,
    transition: Transition,
) -> Result<Upsert, CoreError> {
    match transition {
        Transition::Noop => Ok(Upsert::Unchanged),
        Transition::Apply => {
            debug!(target = %target, property_id, from = %current, to = %next, "subscription state changed");
            Ok(record.subscriptions.upsert(
                property_id.to_owned(),
                Subscription {
                    property_id: property_id.to_owned(),
                    state: next,
                },
            ))
        }
        Transition::Illegal => Err(CoreError::IllegalTransition {
            target,
            property_id: property_id.to_owned(),
            from: current,
            to: next,
        }),
    }
}
