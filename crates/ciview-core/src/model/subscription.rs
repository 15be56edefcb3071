// ── Subscriptions ──
//
// One subscription per (connection, property id). The state machine is
// strict: only confirmed transitions move it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionState {
    Subscribing,
    Subscribed,
    Unsubscribed,
}

/// Outcome of checking a proposed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state moves.
    Apply,
    /// Already in the requested state.
    Noop,
    /// Not a legal edge.
    Illegal,
}

impl SubscriptionState {
    /// Check `self -> next` for a regular state report.
    ///
    /// `Subscribing -> Unsubscribed` is deliberately absent here; only an
    /// explicit cancellation may take that edge (see [`Self::cancel`]).
    pub fn transition_to(self, next: Self) -> Transition {
        use SubscriptionState::{Subscribed, Subscribing, Unsubscribed};

        if self == next {
            return Transition::Noop;
        }
        match (self, next) {
            (Subscribing, Subscribed) | (Subscribed, Unsubscribed) | (Unsubscribed, Subscribing) => {
                Transition::Apply
            }
            _ => Transition::Illegal,
        }
    }

    /// Check an explicit cancellation, which always targets `Unsubscribed`.
    pub fn cancel(self) -> Transition {
        match self {
            Self::Subscribing | Self::Subscribed => Transition::Apply,
            Self::Unsubscribed => Transition::Noop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub property_id: String,
    pub state: SubscriptionState,
}

#[cfg(test)]
mod tests {
    use super::SubscriptionState::{Subscribed, Subscribing, Unsubscribed};
    use super::*;

    #[test]
    fn full_cycle_is_legal() {
        assert_eq!(Unsubscribed.transition_to(Subscribing), Transition::Apply);
        assert_eq!(Subscribing.transition_to(Subscribed), Transition::Apply);
        assert_eq!(Subscribed.transition_to(Unsubscribed), Transition::Apply);
    }

    #[test]
    fn skipping_the_handshake_is_illegal() {
        assert_eq!(Unsubscribed.transition_to(Subscribed), Transition::Illegal);
        assert_eq!(Subscribed.transition_to(Subscribing), Transition::Illegal);
    }

    #[test]
    fn pending_subscription_only_unwinds_through_cancel() {
        assert_eq!(Subscribing.transition_to(Unsubscribed), Transition::Illegal);
        assert_eq!(Subscribing.cancel(), Transition::Apply);
        assert_eq!(Unsubscribed.cancel(), Transition::Noop);
    }

    #[test]
    fn same_state_is_noop() {
        for state in [Subscribing, Subscribed, Unsubscribed] {
            assert_eq!(state.transition_to(state), Transition::Noop);
        }
    }
}
