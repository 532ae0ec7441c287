//! Subscription status state machine.
//!
//! Mirrors the billing provider's subscription status, collapsed to four
//! buckets. Transitions are validated so an out-of-order webhook delivery
//! cannot regress a more advanced state (e.g. a late `trialing` update
//! arriving after the subscription went active).

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Current state of a user's subscription in the payment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is paid and current.
    Active,

    /// Subscription is in its trial period.
    Trialing,

    /// Payment failed; the provider is retrying the charge.
    PastDue,

    /// Subscription has ended, or the user cancelled in-app.
    Canceled,
}

impl SubscriptionStatus {
    /// Map a provider-reported status string to a local status.
    ///
    /// Any status the provider reports that we do not track (`unpaid`,
    /// `incomplete`, `paused`, future additions) collapses to `Canceled`.
    pub fn from_provider(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            _ => SubscriptionStatus::Canceled,
        }
    }

    /// The wire representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Returns true if this status grants access to paid features.
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::Trialing | SubscriptionStatus::PastDue
        )
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From TRIALING
            (Trialing, Trialing)
                | (Trialing, Active)
                | (Trialing, PastDue)
                | (Trialing, Canceled)
            // From ACTIVE (renewal keeps it active; no way back to trial)
                | (Active, Active)
                | (Active, PastDue)
                | (Active, Canceled)
            // From PAST_DUE
                | (PastDue, Active)
                | (PastDue, PastDue)
                | (PastDue, Canceled)
            // From CANCELED (terminal; a new checkout replaces the row)
                | (Canceled, Canceled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Trialing => vec![Trialing, Active, PastDue, Canceled],
            Active => vec![Active, PastDue, Canceled],
            PastDue => vec![Active, PastDue, Canceled],
            Canceled => vec![Canceled],
        }
    }
}
