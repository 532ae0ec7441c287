//! Subscription plan tiers.

use serde::{Deserialize, Serialize};

/// Plan a user is subscribed to.
///
/// `Free` is the implicit default for users with no billing relationship.
/// `Pro` is the single paid tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    /// Returns true for plans that require a billing subscription.
    pub fn is_paid(&self) -> bool {
        matches!(self, Plan::Pro)
    }

    /// Parse a plan from its wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            _ => None,
        }
    }

    /// The wire representation of this plan.
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}
