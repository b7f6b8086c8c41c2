use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plan name the billing backend uses for trial-backed subscriptions.
pub const TRIAL_PLAN: &str = "trial";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Canceled,
    PastDue,
    Unpaid,
    Incomplete,
    #[serde(other)]
    Other,
}

impl SubscriptionStatus {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub status: SubscriptionStatus,
    pub plan: String,
    #[serde(default)]
    pub current_period_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn is_trial_plan(&self) -> bool {
        self.plan == TRIAL_PLAN
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialWindow {
    pub is_active: bool,
    pub remaining_days: u32,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

/// State of a value fetched from the backend.
///
/// `Loading` means a request is in flight; `Missing` means the backend
/// answered (or was never asked) and there is no value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Fetched<T> {
    Loading,
    Missing,
    Present(T),
}

impl<T> Fetched<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Loading | Self::Missing => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl<T> Default for Fetched<T> {
    fn default() -> Self {
        Self::Loading
    }
}

impl<T> From<Option<T>> for Fetched<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Self::Present)
    }
}

/// Payload of the subscription lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(default)]
    pub trial: Option<TrialWindow>,
}
