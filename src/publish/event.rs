//! Snapshot events pushed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::Alert;
use crate::suggestion::Suggestion;
use crate::train::Train;
use crate::weather::WeatherCondition;

/// Event name carried by every live snapshot.
pub const STATE_UPDATE_EVENT: &str = "state_update";

/// Unique identifier for a subscription.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-tick payload broadcast by the live engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Always [`STATE_UPDATE_EVENT`].
    pub event: String,
    /// Monotonic publish counter, starting at 1.
    pub sequence: u64,
    /// Tick that produced this snapshot.
    pub tick: u64,
    pub trains: Vec<Train>,
    pub alerts: Vec<Alert>,
    pub suggestions: Vec<Suggestion>,
    pub weather: WeatherCondition,
    pub published_at: DateTime<Utc>,
}

impl StateUpdate {
    #[must_use]
    pub fn new(
        tick: u64,
        trains: Vec<Train>,
        alerts: Vec<Alert>,
        suggestions: Vec<Suggestion>,
        weather: WeatherCondition,
    ) -> Self {
        Self {
            event: STATE_UPDATE_EVENT.to_string(),
            sequence: 0,
            tick,
            trains,
            alerts,
            suggestions,
            weather,
            published_at: Utc::now(),
        }
    }

    /// JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
