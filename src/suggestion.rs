//! Operator suggestions derived from alerts.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::AlertId;
use crate::train::TrainId;

/// Unique identifier for a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionId(Uuid);

impl SuggestionId {
    /// Creates a new random suggestion ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SuggestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operator action an advisor can recommend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    EmergencyStop,
    ApplyBrakes,
    ReduceSpeed,
    HoldAtSignal,
    RerouteToLoop,
    PriorityPass,
}

impl Action {
    /// Label shown to operators.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmergencyStop => "EMERGENCY STOP",
            Self::ApplyBrakes => "APPLY BRAKES",
            Self::ReduceSpeed => "REDUCE SPEED",
            Self::HoldAtSignal => "HOLD AT SIGNAL",
            Self::RerouteToLoop => "REROUTE TO LOOP",
            Self::PriorityPass => "PRIORITY PASS",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One candidate in a ranked action list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedAction {
    pub action: Action,
    /// Score in `[0, 1]`.
    pub score: f64,
}

/// Advisory recommendation for one train. Never applied automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub train_id: TrainId,
    pub action: Action,
    /// Rationale shown to the operator.
    pub reason: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_effect: Option<String>,
    /// Candidate actions ordered by descending score.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<RankedAction>,
    /// Alert this suggestion responds to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
}

impl Suggestion {
    /// Creates a suggestion; confidence is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(train_id: TrainId, action: Action, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: SuggestionId::new(),
            train_id,
            action,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            predicted_effect: None,
            candidates: Vec::new(),
            alert_id: None,
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.predicted_effect = Some(effect.into());
        self
    }

    /// Attaches candidates, sorted by descending score.
    #[must_use]
    pub fn with_candidates(mut self, mut candidates: Vec<RankedAction>) -> Self {
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        self.candidates = candidates;
        self
    }

    #[must_use]
    pub const fn for_alert(mut self, alert_id: AlertId) -> Self {
        self.alert_id = Some(alert_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        let s = Suggestion::new(TrainId::new("1"), Action::ReduceSpeed, "r", 1.7);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn candidates_sorted_descending() {
        let s = Suggestion::new(TrainId::new("1"), Action::ReduceSpeed, "r", 0.5).with_candidates(vec![
            RankedAction { action: Action::HoldAtSignal, score: 0.2 },
            RankedAction { action: Action::ReduceSpeed, score: 0.9 },
        ]);
        assert_eq!(s.candidates[0].action, Action::ReduceSpeed);
    }

    #[test]
    fn action_labels() {
        assert_eq!(Action::EmergencyStop.to_string(), "EMERGENCY STOP");
        assert_eq!(Action::RerouteToLoop.label(), "REROUTE TO LOOP");
    }
}
