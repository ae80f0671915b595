//! Optional event journal.
//!
//! The live engine can forward train status transitions, newly raised
//! conflicts and newly issued suggestions to an [`EventJournal`]. Journal
//! failures are logged by the caller and never interrupt a tick.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{AlertCategory, Severity};
use crate::block::BlockId;
use crate::error::JournalError;
use crate::suggestion::{Action, SuggestionId};
use crate::train::TrainId;

/// Kind of train status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainEventKind {
    Movement,
    Stop,
    Resume,
}

/// A single train movement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainEvent {
    pub train_no: TrainId,
    pub event_type: TrainEventKind,
    pub time: DateTime<Utc>,
    /// Block the train was in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockId>,
    pub speed: f64,
    /// Delay in minutes attached to the event.
    pub delay: f64,
}

/// A conflict as first observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictLog {
    pub conflict_type: AlertCategory,
    pub trains: Vec<TrainId>,
    /// Block of the first participant, or its km position when outside any block.
    pub location: String,
    pub time: DateTime<Utc>,
    pub severity: Severity,
}

/// A suggestion as first issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionLog {
    pub suggestion_id: SuggestionId,
    pub trains: Vec<TrainId>,
    pub action: Action,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Sink for corridor events.
pub trait EventJournal: Send + Sync {
    /// Record a train status transition.
    fn record_train_event(&self, event: TrainEvent) -> Result<(), JournalError>;

    /// Record a newly raised conflict.
    fn record_conflict(&self, conflict: ConflictLog) -> Result<(), JournalError>;

    /// Record a newly issued suggestion.
    fn record_suggestion(&self, suggestion: SuggestionLog) -> Result<(), JournalError>;

    /// Train events with `start <= time <= end`, oldest first.
    fn train_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TrainEvent>, JournalError>;
}

fn lock_err(context: &'static str) -> JournalError {
    JournalError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct JournalState {
    train_events: Vec<TrainEvent>,
    conflicts: Vec<ConflictLog>,
    suggestions: Vec<SuggestionLog>,
}

/// Thread-safe in-memory journal, for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    state: RwLock<JournalState>,
}

impl InMemoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded conflicts, oldest first.
    pub fn conflicts(&self) -> Result<Vec<ConflictLog>, JournalError> {
        let state = self.state.read().map_err(|_| lock_err("journal.read"))?;
        Ok(state.conflicts.clone())
    }

    /// All recorded suggestions, oldest first.
    pub fn suggestions(&self) -> Result<Vec<SuggestionLog>, JournalError> {
        let state = self.state.read().map_err(|_| lock_err("journal.read"))?;
        Ok(state.suggestions.clone())
    }

    /// All recorded train events, oldest first.
    pub fn train_events(&self) -> Result<Vec<TrainEvent>, JournalError> {
        let state = self.state.read().map_err(|_| lock_err("journal.read"))?;
        Ok(state.train_events.clone())
    }
}

impl EventJournal for InMemoryJournal {
    fn record_train_event(&self, event: TrainEvent) -> Result<(), JournalError> {
        let mut state = self.state.write().map_err(|_| lock_err("journal.write"))?;
        state.train_events.push(event);
        Ok(())
    }

    fn record_conflict(&self, conflict: ConflictLog) -> Result<(), JournalError> {
        let mut state = self.state.write().map_err(|_| lock_err("journal.write"))?;
        state.conflicts.push(conflict);
        Ok(())
    }

    fn record_suggestion(&self, suggestion: SuggestionLog) -> Result<(), JournalError> {
        let mut state = self.state.write().map_err(|_| lock_err("journal.write"))?;
        state.suggestions.push(suggestion);
        Ok(())
    }

    fn train_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TrainEvent>, JournalError> {
        let state = self.state.read().map_err(|_| lock_err("journal.read"))?;
        let mut events: Vec<TrainEvent> = state
            .train_events
            .iter()
            .filter(|e| start <= e.time && e.time <= end)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.time);
        Ok(events)
    }
}
