//! Track blocks: fixed segments with a speed limit and occupancy status.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::train::TrainId;

/// Speed limit assigned to a block unless configured otherwise (km/h).
pub const DEFAULT_SPEED_LIMIT: f64 = 100.0;

/// Block identifier (e.g. "BLK-SC-MJF").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wraps a block identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Occupancy status of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockStatus {
    #[default]
    Free,
    Occupied,
    Maintenance,
}

/// A fixed track segment `[start_km, end_km]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    /// Section label (e.g. "SC-MJF").
    pub section: String,
    pub start_km: f64,
    pub end_km: f64,
    pub status: BlockStatus,
    /// Train currently occupying the block, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_train_id: Option<TrainId>,
    /// Speed limit in km/h.
    #[serde(default = "default_speed_limit")]
    pub speed_limit: f64,
}

fn default_speed_limit() -> f64 {
    DEFAULT_SPEED_LIMIT
}

impl Block {
    /// Creates a validated block.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidBlockExtent` unless `start_km < end_km`.
    pub fn new(
        id: BlockId,
        section: impl Into<String>,
        start_km: f64,
        end_km: f64,
        speed_limit: f64,
    ) -> Result<Self, ValidationError> {
        if !(start_km < end_km) {
            return Err(ValidationError::InvalidBlockExtent {
                id: id.to_string(),
                start_km,
                end_km,
            });
        }
        if !speed_limit.is_finite() || speed_limit < 0.0 {
            return Err(ValidationError::InvalidSpeed { value: speed_limit });
        }
        Ok(Self {
            id,
            section: section.into(),
            start_km,
            end_km,
            status: BlockStatus::Free,
            active_train_id: None,
            speed_limit,
        })
    }

    pub(crate) fn free(id: BlockId, section: String, start_km: f64, end_km: f64) -> Self {
        Self {
            id,
            section,
            start_km,
            end_km,
            status: BlockStatus::Free,
            active_train_id: None,
            speed_limit: DEFAULT_SPEED_LIMIT,
        }
    }

    /// Whether `km` lies within the block (both ends inclusive).
    #[must_use]
    pub fn covers(&self, km: f64) -> bool {
        self.start_km <= km && km <= self.end_km
    }

    #[must_use]
    pub fn is_under_maintenance(&self) -> bool {
        self.status == BlockStatus::Maintenance
    }
}

/// First block (in the given order) covering `km`.
///
/// Adjacent blocks share their boundary, so the lower block wins when blocks
/// are ordered by start.
#[must_use]
pub fn block_at<'a, I>(blocks: I, km: f64) -> Option<&'a Block>
where
    I: IntoIterator<Item = &'a Block>,
{
    blocks.into_iter().find(|b| b.covers(km))
}
