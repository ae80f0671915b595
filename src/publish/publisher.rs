//! Best-effort fan-out of live snapshots.
//!
//! Each subscriber owns a bounded channel. Publishing uses `try_send` so a
//! slow or vanished subscriber can never stall the tick loop: full buffers
//! drop the update and count it, disconnected subscribers are pruned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{poisoned, CorridorResult, ValidationError};

use super::event::{StateUpdate, SubscriptionId};
use super::stream::SnapshotStream;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Per-subscriber buffer capacity.
    pub stream_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { stream_capacity: 64 }
    }
}

impl PublisherConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stream_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "publisher.stream_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct SubscriberTable {
    senders: Mutex<HashMap<SubscriptionId, Sender<Arc<StateUpdate>>>>,
}

impl SubscriberTable {
    pub(crate) fn remove(&self, id: SubscriptionId) {
        if let Ok(mut senders) = self.senders.lock() {
            if senders.remove(&id).is_some() {
                debug!(subscription = ?id, "subscriber removed");
            }
        }
    }
}

/// Broadcasts [`StateUpdate`]s to every current subscriber.
#[derive(Debug)]
pub struct Publisher {
    cfg: PublisherConfig,
    table: Arc<SubscriberTable>,
    sequence: AtomicU64,
    dropped_events: AtomicU64,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(PublisherConfig::default())
    }
}

impl Publisher {
    #[must_use]
    pub fn new(cfg: PublisherConfig) -> Self {
        Self {
            cfg,
            table: Arc::new(SubscriberTable::default()),
            sequence: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Register a subscriber and obtain its stream.
    pub fn subscribe(&self) -> CorridorResult<SnapshotStream> {
        let id = SubscriptionId::new();
        let (tx, rx) = bounded(self.cfg.stream_capacity.max(1));
        self.table
            .senders
            .lock()
            .map_err(|_| poisoned("publisher.subscribers"))?
            .insert(id, tx);
        debug!(subscription = ?id, "subscriber added");
        Ok(SnapshotStream::new(id, rx, Arc::downgrade(&self.table)))
    }

    /// Stamp `update` with the next sequence number and offer it to every subscriber.
    pub fn publish(&self, mut update: StateUpdate) -> Arc<StateUpdate> {
        update.sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let update = Arc::new(update);

        let mut senders = match self.table.senders.lock() {
            Ok(senders) => senders,
            Err(_) => {
                warn!(sequence = update.sequence, "subscriber table poisoned, update not delivered");
                return update;
            }
        };

        senders.retain(|id, tx| match tx.try_send(Arc::clone(&update)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                warn!(subscription = ?id, sequence = update.sequence, "subscriber buffer full, update dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(subscription = ?id, "subscriber gone, pruning");
                false
            }
        });

        update
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.table.senders.lock().map_or(0, |s| s.len())
    }

    /// Updates dropped because a subscriber buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Sequence number of the last published update (0 before the first).
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::WeatherCondition;

    fn update(tick: u64) -> StateUpdate {
        StateUpdate::new(tick, Vec::new(), Vec::new(), Vec::new(), WeatherCondition::Clear)
    }

    #[test]
    fn broadcasts_to_all_subscribers() {
        let publisher = Publisher::default();
        let a = publisher.subscribe().unwrap();
        let b = publisher.subscribe().unwrap();
        publisher.publish(update(1));

        assert_eq!(a.try_recv().unwrap().unwrap().sequence, 1);
        assert_eq!(b.try_recv().unwrap().unwrap().tick, 1);
        assert_eq!(publisher.last_sequence(), 1);
    }

    #[test]
    fn full_buffer_drops_without_blocking() {
        let publisher = Publisher::new(PublisherConfig { stream_capacity: 1 });
        let stream = publisher.subscribe().unwrap();
        publisher.publish(update(1));
        publisher.publish(update(2));

        assert_eq!(publisher.dropped_events(), 1);
        assert_eq!(stream.try_recv().unwrap().unwrap().tick, 1);
        assert!(stream.try_recv().unwrap().is_none());
    }

    #[test]
    fn dropping_a_stream_unsubscribes() {
        let publisher = Publisher::default();
        let stream = publisher.subscribe().unwrap();
        assert_eq!(publisher.subscriber_count(), 1);
        drop(stream);
        assert_eq!(publisher.subscriber_count(), 0);
        publisher.publish(update(1));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let publisher = Publisher::default();
        let sent = publisher.publish(update(7));
        assert_eq!(sent.event, "state_update");
        assert!(sent.to_json().unwrap().contains("\"state_update\""));
    }

    #[test]
    fn config_rejects_zero_capacity() {
        assert!(PublisherConfig { stream_capacity: 0 }.validate().is_err());
    }
}
