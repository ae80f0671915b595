use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{CorridorError, CorridorResult, ExecutionError};

use super::event::{StateUpdate, SubscriptionId};
use super::publisher::SubscriberTable;

/// A subscription stream of live snapshots.
///
/// Dropping this stream removes the subscription.
#[derive(Debug)]
pub struct SnapshotStream {
    subscription_id: SubscriptionId,
    rx: Receiver<Arc<StateUpdate>>,
    table: Weak<SubscriberTable>,
    unsubscribed: AtomicBool,
}

impl SnapshotStream {
    pub(crate) fn new(
        subscription_id: SubscriptionId,
        rx: Receiver<Arc<StateUpdate>>,
        table: Weak<SubscriberTable>,
    ) -> Self {
        Self {
            subscription_id,
            rx,
            table,
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Explicit unsubscription. Idempotent; buffered updates stay readable.
    pub fn unsubscribe(&self) {
        if self.unsubscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(table) = self.table.upgrade() {
            table.remove(self.subscription_id);
        }
    }

    /// Receive the next update (blocking).
    pub fn recv(&self) -> CorridorResult<Arc<StateUpdate>> {
        self.rx.recv().map_err(|_| disconnected())
    }

    /// Receive the next update with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> CorridorResult<Arc<StateUpdate>> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => CorridorError::Execution(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }),
            RecvTimeoutError::Disconnected => disconnected(),
        })
    }

    /// Next buffered update, if any.
    pub fn try_recv(&self) -> CorridorResult<Option<Arc<StateUpdate>>> {
        match self.rx.try_recv() {
            Ok(update) => Ok(Some(update)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(disconnected()),
        }
    }
}

fn disconnected() -> CorridorError {
    CorridorError::Execution(ExecutionError::Disconnected {
        path: "snapshot_stream".to_string(),
    })
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
