//! Live snapshot publishing.
//!
//! In-process pub/sub: the live engine publishes one [`StateUpdate`] per tick
//! and any number of [`SnapshotStream`]s receive it. A transport layer
//! (WebSocket, SSE) can sit on top of a stream.

/// Snapshot payload and subscription ids.
pub mod event;
/// Subscriber fan-out.
pub mod publisher;
/// Subscriber stream handle.
pub mod stream;

pub use event::{StateUpdate, SubscriptionId, STATE_UPDATE_EVENT};
pub use publisher::{Publisher, PublisherConfig};
pub use stream::SnapshotStream;
