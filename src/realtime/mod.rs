//! Realtime module - change notifications from the backend to the view-models
//!
//! - `feed`: per-table broadcast of change events
//! - `registry`: subscription handles and their forwarding tasks
//! - `channel`: websocket client for the hosted realtime endpoint
//! - `listener`: refetches a collection whenever its table changes

pub mod channel;
pub mod feed;
pub mod listener;
pub mod registry;

pub use channel::{RealtimeChannel, RealtimeSettings};
pub use feed::ChangeFeed;
pub use listener::LiveUpdateListener;
pub use registry::SubscriptionRegistry;

/// Buffered change events per table before a slow subscriber lags
pub const FEED_CHANNEL_CAPACITY: usize = 64;
