//! Link watcher, its lifecycle and its drivers.
//!
//! A [`Watcher`] owns one notification channel and an [`AliveSet`]. The
//! event loop that drives it sits behind [`Selector`]; [`Monitor`] is the
//! bundled tokio implementation. Stopped channels wait in
//! [`PendingCloses`] until the event loop confirms they are deselected.

mod alive;
mod config;
mod monitor;
mod pending;
mod selector;
mod sink;
mod watcher;

pub use alive::AliveSet;
pub use config::{
    AUTO_OWNER_BASE, DEFAULT_DRAIN_LIMIT, DEFAULT_RECV_BUFFER, MIN_RECV_BUFFER, WatcherConfig,
};
pub use monitor::{Monitor, MonitorHandle};
pub use pending::{PENDING_CLOSE_CAPACITY, PendingCloses, Rejected, RegistryError};
pub use selector::Selector;
pub use sink::{LinkUp, OwnerId, SinkError, UpSink};
pub use watcher::{Drain, LinkTracker, Watcher, WatcherState};
