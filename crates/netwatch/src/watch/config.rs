//! Watcher configuration.

use std::sync::atomic::{AtomicU64, Ordering};

use super::sink::OwnerId;

/// First owner tag handed out to configs that do not set one.
///
/// Automatic tags live in the upper half of the range so they never meet
/// tags set through [`WatcherConfig::owner`] below it.
pub const AUTO_OWNER_BASE: u64 = 1 << 63;

static NEXT_OWNER: AtomicU64 = AtomicU64::new(AUTO_OWNER_BASE);

/// Smallest accepted receive buffer.
pub const MIN_RECV_BUFFER: usize = 4096;

/// Default receive buffer per datagram. The buffer grows when a larger
/// notification is queued.
pub const DEFAULT_RECV_BUFFER: usize = 32768;

/// Default number of datagrams read per readiness callback.
pub const DEFAULT_DRAIN_LIMIT: usize = 64;

/// Configuration for a [`Watcher`](super::Watcher).
///
/// # Example
///
/// ```ignore
/// use netwatch::WatcherConfig;
///
/// let config = WatcherConfig::new()
///     .owner(7u64)
///     .recv_buffer(64 * 1024)
///     .passcred(false);
/// ```
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub(crate) owner: OwnerId,
    pub(crate) recv_buffer: usize,
    pub(crate) drain_limit: usize,
    pub(crate) passcred: bool,
}

impl WatcherConfig {
    /// Create a config with a fresh owner tag and default settings.
    pub fn new() -> Self {
        Self {
            owner: OwnerId(NEXT_OWNER.fetch_add(1, Ordering::Relaxed)),
            recv_buffer: DEFAULT_RECV_BUFFER,
            drain_limit: DEFAULT_DRAIN_LIMIT,
            passcred: true,
        }
    }

    /// Set the owner tag carried by every emitted event.
    ///
    /// Tags at or above [`AUTO_OWNER_BASE`] are reserved for automatic
    /// assignment.
    pub fn owner(mut self, owner: impl Into<OwnerId>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Set the initial receive buffer size, at least [`MIN_RECV_BUFFER`].
    pub fn recv_buffer(mut self, bytes: usize) -> Self {
        self.recv_buffer = bytes.max(MIN_RECV_BUFFER);
        self
    }

    /// Set how many datagrams one readiness callback reads at most.
    ///
    /// The callback returns early once the limit is hit so a flood of
    /// notifications cannot hold the event loop.
    pub fn drain_limit(mut self, datagrams: usize) -> Self {
        self.drain_limit = datagrams.max(1);
        self
    }

    /// Enable or disable `SO_PASSCRED` on the channel.
    pub fn passcred(mut self, enabled: bool) -> Self {
        self.passcred = enabled;
        self
    }

    /// Owner tag this config stamps on events.
    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}
