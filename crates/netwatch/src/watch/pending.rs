//! Deferred release of stopped channels.
//!
//! A stopped watcher's descriptor may still be referenced by a readiness
//! callback the event loop has in flight, so the channel cannot be closed
//! on `stop()`. It is parked here until the event loop confirms the
//! descriptor is fully deselected, and only then dropped.

use std::os::unix::io::RawFd;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::netlink::NetlinkChannel;

/// Maximum number of watchers that may be stopping at the same time.
///
/// Sized to the number of watchers a host creates concurrently. Running
/// out of slots is a host bug: the affected descriptor is leaked.
pub const PENDING_CLOSE_CAPACITY: usize = 3;

static GLOBAL: PendingCloses<NetlinkChannel> = PendingCloses::new();

/// Why a channel could not be parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Every slot is taken.
    #[error("pending-close registry full ({capacity} slots), cannot park fd {fd}")]
    Full {
        /// Descriptor that was refused.
        fd: RawFd,
        /// Registry capacity.
        capacity: usize,
    },
    /// The descriptor is already parked.
    #[error("fd {0} is already pending close")]
    Duplicate(RawFd),
}

/// A refused registration, handing the channel back to the caller.
#[derive(Debug)]
pub struct Rejected<H> {
    /// Why the slot was refused.
    pub reason: RegistryError,
    /// The channel, still open.
    pub handle: H,
}

struct Slot<H> {
    fd: RawFd,
    handle: H,
}

/// Fixed-capacity registry of channels awaiting close confirmation.
///
/// The lock is held only while a slot is looked up or changed; a released
/// channel is dropped after the lock is gone.
pub struct PendingCloses<H, const N: usize = PENDING_CLOSE_CAPACITY> {
    slots: Mutex<[Option<Slot<H>>; N]>,
}

impl PendingCloses<NetlinkChannel> {
    /// The process-wide registry used by watchers and the bundled driver.
    pub fn global() -> &'static Self {
        &GLOBAL
    }
}

impl<H, const N: usize> PendingCloses<H, N> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new([const { None }; N]),
        }
    }

    fn slots(&self) -> MutexGuard<'_, [Option<Slot<H>>; N]> {
        // Slots are plain data; a panic elsewhere cannot leave them torn.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `handle` under `fd` in the first free slot.
    pub fn register(&self, fd: RawFd, handle: H) -> Result<(), Rejected<H>> {
        let mut slots = self.slots();

        if slots.iter().flatten().any(|slot| slot.fd == fd) {
            return Err(Rejected {
                reason: RegistryError::Duplicate(fd),
                handle,
            });
        }

        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(free) => {
                *free = Some(Slot { fd, handle });
                Ok(())
            }
            None => Err(Rejected {
                reason: RegistryError::Full { fd, capacity: N },
                handle,
            }),
        }
    }

    /// Release the channel parked under `fd`.
    ///
    /// Returns `false` if nothing was parked under `fd`; repeated
    /// confirmations are tolerated.
    pub fn confirm_closed(&self, fd: RawFd) -> bool {
        let released = {
            let mut slots = self.slots();
            slots
                .iter_mut()
                .find(|slot| matches!(slot, Some(s) if s.fd == fd))
                .and_then(Option::take)
        };

        match released {
            Some(slot) => {
                drop(slot.handle);
                debug!(fd, "pending channel released");
                true
            }
            None => {
                debug!(fd, "close confirmation for unknown fd");
                false
            }
        }
    }

    /// Whether a channel is parked under `fd`.
    pub fn contains(&self, fd: RawFd) -> bool {
        self.slots().iter().flatten().any(|slot| slot.fd == fd)
    }

    /// Number of parked channels.
    pub fn len(&self) -> usize {
        self.slots().iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<H, const N: usize> Default for PendingCloses<H, N> {
    fn default() -> Self {
        Self::new()
    }
}
