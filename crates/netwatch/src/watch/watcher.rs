//! The link watcher.

use std::fmt;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use bytes::BytesMut;
use tracing::{debug, error, warn};

use super::alive::AliveSet;
use super::config::WatcherConfig;
use super::pending::PendingCloses;
use super::selector::Selector;
use super::sink::{LinkUp, OwnerId, UpSink};
use crate::netlink::{Error, LinkEventParser, LinkStateFact, NetlinkChannel, Result};

/// Lifecycle of a watcher's channel.
///
/// `Created -> Active -> Stopping -> Closed`. A channel is never closed
/// while it is selected, so `Active` always passes through `Stopping`.
/// `Leaked` replaces `Stopping` when the channel could not be parked for
/// deferred close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Channel open, not yet selected.
    Created,
    /// Selected; readiness callbacks are delivered.
    Active,
    /// Deselected, channel parked until the event loop confirms.
    Stopping,
    /// Channel closed.
    Closed,
    /// Deselected, but the descriptor was abandoned instead of parked. It
    /// stays open until the process exits.
    Leaked,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            WatcherState::Created => "created",
            WatcherState::Active => "active",
            WatcherState::Stopping => "stopping",
            WatcherState::Closed => "closed",
            WatcherState::Leaked => "leaked",
        };
        f.write_str(state)
    }
}

/// Applies link facts to an [`AliveSet`] and emits one event per
/// up-transition.
pub struct LinkTracker<S> {
    owner: OwnerId,
    alive: AliveSet,
    sink: S,
}

impl<S: UpSink> LinkTracker<S> {
    /// Create a tracker with no interface alive.
    pub fn new(owner: OwnerId, sink: S) -> Self {
        Self {
            owner,
            alive: AliveSet::new(),
            sink,
        }
    }

    /// Apply one fact. Returns `true` if it was a new up-transition.
    ///
    /// A sink that refuses the event is logged and otherwise ignored; the
    /// interface still counts as alive.
    pub fn apply(&mut self, fact: LinkStateFact) -> bool {
        if !fact.is_up {
            if self.alive.contains(fact.index) {
                debug!(owner = %self.owner, ifindex = fact.index, "link down");
            }
            self.alive.mark_dead_if_present(fact.index);
            return false;
        }

        if !self.alive.mark_alive_if_absent(fact.index) {
            return false;
        }

        debug!(owner = %self.owner, ifindex = fact.index, "link up");
        if let Err(e) = self.sink.emit(LinkUp::new(self.owner)) {
            warn!(owner = %self.owner, ifindex = fact.index, error = %e, "up-event not delivered");
        }
        true
    }

    /// Apply every fact in a raw notification buffer, in order.
    ///
    /// Returns the number of up-events emitted.
    pub fn process(&mut self, data: &[u8]) -> usize {
        let mut emitted = 0;
        for fact in LinkEventParser::parse(data) {
            if self.apply(fact) {
                emitted += 1;
            }
        }
        emitted
    }

    /// Owner tag stamped on every event.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Interfaces currently known to be up.
    pub fn alive(&self) -> &AliveSet {
        &self.alive
    }
}

/// Outcome of one [`Watcher::on_readable`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drain {
    /// Datagrams read.
    pub datagrams: usize,
    /// Up-events emitted.
    pub emitted: usize,
    /// Receive-queue overruns reported by the kernel (ENOBUFS).
    pub overruns: usize,
    /// Datagrams that did not fit the receive buffer.
    pub truncated: usize,
    /// The kernel queue was emptied. `false` means the drain limit was
    /// hit and the channel is still readable.
    pub exhausted: bool,
}

/// Watches link state on one notification channel.
///
/// Driven by an event loop through [`Selector`]: create it, activate it,
/// call [`on_readable`](Self::on_readable) on every readable event, and
/// [`stop`](Self::stop) it. All calls for one watcher must come from the
/// same task.
///
/// Dropping a watcher that is still active leaks its descriptor rather
/// than closing it under the event loop; always stop it.
pub struct Watcher<S> {
    channel: Option<NetlinkChannel>,
    fd: RawFd,
    state: WatcherState,
    tracker: LinkTracker<S>,
    buf: BytesMut,
    recv_buffer: usize,
    drain_limit: usize,
}

impl<S: UpSink> Watcher<S> {
    /// Open the notification channel.
    ///
    /// On failure nothing stays open and the error says which setup step
    /// failed.
    pub fn create(config: &WatcherConfig, sink: S) -> Result<Self> {
        let channel = NetlinkChannel::open(config.passcred)?;
        let fd = channel.as_raw_fd();
        debug!(owner = %config.owner, fd, pid = channel.pid(), "link channel open");

        Ok(Self {
            channel: Some(channel),
            fd,
            state: WatcherState::Created,
            tracker: LinkTracker::new(config.owner, sink),
            buf: BytesMut::with_capacity(config.recv_buffer),
            recv_buffer: config.recv_buffer,
            drain_limit: config.drain_limit,
        })
    }

    /// Register the channel with the event loop.
    ///
    /// If the event loop refuses, the channel is closed before the error
    /// is returned and the watcher ends up `Closed`.
    pub fn activate(&mut self, selector: &mut impl Selector) -> Result<()> {
        if self.state != WatcherState::Created {
            return Err(Error::InvalidState {
                expected: WatcherState::Created,
                actual: self.state,
            });
        }

        if let Err(e) = selector.select(self.fd) {
            self.channel = None;
            self.state = WatcherState::Closed;
            return Err(Error::Registration(e));
        }

        self.state = WatcherState::Active;
        debug!(owner = %self.owner(), fd = self.fd, "watcher active");
        Ok(())
    }

    /// Drain queued notifications without blocking.
    ///
    /// Reads until the kernel queue is empty or the drain limit is hit.
    /// Lost notifications (ENOBUFS) are logged; the next message for an
    /// interface carries its full state again.
    pub fn on_readable(&mut self) -> Result<Drain> {
        let channel = match (&self.channel, self.state) {
            (Some(channel), WatcherState::Active) => channel,
            _ => {
                return Err(Error::InvalidState {
                    expected: WatcherState::Active,
                    actual: self.state,
                });
            }
        };

        let mut drain = Drain::default();
        for _ in 0..self.drain_limit {
            self.buf.clear();
            self.buf.reserve(self.recv_buffer);

            match channel.recv(&mut self.buf) {
                Ok(len) => {
                    drain.datagrams += 1;
                    if len > self.buf.len() {
                        drain.truncated += 1;
                        warn!(
                            owner = %self.tracker.owner(),
                            fd = self.fd,
                            len,
                            received = self.buf.len(),
                            "link notification truncated"
                        );
                    }
                    drain.emitted += self.tracker.process(&self.buf);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    drain.exhausted = true;
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                    drain.overruns += 1;
                    warn!(
                        owner = %self.tracker.owner(),
                        fd = self.fd,
                        "receive queue overrun, link notifications lost"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(drain)
    }

    /// Stop watching.
    ///
    /// An active channel is parked in `registry` and then deselected; the
    /// event loop's confirmation closes it. Everything else the watcher
    /// owns is released here, so no event is emitted after this call.
    ///
    /// Returns the state the channel was left in. If the registry refuses
    /// the channel, the defect is logged, the descriptor is leaked and
    /// [`WatcherState::Leaked`] is returned.
    pub fn stop<const N: usize>(
        mut self,
        selector: &mut impl Selector,
        registry: &PendingCloses<NetlinkChannel, N>,
    ) -> WatcherState {
        let Some(channel) = self.channel.take() else {
            self.state = WatcherState::Closed;
            return self.state;
        };

        if self.state != WatcherState::Active {
            // Never selected, nothing can reference it
            drop(channel);
            self.state = WatcherState::Closed;
            debug!(owner = %self.owner(), fd = self.fd, "watcher closed");
            return self.state;
        }

        if let Err(rejected) = registry.register(self.fd, channel) {
            error!(
                owner = %self.owner(),
                fd = self.fd,
                error = %rejected.reason,
                "cannot park channel for deferred close, leaking descriptor"
            );
            std::mem::forget(rejected.handle);
            self.state = WatcherState::Leaked;
        } else {
            self.state = WatcherState::Stopping;
        }

        selector.deselect(self.fd);
        debug!(owner = %self.owner(), fd = self.fd, state = %self.state, "watcher stopping");
        self.state
    }
}

impl<S> Watcher<S> {
    /// Descriptor of the channel, valid until the watcher is closed.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Owner tag stamped on every event.
    pub fn owner(&self) -> OwnerId {
        self.tracker.owner
    }

    /// Interfaces currently known to be up.
    pub fn alive(&self) -> &AliveSet {
        &self.tracker.alive
    }
}

impl<S> AsRawFd for Watcher<S> {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl<S> Drop for Watcher<S> {
    fn drop(&mut self) {
        if self.state == WatcherState::Active
            && let Some(channel) = self.channel.take()
        {
            error!(fd = self.fd, "active watcher dropped without stop, leaking descriptor");
            std::mem::forget(channel);
        }
    }
}
