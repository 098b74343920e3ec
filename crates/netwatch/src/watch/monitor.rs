//! Tokio driver for a [`Watcher`].
//!
//! Registers the watcher's channel with the tokio reactor through
//! [`AsyncFd`], runs it on a spawned task and forwards up-events to a
//! stream.
//!
//! # Example
//!
//! ```ignore
//! use netwatch::{Monitor, WatcherConfig};
//! use tokio_stream::StreamExt;
//!
//! let (handle, mut events) = Monitor::spawn(WatcherConfig::new())?;
//!
//! while let Some(event) = events.next().await {
//!     println!("{event}");
//! }
//!
//! handle.stop().await?;
//! ```

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use super::config::WatcherConfig;
use super::pending::PendingCloses;
use super::selector::Selector;
use super::sink::{LinkUp, OwnerId};
use super::watcher::{Watcher, WatcherState};
use crate::netlink::{Error, NetlinkChannel, Result};

/// Borrowed descriptor handed to the reactor; never closes it.
struct Descriptor(RawFd);

impl AsRawFd for Descriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// [`Selector`] backed by the tokio reactor.
///
/// Dropping the [`AsyncFd`] removes the descriptor from the reactor
/// synchronously, and readiness is only observed from the driver task
/// that calls `deselect`, so confirmation happens right away.
struct TokioSelector {
    registration: Option<AsyncFd<Descriptor>>,
    registry: &'static PendingCloses<NetlinkChannel>,
}

impl TokioSelector {
    fn new(registry: &'static PendingCloses<NetlinkChannel>) -> Self {
        Self {
            registration: None,
            registry,
        }
    }
}

impl Selector for TokioSelector {
    fn select(&mut self, fd: RawFd) -> io::Result<()> {
        let registration = AsyncFd::with_interest(Descriptor(fd), Interest::READABLE)?;
        self.registration = Some(registration);
        Ok(())
    }

    fn deselect(&mut self, fd: RawFd) {
        drop(self.registration.take());
        self.registry.confirm_closed(fd);
    }
}

/// Spawns watchers on the current tokio runtime.
pub struct Monitor;

impl Monitor {
    /// Create, activate and spawn a watcher.
    ///
    /// Setup and registration errors are returned here; nothing is spawned
    /// in that case. Must be called from within a tokio runtime.
    pub fn spawn(
        config: WatcherConfig,
    ) -> Result<(MonitorHandle, UnboundedReceiverStream<LinkUp>)> {
        Self::spawn_with_registry(config, PendingCloses::global())
    }

    /// Like [`spawn`](Self::spawn), parking stopped channels in `registry`.
    pub fn spawn_with_registry(
        config: WatcherConfig,
        registry: &'static PendingCloses<NetlinkChannel>,
    ) -> Result<(MonitorHandle, UnboundedReceiverStream<LinkUp>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = Watcher::create(&config, tx)?;
        let mut selector = TokioSelector::new(registry);
        watcher.activate(&mut selector)?;

        let owner = watcher.owner();
        let fd = watcher.fd();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(drive(watcher, selector, shutdown_rx));

        let handle = MonitorHandle {
            owner,
            fd,
            shutdown: Some(shutdown_tx),
            task,
        };
        Ok((handle, UnboundedReceiverStream::new(rx)))
    }
}

/// Handle to a spawned watcher.
///
/// Dropping the handle also stops the watcher, without waiting for it.
pub struct MonitorHandle {
    owner: OwnerId,
    fd: RawFd,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MonitorHandle {
    /// Owner tag stamped on this watcher's events.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Descriptor of the watched channel.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the watcher and wait until its channel is released.
    ///
    /// Returns the error that ended the driver early, if any.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone after an error
            let _ = shutdown.send(());
        }
        (&mut self.task).await?
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn drive(
    mut watcher: Watcher<mpsc::UnboundedSender<LinkUp>>,
    mut selector: TokioSelector,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<()> {
    let result = run(&mut watcher, &selector, &mut shutdown).await;
    if let Err(e) = &result {
        warn!(owner = %watcher.owner(), error = %e, "link watcher failed");
    }

    let registry = selector.registry;
    let state = watcher.stop(&mut selector, registry);
    debug!(state = %state, "link watcher task done");
    result
}

async fn run(
    watcher: &mut Watcher<mpsc::UnboundedSender<LinkUp>>,
    selector: &TokioSelector,
    shutdown: &mut oneshot::Receiver<()>,
) -> Result<()> {
    let registration = selector.registration.as_ref().ok_or(Error::InvalidState {
        expected: WatcherState::Active,
        actual: watcher.state(),
    })?;

    loop {
        tokio::select! {
            _ = &mut *shutdown => return Ok(()),
            ready = registration.readable() => {
                let mut guard = ready?;
                let drain = watcher.on_readable()?;
                if drain.exhausted {
                    guard.clear_ready();
                } else {
                    drop(guard);
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}
