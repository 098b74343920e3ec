//! Seam to the event loop that drives a watcher.

use std::io;
use std::os::unix::io::RawFd;

/// Readiness registration offered by an event loop.
///
/// The event loop calls [`Watcher::on_readable`](super::Watcher::on_readable)
/// whenever a selected descriptor becomes readable.
///
/// # Contract
///
/// After `deselect(fd)`, the implementation must call
/// [`PendingCloses::confirm_closed`](super::PendingCloses::confirm_closed)
/// for `fd` exactly once, and only when no further readiness callback for
/// `fd` can run. This may happen synchronously inside `deselect` or later
/// from another thread. Until then the descriptor stays open.
pub trait Selector {
    /// Start delivering readable events for `fd`.
    fn select(&mut self, fd: RawFd) -> io::Result<()>;

    /// Stop delivering events for `fd`.
    fn deselect(&mut self, fd: RawFd);
}
