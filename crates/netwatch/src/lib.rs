//! Link state watcher for Linux.
//!
//! Subscribes to rtnetlink link notifications and reports one
//! [`LinkUp`] event each time an interface's lower layer (carrier) comes
//! up. Repeated notifications for an interface that is already up are
//! suppressed until the kernel reports it down again.
//!
//! # Example
//!
//! ```ignore
//! use netwatch::{Monitor, WatcherConfig};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> netwatch::Result<()> {
//!     let (handle, mut events) = Monitor::spawn(WatcherConfig::new().owner(1u64))?;
//!
//!     while let Some(event) = events.next().await {
//!         println!("{} {}", event.owner, event.kind());
//!     }
//!
//!     handle.stop().await
//! }
//! ```
//!
//! # Custom event loops
//!
//! ```ignore
//! use netwatch::{PendingCloses, Watcher, WatcherConfig};
//!
//! let mut watcher = Watcher::create(&WatcherConfig::new(), sink)?;
//! watcher.activate(&mut my_selector)?;
//!
//! // on every readable event for watcher.fd():
//! watcher.on_readable()?;
//!
//! // shutdown; my_selector confirms once the fd is deselected
//! watcher.stop(&mut my_selector, PendingCloses::global());
//! ```

pub mod netlink;
pub mod watch;

// Re-export common types at crate root for convenience
pub use netlink::{Error, LinkEventParser, LinkStateFact, Result};
pub use watch::{
    AliveSet, LinkUp, Monitor, MonitorHandle, OwnerId, PendingCloses, Selector, UpSink, Watcher,
    WatcherConfig, WatcherState,
};
