//! Up-event type and its consumers.

use std::fmt;

use tokio::sync::mpsc;

/// Identity of the watcher an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

impl From<u64> for OwnerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// "This owner's set of live interfaces gained a member."
///
/// Carries nothing beyond the owner tag; consumers re-query interface
/// state themselves if they need details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkUp {
    pub owner: OwnerId,
}

impl LinkUp {
    /// Kind marker of this event.
    pub const KIND: &'static str = "ifup";

    pub fn new(owner: OwnerId) -> Self {
        Self { owner }
    }

    pub fn kind(&self) -> &'static str {
        Self::KIND
    }
}

impl fmt::Display for LinkUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.owner, Self::KIND)
    }
}

/// Why a sink did not take an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The consumer went away.
    #[error("sink closed")]
    Closed,
    /// The consumer is not keeping up.
    #[error("sink full")]
    Full,
}

/// Consumer of up-events.
///
/// `emit` is called from inside a readiness callback and must not block.
pub trait UpSink {
    fn emit(&mut self, event: LinkUp) -> Result<(), SinkError>;
}

impl UpSink for mpsc::UnboundedSender<LinkUp> {
    fn emit(&mut self, event: LinkUp) -> Result<(), SinkError> {
        self.send(event).map_err(|_| SinkError::Closed)
    }
}

impl UpSink for mpsc::Sender<LinkUp> {
    fn emit(&mut self, event: LinkUp) -> Result<(), SinkError> {
        self.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
