//! Error types for the link watcher.

use std::fmt;
use std::io;

use crate::watch::WatcherState;

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Channel setup step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Allocating the NETLINK_ROUTE socket.
    Open,
    /// Enabling SO_PASSCRED.
    PassCred,
    /// Switching the socket to non-blocking mode.
    NonBlocking,
    /// Binding to obtain a port ID.
    Bind,
    /// Joining the RTNLGRP_LINK multicast group.
    JoinGroup,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            SetupStep::Open => "open socket",
            SetupStep::PassCred => "enable SO_PASSCRED",
            SetupStep::NonBlocking => "set non-blocking",
            SetupStep::Bind => "bind",
            SetupStep::JoinGroup => "join link group",
        };
        f.write_str(step)
    }
}

/// Errors that can occur while setting up or driving a watcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error while receiving notifications.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The notification channel could not be set up.
    #[error("channel setup failed ({step}): {source}")]
    Setup {
        /// The step that failed.
        step: SetupStep,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The event loop refused to register the channel for readiness.
    #[error("readiness registration failed: {0}")]
    Registration(#[source] io::Error),

    /// Operation not valid in the watcher's current lifecycle state.
    #[error("invalid watcher state: expected {expected}, got {actual}")]
    InvalidState {
        /// State the operation requires.
        expected: WatcherState,
        /// State the watcher was in.
        actual: WatcherState,
    },

    /// The driver task panicked or was cancelled.
    #[error("driver task failed: {0}")]
    Driver(#[from] tokio::task::JoinError),
}

impl Error {
    /// Build a mapper that tags an I/O error with the setup step it came from.
    pub(crate) fn setup(step: SetupStep) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Setup { step, source }
    }

    /// Get the errno value if this error carries an OS error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Io(e) | Self::Setup { source: e, .. } | Self::Registration(e) => {
                e.raw_os_error()
            }
            _ => None,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Check if the kernel does not offer NETLINK_ROUTE here
    /// (EAFNOSUPPORT, EPROTONOSUPPORT).
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.errno(),
            Some(libc::EAFNOSUPPORT | libc::EPROTONOSUPPORT)
        )
    }
}
