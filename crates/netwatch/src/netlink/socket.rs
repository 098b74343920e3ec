//! Link notification channel.

use std::fmt;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};

use super::error::{Error, Result, SetupStep};

/// Multicast groups for NETLINK_ROUTE.
pub mod rtnetlink_groups {
    pub const RTNLGRP_LINK: u32 = 1;
}

/// Non-blocking NETLINK_ROUTE socket subscribed to link notifications.
///
/// The channel is receive-only after setup. Sequence numbers of inbound
/// messages are never checked: multicast notifications carry the kernel's
/// own numbering and may arrive in any order relative to an earlier
/// channel.
///
/// Dropping the channel closes the socket.
pub struct NetlinkChannel {
    socket: Socket,
    /// Local port ID (assigned by kernel).
    pid: u32,
}

impl NetlinkChannel {
    /// Open a channel and join `RTNLGRP_LINK`.
    ///
    /// When `passcred` is set, `SO_PASSCRED` is enabled so the kernel
    /// attaches sender credentials to each notification. On failure the
    /// partially configured socket is closed before returning.
    pub fn open(passcred: bool) -> Result<Self> {
        let mut socket =
            Socket::new(protocols::NETLINK_ROUTE).map_err(Error::setup(SetupStep::Open))?;

        if passcred {
            set_passcred(socket.as_raw_fd()).map_err(Error::setup(SetupStep::PassCred))?;
        }

        socket
            .set_non_blocking(true)
            .map_err(Error::setup(SetupStep::NonBlocking))?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr).map_err(Error::setup(SetupStep::Bind))?;
        socket
            .get_address(&mut addr)
            .map_err(Error::setup(SetupStep::Bind))?;
        let pid = addr.port_number();

        socket
            .add_membership(rtnetlink_groups::RTNLGRP_LINK)
            .map_err(Error::setup(SetupStep::JoinGroup))?;

        Ok(Self { socket, pid })
    }

    /// Get the local port ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Receive one datagram into `buf`, replacing its contents.
    ///
    /// The datagram is peeked first and `buf` grows to fit it, so large
    /// notifications arrive whole. Returns the datagram's real length; a
    /// value above `buf.len()` means it was still cut off.
    ///
    /// Returns `WouldBlock` when nothing is queued.
    pub fn recv(&self, buf: &mut BytesMut) -> io::Result<usize> {
        buf.clear();
        let len = self.socket.recv(buf, libc::MSG_PEEK | libc::MSG_TRUNC)?;

        buf.clear();
        buf.reserve(len);
        self.socket.recv(buf, libc::MSG_TRUNC)
    }
}

impl AsRawFd for NetlinkChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl fmt::Debug for NetlinkChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetlinkChannel")
            .field("fd", &self.as_raw_fd())
            .field("pid", &self.pid)
            .finish()
    }
}

fn set_passcred(fd: RawFd) -> io::Result<()> {
    let on: libc::c_int = 1;
    // SAFETY: fd is an open socket owned by the caller and `on` outlives
    // the call; the length matches the pointed-to c_int.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PASSCRED,
            &on as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
