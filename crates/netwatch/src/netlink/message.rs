//! Netlink message header and buffer walking.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is a link object (RTM_NEWLINK / RTM_DELLINK).
    pub fn is_link(&self) -> bool {
        matches!(
            self.nlmsg_type,
            NlMsgType::RTM_NEWLINK | NlMsgType::RTM_DELLINK
        )
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }
}

/// Netlink message types this crate looks at.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;

    // Link messages
    pub const RTM_NEWLINK: u16 = 16;
    pub const RTM_DELLINK: u16 = 17;

    // Address messages
    pub const RTM_NEWADDR: u16 = 20;
}

/// A message header whose length field cannot be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid message length {len} with {remaining} bytes remaining")]
pub struct BadLength {
    /// Value of `nlmsg_len`.
    pub len: usize,
    /// Bytes left in the buffer at that point.
    pub remaining: usize,
}

/// Iterator over netlink messages in a buffer.
///
/// Yields each header with its payload. A header shorter than itself is
/// reported once and ends the walk, since the position of the following
/// message is unknown. A message running past the end of the buffer is
/// yielded with what is left of its payload and also ends the walk; see
/// [`clipped`](Self::clipped).
pub struct MessageIter<'a> {
    data: &'a [u8],
    clipped: Option<BadLength>,
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            clipped: None,
        }
    }

    /// Set once a message was yielded with a payload cut short by the end
    /// of the buffer.
    pub fn clipped(&self) -> Option<BadLength> {
        self.clipped
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(NlMsgHdr, &'a [u8]), BadLength>;

    fn next(&mut self) -> Option<Self::Item> {
        let (header, _) = NlMsgHdr::read_from_prefix(self.data).ok()?;

        let msg_len = header.nlmsg_len as usize;
        let bad = BadLength {
            len: msg_len,
            remaining: self.data.len(),
        };

        if msg_len < NLMSG_HDRLEN {
            self.data = &[];
            return Some(Err(bad));
        }

        if msg_len > self.data.len() {
            let payload = &self.data[NLMSG_HDRLEN..];
            self.data = &[];
            self.clipped = Some(bad);
            return Some(Ok((header, payload)));
        }

        let payload = &self.data[NLMSG_HDRLEN..msg_len];
        let aligned_len = nlmsg_align(msg_len);

        // Move to next message
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some(Ok((header, payload)))
    }
}
