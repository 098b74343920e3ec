//! Link object decoding.
//!
//! Only the fixed `ifinfomsg` header of a link message matters here: the
//! interface index and the `IFF_LOWER_UP` bit of its flags. Attributes
//! that follow the header are never inspected.

use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::message::{MessageIter, NlMsgHdr, NlMsgType};

/// Driver signals L1 up (carrier present).
pub const IFF_LOWER_UP: u32 = libc::IFF_LOWER_UP as u32;

/// Interface info message (struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    /// Address family (usually AF_UNSPEC).
    pub ifi_family: u8,
    /// Padding.
    pub __ifi_pad: u8,
    /// Device type (ARPHRD_*).
    pub ifi_type: u16,
    /// Interface index.
    pub ifi_index: i32,
    /// Device flags (IFF_*).
    pub ifi_flags: u32,
    /// Change mask.
    pub ifi_change: u32,
}

impl IfInfoMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a new interface info message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface index.
    pub fn with_index(mut self, index: i32) -> Self {
        self.ifi_index = index;
        self
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Check whether the lower layer (carrier) is up.
    pub fn is_lower_up(&self) -> bool {
        self.ifi_flags & IFF_LOWER_UP != 0
    }
}

/// One decoded link state observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStateFact {
    /// Kernel interface index.
    pub index: u32,
    /// Whether the interface's lower layer is up.
    pub is_up: bool,
}

impl LinkStateFact {
    /// Create a fact.
    pub fn new(index: u32, is_up: bool) -> Self {
        Self { index, is_up }
    }

    /// Decode a fact from one netlink message.
    ///
    /// Returns `None` for anything that is not a usable link object:
    /// other message types, a payload shorter than `ifinfomsg`, or an
    /// index the kernel never assigns (zero or negative).
    ///
    /// `RTM_DELLINK` always reads as down: the interface is gone whatever
    /// flags it carried at removal time.
    pub fn from_message(header: &NlMsgHdr, payload: &[u8]) -> Option<Self> {
        if !header.is_link() {
            return None;
        }

        let (info, _attrs) = IfInfoMsg::read_from_prefix(payload).ok()?;
        let index = u32::try_from(info.ifi_index).ok().filter(|&i| i != 0)?;
        let is_up = header.nlmsg_type == NlMsgType::RTM_NEWLINK && info.is_lower_up();

        Some(Self { index, is_up })
    }
}

/// Decoder from raw notification buffers to link state facts.
pub struct LinkEventParser;

impl LinkEventParser {
    /// Lazily decode every link object in `data`.
    ///
    /// Non-link messages and unusable link objects are skipped; the rest
    /// of the buffer is still processed. A link message cut off by the end
    /// of `data` is still decoded as long as its `ifinfomsg` is intact.
    pub fn parse(data: &[u8]) -> LinkFacts<'_> {
        LinkFacts {
            messages: MessageIter::new(data),
        }
    }
}

/// Iterator returned by [`LinkEventParser::parse`].
pub struct LinkFacts<'a> {
    messages: MessageIter<'a>,
}

impl Iterator for LinkFacts<'_> {
    type Item = LinkStateFact;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (header, payload) = match self.messages.next()? {
                Ok(msg) => msg,
                Err(e) => {
                    trace!(error = %e, "truncated notification batch");
                    return None;
                }
            };

            if let Some(clipped) = self.messages.clipped() {
                debug!(
                    nlmsg_type = header.nlmsg_type,
                    len = clipped.len,
                    remaining = clipped.remaining,
                    "message cut off at end of buffer, decoding header only"
                );
            }

            match LinkStateFact::from_message(&header, payload) {
                Some(fact) => return Some(fact),
                None => trace!(
                    nlmsg_type = header.nlmsg_type,
                    len = payload.len(),
                    "skipping non-link object"
                ),
            }
        }
    }
}
