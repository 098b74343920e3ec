//! Minimal rtnetlink plumbing for link notifications.
//!
//! Just enough of NETLINK_ROUTE to receive `RTNLGRP_LINK` multicast
//! messages and read the index and `IFF_LOWER_UP` bit of each link object.
//!
//! ```ignore
//! use netwatch::netlink::LinkEventParser;
//!
//! for fact in LinkEventParser::parse(&buf) {
//!     println!("ifindex {} up={}", fact.index, fact.is_up);
//! }
//! ```

mod error;
pub mod link;
pub mod message;
mod socket;

pub use error::{Error, Result, SetupStep};
pub use link::{IfInfoMsg, LinkEventParser, LinkFacts, LinkStateFact};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use socket::{NetlinkChannel, rtnetlink_groups};
