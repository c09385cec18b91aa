//! XMPP client session for acc.
//!
//! Wraps `tokio-xmpp` for one account: logs in, requests the roster, and
//! reports connection changes, roster replies and chat messages to an
//! [`XmppEventHandler`].

pub mod client;
pub mod events;
pub mod handlers;
pub mod outbound;
pub mod roster;
pub mod stanza;
pub mod state;

/// Re-export tokio-xmpp's minidom to avoid version conflicts.
/// All modules in this crate should use `crate::minidom` instead of
/// importing minidom directly.
pub use tokio_xmpp::minidom;

pub use {
    client::start,
    events::{ConnectionState, InboundMessage, MessageKind, XmppEventHandler},
    outbound::Outbound,
    roster::RosterItem,
    state::ClientHandle,
};
