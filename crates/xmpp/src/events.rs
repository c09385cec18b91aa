//! Events reported by the client session and the handler trait that
//! receives them.

use async_trait::async_trait;

use crate::roster::RosterItem;

/// Connection lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Stream negotiated and resource bound.
    Online { bound_jid: String, resumed: bool },
    /// Connection lost; the client reconnects on its own.
    Disconnected { reason: String },
    /// Session ended for good (shutdown or stream closed).
    Closed,
}

/// `type` attribute of a `<message>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    Normal,
    GroupChat,
    Headline,
}

impl MessageKind {
    /// Map a `type` attribute; a missing one means `normal`. `error` and
    /// unknown values give `None`.
    pub fn from_attr(value: Option<&str>) -> Option<Self> {
        match value.unwrap_or("normal") {
            "chat" => Some(Self::Chat),
            "normal" => Some(Self::Normal),
            "groupchat" => Some(Self::GroupChat),
            "headline" => Some(Self::Headline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Normal => "normal",
            Self::GroupChat => "groupchat",
            Self::Headline => "headline",
        }
    }
}

/// A message with a body, as received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    pub kind: MessageKind,
    pub body: String,
    pub id: Option<String>,
}

/// Callbacks invoked from the client's event loop task.
///
/// Handlers run inline on the event loop, so long work should be spawned.
#[async_trait]
pub trait XmppEventHandler: Send + Sync {
    async fn on_connection(&self, state: &ConnectionState);

    /// A full roster reply, or the items of a roster push.
    async fn on_roster(&self, items: &[RosterItem]);

    async fn on_message(&self, message: &InboundMessage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_from_attr() {
        assert_eq!(MessageKind::from_attr(Some("chat")), Some(MessageKind::Chat));
        assert_eq!(MessageKind::from_attr(None), Some(MessageKind::Normal));
        assert_eq!(
            MessageKind::from_attr(Some("groupchat")),
            Some(MessageKind::GroupChat)
        );
        assert_eq!(MessageKind::from_attr(Some("error")), None);
        assert_eq!(MessageKind::from_attr(Some("bogus")), None);
    }

    #[test]
    fn message_kind_round_trips_through_attr() {
        for kind in [
            MessageKind::Chat,
            MessageKind::Normal,
            MessageKind::GroupChat,
            MessageKind::Headline,
        ] {
            assert_eq!(MessageKind::from_attr(Some(kind.as_str())), Some(kind));
        }
    }
}
