//! Inbound stanza dispatch.

use tracing::{debug, trace, warn};

use crate::{
    events::{InboundMessage, MessageKind, XmppEventHandler},
    minidom::Element,
    roster::{self, ROSTER_QUERY_ID},
    stanza::{self, ns},
};

/// Error condition for `get`/`set` requests with no handler here.
const SERVICE_UNAVAILABLE: &str = "service-unavailable";

/// Route one inbound stanza to `handler`.
///
/// `own_jid` is the account's bare JID, used to authenticate roster pushes.
/// Returns a stanza that must be sent back to the server, if any.
pub async fn handle_stanza(
    own_jid: &str,
    element: Element,
    handler: &dyn XmppEventHandler,
) -> Option<Element> {
    match element.name() {
        "message" => {
            handle_message(&element, handler).await;
            None
        },
        "iq" => handle_iq(own_jid, &element, handler).await,
        "presence" => {
            trace!(from = element.attr("from"), kind = element.attr("type"), "presence");
            None
        },
        other => {
            debug!(name = other, "ignoring unknown stanza");
            None
        },
    }
}

async fn handle_message(element: &Element, handler: &dyn XmppEventHandler) {
    let from = element.attr("from").unwrap_or_default();

    let Some(kind) = MessageKind::from_attr(element.attr("type")) else {
        if element.attr("type") == Some("error") {
            warn!(from, id = element.attr("id"), "message bounced with error");
        } else {
            debug!(from, kind = element.attr("type"), "ignoring message of unknown type");
        }
        return;
    };

    let body = element
        .get_child("body", ns::JABBER_CLIENT)
        .map(|b| b.text())
        .unwrap_or_default();
    if body.is_empty() {
        // Chat states, receipts and the like.
        trace!(from, "message without body");
        return;
    }

    let message = InboundMessage {
        from: from.to_string(),
        kind,
        body,
        id: element.attr("id").map(str::to_string),
    };
    debug!(from, kind = kind.as_str(), "inbound message");
    handler.on_message(&message).await;
}

async fn handle_iq(
    own_jid: &str,
    element: &Element,
    handler: &dyn XmppEventHandler,
) -> Option<Element> {
    let id = element.attr("id").unwrap_or_default();
    match element.attr("type") {
        Some("result") if id == ROSTER_QUERY_ID => {
            match roster::parse_roster(element) {
                Some(items) => {
                    debug!(count = items.len(), "roster received");
                    handler.on_roster(&items).await;
                },
                None => debug!("roster reply without query"),
            }
            None
        },
        Some("set") if element.has_child("query", ns::ROSTER) => {
            let items = roster::parse_roster(element)?;
            let from = element.attr("from");
            if !is_from_own_account(from, own_jid) {
                warn!(from, "ignoring roster push from foreign entity");
                return None;
            }
            debug!(count = items.len(), "roster push");
            handler.on_roster(&items).await;
            Some(stanza::build_iq_result(from, id))
        },
        Some(kind @ ("get" | "set")) => {
            let from = element.attr("from");
            let payload = element.children().next().map(|c| c.name());
            debug!(id, kind, from, payload, "unsupported iq request");
            Some(stanza::build_iq_error(from, id, SERVICE_UNAVAILABLE))
        },
        Some("error") => {
            warn!(id, from = element.attr("from"), "iq error");
            None
        },
        kind => {
            trace!(id, kind, "ignoring iq");
            None
        },
    }
}

/// Roster pushes are only valid without `from` or from our own bare JID.
fn is_from_own_account(from: Option<&str>, own_jid: &str) -> bool {
    match from {
        None => true,
        Some(from) => {
            let bare = from.split('/').next().unwrap_or(from);
            bare.eq_ignore_ascii_case(own_jid)
        },
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{events::ConnectionState, roster::RosterItem, stanza::ncname},
        async_trait::async_trait,
        std::sync::Mutex,
    };

    const OWN: &str = "me@example.com";

    #[derive(Default)]
    struct Recorder {
        rosters: Mutex<Vec<Vec<RosterItem>>>,
        messages: Mutex<Vec<InboundMessage>>,
    }

    #[async_trait]
    impl XmppEventHandler for Recorder {
        async fn on_connection(&self, _state: &ConnectionState) {}

        async fn on_roster(&self, items: &[RosterItem]) {
            self.rosters.lock().unwrap().push(items.to_vec());
        }

        async fn on_message(&self, message: &InboundMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }
    }

    fn roster_iq(kind: &str, id: &str, from: Option<&str>) -> Element {
        let mut builder = Element::builder("iq", ns::JABBER_CLIENT)
            .attr(ncname("id"), id)
            .attr(ncname("type"), kind);
        if let Some(from) = from {
            builder = builder.attr(ncname("from"), from);
        }
        builder
            .append(
                Element::builder("query", ns::ROSTER)
                    .append(
                        Element::builder("item", ns::ROSTER)
                            .attr(ncname("jid"), "bob@example.com")
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn chat_message_reaches_handler() {
        let handler = Recorder::default();
        let el = stanza::build_message("bob@example.com/phone", OWN, "chat", "hi there");

        let reply = handle_stanza(OWN, el, &handler).await;
        assert!(reply.is_none());

        let messages = handler.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, "bob@example.com/phone");
        assert_eq!(messages[0].kind, MessageKind::Chat);
        assert_eq!(messages[0].body, "hi there");
    }

    #[tokio::test]
    async fn message_without_type_is_normal() {
        let handler = Recorder::default();
        let el = Element::builder("message", ns::JABBER_CLIENT)
            .attr(ncname("from"), "bob@example.com")
            .append(
                Element::builder("body", ns::JABBER_CLIENT)
                    .append("plain")
                    .build(),
            )
            .build();

        handle_stanza(OWN, el, &handler).await;
        assert_eq!(handler.messages.lock().unwrap()[0].kind, MessageKind::Normal);
    }

    #[tokio::test]
    async fn bodyless_and_error_messages_are_dropped() {
        let handler = Recorder::default();
        let typing = Element::builder("message", ns::JABBER_CLIENT)
            .attr(ncname("from"), "bob@example.com")
            .attr(ncname("type"), "chat")
            .build();
        let bounced = stanza::build_message("bob@example.com", OWN, "error", "oops");

        handle_stanza(OWN, typing, &handler).await;
        handle_stanza(OWN, bounced, &handler).await;
        assert!(handler.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn roster_result_reaches_handler() {
        let handler = Recorder::default();
        let reply = handle_stanza(OWN, roster_iq("result", ROSTER_QUERY_ID, None), &handler).await;
        assert!(reply.is_none());

        let rosters = handler.rosters.lock().unwrap();
        assert_eq!(rosters.len(), 1);
        assert_eq!(rosters[0][0].jid, "bob@example.com");
    }

    #[tokio::test]
    async fn unrelated_result_is_ignored() {
        let handler = Recorder::default();
        handle_stanza(OWN, roster_iq("result", "other-id", None), &handler).await;
        assert!(handler.rosters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn roster_push_is_acknowledged() {
        let handler = Recorder::default();
        let push = roster_iq("set", "push-1", Some("me@example.com"));

        let reply = handle_stanza(OWN, push, &handler).await.unwrap();
        assert_eq!(reply.name(), "iq");
        assert_eq!(reply.attr("type"), Some("result"));
        assert_eq!(reply.attr("id"), Some("push-1"));
        assert_eq!(handler.rosters.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn roster_push_from_stranger_is_ignored() {
        let handler = Recorder::default();
        let push = roster_iq("set", "push-2", Some("mallory@evil.example/x"));

        assert!(handle_stanza(OWN, push, &handler).await.is_none());
        assert!(handler.rosters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_requests_get_service_unavailable() {
        let handler = Recorder::default();
        let ping = Element::builder("iq", ns::JABBER_CLIENT)
            .attr(ncname("from"), "example.com")
            .attr(ncname("id"), "ping-1")
            .attr(ncname("type"), "get")
            .append(Element::builder("ping", "urn:xmpp:ping").build())
            .build();
        let bare_set = Element::builder("iq", ns::JABBER_CLIENT)
            .attr(ncname("id"), "set-1")
            .attr(ncname("type"), "set")
            .build();

        for (request, id) in [(ping, "ping-1"), (bare_set, "set-1")] {
            let reply = handle_stanza(OWN, request, &handler).await.unwrap();
            assert_eq!(reply.attr("type"), Some("error"));
            assert_eq!(reply.attr("id"), Some(id));
            let error = reply.get_child("error", ns::JABBER_CLIENT).unwrap();
            assert!(error.has_child("service-unavailable", ns::STANZAS));
        }
        assert!(handler.rosters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn roster_get_is_not_a_push() {
        let handler = Recorder::default();
        let reply = handle_stanza(OWN, roster_iq("get", "get-1", None), &handler)
            .await
            .unwrap();
        assert_eq!(reply.attr("type"), Some("error"));
        assert!(handler.rosters.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_and_errors_get_no_reply() {
        let handler = Recorder::default();
        let error = stanza::build_iq_error(None, "x", "item-not-found");
        assert!(handle_stanza(OWN, error, &handler).await.is_none());
        assert!(
            handle_stanza(OWN, stanza::build_iq_result(None, "y"), &handler)
                .await
                .is_none()
        );
    }

    #[test]
    fn own_account_check() {
        assert!(is_from_own_account(None, OWN));
        assert!(is_from_own_account(Some("me@example.com"), OWN));
        assert!(is_from_own_account(Some("Me@Example.com/acc"), OWN));
        assert!(!is_from_own_account(Some("you@example.com"), OWN));
    }
}
