//! Stanza building helpers for messages, presence, and IQ.

use crate::minidom::{Element, rxml::NcName};

/// XMPP namespace constants.
pub mod ns {
    pub const JABBER_CLIENT: &str = "jabber:client";
    pub const ROSTER: &str = "jabber:iq:roster";
    pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
}

/// Convert a static string to an `NcName` for use with minidom's attribute API.
///
/// Panics if the string is not a valid NCName (only used with known-good names).
pub(crate) fn ncname(s: &str) -> NcName {
    NcName::try_from(s).unwrap_or_else(|_| panic!("invalid NCName: {s}"))
}

/// Build a `<message>` stanza.
///
/// `msg_type` is `"chat"` for 1:1 conversations.
pub fn build_message(from: &str, to: &str, msg_type: &str, body: &str) -> Element {
    Element::builder("message", ns::JABBER_CLIENT)
        .attr(ncname("from"), from)
        .attr(ncname("to"), to)
        .attr(ncname("type"), msg_type)
        .append(
            Element::builder("body", ns::JABBER_CLIENT)
                .append(body)
                .build(),
        )
        .build()
}

/// Build a `<presence>` stanza (initial presence or directed).
pub fn build_presence(from: &str, to: Option<&str>) -> Element {
    let mut builder = Element::builder("presence", ns::JABBER_CLIENT).attr(ncname("from"), from);
    if let Some(to) = to {
        builder = builder.attr(ncname("to"), to);
    }
    builder.build()
}

/// Build a `<presence type="unavailable">` stanza.
pub fn build_unavailable(from: &str, to: Option<&str>) -> Element {
    let mut builder = Element::builder("presence", ns::JABBER_CLIENT)
        .attr(ncname("from"), from)
        .attr(ncname("type"), "unavailable");
    if let Some(to) = to {
        builder = builder.attr(ncname("to"), to);
    }
    builder.build()
}

/// Build an empty `<iq type="result">` acknowledging request `id`.
pub fn build_iq_result(to: Option<&str>, id: &str) -> Element {
    let mut builder = Element::builder("iq", ns::JABBER_CLIENT)
        .attr(ncname("id"), id)
        .attr(ncname("type"), "result");
    if let Some(to) = to {
        builder = builder.attr(ncname("to"), to);
    }
    builder.build()
}

/// Build an `<iq type="error">` answering request `id` with a `cancel`-type
/// stanza error carrying `condition` (e.g. `service-unavailable`).
pub fn build_iq_error(to: Option<&str>, id: &str, condition: &str) -> Element {
    let mut builder = Element::builder("iq", ns::JABBER_CLIENT)
        .attr(ncname("id"), id)
        .attr(ncname("type"), "error");
    if let Some(to) = to {
        builder = builder.attr(ncname("to"), to);
    }
    builder
        .append(
            Element::builder("error", ns::JABBER_CLIENT)
                .attr(ncname("type"), "cancel")
                .append(Element::builder(condition, ns::STANZAS).build())
                .build(),
        )
        .build()
}

/// Chunk a text string into segments of at most `max_len` bytes, splitting
/// at newline boundaries when possible and never inside a character.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while limit > 0 && !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        if limit == 0 {
            limit = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

        // Prefer splitting at a newline within the limit.
        let split_at = remaining[..limit]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    chunks
}
