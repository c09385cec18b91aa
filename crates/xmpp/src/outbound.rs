//! Outbound message sender.
//!
//! Sends stanzas to the event loop through its `mpsc` channel; the loop owns
//! the `tokio_xmpp::Client`.

use {anyhow::Result, tokio::sync::mpsc};

use crate::{minidom::Element, stanza};

/// Maximum bytes per `<body>`. XMPP has no hard limit, but very long
/// messages are unwieldy.
pub const TEXT_CHUNK_LIMIT: usize = 4000;

/// Cloneable handle for queuing stanzas on a running session.
#[derive(Clone)]
pub struct Outbound {
    from: String,
    stanza_tx: mpsc::Sender<Element>,
}

impl Outbound {
    pub(crate) fn new(from: String, stanza_tx: mpsc::Sender<Element>) -> Self {
        Self { from, stanza_tx }
    }

    /// Send `text` to `to` as one or more `chat` messages.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        for chunk in stanza::chunk_text(text, TEXT_CHUNK_LIMIT) {
            let el = stanza::build_message(&self.from, to, "chat", &chunk);
            self.send_stanza(el).await?;
        }
        Ok(())
    }

    /// Queue a raw stanza.
    pub async fn send_stanza(&self, element: Element) -> Result<()> {
        self.stanza_tx
            .send(element)
            .await
            .map_err(|_| anyhow::anyhow!("xmpp event loop closed"))
    }
}
