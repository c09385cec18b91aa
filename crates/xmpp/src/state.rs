use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {anyhow::Result, tokio::task::JoinHandle, tokio_util::sync::CancellationToken};

use crate::outbound::Outbound;

/// Handle to a running client session.
///
/// `tokio_xmpp::Client` is not `Clone`, so the event loop task owns it and
/// everything else talks to it through the [`Outbound`] channel.
pub struct ClientHandle {
    pub(crate) outbound: Outbound,
    pub(crate) cancel: CancellationToken,
    /// Whether the XMPP client is currently connected.
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) task: JoinHandle<()>,
}

impl ClientHandle {
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Send a chat message to `to`.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        self.outbound.send_text(to, text).await
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Resolves once the session is over, whether through
    /// [`shutdown`](Self::shutdown) or because the stream closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Go offline and wait for the event loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("xmpp event loop task failed: {e}"))
    }
}
