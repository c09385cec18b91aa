//! XMPP client event loop.
//!
//! Spawns a tokio task that owns the `tokio_xmpp::Client`, reads events
//! from it, and accepts outbound stanzas via an `mpsc` channel.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    anyhow::Result,
    futures::StreamExt,
    secrecy::ExposeSecret,
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use tokio_xmpp::{
    Client, Event, Stanza,
    connect::DnsConfig,
    parsers::jid::Jid,
    xmlstream::Timeouts,
};

use acc_config::AccountConfig;

use crate::{
    events::{ConnectionState, XmppEventHandler},
    handlers,
    minidom::Element,
    outbound::Outbound,
    roster::{self, ROSTER_QUERY_ID},
    state::ClientHandle,
};

/// Size of the outbound stanza channel.
const STANZA_CHANNEL_SIZE: usize = 256;

/// SRV service used when no explicit server is configured.
const CLIENT_SRV: &str = "_xmpp-client._tcp";

/// Who we are on the wire.
struct Session {
    bare_jid: String,
    full_jid: String,
}

/// Start a client session for `config`.
///
/// Builds the `tokio_xmpp::Client` and spawns a background task that
/// processes events until [`ClientHandle::shutdown`] is called or the
/// stream ends. Must be called from within a tokio runtime.
pub fn start(config: &AccountConfig, handler: Arc<dyn XmppEventHandler>) -> Result<ClientHandle> {
    let full_jid = config.full_jid();
    let jid: Jid = full_jid
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid JID '{full_jid}': {e}"))?;

    let password = config.pass.expose_secret().to_string();
    let client = Client::new_starttls(jid, password, dns_config(config), Timeouts::default());

    let (stanza_tx, stanza_rx) = mpsc::channel(STANZA_CHANNEL_SIZE);
    let cancel = CancellationToken::new();
    let connected = Arc::new(AtomicBool::new(false));
    let session = Session {
        bare_jid: config.bare_jid().to_string(),
        full_jid: full_jid.clone(),
    };

    match config.server.as_deref() {
        Some(server) => info!(
            jid = %full_jid,
            server,
            port = config.port,
            "starting xmpp client"
        ),
        None => info!(jid = %full_jid, "starting xmpp client"),
    }

    let task = tokio::spawn({
        let cancel = cancel.clone();
        let connected = Arc::clone(&connected);
        async move {
            if let Err(e) =
                run_event_loop(client, session, stanza_rx, cancel, connected, handler).await
            {
                error!("xmpp event loop error: {e}");
            }
        }
    });

    Ok(ClientHandle {
        outbound: Outbound::new(full_jid, stanza_tx),
        cancel,
        connected,
        task,
    })
}

/// Explicit host and port when `server` is set, SRV lookup on the JID
/// domain otherwise.
fn dns_config(config: &AccountConfig) -> DnsConfig {
    match config.server.as_deref() {
        Some(host) => DnsConfig::no_srv(host, config.port),
        None => DnsConfig::srv(config.domain(), CLIENT_SRV, config.port),
    }
}

/// The main event loop — owns the `tokio_xmpp::Client`.
async fn run_event_loop(
    mut client: Client,
    session: Session,
    mut stanza_rx: mpsc::Receiver<Element>,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
    handler: Arc<dyn XmppEventHandler>,
) -> Result<()> {
    info!(jid = %session.full_jid, "xmpp event loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("xmpp event loop cancelled, disconnecting");
                connected.store(false, Ordering::Relaxed);
                let unavailable = crate::stanza::build_unavailable(&session.full_jid, None);
                let _ = send_raw_stanza(&mut client, unavailable).await;
                let _ = client.send_end().await;
                break;
            }

            stanza = stanza_rx.recv() => {
                match stanza {
                    Some(element) => {
                        if let Err(e) = send_raw_stanza(&mut client, element).await {
                            warn!("failed to send stanza: {e}");
                        }
                    }
                    None => {
                        // All senders dropped — shut down.
                        info!("stanza channel closed, shutting down");
                        let _ = client.send_end().await;
                        break;
                    }
                }
            }

            event = client.next() => {
                match event {
                    Some(Event::Online { bound_jid, resumed }) => {
                        info!(%bound_jid, resumed, "xmpp connected, stream secured with starttls");
                        connected.store(true, Ordering::Relaxed);

                        let presence = crate::stanza::build_presence(&session.full_jid, None);
                        if let Err(e) = send_raw_stanza(&mut client, presence).await {
                            warn!("failed to send initial presence: {e}");
                        }

                        let query = roster::build_roster_query(&session.full_jid, ROSTER_QUERY_ID);
                        if let Err(e) = send_raw_stanza(&mut client, query).await {
                            warn!("failed to request roster: {e}");
                        } else {
                            debug!("roster requested");
                        }

                        let state = ConnectionState::Online {
                            bound_jid: bound_jid.to_string(),
                            resumed,
                        };
                        handler.on_connection(&state).await;
                    }

                    Some(Event::Disconnected(err)) => {
                        warn!(%err, "xmpp disconnected (will auto-reconnect)");
                        connected.store(false, Ordering::Relaxed);
                        let state = ConnectionState::Disconnected {
                            reason: err.to_string(),
                        };
                        handler.on_connection(&state).await;
                    }

                    Some(Event::Stanza(stanza)) => {
                        let element = stanza_to_element(stanza);
                        let reply =
                            handlers::handle_stanza(&session.bare_jid, element, handler.as_ref())
                                .await;
                        if let Some(reply) = reply
                            && let Err(e) = send_raw_stanza(&mut client, reply).await
                        {
                            warn!("failed to send reply: {e}");
                        }
                    }

                    None => {
                        info!("xmpp stream ended");
                        connected.store(false, Ordering::Relaxed);
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    handler.on_connection(&ConnectionState::Closed).await;
    info!("xmpp event loop exited");

    Ok(())
}

fn stanza_to_element(stanza: Stanza) -> Element {
    match stanza {
        Stanza::Message(message) => message.into(),
        Stanza::Presence(presence) => presence.into(),
        Stanza::Iq(iq) => iq.into(),
    }
}

/// Send a raw `Element` as a stanza.
///
/// Converts the Element into the appropriate `xmpp_parsers` type before
/// sending via `client.send_stanza()`.
async fn send_raw_stanza(client: &mut Client, element: Element) -> Result<()> {
    let stanza: Stanza = match element.name() {
        "message" => {
            let msg = tokio_xmpp::parsers::message::Message::try_from(element)
                .map_err(|e| anyhow::anyhow!("invalid message stanza: {e}"))?;
            msg.into()
        },
        "presence" => {
            let pres = tokio_xmpp::parsers::presence::Presence::try_from(element)
                .map_err(|e| anyhow::anyhow!("invalid presence stanza: {e}"))?;
            pres.into()
        },
        "iq" => {
            let iq = tokio_xmpp::parsers::iq::Iq::try_from(element)
                .map_err(|e| anyhow::anyhow!("invalid iq stanza: {e}"))?;
            iq.into()
        },
        other => {
            return Err(anyhow::anyhow!("unsupported stanza type: {other}"));
        },
    };

    client
        .send_stanza(stanza)
        .await
        .map_err(|e| anyhow::anyhow!("failed to send stanza: {e}"))?;

    Ok(())
}
