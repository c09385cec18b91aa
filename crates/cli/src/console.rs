//! Terminal front end: prints session events to stdout and turns stdin
//! lines into chat messages.

use std::{io, sync::Arc};

use {
    acc_config::AccountConfig,
    acc_xmpp::{ConnectionState, InboundMessage, MessageKind, RosterItem, XmppEventHandler},
    anyhow::Result,
    async_trait::async_trait,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::{debug, info, warn},
};

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send { to: &'a str, text: &'a str },
    Quit,
}

/// Parse `<jid> <message>` or `/quit`. Blank or incomplete lines give `None`.
fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line == "/quit" {
        return Some(Command::Quit);
    }
    let (to, text) = line.split_once(char::is_whitespace)?;
    let text = text.trim();
    (!to.is_empty() && !text.is_empty()).then_some(Command::Send { to, text })
}

fn format_connection(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Online {
            bound_jid,
            resumed: true,
        } => format!("*** session resumed as {bound_jid}"),
        ConnectionState::Online { bound_jid, .. } => format!("*** connected as {bound_jid}"),
        ConnectionState::Disconnected { reason } => format!("*** disconnected: {reason}"),
        ConnectionState::Closed => "*** connection closed".to_string(),
    }
}

fn format_roster_item(item: &RosterItem) -> String {
    let mut line = match &item.name {
        Some(name) => format!("  {name} <{}> [{}]", item.jid, item.subscription),
        None => format!("  {} [{}]", item.jid, item.subscription),
    };
    if !item.groups.is_empty() {
        line.push_str(&format!(" ({})", item.groups.join(", ")));
    }
    line
}

fn format_message(message: &InboundMessage) -> String {
    match message.kind {
        MessageKind::Headline => format!("!! {}: {}", message.from, message.body),
        _ => format!("{}: {}", message.from, message.body),
    }
}

/// Prints everything the session reports.
struct ConsoleHandler;

#[async_trait]
impl XmppEventHandler for ConsoleHandler {
    async fn on_connection(&self, state: &ConnectionState) {
        println!("{}", format_connection(state));
    }

    async fn on_roster(&self, items: &[RosterItem]) {
        println!("*** roster ({} contacts)", items.len());
        for item in items {
            println!("{}", format_roster_item(item));
        }
    }

    async fn on_message(&self, message: &InboundMessage) {
        println!("{}", format_message(message));
    }
}

/// What to do with one result from the stdin line reader.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Skip,
    Eof,
}

/// Lines that are not valid UTF-8 are dropped; any other read error ends
/// the session.
fn classify_input(read: io::Result<Option<String>>) -> io::Result<Input> {
    match read {
        Ok(Some(line)) => Ok(Input::Line(line)),
        Ok(None) => Ok(Input::Eof),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            warn!(error = %e, "ignoring input line that is not valid UTF-8");
            Ok(Input::Skip)
        },
        Err(e) => Err(e),
    }
}

/// Run the session until Ctrl-C, `/quit`, or end of stdin.
///
/// The session is always shut down (unavailable presence, stream close)
/// before returning, including when input or sending fails.
pub async fn run(config: AccountConfig) -> Result<()> {
    if let Some(fileproxy) = &config.fileproxy {
        debug!(fileproxy = fileproxy.as_str(), "upload service configured");
    }

    let handle = acc_xmpp::start(&config, Arc::new(ConsoleHandler))?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let outcome: Result<()> = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break Ok(());
            }

            _ = handle.closed() => {
                debug!("session ended");
                break Ok(());
            }

            read = lines.next_line() => {
                let line = match classify_input(read) {
                    Ok(Input::Line(line)) => line,
                    Ok(Input::Skip) => continue,
                    Ok(Input::Eof) => {
                        debug!("stdin closed");
                        break Ok(());
                    },
                    Err(e) => break Err(e.into()),
                };
                match parse_command(&line) {
                    Some(Command::Quit) => break Ok(()),
                    Some(Command::Send { to, text }) => {
                        if !handle.is_connected() {
                            warn!(to, "not connected, message queued");
                        }
                        if let Err(e) = handle.send_text(to, text).await {
                            break Err(e);
                        }
                        println!("{} -> {to}: {text}", config.display_name());
                    },
                    None if line.trim().is_empty() => {},
                    None => eprintln!("usage: <jid> <message> | /quit"),
                }
            }
        }
    };

    let closed = handle.shutdown().await;
    outcome.and(closed)
}
