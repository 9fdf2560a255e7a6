/*!
Turning a line from a participant into something to broadcast.
*/
use std::sync::Arc;

use chrono::Local;
use tracing::{event, Level};

use crate::{
    broadcast::Broadcaster,
    conn::Conn,
    error::Error,
};

/// Sent privately to anyone who tries to chat before joining.
pub static MUST_JOIN_TEXT: &str = "Write: /join `nickname`.\n";

#[derive(Debug, Eq, PartialEq)]
pub enum Command<'a> {
    Join(&'a str),
    Users,
    Say(&'a str),
}

impl<'a> Command<'a> {
    /// Classify an already-trimmed line. Commands are matched by prefix, so
    /// `/joinBob` joins as `Bob`.
    pub fn parse(line: &'a str) -> Command<'a> {
        if let Some(rest) = line.strip_prefix("/join") {
            Command::Join(rest.trim())
        } else if line.starts_with("/users") {
            Command::Users
        } else {
            Command::Say(line)
        }
    }
}

/// Local wall-clock time as `HH:MM`.
pub fn stamp() -> String {
    Local::now().format("%H:%M").to_string()
}

pub fn join_notice(stamp: &str, name: &str) -> String {
    format!("{} Notice: \"{}\" joined the chat\n", stamp, name)
}

pub fn leave_notice(stamp: &str, name: &str) -> String {
    format!("{} Notice: \"{}\" left the chat\n", stamp, name)
}

pub fn users_notice(stamp: &str, count: usize) -> String {
    format!("{} Notice: \"{}\" clients in chat\n", stamp, count)
}

pub fn chat_line(stamp: &str, name: &str, text: &str) -> String {
    format!("{} - {}: {}\n", stamp, name, text)
}

/// Act on one trimmed `line` from `conn`.
///
/// Returns the name `conn` joined under, if the line was a `/join`.
pub async fn dispatch(
    conn: &Arc<Conn>,
    line: &str,
    broadcaster: &Broadcaster,
) -> Result<Option<String>, Error> {
    let registry = broadcaster.registry();

    match Command::parse(line) {
        Command::Join(name) => {
            registry.insert(conn, name.to_owned())?;
            event!(Level::DEBUG, "{} joined as {:?}", &conn.id(), name);
            broadcaster.broadcast(&join_notice(&stamp(), name)).await?;
            Ok(Some(name.to_owned()))
        },

        Command::Users => {
            let count = registry.count().await?;
            broadcaster.broadcast(&users_notice(&stamp(), count)).await?;
            Ok(None)
        },

        Command::Say(text) => {
            match registry.lookup(conn.id()).await? {
                Some(name) => {
                    broadcaster.broadcast(&chat_line(&stamp(), &name, text)).await?;
                },
                None => {
                    event!(Level::TRACE, "{} tried to talk before joining", &conn.id());
                    // If this fails, the session's next read will notice.
                    if let Err(e) = conn.send(MUST_JOIN_TEXT.as_bytes()).await {
                        event!(Level::DEBUG,
                            "unable to prompt {} to join: {}", &conn.id(), &e
                        );
                    }
                },
            }
            Ok(None)
        },
    }
}
