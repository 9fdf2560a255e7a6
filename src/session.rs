/*!
The life of one connection, from accept to teardown.
*/
use std::sync::Arc;

use tracing::{event, Level};

use crate::{
    broadcast::Broadcaster,
    command::{dispatch, leave_notice, stamp},
    conn::{Conn, Incoming},
    error::Error,
};

pub struct Session {
    conn: Arc<Conn>,
    incoming: Incoming,
    broadcaster: Broadcaster,
    /// Last name this connection joined under.
    name: Option<String>,
    torn_down: bool,
}

impl Session {
    pub fn new(
        conn: Arc<Conn>,
        incoming: Incoming,
        broadcaster: Broadcaster,
    ) -> Session {
        Session {
            conn, incoming, broadcaster,
            name: None,
            torn_down: false,
        }
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Arc<Conn> { &self.conn }

    async fn read_loop(&mut self) -> Result<(), Error> {
        while let Some(line) = self.incoming.next_line().await? {
            event!(Level::TRACE, "{} rec'd {:?}", &self.conn.id(), &line);
            if let Some(name) = dispatch(&self.conn, line.trim(), &self.broadcaster).await? {
                self.name = Some(name);
            }
        }
        Ok(())
    }

    /// Announce the departure, close the connection, and forget it.
    ///
    /// Only the first call does anything.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let id = self.conn.id();
        let registry = self.broadcaster.registry();

        // A failed broadcast write may already have evicted us, in which
        // case we still know who we were.
        let name = match registry.lookup(id).await {
            Ok(Some(name)) => Some(name),
            Ok(None) => self.name.clone(),
            Err(e) => {
                event!(Level::ERROR, "{}: {}", &id, &e);
                self.name.clone()
            },
        }.unwrap_or_default();

        let text = leave_notice(&stamp(), &name);
        if let Err(e) = self.broadcaster.broadcast(&text).await {
            event!(Level::ERROR, "{}: error announcing departure: {}", &id, &e);
        }

        self.conn.close().await;
        if let Err(e) = registry.remove(id) {
            event!(Level::ERROR, "{}: error leaving registry: {}", &id, &e);
        }
    }

    /// Run until the connection ends one way or another, then tear down.
    pub async fn run(mut self) {
        let id = self.conn.id();
        event!(Level::DEBUG, "session {} ({}) started", &id, self.conn.addr());

        match self.read_loop().await {
            Ok(()) => event!(Level::DEBUG, "{} reached end of stream", &id),
            Err(e) => event!(Level::DEBUG, "{} disconnected: {}", &id, &e),
        }
        self.teardown().await;

        event!(Level::DEBUG, "session {} finished", &id);
    }
}
