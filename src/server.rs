/*!
Accepting connections and handing each one off to its own session.
*/
use std::{
    net::SocketAddr,
    sync::Arc,
};

use tokio::{
    net::{TcpListener, ToSocketAddrs},
    sync::{mpsc, Semaphore},
};
use tracing::{event, Level};

use crate::{
    broadcast::Broadcaster,
    conn::{Conn, ConnId},
    error::Error,
    session::Session,
};

pub struct Server {
    listener: TcpListener,
    broadcaster: Broadcaster,
    /// Caps the number of open connections, if set.
    slots: Option<Arc<Semaphore>>,
}

/// Logs each new arrival. Runs apart from the accept loop so that a slow
/// log sink can't hold up accepting.
async fn log_arrivals(mut rx: mpsc::UnboundedReceiver<(ConnId, SocketAddr)>) {
    while let Some((id, addr)) = rx.recv().await {
        event!(Level::INFO, "new client {} connected from {}", &id, &addr);
    }
}

impl Server {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        broadcaster: Broadcaster,
        max_connections: Option<usize>,
    ) -> Result<Server, Error> {
        let listener = TcpListener::bind(addr).await?;
        let slots = max_connections.map(|n| Arc::new(Semaphore::new(n)));
        Ok(Server{ listener, broadcaster, slots })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) {
        let (arrivals, arrivals_rx) = mpsc::unbounded_channel();
        tokio::spawn(log_arrivals(arrivals_rx));

        let mut client_n: usize = 0;

        loop {
            // With a cap, wait for a free slot before taking the next
            // connection off the backlog.
            let permit = match &self.slots {
                Some(slots) => match slots.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        event!(Level::ERROR, "connection limit unavailable: {}", &e);
                        return;
                    },
                },
                None => None,
            };

            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let id = ConnId::new(client_n);
                    client_n += 1;

                    let (conn, incoming) = Conn::open(id, addr.to_string(), stream);
                    // The logger only goes away if its task panicked.
                    let _ = arrivals.send((id, addr));

                    let session = Session::new(conn, incoming, self.broadcaster.clone());
                    tokio::spawn(async move {
                        session.run().await;
                        drop(permit);
                    });
                },
                Err(e) => {
                    event!(Level::WARN, "error accepting connection: {}", &e);
                },
            }
        }
    }
}
