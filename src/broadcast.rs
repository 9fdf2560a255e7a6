/*!
Fan a message out to everyone in the registry.
*/
use std::sync::Arc;

use tracing::{event, Level};

use crate::{
    config::LogPolicy,
    error::Error,
    history::History,
    registry::Registry,
};

#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
    history: Arc<History>,
    policy: LogPolicy,
}

impl Broadcaster {
    pub fn new(
        registry: Registry,
        history: Arc<History>,
        policy: LogPolicy,
    ) -> Broadcaster {
        Broadcaster{ registry, history, policy }
    }

    pub fn registry(&self) -> &Registry { &self.registry }

    /// Write `text` to every registered connection, returning how many
    /// connections it was offered to.
    ///
    /// A connection we fail to write to gets closed and dropped from the
    /// registry; everyone else still gets the message. Writes happen one
    /// at a time, so a peer that stops reading holds up the rest.
    pub async fn broadcast(&self, text: &str) -> Result<usize, Error> {
        event!(Level::TRACE, "broadcasting {:?}", text);
        let per_recipient = self.policy == LogPolicy::PerRecipient;

        let n = self.registry.for_each(|conn| {
            let registry = self.registry.clone();
            let history = self.history.clone();
            async move {
                if let Err(e) = conn.send(text.as_bytes()).await {
                    event!(Level::WARN,
                        "dropping {} ({}): {}", &conn.id(), conn.addr(), &e
                    );
                    conn.close().await;
                    if let Err(e) = registry.remove(conn.id()) {
                        event!(Level::ERROR, "unable to evict {}: {}", &conn.id(), &e);
                    }
                }
                if per_recipient {
                    history.append(text).await;
                }
            }
        }).await?;

        if !per_recipient {
            self.history.append(text).await;
        }

        event!(Level::TRACE, "    offered to {} connections", &n);
        Ok(n)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        conn::{Conn, ConnId},
        history::test::scratch_path,
    };
    use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};

    fn broadcaster(tag: &str, policy: LogPolicy) -> (Broadcaster, std::path::PathBuf) {
        let path = scratch_path(tag);
        let b = Broadcaster::new(
            Registry::spawn(),
            Arc::new(History::new(&path)),
            policy,
        );
        (b, path)
    }

    fn conn(n: usize) -> (Arc<Conn>, BufReader<DuplexStream>) {
        let (peer, stream) = duplex(1024);
        let (conn, _incoming) = Conn::open(ConnId::new(n), "test", stream);
        (conn, BufReader::new(peer))
    }

    async fn read_line(r: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        r.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn reaches_everyone() -> Result<(), Error> {
        let (b, path) = broadcaster("reaches", LogPolicy::PerRecipient);
        let (alice, mut alice_peer) = conn(0);
        let (bob, mut bob_peer) = conn(1);
        b.registry().insert(&alice, "Alice".into())?;
        b.registry().insert(&bob, "Bob".into())?;

        let text = "09:30 - Alice: caf\u{e9} \u{2615}\n";
        assert_eq!(b.broadcast(text).await?, 2);

        assert_eq!(read_line(&mut alice_peer).await, text);
        assert_eq!(read_line(&mut bob_peer).await, text);

        // One history entry per recipient.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, text.repeat(2));
        let _ = std::fs::remove_file(&path);

        Ok(())
    }

    #[tokio::test]
    async fn failed_write_evicts() -> Result<(), Error> {
        let (b, path) = broadcaster("evicts", LogPolicy::PerRecipient);
        let (alice, mut alice_peer) = conn(0);
        let (bob, bob_peer) = conn(1);
        let (carol, mut carol_peer) = conn(2);
        for (c, name) in [(&alice, "Alice"), (&bob, "Bob"), (&carol, "Carol")] {
            b.registry().insert(c, name.into())?;
        }

        drop(bob_peer);
        assert_eq!(b.broadcast("first\n").await?, 3);

        assert!(bob.is_closed());
        assert_eq!(b.registry().lookup(bob.id()).await?, None);
        assert_eq!(b.registry().count().await?, 2);
        assert_eq!(read_line(&mut alice_peer).await, "first\n");
        assert_eq!(read_line(&mut carol_peer).await, "first\n");

        // Bob isn't offered anything further.
        assert_eq!(b.broadcast("second\n").await?, 2);
        assert_eq!(read_line(&mut alice_peer).await, "second\n");
        assert_eq!(read_line(&mut carol_peer).await, "second\n");

        // The failed recipient was still logged.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("first\n").count(), 3);
        assert_eq!(content.matches("second\n").count(), 2);
        let _ = std::fs::remove_file(&path);

        Ok(())
    }

    #[tokio::test]
    async fn logs_once_per_broadcast() -> Result<(), Error> {
        let (b, path) = broadcaster("once", LogPolicy::PerBroadcast);
        let conns: Vec<_> = (0..3).map(conn).collect();
        for (c, _) in conns.iter() {
            b.registry().insert(c, "x".into())?;
        }

        assert_eq!(b.broadcast("hello\n").await?, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(&content, "hello\n");
        let _ = std::fs::remove_file(&path);

        Ok(())
    }

    #[tokio::test]
    async fn empty_room() -> Result<(), Error> {
        let (b, path) = broadcaster("empty", LogPolicy::PerRecipient);
        assert_eq!(b.broadcast("anyone?\n").await?, 0);
        // With nobody to offer it to, nothing gets logged.
        assert!(!path.exists());

        Ok(())
    }
}
