/*!
Interface between a connected byte stream and the rest of the program.

Opening a connection splits the stream in two. The write side lives in a
shared [`Conn`], which anyone holding it may write to or close; the read
side becomes an [`Incoming`], owned by the one session reading from it.
Closing the `Conn` also wakes up its `Incoming`, so a connection closed
from elsewhere still gets torn down by its session.
*/
use std::{
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{watch, Mutex},
};
use tracing::{event, Level};

use crate::error::Error;

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Identifies one connection for as long as the server runs.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConnId(usize);

impl ConnId {
    pub fn new(n: usize) -> ConnId { ConnId(n) }
}

impl Display for ConnId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", &self.0)
    }
}

pub struct Conn {
    id: ConnId,
    addr: String,
    /// `None` once closed.
    to_peer: Mutex<Option<Writer>>,
    closed: watch::Sender<bool>,
}

/// The read half of a connection.
pub struct Incoming {
    from_peer: BufReader<Reader>,
    closed: watch::Receiver<bool>,
}

impl Conn {
    pub fn open<S>(
        id: ConnId,
        addr: impl Into<String>,
        stream: S,
    ) -> (Arc<Conn>, Incoming)
    where S: AsyncRead + AsyncWrite + Send + 'static
    {
        let (from_peer, to_peer) = tokio::io::split(stream);
        let (closed_tx, closed_rx) = watch::channel(false);

        let conn = Conn {
            id,
            addr: addr.into(),
            to_peer: Mutex::new(Some(Box::new(to_peer))),
            closed: closed_tx,
        };
        let incoming = Incoming {
            from_peer: BufReader::new(Box::new(from_peer)),
            closed: closed_rx,
        };

        (Arc::new(conn), incoming)
    }

    pub fn id(&self) -> ConnId { self.id }

    /// Description of the remote end.
    pub fn addr(&self) -> &str { &self.addr }

    pub fn is_closed(&self) -> bool { *self.closed.borrow() }

    /// Write all of `bytes` and flush.
    ///
    /// Writers to the same connection are serialized, so two messages
    /// never interleave on the wire.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut guard = self.to_peer.lock().await;
        let w = guard.as_mut().ok_or(Error::Closed)?;
        w.write_all(bytes).await?;
        w.flush().await?;
        Ok(())
    }

    /// Shut down the write side and wake the reader. Safe to call more
    /// than once, from any task.
    pub async fn close(&self) {
        let writer = self.to_peer.lock().await.take();
        self.closed.send_replace(true);

        if let Some(mut w) = writer {
            event!(Level::DEBUG, "closing connection {} ({})", &self.id, &self.addr);
            if let Err(e) = w.shutdown().await {
                event!(Level::DEBUG,
                    "error shutting down connection {}: {}", &self.id, &e
                );
            }
        }
    }
}

impl Debug for Conn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Resolves once the `true` has been sent down `rx`, or once its sender
/// is gone.
async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

impl Incoming {
    /// Read the next `\n`-terminated line, terminator included.
    ///
    /// Returns `Ok(None)` at a clean end of stream or once the connection
    /// has been closed. A stream that ends partway through a line gives
    /// `Error::Eof` and the fragment is dropped. Bytes that aren't valid
    /// UTF-8 are replaced rather than treated as errors.
    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        let Incoming { from_peer, closed } = self;

        let read = async move {
            let mut buff: Vec<u8> = Vec::new();
            let n = from_peer.read_until(b'\n', &mut buff).await?;
            Ok::<_, std::io::Error>((n, buff))
        };

        tokio::select!{
            res = read => {
                let (n, buff) = res?;
                if n == 0 {
                    return Ok(None);
                }
                if buff.last() != Some(&b'\n') {
                    event!(Level::TRACE, "dropping unterminated {:?}", &buff);
                    return Err(Error::Eof);
                }
                Ok(Some(String::from_utf8_lossy(&buff).into_owned()))
            },
            _ = wait_closed(closed) => Ok(None),
        }
    }
}
