/*!
Who is in the chat.

The map of joined connections is owned by a single task. Everything else
talks to it through a cloneable [`Registry`] handle, so requests from any
number of sessions are applied one at a time, in the order they arrive.
*/
use std::{
    collections::BTreeMap,
    future::Future,
    sync::Arc,
};

use tokio::sync::{mpsc, oneshot};
use tracing::{event, Level};

use crate::{
    conn::{Conn, ConnId},
    error::Error,
};

/// Requests sent from a `Registry` handle to the owning task.
#[derive(Debug)]
enum Request {
    Insert{ conn: Arc<Conn>, name: String },
    Remove{ id: ConnId },
    Lookup{ id: ConnId, reply: oneshot::Sender<Option<String>> },
    Count{ reply: oneshot::Sender<usize> },
    Snapshot{ reply: oneshot::Sender<Vec<Arc<Conn>>> },
}

struct Member {
    conn: Arc<Conn>,
    name: String,
}

#[derive(Clone, Debug)]
pub struct Registry {
    tx: mpsc::UnboundedSender<Request>,
}

/// Owns the member map and answers requests until every `Registry` handle
/// has been dropped.
async fn run(mut rx: mpsc::UnboundedReceiver<Request>) {
    let mut members: BTreeMap<ConnId, Member> = BTreeMap::new();
    event!(Level::DEBUG, "registry running");

    while let Some(req) = rx.recv().await {
        event!(Level::TRACE, "registry rec'd {:?}", &req);
        match req {
            Request::Insert{ conn, name } => {
                let id = conn.id();
                if let Some(old) = members.insert(id, Member{ conn, name }) {
                    event!(Level::DEBUG, "{} renamed from {:?}", &id, &old.name);
                }
            },

            Request::Remove{ id } => {
                if members.remove(&id).is_some() {
                    event!(Level::DEBUG, "{} removed; {} remain", &id, members.len());
                }
            },

            // Nobody waiting on a reply isn't our problem.
            Request::Lookup{ id, reply } => {
                let _ = reply.send(members.get(&id).map(|m| m.name.clone()));
            },

            Request::Count{ reply } => {
                let _ = reply.send(members.len());
            },

            Request::Snapshot{ reply } => {
                let conns = members.values().map(|m| m.conn.clone()).collect();
                let _ = reply.send(conns);
            },
        }
    }

    event!(Level::DEBUG, "registry shutting down");
}

impl Registry {
    /// Start the owning task. Must be called from inside a tokio runtime.
    pub fn spawn() -> Registry {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Registry{ tx }
    }

    /// Associate `name` with `conn`, replacing any name it already had.
    pub fn insert(&self, conn: &Arc<Conn>, name: String) -> Result<(), Error> {
        self.tx.send(Request::Insert{ conn: conn.clone(), name })?;
        Ok(())
    }

    /// Forget `id`. Removing something that isn't there is fine.
    pub fn remove(&self, id: ConnId) -> Result<(), Error> {
        self.tx.send(Request::Remove{ id })?;
        Ok(())
    }

    pub async fn lookup(&self, id: ConnId) -> Result<Option<String>, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Lookup{ id, reply })?;
        Ok(rx.await?)
    }

    pub async fn count(&self) -> Result<usize, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Count{ reply })?;
        Ok(rx.await?)
    }

    /// Every currently registered connection, as of the moment the
    /// registry task gets to this request.
    pub async fn snapshot(&self) -> Result<Vec<Arc<Conn>>, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Snapshot{ reply })?;
        Ok(rx.await?)
    }

    /// Call `visit` on each registered connection in turn, returning how
    /// many were visited.
    ///
    /// The set visited is a snapshot; `visit` may insert or remove entries
    /// without disturbing the iteration, and changes made by others while
    /// it runs may or may not be seen.
    pub async fn for_each<F, Fut>(&self, mut visit: F) -> Result<usize, Error>
    where
        F: FnMut(Arc<Conn>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let conns = self.snapshot().await?;
        let n = conns.len();
        for conn in conns.into_iter() {
            visit(conn).await;
        }
        Ok(n)
    }
}
