/*!
Append-only record of everything broadcast.
*/
use std::path::{Path, PathBuf};

use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{event, Level};

use crate::error::Error;

pub struct History {
    /// Held for the whole of each append so concurrent writers take turns.
    path: Mutex<PathBuf>,
}

impl History {
    pub fn new<P: AsRef<Path>>(path: P) -> History {
        History{ path: Mutex::new(path.as_ref().to_path_buf()) }
    }

    async fn try_append(path: &Path, text: &str) -> Result<(), Error> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(text.as_bytes()).await?;
        // A tokio File hands writes off to a blocking thread; flushing
        // waits for that to finish.
        file.flush().await?;
        Ok(())
    }

    /// Write `text` verbatim to the end of the history file, creating it if
    /// necessary.
    ///
    /// Failures are logged and otherwise ignored; losing history should
    /// never get in the way of the chat.
    pub async fn append(&self, text: &str) {
        let path = self.path.lock().await;
        if let Err(e) = History::try_append(&path, text).await {
            event!(Level::ERROR,
                "unable to append to history file {:?}: {}", &*path, &e
            );
        }
    }
}
