/*!
For easier error handling, we define our own error type that implements
From for the handful of other error types we run into.
*/
use std::{
    fmt::{Debug, Display, Formatter},
    io::ErrorKind,
};

use tokio::sync::{mpsc::error::SendError, oneshot::error::RecvError};

#[derive(Debug)]
pub enum Error {
    Eof,
    IOError(std::io::Error),
    /// Attempted to write to a connection that has already been closed.
    Closed,
    ServerError(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Eof => write!(f, "unexpected end of stream"),
            Error::IOError(e) => write!(f, "I/O error: {}", e),
            Error::Closed => write!(f, "connection closed"),
            Error::ServerError(s) => write!(f, "server error: {}", s),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::Eof
        } else {
            Error::IOError(e)
        }
    }
}

impl<T: Debug> From<SendError<T>> for Error {
    fn from(e: SendError<T>) -> Self {
        Self::ServerError(format!("error sending {:?}", &e.0))
    }
}

impl From<RecvError> for Error {
    fn from(_: RecvError) -> Self {
        Self::ServerError("reply channel dropped".into())
    }
}
