/*!
Command-line configuration for the server.
*/
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Port both the server and the client default to.
pub const DEFAULT_PORT: u16 = 3335;

/// How many copies of each broadcast get written to the history file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogPolicy {
    /// One entry per recipient the broadcast was offered to.
    PerRecipient,
    /// One entry per broadcast, regardless of how many were listening.
    PerBroadcast,
}

#[derive(Debug, Parser)]
#[command(about = "Line-based TCP chat server")]
pub struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// TCP port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// File every broadcast message gets appended to.
    #[arg(long, default_value = "history.log")]
    pub history: PathBuf,

    /// Stop accepting new connections while this many are open.
    #[arg(long)]
    pub max_connections: Option<usize>,

    #[arg(long, value_enum, default_value_t = LogPolicy::PerRecipient)]
    pub log_policy: LogPolicy,
}

impl Args {
    pub fn addr(&self) -> String {
        format!("{}:{}", &self.host, self.port)
    }
}
