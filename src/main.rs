/*!
A line-based TCP chat server.

Clients connect, pick a name with `/join <name>`, and everything they say
after that is relayed, timestamped, to everyone who has joined. `/users`
reports how many have joined. Every broadcast is also appended to a
history file.
*/
mod broadcast;
mod command;
mod config;
mod conn;
mod error;
mod history;
mod registry;
mod server;
mod session;

use std::sync::Arc;

use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::{
    fmt::layer,
    filter::EnvFilter,
    prelude::*,
};

use crate::{
    broadcast::Broadcaster,
    config::Args,
    history::History,
    registry::Registry,
    server::Server,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    event!(Level::DEBUG, "{:?}", &args);

    let history = Arc::new(History::new(&args.history));
    let broadcaster = Broadcaster::new(Registry::spawn(), history, args.log_policy);

    let addr = args.addr();
    let server = match Server::bind(&addr, broadcaster, args.max_connections).await {
        Ok(server) => server,
        Err(e) => {
            event!(Level::ERROR, "unable to listen on {}: {}", &addr, &e);
            std::process::exit(1);
        },
    };

    match server.local_addr() {
        Ok(local) => event!(Level::INFO, "chat server listening on {}", &local),
        Err(_) => event!(Level::INFO, "chat server listening on {}", &addr),
    }

    server.run().await;
}
