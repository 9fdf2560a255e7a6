/*!
Terminal client for the chat server.

Prints whatever the server sends and forwards whatever is typed. Typing
`/exit` quits.
*/
use clap::Parser;
use tokio::{
    io::{stdin, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{tcp::OwnedReadHalf, TcpStream},
};
use tracing::{event, Level};
use tracing_subscriber::{
    fmt::layer,
    filter::EnvFilter,
    prelude::*,
};

static EXIT_COMMAND: &str = "/exit";

#[derive(Debug, Parser)]
#[command(about = "Line-based TCP chat client")]
struct Args {
    /// Server to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 3335)]
    port: u16,
}

/// Print lines from the server until it hangs up.
async fn read_messages(from_server: OwnedReadHalf) {
    let mut lines = BufReader::new(from_server).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => println!("{}", &line),
            Ok(None) => {
                println!("Server closed the connection.");
                return;
            },
            Err(e) => {
                println!("Error reading from server: {}", &e);
                return;
            },
        }
    }
}

/// Send lines from `input` to the server until `/exit`, end of input, or
/// an error on either side.
async fn write_messages<R, W>(input: R, mut to_server: W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                event!(Level::WARN, "error reading from stdin: {}", &e);
                return;
            },
        };

        let mut out = line.clone();
        out.push('\n');
        if let Err(e) = to_server.write_all(out.as_bytes()).await {
            println!("Error writing to server: {}", &e);
            return;
        }

        if line.trim() == EXIT_COMMAND {
            println!("Exiting chat...");
            if let Err(e) = to_server.shutdown().await {
                event!(Level::DEBUG, "error shutting down connection: {}", &e);
            }
            return;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", &args.host, args.port);

    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            println!("Error connecting to {}: {}", &addr, &e);
            std::process::exit(1);
        },
    };
    event!(Level::DEBUG, "connected to {}", &addr);
    let (from_server, to_server) = stream.into_split();

    // Whichever side finishes first ends the session.
    tokio::select!{
        _ = read_messages(from_server) => {},
        _ = write_messages(BufReader::new(stdin()), to_server) => {},
    }
    // A pending stdin read would otherwise keep the runtime alive.
    std::process::exit(0);
}
