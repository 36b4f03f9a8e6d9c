//! linecast interactive client.
//!
//! Connects to a linecast server and turns typed commands into protocol
//! events. Every line the server delivers is printed as it arrives.
//!
//! The server address is the first argument, then `LINECAST_ADDR`, then
//! `127.0.0.1:1102`.

mod command;

use anyhow::{Context, Result};
use command::Command;
use linecast_protocol::encode_event;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const ADDR_ENV: &str = "LINECAST_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:1102";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "linecast_cli=info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let addr = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ADDR_ENV).ok())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    info!("Connected to {}", addr);

    let (reader, mut writer) = stream.into_split();

    let incoming = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => println!("{}", line),
                Ok(None) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Read failed: {}", e);
                    break;
                }
            }
        }
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await.context("Failed to read stdin")? {
        let event = match command::parse(&line) {
            Ok(Command::Send(event)) => event,
            Ok(Command::Exit) => break,
            Err(command::CommandError::Empty) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        let bytes = encode_event(&event).context("Failed to encode event")?;
        if let Err(e) = writer.write_all(&bytes).await {
            error!("Write failed: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
    incoming.abort();
    info!("Disconnected");

    Ok(())
}
