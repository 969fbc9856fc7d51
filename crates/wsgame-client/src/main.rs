//! wsgame console client: entry point.
//!
//! Every line typed on stdin is sent to the server (one line per send
//! interval); everything the server broadcasts is printed.  An empty line or
//! end of input closes the connection cleanly.  If the server goes away, the
//! client offers to reconnect.
//!
//! # Usage
//!
//! ```text
//! wsgame-client [OPTIONS]
//!
//! Options:
//!   --url               <URL>  Server endpoint [default: ws://localhost:8080/]
//!   --send-interval-ms  <MS>   Pace of outgoing lines [default: 100]
//!   --close-timeout-ms  <MS>   Close handshake bound [default: 10000]
//!   --inbound-capacity  <N>    Unread messages kept [default: 256]
//! ```

use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wsgame_client::{ClientConfig, ClientSession};

#[derive(Debug, Parser)]
#[command(
    name = "wsgame-client",
    about = "Console client for the wsgame WebSocket server",
    version
)]
struct Cli {
    /// WebSocket URL of the server.
    #[arg(long, default_value = wsgame_client::config::DEFAULT_SERVER_URL, env = "WSGAME_URL")]
    url: String,

    /// Milliseconds between transmitted lines.
    #[arg(long, default_value_t = 100, env = "WSGAME_CLIENT_SEND_INTERVAL_MS")]
    send_interval_ms: u64,

    /// Milliseconds to wait for the server to finish a close handshake.
    #[arg(long, default_value_t = 10_000, env = "WSGAME_CLIENT_CLOSE_TIMEOUT_MS")]
    close_timeout_ms: u64,

    /// Received messages buffered before new ones are dropped.
    #[arg(long, default_value_t = 256, env = "WSGAME_CLIENT_INBOUND_CAPACITY")]
    inbound_capacity: usize,
}

impl Cli {
    fn into_client_config(self) -> ClientConfig {
        ClientConfig {
            server_url: self.url,
            send_interval: Duration::from_millis(self.send_interval_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            inbound_capacity: self.inbound_capacity,
        }
    }
}

/// How one connected session ended.
enum SessionEnd {
    /// The user asked to quit.
    Quit,
    /// The server closed or the connection dropped.
    Disconnected,
}

enum Event {
    Line(std::io::Result<Option<String>>),
    Message(Option<String>),
}

async fn run_session(
    config: &ClientConfig,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<SessionEnd> {
    let mut session = ClientSession::connect(config.clone()).await?;
    info!("connected; type a line to send it, an empty line to quit");

    loop {
        let event = tokio::select! {
            line = lines.next_line() => Event::Line(line),
            message = session.next_message() => Event::Message(message),
        };
        match event {
            Event::Message(Some(text)) => println!("{text}"),
            Event::Line(Ok(Some(line))) if !line.is_empty() => {
                if session.queue(line).is_err() {
                    session.stop().await;
                    return Ok(SessionEnd::Disconnected);
                }
            }
            Event::Line(Ok(_)) => {
                session.stop().await;
                return Ok(SessionEnd::Quit);
            }
            Event::Line(Err(e)) => {
                session.stop().await;
                return Err(e.into());
            }
            Event::Message(None) => {
                session.stop().await;
                return Ok(SessionEnd::Disconnected);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_client_config();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match run_session(&config, &mut lines).await {
            Ok(SessionEnd::Quit) => break,
            Ok(SessionEnd::Disconnected) => info!("disconnected from server"),
            Err(e) => error!("{e:#}"),
        }

        info!("type r to reconnect, anything else to exit");
        match lines.next_line().await? {
            Some(answer) if answer.trim().eq_ignore_ascii_case("r") => continue,
            _ => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_match_client_config_defaults() {
        let config = Cli::parse_from(["wsgame-client"]).into_client_config();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let config = Cli::parse_from([
            "wsgame-client",
            "--url",
            "ws://127.0.0.1:9001/",
            "--send-interval-ms",
            "20",
            "--close-timeout-ms",
            "500",
            "--inbound-capacity",
            "8",
        ])
        .into_client_config();

        assert_eq!(config.server_url, "ws://127.0.0.1:9001/");
        assert_eq!(config.send_interval, Duration::from_millis(20));
        assert_eq!(config.close_timeout, Duration::from_millis(500));
        assert_eq!(config.inbound_capacity, 8);
    }
}
