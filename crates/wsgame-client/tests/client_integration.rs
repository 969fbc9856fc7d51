//! Integration tests: the client against a real server on loopback.

use std::time::Duration;

use wsgame_client::{ClientConfig, ClientError, ClientSession, ClientState};
use wsgame_server::application::CommandRouter;
use wsgame_server::domain::ServerConfig;
use wsgame_server::infrastructure::{Server, ServerHandle};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> ServerHandle {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        send_interval: Duration::from_millis(5),
        close_timeout: Duration::from_secs(1),
        ..ServerConfig::default()
    };
    let server = Server::bind(config, CommandRouter::with_reserved_defaults())
        .await
        .unwrap();
    let handle = server.handle();
    tokio::spawn(server.run());
    handle
}

fn client_config(handle: &ServerHandle) -> ClientConfig {
    ClientConfig {
        server_url: format!("ws://{}/", handle.local_addr()),
        send_interval: Duration::from_millis(5),
        close_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

async fn wait_for_live(handle: &ServerHandle, n: usize) {
    tokio::time::timeout(WAIT, async {
        while handle.registry().len().await != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_queued_lines_come_back_in_order() {
    // Arrange
    let handle = start_server().await;
    let mut session = ClientSession::connect(client_config(&handle)).await.unwrap();
    wait_for_live(&handle, 1).await;

    // Act
    session.queue("a").unwrap();
    session.queue("b").unwrap();

    // Assert – the server echoes every broadcast back to its sender
    let first = tokio::time::timeout(WAIT, session.next_message()).await.unwrap();
    let second = tokio::time::timeout(WAIT, session.next_message()).await.unwrap();
    assert_eq!(first.as_deref(), Some("a"));
    assert_eq!(second.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_two_clients_see_each_other() {
    let handle = start_server().await;
    let alice = ClientSession::connect(client_config(&handle)).await.unwrap();
    let mut bob = ClientSession::connect(client_config(&handle)).await.unwrap();
    wait_for_live(&handle, 2).await;

    alice.queue("hi bob").unwrap();

    let got = tokio::time::timeout(WAIT, bob.next_message()).await.unwrap();
    assert_eq!(got.as_deref(), Some("hi bob"));
}

#[tokio::test]
async fn test_unread_messages_stay_bounded() {
    // Arrange – a listener that never reads, with room for two messages
    let handle = start_server().await;
    let mut idle = ClientSession::connect(ClientConfig {
        inbound_capacity: 2,
        ..client_config(&handle)
    })
    .await
    .unwrap();
    let talker = ClientSession::connect(client_config(&handle)).await.unwrap();
    wait_for_live(&handle, 2).await;

    // Act
    for msg in ["1", "2", "3", "4", "5"] {
        talker.queue(msg).unwrap();
    }
    tokio::time::timeout(WAIT, async {
        while idle.dropped_count() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // Assert – the oldest two are kept, the rest were dropped
    assert_eq!(idle.buffered(), 2);
    assert_eq!(idle.dropped_count(), 3);
    assert_eq!(idle.next_message().await.as_deref(), Some("1"));
    assert_eq!(idle.next_message().await.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_stop_completes_close_handshake() {
    // Arrange
    let handle = start_server().await;
    let session = ClientSession::connect(client_config(&handle)).await.unwrap();
    wait_for_live(&handle, 1).await;

    // Act
    let reached = tokio::time::timeout(WAIT, session.stop()).await.unwrap();

    // Assert
    assert_eq!(reached, ClientState::Closed);
    wait_for_live(&handle, 0).await;
}

#[tokio::test]
async fn test_server_shutdown_is_acknowledged() {
    // Arrange
    let handle = start_server().await;
    let session = ClientSession::connect(client_config(&handle)).await.unwrap();
    wait_for_live(&handle, 1).await;

    // Act
    let report = handle.shutdown().await;

    // Assert
    assert_eq!(report.closed.len(), 1);
    tokio::time::timeout(WAIT, session.closed()).await.unwrap();
    assert_eq!(session.state(), ClientState::Closed);
    assert!(matches!(session.queue("late"), Err(ClientError::NotOpen)));
}

#[tokio::test]
async fn test_connect_to_nothing_fails() {
    // Bind and drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = ClientSession::connect(ClientConfig::new(format!("ws://{addr}/"))).await;

    assert!(matches!(outcome, Err(ClientError::ConnectFailed { .. })));
}
