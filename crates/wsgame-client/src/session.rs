//! One client connection: a receive task and a paced transmit task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Error as WsError, Message,
};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wsgame_core::protocol::close::{REASON_ACKNOWLEDGE, REASON_CLOSING};

use crate::config::ClientConfig;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedSink = Arc<Mutex<SplitSink<Socket, Message>>>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {source}")]
    ConnectFailed {
        url: String,
        #[source]
        source: WsError,
    },

    /// The session is closing or closed; nothing more can be queued.
    #[error("session is not open")]
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Open,
    /// A close frame has been sent or received; waiting for the socket to end.
    Closing,
    Closed,
}

/// A connected client.
pub struct ClientSession {
    config: ClientConfig,
    sink: SharedSink,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::Receiver<String>,
    dropped: Arc<AtomicU64>,
    state_tx: Arc<watch::Sender<ClientState>>,
    state: watch::Receiver<ClientState>,
    scope: CancellationToken,
    transmit_scope: CancellationToken,
    receive_task: JoinHandle<()>,
    transmit_task: JoinHandle<()>,
}

impl ClientSession {
    /// Connects to `config.server_url` and starts both tasks.
    ///
    /// # Errors
    ///
    /// [`ClientError::ConnectFailed`] if the TCP connection or the WebSocket
    /// upgrade fails (including a `503` from a draining server).
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        info!("connecting to server {}", config.server_url);
        let (socket, _response) =
            connect_async(config.server_url.as_str())
                .await
                .map_err(|source| ClientError::ConnectFailed {
                    url: config.server_url.clone(),
                    source,
                })?;
        let (sink, stream) = socket.split();
        let sink = Arc::new(Mutex::new(sink));

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::channel(config.inbound_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let (state_tx, state) = watch::channel(ClientState::Open);
        let state_tx = Arc::new(state_tx);
        let scope = CancellationToken::new();
        let transmit_scope = scope.child_token();

        let receive_task = tokio::spawn(receive_loop(
            stream,
            Arc::clone(&sink),
            Arc::clone(&state_tx),
            Inbound {
                tx: inbound_tx,
                dropped: Arc::clone(&dropped),
            },
            scope.clone(),
            transmit_scope.clone(),
        ));
        let transmit_task = tokio::spawn(transmit_loop(
            Arc::clone(&sink),
            outbound_rx,
            state.clone(),
            transmit_scope.clone(),
            config.send_interval,
        ));

        Ok(Self {
            config,
            sink,
            outbound,
            inbound,
            dropped,
            state_tx,
            state,
            scope,
            transmit_scope,
            receive_task,
            transmit_task,
        })
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Queues `text` for transmission.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotOpen`] once the session has started closing.
    pub fn queue(&self, text: impl Into<String>) -> Result<(), ClientError> {
        if self.state() != ClientState::Open {
            return Err(ClientError::NotOpen);
        }
        self.outbound
            .send(text.into())
            .map_err(|_| ClientError::NotOpen)
    }

    /// Next text message from the server, or `None` once the session ended
    /// and every buffered message has been read.
    pub async fn next_message(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Received messages not yet taken by [`next_message`](Self::next_message).
    pub fn buffered(&self) -> usize {
        self.inbound.len()
    }

    /// Messages dropped because the inbound buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Resolves when the socket has ended, for whatever reason.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ClientState::Closed).await;
    }

    /// Sends a normal-closure frame and waits up to the close timeout for the
    /// server to finish the handshake, then tears both tasks down.
    ///
    /// Returns the state reached before the forced teardown: `Closed` if the
    /// handshake completed in time.
    pub async fn stop(self) -> ClientState {
        info!("closing connection");
        self.transmit_scope.cancel();

        if self.state() == ClientState::Open {
            self.state_tx.send_replace(ClientState::Closing);
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: REASON_CLOSING.into(),
            };
            let handshake = async {
                if let Err(e) = self.sink.lock().await.send(Message::Close(Some(frame))).await {
                    debug!("close frame not sent: {e}");
                }
                self.closed().await;
            };
            if tokio::time::timeout(self.config.close_timeout, handshake)
                .await
                .is_err()
            {
                warn!(
                    timeout = ?self.config.close_timeout,
                    "server did not complete the close handshake"
                );
            }
        }

        let reached = self.state();
        self.scope.cancel();
        let _ = self.receive_task.await;
        let _ = self.transmit_task.await;
        reached
    }
}

/// Producer end of the inbound buffer.  A full buffer drops the newest
/// message, like the server's outbound queue.
struct Inbound {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl Inbound {
    fn push(&self, text: String) {
        debug!("received: {text}");
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(text) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped_total = total, "inbound buffer full; message dropped");
        }
    }
}

async fn receive_loop(
    mut stream: SplitStream<Socket>,
    sink: SharedSink,
    state: Arc<watch::Sender<ClientState>>,
    inbound: Inbound,
    scope: CancellationToken,
    transmit_scope: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Message::Text(text))) => inbound.push(text),
            Some(Ok(Message::Binary(bytes))) => {
                inbound.push(String::from_utf8_lossy(&bytes).into_owned());
            }
            Some(Ok(Message::Close(_))) => {
                transmit_scope.cancel();
                if *state.borrow() == ClientState::Open {
                    info!("acknowledging close frame from server");
                    state.send_replace(ClientState::Closing);
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: REASON_ACKNOWLEDGE.into(),
                    };
                    if let Err(e) = sink.lock().await.send(Message::Close(Some(frame))).await {
                        debug!("close acknowledgement: {e}");
                    }
                }
                // Keep reading: the server ends the TCP stream once done.
            }
            Some(Ok(_)) => {}
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => break,
            Some(Err(e)) => {
                warn!("receive failed: {e}");
                break;
            }
        }
    }

    transmit_scope.cancel();
    state.send_replace(ClientState::Closed);
    info!("connection ended");
}

async fn transmit_loop(
    sink: SharedSink,
    mut outbound: mpsc::UnboundedReceiver<String>,
    state: watch::Receiver<ClientState>,
    scope: CancellationToken,
    send_interval: std::time::Duration,
) {
    let mut ticker = interval_at(Instant::now() + send_interval, send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if *state.borrow() != ClientState::Open {
            continue;
        }
        let text = match outbound.try_recv() {
            Ok(text) => text,
            Err(mpsc::error::TryRecvError::Empty) => continue,
            Err(mpsc::error::TryRecvError::Disconnected) => break,
        };
        if let Err(e) = sink.lock().await.send(Message::Text(text)).await {
            warn!("send failed: {e}");
        }
    }
}
