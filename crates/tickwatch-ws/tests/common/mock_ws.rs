//! Mock market-data WebSocket server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections and count them
//! - Record received text frames per connection
//! - Push text frames to every open connection
//! - Drop every open connection without a close frame

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone)]
pub enum ServerCommand {
    Text(String),
    DropAll,
}

/// Text frame received by the server, tagged with the 1-based connection number.
#[derive(Debug, Clone)]
pub struct Received {
    pub connection: u32,
    pub text: String,
}

#[derive(Default)]
struct ServerState {
    received: Vec<Received>,
    connections: u32,
    open: u32,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<ServerCommand>,
    state: Arc<Mutex<ServerState>>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ServerState::default()));
        let (commands, _) = broadcast::channel(64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let state_clone = state.clone();
        let commands_clone = commands.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let state = state_clone.clone();
                        let commands = commands_clone.subscribe();
                        tokio::spawn(handle_connection(stream, state, commands));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            commands,
            state,
        }
    }

    /// Get the server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Total connections accepted so far.
    pub async fn connection_count(&self) -> u32 {
        self.state.lock().await.connections
    }

    /// Connections currently open.
    pub async fn open_connections(&self) -> u32 {
        self.state.lock().await.open
    }

    /// All received text frames, in arrival order.
    pub async fn received_messages(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .received
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }

    /// Text frames received on one connection.
    pub async fn received_on(&self, connection: u32) -> Vec<String> {
        self.state
            .lock()
            .await
            .received
            .iter()
            .filter(|r| r.connection == connection)
            .map(|r| r.text.clone())
            .collect()
    }

    /// Push a text frame to every open connection.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Text(text.into()));
    }

    /// Drop every open connection without a close handshake.
    pub fn drop_connections(&self) {
        let _ = self.commands.send(ServerCommand::DropAll);
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        self.drop_connections();
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<Mutex<ServerState>>,
    mut commands: broadcast::Receiver<ServerCommand>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let connection = {
        let mut state = state.lock().await;
        state.connections += 1;
        state.open += 1;
        state.connections
    };

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    state.lock().await.received.push(Received { connection, text });
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            cmd = commands.recv() => match cmd {
                Ok(ServerCommand::Text(text)) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(ServerCommand::DropAll) | Err(_) => break,
            },
        }
    }

    state.lock().await.open -= 1;
}

/// Poll `condition` until it holds or `within` elapses.
pub async fn wait_until<F, Fut>(within: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(within, async {
        loop {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}
