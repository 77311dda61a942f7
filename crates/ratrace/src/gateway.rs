//! WebSocket gateway built on `tokio-tungstenite`.
//!
//! The gateway owns the listening socket, assigns each accepted
//! connection a process-unique [`ConnId`], and exposes a minimal
//! send/recv surface over text frames. Everything above it deals in
//! decoded protocol types; everything below is tungstenite.
//!
//! Each connection is split into halves: the handler's read loop owns
//! the stream side exclusively, while the sink side sits behind a
//! cloneable [`ConnectionSender`] so the event-forwarding task and the
//! handler can both reply without blocking on an in-flight read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use ratrace_protocol::ConnId;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Counter for generating unique connection ids. Never reused within a
/// process — reconnecting clients always get a fresh id.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Errors from the gateway layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("failed to accept connection: {0}")]
    AcceptFailed(#[source] std::io::Error),

    #[error("failed to send: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("failed to receive: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

/// The listening side of the gateway.
pub struct Gateway {
    listener: TcpListener,
}

impl Gateway {
    /// Binds to the given address.
    pub async fn bind(addr: &str) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(GatewayError::AcceptFailed)?;
        tracing::info!(addr, "gateway listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one connection and completes the WebSocket upgrade.
    pub async fn accept(&mut self) -> Result<GatewayConnection, GatewayError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(GatewayError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            GatewayError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnId(NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(conn_id = %id, %addr, "accepted connection");

        use futures_util::StreamExt;
        let (sink, stream) = ws.split();
        Ok(GatewayConnection {
            id,
            reader: stream,
            sender: ConnectionSender {
                id,
                sink: Arc::new(Mutex::new(sink)),
            },
        })
    }
}

/// One accepted client connection. Owned by its handler task.
pub struct GatewayConnection {
    id: ConnId,
    reader: SplitStream<WsStream>,
    sender: ConnectionSender,
}

impl GatewayConnection {
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// A cloneable handle for writing to this connection.
    pub fn sender(&self) -> ConnectionSender {
        self.sender.clone()
    }

    /// Receives the next data frame. `Ok(None)` means the peer closed.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, GatewayError> {
        use futures_util::StreamExt;
        loop {
            match self.reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(GatewayError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }
}

/// The write half of a connection. Cheap to clone; shared between the
/// handler and the event-forwarding task.
#[derive(Clone)]
pub struct ConnectionSender {
    id: ConnId,
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
}

impl ConnectionSender {
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Sends one text frame. The reference client speaks JSON text.
    pub async fn send(&self, data: &[u8]) -> Result<(), GatewayError> {
        use futures_util::SinkExt;
        let text = String::from_utf8_lossy(data).into_owned();
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                GatewayError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }
}
