//! WebSocket connector implementation using `tokio-tungstenite`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{
    CloseCode, CloseReason, Connection, ConnectionEvent, ConnectionEvents,
    ConnectionId, Connector, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Status used when the peer sends a close frame without a payload.
const NO_STATUS_RECEIVED: u16 = 1005;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Connector`] that dials `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a new connector.
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    type Connection = WebSocketConnection;

    async fn connect(
        &self,
        endpoint: &str,
    ) -> Result<(Self::Connection, ConnectionEvents), TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| classify_connect_error(endpoint, e))?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, endpoint, "WebSocket connection established");

        let (sink, stream) = ws.split();
        let open = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(read_frames(id, stream, Arc::clone(&open), tx));

        let conn = WebSocketConnection {
            id,
            endpoint: endpoint.to_string(),
            sink: Mutex::new(sink),
            open,
        };
        Ok((conn, rx))
    }
}

/// Sorts a handshake failure into "never reached" vs "refused".
fn classify_connect_error(
    endpoint: &str,
    err: tungstenite::Error,
) -> TransportError {
    match err {
        tungstenite::Error::Io(source) => TransportError::Io {
            endpoint: endpoint.to_string(),
            source,
        },
        other => TransportError::Negotiation {
            endpoint: endpoint.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Reader task: forwards text frames until the connection ends, then
/// reports exactly one `Closed` event.
async fn read_frames(
    id: ConnectionId,
    mut stream: SplitStream<WsStream>,
    open: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                // A dropped receiver just means nobody listens any more.
                let text = text.as_str().to_owned();
                let _ = events.send(ConnectionEvent::Text(text));
            }
            Some(Ok(Message::Binary(data))) => {
                match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        let _ = events.send(ConnectionEvent::Text(text));
                    }
                    Err(_) => {
                        tracing::debug!(%id, "dropping non-UTF-8 binary frame");
                    }
                }
            }
            Some(Ok(Message::Close(frame))) => {
                break match frame {
                    Some(frame) => CloseReason::new(
                        CloseCode::from(u16::from(frame.code)),
                        frame.reason.as_str().to_owned(),
                    ),
                    None => CloseReason::new(
                        CloseCode::from(NO_STATUS_RECEIVED),
                        "",
                    ),
                };
            }
            Some(Ok(_)) => continue, // ping/pong/raw frame
            Some(Err(e)) => {
                tracing::debug!(%id, error = %e, "WebSocket read failed");
                break CloseReason::abnormal(e.to_string());
            }
            None => break CloseReason::abnormal("stream ended"),
        }
    };

    open.store(false, Ordering::SeqCst);
    tracing::debug!(%id, %reason, "WebSocket connection ended");
    let _ = events.send(ConnectionEvent::Closed(reason));
}

/// A single outbound WebSocket connection.
#[derive(Debug)]
pub struct WebSocketConnection {
    id: ConnectionId,
    endpoint: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    open: Arc<AtomicBool>,
}

impl WebSocketConnection {
    /// The endpoint this connection was opened to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Connection for WebSocketConnection {
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed(
                self.endpoint.clone(),
            ));
        }
        let msg = Message::Text(text.to_owned().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let frame = CloseFrame {
            code: WsCloseCode::Normal,
            reason: String::new().into(),
        };
        let mut sink = self.sink.lock().await;
        let sent = sink.send(Message::Close(Some(frame))).await;
        let closed = sink.close().await;
        sent.and(closed).map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
