//! Client-side transport abstraction for roomlink.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! the outbound connection to a remote room, plus the close classification
//! ([`CloseReason`], [`CloseCode`]) the mediator uses to decide whether a
//! dropped connection needs a reconnect.
//!
//! Inbound traffic is not pulled through the connection. Each successful
//! connect hands back a [`ConnectionEvents`] channel that carries received
//! text frames and, last of all, a single [`ConnectionEvent::Closed`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket connector via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Close classification
// ---------------------------------------------------------------------------

/// WebSocket close status codes (RFC 6455 §7.4.1).
///
/// Only [`CloseCode::Normal`] counts as an orderly shutdown. Every other
/// code, including "going away", means the room ended the session on us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: the purpose of the connection has been fulfilled.
    Normal,
    /// 1001: the endpoint is going away (server restart, page unload).
    Away,
    /// 1002: protocol error.
    Protocol,
    /// 1006: reserved; the connection dropped without a close frame.
    Abnormal,
    /// 1011: the server hit an unexpected condition.
    Error,
    /// Any other code.
    Other(u16),
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::Away,
            1002 => Self::Protocol,
            1006 => Self::Abnormal,
            1011 => Self::Error,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Abnormal => 1006,
            CloseCode::Error => 1011,
            CloseCode::Other(other) => other,
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// The close status code.
    pub code: CloseCode,
    /// Free-form text sent with the close frame, possibly empty.
    pub phrase: String,
}

impl CloseReason {
    /// Creates a close reason from a code and phrase.
    pub fn new(code: CloseCode, phrase: impl Into<String>) -> Self {
        Self {
            code,
            phrase: phrase.into(),
        }
    }

    /// An orderly close (1000) with no phrase.
    pub fn normal() -> Self {
        Self::new(CloseCode::Normal, "")
    }

    /// A connection that dropped without a close handshake (1006).
    pub fn abnormal(phrase: impl Into<String>) -> Self {
        Self::new(CloseCode::Abnormal, phrase)
    }

    /// Returns `true` only for a normal closure.
    pub fn is_normal(&self) -> bool {
        self.code == CloseCode::Normal
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code: u16 = self.code.into();
        if self.phrase.is_empty() {
            write!(f, "{code}")
        } else {
            write!(f, "{code} ({})", self.phrase)
        }
    }
}

// ---------------------------------------------------------------------------
// Events and traits
// ---------------------------------------------------------------------------

/// Something the remote side did on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A text frame arrived.
    Text(String),
    /// The connection ended. Always the last event on the channel.
    Closed(CloseReason),
}

/// Receiving half for the events of one connection.
pub type ConnectionEvents = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Opens outbound connections to a single endpoint at a time.
///
/// The returned futures are `Send` so connectors can be driven from inside
/// spawned tasks without knowing the concrete type.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Performs the handshake with `endpoint`.
    ///
    /// On success returns the live connection and the stream of its
    /// inbound events.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<
        Output = Result<(Self::Connection, ConnectionEvents), TransportError>,
    > + Send;
}

/// A single live connection that can carry text frames to the remote peer.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame.
    ///
    /// Ordinary network failure is reported as `Err`, never as a panic.
    fn send_text(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection with a normal close code.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns `true` while the connection can still carry frames.
    fn is_open(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
