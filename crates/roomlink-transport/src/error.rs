/// Errors that can occur in the transport layer.
///
/// Connect failures are split into two classes so callers can tell a
/// handshake that was refused apart from a network that was never reached.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint was reached but the handshake was rejected
    /// (bad URL, HTTP upgrade refused, protocol violation).
    #[error("negotiation with {endpoint} failed: {reason}")]
    Negotiation { endpoint: String, reason: String },

    /// The endpoint could not be reached at the I/O level.
    #[error("i/o error talking to {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The connect attempt did not finish in time.
    #[error("connect to {0} timed out")]
    Timeout(String),

    /// The connection is already closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),
}
