//! Error types for the mediator layer.

use roomlink_protocol::RoomId;
use roomlink_transport::TransportError;

/// Errors that can occur while binding or running a mediator.
///
/// Only `AllEndpointsExhausted` and `Closed` ever reach a caller of
/// `subscribe`. The others are logged where they happen and folded into
/// the coarse outcome.
#[derive(Debug, thiserror::Error)]
pub enum MediatorError {
    /// One candidate endpoint could not be connected. The next one is tried.
    #[error("endpoint {endpoint} unreachable: {source}")]
    EndpointUnreachable {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    /// Every candidate endpoint failed.
    #[error("could not connect room {room_id}: {attempted} endpoint(s) tried")]
    AllEndpointsExhausted { room_id: RoomId, attempted: usize },

    /// Writing a frame to the room failed; the delivery loop stopped.
    #[error("send to room failed: {0}")]
    SendFailure(#[source] TransportError),

    /// The mediator was unsubscribed and can't be reused.
    #[error("mediator for room {0} is closed")]
    Closed(RoomId),
}
