//! Unified error type for roomlink.

use roomlink_mediator::MediatorError;
use roomlink_protocol::ProtocolError;
use roomlink_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// Code using the `roomlink` facade can return this one type and let `?`
/// convert the layer errors.
#[derive(Debug, thiserror::Error)]
pub enum RoomlinkError {
    /// Connecting, sending or closing failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame or message was malformed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Binding to the room failed.
    #[error(transparent)]
    Mediator(#[from] MediatorError),
}

#[cfg(test)]
mod tests {
    use roomlink_protocol::RoomId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: RoomlinkError = err.into();
        assert!(matches!(err, RoomlinkError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: RoomlinkError = ProtocolError::EmptyMessage.into();
        assert!(matches!(err, RoomlinkError::Protocol(_)));
    }

    #[test]
    fn test_from_mediator_error() {
        let err = MediatorError::AllEndpointsExhausted {
            room_id: RoomId::new("lobby"),
            attempted: 3,
        };
        let err: RoomlinkError = err.into();
        assert!(matches!(err, RoomlinkError::Mediator(_)));
        assert!(err.to_string().contains("lobby"));
    }

    #[test]
    fn test_question_mark_converts() {
        fn join() -> Result<(), RoomlinkError> {
            Err(MediatorError::Closed(RoomId::new("r")))?;
            Ok(())
        }
        assert!(matches!(join(), Err(RoomlinkError::Mediator(_))));
    }
}
