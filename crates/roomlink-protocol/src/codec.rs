//! Frame codec: turning routed messages into text frames and back.
//!
//! The remote room speaks a flat, comma-separated text protocol. Outbound,
//! the tag is stripped (the connection itself already says "this is for
//! the room") and the remaining fields are joined with commas. Inbound, a
//! frame is split on its first two commas only, because the last field is
//! usually a JSON payload that contains commas of its own.
//!
//! The [`FrameCodec`] trait keeps that framing swappable; [`CommaCodec`]
//! is the implementation the room service expects.

use crate::{ProtocolError, RoutedMessage};

/// Converts routed messages to and from text frames.
///
/// - `Send + Sync + 'static` → one codec instance is shared by the
///   mediator and its background tasks.
pub trait FrameCodec: Send + Sync + 'static {
    /// Flattens a room-bound message into the frame written to the socket.
    fn encode_outbound(&self, msg: &RoutedMessage) -> String;

    /// Splits a frame received from the room into a routed message.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidFrame` if the frame is empty.
    fn decode_inbound(&self, frame: &str) -> Result<RoutedMessage, ProtocolError>;
}

/// The comma-joined framing used by the room service.
///
/// ```rust
/// use roomlink_protocol::{CommaCodec, FrameCodec, RoutedMessage};
///
/// let codec = CommaCodec;
/// let msg = RoutedMessage::new(["room", "say", "hello"]).unwrap();
/// assert_eq!(codec.encode_outbound(&msg), "say,hello");
///
/// let inbound = codec.decode_inbound("player,alice,{\"a\":1,\"b\":2}").unwrap();
/// assert_eq!(inbound.fields(), ["player", "alice", "{\"a\":1,\"b\":2}"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CommaCodec;

/// Number of fields an inbound frame is split into: tag, target, payload.
const INBOUND_FIELDS: usize = 3;

impl FrameCodec for CommaCodec {
    fn encode_outbound(&self, msg: &RoutedMessage) -> String {
        msg.body().join(",")
    }

    fn decode_inbound(&self, frame: &str) -> Result<RoutedMessage, ProtocolError> {
        if frame.is_empty() {
            return Err(ProtocolError::InvalidFrame("empty frame".into()));
        }
        RoutedMessage::new(frame.splitn(INBOUND_FIELDS, ','))
    }
}

// ---------------------------------------------------------------------------
// JSON payloads
// ---------------------------------------------------------------------------

#[cfg(feature = "json")]
impl RoutedMessage {
    /// Builds `tag,target,<json>` from a serializable payload.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the payload can't be serialized.
    pub fn with_json<T: serde::Serialize>(
        tag: impl Into<String>,
        target: impl Into<String>,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let json = serde_json::to_string(payload).map_err(ProtocolError::Encode)?;
        Self::new([tag.into(), target.into(), json])
    }

    /// Parses the last field as JSON.
    ///
    /// # Errors
    /// Returns `ProtocolError::MissingPayload` for a single-field message
    /// and `ProtocolError::Decode` if the payload is not valid `T`.
    pub fn payload_json<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, ProtocolError> {
        let payload = match self.body().last() {
            Some(payload) => payload,
            None => return Err(ProtocolError::MissingPayload),
        };
        serde_json::from_str(payload).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_drops_tag_and_joins() {
        let msg = RoutedMessage::new(["room", "say", "hello"]).unwrap();
        assert_eq!(CommaCodec.encode_outbound(&msg), "say,hello");
    }

    #[test]
    fn test_encode_tag_only_is_empty_frame() {
        let msg = RoutedMessage::new(["sos"]).unwrap();
        assert_eq!(CommaCodec.encode_outbound(&msg), "");
    }

    #[test]
    fn test_decode_keeps_commas_in_payload() {
        let msg = CommaCodec
            .decode_inbound(r#"player,alice,{"type":"chat","content":"a,b"}"#)
            .unwrap();
        assert_eq!(msg.tag(), "player");
        assert_eq!(msg.fields().len(), 3);
        assert_eq!(msg.fields()[2], r#"{"type":"chat","content":"a,b"}"#);
    }

    #[test]
    fn test_decode_short_frame() {
        let msg = CommaCodec.decode_inbound("ack").unwrap();
        assert_eq!(msg.fields(), ["ack"]);
    }

    #[test]
    fn test_decode_empty_frame_rejected() {
        let err = CommaCodec.decode_inbound("").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidFrame(_)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_payload_helpers() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Chat {
            content: String,
        }

        let chat = Chat {
            content: "hi, there".into(),
        };
        let msg = RoutedMessage::with_json("room", "r1", &chat).unwrap();
        assert_eq!(msg.fields()[2], r#"{"content":"hi, there"}"#);
        assert_eq!(msg.payload_json::<Chat>().unwrap(), chat);

        // Survives the trip through a frame: the payload comma is kept.
        let frame = format!("player,alice,{}", msg.fields()[2]);
        let back = CommaCodec.decode_inbound(&frame).unwrap();
        assert_eq!(back.payload_json::<Chat>().unwrap(), chat);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_payload_json_errors() {
        let tag_only = RoutedMessage::new(["player"]).unwrap();
        assert!(matches!(
            tag_only.payload_json::<serde_json::Value>(),
            Err(ProtocolError::MissingPayload)
        ));

        let not_json = RoutedMessage::new(["player", "alice", "oops"]).unwrap();
        let err = not_json.payload_json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        let source = std::error::Error::source(&err)
            .expect("decode error should keep the serde_json cause");
        assert!(source.is::<serde_json::Error>());
    }
}
