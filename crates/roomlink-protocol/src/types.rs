//! Core protocol types: room identity and the routed message tuple.
//!
//! A routed message is the unit every layer above the transport deals in.
//! It is an ordered list of string fields whose first field is a *tag*
//! saying which way the message travels:
//!
//! ```text
//! player,<player id>,<payload>   → for the local client
//! room,<room id>,<payload>       → for the remote room
//! ```

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

/// Tag prefix marking a message for the player's client.
pub const PLAYER_TAG: &str = "player";

/// Tag marking a message for the remote room.
pub const ROOM_TAG: &str = "room";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a remote room.
///
/// Rooms are named by the directory service that hands out their
/// endpoints, so the id is an opaque string rather than a number.
/// `#[serde(transparent)]` serializes it as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// RoutedMessage
// ---------------------------------------------------------------------------

/// A tagged tuple of string fields.
///
/// The constructor guarantees the tuple is never empty, so
/// [`tag`](Self::tag) can't fail. Once built, a message is immutable;
/// routing either hands it to the player whole or re-encodes the fields
/// after the tag for the room.
///
/// `#[serde(try_from = "Vec<String>")]` keeps the non-empty guarantee when
/// a message is deserialized: serde goes through `TryFrom`, which rejects
/// an empty array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RoutedMessage {
    fields: Vec<String>,
}

impl RoutedMessage {
    /// Builds a message from its fields.
    ///
    /// # Errors
    /// Returns [`ProtocolError::EmptyMessage`] when `fields` is empty.
    pub fn new<I, S>(fields: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        Ok(Self { fields })
    }

    /// A `room,<room id>,<payload>` message.
    pub fn to_room(room_id: &RoomId, payload: impl Into<String>) -> Self {
        Self {
            fields: vec![
                ROOM_TAG.to_string(),
                room_id.0.clone(),
                payload.into(),
            ],
        }
    }

    /// A `player,<player id>,<payload>` message.
    pub fn to_player(
        player_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            fields: vec![
                PLAYER_TAG.to_string(),
                player_id.into(),
                payload.into(),
            ],
        }
    }

    /// The first field.
    pub fn tag(&self) -> &str {
        &self.fields[0]
    }

    /// All fields, tag included.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Fields after the tag.
    pub fn body(&self) -> &[String] {
        &self.fields[1..]
    }

    /// Returns `true` if the tag marks the message for the player's client.
    ///
    /// Matching is by prefix, so sub-tags such as `playerLocation` also
    /// go to the client.
    pub fn is_for_player(&self) -> bool {
        self.tag().starts_with(PLAYER_TAG)
    }

    /// Consumes the message, returning its fields.
    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }
}

impl TryFrom<Vec<String>> for RoutedMessage {
    type Error = ProtocolError;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<RoutedMessage> for Vec<String> {
    fn from(msg: RoutedMessage) -> Self {
        msg.fields
    }
}

impl fmt::Display for RoutedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fields.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_display_and_from() {
        let id = RoomId::from("firstroom");
        assert_eq!(id.to_string(), "firstroom");
        assert_eq!(id.as_str(), "firstroom");
        assert_eq!(id, RoomId::new(String::from("firstroom")));
    }

    #[test]
    fn test_room_id_serializes_as_bare_string() {
        let json = serde_json::to_string(&RoomId::new("r1")).unwrap();
        assert_eq!(json, "\"r1\"");
    }

    #[test]
    fn test_empty_message_rejected() {
        let err = RoutedMessage::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyMessage));
    }

    #[test]
    fn test_tag_and_body() {
        let msg = RoutedMessage::new(["room", "say", "hello"]).unwrap();
        assert_eq!(msg.tag(), "room");
        assert_eq!(msg.body(), ["say", "hello"]);
        assert!(!msg.is_for_player());
    }

    #[test]
    fn test_player_tag_matches_by_prefix() {
        assert!(RoutedMessage::new(["player"]).unwrap().is_for_player());
        assert!(
            RoutedMessage::new(["playerLocation", "a", "{}"])
                .unwrap()
                .is_for_player()
        );
        assert!(!RoutedMessage::new(["sos"]).unwrap().is_for_player());
    }

    #[test]
    fn test_constructors() {
        let room = RoomId::new("r1");
        assert_eq!(
            RoutedMessage::to_room(&room, "{}").fields(),
            ["room", "r1", "{}"]
        );
        assert_eq!(
            RoutedMessage::to_player("alice", "{}").fields(),
            ["player", "alice", "{}"]
        );
    }

    #[test]
    fn test_deserialize_rejects_empty_array() {
        let ok: RoutedMessage =
            serde_json::from_str(r#"["player","alice","{}"]"#).unwrap();
        assert_eq!(ok.tag(), "player");
        assert!(serde_json::from_str::<RoutedMessage>("[]").is_err());
    }
}
