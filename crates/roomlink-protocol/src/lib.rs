//! Wire protocol for roomlink.
//!
//! This crate defines what travels between the mediator and a remote room:
//!
//! - **Types** ([`RoutedMessage`], [`RoomId`]): the tagged field tuple
//!   every layer routes on.
//! - **Codec** ([`FrameCodec`] trait, [`CommaCodec`]): how messages are
//!   flattened into text frames and split back apart.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (text frames) → Protocol (RoutedMessage) → Mediator (routing)
//! ```
//!
//! # Feature Flags
//!
//! - `json` (default): typed JSON payload helpers via `serde_json`

mod codec;
mod error;
mod types;

pub use codec::{CommaCodec, FrameCodec};
pub use error::ProtocolError;
pub use types::{PLAYER_TAG, ROOM_TAG, RoomId, RoutedMessage};
