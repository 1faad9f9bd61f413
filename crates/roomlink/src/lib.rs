//! # Roomlink
//!
//! Binds player sessions to remote game rooms.
//!
//! A room may be served from several interchangeable endpoints. Roomlink
//! connects to the first one that answers, sends the player's room-bound
//! messages over it in order, hands room replies back to the player, and
//! asks the player to reconnect when the connection drops abnormally.
//!
//! The work is split across layers, each its own crate:
//!
//! ```text
//! roomlink-transport  (Connector, WebSocket)
//!         ↓
//! roomlink-protocol   (RoutedMessage, FrameCodec)
//!         ↓
//! roomlink-mediator   (RemoteRoomMediator)
//! ```
//!
//! This crate re-exports them and adds [`MediatorBuilder`],
//! [`RoomlinkError`] and [`init_tracing`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use roomlink::prelude::*;
//!
//! struct Player;
//!
//! impl PlayerSession for Player {
//!     fn send_to_client(&self, message: &RoutedMessage) {
//!         println!("to client: {message}");
//!     }
//!
//!     fn reconnect_to_room(&self) {
//!         println!("room lost");
//!     }
//! }
//!
//! # async fn run() {
//! init_tracing();
//! let room = MediatorBuilder::new("firstroom")
//!     .endpoint("ws://localhost:9080/room")
//!     .build_websocket();
//!
//! let player: Arc<dyn PlayerSession> = Arc::new(Player);
//! if room.subscribe(Arc::clone(&player), 0).await {
//!     let hello = RoutedMessage::to_room(room.id(), "hello");
//!     room.route(hello);
//! }
//! room.unsubscribe(&player).await;
//! # }
//! ```

mod builder;
mod error;
mod telemetry;

pub use builder::MediatorBuilder;
pub use error::RoomlinkError;
pub use telemetry::init_tracing;

pub use roomlink_mediator as mediator;
pub use roomlink_protocol as protocol;
pub use roomlink_transport as transport;

/// Commonly used types, importable with `use roomlink::prelude::*`.
pub mod prelude {
    pub use crate::{MediatorBuilder, RoomlinkError, init_tracing};
    pub use roomlink_mediator::{
        MediatorConfig, MediatorState, PlayerSession, RemoteRoomMediator,
        RoomMediator, TaskSpawner, TokioSpawner,
    };
    pub use roomlink_protocol::{
        CommaCodec, FrameCodec, RoomId, RoutedMessage,
    };
    pub use roomlink_transport::{
        CloseCode, CloseReason, Connection, Connector, WebSocketConnector,
    };
}
