//! Per-room connection mediation for roomlink.
//!
//! A [`RemoteRoomMediator`] binds one player session to one remote room.
//! It picks a live endpoint from an ordered candidate list, routes tagged
//! messages either to the player or onto an ordered outbound queue, drains
//! that queue from a dedicated writer task, and turns an abnormal
//! connection close into a reconnect request for the player.
//!
//! # Key types
//!
//! - [`RoomMediator`]: the operations the player layer calls
//! - [`RemoteRoomMediator`]: the network-backed implementation
//! - [`PlayerSession`]: what the mediator calls back on the player side
//! - [`TaskSpawner`]: how background tasks get started
//! - [`OutboundQueue`]: the FIFO between routing and the writer task
//! - [`MediatorState`]: lifecycle state machine
//! - [`MediatorConfig`]: timeouts and queue warning threshold

mod config;
mod delivery;
mod error;
mod mediator;
mod player;
mod queue;
mod resolver;
mod spawner;

pub use config::{MediatorConfig, MediatorState};
pub use error::MediatorError;
pub use mediator::{RemoteRoomMediator, RoomMediator};
pub use player::PlayerSession;
pub use queue::OutboundQueue;
pub use spawner::{TaskSpawner, TokioSpawner};
