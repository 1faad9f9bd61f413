//! The `PlayerSession` trait: what a mediator needs from the player side.
//!
//! The player's connection object lives outside this crate. A mediator only
//! ever does two things to it: hand it messages meant for the client, and
//! tell it the room went away abnormally so it can find a new binding.

use roomlink_protocol::RoutedMessage;

/// The player-side collaborator bound to a mediator by `subscribe`.
///
/// Both methods are called synchronously from routing paths and from the
/// mediator's inbound event task, so they must not block. Implementations
/// typically push onto an unbounded channel owned by the player's own
/// writer task.
pub trait PlayerSession: Send + Sync + 'static {
    /// Delivers a message to the player's client, tag included.
    fn send_to_client(&self, message: &RoutedMessage);

    /// Asks the player side to re-establish a room binding.
    ///
    /// Called at most once per abnormal close. The mediator that calls it
    /// is spent; the player is expected to build a new one (possibly
    /// against different endpoints).
    fn reconnect_to_room(&self);
}
