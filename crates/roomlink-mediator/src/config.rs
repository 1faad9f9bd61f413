//! Mediator configuration and state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MediatorConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for a mediator.
///
/// The defaults match the plain contract: no timeouts and an unbounded
/// outbound queue. Hosts that need tighter behavior can set timeouts here
/// without changing any call sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Upper bound on each per-endpoint handshake. `None` waits as long
    /// as the transport does.
    pub connect_timeout: Option<Duration>,

    /// Upper bound on a single frame write. A write that exceeds it is
    /// handled exactly like a failed send.
    pub send_timeout: Option<Duration>,

    /// Queue depth at which a warning is logged. The queue is never
    /// capped; this only makes a stalled room visible.
    pub queue_warn_depth: Option<usize>,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            send_timeout: None,
            queue_warn_depth: Some(1024),
        }
    }
}

// ---------------------------------------------------------------------------
// MediatorState
// ---------------------------------------------------------------------------

/// The lifecycle state of a mediator.
///
/// ```text
/// Unbound → Connecting → Active → Closed
///    ↑           │          │
///    └─(failed)──┘          └─(re-subscribe)→ Connecting
/// ```
///
/// - **Unbound**: constructed, no live connection.
/// - **Connecting**: inside `subscribe`, walking the endpoint list.
/// - **Active**: connected, delivery loop started, player bound.
/// - **Closed**: torn down by `unsubscribe`. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediatorState {
    Unbound,
    Connecting,
    Active,
    Closed,
}

impl MediatorState {
    /// Returns `true` once the mediator has been torn down.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` if a `subscribe` may run from this state.
    pub fn can_subscribe(&self) -> bool {
        matches!(self, Self::Unbound | Self::Active)
    }
}

impl std::fmt::Display for MediatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbound => write!(f, "Unbound"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
