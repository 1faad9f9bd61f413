//! The remote room mediator: one player's binding to one remote room.
//!
//! A mediator hides three things from the player side:
//!
//! 1. **Where** the room lives: it walks a list of candidate endpoints and
//!    keeps the first one that answers.
//! 2. **When** outbound messages actually leave: `route` only enqueues, and
//!    a dedicated writer task drains the queue in order.
//! 3. **How** the connection died: a normal close is ignored, anything else
//!    is handed to the player as a request to find a new binding.
//!
//! All mutable state lives in `Shared`, which the writer task and the
//! inbound event task hold through an `Arc`. `subscribe` and `unsubscribe`
//! are serialized by an async lifecycle lock; `route` and
//! `connection_closed` never wait on it.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::FutureExt;
use roomlink_protocol::{CommaCodec, FrameCodec, RoomId, RoutedMessage};
use roomlink_transport::{
    CloseReason, Connection, ConnectionEvent, ConnectionEvents, ConnectionId,
    Connector,
};

use crate::delivery::{DeliveryControl, DeliveryOutcome, run_delivery};
use crate::resolver::resolve;
use crate::{
    MediatorConfig, MediatorError, MediatorState, OutboundQueue, PlayerSession,
    TaskSpawner, TokioSpawner,
};

// ---------------------------------------------------------------------------
// RoomMediator
// ---------------------------------------------------------------------------

/// The operations a hosting layer performs on a room binding.
///
/// The trait is the seam between player-side code and whatever actually
/// hosts the room. [`RemoteRoomMediator`] is the implementation for rooms
/// reached over the network.
pub trait RoomMediator: Send + Sync + 'static {
    /// Stable room identity.
    fn id(&self) -> &RoomId;

    /// Routes one message: to the player if its tag says so, otherwise
    /// onto the outbound queue for the room. Never blocks.
    fn route(&self, message: RoutedMessage);

    /// Binds `player` and connects. Returns `false` if no endpoint could
    /// be reached or the mediator is already closed.
    ///
    /// `last_delivered_sequence` is the last sequence number the player
    /// saw. It is recorded for the player layer and not interpreted.
    fn subscribe(
        &self,
        player: Arc<dyn PlayerSession>,
        last_delivered_sequence: u64,
    ) -> impl Future<Output = bool> + Send;

    /// Tears the binding down. Safe to call more than once.
    fn unsubscribe(
        &self,
        player: &Arc<dyn PlayerSession>,
    ) -> impl Future<Output = ()> + Send;

    /// Reports that the room connection ended.
    fn connection_closed(&self, reason: &CloseReason);
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State reachable from the caller, the writer task and the event task.
struct Shared<K> {
    room_id: RoomId,
    codec: Arc<dyn FrameCodec>,
    queue: OutboundQueue,
    delivery: Arc<DeliveryControl>,
    queue_warn_depth: Option<usize>,
    player: RwLock<Option<Arc<dyn PlayerSession>>>,
    connection: Mutex<Option<Arc<K>>>,
    state: Mutex<MediatorState>,
}

/// Locks a std mutex, recovering from poisoning. Every critical section
/// here is a single assignment or clone, so the data is always consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K: Connection> Shared<K> {
    fn state(&self) -> MediatorState {
        *lock(&self.state)
    }

    fn set_state(&self, state: MediatorState) {
        *lock(&self.state) = state;
    }

    fn player(&self) -> Option<Arc<dyn PlayerSession>> {
        self.player
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps the bound player, returning the previous one.
    fn bind_player(
        &self,
        player: Option<Arc<dyn PlayerSession>>,
    ) -> Option<Arc<dyn PlayerSession>> {
        let mut slot =
            self.player.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, player)
    }

    fn current_connection(&self) -> Option<Arc<K>> {
        lock(&self.connection).clone()
    }

    fn replace_connection(&self, conn: Option<Arc<K>>) -> Option<Arc<K>> {
        std::mem::replace(&mut *lock(&self.connection), conn)
    }

    fn route(&self, message: RoutedMessage) {
        if message.is_for_player() {
            self.deliver_to_player(&message);
            return;
        }

        if self.state().is_closed() {
            tracing::debug!(
                room_id = %self.room_id,
                "mediator closed, dropping message for room"
            );
            return;
        }

        let frame = self.codec.encode_outbound(&message);
        let depth = self.queue.push_back(frame);
        if let Some(limit) = self.queue_warn_depth {
            if limit > 0 && depth % limit == 0 {
                tracing::warn!(
                    room_id = %self.room_id,
                    depth,
                    "outbound queue is backing up"
                );
            }
        }
    }

    fn deliver_to_player(&self, message: &RoutedMessage) {
        match self.player() {
            Some(player) => player.send_to_client(message),
            None => tracing::debug!(
                room_id = %self.room_id,
                tag = message.tag(),
                "no player bound, dropping message for client"
            ),
        }
    }

    fn connection_closed(&self, reason: &CloseReason) {
        tracing::debug!(
            room_id = %self.room_id,
            %reason,
            "room connection closed"
        );

        if reason.is_normal() {
            return;
        }

        match self.player() {
            Some(player) => {
                tracing::warn!(
                    room_id = %self.room_id,
                    %reason,
                    "room connection lost, asking player to reconnect"
                );
                player.reconnect_to_room();
            }
            None => tracing::debug!(
                room_id = %self.room_id,
                "room connection lost with no player bound"
            ),
        }
    }

    /// Close events from a connection that has since been replaced or
    /// released are stale and dropped.
    fn on_connection_closed(
        &self,
        conn_id: ConnectionId,
        reason: &CloseReason,
    ) {
        let current = self.current_connection().map(|conn| conn.id());
        if current == Some(conn_id) {
            self.connection_closed(reason);
        } else {
            tracing::debug!(
                room_id = %self.room_id,
                %conn_id,
                %reason,
                "ignoring close of a superseded connection"
            );
        }
    }
}

/// Feeds one connection's inbound events into the mediator until it closes.
async fn pump_events<K: Connection>(
    shared: Arc<Shared<K>>,
    conn_id: ConnectionId,
    mut events: ConnectionEvents,
) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Text(frame) => {
                match shared.codec.decode_inbound(&frame) {
                    Ok(message) => shared.deliver_to_player(&message),
                    Err(e) => tracing::debug!(
                        room_id = %shared.room_id,
                        %conn_id,
                        error = %e,
                        "dropping undecodable frame from room"
                    ),
                }
            }
            ConnectionEvent::Closed(reason) => {
                shared.on_connection_closed(conn_id, &reason);
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteRoomMediator
// ---------------------------------------------------------------------------

/// A [`RoomMediator`] for a room reached through a [`Connector`].
pub struct RemoteRoomMediator<C: Connector> {
    endpoints: Vec<String>,
    connector: C,
    spawner: Arc<dyn TaskSpawner>,
    config: MediatorConfig,
    shared: Arc<Shared<C::Connection>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl<C: Connector> RemoteRoomMediator<C> {
    /// Creates an unbound mediator.
    ///
    /// `endpoints` are tried in order on every connect.
    pub fn new(
        room_id: impl Into<RoomId>,
        endpoints: Vec<String>,
        connector: C,
        spawner: Arc<dyn TaskSpawner>,
        codec: Arc<dyn FrameCodec>,
        config: MediatorConfig,
    ) -> Self {
        let shared = Shared {
            room_id: room_id.into(),
            codec,
            queue: OutboundQueue::new(),
            delivery: Arc::new(DeliveryControl::default()),
            queue_warn_depth: config.queue_warn_depth,
            player: RwLock::new(None),
            connection: Mutex::new(None),
            state: Mutex::new(MediatorState::Unbound),
        };
        Self {
            endpoints,
            connector,
            spawner,
            config,
            shared: Arc::new(shared),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a mediator with the comma codec, the ambient Tokio runtime
    /// and default config.
    pub fn with_defaults(
        room_id: impl Into<RoomId>,
        endpoints: Vec<String>,
        connector: C,
    ) -> Self {
        Self::new(
            room_id,
            endpoints,
            connector,
            Arc::new(TokioSpawner::new()),
            Arc::new(CommaCodec),
            MediatorConfig::default(),
        )
    }

    /// The candidate endpoints, in the order they are tried.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The config this mediator was built with.
    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MediatorState {
        self.shared.state()
    }

    /// Number of frames waiting for the room.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Returns `true` while a writer task is draining the queue.
    pub fn is_delivering(&self) -> bool {
        self.shared.delivery.is_running()
    }

    /// Returns `true` if a player is currently bound.
    pub fn has_player(&self) -> bool {
        self.shared.player().is_some()
    }

    /// Like [`RoomMediator::subscribe`], but says why it failed.
    pub async fn try_subscribe(
        &self,
        player: Arc<dyn PlayerSession>,
        last_delivered_sequence: u64,
    ) -> Result<(), MediatorError> {
        let _lifecycle = self.lifecycle.lock().await;
        let room_id = &self.shared.room_id;

        let state = self.shared.state();
        if !state.can_subscribe() {
            tracing::debug!(%room_id, %state, "refusing subscribe");
            return Err(MediatorError::Closed(room_id.clone()));
        }

        tracing::debug!(
            %room_id,
            last_delivered_sequence,
            "player subscribing"
        );
        self.shared.bind_player(Some(player));
        self.shared.set_state(MediatorState::Connecting);

        let (conn, fresh) = match self.connect().await {
            Ok(connected) => connected,
            Err(e) => {
                self.shared.set_state(MediatorState::Unbound);
                tracing::info!(%room_id, error = %e, "could not join room");
                return Err(e);
            }
        };

        self.start_delivery(conn, fresh).await;
        self.shared.set_state(MediatorState::Active);
        tracing::info!(%room_id, "subscribed to room");
        Ok(())
    }

    /// Returns the live connection, opening one if needed. The flag is
    /// `true` when a new connection was opened.
    async fn connect(
        &self,
    ) -> Result<(Arc<C::Connection>, bool), MediatorError> {
        let room_id = &self.shared.room_id;

        if let Some(conn) = self.shared.current_connection() {
            if conn.is_open() {
                return Ok((conn, false));
            }
            // Dead handle from an earlier cycle: release it before dialing.
            self.shared.replace_connection(None);
            if let Err(e) = conn.close().await {
                tracing::debug!(
                    %room_id,
                    error = %e,
                    "closing stale connection failed"
                );
            }
        }

        let resolved = resolve(
            room_id,
            &self.connector,
            &self.endpoints,
            self.config.connect_timeout,
        )
        .await?;

        let conn = Arc::new(resolved.connection);
        let conn_id = conn.id();
        self.shared.replace_connection(Some(Arc::clone(&conn)));
        tracing::debug!(
            %room_id,
            %conn_id,
            endpoint = %resolved.endpoint,
            "bound connection"
        );

        self.spawner.spawn(
            format!("room-events-{room_id}"),
            pump_events(Arc::clone(&self.shared), conn_id, resolved.events)
                .boxed(),
        );

        Ok((conn, true))
    }

    /// Starts the writer for `conn`. A writer still attached to an older
    /// connection is retired first, and the new one only starts once the
    /// old one has put back whatever it was sending.
    async fn start_delivery(&self, conn: Arc<C::Connection>, fresh: bool) {
        let room_id = self.shared.room_id.clone();

        if fresh {
            self.shared.delivery.stop();
        }

        let Some(lease) = self.shared.delivery.start().await else {
            tracing::debug!(%room_id, "room writer already running");
            return;
        };

        let shared = Arc::clone(&self.shared);
        let send_timeout = self.config.send_timeout;
        self.spawner.spawn(
            format!("room-writer-{room_id}"),
            async move {
                let outcome = run_delivery(
                    room_id,
                    lease,
                    &shared.queue,
                    conn,
                    send_timeout,
                )
                .await;
                if let DeliveryOutcome::SendFailed(e) = outcome {
                    tracing::info!(
                        room_id = %shared.room_id,
                        error = %e,
                        queued = shared.queue.len(),
                        "room writer ended; frames held for the next subscribe"
                    );
                }
            }
            .boxed(),
        );
    }
}

impl<C: Connector> RoomMediator for RemoteRoomMediator<C> {
    fn id(&self) -> &RoomId {
        &self.shared.room_id
    }

    fn route(&self, message: RoutedMessage) {
        self.shared.route(message);
    }

    async fn subscribe(
        &self,
        player: Arc<dyn PlayerSession>,
        last_delivered_sequence: u64,
    ) -> bool {
        self.try_subscribe(player, last_delivered_sequence).await.is_ok()
    }

    async fn unsubscribe(&self, player: &Arc<dyn PlayerSession>) {
        let _lifecycle = self.lifecycle.lock().await;
        let room_id = &self.shared.room_id;

        if self.shared.state().is_closed() {
            tracing::debug!(%room_id, "already unsubscribed");
            return;
        }
        // Closed first, so concurrent routes stop enqueueing.
        self.shared.set_state(MediatorState::Closed);

        if let Some(bound) = self.shared.bind_player(None) {
            if !Arc::ptr_eq(&bound, player) {
                tracing::debug!(
                    %room_id,
                    "unsubscribe from a different player than the bound one"
                );
            }
        }

        // The writer requeues a frame it was sending when stopped, so
        // clear only after it is gone.
        self.shared.delivery.stop();
        self.shared.delivery.wait_idle().await;
        let dropped = self.shared.queue.clear();

        if let Some(conn) = self.shared.replace_connection(None) {
            if let Err(e) = conn.close().await {
                tracing::debug!(
                    %room_id,
                    error = %e,
                    "error closing room connection"
                );
            }
        }

        tracing::info!(%room_id, dropped, "unsubscribed from room");
    }

    fn connection_closed(&self, reason: &CloseReason) {
        self.shared.connection_closed(reason);
    }
}

impl<C: Connector> fmt::Display for RemoteRoomMediator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteRoomMediator[roomId={}]", self.shared.room_id)
    }
}

impl<C: Connector> fmt::Debug for RemoteRoomMediator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRoomMediator")
            .field("room_id", &self.shared.room_id)
            .field("endpoints", &self.endpoints)
            .field("state", &self.shared.state())
            .field("queued", &self.shared.queue.len())
            .finish()
    }
}
