//! `MediatorBuilder`: assembles a [`RemoteRoomMediator`] from its parts.

use std::sync::Arc;

use roomlink_mediator::{
    MediatorConfig, RemoteRoomMediator, TaskSpawner, TokioSpawner,
};
use roomlink_protocol::{CommaCodec, FrameCodec, RoomId};
use roomlink_transport::{Connector, WebSocketConnector};

/// Builder for a room mediator.
///
/// Only the room id is required. Everything else has a default: no
/// endpoints, the ambient Tokio runtime, the comma codec and
/// [`MediatorConfig::default`].
///
/// # Example
///
/// ```rust,no_run
/// use roomlink::prelude::*;
///
/// let mediator = MediatorBuilder::new("firstroom")
///     .endpoint("ws://rooms-a.example:9080/room")
///     .endpoint("ws://rooms-b.example:9080/room")
///     .build_websocket();
/// assert_eq!(mediator.endpoints().len(), 2);
/// ```
pub struct MediatorBuilder {
    room_id: RoomId,
    endpoints: Vec<String>,
    config: MediatorConfig,
    spawner: Arc<dyn TaskSpawner>,
    codec: Arc<dyn FrameCodec>,
}

impl MediatorBuilder {
    /// Starts a builder for `room_id`.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            endpoints: Vec::new(),
            config: MediatorConfig::default(),
            spawner: Arc::new(TokioSpawner::new()),
            codec: Arc::new(CommaCodec),
        }
    }

    /// Appends one candidate endpoint. Candidates are tried in the order
    /// they were added.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(url.into());
        self
    }

    /// Appends several candidate endpoints.
    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Sets timeouts and the queue warning threshold.
    pub fn config(mut self, config: MediatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets where background tasks run.
    pub fn spawner(mut self, spawner: impl TaskSpawner) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Sets the frame codec.
    pub fn codec(mut self, codec: impl FrameCodec) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Builds a mediator that connects through `connector`.
    pub fn build<C: Connector>(self, connector: C) -> RemoteRoomMediator<C> {
        if self.endpoints.is_empty() {
            tracing::warn!(
                room_id = %self.room_id,
                "building room mediator with no endpoints"
            );
        }
        RemoteRoomMediator::new(
            self.room_id,
            self.endpoints,
            connector,
            self.spawner,
            self.codec,
            self.config,
        )
    }

    /// Builds a mediator that connects over WebSocket.
    pub fn build_websocket(self) -> RemoteRoomMediator<WebSocketConnector> {
        self.build(WebSocketConnector::new())
    }
}
