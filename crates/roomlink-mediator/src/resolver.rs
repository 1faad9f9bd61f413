//! Endpoint resolution: first reachable candidate wins.
//!
//! Candidate endpoints are interchangeable instances of the same room, so
//! any one of them will do. They are tried strictly in list order and the
//! walk stops at the first successful handshake. Individual failures are
//! logged and swallowed; only running out of candidates is an error.

use std::time::Duration;

use roomlink_protocol::RoomId;
use roomlink_transport::{ConnectionEvents, Connector, TransportError};

use crate::MediatorError;

/// A successful connect: the live connection, its event stream, and which
/// candidate produced it.
pub(crate) struct Resolved<K> {
    pub(crate) connection: K,
    pub(crate) events: ConnectionEvents,
    pub(crate) endpoint: String,
}

/// Walks `endpoints` in order and returns the first live connection.
pub(crate) async fn resolve<C: Connector>(
    room_id: &RoomId,
    connector: &C,
    endpoints: &[String],
    connect_timeout: Option<Duration>,
) -> Result<Resolved<C::Connection>, MediatorError> {
    tracing::debug!(
        %room_id,
        candidates = endpoints.len(),
        "creating connection to room"
    );

    for endpoint in endpoints {
        match attempt(connector, endpoint, connect_timeout).await {
            Ok((connection, events)) => {
                tracing::info!(%room_id, endpoint = %endpoint, "connected to room");
                return Ok(Resolved {
                    connection,
                    events,
                    endpoint: endpoint.clone(),
                });
            }
            Err(source) => {
                let err = MediatorError::EndpointUnreachable {
                    endpoint: endpoint.clone(),
                    source,
                };
                tracing::debug!(%room_id, error = %err, "trying next endpoint");
            }
        }
    }

    Err(MediatorError::AllEndpointsExhausted {
        room_id: room_id.clone(),
        attempted: endpoints.len(),
    })
}

async fn attempt<C: Connector>(
    connector: &C,
    endpoint: &str,
    connect_timeout: Option<Duration>,
) -> Result<(C::Connection, ConnectionEvents), TransportError> {
    match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, connector.connect(endpoint))
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(endpoint.to_string()))),
        None => connector.connect(endpoint).await,
    }
}
