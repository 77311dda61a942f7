//! `RatraceServer` builder and accept loop.
//!
//! This is the entry point for running the coordinator. It ties the
//! layers together: gateway → protocol → identity/rooms → storage. At
//! startup the room registry is hydrated from the store (retention GC
//! first, then actor re-spawn), so rooms survive a process restart.

use std::collections::HashMap;
use std::sync::Arc;

use ratrace_identity::IdentityRegistry;
use ratrace_protocol::{ConnId, JsonCodec, ServerEvent};
use ratrace_room::{MemberSender, ProfessionCatalog, RoomRegistry};
use ratrace_storage::RoomStore;
use tokio::sync::Mutex;

use crate::gateway::Gateway;
use crate::handler::handle_connection;
use crate::RatraceError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks; interior
/// mutability via `Mutex` where needed. Room mutations go through the
/// registry's handles, so the registry lock is held only for lookups.
pub(crate) struct ServerState<S> {
    pub(crate) identity: Mutex<IdentityRegistry>,
    pub(crate) rooms: Mutex<RoomRegistry<S>>,
    /// Outbound channel of every live connection, for lobby-wide
    /// pushes (room-list updates). Registered on accept, removed on
    /// disconnect.
    pub(crate) connections: Mutex<HashMap<ConnId, MemberSender>>,
    pub(crate) catalog: Arc<dyn ProfessionCatalog>,
    pub(crate) codec: JsonCodec,
}

impl<S: RoomStore> ServerState<S> {
    /// Pushes the current room listing to every live connection.
    pub(crate) async fn broadcast_room_list(&self) {
        let rooms = {
            let identity = self.identity.lock().await;
            let registry = self.rooms.lock().await;
            registry.list_rooms(&identity).await
        };
        let event = ServerEvent::RoomsList { rooms };
        let connections = self.connections.lock().await;
        for sender in connections.values() {
            let _ = sender.send(event.clone());
        }
    }
}

/// Builder for configuring and starting a Ratrace server.
///
/// The builder is deliberately non-generic: the store type is only
/// pinned down by the `build` call, so inference never needs a type
/// annotation.
///
/// # Example
///
/// ```rust,ignore
/// let server = RatraceServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(store, catalog)
///     .await?;
/// server.run().await
/// ```
pub struct RatraceServerBuilder {
    bind_addr: String,
}

impl RatraceServerBuilder {
    pub fn new() -> Self {
        Self { bind_addr: "127.0.0.1:8080".to_string() }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the gateway, hydrates rooms from the store, and returns a
    /// server ready to [`run`](RatraceServer::run).
    pub async fn build<S: RoomStore>(
        self,
        store: Arc<S>,
        catalog: Arc<dyn ProfessionCatalog>,
    ) -> Result<RatraceServer<S>, RatraceError> {
        let gateway = Gateway::bind(&self.bind_addr).await?;

        let mut rooms = RoomRegistry::new(store);
        rooms.hydrate().await?;

        let state = Arc::new(ServerState {
            identity: Mutex::new(IdentityRegistry::new()),
            rooms: Mutex::new(rooms),
            connections: Mutex::new(HashMap::new()),
            catalog,
            codec: JsonCodec,
        });

        Ok(RatraceServer { gateway, state })
    }
}

impl Default for RatraceServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Ratrace coordinator.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RatraceServer<S> {
    gateway: Gateway,
    state: Arc<ServerState<S>>,
}

impl<S: RoomStore> RatraceServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.gateway.local_addr()
    }

    /// Runs the accept loop: each connection gets its own handler task.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), RatraceError> {
        tracing::info!("ratrace coordinator running");

        loop {
            match self.gateway.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
