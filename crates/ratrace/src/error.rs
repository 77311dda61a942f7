//! Unified error type for the Ratrace coordinator.

use ratrace_identity::IdentityError;
use ratrace_protocol::ProtocolError;
use ratrace_room::RoomError;
use ratrace_storage::StorageError;

use crate::gateway::GatewayError;

/// Top-level error that wraps all layer-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RatraceError {
    /// A gateway-level error (accept, send, recv).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An identity-level error (registration, login).
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A room-level error (full, not found, not host, funds).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A storage-level error (startup GC, hydration).
    #[error(transparent)]
    Storage(#[from] StorageError),
}
