//! # Ratrace
//!
//! Room and session coordinator for a turn-based economic board game.
//!
//! Clients connect over WebSocket and speak JSON commands; the
//! coordinator routes them to an identity registry and per-room actors
//! that own membership, turn order, break scheduling, and the balance
//! ledger. Persistence is best-effort and fire-and-forget — in-memory
//! state stays authoritative.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ratrace::RatraceServerBuilder;
//! use ratrace_room::StaticCatalog;
//! use ratrace_storage::MemoryStore;
//!
//! # async fn run() -> Result<(), ratrace::RatraceError> {
//! let server = RatraceServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(Arc::new(MemoryStore::new()), Arc::new(StaticCatalog::default()))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod gateway;
mod handler;
mod server;

pub use error::RatraceError;
pub use gateway::{ConnectionSender, Gateway, GatewayConnection, GatewayError};
pub use server::{RatraceServer, RatraceServerBuilder};
