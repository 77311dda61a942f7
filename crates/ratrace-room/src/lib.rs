//! Room coordination for Ratrace.
//!
//! Each room runs as an isolated Tokio task (actor model) owning its
//! membership roster, turn order, break scheduler, and ledger. The
//! registry tracks live rooms, hydrates them from the store at startup,
//! and builds the lobby listing.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — creates, hydrates, lists, and shuts down rooms
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`Room`] — the pure room state machine (membership, turns, ledger)
//! - [`BreakScheduler`] — server-owned recurring break cycle
//! - [`ProfessionCatalog`] — resolves profession ids at ready-up

mod actor;
mod breaks;
mod catalog;
mod error;
mod ledger;
mod member;
mod registry;
mod room;
mod turn;

pub use actor::{now_ms, MemberSender, RoomHandle};
pub use breaks::{BreakEvent, BreakPhase, BreakScheduler, BREAK_DURATION, BREAK_INTERVAL};
pub use catalog::{ProfessionCatalog, StaticCatalog};
pub use error::RoomError;
pub use ledger::{TransferOutcome, CREDIT_UNIT};
pub use member::Member;
pub use registry::{RoomRegistry, ROOM_RETENTION_MS};
pub use room::{DisconnectNotice, JoinKind, Room, RoomOptions};
pub use turn::{TurnState, ENDING_SOON_SECONDS, TURN_SECONDS};
