//! Error types for the room layer.

use ratrace_protocol::{RoomId, RoomStatus};

/// Errors that can occur during room operations.
///
/// These map onto the request-scoped rejections the orchestrator sends
/// back to a client: validation, authorization, not-found, capacity, and
/// funds failures. Duplicate ledger transactions are deliberately NOT an
/// error — replays are success-shaped no-ops.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Malformed input: bad room size or duration, empty name,
    /// non-positive or non-unit amounts.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// No member matches the given id, name, or connection.
    #[error("member {0:?} not found in room")]
    MemberNotFound(String),

    /// The room has no free slots.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The join password didn't match.
    #[error("wrong room password")]
    WrongPassword,

    /// A host-only operation was attempted by a non-host actor.
    #[error("only the host may perform this operation")]
    NotHost,

    /// A turn advance was requested by someone who is neither the
    /// current-turn member nor the host.
    #[error("not your turn")]
    NotYourTurn,

    /// The requested turn index is out of range or equals the current one.
    #[error("invalid turn target {target} (members: {len})")]
    InvalidTurnTarget { target: usize, len: usize },

    /// The sender cannot cover the transfer.
    #[error("insufficient funds: balance {balance}, requested {amount}")]
    InsufficientFunds { balance: i64, amount: i64 },

    /// A credit payment exceeds the outstanding amount for that type.
    #[error("payment exceeds outstanding credit: owed {outstanding}, paid {amount}")]
    CreditExceeded { outstanding: i64, amount: i64 },

    /// Game start requires at least two ready members.
    #[error("not enough ready players: {ready}")]
    NotEnoughReady { ready: usize },

    /// The operation is not valid in the room's current status.
    #[error("room is {actual}, operation requires {required}")]
    WrongStatus {
        required: RoomStatus,
        actual: RoomStatus,
    },

    /// The room's command channel is closed or full.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}
