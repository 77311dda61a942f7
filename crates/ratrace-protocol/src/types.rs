//! Core protocol types for Ratrace's wire format.
//!
//! Everything a client and the coordinator exchange is defined here:
//! identity newtypes, the inbound [`ClientCommand`] set, the outbound
//! [`ServerEvent`] set, and the snapshot structures that double as the
//! persisted representation handed to the storage layer.
//!
//! Message and field names follow the observed wire protocol (camelCase),
//! so the JSON on the wire looks like
//! `{ "type": "joinRoom", "roomId": "…", "accountId": "…" }`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The stable, durable identifier of an account.
///
/// Distinct from [`ConnId`]: a player keeps the same `AccountId` across
/// reconnects while their transport id changes with every connection.
/// Newtype over a generated hex string; `#[serde(transparent)]` keeps it
/// a plain JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

/// A unique identifier for a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// The transient identifier of one transport connection.
///
/// Assigned by the gateway when a socket is accepted and never reused
/// within a process. A member's `ConnId` is refreshed on every
/// reconnect; while disconnected they have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Room settings
// ---------------------------------------------------------------------------

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Lobby phase: members join and ready up.
    Waiting,
    /// Game in progress: turn and break schedulers are live.
    Playing,
    /// Game over. The room lingers until retention GC removes it.
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// How professions are assigned when the game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfessionMode {
    /// Each member plays the profession they picked at ready-up.
    Individual,
    /// Every member plays the room's shared profession payload.
    Shared,
}

/// A profession: the starting financial position dealt to a member.
///
/// The full profession table is static game content owned by an external
/// catalogue; the coordinator only ever sees this distilled shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profession {
    pub id: u32,
    pub name: String,
    /// Starting balance in integer currency units.
    #[serde(rename = "startingBalance")]
    pub starting_balance: i64,
    /// Outstanding amount per credit type at game start. Zero-amount
    /// entries are dropped when seeding a member.
    #[serde(default)]
    pub credits: BTreeMap<String, i64>,
}

// ---------------------------------------------------------------------------
// Snapshots — wire and persisted representation of room state
// ---------------------------------------------------------------------------

/// A member's state within one room, as seen on the wire and in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    pub account_id: AccountId,
    /// Current transport connection, `None` while disconnected.
    pub conn: Option<ConnId>,
    pub display_name: String,
    pub ready: bool,
    pub profession: Option<Profession>,
    pub dream_id: Option<u32>,
    /// Balance in integer currency units. Never negative.
    pub balance: i64,
    /// Outstanding amount per credit type. Never negative; entries are
    /// removed once paid down to zero.
    pub credits: BTreeMap<String, i64>,
    /// Placeholder assets, one per credit type the profession financed
    /// (the thing the credit bought).
    #[serde(default)]
    pub assets: Vec<String>,
    pub connected: bool,
    pub joined_at_ms: u64,
    pub disconnected_at_ms: Option<u64>,
    pub reconnected_at_ms: Option<u64>,
}

/// Full room state: broadcast to members and handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub name: String,
    /// Empty string means the room is public.
    pub password: String,
    pub max_players: usize,
    pub duration_minutes: u64,
    pub status: RoomStatus,
    /// Stable id of the hosting member. `None` only before the first
    /// member has joined.
    pub host: Option<AccountId>,
    pub profession_mode: ProfessionMode,
    pub shared_profession: Option<Profession>,
    pub created_at_ms: u64,
    pub members: Vec<MemberSnapshot>,
    /// Transaction ids already applied by the ledger. Replays of any id
    /// in this set are no-ops.
    pub applied_tx: Vec<String>,
}

/// One row of a room listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListEntry {
    pub room_id: RoomId,
    pub name: String,
    pub players: usize,
    pub max_players: usize,
    /// Display name of the host, resolved members-first with an identity
    /// registry fallback; `"unknown"` when neither resolves.
    pub host_name: String,
    pub has_password: bool,
    pub status: RoomStatus,
    pub created_at_ms: u64,
}

// ---------------------------------------------------------------------------
// ClientCommand — everything a client can ask the coordinator to do
// ---------------------------------------------------------------------------

/// An inbound message from a client.
///
/// Internally tagged JSON: `{ "type": "createRoom", "name": "R1", … }`.
/// Each variant corresponds to one operation in the dispatch table; the
/// orchestrator routes identity commands to the identity registry and
/// room commands to the target room's actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    // -- Identity --
    /// Login if the email is known, register otherwise.
    AuthenticateUser {
        username: Option<String>,
        email: String,
        password: String,
    },
    CheckUserExists { email: String },
    CheckUsernameUnique { username: String },

    // -- Room lifecycle --
    CreateRoom {
        name: String,
        #[serde(default)]
        password: String,
        max_players: usize,
        duration_minutes: u64,
        profession_mode: ProfessionMode,
        shared_profession: Option<Profession>,
    },
    JoinRoom {
        room_id: RoomId,
        account_id: AccountId,
        display_name: String,
        #[serde(default)]
        password: String,
    },
    LeaveRoom {
        room_id: RoomId,
        account_id: AccountId,
    },
    ListRooms,
    /// Reconnection path: re-subscribe this connection to the room and
    /// re-send the current roster.
    RestoreRoomState {
        room_id: RoomId,
        account_id: AccountId,
    },

    // -- Lobby / game control --
    PlayerReady {
        room_id: RoomId,
        account_id: AccountId,
        profession_id: u32,
        dream_id: u32,
    },
    StartGame { room_id: RoomId },
    EndGame { room_id: RoomId },

    // -- Turns --
    ChangePlayerTurn {
        room_id: RoomId,
        target_index: usize,
    },
    /// Host-reported countdown value for the current turn. The host
    /// client owns the turn clock; the coordinator records what it is
    /// told (asymmetric trust, preserved as observed).
    SyncTurnTimer {
        room_id: RoomId,
        time_left: u32,
    },
    /// The host client reports the countdown hit zero.
    AutoPassTurn { room_id: RoomId },

    // -- Ledger --
    BankTransfer {
        room_id: RoomId,
        sender_id: AccountId,
        recipient_name: String,
        amount: i64,
        /// Client-reported sender balance, honored over the server-held
        /// one when present (preserved as observed).
        reported_balance: Option<i64>,
        transaction_id: String,
    },
    CreditPayment {
        room_id: RoomId,
        account_id: AccountId,
        credit_type: String,
        amount: i64,
    },
}

// ---------------------------------------------------------------------------
// ServerEvent — everything the coordinator sends back
// ---------------------------------------------------------------------------

/// An outbound message from the coordinator.
///
/// Broadcast events (`playersUpdate`, `gameStarted`, turn and break
/// notifications) go to every connected member of the affected room;
/// replies and errors go only to the requesting connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Authenticated {
        account_id: AccountId,
        username: String,
        email: String,
    },
    UserExists { exists: bool },
    UsernameUnique { unique: bool },

    RoomsList { rooms: Vec<RoomListEntry> },
    RoomData { room: RoomSnapshot },
    PlayersUpdate { players: Vec<MemberSnapshot> },

    /// Sent once when a game starts, carrying the computed roster with
    /// each member's starting position.
    GameStarted {
        players: Vec<MemberSnapshot>,
        turn_index: usize,
        time_left: u32,
    },
    PlayerTurnChanged {
        turn_index: usize,
        time_left: u32,
        /// `true` when the turn advanced because the countdown expired,
        /// `false` for a voluntary pass.
        auto: bool,
    },

    BreakStarted { ends_at_ms: u64 },
    BreakEnded,

    /// Out-of-band notification to a transfer's recipient.
    TransferReceived { from_name: String, amount: i64 },

    /// Request-scoped failure. `code` follows HTTP-style conventions.
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================
