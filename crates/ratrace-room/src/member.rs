//! Room membership: one player's state within one room.

use std::collections::BTreeMap;

use ratrace_protocol::{AccountId, ConnId, MemberSnapshot, Profession};

/// A player's state within one specific room.
///
/// Created when an account first joins; mutated on every ready,
/// profession, balance, credit, connect, and disconnect change; never
/// removed while the room exists (disconnection marks, never deletes, so
/// the player can reconnect into the same seat).
#[derive(Debug, Clone)]
pub struct Member {
    /// Stable account id — survives reconnects.
    pub account_id: AccountId,
    /// Current transport connection, `None` while disconnected.
    pub conn: Option<ConnId>,
    pub display_name: String,
    pub ready: bool,
    pub profession: Option<Profession>,
    pub dream_id: Option<u32>,
    /// Balance in integer currency units. Never negative.
    pub balance: i64,
    /// Outstanding amount per credit type. Entries are removed once
    /// paid down to zero; values are never negative.
    pub credits: BTreeMap<String, i64>,
    /// Placeholder assets: whatever each financed credit bought. Seeded
    /// alongside the credits, one per nonzero credit type.
    pub assets: Vec<String>,
    pub connected: bool,
    pub joined_at_ms: u64,
    pub disconnected_at_ms: Option<u64>,
    pub reconnected_at_ms: Option<u64>,
}

impl Member {
    /// Creates a fresh, connected member with no profession yet.
    pub fn new(
        account_id: AccountId,
        conn: ConnId,
        display_name: String,
        now_ms: u64,
    ) -> Self {
        Self {
            account_id,
            conn: Some(conn),
            display_name,
            ready: false,
            profession: None,
            dream_id: None,
            balance: 0,
            credits: BTreeMap::new(),
            assets: Vec::new(),
            connected: true,
            joined_at_ms: now_ms,
            disconnected_at_ms: None,
            reconnected_at_ms: None,
        }
    }

    /// Seeds this member's starting position from a profession:
    /// starting balance, the outstanding amount for every nonzero
    /// credit type, and one placeholder asset per financed credit (the
    /// thing the credit bought). Zero-amount entries are dropped.
    pub fn apply_profession(&mut self, profession: &Profession) {
        self.balance = profession.starting_balance.max(0);
        self.credits = profession
            .credits
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(kind, amount)| (kind.clone(), *amount))
            .collect();
        self.assets = self.credits.keys().cloned().collect();
        self.profession = Some(profession.clone());
    }

    /// Refreshes the transport binding on reconnect, preserving
    /// everything else (balance, profession, ready flag).
    pub fn reconnect(&mut self, conn: ConnId, now_ms: u64) {
        self.conn = Some(conn);
        self.connected = true;
        self.reconnected_at_ms = Some(now_ms);
    }

    /// Marks the member disconnected. The seat stays occupied.
    pub fn disconnect(&mut self, now_ms: u64) {
        self.conn = None;
        self.connected = false;
        self.disconnected_at_ms = Some(now_ms);
    }

    pub fn snapshot(&self) -> MemberSnapshot {
        MemberSnapshot {
            account_id: self.account_id.clone(),
            conn: self.conn,
            display_name: self.display_name.clone(),
            ready: self.ready,
            profession: self.profession.clone(),
            dream_id: self.dream_id,
            balance: self.balance,
            credits: self.credits.clone(),
            assets: self.assets.clone(),
            connected: self.connected,
            joined_at_ms: self.joined_at_ms,
            disconnected_at_ms: self.disconnected_at_ms,
            reconnected_at_ms: self.reconnected_at_ms,
        }
    }

    pub fn from_snapshot(snap: MemberSnapshot) -> Self {
        Self {
            account_id: snap.account_id,
            // Transport bindings don't survive a restart.
            conn: None,
            display_name: snap.display_name,
            ready: snap.ready,
            profession: snap.profession,
            dream_id: snap.dream_id,
            balance: snap.balance,
            credits: snap.credits,
            assets: snap.assets,
            connected: false,
            joined_at_ms: snap.joined_at_ms,
            disconnected_at_ms: snap.disconnected_at_ms,
            reconnected_at_ms: snap.reconnected_at_ms,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
