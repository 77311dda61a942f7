//! The room state machine: lifecycle, membership reconciliation, and
//! game start/end.
//!
//! `Room` is plain synchronous state — no channels, no timers, no I/O.
//! The actor in [`crate::actor`] owns one and serializes all access to
//! it, which is what makes these methods safe without locks. Keeping the
//! state machine pure also keeps it unit-testable without a runtime.

use std::collections::HashSet;

use ratrace_protocol::{
    AccountId, ConnId, MemberSnapshot, Profession, ProfessionMode, RoomId,
    RoomSnapshot, RoomStatus,
};

use crate::member::Member;
use crate::turn::TurnState;
use crate::RoomError;

/// Allowed room capacity.
pub const MAX_PLAYERS_RANGE: std::ops::RangeInclusive<usize> = 1..=10;

/// Allowed game duration in minutes.
pub const DURATION_RANGE: std::ops::RangeInclusive<u64> = 60..=240;

/// Parameters for creating a room.
#[derive(Debug, Clone)]
pub struct RoomOptions {
    pub name: String,
    /// Empty string means public.
    pub password: String,
    pub max_players: usize,
    pub duration_minutes: u64,
    pub profession_mode: ProfessionMode,
    pub shared_profession: Option<Profession>,
}

/// How a join request was reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKind {
    /// A brand-new membership was created.
    Joined,
    /// An existing membership with the same stable id was re-bound to
    /// the new connection.
    Reconnected,
    /// Compat fallback: an existing membership matched by display name
    /// was adopted and its stable id rewritten. Carries the retired id
    /// so callers can drop anything still keyed by it.
    Adopted { previous: AccountId },
}

/// What a disconnect did to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectNotice {
    pub account_id: AccountId,
    /// The disconnecting member was host. The actor stops the break
    /// scheduler when this is set.
    pub was_host: bool,
}

/// One room: members, turn state, ledger bookkeeping, and settings.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    password: String,
    pub max_players: usize,
    pub duration_minutes: u64,
    pub status: RoomStatus,
    /// Stable id of the hosting member. `None` is the temporary marker
    /// a freshly created room carries until its first join rewrites it.
    pub host: Option<AccountId>,
    pub profession_mode: ProfessionMode,
    pub shared_profession: Option<Profession>,
    pub created_at_ms: u64,
    members: Vec<Member>,
    pub turn: TurnState,
    /// Transaction ids the ledger has already applied.
    pub(crate) applied_tx: HashSet<String>,
}

impl Room {
    /// Creates a room from validated options.
    ///
    /// # Errors
    /// [`RoomError::Validation`] if the name is empty, the capacity is
    /// outside 1–10, or the duration is outside 60–240 minutes.
    pub fn new(id: RoomId, opts: RoomOptions, now_ms: u64) -> Result<Self, RoomError> {
        if opts.name.trim().is_empty() {
            return Err(RoomError::Validation("room name must not be empty".into()));
        }
        if !MAX_PLAYERS_RANGE.contains(&opts.max_players) {
            return Err(RoomError::Validation(format!(
                "max players must be within {:?}, got {}",
                MAX_PLAYERS_RANGE, opts.max_players
            )));
        }
        if !DURATION_RANGE.contains(&opts.duration_minutes) {
            return Err(RoomError::Validation(format!(
                "duration must be within {:?} minutes, got {}",
                DURATION_RANGE, opts.duration_minutes
            )));
        }

        Ok(Self {
            id,
            name: opts.name,
            password: opts.password,
            max_players: opts.max_players,
            duration_minutes: opts.duration_minutes,
            status: RoomStatus::Waiting,
            host: None,
            profession_mode: opts.profession_mode,
            shared_profession: opts.shared_profession,
            created_at_ms: now_ms,
            members: Vec::new(),
            turn: TurnState::new(),
            applied_tx: HashSet::new(),
        })
    }

    // -----------------------------------------------------------------
    // Membership reconciliation
    // -----------------------------------------------------------------

    /// Reconciles a join request against the current membership.
    ///
    /// Resolution order:
    /// 1. same stable id → reconnect (seat, balance, profession, ready
    ///    flag all preserved);
    /// 2. same display name → compat adoption for clients without
    ///    stable ids: like a reconnect, plus the stored stable id is
    ///    rewritten to `account_id`;
    /// 3. otherwise a first-time join: password and capacity are
    ///    checked and a new membership appended.
    ///
    /// The first successful first-time join also claims the host seat
    /// if the room still carries its temporary host marker.
    pub fn join(
        &mut self,
        account_id: AccountId,
        conn: ConnId,
        display_name: &str,
        password: &str,
        now_ms: u64,
    ) -> Result<JoinKind, RoomError> {
        if let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.account_id == account_id)
        {
            member.reconnect(conn, now_ms);
            tracing::info!(room_id = %self.id, %account_id, "member reconnected");
            return Ok(JoinKind::Reconnected);
        }

        // Fallback path, second on purpose: transport-id-only clients
        // are recognized by display name and migrated to the stable id.
        if let Some(member) = self
            .members
            .iter_mut()
            .find(|m| m.display_name == display_name)
        {
            let old = member.account_id.clone();
            member.account_id = account_id.clone();
            member.reconnect(conn, now_ms);
            if self.host.as_ref() == Some(&old) {
                self.host = Some(account_id.clone());
            }
            tracing::info!(
                room_id = %self.id,
                %account_id,
                display_name,
                "membership adopted by stable id (name-match fallback)"
            );
            return Ok(JoinKind::Adopted { previous: old });
        }

        if !self.password.is_empty() && self.password != password {
            return Err(RoomError::WrongPassword);
        }
        if self.connected_count() >= self.max_players {
            return Err(RoomError::RoomFull(self.id.clone()));
        }

        let mut member = Member::new(
            account_id.clone(),
            conn,
            display_name.to_string(),
            now_ms,
        );
        // Shared-profession rooms deal everyone the same hand up front.
        if self.profession_mode == ProfessionMode::Shared {
            if let Some(profession) = self.shared_profession.clone() {
                member.apply_profession(&profession);
            }
        }
        self.members.push(member);

        if self.host.is_none() {
            self.host = Some(account_id.clone());
            tracing::info!(room_id = %self.id, %account_id, "host seat claimed");
        }

        tracing::info!(
            room_id = %self.id,
            %account_id,
            members = self.members.len(),
            "member joined"
        );
        Ok(JoinKind::Joined)
    }

    /// Removes a membership outright (distinct from disconnect).
    ///
    /// If the leaving member was host and others remain, the first
    /// remaining member inherits the host seat.
    pub fn leave(&mut self, account_id: &AccountId) -> Result<(), RoomError> {
        let idx = self
            .members
            .iter()
            .position(|m| &m.account_id == account_id)
            .ok_or_else(|| RoomError::MemberNotFound(account_id.0.clone()))?;

        self.members.remove(idx);
        // Mid-game the departed seat loses its place in the rotation;
        // the turn pointer must always land on a present member.
        self.turn.remove(account_id);

        if self.host.as_ref() == Some(account_id) {
            self.host = self.members.first().map(|m| m.account_id.clone());
            if let Some(new_host) = &self.host {
                tracing::info!(
                    room_id = %self.id,
                    %new_host,
                    "host left, seat reassigned"
                );
            }
        }
        tracing::info!(room_id = %self.id, %account_id, "member left");
        Ok(())
    }

    /// Marks the member on `conn` as disconnected, keeping their seat.
    ///
    /// Returns `None` if no member is bound to that connection. Host
    /// disconnects reassign the seat to the first still-connected
    /// member and are flagged in the notice so the caller can stop the
    /// break scheduler.
    pub fn mark_disconnected(
        &mut self,
        conn: ConnId,
        now_ms: u64,
    ) -> Option<DisconnectNotice> {
        let member = self
            .members
            .iter_mut()
            .find(|m| m.conn == Some(conn))?;

        member.disconnect(now_ms);
        let account_id = member.account_id.clone();
        let was_host = self.host.as_ref() == Some(&account_id);

        if was_host {
            let new_host = self
                .members
                .iter()
                .find(|m| m.connected)
                .or(self.members.first())
                .map(|m| m.account_id.clone());
            self.host = new_host;
            if let Some(h) = &self.host {
                tracing::info!(room_id = %self.id, new_host = %h, "host disconnected, seat reassigned");
            }
        }

        tracing::info!(room_id = %self.id, %account_id, "member disconnected");
        Some(DisconnectNotice { account_id, was_host })
    }

    // -----------------------------------------------------------------
    // Lobby and game lifecycle
    // -----------------------------------------------------------------

    /// Marks a member ready with their chosen profession and dream.
    ///
    /// Last write wins — readying again simply overwrites. In shared
    /// mode the room's payload overrides the individual choice.
    pub fn ready(
        &mut self,
        account_id: &AccountId,
        profession: Option<Profession>,
        dream_id: u32,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::WrongStatus {
                required: RoomStatus::Waiting,
                actual: self.status,
            });
        }
        let shared = match self.profession_mode {
            ProfessionMode::Shared => self.shared_profession.clone(),
            ProfessionMode::Individual => None,
        };
        let member = self
            .members
            .iter_mut()
            .find(|m| &m.account_id == account_id)
            .ok_or_else(|| RoomError::MemberNotFound(account_id.0.clone()))?;

        if let Some(p) = shared.as_ref().or(profession.as_ref()) {
            member.apply_profession(p);
        }
        member.dream_id = Some(dream_id);
        member.ready = true;
        Ok(())
    }

    /// Starts the game.
    ///
    /// Requires the acting member to be host and at least two members
    /// to be ready. Shuffles the fixed turn order, re-seeds every
    /// member's starting position from their profession, and moves the
    /// room to `Playing`. The caller starts the break scheduler and
    /// broadcasts.
    pub fn start_game<R: rand::Rng>(
        &mut self,
        actor: &AccountId,
        rng: &mut R,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::WrongStatus {
                required: RoomStatus::Waiting,
                actual: self.status,
            });
        }
        if self.host.as_ref() != Some(actor) {
            return Err(RoomError::NotHost);
        }
        let ready = self.members.iter().filter(|m| m.ready).count();
        if ready < 2 {
            return Err(RoomError::NotEnoughReady { ready });
        }

        // Seed each member's starting state. In shared mode everyone
        // plays the room payload; otherwise their ready-up choice.
        let shared = match self.profession_mode {
            ProfessionMode::Shared => self.shared_profession.clone(),
            ProfessionMode::Individual => None,
        };
        for member in &mut self.members {
            let profession = shared.clone().or_else(|| member.profession.clone());
            if let Some(p) = profession {
                member.apply_profession(&p);
            }
        }

        let ids: Vec<AccountId> =
            self.members.iter().map(|m| m.account_id.clone()).collect();
        self.turn = TurnState::start(ids, rng);
        self.status = RoomStatus::Playing;

        tracing::info!(
            room_id = %self.id,
            players = self.members.len(),
            "game started"
        );
        Ok(())
    }

    /// Ends the game. Host-only. The caller stops the break scheduler.
    pub fn end_game(&mut self, actor: &AccountId) -> Result<(), RoomError> {
        if self.host.as_ref() != Some(actor) {
            return Err(RoomError::NotHost);
        }
        self.status = RoomStatus::Finished;
        self.turn = TurnState::new();
        tracing::info!(room_id = %self.id, "game ended");
        Ok(())
    }

    /// Advances the turn on behalf of the member bound to `actor`.
    pub fn advance_turn(
        &mut self,
        actor: &AccountId,
        target: usize,
    ) -> Result<(), RoomError> {
        let is_host = self.host.as_ref() == Some(actor);
        self.turn.advance(actor, target, is_host)
    }

    // -----------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------

    pub fn member(&self, account_id: &AccountId) -> Option<&Member> {
        self.members.iter().find(|m| &m.account_id == account_id)
    }

    pub(crate) fn member_mut(&mut self, account_id: &AccountId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.account_id == account_id)
    }

    pub fn member_by_conn(&self, conn: ConnId) -> Option<&Member> {
        self.members.iter().find(|m| m.conn == Some(conn))
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn connected_count(&self) -> usize {
        self.members.iter().filter(|m| m.connected).count()
    }

    /// The transport connection of the current host, if connected.
    pub fn host_conn(&self) -> Option<ConnId> {
        let host = self.host.as_ref()?;
        self.member(host)?.conn
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    pub fn snapshot(&self) -> RoomSnapshot {
        let mut applied_tx: Vec<String> =
            self.applied_tx.iter().cloned().collect();
        applied_tx.sort();
        RoomSnapshot {
            room_id: self.id.clone(),
            name: self.name.clone(),
            password: self.password.clone(),
            max_players: self.max_players,
            duration_minutes: self.duration_minutes,
            status: self.status,
            host: self.host.clone(),
            profession_mode: self.profession_mode,
            shared_profession: self.shared_profession.clone(),
            created_at_ms: self.created_at_ms,
            members: self.members.iter().map(Member::snapshot).collect(),
            applied_tx,
        }
    }

    pub fn members_snapshot(&self) -> Vec<MemberSnapshot> {
        self.members.iter().map(Member::snapshot).collect()
    }

    /// Rebuilds a room from its persisted snapshot at process start.
    ///
    /// Transport bindings and in-flight turn state don't survive a
    /// restart: every member comes back disconnected and a `Playing`
    /// room resumes with an idle turn pointer until the host restarts
    /// the game.
    pub fn from_snapshot(snap: RoomSnapshot) -> Self {
        Self {
            id: snap.room_id,
            name: snap.name,
            password: snap.password,
            max_players: snap.max_players,
            duration_minutes: snap.duration_minutes,
            status: snap.status,
            host: snap.host,
            profession_mode: snap.profession_mode,
            shared_profession: snap.shared_profession,
            created_at_ms: snap.created_at_ms,
            members: snap
                .members
                .into_iter()
                .map(Member::from_snapshot)
                .collect(),
            turn: TurnState::new(),
            applied_tx: snap.applied_tx.into_iter().collect(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn acct(s: &str) -> AccountId {
        AccountId(s.into())
    }

    fn opts(max_players: usize) -> RoomOptions {
        RoomOptions {
            name: "R1".into(),
            password: String::new(),
            max_players,
            duration_minutes: 180,
            profession_mode: ProfessionMode::Individual,
            shared_profession: None,
        }
    }

    fn room(max_players: usize) -> Room {
        Room::new(RoomId("r1".into()), opts(max_players), 1000).unwrap()
    }

    fn profession(balance: i64) -> Profession {
        Profession {
            id: 1,
            name: "Engineer".into(),
            starting_balance: balance,
            credits: BTreeMap::new(),
        }
    }

    fn join_n(room: &mut Room, n: usize) {
        for i in 0..n {
            room.join(
                acct(&format!("a{i}")),
                ConnId(i as u64),
                &format!("P{i}"),
                "",
                1000,
            )
            .unwrap();
        }
    }

    // =====================================================================
    // Validation
    // =====================================================================

    #[test]
    fn test_new_rejects_empty_name() {
        let mut o = opts(4);
        o.name = "   ".into();
        let result = Room::new(RoomId("r".into()), o, 0);
        assert!(matches!(result, Err(RoomError::Validation(_))));
    }

    #[test]
    fn test_new_rejects_bad_capacity() {
        for bad in [0, 11] {
            let result = Room::new(RoomId("r".into()), opts(bad), 0);
            assert!(
                matches!(result, Err(RoomError::Validation(_))),
                "capacity {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_new_rejects_bad_duration() {
        for bad in [59, 241] {
            let mut o = opts(4);
            o.duration_minutes = bad;
            let result = Room::new(RoomId("r".into()), o, 0);
            assert!(
                matches!(result, Err(RoomError::Validation(_))),
                "duration {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_new_accepts_boundary_values() {
        for (players, minutes) in [(1, 60), (10, 240)] {
            let mut o = opts(players);
            o.duration_minutes = minutes;
            assert!(Room::new(RoomId("r".into()), o, 0).is_ok());
        }
    }

    // =====================================================================
    // Join reconciliation
    // =====================================================================

    #[test]
    fn test_join_first_member_claims_host() {
        let mut r = room(4);
        assert_eq!(r.host, None, "fresh room carries the temporary marker");

        let kind = r.join(acct("a"), ConnId(1), "Alice", "", 0).unwrap();

        assert_eq!(kind, JoinKind::Joined);
        assert_eq!(r.host, Some(acct("a")));
    }

    #[test]
    fn test_join_same_account_is_reconnect() {
        let mut r = room(4);
        r.join(acct("a"), ConnId(1), "Alice", "", 0).unwrap();
        r.member_mut(&acct("a")).unwrap().balance = 2500;
        r.mark_disconnected(ConnId(1), 10);

        let kind = r.join(acct("a"), ConnId(2), "Alice", "", 20).unwrap();

        assert_eq!(kind, JoinKind::Reconnected);
        assert_eq!(r.members().len(), 1, "no duplicate seat");
        let m = r.member(&acct("a")).unwrap();
        assert_eq!(m.conn, Some(ConnId(2)));
        assert_eq!(m.balance, 2500, "state preserved across reconnect");
        assert_eq!(m.reconnected_at_ms, Some(20));
    }

    #[test]
    fn test_join_name_match_adopts_and_rewrites_stable_id() {
        let mut r = room(4);
        r.join(acct("legacy"), ConnId(1), "Alice", "", 0).unwrap();
        r.mark_disconnected(ConnId(1), 10);

        let kind = r.join(acct("stable"), ConnId(2), "Alice", "", 20).unwrap();

        assert_eq!(kind, JoinKind::Adopted { previous: acct("legacy") });
        assert_eq!(r.members().len(), 1);
        assert!(r.member(&acct("stable")).is_some());
        assert!(r.member(&acct("legacy")).is_none());
        // The host marker follows the rewritten id.
        assert_eq!(r.host, Some(acct("stable")));
    }

    #[test]
    fn test_join_full_room_rejected_and_rejoin_after_leave() {
        // The (N+1)-th join is rejected; leaving frees the slot.
        let mut r = room(2);
        join_n(&mut r, 2);

        let result = r.join(acct("late"), ConnId(9), "Late", "", 0);
        assert!(matches!(result, Err(RoomError::RoomFull(_))));

        r.leave(&acct("a0")).unwrap();
        r.join(acct("late"), ConnId(9), "Late", "", 0).unwrap();
        assert_eq!(r.members().len(), 2);
    }

    #[test]
    fn test_join_capacity_counts_connected_only() {
        // A disconnected member holds their seat but not a slot.
        let mut r = room(2);
        join_n(&mut r, 2);
        r.mark_disconnected(ConnId(0), 5);

        r.join(acct("new"), ConnId(7), "New", "", 10).unwrap();

        assert_eq!(r.members().len(), 3);
        assert_eq!(r.connected_count(), 2);
    }

    #[test]
    fn test_join_wrong_password_rejected() {
        let mut o = opts(4);
        o.password = "sekrit".into();
        let mut r = Room::new(RoomId("r".into()), o, 0).unwrap();

        let result = r.join(acct("a"), ConnId(1), "Alice", "nope", 0);
        assert!(matches!(result, Err(RoomError::WrongPassword)));

        r.join(acct("a"), ConnId(1), "Alice", "sekrit", 0).unwrap();
    }

    #[test]
    fn test_join_reconnect_bypasses_password() {
        // A returning member isn't challenged again.
        let mut o = opts(4);
        o.password = "sekrit".into();
        let mut r = Room::new(RoomId("r".into()), o, 0).unwrap();
        r.join(acct("a"), ConnId(1), "Alice", "sekrit", 0).unwrap();
        r.mark_disconnected(ConnId(1), 5);

        let kind = r.join(acct("a"), ConnId(2), "Alice", "", 10).unwrap();
        assert_eq!(kind, JoinKind::Reconnected);
    }

    #[test]
    fn test_shared_mode_seeds_profession_on_join() {
        let mut o = opts(4);
        o.profession_mode = ProfessionMode::Shared;
        o.shared_profession = Some(profession(5000));
        let mut r = Room::new(RoomId("r".into()), o, 0).unwrap();

        r.join(acct("a"), ConnId(1), "Alice", "", 0).unwrap();

        assert_eq!(r.member(&acct("a")).unwrap().balance, 5000);
    }

    // =====================================================================
    // Leave and disconnect
    // =====================================================================

    #[test]
    fn test_leave_reassigns_host_to_first_remaining() {
        let mut r = room(4);
        join_n(&mut r, 3);
        assert_eq!(r.host, Some(acct("a0")));

        r.leave(&acct("a0")).unwrap();

        assert_eq!(r.host, Some(acct("a1")));
        assert_eq!(r.members().len(), 2);
    }

    #[test]
    fn test_leave_last_member_clears_host() {
        let mut r = room(4);
        join_n(&mut r, 1);

        r.leave(&acct("a0")).unwrap();

        assert_eq!(r.host, None);
        assert!(r.members().is_empty());
    }

    #[test]
    fn test_leave_unknown_member_rejected() {
        let mut r = room(4);
        let result = r.leave(&acct("ghost"));
        assert!(matches!(result, Err(RoomError::MemberNotFound(_))));
    }

    #[test]
    fn test_disconnect_host_reassigns_and_flags() {
        // 3 members, host = member 0; disconnecting member 0 makes
        // member 1 host.
        let mut r = room(4);
        join_n(&mut r, 3);

        let notice = r.mark_disconnected(ConnId(0), 50).unwrap();

        assert!(notice.was_host);
        assert_eq!(notice.account_id, acct("a0"));
        assert_eq!(r.host, Some(acct("a1")));
        // The seat is kept, only marked.
        assert_eq!(r.members().len(), 3);
        assert!(!r.member(&acct("a0")).unwrap().connected);
    }

    #[test]
    fn test_disconnect_non_host_keeps_host() {
        let mut r = room(4);
        join_n(&mut r, 3);

        let notice = r.mark_disconnected(ConnId(2), 50).unwrap();

        assert!(!notice.was_host);
        assert_eq!(r.host, Some(acct("a0")));
    }

    #[test]
    fn test_disconnect_unknown_conn_is_none() {
        let mut r = room(4);
        assert_eq!(r.mark_disconnected(ConnId(99), 0), None);
    }

    // =====================================================================
    // Ready and game lifecycle
    // =====================================================================

    #[test]
    fn test_ready_applies_profession_and_dream() {
        let mut r = room(4);
        join_n(&mut r, 2);

        r.ready(&acct("a0"), Some(profession(3000)), 7).unwrap();

        let m = r.member(&acct("a0")).unwrap();
        assert!(m.ready);
        assert_eq!(m.balance, 3000);
        assert_eq!(m.dream_id, Some(7));
    }

    #[test]
    fn test_ready_last_write_wins() {
        let mut r = room(4);
        join_n(&mut r, 2);
        r.ready(&acct("a0"), Some(profession(3000)), 7).unwrap();

        r.ready(&acct("a0"), Some(profession(1200)), 8).unwrap();

        let m = r.member(&acct("a0")).unwrap();
        assert_eq!(m.balance, 1200);
        assert_eq!(m.dream_id, Some(8));
    }

    #[test]
    fn test_start_game_requires_host() {
        let mut r = room(4);
        join_n(&mut r, 2);
        r.ready(&acct("a0"), Some(profession(3000)), 1).unwrap();
        r.ready(&acct("a1"), Some(profession(3000)), 1).unwrap();

        let result = r.start_game(&acct("a1"), &mut rand::rng());
        assert!(matches!(result, Err(RoomError::NotHost)));
    }

    #[test]
    fn test_start_game_requires_two_ready() {
        let mut r = room(4);
        join_n(&mut r, 2);
        r.ready(&acct("a0"), Some(profession(3000)), 1).unwrap();

        let result = r.start_game(&acct("a0"), &mut rand::rng());
        assert!(matches!(
            result,
            Err(RoomError::NotEnoughReady { ready: 1 })
        ));
    }

    #[test]
    fn test_start_game_shuffles_and_plays() {
        // Room R1, capacity 2, two ready members with $3,000
        // professions. Start succeeds, turn order is a permutation of
        // both, starting balances are unchanged.
        let mut r = room(2);
        join_n(&mut r, 2);
        r.ready(&acct("a0"), Some(profession(3000)), 1).unwrap();
        r.ready(&acct("a1"), Some(profession(3000)), 2).unwrap();

        r.start_game(&acct("a0"), &mut rand::rng()).unwrap();

        assert_eq!(r.status, RoomStatus::Playing);
        assert_eq!(r.turn.index(), Some(0));
        let TurnState::Active { order, .. } = &r.turn else {
            panic!("expected active turn state");
        };
        assert_eq!(order.len(), 2);
        assert!(order.contains(&acct("a0")) && order.contains(&acct("a1")));
        for m in r.members() {
            assert_eq!(m.balance, 3000);
        }
    }

    #[test]
    fn test_start_game_twice_rejected() {
        let mut r = room(2);
        join_n(&mut r, 2);
        r.ready(&acct("a0"), Some(profession(3000)), 1).unwrap();
        r.ready(&acct("a1"), Some(profession(3000)), 1).unwrap();
        r.start_game(&acct("a0"), &mut rand::rng()).unwrap();

        let result = r.start_game(&acct("a0"), &mut rand::rng());
        assert!(matches!(result, Err(RoomError::WrongStatus { .. })));
    }

    #[test]
    fn test_leave_mid_game_drops_seat_from_rotation() {
        // 3 players in a running game; the departed member must vanish
        // from the turn order so auto-advance can never land on them.
        let mut r = room(3);
        join_n(&mut r, 3);
        for id in ["a0", "a1", "a2"] {
            r.ready(&acct(id), Some(profession(3000)), 1).unwrap();
        }
        r.start_game(&acct("a0"), &mut rand::rng()).unwrap();

        r.leave(&acct("a1")).unwrap();

        let TurnState::Active { order, .. } = &r.turn else {
            panic!("expected active turn state");
        };
        assert_eq!(order.len(), 2);
        assert!(!order.contains(&acct("a1")));
        for _ in 0..4 {
            let idx = r.turn.auto_advance().unwrap();
            let current = r.turn.current().unwrap().clone();
            assert!(
                r.member(&current).is_some(),
                "turn index {idx} must point at a present member"
            );
            assert_ne!(current, acct("a1"));
        }
    }

    #[test]
    fn test_end_game_host_only() {
        let mut r = room(2);
        join_n(&mut r, 2);
        r.ready(&acct("a0"), Some(profession(3000)), 1).unwrap();
        r.ready(&acct("a1"), Some(profession(3000)), 1).unwrap();
        r.start_game(&acct("a0"), &mut rand::rng()).unwrap();

        assert!(matches!(
            r.end_game(&acct("a1")),
            Err(RoomError::NotHost)
        ));
        r.end_game(&acct("a0")).unwrap();
        assert_eq!(r.status, RoomStatus::Finished);
    }

    // =====================================================================
    // Snapshots
    // =====================================================================

    #[test]
    fn test_snapshot_round_trip() {
        let mut r = room(4);
        join_n(&mut r, 2);
        r.applied_tx.insert("tx-1".into());

        let restored = Room::from_snapshot(r.snapshot());

        assert_eq!(restored.id, r.id);
        assert_eq!(restored.members().len(), 2);
        assert!(restored.applied_tx.contains("tx-1"));
        assert_eq!(
            restored.connected_count(),
            0,
            "members come back disconnected"
        );
    }
}
