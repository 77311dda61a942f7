//! Turn-order state machine.
//!
//! The turn order is fixed once at game start: members are shuffled
//! uniformly at random and the permutation is immutable for the game's
//! lifetime. Only the pointer into it moves.
//!
//! The countdown is host-client-driven: the host reports the remaining
//! seconds (`sync`) and reports expiry (`autoPassTurn`). The coordinator
//! records what it is told rather than running its own turn clock — an
//! asymmetric trust decision preserved from the observed behavior (the
//! break scheduler, by contrast, is fully server-owned).

use ratrace_protocol::AccountId;

use crate::RoomError;

/// Full countdown for one turn, in seconds.
pub const TURN_SECONDS: u32 = 120;

/// Threshold below which a turn counts as "ending soon".
pub const ENDING_SOON_SECONDS: u32 = 10;

/// Turn scheduler state.
///
/// `Idle` until the game starts, then `Active` with exactly one
/// authoritative pointer into the shuffled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Active {
        /// The fixed random permutation of member ids.
        order: Vec<AccountId>,
        /// Index of the member whose turn it is.
        index: usize,
        /// Host-reported seconds remaining in the current turn.
        time_left: u32,
        /// Set when the countdown dips below the warning threshold;
        /// cleared on every advance.
        ending_soon: bool,
    },
}

impl TurnState {
    pub fn new() -> Self {
        Self::Idle
    }

    /// Starts the game: shuffles `members` into the fixed turn order and
    /// points at index 0 with a full countdown.
    pub fn start<R: rand::Rng>(members: Vec<AccountId>, rng: &mut R) -> Self {
        use rand::seq::SliceRandom;
        let mut order = members;
        order.shuffle(rng);
        Self::Active {
            order,
            index: 0,
            time_left: TURN_SECONDS,
            ending_soon: false,
        }
    }

    /// Advances the turn to `target`.
    ///
    /// Allowed only for the current-turn member or the host
    /// (`is_host`). The target must be in range and differ from the
    /// current index. On success the countdown resets and the
    /// ending-soon flag clears.
    pub fn advance(
        &mut self,
        requested_by: &AccountId,
        target: usize,
        is_host: bool,
    ) -> Result<(), RoomError> {
        let Self::Active {
            order,
            index,
            time_left,
            ending_soon,
        } = self
        else {
            return Err(RoomError::Validation("game has not started".into()));
        };

        let current = &order[*index];
        if current != requested_by && !is_host {
            return Err(RoomError::NotYourTurn);
        }
        if target >= order.len() || target == *index {
            return Err(RoomError::InvalidTurnTarget {
                target,
                len: order.len(),
            });
        }

        *index = target;
        *time_left = TURN_SECONDS;
        *ending_soon = false;
        Ok(())
    }

    /// Timeout-driven advance to the next member in rotation.
    ///
    /// Returns the new index. Behaves like [`advance`](Self::advance)
    /// with target `(index + 1) % len` and no authorization check — the
    /// countdown authority already established expiry.
    pub fn auto_advance(&mut self) -> Result<usize, RoomError> {
        let Self::Active {
            order,
            index,
            time_left,
            ending_soon,
        } = self
        else {
            return Err(RoomError::Validation("game has not started".into()));
        };

        *index = (*index + 1) % order.len();
        *time_left = TURN_SECONDS;
        *ending_soon = false;
        Ok(*index)
    }

    /// Removes a member from the order mid-game.
    ///
    /// Keeps the pointer on a present member: removing someone earlier
    /// in the order shifts the pointer left with them; removing the
    /// current-turn member hands the turn to the next member in
    /// rotation with a fresh countdown. An empty order falls back to
    /// `Idle`.
    pub fn remove(&mut self, account_id: &AccountId) {
        let Self::Active {
            order,
            index,
            time_left,
            ending_soon,
        } = self
        else {
            return;
        };
        let Some(pos) = order.iter().position(|a| a == account_id) else {
            return;
        };

        order.remove(pos);
        if order.is_empty() {
            *self = Self::Idle;
            return;
        }
        if pos < *index {
            *index -= 1;
        } else if pos == *index {
            *index %= order.len();
            *time_left = TURN_SECONDS;
            *ending_soon = false;
        }
    }

    /// Records the host-reported countdown value.
    pub fn sync(&mut self, reported: u32) {
        if let Self::Active {
            time_left,
            ending_soon,
            ..
        } = self
        {
            *time_left = reported;
            *ending_soon = reported <= ENDING_SOON_SECONDS;
        }
    }

    /// The member whose turn it is, if the game is running.
    pub fn current(&self) -> Option<&AccountId> {
        match self {
            Self::Active { order, index, .. } => order.get(*index),
            Self::Idle => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Active { index, .. } => Some(*index),
            Self::Idle => None,
        }
    }

    pub fn time_left(&self) -> u32 {
        match self {
            Self::Active { time_left, .. } => *time_left,
            Self::Idle => 0,
        }
    }
}

impl Default for TurnState {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(s: &str) -> AccountId {
        AccountId(s.into())
    }

    fn four_members() -> Vec<AccountId> {
        vec![acct("a"), acct("b"), acct("c"), acct("d")]
    }

    fn started(members: Vec<AccountId>) -> TurnState {
        TurnState::start(members, &mut rand::rng())
    }

    #[test]
    fn test_start_is_permutation_of_members() {
        let members = four_members();
        let turn = started(members.clone());

        let TurnState::Active { order, index, time_left, .. } = &turn else {
            panic!("expected Active");
        };
        assert_eq!(*index, 0);
        assert_eq!(*time_left, TURN_SECONDS);
        let mut sorted = order.clone();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut expected = members;
        expected.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(sorted, expected, "order must be a permutation");
    }

    #[test]
    fn test_advance_by_current_member_succeeds() {
        let mut turn = started(four_members());
        let current = turn.current().unwrap().clone();

        turn.advance(&current, 2, false).unwrap();

        assert_eq!(turn.index(), Some(2));
        assert_eq!(turn.time_left(), TURN_SECONDS);
    }

    #[test]
    fn test_advance_by_host_on_behalf_succeeds() {
        let mut turn = started(four_members());
        // "host" is whoever — authorization comes from the flag.
        let not_current = acct("zz");

        turn.advance(&not_current, 1, true).unwrap();

        assert_eq!(turn.index(), Some(1));
    }

    #[test]
    fn test_advance_by_bystander_rejected() {
        let mut turn = started(four_members());

        let result = turn.advance(&acct("zz"), 1, false);

        assert!(matches!(result, Err(RoomError::NotYourTurn)));
        assert_eq!(turn.index(), Some(0), "pointer must not move");
    }

    #[test]
    fn test_advance_to_same_index_rejected() {
        let mut turn = started(four_members());
        let current = turn.current().unwrap().clone();

        let result = turn.advance(&current, 0, false);

        assert!(matches!(
            result,
            Err(RoomError::InvalidTurnTarget { target: 0, .. })
        ));
    }

    #[test]
    fn test_advance_out_of_range_rejected() {
        let mut turn = started(four_members());
        let current = turn.current().unwrap().clone();

        let result = turn.advance(&current, 4, false);

        assert!(matches!(
            result,
            Err(RoomError::InvalidTurnTarget { target: 4, len: 4 })
        ));
    }

    #[test]
    fn test_advance_resets_ending_soon() {
        let mut turn = started(four_members());
        turn.sync(5);
        assert!(matches!(
            turn,
            TurnState::Active { ending_soon: true, .. }
        ));

        let current = turn.current().unwrap().clone();
        turn.advance(&current, 1, false).unwrap();

        assert!(matches!(
            turn,
            TurnState::Active { ending_soon: false, .. }
        ));
    }

    #[test]
    fn test_auto_advance_wraps_around() {
        // 4 members, current index 3: auto-advance wraps to 0 with a
        // full countdown.
        let mut turn = started(four_members());
        let current = turn.current().unwrap().clone();
        turn.advance(&current, 3, false).unwrap();
        turn.sync(0);

        let new_index = turn.auto_advance().unwrap();

        assert_eq!(new_index, 0);
        assert_eq!(turn.time_left(), TURN_SECONDS);
    }

    #[test]
    fn test_auto_advance_before_start_rejected() {
        let mut turn = TurnState::new();
        assert!(turn.auto_advance().is_err());
    }

    #[test]
    fn test_remove_before_pointer_shifts_it_left() {
        let mut turn = started(four_members());
        let current = turn.current().unwrap().clone();
        turn.advance(&current, 2, false).unwrap();
        let victim = match &turn {
            TurnState::Active { order, .. } => order[0].clone(),
            TurnState::Idle => unreachable!(),
        };
        let holder = turn.current().unwrap().clone();

        turn.remove(&victim);

        assert_eq!(turn.index(), Some(1), "pointer follows the shift");
        assert_eq!(turn.current(), Some(&holder), "same member holds the turn");
    }

    #[test]
    fn test_remove_current_member_passes_turn_on() {
        let mut turn = started(four_members());
        let (current, next) = match &turn {
            TurnState::Active { order, .. } => {
                (order[0].clone(), order[1].clone())
            }
            TurnState::Idle => unreachable!(),
        };
        turn.sync(5);

        turn.remove(&current);

        assert_eq!(turn.current(), Some(&next));
        assert_eq!(turn.time_left(), TURN_SECONDS, "fresh countdown");
        let TurnState::Active { order, .. } = &turn else {
            panic!("expected Active");
        };
        assert!(!order.contains(&current), "departed member is gone");
    }

    #[test]
    fn test_remove_last_slot_wraps_pointer() {
        let mut turn = started(four_members());
        let current = turn.current().unwrap().clone();
        turn.advance(&current, 3, false).unwrap();
        let victim = turn.current().unwrap().clone();

        turn.remove(&victim);

        assert_eq!(turn.index(), Some(0), "pointer wraps to the front");
    }

    #[test]
    fn test_remove_unknown_member_is_noop() {
        let mut turn = started(four_members());
        turn.remove(&acct("zz"));
        assert_eq!(turn.index(), Some(0));
    }

    #[test]
    fn test_sync_records_reported_time() {
        let mut turn = started(four_members());

        turn.sync(42);

        assert_eq!(turn.time_left(), 42);
    }

    #[test]
    fn test_sync_while_idle_is_noop() {
        let mut turn = TurnState::new();
        turn.sync(42);
        assert_eq!(turn, TurnState::Idle);
    }
}
