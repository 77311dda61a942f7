//! Break scheduler: recurring, server-owned pauses in gameplay.
//!
//! Independent of turns. Every [`BREAK_INTERVAL`] of play the room goes
//! on a [`BREAK_DURATION`] break, for as long as the game runs — but a
//! break is clamped so it can never extend past the game's scheduled
//! end, and the cycle stops entirely once the next break wouldn't fit.
//!
//! Rather than juggling named timer handles, the scheduler exposes a
//! single [`deadline`](BreakScheduler::deadline) the owning room actor
//! sleeps on inside its `tokio::select!` loop and a
//! [`fire`](BreakScheduler::fire) transition to call when it elapses.
//! [`stop`](BreakScheduler::stop) clears the deadline, which cancels
//! everything at once — there is no timer to orphan.

use std::time::Duration;

use tokio::time::Instant;

/// Play time between breaks.
pub const BREAK_INTERVAL: Duration = Duration::from_secs(50 * 60);

/// Length of one break.
pub const BREAK_DURATION: Duration = Duration::from_secs(10 * 60);

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakPhase {
    /// Not scheduling: game not running, game over, host gone, or the
    /// game is too short to fit a single break.
    Stopped,
    /// Gameplay in progress; the deadline is the next break's start.
    Running,
    /// Break in progress; the deadline is the break's end.
    OnBreak,
}

/// A transition produced by [`BreakScheduler::fire`], for broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakEvent {
    /// A break began; it ends at the given instant (already clamped to
    /// the game end).
    Started { ends_at: Instant },
    /// The break is over and play resumes.
    Ended,
}

/// The break state machine for one room.
///
/// ```text
/// Stopped ──start──▶ Running ──fire──▶ OnBreak ──fire──▶ Running ─…
///                       │                                  │
///                       └────────── stop() ◀───────────────┘
/// ```
#[derive(Debug, Clone)]
pub struct BreakScheduler {
    phase: BreakPhase,
    game_end: Option<Instant>,
    deadline: Option<Instant>,
}

impl BreakScheduler {
    pub fn new() -> Self {
        Self {
            phase: BreakPhase::Stopped,
            game_end: None,
            deadline: None,
        }
    }

    /// Starts the cycle at game start.
    ///
    /// If the first break would land at or past the game's end, the
    /// scheduler stays `Stopped` — a game shorter than the interval
    /// never pauses.
    pub fn start(&mut self, now: Instant, game_minutes: u64) {
        let game_end = now + Duration::from_secs(game_minutes * 60);
        if now + BREAK_INTERVAL >= game_end {
            tracing::debug!(
                game_minutes,
                "game too short for a break, scheduler stays stopped"
            );
            self.stop();
            return;
        }
        self.phase = BreakPhase::Running;
        self.game_end = Some(game_end);
        self.deadline = Some(now + BREAK_INTERVAL);
    }

    /// The next instant the owning actor should wake at, or `None` when
    /// there is nothing scheduled (pend forever).
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes an elapsed deadline and transitions.
    ///
    /// Returns the event to broadcast, or `None` if nothing was pending
    /// (spurious wakeup after a `stop`).
    pub fn fire(&mut self, now: Instant) -> Option<BreakEvent> {
        let game_end = self.game_end?;
        self.deadline?;

        match self.phase {
            BreakPhase::Running => {
                // Clamp: a break never extends play past the game end.
                let ends_at = (now + BREAK_DURATION).min(game_end);
                self.phase = BreakPhase::OnBreak;
                self.deadline = Some(ends_at);
                tracing::info!("break started");
                Some(BreakEvent::Started { ends_at })
            }
            BreakPhase::OnBreak => {
                let next = now + BREAK_INTERVAL;
                if next >= game_end {
                    tracing::info!("break ended, no further breaks fit");
                    self.stop();
                } else {
                    self.phase = BreakPhase::Running;
                    self.deadline = Some(next);
                    tracing::info!("break ended");
                }
                Some(BreakEvent::Ended)
            }
            BreakPhase::Stopped => None,
        }
    }

    /// Cancels any pending break-start and break-end deadlines and
    /// clears all break fields. Called on host disconnect and game end
    /// so no stale wakeup can mutate a room that has moved on.
    pub fn stop(&mut self) {
        self.phase = BreakPhase::Stopped;
        self.game_end = None;
        self.deadline = None;
    }

    pub fn phase(&self) -> BreakPhase {
        self.phase
    }
}

impl Default for BreakScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
