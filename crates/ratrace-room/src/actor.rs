//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. No shared mutable state, just message
//! passing — the actor is the only code that ever touches its `Room`,
//! which is what lets `Room` stay a plain lock-free struct.
//!
//! The actor loop selects over two sources: inbound [`RoomCommand`]s and
//! the break scheduler's deadline. When the scheduler has nothing
//! pending the timer branch pends forever and the loop is purely
//! event-driven.
//!
//! Persistence is fire-and-forget: after every mutation the actor hands
//! a snapshot to the store and logs (but swallows) any failure. The
//! in-memory room stays authoritative.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ratrace_protocol::{
    AccountId, ConnId, Profession, RoomId, RoomSnapshot, ServerEvent,
};
use ratrace_storage::RoomStore;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::breaks::{BreakEvent, BreakScheduler};
use crate::ledger::TransferOutcome;
use crate::room::{JoinKind, Room};
use crate::turn::TURN_SECONDS;
use crate::RoomError;

/// Channel sender for delivering outbound events to one member's
/// connection handler.
pub type MemberSender = mpsc::UnboundedSender<ServerEvent>;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` are request/reply; the rest are
/// fire-and-forget notifications.
pub(crate) enum RoomCommand {
    Join {
        account_id: AccountId,
        conn: ConnId,
        display_name: String,
        password: String,
        sender: MemberSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Leave {
        account_id: AccountId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Reconnection path: rebind the connection and re-send full state.
    Restore {
        account_id: AccountId,
        conn: ConnId,
        sender: MemberSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// The gateway noticed this connection drop. No reply.
    Disconnected { conn: ConnId },
    Ready {
        account_id: AccountId,
        profession: Option<Profession>,
        dream_id: u32,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    StartGame {
        conn: ConnId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    EndGame {
        conn: ConnId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    ChangeTurn {
        conn: ConnId,
        target: usize,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Host-reported countdown value. Ignored from anyone else.
    SyncTimer { conn: ConnId, time_left: u32 },
    /// Host-reported countdown expiry.
    AutoPass {
        conn: ConnId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Transfer {
        conn: ConnId,
        sender_id: AccountId,
        recipient_name: String,
        amount: i64,
        reported_balance: Option<i64>,
        transaction_id: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    PayCredit {
        account_id: AccountId,
        credit_type: String,
        amount: i64,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Shutdown,
}

/// Handle to a running room actor. Cheap to clone — it's an
/// `mpsc::Sender` wrapper. The registry holds one per room.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    async fn request<T>(
        &self,
        cmd: RoomCommand,
        reply_rx: oneshot::Receiver<T>,
    ) -> Result<T, RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }

    pub async fn join(
        &self,
        account_id: AccountId,
        conn: ConnId,
        display_name: String,
        password: String,
        sender: MemberSender,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Join {
                account_id,
                conn,
                display_name,
                password,
                sender,
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn leave(&self, account_id: AccountId) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Leave { account_id, reply }, rx).await?
    }

    pub async fn restore(
        &self,
        account_id: AccountId,
        conn: ConnId,
        sender: MemberSender,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Restore { account_id, conn, sender, reply },
            rx,
        )
        .await?
    }

    /// Fire-and-forget: the connection owning `conn` went away.
    pub async fn disconnected(&self, conn: ConnId) {
        let _ = self.sender.send(RoomCommand::Disconnected { conn }).await;
    }

    pub async fn ready(
        &self,
        account_id: AccountId,
        profession: Option<Profession>,
        dream_id: u32,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Ready { account_id, profession, dream_id, reply },
            rx,
        )
        .await?
    }

    pub async fn start_game(&self, conn: ConnId) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::StartGame { conn, reply }, rx).await?
    }

    pub async fn end_game(&self, conn: ConnId) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::EndGame { conn, reply }, rx).await?
    }

    pub async fn change_turn(
        &self,
        conn: ConnId,
        target: usize,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::ChangeTurn { conn, target, reply }, rx)
            .await?
    }

    pub async fn sync_timer(&self, conn: ConnId, time_left: u32) {
        let _ = self
            .sender
            .send(RoomCommand::SyncTimer { conn, time_left })
            .await;
    }

    pub async fn auto_pass(&self, conn: ConnId) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::AutoPass { conn, reply }, rx).await?
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn transfer(
        &self,
        conn: ConnId,
        sender_id: AccountId,
        recipient_name: String,
        amount: i64,
        reported_balance: Option<i64>,
        transaction_id: String,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Transfer {
                conn,
                sender_id,
                recipient_name,
                amount,
                reported_balance,
                transaction_id,
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn pay_credit(
        &self,
        account_id: AccountId,
        credit_type: String,
        amount: i64,
    ) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::PayCredit { account_id, credit_type, amount, reply },
            rx,
        )
        .await?
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::GetSnapshot { reply }, rx).await
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(RoomCommand::Shutdown).await;
    }
}

/// Sleeps until `deadline`, or forever when there is none. Designed for
/// the timer branch of the actor's `select!`.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<S> {
    room: Room,
    breaks: BreakScheduler,
    /// Per-member outbound channels, keyed by stable id.
    senders: HashMap<AccountId, MemberSender>,
    store: Arc<S>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<S: RoomStore> RoomActor<S> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.id, "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).await {
                        break;
                    }
                }
                _ = wait_until(self.breaks.deadline()) => {
                    self.fire_break().await;
                }
            }
        }

        tracing::info!(room_id = %self.room.id, "room actor stopped");
    }

    /// Handles one command. Returns `true` on shutdown.
    async fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                account_id,
                conn,
                display_name,
                password,
                sender,
                reply,
            } => {
                let result = self.room.join(
                    account_id.clone(),
                    conn,
                    &display_name,
                    &password,
                    now_ms(),
                );
                match result {
                    Ok(kind) => {
                        // Same-name adoption retires another stable id;
                        // drop its sender so nothing keeps routing to
                        // the dead key.
                        if let JoinKind::Adopted { previous } = &kind {
                            self.senders.remove(previous);
                        }
                        self.senders.insert(account_id, sender);
                        let _ = reply.send(Ok(()));
                        self.broadcast_players();
                        self.persist().await;
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }

            RoomCommand::Leave { account_id, reply } => {
                let result = self.room.leave(&account_id);
                if result.is_ok() {
                    self.senders.remove(&account_id);
                    self.broadcast_players();
                    self.persist().await;
                }
                let _ = reply.send(result);
            }

            RoomCommand::Restore { account_id, conn, sender, reply } => {
                let result = match self.room.member_mut(&account_id) {
                    Some(member) => {
                        member.reconnect(conn, now_ms());
                        Ok(())
                    }
                    None => {
                        Err(RoomError::MemberNotFound(account_id.0.clone()))
                    }
                };
                match result {
                    Ok(()) => {
                        let snapshot = self.room.snapshot();
                        let _ =
                            sender.send(ServerEvent::RoomData { room: snapshot });
                        self.senders.insert(account_id, sender);
                        let _ = reply.send(Ok(()));
                        self.broadcast_players();
                        self.persist().await;
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }

            RoomCommand::Disconnected { conn } => {
                if let Some(notice) = self.room.mark_disconnected(conn, now_ms())
                {
                    self.senders.remove(&notice.account_id);
                    if notice.was_host {
                        // Host gone: the break cycle stops outright
                        // rather than running for a headless room.
                        self.breaks.stop();
                    }
                    self.broadcast_players();
                    self.persist().await;
                }
            }

            RoomCommand::Ready { account_id, profession, dream_id, reply } => {
                let result = self.room.ready(&account_id, profession, dream_id);
                if result.is_ok() {
                    self.broadcast_players();
                    self.persist_member(&account_id).await;
                }
                let _ = reply.send(result);
            }

            RoomCommand::StartGame { conn, reply } => {
                let result = self.handle_start_game(conn);
                if result.is_ok() {
                    self.persist().await;
                }
                let _ = reply.send(result);
            }

            RoomCommand::EndGame { conn, reply } => {
                let result = self
                    .actor_account(conn)
                    .and_then(|actor| self.room.end_game(&actor));
                if result.is_ok() {
                    self.breaks.stop();
                    let snapshot = self.room.snapshot();
                    self.broadcast(ServerEvent::RoomData { room: snapshot });
                    self.persist().await;
                }
                let _ = reply.send(result);
            }

            RoomCommand::ChangeTurn { conn, target, reply } => {
                let result = self
                    .actor_account(conn)
                    .and_then(|actor| self.room.advance_turn(&actor, target));
                if result.is_ok() {
                    self.broadcast(ServerEvent::PlayerTurnChanged {
                        turn_index: target,
                        time_left: TURN_SECONDS,
                        auto: false,
                    });
                }
                let _ = reply.send(result);
            }

            RoomCommand::SyncTimer { conn, time_left } => {
                // Only the host client owns the turn clock.
                if self.room.host_conn() == Some(conn) {
                    self.room.turn.sync(time_left);
                }
            }

            RoomCommand::AutoPass { conn, reply } => {
                let result = if self.room.host_conn() == Some(conn) {
                    self.room.turn.auto_advance()
                } else {
                    Err(RoomError::NotHost)
                };
                match result {
                    Ok(new_index) => {
                        self.broadcast(ServerEvent::PlayerTurnChanged {
                            turn_index: new_index,
                            time_left: TURN_SECONDS,
                            auto: true,
                        });
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }

            RoomCommand::Transfer {
                conn,
                sender_id,
                recipient_name,
                amount,
                reported_balance,
                transaction_id,
                reply,
            } => {
                let result = self.actor_account(conn).and_then(|actor| {
                    self.room.transfer(
                        &actor,
                        &sender_id,
                        &recipient_name,
                        amount,
                        reported_balance,
                        &transaction_id,
                    )
                });
                match result {
                    Ok(TransferOutcome::Applied { recipient, amount }) => {
                        // An unresolvable recipient means the debit
                        // stood but there is nobody to notify.
                        if let Some(recipient) = &recipient {
                            let from_name = self
                                .room
                                .member(&sender_id)
                                .map(|m| m.display_name.clone())
                                .unwrap_or_default();
                            self.send_to(
                                recipient,
                                ServerEvent::TransferReceived {
                                    from_name,
                                    amount,
                                },
                            );
                        }
                        self.broadcast_players();
                        self.persist().await;
                        let _ = reply.send(Ok(()));
                    }
                    Ok(TransferOutcome::Duplicate) => {
                        // Replay: success-shaped no-op.
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }

            RoomCommand::PayCredit {
                account_id,
                credit_type,
                amount,
                reply,
            } => {
                let result =
                    self.room.pay_credit(&account_id, &credit_type, amount);
                if result.is_ok() {
                    self.broadcast_players();
                    self.persist_member(&account_id).await;
                }
                let _ = reply.send(result);
            }

            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.room.snapshot());
            }

            RoomCommand::Shutdown => {
                tracing::info!(room_id = %self.room.id, "room shutting down");
                return true;
            }
        }
        false
    }

    fn handle_start_game(&mut self, conn: ConnId) -> Result<(), RoomError> {
        let actor = self.actor_account(conn)?;
        self.room.start_game(&actor, &mut rand::rng())?;
        self.breaks
            .start(Instant::now(), self.room.duration_minutes);
        let turn_index = self.room.turn.index().unwrap_or(0);
        self.broadcast(ServerEvent::GameStarted {
            players: self.room.members_snapshot(),
            turn_index,
            time_left: TURN_SECONDS,
        });
        Ok(())
    }

    /// Resolves the member behind a connection, for commands whose wire
    /// form carries no account id.
    fn actor_account(&self, conn: ConnId) -> Result<AccountId, RoomError> {
        self.room
            .member_by_conn(conn)
            .map(|m| m.account_id.clone())
            .ok_or_else(|| RoomError::MemberNotFound(conn.to_string()))
    }

    async fn fire_break(&mut self) {
        let now = Instant::now();
        match self.breaks.fire(now) {
            Some(BreakEvent::Started { ends_at }) => {
                let ends_at_ms = now_ms()
                    + ends_at.saturating_duration_since(now).as_millis() as u64;
                self.broadcast(ServerEvent::BreakStarted { ends_at_ms });
            }
            Some(BreakEvent::Ended) => {
                self.broadcast(ServerEvent::BreakEnded);
            }
            None => {}
        }
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    fn broadcast_players(&self) {
        self.broadcast(ServerEvent::PlayersUpdate {
            players: self.room.members_snapshot(),
        });
    }

    /// Sends an event to every connected member. Dead channels are
    /// dropped silently; the disconnect notification will follow.
    fn broadcast(&self, event: ServerEvent) {
        for member in self.room.members() {
            if member.connected {
                self.send_to(&member.account_id, event.clone());
            }
        }
    }

    fn send_to(&self, account_id: &AccountId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(account_id) {
            let _ = sender.send(event);
        }
    }

    // -----------------------------------------------------------------
    // Persistence (fire-and-forget)
    // -----------------------------------------------------------------

    async fn persist(&self) {
        let snapshot = self.room.snapshot();
        if let Err(e) = self.store.save_room(&snapshot).await {
            tracing::warn!(
                room_id = %self.room.id,
                error = %e,
                "failed to persist room, continuing with in-memory state"
            );
        }
    }

    async fn persist_member(&self, account_id: &AccountId) {
        let Some(member) = self.room.member(account_id) else {
            return;
        };
        let snapshot = member.snapshot();
        if let Err(e) = self.store.save_player(&self.room.id, &snapshot).await {
            tracing::warn!(
                room_id = %self.room.id,
                %account_id,
                error = %e,
                "failed to persist member, continuing with in-memory state"
            );
        }
    }
}

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Spawns a room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room<S: RoomStore>(room: Room, store: Arc<S>) -> RoomHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
    let room_id = room.id.clone();

    let actor = RoomActor {
        room,
        breaks: BreakScheduler::new(),
        senders: HashMap::new(),
        store,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
