//! The balance ledger: member-to-member transfers and credit payoff.
//!
//! All amounts are integer currency units. Transfers carry a
//! client-generated transaction id and are idempotent: a replayed id is
//! a success-shaped no-op, never an error, so a client that resends
//! after a flaky ack cannot double-spend.
//!
//! One asymmetric trust decision is preserved from the observed
//! behavior: when the sender's client reports its own balance alongside
//! a transfer, that reported figure is honored over the server-held one
//! for both the funds check and the debit.

use ratrace_protocol::AccountId;

use crate::room::Room;
use crate::RoomError;

/// Granularity of credit payments. Payoffs must be positive multiples
/// of this.
pub const CREDIT_UNIT: i64 = 1000;

/// Result of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Funds moved. `recipient` is the credited member's stable id, or
    /// `None` when no member matched the requested display name — the
    /// debit stands either way.
    Applied {
        recipient: Option<AccountId>,
        amount: i64,
    },
    /// The transaction id was seen before; nothing changed.
    Duplicate,
}

impl Room {
    /// Moves `amount` from the sender to the member named
    /// `recipient_name`, at the host's request.
    ///
    /// When `reported_balance` is present it replaces the server-held
    /// sender balance before the funds check, so the debit is applied
    /// against the reported figure.
    ///
    /// The debit does not depend on the recipient resolving: when no
    /// member carries that display name the money leaves the game
    /// (payments to the bank arrive this way). When one does, they are
    /// credited exactly what the sender is debited.
    ///
    /// # Errors
    /// [`RoomError::NotHost`] unless `actor` holds the host seat,
    /// [`RoomError::Validation`] for non-positive amounts,
    /// [`RoomError::MemberNotFound`] for an unknown sender,
    /// [`RoomError::InsufficientFunds`] when the (possibly reported)
    /// balance cannot cover the amount.
    pub fn transfer(
        &mut self,
        actor: &AccountId,
        sender_id: &AccountId,
        recipient_name: &str,
        amount: i64,
        reported_balance: Option<i64>,
        transaction_id: &str,
    ) -> Result<TransferOutcome, RoomError> {
        if self.host.as_ref() != Some(actor) {
            return Err(RoomError::NotHost);
        }
        if amount <= 0 {
            return Err(RoomError::Validation(format!(
                "transfer amount must be positive, got {amount}"
            )));
        }
        if self.applied_tx.contains(transaction_id) {
            tracing::debug!(
                room_id = %self.id,
                transaction_id,
                "duplicate transaction id, ignoring"
            );
            return Ok(TransferOutcome::Duplicate);
        }

        let sender = self
            .member_mut(sender_id)
            .ok_or_else(|| RoomError::MemberNotFound(sender_id.0.clone()))?;

        let balance = reported_balance.unwrap_or(sender.balance);
        if balance < amount {
            return Err(RoomError::InsufficientFunds { balance, amount });
        }
        sender.balance = balance - amount;

        let recipient = self
            .members()
            .iter()
            .find(|m| m.display_name == recipient_name)
            .map(|m| m.account_id.clone());
        if let Some(id) = &recipient {
            if let Some(r) = self.member_mut(id) {
                r.balance += amount;
            }
        }
        self.applied_tx.insert(transaction_id.to_string());

        tracing::info!(
            room_id = %self.id,
            sender = %sender_id,
            recipient = recipient.as_ref().map(|r| r.0.as_str()),
            amount,
            transaction_id,
            "transfer applied"
        );
        Ok(TransferOutcome::Applied { recipient, amount })
    }

    /// Pays down one of a member's credits from their balance.
    ///
    /// Payments are positive multiples of [`CREDIT_UNIT`], capped at the
    /// outstanding amount for that credit type. A credit paid to zero
    /// disappears from the member's books.
    pub fn pay_credit(
        &mut self,
        account_id: &AccountId,
        credit_type: &str,
        amount: i64,
    ) -> Result<(), RoomError> {
        if amount <= 0 || amount % CREDIT_UNIT != 0 {
            return Err(RoomError::Validation(format!(
                "credit payment must be a positive multiple of {CREDIT_UNIT}, got {amount}"
            )));
        }

        let room_id = self.id.clone();
        let member = self
            .member_mut(account_id)
            .ok_or_else(|| RoomError::MemberNotFound(account_id.0.clone()))?;

        let outstanding = member.credits.get(credit_type).copied().unwrap_or(0);
        if amount > outstanding {
            return Err(RoomError::CreditExceeded { outstanding, amount });
        }
        if member.balance < amount {
            return Err(RoomError::InsufficientFunds {
                balance: member.balance,
                amount,
            });
        }

        member.balance -= amount;
        let remaining = outstanding - amount;
        if remaining == 0 {
            member.credits.remove(credit_type);
        } else {
            member.credits.insert(credit_type.to_string(), remaining);
        }

        tracing::info!(
            room_id = %room_id,
            %account_id,
            credit_type,
            amount,
            remaining,
            "credit payment applied"
        );
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
