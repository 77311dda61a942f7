//! Process-wide account directory for Ratrace.
//!
//! Accounts are the *stable* half of player identity: a player keeps one
//! [`Account`] forever, while their transport connection id changes with
//! every reconnect. The room layer reconciles the two; this crate only
//! answers "who is this email/username?".
//!
//! Accounts are created on the first authentication request for an
//! unseen email, mutated on login (transport-id refresh), and never
//! deleted.

mod account;
mod error;
mod registry;

pub use account::Account;
pub use error::IdentityError;
pub use registry::{AuthOutcome, IdentityRegistry};
