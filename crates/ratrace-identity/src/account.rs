//! The account record and id generation.

use ratrace_protocol::{AccountId, ConnId};

/// A registered player account.
///
/// Passwords are stored as received — credential hardening is explicitly
/// out of scope for the coordinator (the lookup/insert contract is the
/// whole surface).
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password: String,
    /// The transport connection this account last authenticated on.
    pub last_conn: Option<ConnId>,
    pub created_at_ms: u64,
    pub last_login_ms: u64,
}

/// Generates a random 16-character hex id (64 bits of entropy).
///
/// Used for account and room ids. Collisions are checked by the caller's
/// map insert, not here.
pub(crate) fn generate_id() -> String {
    use rand::Rng;
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
