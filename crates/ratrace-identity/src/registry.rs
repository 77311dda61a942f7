//! The identity registry: every account the process knows about.
//!
//! # Concurrency note
//!
//! `IdentityRegistry` is NOT thread-safe by itself — plain `HashMap`s,
//! no interior locking. The orchestrator owns it behind a single mutex
//! and every handler access goes through that, so keeping this layer
//! lock-free avoids doubling up.

use std::collections::HashMap;

use ratrace_protocol::{AccountId, ConnId};

use crate::account::{Account, generate_id};
use crate::IdentityError;

/// Result of a successful `authenticate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The email was unknown; a new account was created.
    Registered(AccountId),
    /// The email was known; the existing account logged in.
    LoggedIn(AccountId),
}

impl AuthOutcome {
    /// The account id regardless of which path was taken.
    pub fn account_id(&self) -> &AccountId {
        match self {
            Self::Registered(id) | Self::LoggedIn(id) => id,
        }
    }
}

/// Directory of all accounts, with secondary indexes by email and by
/// lowercased username. The three maps are kept in sync by every
/// mutating method.
pub struct IdentityRegistry {
    accounts: HashMap<AccountId, Account>,
    /// Email → account id. Emails are the login key and stored verbatim.
    emails: HashMap<String, AccountId>,
    /// Lowercased username → account id. Uniqueness is case-insensitive.
    usernames: HashMap<String, AccountId>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            emails: HashMap::new(),
            usernames: HashMap::new(),
        }
    }

    /// Login-or-register, keyed by email.
    ///
    /// If the email is known: verify the password, refresh the account's
    /// transport id, stamp the login time. If it is unknown: register a
    /// new account, which requires a username that is not yet taken
    /// (case-insensitively).
    ///
    /// # Errors
    /// - [`IdentityError::WrongPassword`] on a failed login
    /// - [`IdentityError::MissingUsername`] when registering without one
    /// - [`IdentityError::UsernameTaken`] on a username collision
    pub fn authenticate(
        &mut self,
        username: Option<&str>,
        email: &str,
        password: &str,
        conn: ConnId,
        now_ms: u64,
    ) -> Result<AuthOutcome, IdentityError> {
        if let Some(id) = self.emails.get(email).cloned() {
            let account = self
                .accounts
                .get_mut(&id)
                .expect("email index points at existing account");
            if account.password != password {
                return Err(IdentityError::WrongPassword);
            }
            account.last_conn = Some(conn);
            account.last_login_ms = now_ms;
            tracing::info!(account_id = %id, %conn, "account logged in");
            return Ok(AuthOutcome::LoggedIn(id));
        }

        let username = username.ok_or(IdentityError::MissingUsername)?;
        let key = username.to_lowercase();
        if self.usernames.contains_key(&key) {
            return Err(IdentityError::UsernameTaken(username.to_string()));
        }

        let id = AccountId(generate_id());
        let account = Account {
            id: id.clone(),
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            last_conn: Some(conn),
            created_at_ms: now_ms,
            last_login_ms: now_ms,
        };

        self.emails.insert(email.to_string(), id.clone());
        self.usernames.insert(key, id.clone());
        self.accounts.insert(id.clone(), account);

        tracing::info!(account_id = %id, %conn, "account registered");
        Ok(AuthOutcome::Registered(id))
    }

    /// Whether an account exists for this email.
    pub fn user_exists(&self, email: &str) -> bool {
        self.emails.contains_key(email)
    }

    /// Whether this username is still free (case-insensitive).
    pub fn username_unique(&self, username: &str) -> bool {
        !self.usernames.contains_key(&username.to_lowercase())
    }

    /// Looks up an account by stable id.
    pub fn find(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// The display name for an account id, if the account exists.
    ///
    /// Used as the fallback when resolving a room's host name and the
    /// host is not among the room's current members.
    pub fn display_name(&self, id: &AccountId) -> Option<&str> {
        self.accounts.get(id).map(|a| a.username.as_str())
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for IdentityRegistry {
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

    fn conn(id: u64) -> ConnId {
        ConnId(id)
    }

    fn register(reg: &mut IdentityRegistry, name: &str, email: &str) -> AccountId {
        reg.authenticate(Some(name), email, "pw", conn(1), 100)
            .expect("registration should succeed")
            .account_id()
            .clone()
    }

    // =====================================================================
    // authenticate() — registration path
    // =====================================================================

    #[test]
    fn test_authenticate_unknown_email_registers() {
        let mut reg = IdentityRegistry::new();

        let outcome = reg
            .authenticate(Some("Alice"), "a@x.com", "pw", conn(1), 100)
            .unwrap();

        assert!(matches!(outcome, AuthOutcome::Registered(_)));
        let account = reg.find(outcome.account_id()).unwrap();
        assert_eq!(account.username, "Alice");
        assert_eq!(account.email, "a@x.com");
        assert_eq!(account.last_conn, Some(conn(1)));
        assert_eq!(account.created_at_ms, 100);
    }

    #[test]
    fn test_authenticate_register_without_username_fails() {
        let mut reg = IdentityRegistry::new();

        let result = reg.authenticate(None, "a@x.com", "pw", conn(1), 0);

        assert!(matches!(result, Err(IdentityError::MissingUsername)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_authenticate_duplicate_username_case_insensitive() {
        let mut reg = IdentityRegistry::new();
        register(&mut reg, "Alice", "a@x.com");

        let result =
            reg.authenticate(Some("ALICE"), "other@x.com", "pw", conn(2), 0);

        assert!(
            matches!(result, Err(IdentityError::UsernameTaken(_))),
            "uniqueness must ignore case"
        );
        assert_eq!(reg.len(), 1);
    }

    // =====================================================================
    // authenticate() — login path
    // =====================================================================

    #[test]
    fn test_authenticate_known_email_logs_in_and_refreshes_conn() {
        let mut reg = IdentityRegistry::new();
        let id = register(&mut reg, "Alice", "a@x.com");

        let outcome = reg
            .authenticate(None, "a@x.com", "pw", conn(9), 500)
            .unwrap();

        assert_eq!(outcome, AuthOutcome::LoggedIn(id.clone()));
        let account = reg.find(&id).unwrap();
        assert_eq!(account.last_conn, Some(conn(9)));
        assert_eq!(account.last_login_ms, 500);
    }

    #[test]
    fn test_authenticate_wrong_password_rejected() {
        let mut reg = IdentityRegistry::new();
        register(&mut reg, "Alice", "a@x.com");

        let result =
            reg.authenticate(None, "a@x.com", "wrong", conn(2), 0);

        assert!(matches!(result, Err(IdentityError::WrongPassword)));
    }

    #[test]
    fn test_authenticate_login_ignores_supplied_username() {
        // A login request may still carry a username; the stored one wins.
        let mut reg = IdentityRegistry::new();
        let id = register(&mut reg, "Alice", "a@x.com");

        reg.authenticate(Some("Impostor"), "a@x.com", "pw", conn(2), 0)
            .unwrap();

        assert_eq!(reg.find(&id).unwrap().username, "Alice");
        assert!(reg.username_unique("Impostor"));
    }

    // =====================================================================
    // Lookups
    // =====================================================================

    #[test]
    fn test_user_exists() {
        let mut reg = IdentityRegistry::new();
        assert!(!reg.user_exists("a@x.com"));
        register(&mut reg, "Alice", "a@x.com");
        assert!(reg.user_exists("a@x.com"));
    }

    #[test]
    fn test_username_unique_is_case_insensitive() {
        let mut reg = IdentityRegistry::new();
        register(&mut reg, "Bob", "b@x.com");

        assert!(!reg.username_unique("bob"));
        assert!(!reg.username_unique("BOB"));
        assert!(reg.username_unique("bobby"));
    }

    #[test]
    fn test_display_name_resolves() {
        let mut reg = IdentityRegistry::new();
        let id = register(&mut reg, "Carol", "c@x.com");

        assert_eq!(reg.display_name(&id), Some("Carol"));
        assert_eq!(reg.display_name(&AccountId("ghost".into())), None);
    }
}
