//! Error types for the identity layer.

use ratrace_protocol::AccountId;

/// Errors that can occur during account operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Registration attempted with a username that is already taken
    /// (comparison is case-insensitive).
    #[error("username {0:?} is already taken")]
    UsernameTaken(String),

    /// Registration attempted without a username.
    #[error("a username is required to register")]
    MissingUsername,

    /// Login attempted with the wrong password.
    #[error("wrong password")]
    WrongPassword,

    /// No account with the given id.
    #[error("account {0} not found")]
    NotFound(AccountId),
}
