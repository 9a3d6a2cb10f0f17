//! Error types for the credential gateway.

/// Errors that can occur during account and online-lock operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// An account with this name already exists.
    #[error("account name '{0}' is already taken")]
    NameTaken(String),

    /// The name/password pair didn't match any account.
    #[error("wrong name or password")]
    BadCredentials,

    /// The account's online lock is already held by another session.
    #[error("account '{0}' is already online")]
    AlreadyOnline(String),

    /// Tried to release a lock that wasn't held.
    #[error("account '{0}' is not online")]
    NotOnline(String),
}
