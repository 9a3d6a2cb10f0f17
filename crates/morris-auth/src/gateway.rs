//! The credential gateway trait.

use std::future::Future;

use crate::CredentialError;

/// Account registration and the per-account online lock.
///
/// `Send + Sync + 'static` so one gateway instance can be shared across
/// every connection task. The methods return `impl Future + Send` so the
/// futures can run inside spawned tasks; implementors just write
/// `async fn`.
///
/// The connection handler collapses [`CredentialError::BadCredentials`]
/// and [`CredentialError::AlreadyOnline`] into a single client-facing
/// message, so implementations are free to be precise in their errors.
pub trait CredentialGateway: Send + Sync + 'static {
    /// Creates a new account.
    ///
    /// # Errors
    /// [`CredentialError::NameTaken`] if the name already exists.
    fn create_account(
        &self,
        name: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), CredentialError>> + Send;

    /// Acquires the exclusive online lock for an account.
    ///
    /// # Errors
    /// [`CredentialError::BadCredentials`] for a wrong name/password,
    /// [`CredentialError::AlreadyOnline`] if the lock is already held.
    fn acquire_online_lock(
        &self,
        name: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), CredentialError>> + Send;

    /// Releases the online lock for an account.
    ///
    /// # Errors
    /// [`CredentialError::NotOnline`] if the account wasn't locked.
    fn release_online_lock(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<(), CredentialError>> + Send;
}
