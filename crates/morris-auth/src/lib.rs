//! Credential gateway for the morris server.
//!
//! The server never stores credentials itself — it consumes a
//! [`CredentialGateway`]: account creation plus an exclusive *online lock*
//! per account. Holding the lock is what "being logged in" means; a second
//! login attempt for the same account fails until the lock is released.
//!
//! [`MemoryCredentials`] is the bundled in-process implementation. A
//! database-backed gateway implements the same trait without any change to
//! the connection handler.

mod error;
mod gateway;
mod memory;

pub use error::CredentialError;
pub use gateway::CredentialGateway;
pub use memory::MemoryCredentials;
