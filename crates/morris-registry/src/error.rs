//! Error types for the registry layer.

/// Errors that can occur while resolving identities or operating on games.
///
/// Registry compound operations themselves don't return domain errors; the
/// connection handler decides per case whether a failure is reported to the
/// client or only logged.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A client-echoed handle matched no registered identity.
    #[error("unknown identity '{0}'")]
    UnknownIdentity(String),

    /// A handle matched more than one identity. User input can't cause
    /// this; it means a registry invariant broke.
    #[error("identity '{0}' is ambiguous, registry invariant violated")]
    DuplicateIdentity(String),

    /// The acting identity isn't a player of the targeted game.
    #[error("identity is not a player of this game")]
    IllegalPlayer,
}
