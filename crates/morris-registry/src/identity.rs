//! The identity registry: canonical player identities.
//!
//! Clients echo back identity *handles* (plain strings); the server must
//! map those back to the one canonical identity it tracks, because only the
//! canonical instance carries the live output channel. That mapping is what
//! [`IdentityRegistry::resolve`] does.

use std::collections::HashMap;
use std::fmt;

use crate::{OutboundSender, RegistryError};

/// A unique identifier for a registered identity.
///
/// Newtype over `u64` so an identity id can't be confused with a game id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId(pub u64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

/// A canonical player identity.
///
/// Stable and equality-comparable for the registry's lifetime. The output
/// channel is the only live attachment: it is replaced on re-login and
/// reconnect, never the identity itself.
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    channel: OutboundSender,
}

impl Identity {
    /// Returns the handle clients see and echo back. The credential
    /// gateway enforces account-name uniqueness, so the handle is the
    /// account name.
    pub fn handle(&self) -> String {
        self.name.clone()
    }

    /// Returns a clone of the identity's current output channel.
    pub fn channel(&self) -> OutboundSender {
        self.channel.clone()
    }
}

/// Process-wide store of known identities.
///
/// Not internally locked — owned by [`Registry`](crate::Registry) and
/// guarded by the server's coordinating lock.
#[derive(Default)]
pub struct IdentityRegistry {
    identities: HashMap<IdentityId, Identity>,
    next_id: u64,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates or reuses the canonical identity for a name.
    ///
    /// The credential gateway's online lock guarantees one live session
    /// per account name, so a returning account reuses its identity with
    /// the channel swapped to the new connection.
    pub fn register(&mut self, name: &str, channel: OutboundSender) -> IdentityId {
        if let Some(existing) = self.identities.values_mut().find(|i| i.name == name) {
            existing.channel = channel;
            tracing::debug!(name, id = %existing.id, "identity reused");
            return existing.id;
        }

        self.next_id += 1;
        let id = IdentityId(self.next_id);
        let identity = Identity {
            id,
            name: name.to_string(),
            channel,
        };
        tracing::debug!(handle = %identity.handle(), %id, "identity registered");
        self.identities.insert(id, identity);
        id
    }

    /// Maps a client-echoed handle back to the canonical identity.
    ///
    /// # Errors
    /// [`RegistryError::UnknownIdentity`] for zero matches. More than one
    /// match can't be caused by a client; it's logged and reported as
    /// [`RegistryError::DuplicateIdentity`].
    pub fn resolve(&self, handle: &str) -> Result<IdentityId, RegistryError> {
        let mut matches = self.identities.values().filter(|i| i.handle() == handle);
        let first = matches
            .next()
            .ok_or_else(|| RegistryError::UnknownIdentity(handle.to_string()))?;
        if matches.next().is_some() {
            tracing::error!(handle, "more than one identity matched, this should never happen");
            return Err(RegistryError::DuplicateIdentity(handle.to_string()));
        }
        Ok(first.id)
    }

    /// Looks up an identity by id.
    pub fn get(&self, id: IdentityId) -> Option<&Identity> {
        self.identities.get(&id)
    }

    /// Returns the handle for an id, if registered.
    pub fn handle_of(&self, id: IdentityId) -> Option<String> {
        self.identities.get(&id).map(Identity::handle)
    }

    /// Returns the account name for an id. Needed for credential-gateway
    /// calls, which speak account names.
    pub fn name_of(&self, id: IdentityId) -> Option<String> {
        self.identities.get(&id).map(|i| i.name.clone())
    }

    /// Replaces the output channel attached to an identity.
    pub fn rebind_channel(&mut self, id: IdentityId, channel: OutboundSender) {
        if let Some(identity) = self.identities.get_mut(&id) {
            identity.channel = channel;
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
