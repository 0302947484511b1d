use async_trait::async_trait;
use ldap3::{Mod, Scope};

use crate::entry::DirectoryEntry;
use crate::error::CoreError;
use crate::filter::Filter;

/// Result of a single modify request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    Applied,
    /// The server already held the value being added.
    AlreadyPresent,
}

/// A source of directory sessions. Every logical operation opens its own
/// session and closes it before returning.
#[async_trait]
pub trait Directory: Send + Sync {
    type Session: DirectorySession;

    async fn connect(&self) -> Result<Self::Session, CoreError>;
}

/// An open, bound directory session.
#[async_trait]
pub trait DirectorySession: Send {
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &Filter,
        scope: Scope,
        attrs: &[String],
    ) -> Result<Vec<DirectoryEntry>, CoreError>;

    async fn modify(&mut self, dn: &str, mods: Vec<Mod<String>>)
        -> Result<ModifyOutcome, CoreError>;

    async fn close(&mut self) -> Result<(), CoreError>;
}
