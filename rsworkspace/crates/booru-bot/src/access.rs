//! Who may run which command.
//!
//! Every entry point goes through [`AccessPolicy::authorize`]; there are no
//! per-command ownership checks elsewhere.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::errors::CommandError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessConfig {
    /// Users treated as bot owners, in addition to the application owner
    #[serde(default)]
    pub owner_users: Vec<u64>,
    /// Restrict `booru add` to owners
    #[serde(default = "default_true")]
    pub owner_only_add: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            owner_users: Vec::new(),
            owner_only_add: true,
        }
    }
}

impl AccessConfig {
    /// Configuration smells worth logging at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.owner_users.is_empty() {
            out.push(
                "owner_users is empty; owner-only commands are limited to the application owner"
                    .to_string(),
            );
        }
        if !self.owner_only_add {
            out.push("owner_only_add is false; any user can upload with `booru add`".to_string());
        }
        out
    }
}

fn default_true() -> bool {
    true
}

/// The guarded entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ContextImport,
    Add,
    Bookmarks,
}

impl CommandKind {
    /// Name used when reporting failures.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ContextImport => "Upload to booru",
            Self::Add => "add",
            Self::Bookmarks => "bookmarks",
        }
    }
}

pub struct AccessPolicy {
    owners: RwLock<HashSet<u64>>,
    owner_only_add: bool,
}

impl AccessPolicy {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            owners: RwLock::new(config.owner_users.iter().copied().collect()),
            owner_only_add: config.owner_only_add,
        }
    }

    /// Register an owner discovered at runtime (application owner, team members).
    pub fn add_owner(&self, user_id: u64) {
        self.owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id);
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user_id)
    }

    pub fn authorize(&self, user_id: u64, kind: CommandKind) -> Result<(), CommandError> {
        let owner_only = match kind {
            CommandKind::ContextImport | CommandKind::Bookmarks => true,
            CommandKind::Add => self.owner_only_add,
        };
        if owner_only && !self.is_owner(user_id) {
            return Err(CommandError::NotOwner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(owners: &[u64], owner_only_add: bool) -> AccessPolicy {
        AccessPolicy::new(&AccessConfig {
            owner_users: owners.to_vec(),
            owner_only_add,
        })
    }

    #[test]
    fn owners_pass_every_command() {
        let p = policy(&[1], true);
        for kind in [CommandKind::ContextImport, CommandKind::Add, CommandKind::Bookmarks] {
            assert!(p.authorize(1, kind).is_ok(), "{kind:?}");
        }
    }

    #[test]
    fn strangers_are_rejected_from_owner_commands() {
        let p = policy(&[1], true);
        for kind in [CommandKind::ContextImport, CommandKind::Add, CommandKind::Bookmarks] {
            assert!(matches!(p.authorize(2, kind), Err(CommandError::NotOwner)));
        }
    }

    #[test]
    fn add_can_be_opened_up() {
        let p = policy(&[1], false);
        assert!(p.authorize(2, CommandKind::Add).is_ok());
        assert!(p.authorize(2, CommandKind::Bookmarks).is_err());
        assert!(p.authorize(2, CommandKind::ContextImport).is_err());
    }

    #[test]
    fn discovered_owner_is_authorized() {
        let p = policy(&[], true);
        assert!(p.authorize(7, CommandKind::Bookmarks).is_err());
        p.add_owner(7);
        assert!(p.authorize(7, CommandKind::Bookmarks).is_ok());
    }

    #[test]
    fn warnings_flag_open_config() {
        assert!(AccessConfig { owner_users: vec![1], owner_only_add: true }.warnings().is_empty());
        let w = AccessConfig { owner_users: vec![], owner_only_add: false }.warnings();
        assert_eq!(w.len(), 2);
    }
}
