// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential stores.
//!
//! [`FileCredentialStore`] keeps the authenticated user in memory and mirrors
//! every change to a JSON file so the offline runner and a restarted daemon
//! see the latest renewed token. [`MemoryCredentialStore`] is the same
//! without the file.

pub mod persist;

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::session::epoch_ms;
use crate::upstream::{CredentialStore, UserRecord};

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    user: RwLock<Option<UserRecord>>,
}

impl MemoryCredentialStore {
    pub fn new(user: Option<UserRecord>) -> Self {
        Self { user: RwLock::new(user) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn token(&self) -> Option<String> {
        self.user.read().as_ref().and_then(|u| u.token.clone())
    }

    fn token_expiration(&self) -> Option<u64> {
        self.user.read().as_ref().and_then(|u| u.token_expiration)
    }

    fn user(&self) -> Option<UserRecord> {
        self.user.read().clone()
    }

    fn set_user(&self, user: UserRecord) -> anyhow::Result<()> {
        *self.user.write() = Some(user);
        Ok(())
    }

    fn refresh_token(&self) -> Option<String> {
        self.user.read().as_ref().and_then(|u| u.refresh_token.clone())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.user.write() = None;
        Ok(())
    }
}

/// JSON-file-backed credential store.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    user: RwLock<Option<UserRecord>>,
}

impl FileCredentialStore {
    /// Open the store, loading the file if it exists.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = persist::load(path)?;
        if file.user.is_some() {
            info!(path = %path.display(), "loaded persisted credentials");
        } else {
            debug!(path = %path.display(), "no persisted credentials");
        }
        Ok(Self { path: path.to_owned(), user: RwLock::new(file.user) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, user: Option<UserRecord>) -> anyhow::Result<()> {
        // Hold the write lock across the file write so disk and memory agree.
        let mut guard = self.user.write();
        persist::save(
            &self.path,
            &persist::CredentialFile { user: user.clone(), saved_at_ms: epoch_ms() },
        )?;
        *guard = user;
        debug!(path = %self.path.display(), "persisted credentials");
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn token(&self) -> Option<String> {
        self.user.read().as_ref().and_then(|u| u.token.clone())
    }

    fn token_expiration(&self) -> Option<u64> {
        self.user.read().as_ref().and_then(|u| u.token_expiration)
    }

    fn user(&self) -> Option<UserRecord> {
        self.user.read().clone()
    }

    fn set_user(&self, user: UserRecord) -> anyhow::Result<()> {
        self.write(Some(user))
    }

    fn refresh_token(&self) -> Option<String> {
        self.user.read().as_ref().and_then(|u| u.refresh_token.clone())
    }

    fn clear(&self) -> anyhow::Result<()> {
        self.write(None)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
