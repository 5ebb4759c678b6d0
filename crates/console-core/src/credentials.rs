use std::sync::Arc;

use anyhow::{Context, Result};
use client_sdk::SessionStorage;
use common::Credentials;
use tracing::{debug, warn};

use crate::state::{Action, Store};

/// The single in-memory session plus its optional durable copy.
#[derive(Clone)]
pub struct CredentialStore {
    store: Store,
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl CredentialStore {
    pub fn new(store: Store, storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        Self {
            store,
            storage,
            key: key.into(),
        }
    }

    /// Visible to the very next `get`, there is no caching in between.
    pub fn set(&self, credentials: Option<Credentials>) {
        self.store.dispatch(Action::SetUser(credentials));
    }

    pub fn get(&self) -> Option<Credentials> {
        self.store.read(|state| state.user.clone())
    }

    pub fn persist(&self, credentials: &Credentials) -> Result<()> {
        let raw = serde_json::to_string(credentials).context("failed to encode session")?;
        self.storage.save(&self.key, &raw)?;
        debug!(name = %credentials.name, "session persisted");
        Ok(())
    }

    /// `None` for a missing, unreadable or incomplete session.
    pub fn load_persisted(&self) -> Option<Credentials> {
        let raw = match self.storage.load(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read persisted session");
                return None;
            }
        };

        match serde_json::from_str::<Credentials>(&raw) {
            Ok(credentials) if !credentials.name.is_empty() => Some(credentials),
            Ok(_) => {
                warn!("persisted session has no name, ignoring it");
                None
            }
            Err(err) => {
                warn!(error = %err, "persisted session is corrupt, ignoring it");
                None
            }
        }
    }

    pub fn clear_persisted(&self) -> Result<()> {
        self.storage.remove(&self.key)
    }
}
