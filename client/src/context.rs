//! Explicitly constructed application context.
//!
//! Everything a session or a listing needs is built once here and passed
//! down; nothing is looked up from globals.

use crate::backend::{FileBackend, StorageWatcher};
use crate::bank::{DirQuestionBank, HttpQuestionBank, QuestionBank};
use crate::clock::TokioClock;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::remote::{HttpRemote, NullRemote, RemoteSync, User};
use autotest_engine::{Clock, SessionStore, StorageBackend, TestConfig, UnavailableBackend};
use std::sync::Arc;

/// Shared collaborators for one process.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ClientConfig>,
    pub store: Arc<SessionStore>,
    pub remote: Arc<dyn RemoteSync>,
    pub bank: Arc<dyn QuestionBank>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(
        config: ClientConfig,
        store: Arc<SessionStore>,
        remote: Arc<dyn RemoteSync>,
        bank: Arc<dyn QuestionBank>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            remote,
            bank,
            clock,
        }
    }

    /// Build every collaborator from configuration.
    ///
    /// Without an API URL the remote is a [`NullRemote`]. A state directory
    /// that cannot be created degrades to storage that keeps nothing.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());

        let backend: Arc<dyn StorageBackend> = match FileBackend::open(&config.state_dir) {
            Ok(backend) => Arc::new(backend),
            Err(e) => {
                tracing::warn!(
                    dir = %config.state_dir.display(),
                    error = %e,
                    "cannot open state directory, progress will not be kept"
                );
                Arc::new(UnavailableBackend)
            }
        };
        let store = Arc::new(SessionStore::new(backend, clock.clone()));

        let remote: Arc<dyn RemoteSync> = match &config.api_url {
            Some(url) => {
                tracing::info!(api_url = %url, "remote sync enabled");
                Arc::new(HttpRemote::new(url.clone(), config.token.clone()))
            }
            None => {
                tracing::info!("no API URL configured, running local-only");
                Arc::new(NullRemote)
            }
        };

        let bank: Arc<dyn QuestionBank> = match (&config.tests_dir, &config.api_url) {
            (Some(dir), _) => Arc::new(DirQuestionBank::new(dir.clone())),
            (None, Some(url)) => Arc::new(HttpQuestionBank::new(url.clone())),
            (None, None) => return Err(ClientError::NoQuestionBank),
        };

        Ok(Self::new(config, store, remote, bank, clock))
    }

    pub fn test_config(&self) -> TestConfig {
        self.config.test_config()
    }

    /// The signed-in user. Failures read as anonymous.
    pub async fn current_user(&self) -> Option<User> {
        match self.remote.current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "auth check failed, continuing without remote sync");
                None
            }
        }
    }

    /// Start picking up store changes made by other processes.
    pub fn watch_storage(&self) -> StorageWatcher {
        StorageWatcher::spawn(self.store.clone(), self.config.storage_poll_interval())
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
