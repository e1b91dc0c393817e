//! Per-invocation state: configuration, storage and the API handle.

use std::sync::Arc;

use crumb_client::session::{Identity, SessionState};
use crumb_client::{Access, Api, CartStore, ClientConfig, FileStore, Guard, KeyValueStore};
use crumb_core::Role;
use tracing::debug;

use crate::error::{CliError, CliResult};

pub struct Context {
    pub config: ClientConfig,
    storage: Arc<dyn KeyValueStore>,
    pub api: Api,
}

impl Context {
    /// Open the state file and restore the stored session.
    pub async fn open(config: ClientConfig) -> CliResult<Self> {
        let store = FileStore::open(config.storage_path())?;
        debug!(path = %store.path().display(), "Opened state file");
        let storage: Arc<dyn KeyValueStore> = Arc::new(store);
        let api = Api::connect(&config, Arc::clone(&storage)).await?;
        Ok(Self {
            config,
            storage,
            api,
        })
    }

    /// The cart of whoever is logged in, or the guest cart. It keeps
    /// following the session if someone logs out mid-command.
    pub fn cart(&self) -> CliResult<CartStore> {
        Ok(CartStore::follow(Arc::clone(&self.storage), self.api.session())?)
    }

    /// Check `guard` against the session.
    pub async fn require(&self, guard: Guard) -> CliResult<Identity> {
        let state = self.api.session().state().await;
        match guard.check(&state) {
            Access::Granted(identity) => Ok(identity.clone()),
            Access::RedirectHome(home) => {
                let role = match &state {
                    SessionState::Authenticated(identity) => identity.role,
                    SessionState::Loading | SessionState::Anonymous => Role::Customer,
                };
                Err(CliError::Forbidden { role, home })
            }
            Access::Loading | Access::RedirectToLogin(_) => Err(CliError::NotLoggedIn),
        }
    }
}
