use std::sync::Arc;

use crate::config::ConsoleConfig;
use crate::credentials::CredentialStore;
use crate::registry::ApiRegistry;

/// What every saga needs besides a dispatcher.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<ConsoleConfig>,
    pub registry: ApiRegistry,
    pub credentials: CredentialStore,
}
