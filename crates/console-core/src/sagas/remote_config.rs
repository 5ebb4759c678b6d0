use client_sdk::methods::ConfigLoad;
use common::RemoteConfig;
use tracing::{debug, warn};

use crate::services::Services;
use crate::state::{Action, Dispatcher};

/// Loads the public server configuration (plans, payment key).
pub async fn load(services: &Services, dispatch: &Dispatcher) {
    let result = services.registry.load::<ConfigLoad>(dispatch, &()).await;

    match result.into_result() {
        Ok(config) => {
            debug!(plans = config.plans.len(), "remote config loaded");
            dispatch.dispatch(Action::SetRemoteConfig(config));
        }
        Err(error) => {
            warn!(%error, "failed to load remote config");
            dispatch.dispatch(Action::SetRemoteConfig(RemoteConfig::default()));
        }
    }
}
