use std::sync::Arc;

use anyhow::Result;
use client_sdk::{FileSessionStorage, RpcClient, SessionStorage};
use common::Credentials;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::auth;
use crate::config::ConsoleConfig;
use crate::control_loop::ControlLoop;
use crate::credentials::CredentialStore;
use crate::forms::FormName;
use crate::hooks::{Hook, HookRunner};
use crate::registry::ApiRegistry;
use crate::routes::{RouteDecl, RouteMatch, RouteTable, Router, console_routes};
use crate::services::Services;
use crate::state::{Action, AppState, Dispatcher, Signal, Store};

/// Owns the store, the router, the hook table and the control loop.
pub struct Console {
    services: Services,
    store: Store,
    router: Router,
    hooks: Arc<HookRunner>,
    control_loop: ControlLoop<HookRunner>,
}

impl Console {
    /// Session persisted under `config.session_dir`.
    pub fn from_config(config: ConsoleConfig) -> Result<Self> {
        let storage = Arc::new(FileSessionStorage::new(config.session_dir.clone()));
        Self::build(config, storage)
    }

    pub fn build(config: ConsoleConfig, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        Self::build_with_routes(config, storage, console_routes())
    }

    /// Fails when a route declares a hook that does not exist or that the
    /// control loop cannot run.
    pub fn build_with_routes(
        config: ConsoleConfig,
        storage: Arc<dyn SessionStorage>,
        routes: Vec<RouteDecl>,
    ) -> Result<Self> {
        let table = Arc::new(RouteTable::build(routes)?);
        let store = Store::new();
        let router = Router::new(table, store.clone());

        let credentials = CredentialStore::new(store.clone(), storage, config.session_key.clone());
        let registry = ApiRegistry::new(RpcClient::new(config.endpoint()), credentials.clone());
        let interval = config.control_loop_interval();

        let services = Services {
            config: Arc::new(config),
            registry,
            credentials,
        };
        let hooks = Arc::new(HookRunner::new(services.clone()));
        let control_loop = ControlLoop::new(hooks.clone(), store.clone(), router.clone(), interval);

        Ok(Self {
            services,
            store,
            router,
            hooks,
            control_loop,
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.services.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn state(&self) -> AppState {
        self.store.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.store.subscribe()
    }

    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.store.signals()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.store.clone(), self.router.clone())
    }

    /// Cold start: restore a remembered session, then land on `initial_path`
    /// and start refreshing it.
    pub async fn initialize(&self, initial_path: &str) -> Result<RouteMatch> {
        self.restore_session().await;
        self.store.dispatch(Action::SetInitialized(true));

        let route = self.navigate(initial_path)?;
        self.control_loop.start()?;
        Ok(route)
    }

    pub async fn restore_session(&self) -> bool {
        auth::initialize(&self.services, &self.dispatcher()).await
    }

    pub fn navigate(&self, path: &str) -> Result<RouteMatch> {
        self.router.navigate(path)
    }

    pub async fn run_hook(&self, hook: Hook) {
        self.hooks.run(hook, &self.dispatcher()).await;
    }

    pub fn update_form(&self, form: FormName, values: Map<String, Value>) {
        self.store.dispatch(Action::SetForm {
            name: form,
            snapshot: form.snapshot(values),
        });
    }

    pub async fn login(&self, credentials: Credentials) -> bool {
        auth::login(&self.services, &self.dispatcher(), credentials, false).await
    }

    pub fn logout(&self) {
        auth::logout(&self.services, &self.dispatcher());
    }

    pub fn start_control_loop(&self) -> Result<()> {
        self.control_loop.start()
    }

    pub fn stop_control_loop(&self) -> Result<()> {
        self.control_loop.stop()
    }

    pub fn is_control_loop_running(&self) -> bool {
        self.control_loop.is_running()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.control_loop.stop()?;
        info!("console shut down");
        Ok(())
    }
}
