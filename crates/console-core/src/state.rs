use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use client_sdk::ApiName;
use common::{Credentials, RemoteConfig, Server, Snapshot, TopLevelVolume};
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::forms::{FormName, FormSnapshot};
use crate::routes::{RouteMatch, Router};

const SIGNAL_CAPACITY: usize = 64;

/// Recorded lifecycle of one named API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiCallState {
    pub loading: bool,
    pub error: Option<String>,
    pub last_answer: Option<Value>,
    /// Ticket of the newest call started for this name.
    pub ticket: u64,
}

/// Where the session stands.
///
/// There is no logging-out phase: logout clears the session without
/// suspending, so no other step can observe it half done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    LoggedOut,
    LoggingIn,
    LoggedIn,
}

/// Events for the front end that are not state (toasts, redirects, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    AuthLoginError(String),
    AuthLoginSuccess,
    AuthRegisterError(String),
    AuthRegisterSuccess,
    Redirect(String),
    Message(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub user: Option<Credentials>,
    pub remote_config: RemoteConfig,
    pub initialized: bool,
    pub repos: Vec<TopLevelVolume>,
    pub servers: Vec<Server>,
    pub repos_loaded: bool,
    pub repo_search: String,
    pub commits: Vec<Snapshot>,
    pub commit_search: String,
    pub application_message: Option<String>,
    pub repo_form_loading: bool,
    pub collaborator_name: String,
    pub collaborator_form_loading: bool,
    pub payment_loading: bool,
    pub forms: BTreeMap<FormName, FormSnapshot>,
    pub api: BTreeMap<ApiName, ApiCallState>,
    pub route: RouteMatch,
    pub route_generation: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            user: None,
            remote_config: RemoteConfig::default(),
            initialized: false,
            repos: Vec::new(),
            servers: Vec::new(),
            repos_loaded: false,
            repo_search: String::new(),
            commits: Vec::new(),
            commit_search: String::new(),
            application_message: None,
            repo_form_loading: false,
            collaborator_name: String::new(),
            collaborator_form_loading: false,
            payment_loading: false,
            forms: BTreeMap::new(),
            api: ApiName::ALL
                .into_iter()
                .map(|name| (name, ApiCallState::default()))
                .collect(),
            route: RouteMatch::default(),
            route_generation: 0,
        }
    }
}

impl AppState {
    pub fn api(&self, name: ApiName) -> ApiCallState {
        self.api.get(&name).cloned().unwrap_or_default()
    }

    pub fn auth_phase(&self) -> AuthPhase {
        if self.user.is_some() {
            AuthPhase::LoggedIn
        } else if self.api(ApiName::AuthLogin).loading {
            AuthPhase::LoggingIn
        } else {
            AuthPhase::LoggedOut
        }
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.name.as_str())
    }

    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.route.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetUser(Option<Credentials>),
    SetInitialized(bool),
    SetRemoteConfig(RemoteConfig),
    SetRepos {
        repos: Vec<TopLevelVolume>,
        servers: Vec<Server>,
    },
    SetReposLoaded(bool),
    SetRepoSearch(String),
    SetCommits(Vec<Snapshot>),
    SetCommitSearch(String),
    SetMessage(Option<String>),
    SetRepoFormLoading(bool),
    SetCollaboratorName(String),
    SetCollaboratorFormLoading(bool),
    SetPaymentLoading(bool),
    SetForm {
        name: FormName,
        snapshot: FormSnapshot,
    },
    TouchForm(FormName),
    ResetForm(FormName),
    ApiRequest {
        name: ApiName,
        ticket: u64,
    },
    ApiResponse {
        name: ApiName,
        ticket: u64,
        answer: Value,
    },
    ApiError {
        name: ApiName,
        ticket: u64,
        error: String,
    },
    RouteChanged(RouteMatch),
}

impl Action {
    pub fn apply(self, state: &mut AppState) {
        match self {
            Action::SetUser(user) => state.user = user,
            Action::SetInitialized(initialized) => state.initialized = initialized,
            Action::SetRemoteConfig(config) => state.remote_config = config,
            Action::SetRepos { repos, servers } => {
                state.repos = repos;
                state.servers = servers;
            }
            Action::SetReposLoaded(loaded) => state.repos_loaded = loaded,
            Action::SetRepoSearch(search) => state.repo_search = search,
            Action::SetCommits(commits) => state.commits = commits,
            Action::SetCommitSearch(search) => state.commit_search = search,
            Action::SetMessage(message) => state.application_message = message,
            Action::SetRepoFormLoading(loading) => state.repo_form_loading = loading,
            Action::SetCollaboratorName(name) => state.collaborator_name = name,
            Action::SetCollaboratorFormLoading(loading) => {
                state.collaborator_form_loading = loading
            }
            Action::SetPaymentLoading(loading) => state.payment_loading = loading,
            Action::SetForm { name, snapshot } => {
                state.forms.insert(name, snapshot);
            }
            Action::TouchForm(name) => {
                state
                    .forms
                    .entry(name)
                    .or_insert_with(|| name.snapshot(Default::default()))
                    .touched = true;
            }
            Action::ResetForm(name) => {
                state.forms.insert(name, name.snapshot(Default::default()));
            }
            Action::ApiRequest { name, ticket } => {
                let entry = state.api.entry(name).or_default();
                entry.loading = true;
                entry.error = None;
                entry.ticket = entry.ticket.max(ticket);
            }
            Action::ApiResponse {
                name,
                ticket,
                answer,
            } => {
                let entry = state.api.entry(name).or_default();
                if ticket >= entry.ticket {
                    entry.loading = false;
                    entry.error = None;
                    entry.last_answer = Some(answer);
                }
            }
            Action::ApiError {
                name,
                ticket,
                error,
            } => {
                let entry = state.api.entry(name).or_default();
                if ticket >= entry.ticket {
                    entry.loading = false;
                    entry.error = Some(error);
                }
            }
            Action::RouteChanged(route) => {
                state.route = route;
                state.route_generation += 1;
            }
        }
    }
}

/// Owner of the application state.
///
/// Every component gets a clone; there is no ambient global.
#[derive(Clone)]
pub struct Store {
    state: Arc<watch::Sender<AppState>>,
    signals: broadcast::Sender<Signal>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AppState::default());
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            state: Arc::new(state),
            signals,
        }
    }

    pub fn get(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&*self.state.borrow())
    }

    pub fn dispatch(&self, action: Action) {
        self.state.send_modify(|state| action.apply(state));
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    pub fn emit(&self, signal: Signal) {
        // Nobody listening is fine.
        let _ = self.signals.send(signal);
    }
}

/// What sagas write through.
///
/// A gated dispatcher belongs to one control loop run; once the loop is
/// stopped its gate closes and late saga writes are dropped. Call state
/// goes through [`Dispatcher::record`] and is always written.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    router: Router,
    gate: Option<Arc<AtomicBool>>,
}

impl Dispatcher {
    pub fn new(store: Store, router: Router) -> Self {
        Self {
            store,
            router,
            gate: None,
        }
    }

    pub fn gated(&self, gate: Arc<AtomicBool>) -> Self {
        Self {
            store: self.store.clone(),
            router: self.router.clone(),
            gate: Some(gate),
        }
    }

    pub fn is_active(&self) -> bool {
        self.gate
            .as_ref()
            .is_none_or(|gate| gate.load(Ordering::SeqCst))
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn state(&self) -> AppState {
        self.store.get()
    }

    pub fn dispatch(&self, action: Action) {
        if self.is_active() {
            self.store.dispatch(action);
        }
    }

    pub fn emit(&self, signal: Signal) {
        if self.is_active() {
            self.store.emit(signal);
        }
    }

    /// API call state bookkeeping. Written even through a closed gate so a
    /// call started by a stopped loop still ends in an answer or an error.
    pub fn record(&self, action: Action) {
        self.store.dispatch(action);
    }

    /// Sets the application-wide banner.
    pub fn message(&self, text: impl Into<String>) {
        let text = text.into();
        self.dispatch(Action::SetMessage(Some(text.clone())));
        self.emit(Signal::Message(text));
    }

    pub fn redirect(&self, path: &str) {
        if !self.is_active() {
            return;
        }
        self.store.emit(Signal::Redirect(path.to_string()));
        if let Err(err) = self.router.navigate(path) {
            warn!(%path, error = %err, "redirect refused");
        }
    }
}
