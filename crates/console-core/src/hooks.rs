use std::fmt;
use std::future::Future;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing::warn;

use crate::auth;
use crate::control_loop::Refresh;
use crate::sagas::{billing, collaborators, commits, remote_config, repos};
use crate::services::Services;
use crate::state::Dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookName {
    AuthLogout,
    AuthLoginSubmit,
    AuthLoginSuccess,
    AuthRegisterSubmit,
    AuthRegisterSuccess,
    RepoList,
    RepoUpdateSearch,
    RepoUpdatePage,
    RepoFormInitialize,
    RepoFormSubmit,
    CommitList,
    CommitUpdateSearch,
    CommitUpdatePage,
    CollaboratorUpdateName,
    CollaboratorAdd,
    BillingTokenReceived,
    ConfigLoad,
}

impl HookName {
    pub const ALL: [HookName; 17] = [
        HookName::AuthLogout,
        HookName::AuthLoginSubmit,
        HookName::AuthLoginSuccess,
        HookName::AuthRegisterSubmit,
        HookName::AuthRegisterSuccess,
        HookName::RepoList,
        HookName::RepoUpdateSearch,
        HookName::RepoUpdatePage,
        HookName::RepoFormInitialize,
        HookName::RepoFormSubmit,
        HookName::CommitList,
        HookName::CommitUpdateSearch,
        HookName::CommitUpdatePage,
        HookName::CollaboratorUpdateName,
        HookName::CollaboratorAdd,
        HookName::BillingTokenReceived,
        HookName::ConfigLoad,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::AuthLogout => "authLogout",
            HookName::AuthLoginSubmit => "authLoginSubmit",
            HookName::AuthLoginSuccess => "authLoginSuccess",
            HookName::AuthRegisterSubmit => "authRegisterSubmit",
            HookName::AuthRegisterSuccess => "authRegisterSuccess",
            HookName::RepoList => "repoList",
            HookName::RepoUpdateSearch => "repoUpdateSearch",
            HookName::RepoUpdatePage => "repoUpdatePage",
            HookName::RepoFormInitialize => "repoFormInitialize",
            HookName::RepoFormSubmit => "repoFormSubmit",
            HookName::CommitList => "commitList",
            HookName::CommitUpdateSearch => "commitUpdateSearch",
            HookName::CommitUpdatePage => "commitUpdatePage",
            HookName::CollaboratorUpdateName => "collaboratorUpdateName",
            HookName::CollaboratorAdd => "collaboratorAdd",
            HookName::BillingTokenReceived => "billingTokenReceived",
            HookName::ConfigLoad => "configLoad",
        }
    }

    /// Hooks the control loop may run: the parameterless data loads.
    pub fn is_refreshable(self) -> bool {
        matches!(
            self,
            HookName::RepoList | HookName::CommitList | HookName::ConfigLoad
        )
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        HookName::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| anyhow!("unknown hook: {s}"))
    }
}

/// A hook invocation together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    AuthLogout,
    AuthLoginSubmit,
    AuthLoginSuccess,
    AuthRegisterSubmit,
    AuthRegisterSuccess,
    RepoList,
    RepoUpdateSearch(String),
    RepoUpdatePage(usize),
    RepoFormInitialize,
    RepoFormSubmit,
    CommitList,
    CommitUpdateSearch(String),
    CommitUpdatePage(usize),
    CollaboratorUpdateName(String),
    CollaboratorAdd,
    BillingTokenReceived(String),
    ConfigLoad,
}

impl Hook {
    pub fn name(&self) -> HookName {
        match self {
            Hook::AuthLogout => HookName::AuthLogout,
            Hook::AuthLoginSubmit => HookName::AuthLoginSubmit,
            Hook::AuthLoginSuccess => HookName::AuthLoginSuccess,
            Hook::AuthRegisterSubmit => HookName::AuthRegisterSubmit,
            Hook::AuthRegisterSuccess => HookName::AuthRegisterSuccess,
            Hook::RepoList => HookName::RepoList,
            Hook::RepoUpdateSearch(_) => HookName::RepoUpdateSearch,
            Hook::RepoUpdatePage(_) => HookName::RepoUpdatePage,
            Hook::RepoFormInitialize => HookName::RepoFormInitialize,
            Hook::RepoFormSubmit => HookName::RepoFormSubmit,
            Hook::CommitList => HookName::CommitList,
            Hook::CommitUpdateSearch(_) => HookName::CommitUpdateSearch,
            Hook::CommitUpdatePage(_) => HookName::CommitUpdatePage,
            Hook::CollaboratorUpdateName(_) => HookName::CollaboratorUpdateName,
            Hook::CollaboratorAdd => HookName::CollaboratorAdd,
            Hook::BillingTokenReceived(_) => HookName::BillingTokenReceived,
            Hook::ConfigLoad => HookName::ConfigLoad,
        }
    }

    /// The hook for `name` when it needs no payload.
    pub fn without_payload(name: HookName) -> Option<Hook> {
        let hook = match name {
            HookName::AuthLogout => Hook::AuthLogout,
            HookName::AuthLoginSubmit => Hook::AuthLoginSubmit,
            HookName::AuthLoginSuccess => Hook::AuthLoginSuccess,
            HookName::AuthRegisterSubmit => Hook::AuthRegisterSubmit,
            HookName::AuthRegisterSuccess => Hook::AuthRegisterSuccess,
            HookName::RepoList => Hook::RepoList,
            HookName::RepoFormInitialize => Hook::RepoFormInitialize,
            HookName::RepoFormSubmit => Hook::RepoFormSubmit,
            HookName::CommitList => Hook::CommitList,
            HookName::CollaboratorAdd => Hook::CollaboratorAdd,
            HookName::ConfigLoad => Hook::ConfigLoad,
            HookName::RepoUpdateSearch
            | HookName::RepoUpdatePage
            | HookName::CommitUpdateSearch
            | HookName::CommitUpdatePage
            | HookName::CollaboratorUpdateName
            | HookName::BillingTokenReceived => return None,
        };
        Some(hook)
    }
}

/// Dispatch table from hooks to the orchestration that handles them.
pub struct HookRunner {
    services: Services,
}

impl HookRunner {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub async fn run(&self, hook: Hook, dispatch: &Dispatcher) {
        let services = &self.services;

        match hook {
            Hook::AuthLogout => auth::logout(services, dispatch),
            Hook::AuthLoginSubmit => {
                auth::login_submit(services, dispatch).await;
            }
            Hook::AuthLoginSuccess | Hook::AuthRegisterSuccess => {
                auth::landing_redirect(services, dispatch)
            }
            Hook::AuthRegisterSubmit => {
                auth::register_submit(services, dispatch).await;
            }
            Hook::RepoList => repos::list(services, dispatch).await,
            Hook::RepoUpdateSearch(search) => repos::update_search(dispatch, search),
            Hook::RepoUpdatePage(page) => repos::update_page(dispatch, page),
            Hook::RepoFormInitialize => repos::form_initialize(dispatch),
            Hook::RepoFormSubmit => {
                repos::form_submit(services, dispatch).await;
            }
            Hook::CommitList => commits::list(services, dispatch).await,
            Hook::CommitUpdateSearch(search) => commits::update_search(dispatch, search),
            Hook::CommitUpdatePage(page) => commits::update_page(dispatch, page),
            Hook::CollaboratorUpdateName(name) => collaborators::update_name(dispatch, name),
            Hook::CollaboratorAdd => {
                collaborators::add(services, dispatch).await;
            }
            Hook::BillingTokenReceived(token) => {
                billing::token_received(services, dispatch, token).await;
            }
            Hook::ConfigLoad => remote_config::load(services, dispatch).await,
        }
    }
}

impl Refresh for HookRunner {
    fn refresh(&self, hook: HookName, dispatch: Dispatcher) -> impl Future<Output = ()> + Send {
        async move {
            match Hook::without_payload(hook).filter(|_| hook.is_refreshable()) {
                Some(hook) => self.run(hook, &dispatch).await,
                None => warn!(%hook, "hook cannot run from the control loop"),
            }
        }
    }
}
