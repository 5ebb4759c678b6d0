use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::info;

use crate::hooks::HookName;
use crate::state::{Action, Signal, Store};

/// Guard redirects followed per navigation before giving up on a cycle.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePolicy {
    /// `Some(true)`: only for logged in users, `Some(false)`: only for guests.
    pub user: Option<bool>,
    pub auth_redirect: Option<String>,
    pub control_loop_hook: Option<HookName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    Unspecified,
    RequiresUser,
    RequiresGuest,
}

impl RoutePolicy {
    pub fn state(&self) -> PolicyState {
        match self.user {
            None => PolicyState::Unspecified,
            Some(true) => PolicyState::RequiresUser,
            Some(false) => PolicyState::RequiresGuest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    Redirect(String),
}

pub fn authenticate_route(policy: &RoutePolicy, has_user: bool) -> GuardDecision {
    let allowed = match policy.state() {
        PolicyState::Unspecified => true,
        PolicyState::RequiresUser => has_user,
        PolicyState::RequiresGuest => !has_user,
    };

    if allowed {
        GuardDecision::Pass
    } else {
        GuardDecision::Redirect(
            policy
                .auth_redirect
                .clone()
                .unwrap_or_else(|| "/".to_string()),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    pub path: String,
    /// `None` when no declared route matched.
    pub pattern: Option<String>,
    pub params: BTreeMap<String, String>,
    pub policy: RoutePolicy,
}

/// A route as written in configuration, before its hook name is checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteDecl {
    pub pattern: String,
    #[serde(default)]
    pub user: Option<bool>,
    #[serde(default)]
    pub auth_redirect: Option<String>,
    #[serde(default)]
    pub control_loop_hook: Option<String>,
}

impl RouteDecl {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            ..Self::default()
        }
    }

    fn user(mut self, user: bool, redirect: &str) -> Self {
        self.user = Some(user);
        self.auth_redirect = Some(redirect.to_string());
        self
    }

    fn refresh(mut self, hook: HookName) -> Self {
        self.control_loop_hook = Some(hook.to_string());
        self
    }
}

/// Routes of the storage console.
pub fn console_routes() -> Vec<RouteDecl> {
    let private = |pattern: &str| RouteDecl::new(pattern).user(true, "/login");
    let guest = |pattern: &str| RouteDecl::new(pattern).user(false, "/dashboard");

    vec![
        RouteDecl::new("/"),
        RouteDecl::new(""),
        RouteDecl::new("/help"),
        RouteDecl::new("/help/*"),
        private("/dashboard"),
        private("/servers").refresh(HookName::RepoList),
        private("/repos").refresh(HookName::RepoList),
        private("/repos/page/:page").refresh(HookName::RepoList),
        private("/repo/:namespace/:name").refresh(HookName::RepoList),
        private("/repo/:namespace/:name/:branch").refresh(HookName::CommitList),
        private("/repo/:namespace/:name/:branch/page/:page").refresh(HookName::CommitList),
        private("/payment").refresh(HookName::ConfigLoad),
        guest("/login"),
        guest("/register"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    segments: Vec<Segment>,
    policy: RoutePolicy,
}

impl Route {
    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        let mut params = BTreeMap::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => {
                    let rest = parts.get(index..).filter(|rest| !rest.is_empty())?;
                    params.insert("_".to_string(), rest.join("/"));
                    return Some(params);
                }
                Segment::Literal(literal) => {
                    if parts.get(index) != Some(&literal.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*parts.get(index)?).to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|part| !part.is_empty()).collect()
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>> {
    let parts = split_path(pattern);
    let last = parts.len().saturating_sub(1);

    parts
        .iter()
        .enumerate()
        .map(|(index, part)| match *part {
            "*" if index == last => Ok(Segment::Wildcard),
            "*" => Err(anyhow!("wildcard must be the last segment in {pattern:?}")),
            part if part.starts_with(':') => match &part[1..] {
                "" => Err(anyhow!("unnamed parameter in {pattern:?}")),
                name => Ok(Segment::Param(name.to_string())),
            },
            part => Ok(Segment::Literal(part.to_string())),
        })
        .collect()
}

/// Validated routes; the first declared match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn empty() -> Self {
        Self { routes: Vec::new() }
    }

    /// Fails on malformed patterns and on loop hooks that are unknown or
    /// cannot run without a payload.
    pub fn build(decls: Vec<RouteDecl>) -> Result<Self> {
        let mut routes = Vec::with_capacity(decls.len());

        for decl in decls {
            let segments = parse_pattern(&decl.pattern)?;
            let control_loop_hook = match decl.control_loop_hook.as_deref() {
                None => None,
                Some(raw) => {
                    let hook = raw
                        .parse::<HookName>()
                        .with_context(|| format!("route {:?}", decl.pattern))?;
                    if !hook.is_refreshable() {
                        bail!(
                            "route {:?} uses {hook} as a control loop hook but it needs a payload",
                            decl.pattern
                        );
                    }
                    Some(hook)
                }
            };

            routes.push(Route {
                pattern: decl.pattern,
                segments,
                policy: RoutePolicy {
                    user: decl.user,
                    auth_redirect: decl.auth_redirect,
                    control_loop_hook,
                },
            });
        }

        Ok(Self { routes })
    }

    pub fn console() -> Result<Self> {
        Self::build(console_routes())
    }

    pub fn resolve(&self, path: &str) -> RouteMatch {
        let parts = split_path(path);

        self.routes
            .iter()
            .find_map(|route| {
                route.matches(&parts).map(|params| RouteMatch {
                    path: path.to_string(),
                    pattern: Some(route.pattern.clone()),
                    params,
                    policy: route.policy.clone(),
                })
            })
            .unwrap_or_else(|| RouteMatch {
                path: path.to_string(),
                ..RouteMatch::default()
            })
    }
}

#[derive(Clone)]
pub struct Router {
    table: Arc<RouteTable>,
    store: Store,
}

impl Router {
    pub fn new(table: Arc<RouteTable>, store: Store) -> Self {
        Self { table, store }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Resolves `path`, lets the guard redirect it, and only then publishes
    /// the final match. Route hooks never see a route the guard refused.
    pub fn navigate(&self, path: &str) -> Result<RouteMatch> {
        let has_user = self.store.read(|state| state.user.is_some());
        let mut matched = self.table.resolve(path);

        for _ in 0..=MAX_REDIRECTS {
            match authenticate_route(&matched.policy, has_user) {
                GuardDecision::Pass => {
                    info!(path = %matched.path, "navigated");
                    self.store.dispatch(Action::RouteChanged(matched.clone()));
                    return Ok(matched);
                }
                GuardDecision::Redirect(target) => {
                    info!(from = %matched.path, to = %target, "route guard redirect");
                    self.store.emit(Signal::Redirect(target.clone()));
                    matched = self.table.resolve(&target);
                }
            }
        }

        Err(anyhow!("redirect loop while navigating to {path}"))
    }
}
