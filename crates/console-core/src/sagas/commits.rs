use client_sdk::methods::RepoLoadCommits;
use common::{MASTER_BRANCH, Snapshot};
use tracing::warn;

use crate::lists::{self, Page};
use crate::sagas::repos;
use crate::services::Services;
use crate::state::{Action, AppState, Dispatcher};

/// Repo and branch named by the current route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub namespace: String,
    pub name: String,
    pub branch: String,
}

impl RepoLocation {
    pub fn from_route(state: &AppState) -> Option<Self> {
        Some(Self {
            namespace: state.route_param("namespace")?.to_string(),
            name: state.route_param("name")?.to_string(),
            branch: state
                .route_param("branch")
                .unwrap_or(MASTER_BRANCH)
                .to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!("/repo/{}/{}/{}", self.namespace, self.name, self.branch)
    }

    /// Volume id of the branch, once the repo list knows about it.
    pub fn branch_id(&self, state: &AppState) -> Option<String> {
        repos::find(state, &self.namespace, &self.name)?
            .branch(&self.branch)
            .map(|volume| volume.id.clone())
    }
}

/// Loads the commits of the branch on the current route.
pub async fn list(services: &Services, dispatch: &Dispatcher) {
    let state = dispatch.state();
    let Some(location) = RepoLocation::from_route(&state) else {
        return;
    };

    if repos::find(&state, &location.namespace, &location.name).is_none() {
        repos::list(services, dispatch).await;
    }

    let Some(branch_id) = location.branch_id(&dispatch.state()) else {
        warn!(repo = %location.url(), "branch not found");
        dispatch.dispatch(Action::SetCommits(Vec::new()));
        return;
    };

    let result = services
        .registry
        .load::<RepoLoadCommits>(dispatch, &branch_id)
        .await;

    match result.into_result() {
        Ok(commits) => dispatch.dispatch(Action::SetCommits(commits.unwrap_or_default())),
        Err(error) => {
            warn!(%error, "failed to load commits");
            dispatch.dispatch(Action::SetCommits(Vec::new()));
        }
    }
}

pub fn update_search(dispatch: &Dispatcher, search: String) {
    let state = dispatch.state();
    if current_page(&state) > 1
        && let Some(location) = RepoLocation::from_route(&state)
    {
        dispatch.redirect(&format!("{}/page/1", location.url()));
    }
    dispatch.dispatch(Action::SetCommitSearch(search));
}

pub fn update_page(dispatch: &Dispatcher, page: usize) {
    if let Some(location) = RepoLocation::from_route(&dispatch.state()) {
        dispatch.redirect(&format!("{}/page/{}", location.url(), page.max(1)));
    }
}

pub fn current_page(state: &AppState) -> usize {
    lists::parse_page(state.route_param("page"))
}

pub fn search_results(state: &AppState) -> Vec<Snapshot> {
    lists::search(&state.commits, &state.commit_search, Snapshot::label)
}

pub fn page(state: &AppState, page_size: usize) -> Page<Snapshot> {
    lists::paginate(&search_results(state), current_page(state), page_size)
}
