use client_sdk::methods::{RepoCreate, RepoList};
use common::{TopLevelVolume, VolumeName};
use tracing::{info, warn};

use crate::forms::{FormName, form_values_if_valid};
use crate::lists::{self, Page};
use crate::services::Services;
use crate::state::{Action, AppState, Dispatcher};

/// Reloads the repo list. On failure the list is emptied rather than left
/// stale.
pub async fn list(services: &Services, dispatch: &Dispatcher) {
    let result = services.registry.load::<RepoList>(dispatch, &()).await;

    match result.into_result() {
        Ok(answer) => {
            let mut repos = answer.volumes;
            lists::sort_by_label(&mut repos, |repo| repo.name().to_string());
            dispatch.dispatch(Action::SetReposLoaded(true));
            dispatch.dispatch(Action::SetRepos {
                repos,
                servers: answer.servers,
            });
        }
        Err(error) => {
            warn!(%error, "failed to load repos");
            dispatch.dispatch(Action::SetRepos {
                repos: Vec::new(),
                servers: Vec::new(),
            });
        }
    }
}

/// A new search always starts from the first page.
pub fn update_search(dispatch: &Dispatcher, search: String) {
    if current_page(&dispatch.state()) > 1 {
        dispatch.redirect("/repos/page/1");
    }
    dispatch.dispatch(Action::SetRepoSearch(search));
}

pub fn update_page(dispatch: &Dispatcher, page: usize) {
    dispatch.redirect(&format!("/repos/page/{}", page.max(1)));
}

pub fn form_initialize(dispatch: &Dispatcher) {
    dispatch.dispatch(Action::ResetForm(FormName::Repo));
}

/// Creates a repo named by the `repo` form in the user's namespace.
pub async fn form_submit(services: &Services, dispatch: &Dispatcher) -> bool {
    let Some(values) = form_values_if_valid(dispatch, FormName::Repo) else {
        return false;
    };
    let Some(namespace) = dispatch.state().user_name().map(str::to_string) else {
        dispatch.message("log in to create a repo");
        return false;
    };
    let name = values
        .get("Name")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();
    let volume = VolumeName::new(namespace, name);

    dispatch.dispatch(Action::SetRepoFormLoading(true));

    // Reload first so the duplicate check sees the server's current list.
    list(services, dispatch).await;

    if exists(&dispatch.state(), &volume) {
        dispatch.dispatch(Action::SetRepoFormLoading(false));
        dispatch.message(format!("repo with name: {volume} already exists"));
        return false;
    }

    let result = services.registry.load::<RepoCreate>(dispatch, &volume).await;
    dispatch.dispatch(Action::SetRepoFormLoading(false));

    if let Err(error) = result.into_result() {
        dispatch.message(error);
        return false;
    }

    info!(repo = %volume, "repo created");
    dispatch.message(format!("repo {volume} created"));
    dispatch.redirect("/repos");
    true
}

pub fn current_page(state: &AppState) -> usize {
    lists::parse_page(state.route_param("page"))
}

pub fn exists(state: &AppState, volume: &VolumeName) -> bool {
    find(state, &volume.namespace, &volume.name).is_some()
}

pub fn find<'a>(state: &'a AppState, namespace: &str, name: &str) -> Option<&'a TopLevelVolume> {
    state.repos.iter().find(|repo| repo.matches(namespace, name))
}

pub fn search_results(state: &AppState) -> Vec<TopLevelVolume> {
    lists::search(&state.repos, &state.repo_search, |repo| {
        repo.name().to_string()
    })
}

/// Repos on the current route's page after search.
pub fn page(state: &AppState, page_size: usize) -> Page<TopLevelVolume> {
    lists::paginate(&search_results(state), current_page(state), page_size)
}
