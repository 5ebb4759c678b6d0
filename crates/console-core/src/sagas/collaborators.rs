use client_sdk::methods::RepoAddCollaborator;
use common::CollaboratorRequest;
use tracing::info;

use crate::sagas::commits::RepoLocation;
use crate::sagas::repos;
use crate::services::Services;
use crate::state::{Action, Dispatcher};

pub fn update_name(dispatch: &Dispatcher, name: String) {
    dispatch.dispatch(Action::SetCollaboratorName(name));
}

/// Grants the typed-in user access to the repo on the current route.
pub async fn add(services: &Services, dispatch: &Dispatcher) -> bool {
    let state = dispatch.state();

    let collaborator = state.collaborator_name.trim().to_string();
    if collaborator.is_empty() {
        dispatch.message("enter a collaborator name");
        return false;
    }

    let Some(location) = RepoLocation::from_route(&state) else {
        dispatch.message("open a repo to add collaborators");
        return false;
    };
    let Some(repo) = repos::find(&state, &location.namespace, &location.name) else {
        dispatch.message(format!(
            "repo {} / {} not found",
            location.namespace, location.name
        ));
        return false;
    };

    let request = CollaboratorRequest {
        volume: repo.id().to_string(),
        collaborator: collaborator.clone(),
    };
    let title = repo.title();

    dispatch.dispatch(Action::SetCollaboratorFormLoading(true));
    let result = services
        .registry
        .load::<RepoAddCollaborator>(dispatch, &request)
        .await;
    dispatch.dispatch(Action::SetCollaboratorFormLoading(false));

    if let Err(error) = result.into_result() {
        dispatch.message(error);
        return false;
    }

    info!(repo = %title, %collaborator, "collaborator added");
    dispatch.dispatch(Action::SetCollaboratorName(String::new()));
    dispatch.message(format!("{collaborator} added as a collaborator to {title}"));
    repos::list(services, dispatch).await;
    true
}
