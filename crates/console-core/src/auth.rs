//! Login, registration, logout and cold-start session restore.

use client_sdk::methods::{AuthLogin, AuthRegister};
use common::{Credentials, RegistrationRequest};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::forms::{FormName, form_values_if_valid};
use crate::sagas::remote_config;
use crate::services::Services;
use crate::state::{Action, Dispatcher, Signal};

const LOGIN_FAILED: &str = "incorrect details";
const NOT_CREATED: &str = "user was not created";

/// Logs in silently with a remembered session, if there is one.
pub async fn initialize(services: &Services, dispatch: &Dispatcher) -> bool {
    match services.credentials.load_persisted() {
        Some(credentials) => {
            info!(name = %credentials.name, "restoring remembered session");
            login(services, dispatch, credentials, true).await
        }
        None => false,
    }
}

/// Checks `credentials` against the backend and, when they hold, makes them
/// the session. A silent login never redirects and never reports failure.
pub async fn login(
    services: &Services,
    dispatch: &Dispatcher,
    credentials: Credentials,
    silent: bool,
) -> bool {
    let result = services
        .registry
        .load::<AuthLogin>(dispatch, &credentials)
        .await;

    let user = match result.into_result() {
        Ok(user) if user.is_valid() => user,
        Ok(_) | Err(_) => {
            warn!(name = %credentials.name, silent, "login failed");
            if !silent {
                dispatch.emit(Signal::AuthLoginError(LOGIN_FAILED.to_string()));
            }
            return false;
        }
    };

    let session = credentials.merge_session(&user);
    services.credentials.set(Some(session.clone()));

    if session.remember
        && let Err(err) = services.credentials.persist(&session)
    {
        warn!(error = %err, "failed to remember session");
    }

    info!(name = %session.name, silent, "logged in");

    if !silent {
        dispatch.emit(Signal::AuthLoginSuccess);
        landing_redirect(services, dispatch);
    }

    remote_config::load(services, dispatch).await;
    dispatch.dispatch(Action::SetReposLoaded(false));
    true
}

pub async fn login_submit(services: &Services, dispatch: &Dispatcher) -> bool {
    let Some(values) = form_values_if_valid(dispatch, FormName::AuthLogin) else {
        return false;
    };

    let mut credentials = Credentials::new(text(&values, "Name"), text(&values, "Password"));
    credentials.remember = flag(&values, "Remember");
    login(services, dispatch, credentials, false).await
}

/// Creates an account and logs straight into it.
pub async fn register(
    services: &Services,
    dispatch: &Dispatcher,
    request: RegistrationRequest,
) -> bool {
    let result = services
        .registry
        .load::<AuthRegister>(dispatch, &request)
        .await;

    let outcome = match result.into_result() {
        Ok(outcome) => outcome,
        Err(message) => {
            register_failed(dispatch, message);
            return false;
        }
    };

    if !outcome.created {
        let message = outcome.first_error().unwrap_or(NOT_CREATED).to_string();
        register_failed(dispatch, message);
        return false;
    }

    info!(name = %request.name, "registered");
    let credentials = Credentials::new(request.name, request.password);
    if !login(services, dispatch, credentials, false).await {
        return false;
    }

    dispatch.emit(Signal::AuthRegisterSuccess);
    true
}

pub async fn register_submit(services: &Services, dispatch: &Dispatcher) -> bool {
    let Some(values) = form_values_if_valid(dispatch, FormName::AuthRegister) else {
        return false;
    };

    let request = RegistrationRequest {
        email: text(&values, "Email"),
        name: text(&values, "Name"),
        password: text(&values, "Password"),
    };
    register(services, dispatch, request).await
}

/// Safe without a session. The session is gone before this returns, so the
/// next authenticated call fails with `Unauthenticated`.
pub fn logout(services: &Services, dispatch: &Dispatcher) {
    if let Err(err) = services.credentials.clear_persisted() {
        warn!(error = %err, "failed to forget remembered session");
    }
    services.credentials.set(None);
    info!("logged out");

    dispatch.redirect(&services.config.logout_redirect);
}

pub fn landing_redirect(services: &Services, dispatch: &Dispatcher) {
    dispatch.redirect(&services.config.login_redirect);
}

fn register_failed(dispatch: &Dispatcher, message: String) {
    warn!(error = %message, "registration failed");
    dispatch.message(message.clone());
    dispatch.emit(Signal::AuthRegisterError(message));
}

fn text(values: &Map<String, Value>, key: &str) -> String {
    match values.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn flag(values: &Map<String, Value>, key: &str) -> bool {
    match values.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => matches!(text.as_str(), "true" | "on" | "yes" | "y"),
        _ => false,
    }
}
