use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use client_sdk::{
    ApiCall, ApiError, ApiResult, Auth, DISABLE_AUTH_WINDOW, RpcClient, headers_for,
};
use serde_json::Value;
use tracing::debug;

use crate::credentials::CredentialStore;
use crate::state::{Action, Dispatcher};

/// Outcome of one loader call. Loaders never fail, they report.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult<T> {
    pub answer: Option<T>,
    /// Display text, already translated for the user.
    pub error: Option<String>,
    pub cause: Option<ApiError>,
}

impl<T> LoadResult<T> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.answer, self.error) {
            (Some(answer), None) => Ok(answer),
            (_, Some(error)) => Err(error),
            (None, None) => Err(ApiError::EmptyResult.to_string()),
        }
    }
}

/// Decorates the typed calls with credentials, transport flags and call
/// state bookkeeping.
#[derive(Clone)]
pub struct ApiRegistry {
    rpc: RpcClient,
    credentials: CredentialStore,
    tickets: Arc<AtomicU64>,
}

impl ApiRegistry {
    pub fn new(rpc: RpcClient, credentials: CredentialStore) -> Self {
        Self {
            rpc,
            credentials,
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub async fn load<C: ApiCall>(
        &self,
        dispatch: &Dispatcher,
        payload: &C::Payload,
    ) -> LoadResult<C::Answer> {
        let name = C::NAME;
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;

        // Recorded before the first suspension point.
        dispatch.record(Action::ApiRequest { name, ticket });
        debug!(api = %name, ticket, "api request");

        match self.call::<C>(payload).await {
            Ok((answer, raw)) => {
                debug!(api = %name, ticket, "api response");
                dispatch.record(Action::ApiResponse {
                    name,
                    ticket,
                    answer: raw,
                });
                LoadResult {
                    answer: Some(answer),
                    error: None,
                    cause: None,
                }
            }
            Err(err) => {
                let display = C::display_error(&err);
                debug!(api = %name, ticket, error = %err, "api error");
                dispatch.record(Action::ApiError {
                    name,
                    ticket,
                    error: display.clone(),
                });
                LoadResult {
                    answer: None,
                    error: Some(display),
                    cause: Some(err),
                }
            }
        }
    }

    async fn call<C: ApiCall>(&self, payload: &C::Payload) -> ApiResult<(C::Answer, Value)> {
        let credentials = match C::AUTH {
            Auth::Anonymous => None,
            Auth::Session => Some(self.credentials.get().ok_or(ApiError::Unauthenticated)?),
            Auth::Payload => C::payload_credentials(payload).cloned(),
        };

        let headers = headers_for(credentials.as_ref());
        let raw = self
            .rpc
            .execute(C::request(payload), headers, &[DISABLE_AUTH_WINDOW])
            .await?;
        let answer = serde_json::from_value::<C::Answer>(raw.clone())?;

        Ok((answer, raw))
    }
}
