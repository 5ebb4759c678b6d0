use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::methods::ApiRequest;

pub const DEFAULT_RPC_PATH: &str = "/rpc";
pub const DEFAULT_NAMESPACE: &str = "DatameshRPC";
pub const DEFAULT_REGISTER_PATH: &str = "/register";

/// Where the backend lives and how its methods are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub server_url: String,
    pub rpc_path: String,
    pub namespace: String,
    pub register_path: String,
}

impl RpcEndpoint {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            register_path: DEFAULT_REGISTER_PATH.to_string(),
        }
    }

    pub fn rpc_url(&self) -> String {
        format!("{}{}", self.server_url, self.rpc_path)
    }

    pub fn register_url(&self) -> String {
        format!("{}{}", self.server_url, self.register_path)
    }

    pub fn qualified(&self, method: &str) -> String {
        format!("{}.{}", self.namespace, method)
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: &'a Value,
}

/// JSON-RPC 2.0 over HTTP POST.
///
/// Clones share the id counter, so ids stay unique and strictly increasing
/// for every call made through any handle of the same client.
#[derive(Clone)]
pub struct RpcClient {
    http: Client,
    endpoint: Arc<RpcEndpoint>,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(endpoint: RpcEndpoint) -> Self {
        Self {
            http: Client::new(),
            endpoint: Arc::new(endpoint),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn endpoint(&self) -> &RpcEndpoint {
        &self.endpoint
    }

    pub async fn execute(
        &self,
        request: ApiRequest,
        headers: HeaderMap,
        query: &[(&str, &str)],
    ) -> ApiResult<Value> {
        match request {
            ApiRequest::Rpc { method, params } => self.call(method, &params, headers, query).await,
            ApiRequest::Register { body } => {
                self.post_json(&self.endpoint.register_url(), &body, headers, query)
                    .await
            }
        }
    }

    pub async fn call(
        &self,
        method: &str,
        params: &Value,
        headers: HeaderMap,
        query: &[(&str, &str)],
    ) -> ApiResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let method = self.endpoint.qualified(method);
        debug!(id, %method, "sending rpc request");

        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .http
            .post(self.endpoint.rpc_url())
            .headers(headers)
            .query(query)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        unwrap_response(id, serde_json::from_slice(&response)?)
    }

    /// Plain JSON POST outside the RPC envelope.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        headers: HeaderMap,
        query: &[(&str, &str)],
    ) -> ApiResult<Value> {
        debug!(%url, "sending json post");

        let response = self
            .http
            .post(url)
            .headers(headers)
            .query(query)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        // A body that is not JSON is a decode failure, not a transport one.
        Ok(serde_json::from_slice(&response)?)
    }
}

fn unwrap_response(id: u64, response: Value) -> ApiResult<Value> {
    let Value::Object(mut body) = response else {
        return Err(ApiError::Decode("rpc response is not an object".to_string()));
    };

    let echoed = body.remove("id").unwrap_or(Value::Null);
    if echoed.as_u64() != Some(id) {
        return Err(ApiError::ProtocolMismatch {
            expected: id,
            actual: echoed.to_string(),
        });
    }

    match body.remove("error") {
        None | Some(Value::Null) => {}
        Some(error) => return Err(rpc_error(error)),
    }

    body.remove("result").ok_or(ApiError::EmptyResult)
}

fn rpc_error(error: Value) -> ApiError {
    match error {
        Value::String(message) => ApiError::Rpc {
            code: None,
            message,
        },
        Value::Object(ref fields) => ApiError::Rpc {
            code: fields.get("code").and_then(Value::as_i64),
            message: fields
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        },
        other => ApiError::Rpc {
            code: None,
            message: other.to_string(),
        },
    }
}
