pub mod auth;
pub mod error;
pub mod methods;
pub mod rpc;
pub mod storage;

pub use auth::{DISABLE_AUTH_WINDOW, headers_for};
pub use error::{ApiError, ApiResult};
pub use methods::{ApiCall, ApiName, ApiRequest, Auth};
pub use reqwest::header::HeaderMap;
pub use rpc::{RpcClient, RpcEndpoint};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};
