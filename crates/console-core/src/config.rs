use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use client_sdk::RpcEndpoint;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub server_url: String,
    pub rpc_path: String,
    pub rpc_namespace: String,
    pub register_path: String,
    pub control_loop_interval_ms: u64,
    pub repo_page_size: usize,
    pub commit_page_size: usize,
    pub session_dir: PathBuf,
    pub session_key: String,
    pub login_redirect: String,
    pub logout_redirect: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:6969".to_string(),
            rpc_path: client_sdk::rpc::DEFAULT_RPC_PATH.to_string(),
            rpc_namespace: client_sdk::rpc::DEFAULT_NAMESPACE.to_string(),
            register_path: client_sdk::rpc::DEFAULT_REGISTER_PATH.to_string(),
            control_loop_interval_ms: if cfg!(debug_assertions) { 100 } else { 1000 },
            repo_page_size: 10,
            commit_page_size: 10,
            session_dir: PathBuf::from("./data/console-session"),
            session_key: "user".to_string(),
            login_redirect: "/dashboard".to_string(),
            logout_redirect: "/".to_string(),
        }
    }
}

impl ConsoleConfig {
    /// Reads a TOML file; missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;

        toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Defaults with `DATAMESH_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("DATAMESH_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(dir) = lookup("DATAMESH_SESSION_DIR") {
            self.session_dir = PathBuf::from(dir);
        }
        if let Some(namespace) = lookup("DATAMESH_RPC_NAMESPACE") {
            self.rpc_namespace = namespace;
        }
        if let Some(interval) = lookup("DATAMESH_CONTROL_LOOP_INTERVAL_MS") {
            self.control_loop_interval_ms = interval
                .parse()
                .with_context(|| format!("invalid DATAMESH_CONTROL_LOOP_INTERVAL_MS={interval}"))?;
        }
        Ok(self)
    }

    pub fn control_loop_interval(&self) -> Duration {
        Duration::from_millis(self.control_loop_interval_ms.max(1))
    }

    pub fn endpoint(&self) -> RpcEndpoint {
        RpcEndpoint {
            rpc_path: self.rpc_path.clone(),
            namespace: self.rpc_namespace.clone(),
            register_path: self.register_path.clone(),
            ..RpcEndpoint::new(self.server_url.clone())
        }
    }
}
