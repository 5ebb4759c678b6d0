use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

pub const MASTER_BRANCH: &str = "master";

/// Identity plus secret for the current session.
///
/// Before login this only carries what the user typed; after a successful
/// login the server profile (`Id`, `Email`, ...) is merged in.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_hash: Option<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remember: bool,
}

impl Credentials {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn remembered(mut self) -> Self {
        self.remember = true;
        self
    }

    /// Server profile fields win, the locally typed secret is kept.
    pub fn merge_session(&self, user: &SessionUser) -> Self {
        Self {
            id: Some(user.id.clone()),
            name: if user.name.is_empty() {
                self.name.clone()
            } else {
                user.name.clone()
            },
            email: user.email.clone().or_else(|| self.email.clone()),
            email_hash: user.email_hash.clone(),
            password: self.password.clone(),
            remember: self.remember,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("remember", &self.remember)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_hash: Option<String>,
}

impl SessionUser {
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeName {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

impl VolumeName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.namespace, self.name)
    }
}

/// A single volume or clone as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: VolumeName,
    #[serde(default)]
    pub clone: String,
    #[serde(default)]
    pub master: String,
    #[serde(default)]
    pub size_bytes: i64,
    #[serde(default)]
    pub dirty_bytes: i64,
    #[serde(default)]
    pub commit_count: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub server_statuses: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRef {
    pub id: String,
    pub name: String,
}

/// A repo: the top level volume, its clones ("branches") and who may use it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopLevelVolume {
    #[serde(default, deserialize_with = "nullable")]
    pub top_level_volume: Volume,
    #[serde(default, deserialize_with = "nullable")]
    pub clone_volumes: Vec<Volume>,
    #[serde(default, deserialize_with = "nullable")]
    pub owner: SessionUser,
    #[serde(default, deserialize_with = "nullable")]
    pub collaborators: Vec<SessionUser>,
}

impl TopLevelVolume {
    pub fn id(&self) -> &str {
        &self.top_level_volume.id
    }

    pub fn name(&self) -> &str {
        &self.top_level_volume.name.name
    }

    pub fn namespace(&self) -> &str {
        &self.top_level_volume.name.namespace
    }

    pub fn title(&self) -> String {
        self.top_level_volume.name.to_string()
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    pub fn size_bytes(&self) -> i64 {
        self.top_level_volume.size_bytes
    }

    pub fn size_title(&self) -> String {
        size_label(self.size_bytes())
    }

    pub fn server_statuses(&self) -> &HashMap<String, String> {
        &self.top_level_volume.server_statuses
    }

    pub fn branches(&self) -> &[Volume] {
        &self.clone_volumes
    }

    /// `master` first, then the clones in server order.
    pub fn branch_list(&self) -> Vec<BranchRef> {
        let mut branches = Vec::with_capacity(self.clone_volumes.len() + 1);
        branches.push(BranchRef {
            id: self.id().to_string(),
            name: MASTER_BRANCH.to_string(),
        });
        branches.extend(self.clone_volumes.iter().map(|clone| BranchRef {
            id: clone.id.clone(),
            name: clone.clone.clone(),
        }));
        branches
    }

    pub fn branch(&self, name: &str) -> Option<&Volume> {
        if name == MASTER_BRANCH {
            return Some(&self.top_level_volume);
        }
        self.clone_volumes.iter().find(|clone| clone.clone == name)
    }

    pub fn branch_count(&self) -> usize {
        self.clone_volumes.len() + 1
    }

    pub fn branch_count_title(&self) -> String {
        let count = self.branch_count();
        if count == 1 {
            format!("{count} branch")
        } else {
            format!("{count} branches")
        }
    }

    pub fn matches(&self, namespace: &str, name: &str) -> bool {
        self.namespace() == namespace && self.name() == name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Server {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub addresses: Vec<String>,
}

/// Answer of `AllVolumesAndClones`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumesAndClones {
    #[serde(default, deserialize_with = "nullable")]
    pub volumes: Vec<TopLevelVolume>,
    #[serde(default, deserialize_with = "nullable")]
    pub servers: Vec<Server>,
}

/// A commit on a branch. The backend calls these snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: HashMap<String, String>,
}

impl Snapshot {
    pub fn message(&self) -> &str {
        self.metadata.get("message").map_or("", String::as_str)
    }

    pub fn author(&self) -> &str {
        self.metadata.get("author").map_or("", String::as_str)
    }

    /// Label used for commit search.
    pub fn label(&self) -> String {
        format!("{} {}", self.message(), self.author())
    }

    /// The backend stamps commits in nanoseconds; 0 when absent or garbled.
    pub fn timestamp_millis(&self) -> i64 {
        self.metadata
            .get("timestamp")
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map_or(0, |nanos| nanos / 1_000_000)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Plan {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Public part of the server configuration (answer of `Config`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteConfig {
    #[serde(default, deserialize_with = "nullable")]
    pub plans: Vec<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_public_key: Option<String>,
}

impl RemoteConfig {
    pub fn plan(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Body returned by the registration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationOutcome {
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub name_error: String,
    #[serde(default)]
    pub email_error: String,
    #[serde(default)]
    pub password_error: String,
}

impl RegistrationOutcome {
    pub fn first_error(&self) -> Option<&str> {
        [&self.name_error, &self.email_error, &self.password_error]
            .into_iter()
            .find(|message| !message.is_empty())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CollaboratorRequest {
    pub volume: String,
    pub collaborator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentRequest {
    pub token: String,
    pub plan_id: String,
}

pub fn size_label(bytes: i64) -> String {
    const KIB: f64 = 1024.0;
    let n = bytes as f64;

    if n < KIB {
        format!("{n:.0}B")
    } else if n < KIB * KIB {
        format!("{:.0}KiB", n / KIB)
    } else if n < KIB * KIB * KIB {
        format!("{:.0}MiB", n / (KIB * KIB))
    } else if n < KIB * KIB * KIB * KIB {
        format!("{:.0}GiB", n / (KIB * KIB * KIB))
    } else {
        format!("{:.0}TiB", n / (KIB * KIB * KIB * KIB))
    }
}

// The backend encodes empty slices and maps as `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
