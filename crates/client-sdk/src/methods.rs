//! Typed descriptors for every backend call the console makes.
//!
//! A descriptor turns a payload into an [`ApiRequest`] and names the answer
//! type; it never performs I/O itself.

use std::fmt;

use common::{
    CollaboratorRequest, Credentials, PaymentRequest, RegistrationOutcome, RegistrationRequest,
    RemoteConfig, SessionUser, Snapshot, VolumeName, VolumesAndClones,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiName {
    AuthLogin,
    AuthRegister,
    RepoList,
    RepoCreate,
    RepoLoadCommits,
    RepoAddCollaborator,
    BillingSubmitPayment,
    ConfigLoad,
}

impl ApiName {
    pub const ALL: [ApiName; 8] = [
        ApiName::AuthLogin,
        ApiName::AuthRegister,
        ApiName::RepoList,
        ApiName::RepoCreate,
        ApiName::RepoLoadCommits,
        ApiName::RepoAddCollaborator,
        ApiName::BillingSubmitPayment,
        ApiName::ConfigLoad,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApiName::AuthLogin => "authLogin",
            ApiName::AuthRegister => "authRegister",
            ApiName::RepoList => "repoList",
            ApiName::RepoCreate => "repoCreate",
            ApiName::RepoLoadCommits => "repoLoadCommits",
            ApiName::RepoAddCollaborator => "repoAddCollaborator",
            ApiName::BillingSubmitPayment => "billingSubmitPayment",
            ApiName::ConfigLoad => "configLoad",
        }
    }
}

impl fmt::Display for ApiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// `<namespace>.<method>` over the RPC endpoint.
    Rpc { method: &'static str, params: Value },
    /// Plain JSON POST to the registration endpoint.
    Register { body: Value },
}

/// Which credentials a call is made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    /// The logged in session; the call fails fast when there is none.
    Session,
    /// Credentials carried by the payload itself (the login check).
    Payload,
}

pub trait ApiCall {
    const NAME: ApiName;
    const AUTH: Auth = Auth::Session;

    type Payload: Send + Sync;
    type Answer: DeserializeOwned + Serialize + Send;

    fn request(payload: &Self::Payload) -> ApiRequest;

    fn payload_credentials(_payload: &Self::Payload) -> Option<&Credentials> {
        None
    }

    /// Text recorded as the call's error and shown to the user.
    fn display_error(err: &ApiError) -> String {
        err.to_string()
    }
}

fn rpc(method: &'static str, params: Value) -> ApiRequest {
    ApiRequest::Rpc { method, params }
}

pub struct AuthLogin;

impl ApiCall for AuthLogin {
    const NAME: ApiName = ApiName::AuthLogin;
    const AUTH: Auth = Auth::Payload;

    type Payload = Credentials;
    type Answer = SessionUser;

    fn request(_payload: &Credentials) -> ApiRequest {
        rpc("CurrentUser", json!({}))
    }

    fn payload_credentials(payload: &Credentials) -> Option<&Credentials> {
        Some(payload)
    }

    // Never tell the user which half of the login was wrong.
    fn display_error(_err: &ApiError) -> String {
        "incorrect details".to_string()
    }
}

pub struct AuthRegister;

impl ApiCall for AuthRegister {
    const NAME: ApiName = ApiName::AuthRegister;
    const AUTH: Auth = Auth::Anonymous;

    type Payload = RegistrationRequest;
    type Answer = RegistrationOutcome;

    fn request(payload: &RegistrationRequest) -> ApiRequest {
        ApiRequest::Register {
            body: json!({
                "Email": payload.email,
                "Name": payload.name,
                "Password": payload.password,
            }),
        }
    }
}

pub struct RepoList;

impl ApiCall for RepoList {
    const NAME: ApiName = ApiName::RepoList;

    type Payload = ();
    type Answer = VolumesAndClones;

    fn request(_payload: &()) -> ApiRequest {
        rpc("AllVolumesAndClones", json!({}))
    }
}

pub struct RepoCreate;

impl ApiCall for RepoCreate {
    const NAME: ApiName = ApiName::RepoCreate;

    type Payload = VolumeName;
    type Answer = bool;

    fn request(payload: &VolumeName) -> ApiRequest {
        rpc(
            "Create",
            json!({ "Namespace": payload.namespace, "Name": payload.name }),
        )
    }
}

/// Commits of one branch, addressed by the branch's volume id.
pub struct RepoLoadCommits;

impl ApiCall for RepoLoadCommits {
    const NAME: ApiName = ApiName::RepoLoadCommits;

    type Payload = String;
    type Answer = Option<Vec<Snapshot>>;

    fn request(branch_id: &String) -> ApiRequest {
        rpc("SnapshotsById", json!([branch_id]))
    }
}

pub struct RepoAddCollaborator;

impl ApiCall for RepoAddCollaborator {
    const NAME: ApiName = ApiName::RepoAddCollaborator;

    type Payload = CollaboratorRequest;
    type Answer = bool;

    fn request(payload: &CollaboratorRequest) -> ApiRequest {
        rpc(
            "AddCollaborator",
            json!({ "Volume": payload.volume, "Collaborator": payload.collaborator }),
        )
    }
}

pub struct BillingSubmitPayment;

impl ApiCall for BillingSubmitPayment {
    const NAME: ApiName = ApiName::BillingSubmitPayment;

    type Payload = PaymentRequest;
    type Answer = bool;

    fn request(payload: &PaymentRequest) -> ApiRequest {
        rpc(
            "SubmitPayment",
            json!({ "Token": payload.token, "PlanId": payload.plan_id }),
        )
    }
}

pub struct ConfigLoad;

impl ApiCall for ConfigLoad {
    const NAME: ApiName = ApiName::ConfigLoad;

    type Payload = ();
    type Answer = RemoteConfig;

    fn request(_payload: &()) -> ApiRequest {
        rpc("Config", json!({}))
    }
}
