#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::ffi::OsString;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex, OnceLock};
    use std::time::{Duration, SystemTime};

    use anyhow::{Context, Result, bail};
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use client_sdk::methods::{ConfigLoad, RepoList};
    use client_sdk::{ApiError, ApiName, FileSessionStorage, MemorySessionStorage, SessionStorage};
    use common::Credentials;
    use console_core::{AppState, Console, ConsoleConfig, FormName, Hook, Signal};
    use serde_json::{Map, Value, json};
    use tokio::process::Command;

    #[derive(Debug, Clone)]
    struct RecordedCall {
        method: String,
        authorization: Option<String>,
        params: Value,
    }

    #[derive(Default)]
    struct BackendState {
        users: HashMap<String, (String, Value)>,
        repos: Vec<Value>,
        snapshots: HashMap<String, Value>,
        calls: Vec<RecordedCall>,
        registrations: Vec<Value>,
        id_offset: u64,
        delay: Duration,
    }

    /// In-process stand-in for the storage cluster's API server.
    #[derive(Clone, Default)]
    struct Backend {
        state: Arc<Mutex<BackendState>>,
    }

    impl Backend {
        fn seeded() -> Self {
            let backend = Backend::default();
            {
                let mut state = backend.state.lock().unwrap();
                state.users.insert(
                    "alice".to_string(),
                    (
                        "password".to_string(),
                        json!({ "Id": "u1", "Name": "alice", "Email": "a@a.com" }),
                    ),
                );
                state.users.insert(
                    "bob".to_string(),
                    (
                        "hunter2".to_string(),
                        json!({ "Id": "u2", "Name": "bob", "Email": "b@b.com" }),
                    ),
                );
                state.repos.push(repo_json("vol-1", "alice", "apples", &[("vol-2", "feature")]));
                state.repos.push(repo_json("vol-3", "alice", "zucchini", &[]));
                state.snapshots.insert(
                    "vol-2".to_string(),
                    json!([
                        { "Id": "c1", "Metadata": { "message": "initial import", "author": "alice", "timestamp": "1500000000000000000" } },
                        { "Id": "c2", "Metadata": { "message": "fix typo", "author": "bob", "timestamp": "1500000100000000000" } }
                    ]),
                );
            }
            backend
        }

        fn calls(&self, method: &str) -> Vec<RecordedCall> {
            self.state
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|call| call.method == method)
                .cloned()
                .collect()
        }

        fn set_id_offset(&self, offset: u64) {
            self.state.lock().unwrap().id_offset = offset;
        }

        fn set_delay(&self, delay: Duration) {
            self.state.lock().unwrap().delay = delay;
        }

        async fn spawn(&self) -> Result<String> {
            let app = Router::new()
                .route("/rpc", post(rpc))
                .route("/register", post(register))
                .with_state(self.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?;
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            Ok(format!("http://{addr}"))
        }
    }

    fn repo_json(id: &str, namespace: &str, name: &str, clones: &[(&str, &str)]) -> Value {
        json!({
            "TopLevelVolume": {
                "Id": id,
                "Name": { "Namespace": namespace, "Name": name },
                "SizeBytes": 4096,
                "ServerStatuses": null
            },
            "CloneVolumes": clones
                .iter()
                .map(|(clone_id, clone)| json!({
                    "Id": clone_id,
                    "Clone": clone,
                    "Name": { "Namespace": namespace, "Name": name }
                }))
                .collect::<Vec<_>>(),
            "Owner": { "Id": "u1", "Name": namespace },
            "Collaborators": null
        })
    }

    fn basic_user(headers: &HeaderMap) -> Option<(String, String)> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Basic ")?;
        let decoded = String::from_utf8(STANDARD.decode(token).ok()?).ok()?;
        let (name, password) = decoded.split_once(':')?;
        Some((name.to_string(), password.to_string()))
    }

    async fn rpc(State(backend): State<Backend>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let delay = backend.state.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = backend.state.lock().unwrap();

        let method = body["method"]
            .as_str()
            .unwrap_or_default()
            .trim_start_matches("DatameshRPC.")
            .to_string();
        state.calls.push(RecordedCall {
            method: method.clone(),
            authorization: headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            params: body["params"].clone(),
        });

        let user = basic_user(&headers).and_then(|(name, password)| {
            state
                .users
                .get(&name)
                .filter(|(expected, _)| *expected == password)
                .map(|(_, profile)| profile.clone())
        });
        let Some(user) = user else {
            return StatusCode::UNAUTHORIZED.into_response();
        };

        let params = &body["params"];
        let result = match method.as_str() {
            "CurrentUser" => user.clone(),
            "AllVolumesAndClones" => json!({ "Volumes": state.repos, "Servers": null }),
            "Create" => {
                let namespace = params["Namespace"].as_str().unwrap_or_default().to_string();
                let name = params["Name"].as_str().unwrap_or_default().to_string();
                let id = format!("vol-{}", state.repos.len() + 10);
                state.repos.push(repo_json(&id, &namespace, &name, &[]));
                json!(true)
            }
            "SnapshotsById" => {
                let id = params[0].as_str().unwrap_or_default();
                state.snapshots.get(id).cloned().unwrap_or(Value::Null)
            }
            "AddCollaborator" => {
                let volume = params["Volume"].as_str().unwrap_or_default();
                let exists = state
                    .repos
                    .iter()
                    .any(|repo| repo["TopLevelVolume"]["Id"] == volume);
                if !exists {
                    let id = body["id"].clone();
                    return Json(json!({ "id": id, "result": null, "error": "no such volume" }))
                        .into_response();
                }
                json!(true)
            }
            "SubmitPayment" => json!(params["Token"] == "tok_good"),
            "Config" => json!({
                "Plans": [ { "Id": "pro", "Name": "Pro", "Price": 10 } ],
                "StripePublicKey": "pk_test"
            }),
            other => {
                let id = body["id"].clone();
                return Json(json!({ "id": id, "error": { "code": -32601, "message": format!("unknown method {other}") } }))
                    .into_response();
            }
        };

        let id = body["id"].as_u64().unwrap_or_default() + state.id_offset;
        Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
    }

    async fn register(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
        let mut state = backend.state.lock().unwrap();
        state.registrations.push(body.clone());

        let name = body["Name"].as_str().unwrap_or_default().to_string();
        if state.users.contains_key(&name) {
            return Json(json!({ "Created": false, "NameError": "name already taken" }));
        }
        if name == "silent" {
            return Json(json!({}));
        }

        let id = format!("u{}", state.users.len() + 1);
        let profile = json!({ "Id": id, "Name": name, "Email": body["Email"] });
        let password = body["Password"].as_str().unwrap_or_default().to_string();
        state.users.insert(name, (password, profile));
        Json(json!({ "Created": true }))
    }

    fn config_for(server_url: &str) -> ConsoleConfig {
        ConsoleConfig {
            server_url: server_url.to_string(),
            control_loop_interval_ms: 50,
            repo_page_size: 1,
            ..ConsoleConfig::default()
        }
    }

    async fn console_with(backend: &Backend, storage: Arc<dyn SessionStorage>) -> Result<Console> {
        let server_url = backend.spawn().await?;
        Console::build(config_for(&server_url), storage)
    }

    async fn memory_console(backend: &Backend) -> Result<Console> {
        console_with(backend, Arc::new(MemorySessionStorage::new())).await
    }

    async fn wait_until(console: &Console, check: impl Fn(&AppState) -> bool) -> Result<()> {
        let mut updates = console.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            updates.wait_for(|state| check(state)).await.map(|_| ())
        })
        .await
        .context("timed out waiting for console state")?
        .context("console state closed")?;
        Ok(())
    }

    fn form(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn drain(signals: &mut tokio::sync::broadcast::Receiver<Signal>) -> Vec<Signal> {
        let mut seen = Vec::new();
        while let Ok(signal) = signals.try_recv() {
            seen.push(signal);
        }
        seen
    }

    #[tokio::test]
    async fn login_merges_profile_and_authenticates_later_calls() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        let mut signals = console.signals();

        assert!(console.login(Credentials::new("alice", "password")).await);

        let user = console.state().user.context("no session after login")?;
        assert_eq!(
            serde_json::to_value(&user)?,
            json!({ "Id": "u1", "Name": "alice", "Email": "a@a.com", "Password": "password" })
        );

        console.run_hook(Hook::RepoList).await;
        let listed = backend.calls("AllVolumesAndClones");
        assert_eq!(
            listed[0].authorization.as_deref(),
            Some("Basic YWxpY2U6cGFzc3dvcmQ=")
        );

        let state = console.state();
        assert_eq!(state.route.path, "/dashboard");
        assert_eq!(state.remote_config.plan("pro").map(|p| p.id.as_str()), Some("pro"));
        assert!(drain(&mut signals).contains(&Signal::AuthLoginSuccess));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_reports_incorrect_details_only() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        let mut signals = console.signals();

        assert!(!console.login(Credentials::new("alice", "nope")).await);

        assert_eq!(console.state().user, None);
        assert_eq!(
            console.state().api(ApiName::AuthLogin).error.as_deref(),
            Some("incorrect details")
        );
        assert_eq!(
            drain(&mut signals),
            vec![Signal::AuthLoginError("incorrect details".to_string())]
        );
        Ok(())
    }

    #[tokio::test]
    async fn register_without_created_flag_never_logs_in() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        let mut signals = console.signals();

        console.update_form(
            FormName::AuthRegister,
            form(json!({ "Email": "s@s.com", "Name": "silent", "Password": "pw" })),
        );
        console.run_hook(Hook::AuthRegisterSubmit).await;

        assert!(backend.calls("CurrentUser").is_empty());
        assert_eq!(console.state().user, None);
        assert!(
            drain(&mut signals)
                .contains(&Signal::AuthRegisterError("user was not created".to_string()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn register_reports_server_field_errors() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;

        console.update_form(
            FormName::AuthRegister,
            form(json!({ "Email": "x@x.com", "Name": "bob", "Password": "pw" })),
        );
        console.run_hook(Hook::AuthRegisterSubmit).await;

        assert_eq!(
            console.state().application_message.as_deref(),
            Some("name already taken")
        );
        assert!(backend.calls("CurrentUser").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn register_then_login_lands_on_dashboard() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        let mut signals = console.signals();

        console.update_form(
            FormName::AuthRegister,
            form(json!({ "Email": "c@c.com", "Name": "carol", "Password": "pw" })),
        );
        console.run_hook(Hook::AuthRegisterSubmit).await;

        let state = console.state();
        assert_eq!(state.user_name(), Some("carol"));
        assert_eq!(state.route.path, "/dashboard");
        assert!(drain(&mut signals).contains(&Signal::AuthRegisterSuccess));
        assert_eq!(
            backend.state.lock().unwrap().registrations[0],
            json!({ "Email": "c@c.com", "Name": "carol", "Password": "pw" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_login_form_is_touched_and_never_sent() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;

        console.update_form(FormName::AuthLogin, form(json!({ "Name": "alice" })));
        console.run_hook(Hook::AuthLoginSubmit).await;

        assert!(backend.calls("CurrentUser").is_empty());
        let state = console.state();
        assert!(state.forms[&FormName::AuthLogin].touched);
        Ok(())
    }

    #[tokio::test]
    async fn mismatched_response_id_is_rejected_and_not_recorded() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        let dispatch = console.dispatcher();
        let registry = &console.services().registry;
        console
            .services()
            .credentials
            .set(Some(Credentials::new("alice", "password")));

        for _ in 0..4 {
            assert!(registry.load::<RepoList>(&dispatch, &()).await.is_ok());
        }

        backend.set_id_offset(1);
        let result = registry.load::<ConfigLoad>(&dispatch, &()).await;

        assert_eq!(
            result.cause,
            Some(ApiError::ProtocolMismatch {
                expected: 4,
                actual: "5".to_string()
            })
        );
        let call = console.state().api(ApiName::ConfigLoad);
        assert_eq!(call.last_answer, None);
        assert!(call.error.is_some());

        backend.set_id_offset(0);
        assert!(registry.load::<ConfigLoad>(&dispatch, &()).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_session_before_the_next_call() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);

        console.logout();

        let before = backend.calls("AllVolumesAndClones").len();
        let result = console
            .services()
            .registry
            .load::<RepoList>(&console.dispatcher(), &())
            .await;

        assert_eq!(result.cause, Some(ApiError::Unauthenticated));
        assert_eq!(backend.calls("AllVolumesAndClones").len(), before);
        assert_eq!(console.state().route.path, "/");
        Ok(())
    }

    #[tokio::test]
    async fn remembered_session_survives_a_restart() -> Result<()> {
        let backend = Backend::seeded();
        let session_dir = fresh_data_dir("remember");

        let first = console_with(&backend, Arc::new(FileSessionStorage::new(&session_dir))).await?;
        assert!(
            first
                .login(Credentials::new("alice", "password").remembered())
                .await
        );
        first.shutdown()?;

        let second = console_with(&backend, Arc::new(FileSessionStorage::new(&session_dir))).await?;
        let mut signals = second.signals();
        let route = second.initialize("/repos").await?;

        assert_eq!(route.path, "/repos");
        assert_eq!(second.state().user_name(), Some("alice"));
        assert!(
            !drain(&mut signals)
                .iter()
                .any(|signal| *signal == Signal::AuthLoginSuccess)
        );
        second.shutdown()?;

        let _ = fs::remove_dir_all(session_dir);
        Ok(())
    }

    #[tokio::test]
    async fn logout_forgets_the_remembered_session() -> Result<()> {
        let backend = Backend::seeded();
        let session_dir = fresh_data_dir("forget");

        let first = console_with(&backend, Arc::new(FileSessionStorage::new(&session_dir))).await?;
        assert!(
            first
                .login(Credentials::new("alice", "password").remembered())
                .await
        );
        assert!(session_dir.join("user.json").exists());

        first.logout();
        assert!(!session_dir.join("user.json").exists());
        first.shutdown()?;

        let logins = backend.calls("CurrentUser").len();
        let second = console_with(&backend, Arc::new(FileSessionStorage::new(&session_dir))).await?;
        let route = second.initialize("/repos").await?;

        assert_eq!(route.path, "/login");
        assert_eq!(second.state().user, None);
        assert_eq!(backend.calls("CurrentUser").len(), logins);
        second.shutdown()?;

        let _ = fs::remove_dir_all(session_dir);
        Ok(())
    }

    #[tokio::test]
    async fn login_without_remember_keeps_nothing_on_disk() -> Result<()> {
        let backend = Backend::seeded();
        let session_dir = fresh_data_dir("transient");

        let console = console_with(&backend, Arc::new(FileSessionStorage::new(&session_dir))).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);

        assert_eq!(console.state().user_name(), Some("alice"));
        assert_eq!(console.services().credentials.load_persisted(), None);
        assert!(!session_dir.join("user.json").exists());

        let _ = fs::remove_dir_all(session_dir);
        Ok(())
    }

    #[tokio::test]
    async fn stopping_the_loop_mid_call_settles_call_state() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);
        console.navigate("/repos")?;

        backend.set_delay(Duration::from_millis(300));
        console.start_control_loop()?;
        wait_until(&console, |state| state.api(ApiName::RepoList).loading).await?;

        console.stop_control_loop()?;
        wait_until(&console, |state| !state.api(ApiName::RepoList).loading).await?;

        let state = console.state();
        let call = state.api(ApiName::RepoList);
        assert_eq!(call.error, None);
        assert!(call.last_answer.is_some());
        assert!(!state.repos_loaded);
        assert!(state.repos.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_session_file_means_logged_out() -> Result<()> {
        let backend = Backend::seeded();
        let session_dir = fresh_data_dir("corrupt");
        fs::write(session_dir.join("user.json"), "{\"Name\":")?;

        let console = console_with(&backend, Arc::new(FileSessionStorage::new(&session_dir))).await?;
        let route = console.initialize("/repos").await?;

        assert_eq!(route.path, "/login");
        assert_eq!(console.state().user, None);
        assert!(backend.calls("CurrentUser").is_empty());
        console.shutdown()?;

        let _ = fs::remove_dir_all(session_dir);
        Ok(())
    }

    #[tokio::test]
    async fn control_loop_refreshes_the_current_route() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);

        console.initialize("/repos").await?;
        wait_until(&console, |state| state.repos_loaded).await?;

        let names = console
            .state()
            .repos
            .iter()
            .map(|repo| repo.name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["apples", "zucchini"]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(backend.calls("AllVolumesAndClones").len() >= 2);

        console.shutdown()?;
        let after_stop = backend.calls("AllVolumesAndClones").len();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(backend.calls("AllVolumesAndClones").len() <= after_stop + 1);
        Ok(())
    }

    #[tokio::test]
    async fn repo_search_resets_to_first_page() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);
        console.navigate("/repos/page/2")?;
        console.run_hook(Hook::RepoList).await;

        let state = console.state();
        let page = console_core::sagas::repos::page(&state, 1);
        assert_eq!(page.items[0].name(), "zucchini");

        console
            .run_hook(Hook::RepoUpdateSearch("Zucc!".to_string()))
            .await;

        let state = console.state();
        assert_eq!(state.route.path, "/repos/page/1");
        let page = console_core::sagas::repos::page(&state, 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name(), "zucchini");
        Ok(())
    }

    #[tokio::test]
    async fn repo_form_creates_then_refuses_duplicates() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);
        console.navigate("/repos")?;

        console.run_hook(Hook::RepoFormInitialize).await;
        console.update_form(FormName::Repo, form(json!({ "Name": "bananas" })));
        console.run_hook(Hook::RepoFormSubmit).await;

        assert_eq!(
            console.state().application_message.as_deref(),
            Some("repo alice / bananas created")
        );
        assert_eq!(
            backend.calls("Create")[0].params,
            json!({ "Namespace": "alice", "Name": "bananas" })
        );

        console.run_hook(Hook::RepoFormSubmit).await;
        assert_eq!(
            console.state().application_message.as_deref(),
            Some("repo with name: alice / bananas already exists")
        );
        assert_eq!(backend.calls("Create").len(), 1);
        assert!(!console.state().repo_form_loading);
        Ok(())
    }

    #[tokio::test]
    async fn commits_load_for_the_routed_branch() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);

        console.navigate("/repo/alice/apples/feature")?;
        console.run_hook(Hook::CommitList).await;

        let state = console.state();
        assert_eq!(state.commits.len(), 2);
        assert_eq!(backend.calls("SnapshotsById")[0].params, json!(["vol-2"]));
        assert_eq!(state.commits[0].timestamp_millis(), 1_500_000_000_000);

        console.navigate("/repo/alice/apples/master")?;
        console.run_hook(Hook::CommitList).await;
        assert!(console.state().commits.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn collaborator_is_added_to_the_routed_repo() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);

        console.navigate("/repo/alice/apples")?;
        console.run_hook(Hook::RepoList).await;
        console
            .run_hook(Hook::CollaboratorUpdateName("bob".to_string()))
            .await;
        console.run_hook(Hook::CollaboratorAdd).await;

        assert_eq!(
            backend.calls("AddCollaborator")[0].params,
            json!({ "Volume": "vol-1", "Collaborator": "bob" })
        );
        let state = console.state();
        assert_eq!(state.collaborator_name, "");
        assert_eq!(
            state.application_message.as_deref(),
            Some("bob added as a collaborator to alice / apples")
        );
        Ok(())
    }

    #[tokio::test]
    async fn payment_requires_a_known_plan() -> Result<()> {
        let backend = Backend::seeded();
        let console = memory_console(&backend).await?;
        assert!(console.login(Credentials::new("alice", "password")).await);
        console.navigate("/payment")?;

        console.update_form(FormName::Payment, form(json!({ "Plan": "gold" })));
        console
            .run_hook(Hook::BillingTokenReceived("tok_good".to_string()))
            .await;
        assert!(backend.calls("SubmitPayment").is_empty());
        assert_eq!(
            console.state().application_message.as_deref(),
            Some("unknown plan: gold")
        );

        console.update_form(FormName::Payment, form(json!({ "Plan": "pro" })));
        console
            .run_hook(Hook::BillingTokenReceived("tok_good".to_string()))
            .await;
        assert_eq!(
            backend.calls("SubmitPayment")[0].params,
            json!({ "Token": "tok_good", "PlanId": "pro" })
        );
        assert_eq!(console.state().route.path, "/dashboard");
        Ok(())
    }

    #[tokio::test]
    async fn cli_login_then_list_repos() -> Result<()> {
        let backend = Backend::seeded();
        let server_url = backend.spawn().await?;
        let session_dir = fresh_data_dir("cli");
        let session = session_dir.to_string_lossy().to_string();
        let conn = ["--server-url", server_url.as_str(), "--session-dir", session.as_str()];

        let output = run_cli(&conn, &["login", "alice", "password"]).await?;
        assert!(output.contains("logged in as alice"));
        assert!(session_dir.join("user.json").exists());

        let output = run_cli(&conn, &["whoami"]).await?;
        assert!(output.contains("alice <a@a.com>"));

        let output = run_cli(&conn, &["repos"]).await?;
        assert!(output.contains("alice / apples"));
        assert!(output.contains("2 branches"));

        run_cli(&conn, &["logout"]).await?;
        assert!(!session_dir.join("user.json").exists());
        assert!(run_cli(&conn, &["repos"]).await.is_err());

        let _ = fs::remove_dir_all(session_dir);
        Ok(())
    }

    #[tokio::test]
    async fn cli_rejects_bad_credentials() -> Result<()> {
        let backend = Backend::seeded();
        let server_url = backend.spawn().await?;
        let session_dir = fresh_data_dir("cli-bad");
        let session = session_dir.to_string_lossy().to_string();
        let conn = ["--server-url", server_url.as_str(), "--session-dir", session.as_str()];

        let err = run_cli(&conn, &["login", "alice", "wrong"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("incorrect details"));
        assert!(!session_dir.join("user.json").exists());

        let _ = fs::remove_dir_all(session_dir);
        Ok(())
    }

    async fn run_cli(connection: &[&str], args: &[&str]) -> Result<String> {
        let cli_bin = binary_path("datamesh-console")?;
        let output = Command::new(cli_bin)
            .args(connection)
            .args(args)
            .env("RUST_LOG", "warn")
            .output()
            .await
            .context("failed to execute datamesh-console")?;

        if !output.status.success() {
            bail!(
                "datamesh-console failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn binary_path(name: &str) -> Result<PathBuf> {
        let workspace_root = workspace_root()?;
        ensure_binaries_built(&workspace_root)?;
        let mut path = workspace_root.join("target").join("debug").join(name);

        if let Some(suffix) = std::env::consts::EXE_SUFFIX.strip_prefix('.') {
            let mut filename = OsString::from(name);
            filename.push(".");
            filename.push(suffix);
            path = workspace_root.join("target").join("debug").join(filename);
        }

        if !path.exists() {
            bail!("expected binary does not exist: {}", path.display());
        }

        Ok(path)
    }

    fn workspace_root() -> Result<PathBuf> {
        let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        crate_dir
            .parent()
            .and_then(|p| p.parent())
            .map(PathBuf::from)
            .context("failed to resolve workspace root")
    }

    fn build_required_binaries(workspace_root: &Path) -> Result<()> {
        let status = std::process::Command::new("cargo")
            .arg("build")
            .arg("-p")
            .arg("cli-client")
            .current_dir(workspace_root)
            .status()
            .context("failed to run cargo build for system test binaries")?;

        if !status.success() {
            bail!("cargo build for system test binaries failed");
        }

        Ok(())
    }

    fn ensure_binaries_built(workspace_root: &Path) -> Result<()> {
        static BUILD_RESULT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

        let result = BUILD_RESULT.get_or_init(|| {
            build_required_binaries(workspace_root).map_err(|err| err.to_string())
        });

        if let Err(message) = result {
            bail!("failed to build required binaries: {message}");
        }

        Ok(())
    }

    fn fresh_data_dir(name: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("datamesh-console-{name}-{unique}"));
        let _ = fs::remove_dir_all(&path);
        let _ = fs::create_dir_all(&path);
        path
    }
}
