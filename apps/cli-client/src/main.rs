use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client_sdk::ApiName;
use common::size_label;
use console_core::sagas::{commits, repos};
use console_core::{Action, Console, ConsoleConfig, FormName, Hook, Signal};
use serde_json::{Map, Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "datamesh-console")]
#[command(about = "Terminal console for a datamesh storage cluster")]
struct Cli {
    /// Overrides `server_url` from the config file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    session_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Login {
        name: String,
        password: String,
        /// Keep the session for later commands.
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        remember: bool,
    },
    Logout,
    Whoami,
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    Repos {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    CreateRepo {
        name: String,
    },
    Commits {
        namespace: String,
        name: String,
        #[arg(long, default_value = "master")]
        branch: String,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    AddCollaborator {
        namespace: String,
        name: String,
        collaborator: String,
    },
    Plans,
    Pay {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        token: String,
    },
    /// Follows a console route and prints what the control loop loads.
    Watch {
        #[arg(default_value = "/repos")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let console = Console::from_config(resolve_config(&cli)?)?;

    match cli.command {
        Commands::Login {
            name,
            password,
            remember,
        } => {
            console.update_form(
                FormName::AuthLogin,
                form(json!({ "Name": name, "Password": password, "Remember": remember })),
            );
            console.run_hook(Hook::AuthLoginSubmit).await;

            let state = console.state();
            match state.user.clone() {
                Some(user) => println!("logged in as {}", user.name),
                None => bail!(
                    "login failed: {}",
                    state
                        .api(ApiName::AuthLogin)
                        .error
                        .unwrap_or_else(|| "incorrect details".to_string())
                ),
            }
        }
        Commands::Logout => {
            console.logout();
            println!("logged out");
        }
        Commands::Whoami => {
            if console.restore_session().await {
                if let Some(user) = console.state().user {
                    println!(
                        "{} <{}>",
                        user.name,
                        user.email.unwrap_or_else(|| "no email".to_string())
                    );
                }
            } else {
                println!("not logged in");
            }
        }
        Commands::Register {
            email,
            name,
            password,
        } => {
            let mut signals = console.signals();
            console.update_form(
                FormName::AuthRegister,
                form(json!({ "Email": email, "Name": name, "Password": password })),
            );
            console.run_hook(Hook::AuthRegisterSubmit).await;

            if console.state().user.is_none() {
                let mut reason = "registration failed".to_string();
                while let Ok(signal) = signals.try_recv() {
                    if let Signal::AuthRegisterError(message) | Signal::AuthLoginError(message) =
                        signal
                    {
                        reason = message;
                    }
                }
                bail!("{reason}");
            }
            persist_session(&console)?;
            println!("registered and logged in as {name}");
        }
        Commands::Repos { search, page } => {
            require_session(&console).await?;
            visit(&console, &format!("/repos/page/{page}"))?;
            console.run_hook(Hook::RepoList).await;
            if let Some(search) = search {
                console.store().dispatch(Action::SetRepoSearch(search));
            }

            let state = console.state();
            let page = repos::page(&state, console.config().repo_page_size);
            for repo in &page.items {
                println!(
                    "{:<32} {:>8}  {}",
                    repo.title(),
                    repo.size_title(),
                    repo.branch_count_title()
                );
            }
            println!(
                "page {} of {} ({} repos)",
                page.current,
                page.count.max(1),
                page.total
            );
        }
        Commands::CreateRepo { name } => {
            require_session(&console).await?;
            visit(&console, "/repos")?;
            console.run_hook(Hook::RepoFormInitialize).await;
            console.update_form(FormName::Repo, form(json!({ "Name": name })));
            console.run_hook(Hook::RepoFormSubmit).await;
            print_message(&console);
        }
        Commands::Commits {
            namespace,
            name,
            branch,
            search,
            page,
        } => {
            require_session(&console).await?;
            visit(
                &console,
                &format!("/repo/{namespace}/{name}/{branch}/page/{page}"),
            )?;
            console.run_hook(Hook::CommitList).await;
            if let Some(search) = search {
                console.store().dispatch(Action::SetCommitSearch(search));
            }

            let state = console.state();
            let page = commits::page(&state, console.config().commit_page_size);
            for commit in &page.items {
                println!(
                    "{:<12} {:>15} {:<16} {}",
                    commit.id,
                    commit.timestamp_millis(),
                    commit.author(),
                    commit.message()
                );
            }
            println!(
                "page {} of {} ({} commits)",
                page.current,
                page.count.max(1),
                page.total
            );
        }
        Commands::AddCollaborator {
            namespace,
            name,
            collaborator,
        } => {
            require_session(&console).await?;
            visit(&console, &format!("/repo/{namespace}/{name}"))?;
            console.run_hook(Hook::RepoList).await;
            console
                .run_hook(Hook::CollaboratorUpdateName(collaborator))
                .await;
            console.run_hook(Hook::CollaboratorAdd).await;
            print_message(&console);
        }
        Commands::Plans => {
            require_session(&console).await?;
            let config = console.state().remote_config;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Pay { plan, token } => {
            require_session(&console).await?;
            visit(&console, "/payment")?;
            console.update_form(FormName::Payment, form(json!({ "Plan": plan })));
            console.run_hook(Hook::BillingTokenReceived(token)).await;
            print_message(&console);
        }
        Commands::Watch { path } => {
            let route = console.initialize(&path).await?;
            info!(path = %route.path, "watching");
            watch(&console).await?;
            console.shutdown()?;
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<ConsoleConfig> {
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::load(path)?,
        None => ConsoleConfig::default(),
    }
    .with_env()?;

    if let Some(url) = &cli.server_url {
        config.server_url = url.clone();
    }
    if let Some(dir) = &cli.session_dir {
        config.session_dir = dir.clone();
    }
    Ok(config)
}

fn form(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn require_session(console: &Console) -> Result<()> {
    if !console.restore_session().await {
        bail!("not logged in, run `datamesh-console login <name> <password>` first");
    }
    Ok(())
}

fn persist_session(console: &Console) -> Result<()> {
    let user = console.state().user.context("no session to keep")?;
    console.services().credentials.persist(&user)
}

fn visit(console: &Console, path: &str) -> Result<()> {
    let route = console.navigate(path)?;
    if route.path != path {
        bail!("{path} is not available, redirected to {}", route.path);
    }
    Ok(())
}

fn print_message(console: &Console) {
    if let Some(message) = console.state().application_message {
        println!("{message}");
    }
}

async fn watch(console: &Console) -> Result<()> {
    let mut updates = console.subscribe();
    let mut signals = console.signals();
    let mut last_repo_count = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            signal = signals.recv() => {
                if let Ok(Signal::Redirect(path) | Signal::Message(path)) = signal {
                    println!("> {path}");
                }
            }
            changed = updates.changed() => {
                changed.context("console state closed")?;
                let (loaded, count, size) = {
                    let state = updates.borrow_and_update();
                    (
                        state.repos_loaded,
                        state.repos.len(),
                        state.repos.iter().map(|repo| repo.size_bytes()).sum::<i64>(),
                    )
                };
                if loaded && last_repo_count != Some(count) {
                    println!("{count} repos, {} total", size_label(size));
                    last_repo_count = Some(count);
                }
            }
        }
    }

    Ok(())
}
