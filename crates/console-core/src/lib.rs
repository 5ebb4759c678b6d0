pub mod auth;
pub mod config;
pub mod console;
pub mod control_loop;
pub mod credentials;
pub mod forms;
pub mod hooks;
pub mod lists;
pub mod registry;
pub mod routes;
pub mod sagas;
pub mod services;
pub mod state;

pub use config::ConsoleConfig;
pub use console::Console;
pub use forms::FormName;
pub use hooks::{Hook, HookName};
pub use registry::{ApiRegistry, LoadResult};
pub use routes::{GuardDecision, RouteMatch, RoutePolicy, authenticate_route};
pub use state::{Action, AppState, AuthPhase, Dispatcher, Signal, Store};
