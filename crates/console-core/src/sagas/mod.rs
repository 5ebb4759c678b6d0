//! Orchestration behind the data hooks: call the backend, project the answer
//! into state, and reset that state when a call fails.

pub mod billing;
pub mod collaborators;
pub mod commits;
pub mod remote_config;
pub mod repos;
