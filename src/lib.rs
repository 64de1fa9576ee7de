//! Remote Deploy - project synchronization and remote environment management
//!
//! This crate synchronizes a local project tree to a remote host over one
//! file session, writes the remote env file from the local environment or
//! the operator, and runs post-deploy commands over a second session.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod env;
pub mod observer;
pub mod runner;
pub mod sync;
pub mod transport;
pub mod types;

pub use deploy::{DeployError, DeployReport, Deployer};
pub use types::*;
