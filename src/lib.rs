// Public API for integration tests and potential library usage

pub mod config;
pub mod error;
pub mod notifier;
pub mod orchestrator;
pub mod protocol;
pub mod questions;
pub mod state;
pub mod sweeper;
pub mod types;
pub mod ws;
