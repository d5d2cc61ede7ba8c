//! Milk tracker CLI library.
//!
//! This crate provides the CLI interface for the milk tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, HerdAction};
pub use config::Config;
