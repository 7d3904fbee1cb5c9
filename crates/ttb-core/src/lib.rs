//! Core domain + application logic for the Toggl timer-watch bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the
//! Toggl Track API live behind ports (traits) implemented in adapter
//! crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod logging;
pub mod messaging;
pub mod store;
pub mod tracker;
pub mod watcher;

pub use errors::{Error, Result};
