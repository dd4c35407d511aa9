//! Core domain + application logic for the mention-all bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the messaging port,
//! implemented in the adapter crate.

pub mod broadcast;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod member;
pub mod messaging;
pub mod registry;
pub mod store;

pub use errors::{Error, Result};
