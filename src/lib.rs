//! casita — smart-home voice-assistant execution backend
//!
//! Receives device control intents from a cloud assistant, applies them to
//! a per-user device inventory in a hosted document database, and returns
//! the resulting device state. The interesting part is the command
//! execution engine: trait-aware, precondition-checked state transitions
//! over semi-structured device documents, with a closed error vocabulary
//! surfaced back to the assistant.

pub mod auth;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod home;
pub mod logging;
pub mod model;
pub mod server;
pub mod store;
