//! # PlanetScale AI
//!
//! An HTTP API that answers natural-language questions against MySQL and
//! PlanetScale databases.
//!
//! This crate provides:
//! - **Schema introspection**: list databases, tables, and column types
//! - **Prompt building**: render the completion prompt from table names
//! - **Completion**: ask a completion model to write a `SELECT` statement
//! - **Execution**: validate, run, and normalize the generated statement
//!
//! ## Architecture
//!
//! Handlers in [`handlers`] are thin adapters over the
//! [`pipeline::NaturalLanguageQueryService`], which owns no connections.
//! Database access goes through the [`database::Database`] trait and model
//! access through [`completion::CompletionClient`], so both can be replaced
//! in tests.

pub mod completion;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod security;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod transport;

pub use completion::{CompletionClient, OpenAiCompletionClient};
pub use config::Config;
pub use database::{Database, MySqlDatabase};
pub use error::ServerError;
pub use pipeline::NaturalLanguageQueryService;
pub use server::AppState;
