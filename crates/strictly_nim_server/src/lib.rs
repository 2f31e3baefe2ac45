//! Strictly Nim server - REST API, SQLite persistence and terminal client
//!
//! Wraps the [`strictly_nim`] turn engine for use over the network.
//!
//! # Architecture
//!
//! - **API**: axum router exposing game creation, moves, lookup and deletion
//! - **Database**: diesel-backed [`SqliteStore`] implementing [`strictly_nim::GameStore`]
//! - **Config**: [`ServerConfig`] from TOML, environment and CLI flags
//! - **Client**: [`NimClient`] for the REST API and a line-oriented [`play`] loop

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod client;
mod config;
mod db;
mod play;

// Crate-level exports - REST API
pub use api::{
    ApiError, AppState, ErrorBody, GameView, GetGameQuery, MakeMoveRequest, NewGameRequest,
    StateView, router, status_for,
};

// Crate-level exports - HTTP client
pub use client::{ClientError, NimClient};

// Crate-level exports - Configuration
pub use config::{ConfigError, DEFAULT_CONFIG_FILE, ServerConfig};

// Crate-level exports - Database
pub use db::{
    DbError, DbErrorKind, GameRow, MIGRATIONS, NewGameRow, NewStateRow, SqliteStore, StateRow,
};

// Crate-level exports - Terminal client
pub use play::{Table, play};
