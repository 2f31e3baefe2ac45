//! SQLite persistence for games and their state snapshots.

mod error;
mod models;
mod schema; // Diesel generated schema - internal use only
mod store;

pub use error::{DbError, DbErrorKind};
pub use models::{GameRow, NewGameRow, NewStateRow, StateRow};
pub use store::{MIGRATIONS, SqliteStore};
