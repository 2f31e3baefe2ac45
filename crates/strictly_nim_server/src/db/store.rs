//! Diesel-backed implementation of [`GameStore`].

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use strictly_nim::{Game, GameId, GameStore, State, StoreError};
use tracing::{debug, info, instrument};

use crate::db::{DbError, DbErrorKind, GameRow, NewGameRow, NewStateRow, StateRow, schema};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Milliseconds a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Game store backed by a SQLite file.
///
/// Each operation opens its own connection, so `":memory:"` is not supported:
/// every connection would see a fresh, empty database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: String,
}

impl SqliteStore {
    /// Opens the database at `db_path`, creating it and applying pending
    /// migrations as needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or migrated.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn open(db_path: impl Into<String> + std::fmt::Display) -> Result<Self, DbError> {
        let store = Self {
            db_path: db_path.into(),
        };
        let mut conn = store.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| {
                DbError::new(DbErrorKind::Migration, format!("Migrations failed: {}", e))
            })?;
        info!(path = %store.db_path, migrations = applied.len(), "Opened game database");
        Ok(store)
    }

    /// Path of the database file.
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            DbError::new(
                DbErrorKind::Connection,
                format!("Failed to connect to '{}': {}", self.db_path, e),
            )
        })?;
        diesel::sql_query(format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS)).execute(&mut conn)?;
        Ok(conn)
    }

    /// Inserts the game row, or updates its outcome if it exists.
    fn write_game(conn: &mut SqliteConnection, game: &Game) -> Result<(), DbError> {
        use schema::games::dsl;

        let row = NewGameRow::from(game);
        let updated = diesel::update(dsl::games.find(row.id()))
            .set((
                dsl::outcome.eq(row.outcome()),
                dsl::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;
        if updated == 0 {
            diesel::insert_into(dsl::games).values(&row).execute(conn)?;
            debug!("Game row inserted");
        }
        Ok(())
    }

    fn insert_state(conn: &mut SqliteConnection, state: &State) -> Result<(), DbError> {
        diesel::insert_into(schema::game_states::table)
            .values(NewStateRow::from(state))
            .execute(conn)
            .map_err(|e| {
                DbError::new(
                    DbErrorKind::Query,
                    format!("Failed to insert state {}: {}", state.id(), e),
                )
            })?;
        Ok(())
    }

    /// Fails unless the stored snapshots are exactly the game's history.
    fn check_history(conn: &mut SqliteConnection, game: &Game) -> Result<(), DbError> {
        use schema::game_states::dsl;

        let stored: i64 = dsl::game_states
            .filter(dsl::game_id.eq(game.id().to_string()))
            .count()
            .get_result(conn)?;
        let expected = game.history().len() as i64;
        if stored != expected {
            return Err(DbError::new(
                DbErrorKind::HistoryMismatch,
                format!(
                    "Game {} has {} states in its history but {} are stored",
                    game.id(),
                    expected,
                    stored
                ),
            ));
        }
        Ok(())
    }
}

impl GameStore for SqliteStore {
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    fn save_game(&self, game: &Game) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.immediate_transaction::<_, DbError, _>(|conn| {
            Self::check_history(conn, game)?;
            Self::write_game(conn, game)
        })?;
        debug!("Game saved");
        Ok(())
    }

    #[instrument(skip(self, state), fields(state_id = %state.id(), game_id = %state.game_id()))]
    fn save_state(&self, state: &State) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        Self::insert_state(&mut conn, state)?;
        debug!("State saved");
        Ok(())
    }

    /// Writes the snapshots and the game in one transaction.
    #[instrument(skip(self, game, new_states), fields(game_id = %game.id(), new_states = new_states.len()))]
    fn save_round(&self, game: &Game, new_states: &[State]) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.immediate_transaction::<_, DbError, _>(|conn| {
            Self::write_game(conn, game)?;
            for state in new_states {
                Self::insert_state(conn, state)?;
            }
            Self::check_history(conn, game)
        })?;
        debug!("Round saved");
        Ok(())
    }

    #[instrument(skip(self))]
    fn find_game(&self, id: GameId) -> Result<Option<Game>, StoreError> {
        let mut conn = self.connection()?;
        let key = id.to_string();

        let Some(row) = schema::games::table
            .find(&key)
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(DbError::from)?
        else {
            debug!("Game not found");
            return Ok(None);
        };
        let (game_id, legal_moves, strategy, outcome) = row.parse()?;

        let history = schema::game_states::table
            .filter(schema::game_states::game_id.eq(&key))
            .order(schema::game_states::turn.asc())
            .select(StateRow::as_select())
            .load(&mut conn)
            .map_err(DbError::from)?
            .iter()
            .map(StateRow::to_state)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(states = history.len(), "Game loaded");
        let game = Game::restore(game_id, legal_moves, strategy, outcome, history)?;
        Ok(Some(game))
    }

    #[instrument(skip(self))]
    fn delete_game(&self, id: GameId) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        let key = id.to_string();

        let deleted = conn.immediate_transaction::<_, DbError, _>(|conn| {
            let states = diesel::delete(
                schema::game_states::table.filter(schema::game_states::game_id.eq(&key)),
            )
            .execute(conn)?;
            let games = diesel::delete(schema::games::table.find(&key)).execute(conn)?;
            debug!(states, games, "Rows deleted");
            Ok(games > 0)
        })?;

        if deleted {
            info!("Game deleted");
        }
        Ok(deleted)
    }
}
