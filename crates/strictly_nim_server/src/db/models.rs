//! Database rows and their conversion to domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use strictly_nim::{Game, GameId, LegalMoves, Outcome, State, StateId, StrategyKind};
use tracing::instrument;

use crate::db::{DbError, schema};

/// Game database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRow {
    id: String,
    legal_moves: String,
    strategy: String,
    outcome: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl GameRow {
    /// Parses the stored rules and outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any column holds a value the domain rejects.
    #[instrument(skip(self), fields(game_id = %self.id))]
    pub fn parse(&self) -> Result<(GameId, LegalMoves, StrategyKind, Outcome), DbError> {
        let id = self
            .id
            .parse::<GameId>()
            .map_err(|e| DbError::corrupt_row(format!("Invalid game id '{}': {}", self.id, e)))?;
        let legal_moves = self
            .legal_moves
            .parse::<LegalMoves>()
            .map_err(|e| {
                DbError::corrupt_row(format!("Invalid legal moves '{}': {}", self.legal_moves, e))
            })?;
        let strategy = self
            .strategy
            .parse::<StrategyKind>()
            .map_err(|e| {
                DbError::corrupt_row(format!("Invalid strategy '{}': {}", self.strategy, e))
            })?;
        let outcome = self
            .outcome
            .parse::<Outcome>()
            .map_err(|e| {
                DbError::corrupt_row(format!("Invalid outcome '{}': {}", self.outcome, e))
            })?;
        Ok((id, legal_moves, strategy, outcome))
    }
}

/// Insertable game model.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::games)]
pub struct NewGameRow {
    id: String,
    legal_moves: String,
    strategy: String,
    outcome: String,
}

impl From<&Game> for NewGameRow {
    fn from(game: &Game) -> Self {
        Self::new(
            game.id().to_string(),
            game.legal_moves().to_string(),
            game.strategy().to_string(),
            game.outcome().to_string(),
        )
    }
}

/// State snapshot database model.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::game_states)]
pub struct StateRow {
    id: String,
    game_id: String,
    heap_size: i64,
    turn: i64,
    players_turn: bool,
    created_at: NaiveDateTime,
}

impl StateRow {
    /// Converts the row into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on malformed ids or counts outside the domain range.
    #[instrument(skip(self), fields(state_id = %self.id))]
    pub fn to_state(&self) -> Result<State, DbError> {
        let id = self
            .id
            .parse::<StateId>()
            .map_err(|e| DbError::corrupt_row(format!("Invalid state id '{}': {}", self.id, e)))?;
        let game_id = self
            .game_id
            .parse::<GameId>()
            .map_err(|e| {
                DbError::corrupt_row(format!("Invalid game id '{}': {}", self.game_id, e))
            })?;
        let heap_size = u32::try_from(self.heap_size)
            .map_err(|_| {
                DbError::corrupt_row(format!("Heap size {} out of range", self.heap_size))
            })?;
        let turn = u32::try_from(self.turn)
            .map_err(|_| DbError::corrupt_row(format!("Turn {} out of range", self.turn)))?;
        Ok(State::new(id, game_id, heap_size, turn, self.players_turn))
    }
}

/// Insertable state snapshot model.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::game_states)]
pub struct NewStateRow {
    id: String,
    game_id: String,
    heap_size: i64,
    turn: i64,
    players_turn: bool,
}

impl From<&State> for NewStateRow {
    fn from(state: &State) -> Self {
        Self::new(
            state.id().to_string(),
            state.game_id().to_string(),
            i64::from(state.heap_size()),
            i64::from(state.turn()),
            state.players_turn(),
        )
    }
}
