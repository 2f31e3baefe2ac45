//! Persistence contract for games and their state snapshots.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{Game, GameId, LegalMoves, Outcome, State, StateId, StoreError, StrategyKind};

/// Storage for games and the snapshots that make up their history.
///
/// Implementations generate identifiers and keep a game's current state and
/// history consistent after every save.
pub trait GameStore: Send + Sync {
    /// Identifier for a new game.
    fn next_game_id(&self) -> GameId {
        GameId::new()
    }

    /// Identifier for a new snapshot.
    fn next_state_id(&self) -> StateId {
        StateId::new()
    }

    /// Inserts or updates the game record (rules, outcome, current state).
    ///
    /// Every snapshot in the game's history must already be saved.
    fn save_game(&self, game: &Game) -> Result<(), StoreError>;

    /// Inserts a snapshot.
    fn save_state(&self, state: &State) -> Result<(), StoreError>;

    /// Saves new snapshots and then the game.
    ///
    /// Stores that can should make this atomic; the default simply runs the
    /// individual saves in order.
    fn save_round(&self, game: &Game, new_states: &[State]) -> Result<(), StoreError> {
        for state in new_states {
            self.save_state(state)?;
        }
        self.save_game(game)
    }

    /// Loads a game with its full history.
    fn find_game(&self, id: GameId) -> Result<Option<Game>, StoreError>;

    /// Deletes a game and its snapshots. Returns whether it existed.
    fn delete_game(&self, id: GameId) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct GameRecord {
    legal_moves: LegalMoves,
    strategy: StrategyKind,
    outcome: Outcome,
    current_state: StateId,
    history: Vec<StateId>,
}

impl GameRecord {
    fn of(game: &Game) -> Self {
        Self {
            legal_moves: game.legal_moves().clone(),
            strategy: game.strategy(),
            outcome: game.outcome(),
            current_state: game.current_state().id(),
            history: game.history().iter().map(State::id).collect(),
        }
    }
}

/// In-process store: game records plus an arena of snapshots addressed by id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: RwLock<HashMap<GameId, GameRecord>>,
    states: RwLock<HashMap<StateId, State>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory game store");
        Self::default()
    }

    /// Number of stored games.
    pub fn game_count(&self) -> usize {
        self.games.read().map(|games| games.len()).unwrap_or(0)
    }

    /// Number of stored snapshots.
    pub fn state_count(&self) -> usize {
        self.states.read().map(|states| states.len()).unwrap_or(0)
    }

    fn check_history(
        record: &GameRecord,
        states: &HashMap<StateId, State>,
        pending: &[State],
    ) -> Result<(), StoreError> {
        let saved = |id: StateId| states.contains_key(&id) || pending.iter().any(|s| s.id() == id);
        match record.history.iter().find(|id| !saved(**id)) {
            Some(missing) => Err(StoreError::new(format!("State {} was never saved", missing))),
            None => Ok(()),
        }
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::new(format!("{} lock poisoned", what))
}

impl GameStore for MemoryStore {
    #[instrument(skip(self, game), fields(game_id = %game.id()))]
    fn save_game(&self, game: &Game) -> Result<(), StoreError> {
        let record = GameRecord::of(game);
        // Lock order is games then states everywhere.
        let mut games = self.games.write().map_err(|_| poisoned("game"))?;
        let states = self.states.read().map_err(|_| poisoned("state"))?;
        Self::check_history(&record, &states, &[])?;
        games.insert(game.id(), record);
        debug!("Game saved");
        Ok(())
    }

    #[instrument(skip(self, state), fields(state_id = %state.id(), game_id = %state.game_id()))]
    fn save_state(&self, state: &State) -> Result<(), StoreError> {
        let mut states = self.states.write().map_err(|_| poisoned("state"))?;
        if states.contains_key(&state.id()) {
            return Err(StoreError::new(format!(
                "State {} already exists and is immutable",
                state.id()
            )));
        }
        states.insert(state.id(), state.clone());
        debug!("State saved");
        Ok(())
    }

    /// Holds both locks so readers never see the snapshots without the game.
    #[instrument(skip(self, game, new_states), fields(game_id = %game.id(), new_states = new_states.len()))]
    fn save_round(&self, game: &Game, new_states: &[State]) -> Result<(), StoreError> {
        let mut games = self.games.write().map_err(|_| poisoned("game"))?;
        let mut states = self.states.write().map_err(|_| poisoned("state"))?;

        if let Some(existing) = new_states.iter().find(|s| states.contains_key(&s.id())) {
            return Err(StoreError::new(format!(
                "State {} already exists and is immutable",
                existing.id()
            )));
        }
        let record = GameRecord::of(game);
        Self::check_history(&record, &states, new_states)?;

        for state in new_states {
            states.insert(state.id(), state.clone());
        }
        games.insert(game.id(), record);
        debug!("Round saved");
        Ok(())
    }

    #[instrument(skip(self))]
    fn find_game(&self, id: GameId) -> Result<Option<Game>, StoreError> {
        let games = self.games.read().map_err(|_| poisoned("game"))?;
        let Some(record) = games.get(&id) else {
            debug!("Game not found");
            return Ok(None);
        };

        let states = self.states.read().map_err(|_| poisoned("state"))?;
        let history = record
            .history
            .iter()
            .map(|state_id| {
                states
                    .get(state_id)
                    .cloned()
                    .ok_or_else(|| StoreError::new(format!("State {} is missing", state_id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let game = Game::restore(
            id,
            record.legal_moves.clone(),
            record.strategy,
            record.outcome,
            history,
        )?;
        if game.current_state().id() != record.current_state {
            return Err(StoreError::new(format!(
                "Current state of game {} is not the last in its history",
                id
            )));
        }
        Ok(Some(game))
    }

    #[instrument(skip(self))]
    fn delete_game(&self, id: GameId) -> Result<bool, StoreError> {
        let mut games = self.games.write().map_err(|_| poisoned("game"))?;
        let Some(record) = games.remove(&id) else {
            return Ok(false);
        };
        let mut states = self.states.write().map_err(|_| poisoned("state"))?;
        for state_id in &record.history {
            states.remove(state_id);
        }
        info!(states = record.history.len(), "Game deleted");
        Ok(true)
    }
}
