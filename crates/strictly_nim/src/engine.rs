//! Turn engine: game creation and the player-move / automated-reply round.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::{
    Game, GameId, GameStore, IllegalMoveReason, LegalMoves, NimError, Outcome, State,
    StrategyProvider,
};

/// Parameters for a new game, as received from a caller.
///
/// Values are signed so that out-of-range input reaches validation instead of
/// failing to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    /// Tokens on the heap at the start.
    pub heap_size: i64,
    /// Counts a move may remove.
    pub legal_moves: Vec<i64>,
    /// Strategy identifier of the automated opponent.
    pub strategy: String,
}

impl NewGame {
    /// Heap size used when the caller gives none.
    pub const DEFAULT_HEAP_SIZE: i64 = 13;
    /// Strategy used when the caller gives none.
    pub const DEFAULT_STRATEGY: &'static str = "DP";

    /// Legal moves used when the caller gives none.
    pub fn default_legal_moves() -> Vec<i64> {
        vec![1, 2, 3]
    }
}

impl Default for NewGame {
    fn default() -> Self {
        Self {
            heap_size: Self::DEFAULT_HEAP_SIZE,
            legal_moves: Self::default_legal_moves(),
            strategy: Self::DEFAULT_STRATEGY.to_string(),
        }
    }
}

/// Runs games against the automated opponent.
///
/// All calls are synchronous. Moves on the same game are serialized by a
/// per-game lock held across load, validation, both half-moves and the save;
/// different games run in parallel.
pub struct TurnEngine {
    store: Arc<dyn GameStore>,
    strategies: StrategyProvider,
    max_heap_size: u32,
    /// Present only while a call on that game is in flight.
    locks: DashMap<GameId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("strategies", &self.strategies)
            .field("max_heap_size", &self.max_heap_size)
            .field("locked_games", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl TurnEngine {
    /// Largest opening heap accepted unless configured otherwise.
    ///
    /// The DP solution holds three tables of this many entries.
    pub const DEFAULT_MAX_HEAP_SIZE: u32 = 1_000_000;

    /// Creates an engine over a store and a strategy provider.
    #[instrument(skip_all)]
    pub fn new(store: Arc<dyn GameStore>, strategies: StrategyProvider) -> Self {
        info!("Creating turn engine");
        Self {
            store,
            strategies,
            max_heap_size: Self::DEFAULT_MAX_HEAP_SIZE,
            locks: DashMap::new(),
        }
    }

    /// Sets the largest opening heap `create_game` accepts.
    pub fn with_max_heap_size(mut self, max_heap_size: u32) -> Self {
        self.max_heap_size = max_heap_size;
        self
    }

    /// Largest opening heap `create_game` accepts.
    pub fn max_heap_size(&self) -> u32 {
        self.max_heap_size
    }

    /// Number of games with a call in flight.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    /// The strategy provider.
    pub fn strategies(&self) -> &StrategyProvider {
        &self.strategies
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    /// Creates and persists a game with its opening state.
    ///
    /// # Errors
    ///
    /// Returns [`NimError::InvalidConfiguration`] naming the first bad field
    /// (checked in the order strategy, heap size, legal moves), or
    /// [`NimError::Storage`] if saving fails.
    #[instrument(skip(self, request), fields(heap_size = request.heap_size, strategy = %request.strategy))]
    pub fn create_game(&self, request: NewGame) -> Result<Game, NimError> {
        let strategy = self.strategies.kind_of(&request.strategy).ok_or_else(|| {
            warn!("Rejecting unknown strategy");
            NimError::invalid_configuration(
                "strategy",
                format!("Strategy {} is not a valid strategy", request.strategy),
            )
        })?;

        let heap_size = u32::try_from(request.heap_size)
            .ok()
            .filter(|&heap| heap <= self.max_heap_size)
            .ok_or_else(|| {
                warn!(max = self.max_heap_size, "Rejecting heap size");
                NimError::invalid_configuration(
                    "heap_size",
                    format!(
                        "Number of tokens at the beginning of the game should be between 0 and {}",
                        self.max_heap_size
                    ),
                )
            })?;

        let legal_moves = LegalMoves::from_requested(&request.legal_moves)?;
        if heap_size > 0 && !legal_moves.can_move(heap_size) {
            warn!(smallest = legal_moves.smallest(), "No legal move fits the opening heap");
            return Err(NimError::invalid_configuration(
                "legal_moves",
                format!(
                    "no legal move fits the opening heap of {} tokens",
                    heap_size
                ),
            ));
        }

        let id = self.store.next_game_id();
        let initial = State::initial(self.store.next_state_id(), id, heap_size);
        let game = Game::start(id, legal_moves, strategy, initial.clone());
        self.store.save_round(&game, &[initial])?;

        info!(game_id = %id, moves = %game.legal_moves(), "Game created");
        Ok(game)
    }

    /// Applies a player move and, unless it ended the game, the automated reply.
    ///
    /// A rejected move writes nothing.
    ///
    /// # Errors
    ///
    /// - [`NimError::NotFound`] if the game does not exist.
    /// - [`NimError::IllegalMove`] if the game is finished, `count` is not a
    ///   legal move, or `count` exceeds the heap (checked in that order).
    /// - [`NimError::Storage`] if loading or saving fails.
    #[instrument(skip(self))]
    pub fn apply_player_move(&self, game_id: GameId, count: i64) -> Result<Game, NimError> {
        self.with_game_lock(game_id, || self.apply_locked(game_id, count))
    }

    /// Loads a game.
    ///
    /// # Errors
    ///
    /// Returns [`NimError::NotFound`] if it does not exist.
    #[instrument(skip(self))]
    pub fn get_game(&self, game_id: GameId) -> Result<Game, NimError> {
        self.store
            .find_game(game_id)?
            .ok_or(NimError::NotFound { id: game_id })
    }

    /// Deletes a game and drops any cached strategy state for it.
    ///
    /// # Errors
    ///
    /// Returns [`NimError::NotFound`] if it does not exist.
    #[instrument(skip(self))]
    pub fn remove_game(&self, game_id: GameId) -> Result<(), NimError> {
        self.with_game_lock(game_id, || {
            let removed = self.store.delete_game(game_id)?;
            self.strategies.release(game_id);

            if removed {
                info!("Game removed");
                Ok(())
            } else {
                Err(NimError::NotFound { id: game_id })
            }
        })
    }

    /// Runs `f` under the game's lock. The entry is dropped afterwards unless
    /// another call already holds a handle to it.
    fn with_game_lock<T>(&self, game_id: GameId, f: impl FnOnce() -> T) -> T {
        let lock = Arc::clone(self.locks.entry(game_id).or_default().value());
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        self.locks
            .remove_if(&game_id, |_, entry| Arc::strong_count(entry) == 1);
        result
    }

    fn apply_locked(&self, game_id: GameId, count: i64) -> Result<Game, NimError> {
        let Some(mut game) = self.store.find_game(game_id)? else {
            warn!("Move on unknown game");
            return Err(NimError::NotFound { id: game_id });
        };

        let taken = Self::validate_move(&game, count)?;
        let mut new_states = Vec::with_capacity(2);

        // Player half-move
        let after_player = game
            .current_state()
            .successor(self.store.next_state_id(), taken);
        debug!(taken, heap = after_player.heap_size(), "Player moved");
        game.push_state(after_player.clone());
        new_states.push(after_player);

        if game.current_state().heap_size() == 0 {
            info!("Player took the last token");
            game.decide(Outcome::ComputerWon);
        } else {
            self.reply(&mut game, &mut new_states);
        }

        self.store.save_round(&game, &new_states)?;

        if game.outcome().is_decided() {
            info!(outcome = %game.outcome(), turns = game.current_state().turn(), "Game finished");
            self.strategies.release(game_id);
        }
        Ok(game)
    }

    fn validate_move(game: &Game, count: i64) -> Result<u32, NimError> {
        if game.is_finished() {
            warn!(count, "Move on finished game");
            return Err(NimError::illegal_move(count, IllegalMoveReason::GameFinished));
        }

        let taken = u32::try_from(count)
            .ok()
            .filter(|&m| game.legal_moves().contains(m))
            .ok_or_else(|| {
                warn!(count, moves = %game.legal_moves(), "Move not in legal set");
                NimError::illegal_move(count, IllegalMoveReason::MoveNotAllowed)
            })?;

        if taken > game.current_state().heap_size() {
            warn!(count, heap = game.current_state().heap_size(), "Move exceeds heap");
            return Err(NimError::illegal_move(count, IllegalMoveReason::InsufficientTokens));
        }
        Ok(taken)
    }

    /// Automated half-move on a game with tokens left.
    fn reply(&self, game: &mut Game, new_states: &mut Vec<State>) {
        let strategy = self.strategies.for_kind(game.strategy());

        let Some(taken) = strategy.calculate_move(game) else {
            info!("Automated side has no legal move and loses");
            game.decide(Outcome::PlayerWon);
            return;
        };
        debug_assert!(game.legal_moves().contains(taken));
        debug_assert!(taken <= game.current_state().heap_size());

        let after_reply = game
            .current_state()
            .successor(self.store.next_state_id(), taken);
        debug!(taken, heap = after_reply.heap_size(), strategy = %strategy.kind(), "Automated side moved");
        game.push_state(after_reply.clone());
        new_states.push(after_reply);

        let heap = game.current_state().heap_size();
        if heap == 0 {
            info!("Automated side took the last token");
            game.decide(Outcome::PlayerWon);
        } else if !game.legal_moves().can_move(heap) {
            info!(heap, "Player has no legal move and loses");
            game.decide(Outcome::ComputerWon);
        }
    }
}
