//! Core domain types for misère Nim.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use strum::{EnumIter, EnumString};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{NimError, StoreError};

/// Unique identifier of a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct GameId(Uuid);

impl GameId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for GameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier of a state snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct StateId(Uuid);

impl StateId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StateId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for StateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Policy used by the automated opponent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum StrategyKind {
    /// Uniformly random among the legal moves.
    #[serde(rename = "RANDOM")]
    #[strum(serialize = "RANDOM")]
    #[display("RANDOM")]
    Random,
    /// Best response to a uniformly random opponent.
    #[default]
    #[serde(rename = "DP")]
    #[strum(serialize = "DP")]
    #[display("DP")]
    Dp,
}

/// Result of a game.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
pub enum Outcome {
    /// Game is ongoing.
    #[default]
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    #[display("none")]
    Undecided,
    /// The human player won.
    #[serde(rename = "Player")]
    #[strum(serialize = "Player")]
    #[display("Player")]
    PlayerWon,
    /// The automated opponent won.
    #[serde(rename = "Computer")]
    #[strum(serialize = "Computer")]
    #[display("Computer")]
    ComputerWon,
}

impl Outcome {
    /// Returns true once a winner has been assigned.
    pub fn is_decided(self) -> bool {
        self != Self::Undecided
    }
}

/// The token counts a move may remove.
///
/// Always non-empty, strictly positive, de-duplicated and sorted ascending.
/// Ascending order is also the enumeration order used for tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct LegalMoves(Vec<u32>);

impl LegalMoves {
    const FIELD: &'static str = "legal_moves";

    /// Builds a legal-move set from positive counts.
    ///
    /// # Errors
    ///
    /// Returns [`NimError::InvalidConfiguration`] if the set is empty or contains zero.
    pub fn new(moves: impl IntoIterator<Item = u32>) -> Result<Self, NimError> {
        let moves: BTreeSet<u32> = moves.into_iter().collect();
        if moves.is_empty() {
            return Err(NimError::invalid_configuration(
                Self::FIELD,
                "at least one legal move is required",
            ));
        }
        if moves.contains(&0) {
            return Err(NimError::invalid_configuration(
                Self::FIELD,
                "legal moves must remove at least one token",
            ));
        }
        Ok(Self(moves.into_iter().collect()))
    }

    /// Validates counts as received from a caller, which may be negative.
    ///
    /// # Errors
    ///
    /// Returns [`NimError::InvalidConfiguration`] for negative, zero, oversized or empty input.
    #[instrument]
    pub fn from_requested(moves: &[i64]) -> Result<Self, NimError> {
        let converted = moves
            .iter()
            .map(|&m| {
                u32::try_from(m).map_err(|_| {
                    warn!(value = m, "Rejecting legal move outside u32 range");
                    NimError::invalid_configuration(
                        Self::FIELD,
                        format!("{} is not a valid token count", m),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(converted)
    }

    /// Returns the moves in ascending order.
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Checks membership.
    pub fn contains(&self, count: u32) -> bool {
        self.0.binary_search(&count).is_ok()
    }

    /// Moves that fit a heap of `heap_size` tokens, ascending.
    pub fn fitting(&self, heap_size: u32) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied().take_while(move |&m| m <= heap_size)
    }

    /// Whether any move fits a heap of `heap_size` tokens.
    pub fn can_move(&self, heap_size: u32) -> bool {
        self.smallest() <= heap_size
    }

    /// The smallest legal move.
    pub fn smallest(&self) -> u32 {
        self.0[0]
    }
}

impl Default for LegalMoves {
    fn default() -> Self {
        Self(vec![1, 2, 3])
    }
}

impl TryFrom<Vec<u32>> for LegalMoves {
    type Error = NimError;

    fn try_from(moves: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(moves)
    }
}

impl From<LegalMoves> for Vec<u32> {
    fn from(moves: LegalMoves) -> Self {
        moves.0
    }
}

impl fmt::Display for LegalMoves {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for m in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", m)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for LegalMoves {
    type Err = NimError;

    /// Parses the comma separated form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let moves = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>().map_err(|e| {
                    NimError::invalid_configuration(
                        Self::FIELD,
                        format!("'{}' is not a token count: {}", part, e),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(moves)
    }
}

/// Immutable snapshot of a game after some number of half-moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    id: StateId,
    game_id: GameId,
    heap_size: u32,
    turn: u32,
    players_turn: bool,
}

impl State {
    /// Creates a snapshot.
    pub fn new(id: StateId, game_id: GameId, heap_size: u32, turn: u32, players_turn: bool) -> Self {
        Self {
            id,
            game_id,
            heap_size,
            turn,
            players_turn,
        }
    }

    /// The opening snapshot of a game: player to move, turn zero.
    pub fn initial(id: StateId, game_id: GameId, heap_size: u32) -> Self {
        Self::new(id, game_id, heap_size, 0, true)
    }

    /// The snapshot after the side to move removes `taken` tokens.
    ///
    /// Callers must have checked `taken <= heap_size`.
    pub fn successor(&self, id: StateId, taken: u32) -> Self {
        Self {
            id,
            game_id: self.game_id,
            heap_size: self.heap_size - taken,
            turn: self.turn + 1,
            players_turn: !self.players_turn,
        }
    }

    /// Snapshot identifier.
    pub fn id(&self) -> StateId {
        self.id
    }

    /// Owning game.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Tokens remaining.
    pub fn heap_size(&self) -> u32 {
        self.heap_size
    }

    /// Half-moves played so far.
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Whether the human player moves next.
    pub fn players_turn(&self) -> bool {
        self.players_turn
    }
}

/// A game of Nim: fixed rules plus an append-only chain of snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    id: GameId,
    legal_moves: LegalMoves,
    strategy: StrategyKind,
    outcome: Outcome,
    current_state: State,
    history: Vec<State>,
}

impl Game {
    /// Starts a game from its opening snapshot.
    pub fn start(
        id: GameId,
        legal_moves: LegalMoves,
        strategy: StrategyKind,
        initial: State,
    ) -> Self {
        Self {
            id,
            legal_moves,
            strategy,
            outcome: Outcome::Undecided,
            current_state: initial.clone(),
            history: vec![initial],
        }
    }

    /// Reassembles a persisted game.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the history is empty, belongs to another game,
    /// or breaks the turn/heap invariants.
    #[instrument(skip(legal_moves, history), fields(game_id = %id, states = history.len()))]
    pub fn restore(
        id: GameId,
        legal_moves: LegalMoves,
        strategy: StrategyKind,
        outcome: Outcome,
        history: Vec<State>,
    ) -> Result<Self, StoreError> {
        let Some(current_state) = history.last().cloned() else {
            return Err(StoreError::new(format!("Game {} has no states", id)));
        };

        for (index, state) in history.iter().enumerate() {
            if state.game_id != id {
                return Err(StoreError::new(format!(
                    "State {} belongs to game {}, not {}",
                    state.id, state.game_id, id
                )));
            }
            if state.turn as usize != index {
                return Err(StoreError::new(format!(
                    "State {} has turn {} at position {}",
                    state.id, state.turn, index
                )));
            }
        }
        if history
            .windows(2)
            .any(|pair| pair[1].heap_size > pair[0].heap_size)
        {
            return Err(StoreError::new(format!("Heap of game {} grows", id)));
        }

        Ok(Self {
            id,
            legal_moves,
            strategy,
            outcome,
            current_state,
            history,
        })
    }

    /// Game identifier.
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Token counts a move may remove.
    pub fn legal_moves(&self) -> &LegalMoves {
        &self.legal_moves
    }

    /// Opponent policy.
    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// Current result.
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Most recent snapshot.
    pub fn current_state(&self) -> &State {
        &self.current_state
    }

    /// All snapshots, oldest first.
    pub fn history(&self) -> &[State] {
        &self.history
    }

    /// Whether no further moves are accepted.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_decided() || self.current_state.heap_size == 0
    }

    /// Appends a snapshot and installs it as current.
    pub(crate) fn push_state(&mut self, state: State) {
        self.history.push(state.clone());
        self.current_state = state;
    }

    /// Assigns the winner. The outcome is write-once.
    pub(crate) fn decide(&mut self, outcome: Outcome) {
        if self.outcome.is_decided() {
            warn!(game_id = %self.id, current = %self.outcome, attempted = %outcome, "Outcome already decided");
            return;
        }
        self.outcome = outcome;
    }
}
