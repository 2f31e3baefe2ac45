//! Automated opponent policies and their provider.

mod cache;
mod dp;
mod random;

pub use cache::SolutionCache;
pub use dp::{DpStrategy, Solution};
pub use random::RandomStrategy;

use std::str::FromStr;
use tracing::{debug, instrument, warn};

use crate::{Game, GameId, NimError, StrategyKind};

/// A policy for the automated side.
///
/// Contract: a returned count is in the game's legal-move set and does not
/// exceed the current heap. `None` means no legal move fits.
#[derive(Debug)]
pub enum Strategy {
    /// Uniformly random.
    Random(RandomStrategy),
    /// Best response to a random opponent.
    Dp(DpStrategy),
}

impl Strategy {
    /// The identifier this instance answers to.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Random(_) => StrategyKind::Random,
            Self::Dp(_) => StrategyKind::Dp,
        }
    }

    /// Chooses the automated move for the game's current state.
    pub fn calculate_move(&self, game: &Game) -> Option<u32> {
        match self {
            Self::Random(strategy) => strategy.calculate_move(game),
            Self::Dp(strategy) => strategy.calculate_move(game),
        }
    }

    /// Releases per-game state held by the strategy.
    pub fn release(&self, game_id: GameId) {
        match self {
            Self::Random(_) => {}
            Self::Dp(strategy) => strategy.release(game_id),
        }
    }
}

/// Resolves strategy identifiers to long-lived, shared instances.
#[derive(Debug)]
pub struct StrategyProvider {
    random: Strategy,
    dp: Strategy,
}

impl StrategyProvider {
    /// Creates a provider with default instances.
    #[instrument]
    pub fn new() -> Self {
        Self::with_strategies(RandomStrategy::new(), DpStrategy::default())
    }

    /// Creates a provider from explicit instances.
    pub fn with_strategies(random: RandomStrategy, dp: DpStrategy) -> Self {
        Self {
            random: Strategy::Random(random),
            dp: Strategy::Dp(dp),
        }
    }

    /// Parses an identifier without resolving it.
    pub fn kind_of(&self, id: &str) -> Option<StrategyKind> {
        StrategyKind::from_str(id).ok()
    }

    /// Whether `id` names a known strategy.
    pub fn is_valid(&self, id: &str) -> bool {
        self.kind_of(id).is_some()
    }

    /// Resolves an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`NimError::UnknownStrategy`] if `id` is not recognized.
    #[instrument(skip(self))]
    pub fn resolve(&self, id: &str) -> Result<&Strategy, NimError> {
        match self.kind_of(id) {
            Some(kind) => {
                debug!(%kind, "Resolved strategy");
                Ok(self.for_kind(kind))
            }
            None => {
                warn!(id, "Unknown strategy");
                Err(NimError::UnknownStrategy { id: id.to_string() })
            }
        }
    }

    /// The instance for an already validated kind.
    pub fn for_kind(&self, kind: StrategyKind) -> &Strategy {
        match kind {
            StrategyKind::Random => &self.random,
            StrategyKind::Dp => &self.dp,
        }
    }

    /// The shared DP instance.
    pub fn dp(&self) -> Option<&DpStrategy> {
        match &self.dp {
            Strategy::Dp(strategy) => Some(strategy),
            Strategy::Random(_) => None,
        }
    }

    /// Forwards end-of-game cleanup to every stateful strategy.
    pub fn release(&self, game_id: GameId) {
        self.random.release(game_id);
        self.dp.release(game_id);
    }
}

impl Default for StrategyProvider {
    fn default() -> Self {
        Self::new()
    }
}
