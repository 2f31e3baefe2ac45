//! Best-response policy against a uniformly random opponent.
//!
//! The automated side plays to maximize its own win probability while the
//! human is modeled as picking each legal move with equal probability. This is
//! deliberately not minimax: against a non-optimal human it wins more often
//! than the parity rule of perfect Nim play.
//!
//! Two coupled tables are filled bottom-up. For `i` tokens left:
//!
//! - `computer_win[i] = max over m of (m == i ? 0 : 1 - player_win[i - m])`
//! - `player_win[i]   = mean over m of (m == i ? 0 : 1 - computer_win[i - m])`
//!
//! where `m` ranges over the legal moves not larger than `i`. Both only look at
//! strictly smaller heaps, so one ascending pass suffices.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::cache::SolutionCache;
use crate::{Game, GameId, LegalMoves};

/// Solved policy tables for heaps `0..=size`.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    computer_win: Vec<f64>,
    player_win: Vec<f64>,
    best_move: Vec<Option<u32>>,
}

impl Solution {
    /// Solves the recurrence for every heap up to `heap_size`.
    ///
    /// Ties are broken towards the smallest move. A heap on which no legal
    /// move fits is a loss for the side to move, and has no best move.
    #[instrument(skip(legal_moves), fields(moves = %legal_moves))]
    pub fn solve(heap_size: u32, legal_moves: &LegalMoves) -> Self {
        let n = heap_size as usize;
        let mut computer_win = vec![0.0; n + 1];
        let mut player_win = vec![0.0; n + 1];
        let mut best_move = vec![None; n + 1];

        for i in 1..=n {
            let heap = i as u32;
            let mut best: Option<(u32, f64)> = None;
            let mut player_total = 0.0;
            let mut options = 0_u32;

            for m in legal_moves.fitting(heap) {
                // Taking the last token loses for whoever takes it
                let (mover_value, player_value) = if m == heap {
                    (0.0, 0.0)
                } else {
                    let rest = (heap - m) as usize;
                    (1.0 - player_win[rest], 1.0 - computer_win[rest])
                };

                if best.is_none_or(|(_, value)| mover_value > value) {
                    best = Some((m, mover_value));
                }
                player_total += player_value;
                options += 1;
            }

            if let Some((m, value)) = best {
                computer_win[i] = value;
                best_move[i] = Some(m);
                player_win[i] = player_total / f64::from(options);
            }
        }

        debug!(
            heap_size,
            opening_move = ?best_move[n],
            opening_win = computer_win[n],
            "Solved policy tables"
        );

        Self {
            computer_win,
            player_win,
            best_move,
        }
    }

    /// Largest heap covered by the tables.
    pub fn size(&self) -> u32 {
        (self.best_move.len() - 1) as u32
    }

    /// Move the automated side makes with `heap_size` tokens left.
    pub fn best_move(&self, heap_size: u32) -> Option<u32> {
        self.best_move.get(heap_size as usize).copied().flatten()
    }

    /// Automated side's win probability on its own turn.
    pub fn computer_win(&self, heap_size: u32) -> Option<f64> {
        self.computer_win.get(heap_size as usize).copied()
    }

    /// Random opponent's win probability on its own turn.
    pub fn player_win(&self, heap_size: u32) -> Option<f64> {
        self.player_win.get(heap_size as usize).copied()
    }
}

/// Strategy that answers from a per-game [`Solution`].
///
/// One instance is shared by every DP game; the solution for a game is built
/// on its first automated turn and reused until the game ends.
#[derive(Debug)]
pub struct DpStrategy {
    cache: SolutionCache,
}

impl DpStrategy {
    /// Creates a strategy whose cache holds at most `capacity` games.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: SolutionCache::new(capacity),
        }
    }

    /// The per-game solution cache.
    pub fn cache(&self) -> &SolutionCache {
        &self.cache
    }

    /// Returns the best move for the current heap, or `None` if no legal move fits.
    #[instrument(skip(self, game), fields(game_id = %game.id(), heap = game.current_state().heap_size()))]
    pub fn calculate_move(&self, game: &Game) -> Option<u32> {
        let heap = game.current_state().heap_size();
        if heap == 0 {
            return None;
        }
        let solution: Arc<Solution> = self.cache.get_or_solve(game.id(), heap, game.legal_moves());
        let choice = solution.best_move(heap);
        debug!(?choice, win = ?solution.computer_win(heap), "DP move chosen");
        choice
    }

    /// Drops the cached solution of a finished or removed game.
    pub fn release(&self, game_id: GameId) {
        self.cache.evict(game_id);
    }
}

impl Default for DpStrategy {
    fn default() -> Self {
        Self::new(SolutionCache::DEFAULT_CAPACITY)
    }
}
