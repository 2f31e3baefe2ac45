//! Uniformly random opponent.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument};

use crate::Game;

/// Picks uniformly among the legal moves that fit the heap.
#[derive(Debug, Default)]
pub struct RandomStrategy {
    rng: Option<Mutex<SmallRng>>,
}

impl RandomStrategy {
    /// Draws from the thread-local generator.
    pub fn new() -> Self {
        Self { rng: None }
    }

    /// Draws from a seeded generator, for reproducible games.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Some(Mutex::new(SmallRng::seed_from_u64(seed))),
        }
    }

    /// Returns a random fitting move, or `None` if no legal move fits.
    #[instrument(skip(self, game), fields(game_id = %game.id(), heap = game.current_state().heap_size()))]
    pub fn calculate_move(&self, game: &Game) -> Option<u32> {
        let options: Vec<u32> = game
            .legal_moves()
            .fitting(game.current_state().heap_size())
            .collect();

        let choice = match &self.rng {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
                options.choose(&mut *rng).copied()
            }
            None => options.choose(&mut rand::rng()).copied(),
        };

        debug!(?options, ?choice, "Random move chosen");
        choice
    }
}
