//! Process-wide cache of solved DP tables, keyed by game.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument};

use super::dp::Solution;
use crate::{GameId, LegalMoves};

#[derive(Debug)]
struct CacheEntry {
    solution: Arc<Solution>,
    last_used: AtomicU64,
}

/// Solutions for live games.
///
/// A key is solved at most once: the solve runs while the map entry is
/// locked, so concurrent first requests for the same game wait for it instead
/// of building a second table. Entries leave the cache when their game ends or
/// is removed, or when the capacity bound evicts the least recently used one.
#[derive(Debug)]
pub struct SolutionCache {
    entries: DashMap<GameId, CacheEntry>,
    capacity: usize,
    clock: AtomicU64,
}

impl SolutionCache {
    /// Capacity used when none is configured.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Creates an empty cache bounded to `capacity` entries (at least one).
    #[instrument]
    pub fn new(capacity: usize) -> Self {
        info!(capacity, "Creating solution cache");
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Returns the game's solution, solving it on first use.
    ///
    /// A cached table smaller than `heap_size` is rebuilt; within one game the
    /// heap only shrinks, so that only happens if an id is reused.
    #[instrument(skip(self, legal_moves), fields(moves = %legal_moves))]
    pub fn get_or_solve(
        &self,
        game_id: GameId,
        heap_size: u32,
        legal_moves: &LegalMoves,
    ) -> Arc<Solution> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        let solution = {
            let mut entry = self.entries.entry(game_id).or_insert_with(|| {
                debug!("Cache miss, solving");
                CacheEntry {
                    solution: Arc::new(Solution::solve(heap_size, legal_moves)),
                    last_used: AtomicU64::new(tick),
                }
            });
            if entry.solution.size() < heap_size {
                debug!(cached = entry.solution.size(), "Cached table too small, re-solving");
                entry.solution = Arc::new(Solution::solve(heap_size, legal_moves));
            }
            entry.last_used.store(tick, Ordering::Relaxed);
            Arc::clone(&entry.solution)
        };

        self.enforce_capacity(game_id);
        solution
    }

    /// Removes a game's entry. Returns whether one was present.
    #[instrument(skip(self))]
    pub fn evict(&self, game_id: GameId) -> bool {
        let removed = self.entries.remove(&game_id).is_some();
        if removed {
            debug!("Evicted cached solution");
        }
        removed
    }

    /// Whether the game has a cached solution.
    pub fn contains(&self, game_id: GameId) -> bool {
        self.entries.contains_key(&game_id)
    }

    /// Number of cached games.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of cached games.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn enforce_capacity(&self, keep: GameId) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|entry| *entry.key() != keep)
                .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
                .map(|entry| *entry.key());

            match oldest {
                Some(game_id) => {
                    debug!(%game_id, "Capacity reached, evicting least recently used");
                    self.entries.remove(&game_id);
                }
                None => break,
            }
        }
    }
}

impl Default for SolutionCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
