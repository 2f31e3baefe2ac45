//! Strictly Nim - misère Nim against an automated opponent
//!
//! A single heap of tokens, a fixed set of legal removal counts, and the rule
//! that whoever takes the last token loses. The human always moves first; each
//! accepted move is answered by the automated side in the same call.
//!
//! # Architecture
//!
//! - **Engine**: [`TurnEngine`] validates moves, runs the round and persists it
//! - **Strategies**: [`RandomStrategy`] and [`DpStrategy`], resolved by [`StrategyProvider`]
//! - **Store**: [`GameStore`] contract with the in-process [`MemoryStore`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use strictly_nim::{MemoryStore, NewGame, StrategyProvider, TurnEngine};
//!
//! # fn example() -> Result<(), strictly_nim::NimError> {
//! let engine = TurnEngine::new(Arc::new(MemoryStore::new()), StrategyProvider::new());
//! let game = engine.create_game(NewGame::default())?;
//! let game = engine.apply_player_move(game.id(), 1)?;
//! assert!(game.current_state().heap_size() < 12);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod engine;
mod error;
mod store;
mod strategy;
mod types;

// Crate-level exports - Engine
pub use engine::{NewGame, TurnEngine};

// Crate-level exports - Errors
pub use error::{IllegalMoveReason, NimError, StoreError};

// Crate-level exports - Persistence
pub use store::{GameStore, MemoryStore};

// Crate-level exports - Strategies
pub use strategy::{DpStrategy, RandomStrategy, Solution, SolutionCache, Strategy, StrategyProvider};

// Crate-level exports - Domain types
pub use types::{Game, GameId, LegalMoves, Outcome, State, StateId, StrategyKind};
