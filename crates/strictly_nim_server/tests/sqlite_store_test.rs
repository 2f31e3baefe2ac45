//! Tests for the SQLite game store.

use std::sync::Arc;

use strictly_nim::{
    Game, GameId, GameStore, LegalMoves, NewGame, Outcome, State, StateId, StrategyKind,
    StrategyProvider, TurnEngine,
};
use strictly_nim_server::{DbErrorKind, SqliteStore};
use tempfile::NamedTempFile;

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready store.
fn setup_test_db() -> (NamedTempFile, SqliteStore) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let store = SqliteStore::open(db_path).expect("Failed to open store");
    (db_file, store)
}

fn opening(heap_size: u32, moves: &[u32]) -> (Game, State) {
    let id = GameId::new();
    let initial = State::initial(StateId::new(), id, heap_size);
    let legal = LegalMoves::new(moves.iter().copied()).expect("Invalid moves");
    let game = Game::start(id, legal, StrategyKind::Random, initial.clone());
    (game, initial)
}

#[test]
fn test_open_is_idempotent() {
    let (db, _store) = setup_test_db();
    let path = db.path().to_str().expect("Invalid path").to_string();
    let reopened = SqliteStore::open(path.clone()).expect("Reopen failed");
    assert_eq!(reopened.db_path(), path);
}

#[test]
fn test_round_trip_new_game() {
    let (_db, store) = setup_test_db();
    let (game, initial) = opening(9, &[3, 1]);

    store.save_round(&game, &[initial]).expect("Save failed");

    let loaded = store
        .find_game(game.id())
        .expect("Find failed")
        .expect("Game missing");
    assert_eq!(loaded, game);
    assert_eq!(loaded.legal_moves().as_slice(), &[1, 3]);
}

#[test]
fn test_find_missing_game() {
    let (_db, store) = setup_test_db();
    assert!(
        store
            .find_game(GameId::new())
            .expect("Find failed")
            .is_none()
    );
}

#[test]
fn test_save_game_without_states_fails() {
    let (_db, store) = setup_test_db();
    let (game, _) = opening(9, &[1]);
    let err = store.save_game(&game).expect_err("Save should fail");
    assert!(err.message.starts_with("HistoryMismatch:"), "{}", err.message);
    assert!(err.file.ends_with("store.rs"));
    assert!(store.find_game(game.id()).expect("Find failed").is_none());
}

#[test]
fn test_open_unreachable_path_is_connection_error() {
    let err = SqliteStore::open("/nonexistent/dir/games.db").expect_err("Open should fail");
    assert_eq!(err.kind, DbErrorKind::Connection);
    assert!(err.to_string().starts_with("Connection error:"));
    assert!(err.source.file.ends_with("store.rs"));
}

#[test]
fn test_save_state_then_game() {
    let (_db, store) = setup_test_db();
    let (game, initial) = opening(4, &[1]);
    store.save_state(&initial).expect("State save failed");
    store.save_game(&game).expect("Game save failed");
    assert!(store.find_game(game.id()).expect("Find failed").is_some());
}

#[test]
fn test_duplicate_state_rolls_back_round() {
    let (_db, store) = setup_test_db();
    let (game, initial) = opening(9, &[1]);
    store.save_round(&game, &[initial.clone()]).expect("Save failed");

    // Re-inserting the opening snapshot must fail and leave the game as it was.
    assert!(store.save_round(&game, &[initial]).is_err());
    let loaded = store
        .find_game(game.id())
        .expect("Find failed")
        .expect("Game missing");
    assert_eq!(loaded.history().len(), 1);
}

#[test]
fn test_delete_game() {
    let (_db, store) = setup_test_db();
    let (game, initial) = opening(9, &[1]);
    store.save_round(&game, &[initial]).expect("Save failed");

    assert!(store.delete_game(game.id()).expect("Delete failed"));
    assert!(!store.delete_game(game.id()).expect("Delete failed"));
    assert!(store.find_game(game.id()).expect("Find failed").is_none());
}

#[test]
fn test_engine_plays_full_game_on_sqlite() {
    let (_db, store) = setup_test_db();
    let engine = TurnEngine::new(Arc::new(store.clone()), StrategyProvider::new());

    let mut game = engine
        .create_game(NewGame {
            heap_size: 15,
            legal_moves: vec![1, 2, 3],
            strategy: "DP".to_string(),
        })
        .expect("Create failed");
    while !game.is_finished() {
        game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    }

    let loaded = store
        .find_game(game.id())
        .expect("Find failed")
        .expect("Game missing");
    assert_eq!(loaded, game);
    assert_ne!(loaded.outcome(), Outcome::Undecided);
    for (index, state) in loaded.history().iter().enumerate() {
        assert_eq!(state.turn() as usize, index);
    }
}
