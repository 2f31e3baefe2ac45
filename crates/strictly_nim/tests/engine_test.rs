//! Tests for game creation and the turn protocol.

use std::sync::Arc;
use std::thread;

use strictly_nim::{
    DpStrategy, Game, GameId, IllegalMoveReason, MemoryStore, NewGame, NimError, Outcome,
    RandomStrategy, StrategyKind, StrategyProvider, TurnEngine,
};

fn engine() -> TurnEngine {
    TurnEngine::new(
        Arc::new(MemoryStore::new()),
        StrategyProvider::with_strategies(RandomStrategy::seeded(7), DpStrategy::new(16)),
    )
}

fn new_game(heap_size: i64, legal_moves: &[i64], strategy: &str) -> NewGame {
    NewGame {
        heap_size,
        legal_moves: legal_moves.to_vec(),
        strategy: strategy.to_string(),
    }
}

fn assert_invalid(result: Result<Game, NimError>, expected_field: &str) {
    match result {
        Err(NimError::InvalidConfiguration { field, .. }) => assert_eq!(field, expected_field),
        other => panic!("Expected InvalidConfiguration({}), got {:?}", expected_field, other),
    }
}

fn assert_illegal(result: Result<Game, NimError>, expected: IllegalMoveReason) {
    match result {
        Err(NimError::IllegalMove { reason, .. }) => assert_eq!(reason, expected),
        other => panic!("Expected IllegalMove({}), got {:?}", expected, other),
    }
}

#[test]
fn test_create_game_opening_state() {
    let engine = engine();
    let game = engine
        .create_game(new_game(13, &[3, 1, 2, 1], "RANDOM"))
        .expect("Create failed");

    assert_eq!(game.legal_moves().as_slice(), &[1, 2, 3]);
    assert_eq!(game.strategy(), StrategyKind::Random);
    assert_eq!(game.outcome(), Outcome::Undecided);
    assert_eq!(game.history().len(), 1);

    let state = game.current_state();
    assert_eq!(state.heap_size(), 13);
    assert_eq!(state.turn(), 0);
    assert!(state.players_turn());
    assert_eq!(state.game_id(), game.id());

    let loaded = engine.get_game(game.id()).expect("Get failed");
    assert_eq!(loaded, game);
}

#[test]
fn test_create_game_defaults() {
    let engine = engine();
    let game = engine.create_game(NewGame::default()).expect("Create failed");
    assert_eq!(game.current_state().heap_size(), 13);
    assert_eq!(game.legal_moves().as_slice(), &[1, 2, 3]);
    assert_eq!(game.strategy(), StrategyKind::Dp);
}

#[test]
fn test_create_game_rejects_unknown_strategy() {
    let engine = engine();
    assert_invalid(engine.create_game(new_game(10, &[1], "MINIMAX")), "strategy");
    assert_invalid(engine.create_game(new_game(10, &[1], "dp")), "strategy");
}

#[test]
fn test_create_game_rejects_negative_heap() {
    let engine = engine();
    assert_invalid(engine.create_game(new_game(-1, &[1], "DP")), "heap_size");
}

#[test]
fn test_create_game_rejects_heap_above_limit() {
    let engine = engine();
    assert_eq!(engine.max_heap_size(), TurnEngine::DEFAULT_MAX_HEAP_SIZE);
    assert_invalid(
        engine.create_game(new_game(u32::MAX as i64, &[1, 2, 3], "DP")),
        "heap_size",
    );
    assert_invalid(
        engine.create_game(new_game(
            TurnEngine::DEFAULT_MAX_HEAP_SIZE as i64 + 1,
            &[1],
            "RANDOM",
        )),
        "heap_size",
    );
    assert!(
        engine
            .create_game(new_game(TurnEngine::DEFAULT_MAX_HEAP_SIZE as i64, &[1], "RANDOM"))
            .is_ok()
    );
}

#[test]
fn test_configured_heap_limit() {
    let engine = engine().with_max_heap_size(50);
    assert_invalid(engine.create_game(new_game(51, &[1, 2, 3], "DP")), "heap_size");

    let game = engine
        .create_game(new_game(50, &[1, 2, 3], "DP"))
        .expect("Create failed");
    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    assert_eq!(game.history().len(), 3);
}

#[test]
fn test_create_game_rejects_bad_legal_moves() {
    let engine = engine();
    assert_invalid(engine.create_game(new_game(10, &[], "DP")), "legal_moves");
    assert_invalid(engine.create_game(new_game(10, &[0, 1], "DP")), "legal_moves");
    assert_invalid(engine.create_game(new_game(10, &[-2, 1], "DP")), "legal_moves");
}

#[test]
fn test_create_game_rejects_moves_larger_than_heap() {
    let engine = engine();
    assert_invalid(engine.create_game(new_game(3, &[5], "DP")), "legal_moves");
}

#[test]
fn test_create_game_checks_strategy_first() {
    let engine = engine();
    assert_invalid(engine.create_game(new_game(-5, &[], "NOPE")), "strategy");
    assert_invalid(engine.create_game(new_game(-5, &[], "DP")), "heap_size");
}

#[test]
fn test_empty_heap_game_is_finished_at_creation() {
    let engine = engine();
    let game = engine
        .create_game(new_game(0, &[1], "RANDOM"))
        .expect("Create failed");
    assert!(game.is_finished());
    assert_illegal(
        engine.apply_player_move(game.id(), 1),
        IllegalMoveReason::GameFinished,
    );
}

#[test]
fn test_single_move_round_removes_two_tokens() {
    for strategy in ["RANDOM", "DP"] {
        let engine = engine();
        let game = engine
            .create_game(new_game(10, &[1], strategy))
            .expect("Create failed");

        let game = engine.apply_player_move(game.id(), 1).expect("Move failed");

        assert_eq!(game.current_state().heap_size(), 8);
        assert_eq!(game.outcome(), Outcome::Undecided);
        assert_eq!(game.current_state().turn(), 2);
        assert!(game.current_state().players_turn());
        let heaps: Vec<u32> = game.history().iter().map(|s| s.heap_size()).collect();
        assert_eq!(heaps, vec![10, 9, 8]);
    }
}

#[test]
fn test_player_taking_last_token_loses() {
    let engine = engine();
    let game = engine
        .create_game(new_game(1, &[1], "DP"))
        .expect("Create failed");

    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");

    assert_eq!(game.outcome(), Outcome::ComputerWon);
    assert_eq!(game.current_state().heap_size(), 0);
    assert_eq!(game.history().len(), 2);
    assert!(!game.current_state().players_turn());
}

#[test]
fn test_automated_side_forced_to_take_last_token() {
    for strategy in ["RANDOM", "DP"] {
        let engine = engine();
        let game = engine
            .create_game(new_game(2, &[1], strategy))
            .expect("Create failed");

        let game = engine.apply_player_move(game.id(), 1).expect("Move failed");

        assert_eq!(game.outcome(), Outcome::PlayerWon);
        assert_eq!(game.current_state().heap_size(), 0);
        assert_eq!(game.history().len(), 3);
    }
}

#[test]
fn test_dp_reply_from_four_tokens_takes_three() {
    let engine = engine();
    let game = engine
        .create_game(new_game(5, &[1, 2, 3], "DP"))
        .expect("Create failed");

    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");

    assert_eq!(game.history()[1].heap_size(), 4);
    assert_eq!(game.current_state().heap_size(), 1);
    assert_eq!(game.outcome(), Outcome::Undecided);

    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    assert_eq!(game.outcome(), Outcome::ComputerWon);
}

#[test]
fn test_move_not_in_legal_set() {
    let engine = engine();
    let game = engine
        .create_game(new_game(10, &[1, 3], "DP"))
        .expect("Create failed");

    assert_illegal(
        engine.apply_player_move(game.id(), 2),
        IllegalMoveReason::MoveNotAllowed,
    );
    assert_illegal(
        engine.apply_player_move(game.id(), 0),
        IllegalMoveReason::MoveNotAllowed,
    );
    assert_illegal(
        engine.apply_player_move(game.id(), -1),
        IllegalMoveReason::MoveNotAllowed,
    );
    assert_illegal(
        engine.apply_player_move(game.id(), i64::MAX),
        IllegalMoveReason::MoveNotAllowed,
    );
}

#[test]
fn test_move_exceeding_heap() {
    let engine = engine();
    let game = engine
        .create_game(new_game(2, &[1, 3], "RANDOM"))
        .expect("Create failed");

    assert_illegal(
        engine.apply_player_move(game.id(), 3),
        IllegalMoveReason::InsufficientTokens,
    );
}

#[test]
fn test_rejected_move_leaves_game_unchanged() {
    let engine = engine();
    let game = engine
        .create_game(new_game(10, &[2, 3], "DP"))
        .expect("Create failed");

    let _ = engine.apply_player_move(game.id(), 1);
    let _ = engine.apply_player_move(game.id(), 11);

    let loaded = engine.get_game(game.id()).expect("Get failed");
    assert_eq!(loaded, game);
}

#[test]
fn test_move_on_unknown_game() {
    let engine = engine();
    let missing = GameId::new();
    match engine.apply_player_move(missing, 1) {
        Err(NimError::NotFound { id }) => assert_eq!(id, missing),
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert!(matches!(
        engine.get_game(missing),
        Err(NimError::NotFound { .. })
    ));
}

#[test]
fn test_finished_game_rejects_moves() {
    let engine = engine();
    let game = engine
        .create_game(new_game(1, &[1], "RANDOM"))
        .expect("Create failed");
    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    assert_eq!(game.outcome(), Outcome::ComputerWon);

    assert_illegal(
        engine.apply_player_move(game.id(), 1),
        IllegalMoveReason::GameFinished,
    );
    let loaded = engine.get_game(game.id()).expect("Get failed");
    assert_eq!(loaded.history().len(), 2);
}

#[test]
fn test_automated_side_without_legal_move_loses() {
    let engine = engine();
    let game = engine
        .create_game(new_game(3, &[2], "DP"))
        .expect("Create failed");

    let game = engine.apply_player_move(game.id(), 2).expect("Move failed");

    assert_eq!(game.current_state().heap_size(), 1);
    assert_eq!(game.outcome(), Outcome::PlayerWon);
    assert_eq!(game.history().len(), 2);
}

#[test]
fn test_player_without_legal_move_loses() {
    let engine = engine();
    let game = engine
        .create_game(new_game(5, &[2], "RANDOM"))
        .expect("Create failed");

    let game = engine.apply_player_move(game.id(), 2).expect("Move failed");

    assert_eq!(game.current_state().heap_size(), 1);
    assert!(game.current_state().players_turn());
    assert_eq!(game.outcome(), Outcome::ComputerWon);
}

#[test]
fn test_full_games_keep_history_consistent() {
    for strategy in ["RANDOM", "DP"] {
        let engine = engine();
        let mut game = engine
            .create_game(new_game(21, &[1, 2, 3], strategy))
            .expect("Create failed");

        while !game.is_finished() {
            let heap = game.current_state().heap_size();
            game = engine
                .apply_player_move(game.id(), i64::from(heap.min(1)))
                .expect("Move failed");
        }

        assert!(game.outcome().is_decided());
        for (index, pair) in game.history().windows(2).enumerate() {
            assert_eq!(pair[0].turn() as usize, index);
            assert_eq!(pair[1].turn(), pair[0].turn() + 1);
            assert_ne!(pair[1].players_turn(), pair[0].players_turn());
            let taken = pair[0].heap_size() - pair[1].heap_size();
            assert!(game.legal_moves().contains(taken));
        }
        assert_eq!(game.current_state(), game.history().last().expect("No history"));
    }
}

#[test]
fn test_finished_dp_game_releases_cached_solution() {
    let engine = engine();
    let game = engine
        .create_game(new_game(6, &[1], "DP"))
        .expect("Create failed");
    let cache = engine
        .strategies()
        .dp()
        .expect("No DP strategy")
        .cache();

    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    assert!(cache.contains(game.id()));

    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    assert_eq!(game.outcome(), Outcome::PlayerWon);
    assert!(!cache.contains(game.id()));
}

#[test]
fn test_remove_game() {
    let engine = engine();
    let game = engine
        .create_game(new_game(10, &[1, 2], "DP"))
        .expect("Create failed");
    engine.apply_player_move(game.id(), 1).expect("Move failed");
    let cache = engine
        .strategies()
        .dp()
        .expect("No DP strategy")
        .cache();
    assert!(cache.contains(game.id()));

    engine.remove_game(game.id()).expect("Remove failed");

    assert!(!cache.contains(game.id()));
    assert!(matches!(
        engine.get_game(game.id()),
        Err(NimError::NotFound { .. })
    ));
    assert!(matches!(
        engine.remove_game(game.id()),
        Err(NimError::NotFound { .. })
    ));
}

#[test]
fn test_no_lock_entries_outlive_calls() {
    let engine = engine();
    let game = engine
        .create_game(new_game(20, &[1, 2], "DP"))
        .expect("Create failed");

    // Abandoned mid-game
    let game = engine.apply_player_move(game.id(), 1).expect("Move failed");
    assert!(!game.is_finished());
    assert_eq!(engine.active_locks(), 0);

    assert!(engine.apply_player_move(game.id(), 5).is_err());
    assert!(engine.apply_player_move(GameId::new(), 1).is_err());
    assert!(engine.remove_game(GameId::new()).is_err());
    assert_eq!(engine.active_locks(), 0);
}

#[test]
fn test_concurrent_moves_on_one_game_are_serialized() {
    let engine = Arc::new(engine());
    let game = engine
        .create_game(new_game(100, &[1], "RANDOM"))
        .expect("Create failed");
    let id = game.id();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.apply_player_move(id, 1))
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked").expect("Move failed");
    }

    let game = engine.get_game(id).expect("Get failed");
    assert_eq!(game.current_state().heap_size(), 80);
    assert_eq!(game.history().len(), 21);
    for (index, state) in game.history().iter().enumerate() {
        assert_eq!(state.turn() as usize, index);
        assert_eq!(state.heap_size(), 100 - index as u32);
    }
    assert_eq!(engine.active_locks(), 0);
}

#[test]
fn test_concurrent_games_run_independently() {
    let engine = Arc::new(engine());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let strategy = if i % 2 == 0 { "DP" } else { "RANDOM" };
                let mut game = engine
                    .create_game(new_game(30, &[1, 2, 3], strategy))
                    .expect("Create failed");
                while !game.is_finished() {
                    game = engine
                        .apply_player_move(game.id(), 1)
                        .expect("Move failed");
                }
                game
            })
        })
        .collect();

    for handle in handles {
        let game = handle.join().expect("Thread panicked");
        assert!(game.outcome().is_decided());
        assert_eq!(
            engine.get_game(game.id()).expect("Get failed").outcome(),
            game.outcome()
        );
    }
}
