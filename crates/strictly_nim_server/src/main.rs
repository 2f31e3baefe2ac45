//! Strictly Nim - Unified CLI
//!
//! Game server, terminal client and policy inspection in one binary.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use strictly_nim::{GameStore, LegalMoves, MemoryStore, Solution, TurnEngine};
use strictly_nim_server::{
    AppState, NewGameRequest, NimClient, ServerConfig, SqliteStore, Table, play, router,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            host,
            db_path,
        } => {
            init_tracing("info,strictly_nim=debug,strictly_nim_server=debug");
            let mut config = ServerConfig::load(cli.config.as_deref())?;
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(db_path) = db_path {
                config = config.with_database_path(db_path);
            }
            run_server(config).await
        }
        Command::Play {
            server_url,
            matches,
            moves,
            strategy,
        } => {
            init_tracing("warn");
            let config = ServerConfig::load(cli.config.as_deref())?;
            let request = NewGameRequest {
                matches,
                allowed_moves: moves,
                computer_strategy: strategy,
            };
            run_play(config, server_url, request).await
        }
        Command::Solve { matches, moves } => {
            init_tracing("warn");
            run_solve(matches, &moves)
        }
    }
}

/// Initializes logging to stderr, honouring `RUST_LOG` when set.
fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the HTTP game server
#[instrument(skip_all, fields(address = %config.bind_address()))]
async fn run_server(config: ServerConfig) -> Result<()> {
    info!("Starting Strictly Nim server");

    let store: Arc<dyn GameStore> = match config.database_path() {
        Some(path) => Arc::new(SqliteStore::open(path.clone())?),
        None => {
            warn!("No database path configured, games are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };
    let engine = Arc::new(config.engine(store));
    let app = router(AppState::new(engine, config.new_game_defaults()));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("Server ready at http://{}/", config.bind_address());

    axum::serve(listener, app).await?;
    info!("Server stopped");
    Ok(())
}

/// Run the terminal client
#[instrument(skip(config, request))]
async fn run_play(
    config: ServerConfig,
    server_url: Option<String>,
    request: NewGameRequest,
) -> Result<()> {
    let table = match server_url {
        Some(url) => {
            let client = NimClient::new(&url);
            if !client.health().await {
                anyhow::bail!("Game server at {} is not reachable", url);
            }
            Table::Remote(client)
        }
        None => Table::Local {
            engine: Arc::new(config.engine(Arc::new(MemoryStore::new()))),
            defaults: config.new_game_defaults(),
        },
    };

    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    play(&table, request, &mut stdin, &mut stdout).await?;
    Ok(())
}

/// Print the DP policy table
#[instrument]
fn run_solve(matches: u32, moves: &str) -> Result<()> {
    if matches > TurnEngine::DEFAULT_MAX_HEAP_SIZE {
        anyhow::bail!("matches must be at most {}", TurnEngine::DEFAULT_MAX_HEAP_SIZE);
    }
    let legal_moves: LegalMoves = moves.parse()?;
    let solution = Solution::solve(matches, &legal_moves);

    println!("moves: {}", legal_moves);
    println!("{:>8} {:>6} {:>14} {:>14}", "matches", "take", "computer_win", "player_win");
    for heap in 1..=matches {
        let take = solution
            .best_move(heap)
            .map_or_else(|| "-".to_string(), |m| m.to_string());
        println!(
            "{:>8} {:>6} {:>14.6} {:>14.6}",
            heap,
            take,
            solution.computer_win(heap).unwrap_or_default(),
            solution.player_win(heap).unwrap_or_default()
        );
    }
    Ok(())
}
