//! Line-oriented terminal game against a local engine or a remote server.

use anyhow::{Context, Result};
use std::sync::Arc;
use strictly_nim::{GameId, NewGame, NimError, Outcome, TurnEngine};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument};

use crate::{ClientError, ErrorBody, GameView, NewGameRequest, NimClient, status_for};

/// Where the game is played.
#[derive(Debug, Clone)]
pub enum Table {
    /// In-process engine.
    Local {
        /// Engine to play on.
        engine: Arc<TurnEngine>,
        /// Parameters for fields the request leaves out.
        defaults: NewGame,
    },
    /// Game server reached over HTTP.
    Remote(NimClient),
}

impl Table {
    /// Creates a game.
    #[instrument(skip(self))]
    pub async fn new_game(&self, request: NewGameRequest) -> Result<GameView, ClientError> {
        match self {
            Self::Local { engine, defaults } => engine
                .create_game(request.resolve(defaults))
                .map(|game| GameView::from(&game))
                .map_err(local_error),
            Self::Remote(client) => client.new_game(&request).await,
        }
    }

    /// Makes a move.
    #[instrument(skip(self))]
    pub async fn make_move(&self, id: GameId, n_matches: i64) -> Result<GameView, ClientError> {
        match self {
            Self::Local { engine, .. } => engine
                .apply_player_move(id, n_matches)
                .map(|game| GameView::from(&game))
                .map_err(local_error),
            Self::Remote(client) => client.make_move(id, n_matches).await,
        }
    }
}

/// Reports an engine error the same way the server would.
fn local_error(err: NimError) -> ClientError {
    ClientError::Api {
        status: status_for(&err).as_u16(),
        body: ErrorBody {
            error: err.kind().to_string(),
            message: err.to_string(),
        },
    }
}

/// Plays one game, reading moves from `input` and writing prompts to `output`.
///
/// Returns the outcome, which stays [`Outcome::Undecided`] if the player quits
/// with `q` or closes the input.
///
/// # Errors
///
/// Fails if the game cannot be created, the transport fails, or the
/// terminal cannot be read or written.
#[instrument(skip(table, input, output))]
pub async fn play<R, W>(
    table: &Table,
    request: NewGameRequest,
    input: &mut R,
    output: &mut W,
) -> Result<Outcome>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut game = table
        .new_game(request)
        .await
        .context("Failed to create game")?;
    info!(game_id = %game.id, "Game started");
    write_line(
        output,
        &format!(
            "New game against {}. Allowed moves: {}. Whoever takes the last match loses.",
            game.computer_player_strategy,
            join(&game.allowed_moves)
        ),
    )
    .await?;

    let mut line = String::new();
    while !game.is_finished() {
        write_line(
            output,
            &format!("{} matches left. Your move (q to quit):", game.current_state.num_matches),
        )
        .await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            debug!("Input closed");
            return Ok(Outcome::Undecided);
        }
        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            write_line(output, "Bye.").await?;
            return Ok(Outcome::Undecided);
        }
        let Ok(n_matches) = answer.parse::<i64>() else {
            write_line(output, &format!("'{}' is not a number.", answer)).await?;
            continue;
        };

        let before = game.current_state.num_matches;
        match table.make_move(game.id, n_matches).await {
            Ok(next) => {
                if let Some(reply) = computer_reply(before, n_matches, &next) {
                    write_line(output, &format!("Computer takes {}.", reply)).await?;
                }
                game = next;
            }
            Err(err) if err.is_rejection() => {
                write_line(output, &format!("Rejected: {}", err)).await?;
            }
            Err(err) => return Err(err).context("Move failed"),
        }
    }

    let message = match game.winner {
        Outcome::PlayerWon => "You win!",
        Outcome::ComputerWon => "Computer wins.",
        Outcome::Undecided => "Game over.",
    };
    write_line(output, message).await?;
    info!(outcome = %game.winner, "Game over");
    Ok(game.winner)
}

/// Tokens the automated side took in the round that produced `next`.
fn computer_reply(before: u32, taken: i64, next: &GameView) -> Option<i64> {
    let after_player = i64::from(before) - taken;
    let after_reply = i64::from(next.current_state.num_matches);
    (next.current_state.players_turn && after_player > after_reply)
        .then_some(after_player - after_reply)
}

fn join(moves: &[u32]) -> String {
    moves
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
