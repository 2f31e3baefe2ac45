//! REST API over the turn engine.

use axum::{
    Json, Router,
    body::Body,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strictly_nim::{
    Game, GameId, NewGame, NimError, Outcome, State as NimState, StrategyKind, TurnEngine,
};
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    engine: Arc<TurnEngine>,
    defaults: Arc<NewGame>,
}

impl AppState {
    /// Creates handler state; `defaults` fill fields a creation request omits.
    pub fn new(engine: Arc<TurnEngine>, defaults: NewGame) -> Self {
        Self {
            engine,
            defaults: Arc::new(defaults),
        }
    }

    /// The shared engine.
    pub fn engine(&self) -> &Arc<TurnEngine> {
        &self.engine
    }
}

/// Body of `POST /game/new`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameRequest {
    /// Opening heap size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<i64>,
    /// Legal removal counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_moves: Option<Vec<i64>>,
    /// Strategy identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer_strategy: Option<String>,
}

impl NewGameRequest {
    /// Fills omitted fields from `defaults`.
    pub fn resolve(self, defaults: &NewGame) -> NewGame {
        NewGame {
            heap_size: self.matches.unwrap_or(defaults.heap_size),
            legal_moves: self
                .allowed_moves
                .unwrap_or_else(|| defaults.legal_moves.clone()),
            strategy: self
                .computer_strategy
                .unwrap_or_else(|| defaults.strategy.clone()),
        }
    }
}

/// Body of `POST /game/makeMove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeMoveRequest {
    /// Game identifier.
    pub id: String,
    /// Tokens to take.
    pub n_matches: i64,
}

/// Query of `GET /game/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetGameQuery {
    /// Game identifier.
    pub id: String,
}

/// Wire form of a state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateView {
    /// Tokens remaining.
    pub num_matches: u32,
    /// Half-moves played so far.
    pub turn: u32,
    /// Whether the human moves next.
    pub players_turn: bool,
}

impl From<&NimState> for StateView {
    fn from(state: &NimState) -> Self {
        Self {
            num_matches: state.heap_size(),
            turn: state.turn(),
            players_turn: state.players_turn(),
        }
    }
}

/// Wire form of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    /// Game identifier.
    pub id: GameId,
    /// Legal removal counts, ascending.
    pub allowed_moves: Vec<u32>,
    /// Strategy of the automated side.
    pub computer_player_strategy: StrategyKind,
    /// `"none"` until decided, then the winning side.
    pub winner: Outcome,
    /// Latest snapshot.
    pub current_state: StateView,
    /// Every snapshot, oldest first.
    pub history: Vec<StateView>,
}

impl GameView {
    /// Whether the game accepts no further moves.
    pub fn is_finished(&self) -> bool {
        self.winner.is_decided() || self.current_state.num_matches == 0
    }
}

impl From<&Game> for GameView {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id(),
            allowed_moves: game.legal_moves().as_slice().to_vec(),
            computer_player_strategy: game.strategy(),
            winner: game.outcome(),
            current_state: StateView::from(game.current_state()),
            history: game.history().iter().map(StateView::from).collect(),
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error kind.
    pub error: String,
    /// Human readable message.
    pub message: String,
}

/// Failures returned by the handlers.
#[derive(Debug, Display, Error)]
pub enum ApiError {
    /// The engine rejected the request.
    #[display("{_0}")]
    Engine(NimError),
    /// A game identifier is not a UUID.
    #[display("Malformed game id '{value}'")]
    MalformedId {
        /// Text that failed to parse.
        value: String,
    },
    /// The request body, query or path could not be decoded.
    #[display("Invalid request: {message}")]
    InvalidRequest {
        /// Status chosen by the extractor.
        status: StatusCode,
        /// What was wrong with the input.
        message: String,
    },
    /// The blocking task running the engine failed.
    #[display("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl From<NimError> for ApiError {
    fn from(err: NimError) -> Self {
        Self::Engine(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Engine(err) => status_for(err),
            Self::MalformedId { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidRequest { status, .. } => *status,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response body for this error.
    pub fn body(&self) -> ErrorBody {
        let error = match self {
            Self::Engine(err) => err.kind(),
            Self::MalformedId { .. } => "MalformedId",
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::Internal { .. } => "Internal",
        };
        ErrorBody {
            error: error.to_string(),
            message: self.to_string(),
        }
    }
}

/// HTTP status for an engine error.
pub fn status_for(err: &NimError) -> StatusCode {
    match err {
        NimError::InvalidConfiguration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        NimError::UnknownStrategy { .. } => StatusCode::BAD_REQUEST,
        NimError::IllegalMove { .. } => StatusCode::FORBIDDEN,
        NimError::NotFound { .. } => StatusCode::NOT_FOUND,
        NimError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        } else {
            debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

fn parse_id(value: &str) -> Result<GameId, ApiError> {
    value.parse::<GameId>().map_err(|_| ApiError::MalformedId {
        value: value.to_string(),
    })
}

/// Runs a synchronous engine call off the async executor.
async fn run_engine<T, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, NimError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ApiError::Internal {
            message: e.to_string(),
        })?
        .map_err(ApiError::from)
}

fn log_request(req: Request<Body>) -> Request<Body> {
    info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
    req
}

/// Builds the API router.
#[instrument(skip_all)]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/game/new", post(new_game))
        .route("/game/makeMove", post(make_move))
        .route("/game/get", get(get_game))
        .route("/game/{id}", delete(delete_game))
        .layer(ServiceBuilder::new().map_request(log_request))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[instrument(skip(state))]
async fn new_game(
    State(state): State<AppState>,
    request: Result<Json<NewGameRequest>, JsonRejection>,
) -> Result<Json<GameView>, ApiError> {
    let Json(request) = request?;
    let request = request.resolve(&state.defaults);
    let engine = Arc::clone(&state.engine);
    let game = run_engine(move || engine.create_game(request)).await?;
    info!(game_id = %game.id(), "Game created via API");
    Ok(Json(GameView::from(&game)))
}

#[instrument(skip(state))]
async fn make_move(
    State(state): State<AppState>,
    request: Result<Json<MakeMoveRequest>, JsonRejection>,
) -> Result<Json<GameView>, ApiError> {
    let Json(request) = request?;
    let id = parse_id(&request.id)?;
    let engine = Arc::clone(&state.engine);
    let count = request.n_matches;
    let game = run_engine(move || engine.apply_player_move(id, count)).await?;
    Ok(Json(GameView::from(&game)))
}

#[instrument(skip(state))]
async fn get_game(
    State(state): State<AppState>,
    query: Result<Query<GetGameQuery>, QueryRejection>,
) -> Result<Json<GameView>, ApiError> {
    let Query(query) = query?;
    let id = parse_id(&query.id)?;
    let engine = Arc::clone(&state.engine);
    let game = run_engine(move || engine.get_game(id)).await?;
    Ok(Json(GameView::from(&game)))
}

#[instrument(skip(state))]
async fn delete_game(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let id = parse_id(&id)?;
    let engine = Arc::clone(&state.engine);
    run_engine(move || engine.remove_game(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
