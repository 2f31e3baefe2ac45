//! Typed HTTP client for the REST API.

use derive_more::{Display, Error};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use strictly_nim::GameId;
use tracing::{debug, info, instrument};

use crate::{ErrorBody, GameView, MakeMoveRequest, NewGameRequest};

/// Client-side failure.
#[derive(Debug, Clone, Display, Error)]
pub enum ClientError {
    /// The server answered with an error body.
    #[display("{} ({}): {}", body.error, status, body.message)]
    Api {
        /// Response status.
        status: u16,
        /// Decoded error body.
        body: ErrorBody,
    },
    /// The request could not be sent or the response not decoded.
    #[display("Transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },
}

impl ClientError {
    /// Whether the server rejected the request as invalid for the game,
    /// as opposed to failing.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Api { status, .. } => (400..500).contains(status),
            Self::Transport { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }
}

/// HTTP client for a game server.
#[derive(Debug, Clone)]
pub struct NimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NimClient {
    /// Creates a client for the server at `base_url`.
    #[instrument(skip_all, fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        info!("Creating game client");
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the server answers its health check.
    #[instrument(skip(self))]
    pub async fn health(&self) -> bool {
        match self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Creates a game.
    #[instrument(skip(self))]
    pub async fn new_game(&self, request: &NewGameRequest) -> Result<GameView, ClientError> {
        let response = self
            .client
            .post(format!("{}/game/new", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Makes a move and returns the game after the automated reply.
    #[instrument(skip(self))]
    pub async fn make_move(&self, id: GameId, n_matches: i64) -> Result<GameView, ClientError> {
        let request = MakeMoveRequest {
            id: id.to_string(),
            n_matches,
        };
        let response = self
            .client
            .post(format!("{}/game/makeMove", self.base_url))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetches a game.
    #[instrument(skip(self))]
    pub async fn get_game(&self, id: GameId) -> Result<GameView, ClientError> {
        let response = self
            .client
            .get(format!("{}/game/get?id={}", self.base_url, id))
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Deletes a game.
    #[instrument(skip(self))]
    pub async fn delete_game(&self, id: GameId) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(format!("{}/game/{}", self.base_url, id))
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        Err(Self::error_from(response).await)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return ClientError::from(e),
        };
        debug!(status = %status, body = %text, "Server returned error");
        let body = serde_json::from_str::<ErrorBody>(&text).unwrap_or_else(|_| ErrorBody {
            error: status
                .canonical_reason()
                .unwrap_or("Unknown")
                .to_string(),
            message: text,
        });
        ClientError::Api {
            status: status.as_u16(),
            body,
        }
    }
}
