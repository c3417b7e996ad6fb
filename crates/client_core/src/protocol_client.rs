//! HTTP adapter for the game service. Holds no game state between calls.

use std::{collections::BTreeSet, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{BoardState, GameId, GameSession, PieceColor, Square},
    error::ServiceErrorBody,
    protocol::{
        CapturedPiece, DeleteGameResponse, GameStateResponse, MoveRequest, MoveResponse,
        NewGameResponse, ValidMovesRequest, ValidMovesResponse,
    },
};
use tracing::debug;

use crate::{config::trim_server_url, error::TransportError};

pub const NEW_GAME_PATH: &str = "/api/game/new";
pub const VALID_MOVES_PATH: &str = "/api/game/valid-moves";
pub const MOVE_PATH: &str = "/api/game/move";
pub const GAME_PATH_PREFIX: &str = "/api/game/";

/// Session plus board, as returned by new-game and game-state requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub session: GameSession,
    pub board: BoardState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted {
        board: BoardState,
        current_turn: PieceColor,
        game_over: bool,
        message: Option<String>,
        captured: Option<CapturedPiece>,
    },
    Rejected {
        message: Option<String>,
    },
}

#[async_trait]
pub trait MoveClient: Send + Sync {
    async fn start_game(&self) -> Result<GameSnapshot, TransportError>;
    async fn query_legal_destinations(
        &self,
        game_id: &GameId,
        square: Square,
    ) -> Result<BTreeSet<Square>, TransportError>;
    async fn submit_move(
        &self,
        game_id: &GameId,
        from: Square,
        to: Square,
    ) -> Result<MoveOutcome, TransportError>;
    async fn fetch_game(&self, game_id: &GameId) -> Result<GameSnapshot, TransportError>;
    async fn delete_game(&self, game_id: &GameId) -> Result<(), TransportError>;
}

pub struct HttpMoveClient {
    http: Client,
    server_url: String,
}

impl HttpMoveClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: trim_server_url(&server_url.into()),
        }
    }

    pub fn with_timeout(server_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for game service")?;
        Ok(Self {
            http,
            server_url: trim_server_url(&server_url.into()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        debug!(endpoint, "sending game service request");
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::from_reqwest(endpoint, err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::from_reqwest(endpoint, err))?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ServiceErrorBody>(&body)
                .map(|body| body.summary())
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(TransportError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn snapshot(
    game_id: GameId,
    board: BoardState,
    current_turn: i64,
    game_over: bool,
) -> GameSnapshot {
    GameSnapshot {
        session: GameSession {
            game_id,
            current_turn: PieceColor::from_turn_code(current_turn),
            game_over,
        },
        board,
    }
}

#[async_trait]
impl MoveClient for HttpMoveClient {
    async fn start_game(&self) -> Result<GameSnapshot, TransportError> {
        let response: NewGameResponse = self
            .exchange(NEW_GAME_PATH, self.http.post(self.url(NEW_GAME_PATH)))
            .await?;
        Ok(snapshot(
            response.game_id,
            response.board_state,
            response.current_turn,
            false,
        ))
    }

    async fn query_legal_destinations(
        &self,
        game_id: &GameId,
        square: Square,
    ) -> Result<BTreeSet<Square>, TransportError> {
        let request = self
            .http
            .post(self.url(VALID_MOVES_PATH))
            .json(&ValidMovesRequest {
                game_id: game_id.clone(),
                square,
            });
        let response: ValidMovesResponse = self.exchange(VALID_MOVES_PATH, request).await?;
        Ok(response.valid_moves.into_iter().collect())
    }

    async fn submit_move(
        &self,
        game_id: &GameId,
        from: Square,
        to: Square,
    ) -> Result<MoveOutcome, TransportError> {
        let request = self.http.post(self.url(MOVE_PATH)).json(&MoveRequest {
            game_id: game_id.clone(),
            from_square: from,
            to_square: to,
        });
        let response: MoveResponse = self.exchange(MOVE_PATH, request).await?;

        if !response.success {
            return Ok(MoveOutcome::Rejected {
                message: response.message,
            });
        }

        let missing = |field| TransportError::MissingField {
            endpoint: MOVE_PATH.to_string(),
            field,
        };
        let board = response.board_state.ok_or_else(|| missing("board_state"))?;
        let board: BoardState =
            serde_json::from_value(board).map_err(|source| TransportError::Decode {
                endpoint: MOVE_PATH.to_string(),
                source,
            })?;
        let current_turn = response
            .current_turn
            .ok_or_else(|| missing("current_turn"))?;

        Ok(MoveOutcome::Accepted {
            board,
            current_turn: PieceColor::from_turn_code(current_turn),
            game_over: response.game_over,
            message: response.message,
            captured: response.captured_piece,
        })
    }

    async fn fetch_game(&self, game_id: &GameId) -> Result<GameSnapshot, TransportError> {
        let path = format!("{GAME_PATH_PREFIX}{game_id}");
        let response: GameStateResponse = self
            .exchange(&path, self.http.get(self.url(&path)))
            .await?;
        Ok(snapshot(
            response.game_id,
            response.board_state,
            response.current_turn,
            response.game_over,
        ))
    }

    async fn delete_game(&self, game_id: &GameId) -> Result<(), TransportError> {
        let path = format!("{GAME_PATH_PREFIX}{game_id}");
        let response: DeleteGameResponse = self
            .exchange(&path, self.http.delete(self.url(&path)))
            .await?;
        debug!(game_id = %game_id, message = %response.message, "game deleted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/protocol_client_tests.rs"]
mod tests;
