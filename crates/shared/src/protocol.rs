use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BoardState, GameId, Piece, PieceColor, PieceKind, Square, SquareParseError};

/// Captured-piece value the service reports when a move consumed a power-up token rather
/// than an opposing piece.
pub const POWER_UP_SENTINEL: &str = "PowerUp";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid board key: {0}")]
    InvalidSquare(#[from] SquareParseError),
    #[error("piece on {square} has unknown color '{color}'")]
    UnknownColor { square: String, color: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PieceRecord {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub color: String,
    #[serde(default)]
    pub has_powerup: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lives_remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
}

impl PieceRecord {
    fn into_piece(self, square: &str) -> Result<Piece, WireError> {
        let color = match (PieceColor::parse(&self.color), self.kind) {
            (Some(color), _) => Some(color),
            // power-up tokens arrive with a neutral color of their own
            (None, PieceKind::PowerUp) => None,
            (None, _) => {
                return Err(WireError::UnknownColor {
                    square: square.to_string(),
                    color: self.color,
                })
            }
        };
        Ok(Piece {
            kind: self.kind,
            color,
            has_powerup: self.has_powerup,
            lives_remaining: self.lives_remaining,
            character: self.character,
        })
    }
}

/// Raw `board_state` object: square names to a piece or `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardStateRecord(pub BTreeMap<String, Option<PieceRecord>>);

impl TryFrom<BoardStateRecord> for BoardState {
    type Error = WireError;

    fn try_from(record: BoardStateRecord) -> Result<Self, Self::Error> {
        let mut pieces = Vec::with_capacity(record.0.len());
        for (key, value) in record.0 {
            let square: Square = key.parse()?;
            if let Some(piece) = value {
                pieces.push((square, piece.into_piece(&key)?));
            }
        }
        Ok(BoardState::from_pieces(pieces))
    }
}

/// What a move removed from the board, as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CapturedPieceRecord")]
pub enum CapturedPiece {
    PowerUpPickup,
    Named(String),
    Described { kind: PieceKind, color: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CapturedPieceRecord {
    Text(String),
    Descriptor {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        color: String,
    },
    Other(serde_json::Value),
}

impl From<CapturedPieceRecord> for CapturedPiece {
    fn from(record: CapturedPieceRecord) -> Self {
        match record {
            CapturedPieceRecord::Text(text) if text == POWER_UP_SENTINEL => Self::PowerUpPickup,
            CapturedPieceRecord::Text(text) => Self::Named(text),
            CapturedPieceRecord::Descriptor { kind, color } => match PieceKind::from_name(&kind) {
                Some(kind) => Self::Described { kind, color },
                None => Self::Named(format!("{color} {kind}").trim().to_string()),
            },
            CapturedPieceRecord::Other(value) => Self::Named(value.to_string()),
        }
    }
}

impl CapturedPiece {
    /// Everything except the power-up sentinel counts as taking a piece.
    pub fn is_capture(&self) -> bool {
        !matches!(self, Self::PowerUpPickup)
    }
}

impl fmt::Display for CapturedPiece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerUpPickup => f.write_str("power-up"),
            Self::Named(name) => f.write_str(name),
            Self::Described { kind, color } if color.is_empty() => write!(f, "{kind}"),
            Self::Described { kind, color } => write!(f, "{color} {kind}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGameResponse {
    pub game_id: GameId,
    pub board_state: BoardState,
    pub current_turn: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidMovesRequest {
    pub game_id: GameId,
    pub square: Square,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidMovesResponse {
    pub valid_moves: Vec<Square>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub game_id: GameId,
    pub from_square: Square,
    pub to_square: Square,
}

/// The service also echoes the unchanged board on rejection; clients must only trust
/// `board_state` and `current_turn` when `success` is true. The board is kept raw so a
/// rejection never fails on the echoed copy.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveResponse {
    pub success: bool,
    #[serde(default)]
    pub board_state: Option<serde_json::Value>,
    #[serde(default)]
    pub current_turn: Option<i64>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub captured_piece: Option<CapturedPiece>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameStateResponse {
    pub game_id: GameId,
    pub board_state: BoardState,
    pub current_turn: i64,
    #[serde(default)]
    pub game_over: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteGameResponse {
    #[serde(default)]
    pub message: String,
}
