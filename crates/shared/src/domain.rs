use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::BoardStateRecord;

pub const BOARD_SIZE: u8 = 8;

/// Opaque session identifier issued by the game service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SquareParseError {
    #[error("square '{0}' must be a file a-h followed by a rank 1-8")]
    Malformed(String),
}

/// Board coordinate. Ordered rank-major so board iteration runs a1, b1, .. h8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    rank: u8,
    file: u8,
}

impl Square {
    /// `file_index` and `rank_index` are both zero-based.
    pub fn from_indices(file_index: u8, rank_index: u8) -> Option<Self> {
        (file_index < BOARD_SIZE && rank_index < BOARD_SIZE).then_some(Self {
            rank: rank_index,
            file: file_index,
        })
    }

    pub fn file(self) -> char {
        char::from(b'a' + self.file)
    }

    /// One-based rank as printed on the board.
    pub fn rank(self) -> u8 {
        self.rank + 1
    }

    pub fn file_index(self) -> u8 {
        self.file
    }

    pub fn rank_index(self) -> u8 {
        self.rank
    }
}

impl FromStr for Square {
    type Err = SquareParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || SquareParseError::Malformed(raw.to_string());
        let bytes = raw.trim().as_bytes();
        let [file, rank] = bytes else {
            return Err(malformed());
        };
        let file = file.to_ascii_lowercase();
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(rank) {
            return Err(malformed());
        }
        Ok(Self {
            rank: rank - b'1',
            file: file - b'a',
        })
    }
}

impl TryFrom<String> for Square {
    type Error = SquareParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(value: Square) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceColor {
    White,
    Black,
}

impl PieceColor {
    /// The service encodes the side to move as `1` for white; every other value is black.
    pub fn from_turn_code(code: i64) -> Self {
        if code == 1 {
            Self::White
        } else {
            Self::Black
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "white" => Some(Self::White),
            "black" => Some(Self::Black),
            _ => None,
        }
    }
}

impl fmt::Display for PieceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
    #[serde(rename = "powerup")]
    PowerUp,
}

impl PieceKind {
    /// Accepts the wire names as well as the service's class names (`"Pawn"`, `"PowerUp"`).
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "king" => Some(Self::King),
            "queen" => Some(Self::Queen),
            "rook" => Some(Self::Rook),
            "bishop" => Some(Self::Bishop),
            "knight" => Some(Self::Knight),
            "pawn" => Some(Self::Pawn),
            "powerup" => Some(Self::PowerUp),
            _ => None,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::King => 'k',
            Self::Queen => 'q',
            Self::Rook => 'r',
            Self::Bishop => 'b',
            Self::Knight => 'n',
            Self::Pawn => 'p',
            Self::PowerUp => 'a',
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::King => "king",
            Self::Queen => "queen",
            Self::Rook => "rook",
            Self::Bishop => "bishop",
            Self::Knight => "knight",
            Self::Pawn => "pawn",
            Self::PowerUp => "powerup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    /// `None` for neutral power-up tokens, which belong to neither side.
    pub color: Option<PieceColor>,
    pub has_powerup: bool,
    /// Only meaningful for kings.
    pub lives_remaining: Option<u32>,
    pub character: Option<String>,
}

impl Piece {
    pub fn new(kind: PieceKind, color: PieceColor) -> Self {
        Self {
            kind,
            color: Some(color),
            has_powerup: false,
            lives_remaining: None,
            character: None,
        }
    }

    pub fn king(color: PieceColor, lives_remaining: u32) -> Self {
        Self {
            lives_remaining: Some(lives_remaining),
            ..Self::new(PieceKind::King, color)
        }
    }

    pub fn power_up() -> Self {
        Self {
            kind: PieceKind::PowerUp,
            color: None,
            has_powerup: true,
            lives_remaining: None,
            character: None,
        }
    }

    /// Server-supplied glyph when present, otherwise upper case for white and lower case
    /// for black, matching the service's own notation.
    pub fn glyph(&self) -> char {
        if let Some(ch) = self.character.as_deref().and_then(|c| c.chars().next()) {
            return ch;
        }
        let letter = self.kind.letter();
        match self.color {
            Some(PieceColor::Black) => letter,
            _ => letter.to_ascii_uppercase(),
        }
    }
}

/// Snapshot of square contents as last reported by the service. Squares missing from the
/// map are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BoardStateRecord")]
pub struct BoardState {
    squares: BTreeMap<Square, Piece>,
}

impl BoardState {
    pub fn from_pieces(pieces: impl IntoIterator<Item = (Square, Piece)>) -> Self {
        Self {
            squares: pieces.into_iter().collect(),
        }
    }

    pub fn piece_at(&self, square: Square) -> Option<&Piece> {
        self.squares.get(&square)
    }

    pub fn is_occupied(&self, square: Square) -> bool {
        self.squares.contains_key(&square)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (Square, &Piece)> {
        self.squares.iter().map(|(square, piece)| (*square, piece))
    }

    pub fn len(&self) -> usize {
        self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub game_id: GameId,
    pub current_turn: PieceColor,
    pub game_over: bool,
}
