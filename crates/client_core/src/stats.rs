//! Values derived from a board snapshot.

use shared::domain::{BoardState, PieceColor, PieceKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifeTally {
    pub white: u32,
    pub black: u32,
}

/// Remaining king lives per side. A side without a king on the board has none left; a king
/// that omits `lives_remaining` counts as zero.
pub fn compute_life_tally(board: &BoardState) -> LifeTally {
    let mut tally = LifeTally::default();
    for (_, piece) in board.occupied() {
        if piece.kind != PieceKind::King {
            continue;
        }
        let lives = piece.lives_remaining.unwrap_or(0);
        match piece.color {
            Some(PieceColor::White) => tally.white = lives,
            Some(PieceColor::Black) => tally.black = lives,
            None => {}
        }
    }
    tally
}
