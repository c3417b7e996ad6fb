//! Plain-text board rendering.

use std::fmt::Write as _;

use client_core::{BoardView, Effect, InteractionState, StatusKind};
use shared::domain::Square;

const EMPTY: char = '.';

pub fn render_view(view: &BoardView) -> String {
    let mut out = String::new();
    let selected = view.state.selection();
    let destinations = match &view.state {
        InteractionState::Selected { destinations, .. } => Some(destinations),
        _ => None,
    };

    for rank_index in (0..8u8).rev() {
        let _ = write!(out, "{} ", rank_index + 1);
        for file_index in 0..8u8 {
            let Some(square) = Square::from_indices(file_index, rank_index) else {
                continue;
            };
            let glyph = view
                .board
                .piece_at(square)
                .map(|piece| piece.glyph())
                .unwrap_or(EMPTY);
            let cell = if selected == Some(square) {
                format!("[{glyph}]")
            } else if destinations.is_some_and(|d| d.contains(&square)) {
                format!("({glyph})")
            } else {
                format!(" {glyph} ")
            };
            out.push_str(&cell);
        }
        out.push('\n');
    }
    out.push_str("   a  b  c  d  e  f  g  h\n");

    match &view.session {
        Some(session) if session.game_over => {
            let _ = writeln!(out, "game {}: game over", session.game_id);
        }
        Some(session) => {
            let _ = writeln!(out, "game {}: {} to move", session.game_id, session.current_turn);
        }
        None => out.push_str("no game\n"),
    }
    let _ = writeln!(
        out,
        "lives: white {} | black {}",
        view.lives.white, view.lives.black
    );
    if view.state.is_busy() {
        out.push_str("waiting for server...\n");
    }
    if let Some(status) = &view.status {
        let prefix = match status.kind {
            StatusKind::Info => "",
            StatusKind::Rejected => "rejected: ",
            StatusKind::Failure => "error: ",
        };
        let _ = writeln!(out, "{prefix}{}", status.text);
    }
    if let Some(Effect::CaptureBanner { captured }) = &view.banner {
        let _ = writeln!(out, "*** CAPTURED: {captured} ***");
    }
    out
}
