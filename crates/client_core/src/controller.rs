//! Board interaction state machine.
//!
//! The controller never talks to the network itself. Every accepted input yields an
//! [`IssuedRequest`] stamped with the current [`Generation`]; the host runs it against a
//! [`MoveClient`](crate::protocol_client::MoveClient) and hands the result back through
//! [`InteractionController::apply`]. Starting a new game bumps the generation, so answers to
//! anything issued before it are dropped when they arrive.

use std::{collections::BTreeSet, fmt, time::Duration};

use shared::{
    domain::{BoardState, GameId, GameSession, Square},
    protocol::CapturedPiece,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    effects::{Effect, EffectExpired, EffectScheduler},
    error::TransportError,
    protocol_client::{GameSnapshot, MoveOutcome},
    stats::{compute_life_tally, LifeTally},
};

static NO_DESTINATIONS: BTreeSet<Square> = BTreeSet::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionState {
    Idle,
    AwaitingDestinations {
        square: Square,
    },
    Selected {
        square: Square,
        destinations: BTreeSet<Square>,
    },
    AwaitingMove {
        from: Square,
        to: Square,
    },
    /// New game or resync in flight.
    AwaitingGame,
}

impl InteractionState {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::AwaitingDestinations { .. } | Self::AwaitingMove { .. } | Self::AwaitingGame
        )
    }

    pub fn selection(&self) -> Option<Square> {
        match self {
            Self::AwaitingDestinations { square } | Self::Selected { square, .. } => Some(*square),
            Self::AwaitingMove { from, .. } => Some(*from),
            Self::Idle | Self::AwaitingGame => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartGame,
    LegalDestinations {
        game_id: GameId,
        square: Square,
    },
    SubmitMove {
        game_id: GameId,
        from: Square,
        to: Square,
    },
    FetchGame {
        game_id: GameId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRequest {
    pub generation: Generation,
    pub request: Request,
}

#[derive(Debug)]
pub enum Response {
    GameStarted(Result<GameSnapshot, TransportError>),
    LegalDestinations(Result<BTreeSet<Square>, TransportError>),
    MoveSubmitted(Result<MoveOutcome, TransportError>),
    GameFetched(Result<GameSnapshot, TransportError>),
}

#[derive(Debug)]
pub struct Completion {
    pub generation: Generation,
    pub response: Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Rejected,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    fn new(kind: StatusKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Issued under an older generation; dropped untouched.
    Stale,
    /// Does not answer the request the controller is waiting on; dropped untouched.
    Mismatched,
    Changed {
        board_replaced: bool,
        banner_armed: bool,
    },
}

/// Owned copy of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    pub state: InteractionState,
    pub session: Option<GameSession>,
    pub board: BoardState,
    pub lives: LifeTally,
    pub status: Option<StatusMessage>,
    pub banner: Option<Effect>,
}

pub struct InteractionController {
    state: InteractionState,
    session: Option<GameSession>,
    board: BoardState,
    lives: LifeTally,
    status: Option<StatusMessage>,
    generation: Generation,
    effects: EffectScheduler,
    banner_duration: Duration,
}

impl InteractionController {
    pub fn new(effects: EffectScheduler, banner_duration: Duration) -> Self {
        Self {
            state: InteractionState::Idle,
            session: None,
            board: BoardState::default(),
            lives: LifeTally::default(),
            status: None,
            generation: Generation::default(),
            effects,
            banner_duration,
        }
    }

    /// Controller plus the receiving end of its effect timer channel. Banner timers run on the
    /// tokio runtime current at [`apply`](Self::apply) time; without one, a banner stays up
    /// until the next capture or new game.
    pub fn with_effect_channel(
        banner_duration: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<EffectExpired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(EffectScheduler::new(tx), banner_duration), rx)
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn selection(&self) -> Option<Square> {
        self.state.selection()
    }

    /// Empty unless a square is selected and its destinations are known.
    pub fn legal_destinations(&self) -> &BTreeSet<Square> {
        match &self.state {
            InteractionState::Selected { destinations, .. } => destinations,
            _ => &NO_DESTINATIONS,
        }
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn lives(&self) -> LifeTally {
        self.lives
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn banner(&self) -> Option<&Effect> {
        self.effects.active()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn view(&self) -> BoardView {
        BoardView {
            state: self.state.clone(),
            session: self.session.clone(),
            board: self.board.clone(),
            lives: self.lives,
            status: self.status.clone(),
            banner: self.effects.active().cloned(),
        }
    }

    pub fn click(&mut self, square: Square) -> Option<IssuedRequest> {
        match self.state {
            InteractionState::Idle => {
                let Some(session) = &self.session else {
                    debug!(%square, "click ignored: no game session");
                    return None;
                };
                if !self.board.is_occupied(square) {
                    return None;
                }
                let request = Request::LegalDestinations {
                    game_id: session.game_id.clone(),
                    square,
                };
                self.state = InteractionState::AwaitingDestinations { square };
                Some(self.issue(request))
            }
            InteractionState::Selected {
                square: selected, ..
            } if selected == square => {
                self.state = InteractionState::Idle;
                None
            }
            InteractionState::Selected { square: from, .. } => {
                let Some(session) = &self.session else {
                    self.state = InteractionState::Idle;
                    return None;
                };
                let request = Request::SubmitMove {
                    game_id: session.game_id.clone(),
                    from,
                    to: square,
                };
                self.state = InteractionState::AwaitingMove { from, to: square };
                Some(self.issue(request))
            }
            InteractionState::AwaitingDestinations { .. }
            | InteractionState::AwaitingMove { .. }
            | InteractionState::AwaitingGame => {
                debug!(%square, "click ignored: request in flight");
                None
            }
        }
    }

    /// Always accepted. Anything still in flight becomes stale.
    pub fn new_game(&mut self) -> IssuedRequest {
        if self.state.is_busy() {
            debug!(generation = %self.generation, "superseding in-flight request");
        }
        self.generation = self.generation.next();
        self.state = InteractionState::AwaitingGame;
        self.effects.cancel_all();
        self.issue(Request::StartGame)
    }

    /// Refetches the authoritative board. Only accepted while nothing is in flight.
    pub fn resync(&mut self) -> Option<IssuedRequest> {
        if self.state.is_busy() {
            return None;
        }
        let game_id = self.session.as_ref()?.game_id.clone();
        self.state = InteractionState::AwaitingGame;
        Some(self.issue(Request::FetchGame { game_id }))
    }

    /// Installs a completion. Arming the capture banner spawns its timer on the current tokio
    /// runtime when there is one.
    pub fn apply(&mut self, completion: Completion) -> Applied {
        if completion.generation != self.generation {
            debug!(
                generation = %completion.generation,
                current = %self.generation,
                "discarding stale response"
            );
            return Applied::Stale;
        }

        let state = std::mem::replace(&mut self.state, InteractionState::Idle);
        match (state, completion.response) {
            (
                InteractionState::AwaitingDestinations { square },
                Response::LegalDestinations(Ok(destinations)),
            ) => {
                debug!(%square, count = destinations.len(), "legal destinations received");
                self.state = InteractionState::Selected {
                    square,
                    destinations,
                };
                Self::changed(false, false)
            }
            (
                InteractionState::AwaitingDestinations { .. },
                Response::LegalDestinations(Err(err)),
            ) => self.fail("legal destinations", &err),
            (InteractionState::AwaitingMove { from, to }, Response::MoveSubmitted(Ok(outcome))) => {
                self.apply_move(from, to, outcome)
            }
            (InteractionState::AwaitingMove { .. }, Response::MoveSubmitted(Err(err))) => {
                self.fail("submit move", &err)
            }
            (InteractionState::AwaitingGame, Response::GameStarted(Ok(snapshot))) => {
                info!(game_id = %snapshot.session.game_id, "game started");
                let text = format!("New game started; {} to move", snapshot.session.current_turn);
                self.install(snapshot);
                self.status = Some(StatusMessage::new(StatusKind::Info, text));
                Self::changed(true, false)
            }
            (InteractionState::AwaitingGame, Response::GameStarted(Err(err))) => {
                self.session = None;
                self.board = BoardState::default();
                self.lives = compute_life_tally(&self.board);
                self.fail("start game", &err);
                Self::changed(true, false)
            }
            (InteractionState::AwaitingGame, Response::GameFetched(Ok(snapshot))) => {
                info!(game_id = %snapshot.session.game_id, "board resynchronized");
                self.install(snapshot);
                self.status = Some(StatusMessage::new(StatusKind::Info, "Board resynchronized"));
                Self::changed(true, false)
            }
            (InteractionState::AwaitingGame, Response::GameFetched(Err(err))) => {
                self.fail("resync", &err)
            }
            (state, response) => {
                warn!(?state, ?response, "response does not match pending request");
                self.state = state;
                Applied::Mismatched
            }
        }
    }

    /// Returns the effect that ended, if `expired` belongs to the active one.
    pub fn effect_expired(&mut self, expired: EffectExpired) -> Option<Effect> {
        self.effects.expire(expired)
    }

    fn apply_move(&mut self, from: Square, to: Square, outcome: MoveOutcome) -> Applied {
        match outcome {
            MoveOutcome::Accepted {
                board,
                current_turn,
                game_over,
                message,
                captured,
            } => {
                self.board = board;
                self.lives = compute_life_tally(&self.board);
                if let Some(session) = self.session.as_mut() {
                    session.current_turn = current_turn;
                    session.game_over = game_over;
                }
                info!(%from, %to, turn = %current_turn, game_over, "move accepted");

                let banner_armed = match captured.filter(CapturedPiece::is_capture) {
                    Some(captured) => {
                        self.effects.arm(
                            Effect::CaptureBanner {
                                captured: captured.to_string(),
                            },
                            self.banner_duration,
                        );
                        true
                    }
                    None => false,
                };
                let text = message.unwrap_or_else(|| "Move successful".to_string());
                self.status = Some(StatusMessage::new(StatusKind::Info, text));
                Self::changed(true, banner_armed)
            }
            MoveOutcome::Rejected { message } => {
                let text = message.unwrap_or_else(|| "Move rejected".to_string());
                info!(%from, %to, reason = %text, "move rejected");
                self.status = Some(StatusMessage::new(StatusKind::Rejected, text));
                Self::changed(false, false)
            }
        }
    }

    fn install(&mut self, snapshot: GameSnapshot) {
        self.board = snapshot.board;
        self.lives = compute_life_tally(&self.board);
        self.session = Some(snapshot.session);
    }

    fn fail(&mut self, action: &'static str, err: &TransportError) -> Applied {
        warn!(action, error = %err, "game service request failed");
        self.state = InteractionState::Idle;
        self.status = Some(StatusMessage::new(StatusKind::Failure, err.user_message()));
        Self::changed(false, false)
    }

    fn issue(&self, request: Request) -> IssuedRequest {
        debug!(generation = %self.generation, ?request, "issuing request");
        IssuedRequest {
            generation: self.generation,
            request,
        }
    }

    fn changed(board_replaced: bool, banner_armed: bool) -> Applied {
        Applied::Changed {
            board_replaced,
            banner_armed,
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
