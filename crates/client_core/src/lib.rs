//! Client side of the server-synced power-up chess board.
//!
//! [`BoardSession`] is the entry point for hosts: it owns an [`InteractionController`], runs
//! its requests against a [`MoveClient`] and broadcasts [`BoardEvent`]s to observers.

pub mod config;
pub mod controller;
pub mod effects;
pub mod error;
pub mod protocol_client;
pub mod session;
pub mod stats;

pub use controller::{
    Applied, BoardView, InteractionController, InteractionState, StatusKind, StatusMessage,
};
pub use effects::{Effect, CAPTURE_BANNER_DURATION};
pub use error::TransportError;
pub use protocol_client::{GameSnapshot, HttpMoveClient, MoveClient, MoveOutcome};
pub use session::{BoardEvent, BoardSession, Step};
pub use stats::{compute_life_tally, LifeTally};
