//! Runs an [`InteractionController`] against a [`MoveClient`] on one logical loop.
//!
//! Requests go out on spawned tasks; their completions and effect timer expiries come back
//! through channels and are applied one at a time by [`BoardSession::process_next`], so no
//! two transitions interleave. Observers follow along through [`BoardSession::subscribe`].

use std::{sync::Arc, time::Duration};

use shared::domain::Square;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    controller::{
        Applied, BoardView, Completion, InteractionController, IssuedRequest, Request, Response,
    },
    effects::{Effect, EffectExpired},
    protocol_client::MoveClient,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum BoardEvent {
    ViewChanged(Arc<BoardView>),
    BannerEnded(Effect),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Applied(Applied),
    EffectEnded(Option<Effect>),
}

pub struct BoardSession {
    client: Arc<dyn MoveClient>,
    controller: InteractionController,
    initialized: bool,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    expiries_rx: mpsc::UnboundedReceiver<EffectExpired>,
    events: broadcast::Sender<BoardEvent>,
}

impl BoardSession {
    pub fn new(client: Arc<dyn MoveClient>, banner_duration: Duration) -> Self {
        let (controller, expiries_rx) = InteractionController::with_effect_channel(banner_duration);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            controller,
            initialized: false,
            completions_tx,
            completions_rx,
            expiries_rx,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    /// Starts the first game. Called once by the host when the board comes up.
    pub fn initialize(&mut self) {
        if self.initialized {
            warn!("board session already initialized");
            return;
        }
        self.initialized = true;
        info!("initializing board session");
        self.new_game();
    }

    pub fn new_game(&mut self) {
        let issued = self.controller.new_game();
        self.dispatch(issued);
        self.publish();
    }

    /// Returns whether the click changed anything.
    pub fn click(&mut self, square: Square) -> bool {
        let before = self.controller.state().clone();
        if let Some(issued) = self.controller.click(square) {
            self.dispatch(issued);
        }
        let changed = *self.controller.state() != before;
        if changed {
            self.publish();
        }
        changed
    }

    pub fn resync(&mut self) -> bool {
        match self.controller.resync() {
            Some(issued) => {
                self.dispatch(issued);
                self.publish();
                true
            }
            None => false,
        }
    }

    /// Waits for the next completion or effect expiry and applies it.
    pub async fn process_next(&mut self) -> Option<Step> {
        let wakeup = tokio::select! {
            Some(completion) = self.completions_rx.recv() => Wakeup::Completion(completion),
            Some(expired) = self.expiries_rx.recv() => Wakeup::Expired(expired),
            else => return None,
        };

        match wakeup {
            Wakeup::Completion(completion) => {
                let applied = self.controller.apply(completion);
                if matches!(applied, Applied::Changed { .. }) {
                    self.publish();
                }
                Some(Step::Applied(applied))
            }
            Wakeup::Expired(expired) => {
                let ended = self.controller.effect_expired(expired);
                if let Some(effect) = &ended {
                    debug!(?effect, "effect ended");
                    let _ = self.events.send(BoardEvent::BannerEnded(effect.clone()));
                    self.publish();
                }
                Some(Step::EffectEnded(ended))
            }
        }
    }

    fn dispatch(&self, issued: IssuedRequest) {
        let client = Arc::clone(&self.client);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let IssuedRequest {
                generation,
                request,
            } = issued;
            let response = run_request(client.as_ref(), request).await;
            if completions
                .send(Completion {
                    generation,
                    response,
                })
                .is_err()
            {
                debug!(%generation, "board session gone; dropping response");
            }
        });
    }

    fn publish(&self) {
        let _ = self
            .events
            .send(BoardEvent::ViewChanged(Arc::new(self.controller.view())));
    }
}

enum Wakeup {
    Completion(Completion),
    Expired(EffectExpired),
}

async fn run_request(client: &dyn MoveClient, request: Request) -> Response {
    match request {
        Request::StartGame => Response::GameStarted(client.start_game().await),
        Request::LegalDestinations { game_id, square } => Response::LegalDestinations(
            client.query_legal_destinations(&game_id, square).await,
        ),
        Request::SubmitMove { game_id, from, to } => {
            Response::MoveSubmitted(client.submit_move(&game_id, from, to).await)
        }
        Request::FetchGame { game_id } => Response::GameFetched(client.fetch_game(&game_id).await),
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
