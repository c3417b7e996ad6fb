use super::*;
use std::collections::{BTreeSet, VecDeque};

use async_trait::async_trait;
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use shared::{
    domain::{BoardState, GameId, GameSession, Piece, PieceColor, PieceKind},
    protocol::CapturedPiece,
};
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
    time::Instant,
};

use crate::{
    controller::{InteractionState, StatusKind},
    effects::CAPTURE_BANNER_DURATION,
    error::TransportError,
    protocol_client::{GameSnapshot, HttpMoveClient, MoveOutcome},
    stats::LifeTally,
};

fn square(raw: &str) -> Square {
    raw.parse().expect("square")
}

fn board_with_kings() -> BoardState {
    BoardState::from_pieces([
        (square("e1"), Piece::king(PieceColor::White, 3)),
        (square("e2"), Piece::new(PieceKind::Pawn, PieceColor::White)),
        (square("e8"), Piece::king(PieceColor::Black, 2)),
    ])
}

/// In-memory service whose move replies can be held back until the test releases them.
struct ScriptedClient {
    games_started: Mutex<u32>,
    calls: Mutex<Vec<String>>,
    move_gate: Mutex<Option<oneshot::Receiver<()>>>,
    move_outcome: Mutex<VecDeque<MoveOutcome>>,
}

impl ScriptedClient {
    fn new(outcomes: impl IntoIterator<Item = MoveOutcome>) -> Self {
        Self {
            games_started: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
            move_gate: Mutex::new(None),
            move_outcome: Mutex::new(outcomes.into_iter().collect()),
        }
    }

    fn gated(outcomes: impl IntoIterator<Item = MoveOutcome>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let mut client = Self::new(outcomes);
        client.move_gate = Mutex::new(Some(rx));
        (client, tx)
    }
}

#[async_trait]
impl MoveClient for ScriptedClient {
    async fn start_game(&self) -> Result<GameSnapshot, TransportError> {
        let game = {
            let mut started = self.games_started.lock().await;
            *started += 1;
            *started
        };
        self.calls.lock().await.push("start".to_string());
        Ok(GameSnapshot {
            session: GameSession {
                game_id: GameId(format!("g{game}")),
                current_turn: PieceColor::White,
                game_over: false,
            },
            board: board_with_kings(),
        })
    }

    async fn query_legal_destinations(
        &self,
        _game_id: &GameId,
        square: Square,
    ) -> Result<BTreeSet<Square>, TransportError> {
        self.calls.lock().await.push(format!("valid-moves {square}"));
        Ok([square.to_string().replace('2', "4").parse().expect("square")]
            .into_iter()
            .collect())
    }

    async fn submit_move(
        &self,
        game_id: &GameId,
        from: Square,
        to: Square,
    ) -> Result<MoveOutcome, TransportError> {
        self.calls
            .lock()
            .await
            .push(format!("move {game_id} {from}{to}"));
        let gate = self.move_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self
            .move_outcome
            .lock()
            .await
            .pop_front()
            .unwrap_or(MoveOutcome::Rejected { message: None }))
    }

    async fn fetch_game(&self, game_id: &GameId) -> Result<GameSnapshot, TransportError> {
        self.calls.lock().await.push(format!("fetch {game_id}"));
        Ok(GameSnapshot {
            session: GameSession {
                game_id: game_id.clone(),
                current_turn: PieceColor::Black,
                game_over: false,
            },
            board: board_with_kings(),
        })
    }

    async fn delete_game(&self, game_id: &GameId) -> Result<(), TransportError> {
        self.calls.lock().await.push(format!("delete {game_id}"));
        Ok(())
    }
}

fn capture_of(captured: &str) -> MoveOutcome {
    MoveOutcome::Accepted {
        board: BoardState::from_pieces([
            (square("e1"), Piece::king(PieceColor::White, 3)),
            (square("e4"), Piece::new(PieceKind::Pawn, PieceColor::White)),
            (square("e8"), Piece::king(PieceColor::Black, 1)),
        ]),
        current_turn: PieceColor::Black,
        game_over: false,
        message: Some(format!("{captured} captured")),
        captured: Some(CapturedPiece::Named(captured.to_string())),
    }
}

async fn started_session(client: Arc<dyn MoveClient>, banner: Duration) -> BoardSession {
    let mut session = BoardSession::new(client, banner);
    session.initialize();
    let step = session.process_next().await.expect("start completion");
    assert!(matches!(step, Step::Applied(Applied::Changed { .. })));
    session
}

#[tokio::test]
async fn initialize_starts_exactly_one_game() {
    let client = Arc::new(ScriptedClient::new([]));
    let mut session = started_session(client.clone(), CAPTURE_BANNER_DURATION).await;

    session.initialize();

    assert_eq!(*client.calls.lock().await, vec!["start".to_string()]);
    assert_eq!(session.controller().state(), &InteractionState::Idle);
    assert_eq!(
        session.controller().lives(),
        LifeTally { white: 3, black: 2 }
    );
}

#[tokio::test]
async fn click_flow_issues_one_request_per_transition() {
    let client = Arc::new(ScriptedClient::new([capture_of("black Pawn")]));
    let mut session = started_session(client.clone(), CAPTURE_BANNER_DURATION).await;

    assert!(!session.click(square("d4")));
    assert!(session.click(square("e2")));
    assert!(!session.click(square("e1")));
    session.process_next().await.expect("destinations");
    assert_eq!(session.controller().selection(), Some(square("e2")));

    assert!(session.click(square("e4")));
    session.process_next().await.expect("move");

    assert_eq!(session.controller().state(), &InteractionState::Idle);
    assert!(session.controller().legal_destinations().is_empty());
    assert_eq!(
        *client.calls.lock().await,
        vec![
            "start".to_string(),
            "valid-moves e2".to_string(),
            "move g1 e2e4".to_string(),
        ]
    );
}

#[tokio::test]
async fn late_move_response_after_new_game_is_discarded() {
    let (client, release_move) = ScriptedClient::gated([capture_of("black Pawn")]);
    let client = Arc::new(client);
    let mut session = started_session(client.clone(), CAPTURE_BANNER_DURATION).await;

    session.click(square("e2"));
    session.process_next().await.expect("destinations");
    session.click(square("e4"));
    session.new_game();

    let step = session.process_next().await.expect("restart");
    assert!(matches!(step, Step::Applied(Applied::Changed { .. })));
    let board_after_restart = session.controller().board().clone();
    assert_eq!(
        session.controller().session().map(|s| s.game_id.clone()),
        Some(GameId("g2".into()))
    );

    release_move.send(()).expect("release");
    let step = session.process_next().await.expect("late move");

    assert_eq!(step, Step::Applied(Applied::Stale));
    assert_eq!(session.controller().board(), &board_after_restart);
    assert_eq!(
        session.controller().session().map(|s| s.game_id.clone()),
        Some(GameId("g2".into()))
    );
    assert!(session.controller().banner().is_none());
}

#[tokio::test(start_paused = true)]
async fn capture_banner_clears_itself_after_configured_duration() {
    let client = Arc::new(ScriptedClient::new([capture_of("black Pawn")]));
    let mut session = started_session(client, CAPTURE_BANNER_DURATION).await;
    let mut events = session.subscribe();

    session.click(square("e2"));
    session.process_next().await.expect("destinations");
    session.click(square("e4"));
    let step = session.process_next().await.expect("move");
    assert_eq!(
        step,
        Step::Applied(Applied::Changed {
            board_replaced: true,
            banner_armed: true
        })
    );
    assert_eq!(
        session.controller().lives(),
        LifeTally { white: 3, black: 1 }
    );
    let armed_at = Instant::now();

    let step = session.process_next().await.expect("expiry");

    assert_eq!(
        step,
        Step::EffectEnded(Some(Effect::CaptureBanner {
            captured: "black Pawn".into()
        }))
    );
    assert!(armed_at.elapsed() >= CAPTURE_BANNER_DURATION);
    assert!(session.controller().banner().is_none());

    let mut saw_banner_end = false;
    while let Ok(event) = events.try_recv() {
        if let BoardEvent::BannerEnded(_) = event {
            saw_banner_end = true;
        }
    }
    assert!(saw_banner_end);
}

#[tokio::test]
async fn resync_reloads_board_from_service() {
    let client = Arc::new(ScriptedClient::new([]));
    let mut session = started_session(client.clone(), CAPTURE_BANNER_DURATION).await;

    assert!(session.resync());
    assert!(!session.resync());
    session.process_next().await.expect("fetch");

    assert_eq!(
        session.controller().session().map(|s| s.current_turn),
        Some(PieceColor::Black)
    );
    assert!(client
        .calls
        .lock()
        .await
        .contains(&"fetch g1".to_string()));
}

#[tokio::test]
async fn observers_receive_views_for_each_change() {
    let client = Arc::new(ScriptedClient::new([]));
    let mut session = BoardSession::new(client, CAPTURE_BANNER_DURATION);
    let mut events = session.subscribe();

    session.initialize();
    session.process_next().await.expect("start");

    let first = events.recv().await.expect("pending view");
    let BoardEvent::ViewChanged(view) = first else {
        panic!("expected a view change");
    };
    assert_eq!(view.state, InteractionState::AwaitingGame);

    let second = events.recv().await.expect("started view");
    let BoardEvent::ViewChanged(view) = second else {
        panic!("expected a view change");
    };
    assert_eq!(view.state, InteractionState::Idle);
    assert_eq!(view.lives, LifeTally { white: 3, black: 2 });
    assert!(view.session.is_some());
}

#[derive(Clone, Default)]
struct HttpState {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn http_new_game() -> Json<Value> {
    Json(json!({
        "game_id": "g1",
        "board_state": {
            "a1": {"type": "rook", "color": "white", "has_powerup": false},
            "e1": {"type": "king", "color": "white", "has_powerup": false, "lives_remaining": 3},
            "e2": {"type": "pawn", "color": "white", "has_powerup": false},
            "d5": {"type": "pawn", "color": "black", "has_powerup": false},
            "e8": {"type": "king", "color": "black", "has_powerup": false, "lives_remaining": 3},
            "e4": null,
        },
        "current_turn": 1,
    }))
}

async fn http_valid_moves(State(state): State<HttpState>, Json(body): Json<Value>) -> Json<Value> {
    state
        .requests
        .lock()
        .await
        .push(("valid-moves".to_string(), body));
    Json(json!({"valid_moves": ["e3", "e4"]}))
}

async fn http_move(State(state): State<HttpState>, Json(body): Json<Value>) -> Json<Value> {
    let to = body["to_square"].as_str().unwrap_or_default().to_string();
    state.requests.lock().await.push(("move".to_string(), body));
    match to.as_str() {
        "d5" => Json(json!({
            "success": true,
            "board_state": {
                "a1": {"type": "rook", "color": "white", "has_powerup": false},
                "e1": {"type": "king", "color": "white", "has_powerup": false, "lives_remaining": 3},
                "d5": {"type": "pawn", "color": "white", "has_powerup": false},
                "e8": {"type": "king", "color": "black", "has_powerup": false, "lives_remaining": 3},
            },
            "current_turn": 2,
            "game_over": false,
            "message": "black Pawn captured",
            "captured_piece": "black Pawn",
        })),
        _ => Json(json!({"success": false, "message": "Invalid move"})),
    }
}

async fn spawn_http_service() -> (String, HttpState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = HttpState::default();
    let app = Router::new()
        .route("/api/game/new", post(http_new_game))
        .route("/api/game/valid-moves", post(http_valid_moves))
        .route("/api/game/move", post(http_move))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn end_to_end_against_http_service() {
    let (server_url, state) = spawn_http_service().await;
    let banner = Duration::from_millis(50);
    let client: Arc<dyn MoveClient> = Arc::new(HttpMoveClient::new(server_url));
    let mut session = started_session(client, banner).await;

    // start: idle with lives read from both kings
    assert_eq!(session.controller().state(), &InteractionState::Idle);
    assert_eq!(
        session.controller().lives(),
        LifeTally { white: 3, black: 3 }
    );

    // select e2: one valid-moves request, destinations installed
    assert!(session.click(square("e2")));
    session.process_next().await.expect("destinations");
    assert_eq!(
        session.controller().legal_destinations(),
        &[square("e3"), square("e4")].into_iter().collect::<BTreeSet<_>>()
    );

    // e2 -> e4 is rejected by the service; board untouched
    let board_before = session.controller().board().clone();
    assert!(session.click(square("e4")));
    session.process_next().await.expect("rejected move");
    assert_eq!(session.controller().state(), &InteractionState::Idle);
    assert_eq!(session.controller().board(), &board_before);
    let status = session.controller().status().expect("status");
    assert_eq!(status.kind, StatusKind::Rejected);
    assert_eq!(status.text, "Invalid move");

    // e2 -> d5 captures; banner arms then clears on its own
    session.click(square("e2"));
    session.process_next().await.expect("destinations");
    session.click(square("d5"));
    let step = session.process_next().await.expect("capture");
    assert_eq!(
        step,
        Step::Applied(Applied::Changed {
            board_replaced: true,
            banner_armed: true
        })
    );
    assert!(session.controller().banner().is_some());
    let armed_at = Instant::now();
    let step = session.process_next().await.expect("banner expiry");
    assert!(matches!(step, Step::EffectEnded(Some(_))));
    assert!(armed_at.elapsed() >= banner);
    assert!(session.controller().banner().is_none());

    let requests = state.requests.lock().await;
    assert_eq!(
        requests[0],
        (
            "valid-moves".to_string(),
            json!({"game_id": "g1", "square": "e2"})
        )
    );
    assert_eq!(
        requests[1],
        (
            "move".to_string(),
            json!({"game_id": "g1", "from_square": "e2", "to_square": "e4"})
        )
    );
}
