mod commands;
mod render;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    config::{self, Settings},
    BoardEvent, BoardSession, HttpMoveClient, MoveClient,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{parse_command, HostCommand, HELP};
use crate::render::render_view;

#[derive(Parser, Debug)]
#[command(about = "Terminal board for the power-up chess server")]
struct Args {
    /// Overrides server_url from the settings file and environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Settings file to read instead of ./board_client.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn resolve_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => config::load_settings_from(path, |key| std::env::var(key).ok())?,
        None => config::load_settings()?,
    };
    if let Some(url) = &args.server_url {
        settings.server_url = config::normalize_server_url(url)?;
    }
    Ok(settings)
}

fn spawn_renderer(mut events: broadcast::Receiver<BoardEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BoardEvent::ViewChanged(view)) => println!("{}", render_view(&view)),
                Ok(BoardEvent::BannerEnded(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "renderer lagged behind board events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Returns false once the host should shut down.
fn handle_command(session: &mut BoardSession, command: HostCommand) -> bool {
    debug!(command = command.name(), "board command");
    match command {
        HostCommand::Click(square) => {
            if !session.click(square) {
                println!("nothing to do at {square}");
            }
        }
        HostCommand::NewGame => session.new_game(),
        HostCommand::Resync => {
            if !session.resync() {
                println!("resync needs a loaded game and no request in flight");
            }
        }
        HostCommand::Show => println!("{}", render_view(&session.controller().view())),
        HostCommand::Help => println!("{HELP}"),
        HostCommand::Quit => return false,
    }
    true
}

async fn close_game(client: &dyn MoveClient, session: &BoardSession) {
    let Some(game) = session.controller().session() else {
        return;
    };
    match client.delete_game(&game.game_id).await {
        Ok(()) => info!(game_id = %game.game_id, "game session closed"),
        Err(err) => warn!(game_id = %game.game_id, error = %err, "failed to close game session"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = resolve_settings(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(server_url = %settings.server_url, "starting board client");
    let client = Arc::new(HttpMoveClient::with_timeout(
        settings.server_url.clone(),
        settings.request_timeout(),
    )?);
    let mut session = BoardSession::new(client.clone(), settings.capture_banner_duration());
    spawn_renderer(session.subscribe());
    println!("{HELP}");
    session.initialize();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if !handle_command(&mut session, command) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => println!("{err}"),
                }
            }
            step = session.process_next() => {
                let Some(step) = step else {
                    break;
                };
                debug!(?step, "board step");
            }
        }
    }

    close_game(client.as_ref(), &session).await;
    Ok(())
}
