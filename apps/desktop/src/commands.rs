//! Commands typed at the board prompt.

use shared::domain::{Square, SquareParseError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Click(Square),
    NewGame,
    Resync,
    Show,
    Help,
    Quit,
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click(_) => "click",
            Self::NewGame => "new",
            Self::Resync => "resync",
            Self::Show => "show",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'; type 'help' for a list")]
    Unknown(String),
    #[error("'click' needs a square, e.g. 'click e2'")]
    MissingSquare,
    #[error(transparent)]
    Square(#[from] SquareParseError),
    #[error("'{0}' takes no arguments")]
    UnexpectedArgument(&'static str),
}

pub const HELP: &str = "\
commands:
  click <square>   select a piece or move the selected piece (a bare square works too)
  new              start a new game
  resync           reload the board from the server
  show             print the board again
  quit             leave";

/// Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<HostCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "click" | "c" => match rest.as_slice() {
            [square] => HostCommand::Click(square.parse()?),
            [] => return Err(CommandError::MissingSquare),
            _ => return Err(CommandError::UnexpectedArgument("click <square>")),
        },
        "new" | "n" => no_args(HostCommand::NewGame, &rest)?,
        "resync" | "r" => no_args(HostCommand::Resync, &rest)?,
        "show" | "s" => no_args(HostCommand::Show, &rest)?,
        "help" | "h" | "?" => no_args(HostCommand::Help, &rest)?,
        "quit" | "q" | "exit" => no_args(HostCommand::Quit, &rest)?,
        other if rest.is_empty() => match other.parse::<Square>() {
            Ok(square) => HostCommand::Click(square),
            Err(_) => return Err(CommandError::Unknown(head.to_string())),
        },
        _ => return Err(CommandError::Unknown(head.to_string())),
    };
    Ok(Some(command))
}

fn no_args(command: HostCommand, rest: &[&str]) -> Result<HostCommand, CommandError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::UnexpectedArgument(command.name()))
    }
}
