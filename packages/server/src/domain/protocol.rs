//! Line protocol vocabulary.
//!
//! Client lines are either `#join <nickname>` (first line only), one of the
//! `#`-prefixed commands, or chat text. Every server-originated line is
//! prefixed with `<server nickname>:`.

use super::{MemberInfo, UserStats};

pub const COMMAND_CHAR: char = '#';
pub const MSG_DELIMITER: char = ':';

pub const JOIN_COMMAND: &str = "join";
pub const LIST_COMMAND: &str = "list";
pub const QUIT_COMMAND: &str = "quit";
pub const STATS_COMMAND: &str = "stats";
pub const HELP_COMMAND: &str = "help";

/// Command sent by an active client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Quit,
    Stats,
    Help,
    Unknown(String),
}

/// Classification of one line received during the active phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientLine<'a> {
    Empty,
    Command(Command),
    Chat(&'a str),
}

/// Extract the raw nickname from a `#join <nickname>` line.
///
/// Returns `None` when the prefix does not match or nothing follows it.
pub fn parse_join(line: &str) -> Option<&str> {
    let nickname = line
        .strip_prefix(COMMAND_CHAR)?
        .strip_prefix(JOIN_COMMAND)?
        .strip_prefix(' ')?;
    (!nickname.is_empty()).then_some(nickname)
}

pub fn parse_line(line: &str) -> ClientLine<'_> {
    if line.is_empty() {
        return ClientLine::Empty;
    }
    let Some(command) = line.strip_prefix(COMMAND_CHAR) else {
        return ClientLine::Chat(line);
    };
    let command = match command {
        LIST_COMMAND => Command::List,
        QUIT_COMMAND => Command::Quit,
        STATS_COMMAND => Command::Stats,
        HELP_COMMAND => Command::Help,
        other => Command::Unknown(other.to_string()),
    };
    ClientLine::Command(command)
}

pub fn format_line(sender: &str, text: &str) -> String {
    format!("{sender}{MSG_DELIMITER}{text}")
}

pub fn welcome_text(nickname: &str) -> String {
    format!("User {nickname}, welcome to the chatroom!")
}

pub fn joined_text(nickname: &str) -> String {
    format!("User {nickname} has joined the chatroom")
}

pub fn left_text(nickname: &str) -> String {
    format!("User {nickname} has left the chatroom")
}

pub fn farewell_text(nickname: &str) -> String {
    format!("{nickname}, thanks for taking part in the chatroom!")
}

pub fn user_not_found_text(nickname: &str) -> String {
    format!("User not found: {nickname}")
}

pub fn unknown_command_text() -> String {
    format!(
        "Unknown command, send {COMMAND_CHAR}{HELP_COMMAND} for the list of available commands."
    )
}

pub fn roster_text(members: &[MemberInfo]) -> String {
    let entries = members
        .iter()
        .map(|m| format!("{} ({}:{})", m.nickname, m.address.ip(), m.address.port()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Connected users ({}): {}", members.len(), entries)
}

pub fn stats_text(nickname: &str, stats: UserStats) -> String {
    format!(
        "Statistics for {nickname}: sent={},received={}",
        stats.sent, stats.received
    )
}

pub fn help_lines() -> Vec<String> {
    vec![
        "Besides chat messages shared with the other users, you can send commands \
         that only the server sees and interprets."
            .to_string(),
        "Available commands:".to_string(),
        format!("\t{COMMAND_CHAR}{LIST_COMMAND}: list the users currently connected"),
        format!("\t{COMMAND_CHAR}{QUIT_COMMAND}: end the session"),
        format!("\t{COMMAND_CHAR}{STATS_COMMAND}: show statistics for the current session"),
        format!("\t{COMMAND_CHAR}{HELP_COMMAND}: show this list of commands again"),
        format!("A message starting with {COMMAND_CHAR} is always interpreted as a command."),
    ]
}
