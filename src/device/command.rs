use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::device::constants::{ACTION_DOCK, ACTION_START, ACTION_STATUS, ACTION_STOP, MESSAGE_CLASS, SUB_CLASS};

pub type Opcode = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Dock,
    Stop,
    Status,
}

pub const COMMANDS: [Command; 4] = [Command::Start, Command::Dock, Command::Stop, Command::Status];

impl Command {
    pub fn opcode(&self) -> Opcode {
        let action = match self {
            Command::Start => ACTION_START,
            Command::Dock => ACTION_DOCK,
            Command::Stop => ACTION_STOP,
            Command::Status => ACTION_STATUS,
        };

        [MESSAGE_CLASS, SUB_CLASS, 0x00, action]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Dock => "dock",
            Command::Stop => "stop",
            Command::Status => "status",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Start => "Start Cleaning",
            Command::Dock => "Return to Dock",
            Command::Stop => "Stop Cleaning",
            Command::Status => "Get Status",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown command: {0:?}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();

        COMMANDS
            .iter()
            .find(|command| command.name() == normalized)
            .copied()
            .ok_or(UnknownCommand(normalized))
    }
}

/// A single line typed by the operator in the command loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Quit,
    Command(Command),
    Invalid(String),
}

impl ConsoleInput {
    pub fn parse(line: &str) -> ConsoleInput {
        if line.trim().eq_ignore_ascii_case("q") {
            return ConsoleInput::Quit;
        }

        match line.parse::<Command>() {
            Ok(command) => ConsoleInput::Command(command),
            Err(UnknownCommand(input)) => ConsoleInput::Invalid(input),
        }
    }
}

/// Formats bytes as `8b 02 00 00`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
