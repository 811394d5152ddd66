//! Line protocol between the console and the process controller.
//!
//! Each input line is one command, either JSON (`{"type": "start"}`) or the
//! bare command word. Each output line is one JSON-encoded [`ProcessEvent`].

use crate::system::events::ProcessEvent;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use serde::Deserialize;

pub type CommandChannel = Channel<CriticalSectionRawMutex, ProcessCommand, 16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessCommand {
    Start,
    Pause,
    Reset,
    /// Advance one logical minute by hand, same rules as a timer tick
    Tick,
    Status,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Empty,
    UnknownCommand(String),
    MalformedJson(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Empty => write!(f, "empty command"),
            ProtocolError::UnknownCommand(word) => write!(f, "unknown command: {}", word),
            ProtocolError::MalformedJson(msg) => write!(f, "malformed command: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {}

pub fn parse_command(line: &str) -> Result<ProcessCommand, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }

    if line.starts_with('{') {
        return serde_json::from_str(line).map_err(|e| ProtocolError::MalformedJson(e.to_string()));
    }

    match line.to_ascii_lowercase().as_str() {
        "start" | "resume" => Ok(ProcessCommand::Start),
        "pause" => Ok(ProcessCommand::Pause),
        "reset" => Ok(ProcessCommand::Reset),
        "tick" => Ok(ProcessCommand::Tick),
        "status" => Ok(ProcessCommand::Status),
        "shutdown" | "quit" | "exit" => Ok(ProcessCommand::Shutdown),
        _ => Err(ProtocolError::UnknownCommand(line.to_string())),
    }
}

pub fn encode_event(event: &ProcessEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
