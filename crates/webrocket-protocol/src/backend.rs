//! The backend TCP wire protocol (spec §4.H).
//!
//! This module is pure: it turns already-split lines into typed commands
//! and typed commands back into wire bytes. The actual socket framing (read
//! until the `\r\n\r\n` sentinel) lives in `webrocket-core::backend::conn`,
//! which is async and therefore out of scope for this crate.

use serde_json::Value;

/// The two-letter command tokens observed on the wire.
pub mod commands {
    pub const READY: &str = "RD";
    pub const HEARTBEAT: &str = "HB";
    pub const QUIT: &str = "QT";
    pub const TRIGGER: &str = "TR";
    pub const BROADCAST: &str = "BC";
    pub const OPEN_CHANNEL: &str = "OC";
    pub const CLOSE_CHANNEL: &str = "CC";
    pub const ACCESS_TOKEN: &str = "AT";
    pub const ERROR: &str = "ER";
    pub const OK: &str = "OK";
}

/// The message terminator. A logical message is a run of lines ending with
/// this literal sentinel.
pub const SENTINEL: &str = "\r\n\r\n";

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    Ready,
    Heartbeat,
    Quit,
    Trigger { payload: Value },
    Broadcast { channel: String, event: String, data: Value },
    OpenChannel { name: String },
    CloseChannel { name: String },
    AccessToken { pattern: Option<String> },
    Error { code: u16 },
    Ok { code: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing frame {index} for command {command:?}")]
    MissingFrame { command: String, index: usize },
    #[error("malformed JSON frame: {0}")]
    BadJson(String),
    #[error("malformed status code frame: {0}")]
    BadStatusCode(String),
    #[error("message has fewer than 3 lines (identity, separator, command)")]
    Truncated,
    #[error("second line is not an empty identity/command separator")]
    MissingSeparator,
}

/// An already-delimited incoming message: identity line, then command, then
/// command-specific frames (spec §4.H: "first three lines...identity, an
/// empty separator, and the command").
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub identity: String,
    pub command: String,
    pub frames: Vec<String>,
}

/// Split a fully-received message (lines with the trailing sentinel lines
/// already stripped by the reader) into identity/command/frames.
pub fn split_message(lines: &[String]) -> Result<IncomingMessage, DecodeError> {
    if lines.len() < 3 {
        return Err(DecodeError::Truncated);
    }
    if !lines[1].is_empty() {
        return Err(DecodeError::MissingSeparator);
    }
    Ok(IncomingMessage {
        identity: lines[0].clone(),
        command: lines[2].clone(),
        frames: lines[3..].to_vec(),
    })
}

fn frame(frames: &[String], index: usize, command: &str) -> Result<String, DecodeError> {
    frames
        .get(index)
        .cloned()
        .ok_or_else(|| DecodeError::MissingFrame {
            command: command.to_owned(),
            index,
        })
}

fn parse_json_frame(raw: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(raw).map_err(|e| DecodeError::BadJson(e.to_string()))
}

fn parse_code_frame(raw: &str) -> Result<u16, DecodeError> {
    raw.trim()
        .parse()
        .map_err(|_| DecodeError::BadStatusCode(raw.to_owned()))
}

/// Decode a command name plus its frames into a typed `BackendCommand`.
pub fn decode_command(command: &str, frames: &[String]) -> Result<BackendCommand, DecodeError> {
    use commands::*;
    Ok(match command {
        READY => BackendCommand::Ready,
        HEARTBEAT => BackendCommand::Heartbeat,
        QUIT => BackendCommand::Quit,
        TRIGGER => BackendCommand::Trigger {
            payload: parse_json_frame(&frame(frames, 0, TRIGGER)?)?,
        },
        BROADCAST => BackendCommand::Broadcast {
            channel: frame(frames, 0, BROADCAST)?,
            event: frame(frames, 1, BROADCAST)?,
            data: parse_json_frame(&frame(frames, 2, BROADCAST)?)?,
        },
        OPEN_CHANNEL => BackendCommand::OpenChannel {
            name: frame(frames, 0, OPEN_CHANNEL)?,
        },
        CLOSE_CHANNEL => BackendCommand::CloseChannel {
            name: frame(frames, 0, CLOSE_CHANNEL)?,
        },
        ACCESS_TOKEN => BackendCommand::AccessToken {
            pattern: frames.first().cloned(),
        },
        ERROR => BackendCommand::Error {
            code: parse_code_frame(&frame(frames, 0, ERROR)?)?,
        },
        OK => BackendCommand::Ok {
            code: parse_code_frame(&frame(frames, 0, OK)?)?,
        },
        other => return Err(DecodeError::UnknownCommand(other.to_owned())),
    })
}

/// Render a command to its wire bytes: `command\n<frames joined by \n>\n` +
/// the sentinel (spec §4.H: "Send direction").
pub fn encode_command(cmd: &BackendCommand) -> String {
    let (command, frames): (&str, Vec<String>) = match cmd {
        BackendCommand::Ready => (commands::READY, vec![]),
        BackendCommand::Heartbeat => (commands::HEARTBEAT, vec![]),
        BackendCommand::Quit => (commands::QUIT, vec![]),
        BackendCommand::Trigger { payload } => (
            commands::TRIGGER,
            vec![payload.to_string()],
        ),
        BackendCommand::Broadcast {
            channel,
            event,
            data,
        } => (
            commands::BROADCAST,
            vec![channel.clone(), event.clone(), data.to_string()],
        ),
        BackendCommand::OpenChannel { name } => (commands::OPEN_CHANNEL, vec![name.clone()]),
        BackendCommand::CloseChannel { name } => (commands::CLOSE_CHANNEL, vec![name.clone()]),
        BackendCommand::AccessToken { pattern } => (
            commands::ACCESS_TOKEN,
            pattern.clone().into_iter().collect(),
        ),
        BackendCommand::Error { code } => (commands::ERROR, vec![code.to_string()]),
        BackendCommand::Ok { code } => (commands::OK, vec![code.to_string()]),
    };
    format!("{command}\n{}\n{SENTINEL}", frames.join("\n"))
}
