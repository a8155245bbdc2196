//! Roof controller wire commands
//!
//! The controller accepts single bytes. Values 0-240 set the heartbeat
//! countdown (in half-second ticks); values above 240 are commands.

use std::fmt;

/// Open the roof
pub const OPEN_BYTE: u8 = 0xF1;

/// Close the roof
pub const CLOSE_BYTE: u8 = 0xF2;

/// Stop any roof movement (sent when the host shuts down)
pub const STOP_BYTE: u8 = 0xF3;

/// Longest heartbeat the controller accepts, in seconds
pub const HEARTBEAT_MAX_SECS: i64 = 120;

/// Command selected from the command line, sent once before relaying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drive the roof open
    Open,
    /// Drive the roof closed
    Close,
    /// Set the heartbeat interval in seconds (0 disables it)
    Heartbeat(u8),
    /// Nothing to send
    None,
}

impl Command {
    /// Resolve the command line directives into a single command.
    ///
    /// `open` wins over `close`, which wins over `heartbeat`. A heartbeat
    /// outside 0..=120 (including the -1 "unset" default) selects nothing.
    pub fn from_args(open: bool, close: bool, heartbeat: i64) -> Self {
        if open {
            Command::Open
        } else if close {
            Command::Close
        } else if (0..=HEARTBEAT_MAX_SECS).contains(&heartbeat) {
            Command::Heartbeat(heartbeat as u8)
        } else {
            Command::None
        }
    }

    /// Byte to write on the wire, if any
    pub fn byte(&self) -> Option<u8> {
        match self {
            Command::Open => Some(OPEN_BYTE),
            Command::Close => Some(CLOSE_BYTE),
            // Firmware counts heartbeat in half-second ticks
            Command::Heartbeat(secs) => Some(secs * 2),
            Command::None => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Open => write!(f, "open"),
            Command::Close => write!(f, "close"),
            Command::Heartbeat(0) => write!(f, "heartbeat off"),
            Command::Heartbeat(secs) => write!(f, "heartbeat {}s", secs),
            Command::None => write!(f, "none"),
        }
    }
}
