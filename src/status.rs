//! Controller status report decoder
//!
//! The roof controller prints one report every half second:
//!
//! ```text
//! +12.43,1,3c,00,00
//! ```
//!
//! Fields are supply voltage, status code, heartbeat countdown, close steps
//! remaining and open steps remaining. The last three are hex bytes counted
//! in half-second ticks.

use std::fmt;
use std::str::FromStr;

/// Heartbeat countdown value meaning the heartbeat has tripped
pub const HEARTBEAT_TRIPPED: u8 = 0xFF;

/// Roof state reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoofStatus {
    Unknown,
    Closed,
    Open,
    Closing,
    Opening,
    /// Closing because the heartbeat lapsed
    ForceClosing,
    /// Closed because the heartbeat lapsed; cleared by a heartbeat of 0
    ForceClosed,
}

impl RoofStatus {
    /// Whether the roof is in motion
    pub fn is_moving(&self) -> bool {
        matches!(
            self,
            RoofStatus::Closing | RoofStatus::Opening | RoofStatus::ForceClosing
        )
    }
}

impl TryFrom<u8> for RoofStatus {
    type Error = StatusError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RoofStatus::Unknown),
            1 => Ok(RoofStatus::Closed),
            2 => Ok(RoofStatus::Open),
            3 => Ok(RoofStatus::Closing),
            4 => Ok(RoofStatus::Opening),
            5 => Ok(RoofStatus::ForceClosing),
            6 => Ok(RoofStatus::ForceClosed),
            other => Err(StatusError::UnknownStatus(other)),
        }
    }
}

impl fmt::Display for RoofStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoofStatus::Unknown => write!(f, "Unknown"),
            RoofStatus::Closed => write!(f, "Closed"),
            RoofStatus::Open => write!(f, "Open"),
            RoofStatus::Closing => write!(f, "Closing"),
            RoofStatus::Opening => write!(f, "Opening"),
            RoofStatus::ForceClosing => write!(f, "Force closing"),
            RoofStatus::ForceClosed => write!(f, "Force closed"),
        }
    }
}

/// Reasons a line is not a status report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StatusError {
    #[error("Expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("Invalid voltage: {0:?}")]
    Voltage(String),

    #[error("Invalid status code: {0:?}")]
    StatusCode(String),

    #[error("Unknown status code: {0}")]
    UnknownStatus(u8),

    #[error("Invalid {field} value: {value:?}")]
    Hex { field: &'static str, value: String },
}

/// One decoded status report
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Supply voltage in volts
    pub voltage: f32,
    /// Roof state
    pub status: RoofStatus,
    /// Heartbeat countdown in half-second ticks (0 = disabled)
    pub heartbeat: u8,
    /// Close steps remaining in half-second ticks
    pub close_steps: u8,
    /// Open steps remaining in half-second ticks
    pub open_steps: u8,
}

impl StatusReport {
    /// Heartbeat seconds remaining, or `None` when disabled or tripped
    pub fn heartbeat_secs(&self) -> Option<f32> {
        match self.heartbeat {
            0 | HEARTBEAT_TRIPPED => None,
            ticks => Some(ticks as f32 / 2.0),
        }
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let heartbeat = match self.heartbeat_secs() {
            Some(secs) => format!("heartbeat {:.1}s", secs),
            None if self.heartbeat == HEARTBEAT_TRIPPED => "heartbeat tripped".to_string(),
            None => "heartbeat off".to_string(),
        };

        // The controller drives close before open when both are pending
        let motion = if self.close_steps > 0 {
            format!("close {:.1}s left", self.close_steps as f32 / 2.0)
        } else if self.open_steps > 0 {
            format!("open {:.1}s left", self.open_steps as f32 / 2.0)
        } else {
            "idle".to_string()
        };

        format!(
            "{} | {:.2} V | {} | {}",
            self.status, self.voltage, heartbeat, motion
        )
    }
}

fn parse_hex(field: &'static str, value: &str) -> Result<u8, StatusError> {
    u8::from_str_radix(value, 16).map_err(|_| StatusError::Hex {
        field,
        value: value.to_string(),
    })
}

impl FromStr for StatusReport {
    type Err = StatusError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 5 {
            return Err(StatusError::FieldCount(fields.len()));
        }

        let voltage = fields[0]
            .trim()
            .parse::<f32>()
            .map_err(|_| StatusError::Voltage(fields[0].to_string()))?;
        let code = fields[1]
            .parse::<u8>()
            .map_err(|_| StatusError::StatusCode(fields[1].to_string()))?;

        Ok(Self {
            voltage,
            status: RoofStatus::try_from(code)?,
            heartbeat: parse_hex("heartbeat", fields[2])?,
            close_steps: parse_hex("close steps", fields[3])?,
            open_steps: parse_hex("open steps", fields[4])?,
        })
    }
}
