//! Byte link abstraction used by the dispatcher

use super::SerialConnection;
use anyhow::Result;

/// Duplex line link to the roof controller
pub trait Transport {
    /// Read the next line including its newline, or `None` on timeout
    fn read_line(&mut self) -> Result<Option<Vec<u8>>>;

    /// Write a single command byte
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Flush any pending writes
    fn flush(&mut self) -> Result<()>;
}

impl Transport for SerialConnection {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        SerialConnection::read_line(self)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        SerialConnection::write_byte(self, byte)
    }

    fn flush(&mut self) -> Result<()> {
        SerialConnection::flush(self)
    }
}
