//! Error types for roof-control

/// Errors raised while relaying controller output
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The controller sent a byte outside the ASCII range
    #[error("Received non-ASCII byte {byte:#04x} at offset {offset}")]
    NonAscii {
        /// Offending byte
        byte: u8,
        /// Position of the byte within the line
        offset: usize,
    },
}
