//! Serial link to the roof controller
//!
//! This module provides:
//! - Port configuration fixed to the controller's settings
//! - The connection wrapper used by the dispatcher
//! - Port enumeration for `--list-ports`

pub mod port;
pub mod transport;

pub use port::{PortConfig, SerialConnection};
pub use transport::Transport;
