//! Roof Control
//!
//! Command-line tool for a motorized observatory roof controller. Sends a
//! single open, close or heartbeat command over serial, then relays the
//! controller's status output until Ctrl+C, at which point the roof is
//! told to stop.
//!
//! # Usage
//!
//! ```bash
//! # Open the roof and watch its status
//! roof-control /dev/ttyACM0 --open
//!
//! # Close the roof
//! roof-control /dev/ttyACM0 --close
//!
//! # Force-close unless pinged again within 30 seconds
//! roof-control /dev/ttyACM0 --heartbeat 30
//!
//! # Disable the heartbeat and clear a tripped force-close
//! roof-control /dev/ttyACM0 --heartbeat 0
//!
//! # Just watch, with decoded status and a transcript
//! roof-control /dev/ttyACM0 --decode --log roof.log
//!
//! # List available serial ports
//! roof-control --list-ports
//! ```

mod command;
mod dispatcher;
mod error;
mod serial;
mod status;

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;

use command::Command;
use dispatcher::{install_interrupt_handler, Dispatcher, Transcript};
use serial::{PortConfig, SerialConnection};

/// Roof Control
///
/// Send commands to the roof controller and relay its status output
#[derive(Parser)]
#[command(name = "roof-control")]
#[command(version)]
#[command(about = "Open, close or set the heartbeat on the roof controller, then relay its status")]
struct Cli {
    /// Serial port path (e.g., /dev/ttyACM0)
    #[arg(required_unless_present = "list_ports")]
    port: Option<String>,

    /// Open the roof
    #[arg(long)]
    open: bool,

    /// Close the roof
    #[arg(long)]
    close: bool,

    /// Heartbeat interval in seconds (0-120, 0 disables)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    heartbeat: i64,

    /// Print a summary after each status report
    #[arg(long)]
    decode: bool,

    /// Append received lines with timestamps to a file
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if cli.list_ports {
        return serial::port::print_ports();
    }

    let port = cli
        .port
        .ok_or_else(|| anyhow::anyhow!("A serial port is required (e.g., /dev/ttyACM0)"))?;

    // Resolved before touching the port
    let command = Command::from_args(cli.open, cli.close, cli.heartbeat);
    log::debug!("Selected command: {}", command);

    let connection = SerialConnection::open(PortConfig::new(&port))?;
    log::debug!("Read timeout: {:?}", connection.config().timeout);

    let stdout = io::stdout();
    let mut dispatcher = Dispatcher::new(connection, stdout.lock()).with_decode(cli.decode);
    if let Some(path) = cli.log {
        dispatcher = dispatcher.with_transcript(Transcript::create(&path)?);
    }

    install_interrupt_handler(dispatcher.running_flag())?;
    dispatcher.run(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_heartbeat_defaults_to_unset() {
        let cli = Cli::try_parse_from(["roof-control", "/dev/ttyTEST"]).unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyTEST"));
        assert_eq!(cli.heartbeat, -1);
        assert_eq!(
            Command::from_args(cli.open, cli.close, cli.heartbeat),
            Command::None
        );
    }

    #[test]
    fn test_open_with_heartbeat() {
        let cli =
            Cli::try_parse_from(["roof-control", "/dev/ttyTEST", "--open", "--heartbeat", "50"])
                .unwrap();
        let command = Command::from_args(cli.open, cli.close, cli.heartbeat);
        assert_eq!(command.byte(), Some(0xF1));
    }

    #[test]
    fn test_negative_heartbeat_accepted() {
        let cli =
            Cli::try_parse_from(["roof-control", "/dev/ttyTEST", "--heartbeat", "-5"]).unwrap();
        assert_eq!(cli.heartbeat, -5);
    }

    #[test]
    fn test_port_required() {
        assert!(Cli::try_parse_from(["roof-control", "--open"]).is_err());
        let cli = Cli::try_parse_from(["roof-control", "--list-ports"]).unwrap();
        assert!(cli.list_ports);
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_heartbeat_must_be_integer() {
        assert!(Cli::try_parse_from(["roof-control", "/dev/ttyTEST", "--heartbeat", "ten"]).is_err());
    }
}
