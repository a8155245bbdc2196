//! Command dispatcher
//!
//! Sends the selected command byte, then relays controller output to the
//! console until interrupted. The stop byte is sent whenever the relay
//! loop ends, whether by Ctrl+C or by error.

use crate::command::{Command, STOP_BYTE};
use crate::error::Error;
use crate::serial::Transport;
use crate::status::{RoofStatus, StatusReport};
use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Printed once the stop byte has been sent
pub const STOP_MARKER: &str = "lll";

/// Timestamped copy of everything received
pub struct Transcript {
    writer: BufWriter<File>,
}

impl Transcript {
    /// Open (or create) a transcript file for appending
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        log::info!("Logging to: {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one received line
    pub fn record(&mut self, line: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(self.writer, "[{}] {}", timestamp, line.trim_end_matches(['\r', '\n']))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Convert a received line to text, rejecting anything outside ASCII
fn decode_ascii(raw: &[u8]) -> Result<String, Error> {
    if let Some(offset) = raw.iter().position(|b| !b.is_ascii()) {
        return Err(Error::NonAscii {
            byte: raw[offset],
            offset,
        });
    }
    Ok(raw.iter().map(|&b| b as char).collect())
}

/// Drives one session with the roof controller
pub struct Dispatcher<T: Transport, W: Write> {
    link: T,
    out: W,
    running: Arc<AtomicBool>,
    decode: bool,
    transcript: Option<Transcript>,
    line_count: usize,
}

impl<T: Transport, W: Write> Dispatcher<T, W> {
    /// Create a dispatcher relaying `link` output to `out`
    pub fn new(link: T, out: W) -> Self {
        Self {
            link,
            out,
            running: Arc::new(AtomicBool::new(true)),
            decode: false,
            transcript: None,
            line_count: 0,
        }
    }

    /// Print a summary after each status report
    pub fn with_decode(mut self, decode: bool) -> Self {
        self.decode = decode;
        self
    }

    /// Copy received lines to a transcript
    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Get a clone of the running flag for signal handling
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Write the command's byte, if it has one
    pub fn send_command(&mut self, command: Command) -> Result<()> {
        match command.byte() {
            Some(byte) => {
                self.link.write_byte(byte)?;
                self.link.flush()?;
                log::info!("Sent {} command ({:#04x})", command, byte);
            }
            None => log::debug!("No command selected, relaying only"),
        }
        Ok(())
    }

    /// Send `command`, relay until stopped, then send the stop byte
    pub fn run(&mut self, command: Command) -> Result<()> {
        self.send_command(command)?;

        let relayed = self.relay();
        let stopped = self.shutdown();

        match (relayed, stopped) {
            (Err(e), Err(stop_err)) => {
                log::error!("Failed to send stop byte: {:#}", stop_err);
                Err(e)
            }
            (relayed, stopped) => relayed.and(stopped),
        }
    }

    fn relay(&mut self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let Some(raw) = self.link.read_line()? else {
                continue;
            };

            let line = decode_ascii(&raw)?;
            self.line_count += 1;

            self.out.write_all(line.as_bytes())?;
            if self.decode && line.ends_with('\n') {
                self.print_status(&line)?;
            }
            self.out.flush()?;

            if let Some(ref mut transcript) = self.transcript {
                transcript.record(&line)?;
            }
        }

        log::debug!("Relay stopped after {} lines", self.line_count);
        Ok(())
    }

    fn print_status(&mut self, line: &str) -> Result<()> {
        let report = match line.parse::<StatusReport>() {
            Ok(report) => report,
            Err(e) => {
                log::trace!("Not a status report ({}): {:?}", e, line);
                return Ok(());
            }
        };

        let summary = report.summary();
        let summary = match report.status {
            RoofStatus::ForceClosing | RoofStatus::ForceClosed => summary.red().bold(),
            RoofStatus::Open => summary.green(),
            status if status.is_moving() => summary.yellow(),
            _ => summary.white(),
        };
        writeln!(self.out, "{} {}", "[STATUS]".cyan().bold(), summary)?;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.link.write_byte(STOP_BYTE)?;
        self.link.flush()?;
        log::info!("Sent stop command ({:#04x})", STOP_BYTE);

        writeln!(self.out, "{}", STOP_MARKER)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Setup Ctrl+C signal handler
pub fn install_interrupt_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received interrupt, stopping roof");
        running.store(false, Ordering::SeqCst);
    })
    .with_context(|| "Failed to set Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    enum Incoming {
        Line(&'static [u8]),
        Timeout,
    }

    /// Scripted link; clears the running flag once the script runs out,
    /// standing in for Ctrl+C.
    struct MockTransport {
        incoming: VecDeque<Incoming>,
        written: Arc<Mutex<Vec<u8>>>,
        running: Option<Arc<AtomicBool>>,
        fail_writes: bool,
    }

    impl MockTransport {
        fn new(incoming: Vec<Incoming>) -> (Self, Arc<Mutex<Vec<u8>>>) {
            let written = Arc::new(Mutex::new(Vec::new()));
            let mock = Self {
                incoming: incoming.into(),
                written: Arc::clone(&written),
                running: None,
                fail_writes: false,
            };
            (mock, written)
        }
    }

    impl Transport for MockTransport {
        fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
            match self.incoming.pop_front() {
                Some(Incoming::Line(bytes)) => Ok(Some(bytes.to_vec())),
                Some(Incoming::Timeout) => Ok(None),
                None => {
                    if let Some(ref running) = self.running {
                        running.store(false, Ordering::SeqCst);
                    }
                    Ok(None)
                }
            }
        }

        fn write_byte(&mut self, byte: u8) -> Result<()> {
            if self.fail_writes {
                anyhow::bail!("write failed");
            }
            self.written.lock().unwrap().push(byte);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn run_session(
        command: Command,
        incoming: Vec<Incoming>,
        decode: bool,
    ) -> (Result<()>, Vec<u8>, String) {
        let (mut mock, written) = MockTransport::new(incoming);
        let mut out = Vec::new();
        let result = {
            let running = Arc::new(AtomicBool::new(true));
            mock.running = Some(Arc::clone(&running));
            let mut dispatcher = Dispatcher::new(mock, &mut out).with_decode(decode);
            dispatcher.running = running;
            dispatcher.run(command)
        };
        let written = written.lock().unwrap().clone();
        (result, written, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_heartbeat_then_stop() {
        let command = Command::from_args(false, false, 30);
        let (result, written, output) = run_session(command, vec![], false);
        result.unwrap();
        assert_eq!(written, vec![60, STOP_BYTE]);
        assert_eq!(output, "lll\n");
    }

    #[test]
    fn test_open_priority_over_heartbeat() {
        let command = Command::from_args(true, false, 50);
        let (result, written, _) = run_session(command, vec![], false);
        result.unwrap();
        assert_eq!(written, vec![0xF1, STOP_BYTE]);
    }

    #[test]
    fn test_no_command_only_stop() {
        let command = Command::from_args(false, false, 200);
        let (result, written, output) = run_session(
            command,
            vec![Incoming::Line(b"+12.00,1,00,00,00\r\n")],
            false,
        );
        result.unwrap();
        assert_eq!(written, vec![STOP_BYTE]);
        assert_eq!(output, "+12.00,1,00,00,00\r\nlll\n");
    }

    #[test]
    fn test_lines_echoed_verbatim_in_order() {
        let (result, _, output) = run_session(
            Command::None,
            vec![
                Incoming::Line(b"first\n"),
                Incoming::Timeout,
                Incoming::Line(b"sec"),
                Incoming::Line(b"ond\r\n"),
                Incoming::Line(b"third\n"),
            ],
            false,
        );
        result.unwrap();
        assert_eq!(output, "first\nsecond\r\nthird\nlll\n");
    }

    #[test]
    fn test_non_ascii_aborts_but_still_stops() {
        let (result, written, output) = run_session(
            Command::Close,
            vec![
                Incoming::Line(b"ok\n"),
                Incoming::Line(b"bad \xff\n"),
                Incoming::Line(b"never\n"),
            ],
            false,
        );
        let err = result.unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::NonAscii { byte, offset }) => {
                assert_eq!(*byte, 0xFF);
                assert_eq!(*offset, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(written, vec![0xF2, STOP_BYTE]);
        assert_eq!(output, "ok\nlll\n");
    }

    #[test]
    fn test_write_failure_propagates() {
        let (mut mock, written) = MockTransport::new(vec![]);
        mock.fail_writes = true;
        let mut out = Vec::new();
        let mut dispatcher = Dispatcher::new(mock, &mut out);
        assert!(dispatcher.run(Command::Open).is_err());
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_decode_appends_summary() {
        let (result, _, output) = run_session(
            Command::None,
            vec![
                Incoming::Line(b"+12.43,1,3c,00,00\r\n"),
                Incoming::Line(b"booting\n"),
            ],
            true,
        );
        result.unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "+12.43,1,3c,00,00");
        assert!(lines[1].contains("[STATUS]"));
        assert!(lines[1].contains("Closed | 12.43 V | heartbeat 30.0s | idle"));
        assert_eq!(lines[2], "booting");
        assert_eq!(lines[3], "lll");
    }

    #[test]
    fn test_decode_ascii() {
        assert_eq!(decode_ascii(b"abc\r\n").unwrap(), "abc\r\n");
        assert!(matches!(
            decode_ascii(&[b'a', 0x80]),
            Err(Error::NonAscii { byte: 0x80, offset: 1 })
        ));
    }

    #[test]
    fn test_transcript_records_timestamped_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roof.log");

        let mut transcript = Transcript::create(&path).unwrap();
        transcript.record("+12.00,2,00,00,00\r\n").unwrap();
        transcript.record("partial").unwrap();
        drop(transcript);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] +12.00,2,00,00,00"));
        assert!(lines[1].ends_with("] partial"));
    }
}
