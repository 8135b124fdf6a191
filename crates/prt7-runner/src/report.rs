//! Per-frame events and the end-of-session summary.

use std::fmt;
use std::io::Write;

use serde::Serialize;
use tracing::{debug, info, warn};

/// Why a decoding session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The idle threshold was reached: no more data.
    Idle,
    /// The line source failed.
    ReadError {
        /// Error description from the source.
        message: String,
    },
    /// The caller asked the driver to stop.
    Stopped,
}

impl Termination {
    /// Whether the session ended because of a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Termination::ReadError { .. })
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Idle => f.write_str("no more data"),
            Termination::ReadError { message } => write!(f, "read error: {message}"),
            Termination::Stopped => f.write_str("stopped"),
        }
    }
}

/// Something observable that happened while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecodeEvent {
    /// A load frame was applied.
    Loaded {
        /// Canonical frame text.
        rendering: String,
        /// Character as received.
        raw: char,
        /// Character after decoding.
        decoded: char,
        /// Message decoded so far.
        message: String,
    },
    /// A map frame was applied.
    Rotated {
        /// Canonical frame text.
        rendering: String,
        /// Rotation delta.
        delta: i32,
        /// Letter at the head after rotating.
        head: char,
    },
    /// A line could not be parsed and was skipped.
    InvalidFrame {
        /// The offending line.
        line: String,
        /// Parser error message.
        reason: String,
        /// True when the kind letter was unrecognized, false for malformed lines.
        unknown_kind: bool,
    },
    /// The session ended.
    Terminated {
        /// Why it ended.
        termination: Termination,
    },
}

/// Receiver of decode events.
pub trait EventSink {
    /// Handle one event.
    fn on_event(&mut self, event: &DecodeEvent);
}

impl EventSink for Vec<DecodeEvent> {
    fn on_event(&mut self, event: &DecodeEvent) {
        self.push(event.clone());
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &DecodeEvent) {}
}

/// Sink that emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&mut self, event: &DecodeEvent) {
        match event {
            DecodeEvent::Loaded { rendering, decoded, message, .. } => {
                debug!(frame = %rendering, %decoded, %message, "load frame applied");
            }
            DecodeEvent::Rotated { rendering, delta, head } => {
                debug!(frame = %rendering, delta, %head, "map frame applied");
            }
            DecodeEvent::InvalidFrame { line, reason, unknown_kind } => {
                warn!(%line, %reason, unknown_kind, "invalid frame skipped");
            }
            DecodeEvent::Terminated { termination } => {
                if termination.is_error() {
                    warn!(%termination, "decoding stopped");
                } else {
                    info!(%termination, "decoding finished");
                }
            }
        }
    }
}

/// Sink that prints one human-readable line per event.
///
/// The first failed write is logged as a warning; decoding carries on.
pub struct ConsoleSink<W> {
    out: W,
    write_failed: bool,
}

impl<W: Write> ConsoleSink<W> {
    /// Print to `out`.
    pub fn new(out: W) -> Self {
        ConsoleSink { out, write_failed: false }
    }

    /// Whether any write to the output has failed.
    pub fn write_failed(&self) -> bool {
        self.write_failed
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleSink<std::io::Stdout> {
    /// Print to standard output.
    pub fn stdout() -> Self {
        ConsoleSink::new(std::io::stdout())
    }
}

impl<W: Write> EventSink for ConsoleSink<W> {
    fn on_event(&mut self, event: &DecodeEvent) {
        let result = match event {
            DecodeEvent::Loaded { rendering, message, .. } => {
                writeln!(self.out, "Frame [{rendering}] -> character decoded. Partial message: {message}")
            }
            DecodeEvent::Rotated { rendering, delta, head } => {
                writeln!(self.out, "Frame [{rendering}] -> rotating rotor {delta:+} (head now at '{head}')")
            }
            DecodeEvent::InvalidFrame { line, reason, .. } => {
                writeln!(self.out, "Invalid frame [{line}]: {reason}")
            }
            DecodeEvent::Terminated { termination: Termination::Idle } => {
                writeln!(self.out, "\nNo more data received. Finishing...")
            }
            DecodeEvent::Terminated { termination } => writeln!(self.out, "\nDecoding ended: {termination}"),
        };
        if let Err(e) = result {
            if !self.write_failed {
                warn!(error = %e, "console output failed");
                self.write_failed = true;
            }
        }
    }
}

/// Statistics and result of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Frames parsed and applied.
    pub frames_processed: u64,
    /// Lines rejected by the parser.
    pub invalid_frames: u64,
    /// Empty reads seen over the whole session.
    pub idle_reads: u64,
    /// Length of the decoded message.
    pub characters_decoded: usize,
    /// The decoded message.
    pub message: String,
    /// Why the session ended, if it has.
    pub termination: Option<Termination>,
}

impl SessionSummary {
    /// Serialize as a single-line JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Render the human-readable report.
    pub fn render_text(&self) -> String {
        const RULE: &str = "---------------------------------------------------";
        let mut out = String::new();
        out.push_str("====================================================\n");
        out.push_str("                 DECODING COMPLETE                  \n");
        out.push_str("====================================================\n\n");
        out.push_str("Statistics:\n");
        out.push_str(&format!("  - Frames processed: {}\n", self.frames_processed));
        out.push_str(&format!("  - Invalid frames: {}\n", self.invalid_frames));
        out.push_str(&format!("  - Characters decoded: {}\n", self.characters_decoded));
        if let Some(termination) = &self.termination {
            out.push_str(&format!("  - Ended by: {termination}\n"));
        }
        out.push('\n');
        out.push_str(RULE);
        out.push_str("\nASSEMBLED HIDDEN MESSAGE:\n");
        out.push_str(RULE);
        out.push('\n');
        if self.message.is_empty() {
            out.push_str("(empty message - no load frames received)\n");
        } else {
            out.push_str(&self.message);
            out.push('\n');
        }
        out.push_str(RULE);
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(message: &str) -> SessionSummary {
        SessionSummary {
            frames_processed: 3,
            invalid_frames: 1,
            idle_reads: 10,
            characters_decoded: message.chars().count(),
            message: message.to_string(),
            termination: Some(Termination::Idle),
        }
    }

    #[test]
    fn test_console_sink_format() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.on_event(&DecodeEvent::Rotated {
            rendering: "M,2".to_string(),
            delta: 2,
            head: 'C',
        });
        sink.on_event(&DecodeEvent::Rotated {
            rendering: "M,-1".to_string(),
            delta: -1,
            head: 'B',
        });
        sink.on_event(&DecodeEvent::Loaded {
            rendering: "L,A".to_string(),
            raw: 'A',
            decoded: 'B',
            message: "B".to_string(),
        });
        sink.on_event(&DecodeEvent::InvalidFrame {
            line: "X,1".to_string(),
            reason: "unknown frame kind: 'X'".to_string(),
            unknown_kind: true,
        });

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Frame [M,2] -> rotating rotor +2 (head now at 'C')");
        assert_eq!(lines[1], "Frame [M,-1] -> rotating rotor -1 (head now at 'B')");
        assert_eq!(lines[2], "Frame [L,A] -> character decoded. Partial message: B");
        assert_eq!(lines[3], "Invalid frame [X,1]: unknown frame kind: 'X'");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_sink_records_write_failure() {
        let mut sink = ConsoleSink::new(ClosedPipe);
        assert!(!sink.write_failed());
        let event = DecodeEvent::Terminated {
            termination: Termination::Stopped,
        };
        sink.on_event(&event);
        assert!(sink.write_failed());
        // Later events keep going to the same writer without panicking.
        sink.on_event(&event);
        assert!(sink.write_failed());
    }

    #[test]
    fn test_event_json_shape() {
        let event = DecodeEvent::Terminated {
            termination: Termination::ReadError {
                message: "gone".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "terminated");
        assert_eq!(json["termination"]["reason"], "read_error");
        assert_eq!(json["termination"]["message"], "gone");
    }

    #[test]
    fn test_summary_text() {
        let text = summary("HELLO").render_text();
        assert!(text.contains("Frames processed: 3"));
        assert!(text.contains("Characters decoded: 5"));
        assert!(text.contains("\nHELLO\n"));
        assert!(text.contains("Ended by: no more data"));

        let empty = summary("").render_text();
        assert!(empty.contains("(empty message"));
    }

    #[test]
    fn test_summary_json() {
        let json: serde_json::Value = serde_json::from_str(&summary("CD").to_json().unwrap()).unwrap();
        assert_eq!(json["message"], "CD");
        assert_eq!(json["characters_decoded"], 2);
        assert_eq!(json["termination"]["reason"], "idle");
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::Idle.to_string(), "no more data");
        assert!(!Termination::Stopped.is_error());
        assert!(Termination::ReadError { message: String::new() }.is_error());
    }
}
