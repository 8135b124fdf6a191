//! The decode loop.
//!
//! ```text
//!              line                    parsed/rejected
//!   AwaitingLine ----> ProcessingFrame ---------------> AwaitingLine
//!        |
//!        | read error, idle threshold reached, stop flag
//!        v
//!    Terminated   (absorbing)
//! ```
//!
//! Lines are fully processed one at a time, in arrival order. Per-line
//! problems are reported and skipped; only a read error ends the session
//! abnormally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prt7_metrics::{metric_defs, MetricLabels};
use prt7_protocol::{Accumulator, Applied, Frame, FrameError, Rotor};
use tracing::{debug, trace};

use crate::config::DecoderConfig;
use crate::report::{DecodeEvent, EventSink, SessionSummary, Termination};
use crate::source::{LineRead, LineSource};

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Waiting for the next line from the source.
    AwaitingLine,
    /// Parsing and applying a line.
    ProcessingFrame,
    /// Finished; no further reads happen.
    Terminated,
}

/// Decoding session: message, rotor and statistics.
pub struct Decoder {
    config: DecoderConfig,
    accumulator: Accumulator,
    rotor: Rotor,
    state: DriverState,
    termination: Option<Termination>,
    frames_processed: u64,
    invalid_frames: u64,
    idle_reads: u64,
    consecutive_idle: u32,
    stop: Option<Arc<AtomicBool>>,
    labels: MetricLabels,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new(DecoderConfig::default())
    }
}

impl Decoder {
    /// Create a decoder with an empty message and the rotor head at `A`.
    pub fn new(config: DecoderConfig) -> Self {
        Decoder {
            config,
            accumulator: Accumulator::new(),
            rotor: Rotor::new(),
            state: DriverState::AwaitingLine,
            termination: None,
            frames_processed: 0,
            invalid_frames: 0,
            idle_reads: 0,
            consecutive_idle: 0,
            stop: None,
            labels: MetricLabels::new("unknown"),
        }
    }

    /// Stop the loop before the next read once `flag` is set.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    /// The decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The message decoded so far.
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// The rotor.
    pub fn rotor(&self) -> &Rotor {
        &self.rotor
    }

    /// Current driver state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// How the session ended, once it has.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Frames successfully applied.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Lines rejected by the parser.
    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    /// Read frames from `source` until the session terminates.
    pub fn run(&mut self, source: &mut dyn LineSource, sink: &mut dyn EventSink) -> Termination {
        self.labels = MetricLabels::new(source.describe());
        debug!(source = %self.labels.source, idle_threshold = self.config.idle_threshold, "decoding started");

        loop {
            if let Some(termination) = self.poll(source, sink) {
                return termination;
            }
        }
    }

    /// Perform one read and handle it.
    ///
    /// Returns the termination once the session has ended; calling again
    /// after that returns the same termination without reading.
    pub fn poll(&mut self, source: &mut dyn LineSource, sink: &mut dyn EventSink) -> Option<Termination> {
        if self.state == DriverState::Terminated {
            return self.termination.clone();
        }
        if self.stop_requested() {
            return Some(self.terminate(Termination::Stopped, sink));
        }

        match source.next_line() {
            Err(e) => Some(self.terminate(Termination::ReadError { message: e.to_string() }, sink)),
            Ok(LineRead::Empty) if self.stop_requested() => Some(self.terminate(Termination::Stopped, sink)),
            Ok(LineRead::Empty) => {
                self.idle_reads += 1;
                self.consecutive_idle += 1;
                metrics::counter!(metric_defs::LINES_IDLE.name, &self.labels.to_labels()).increment(1);
                trace!(consecutive = self.consecutive_idle, "empty read");
                if self.consecutive_idle >= self.config.idle_threshold {
                    Some(self.terminate(Termination::Idle, sink))
                } else {
                    None
                }
            }
            Ok(LineRead::Line(line)) => {
                self.consecutive_idle = 0;
                // Per-line failures are reported through the sink.
                let _ = self.step(&line, sink);
                None
            }
        }
    }

    /// Parse and apply one non-empty line.
    pub fn step(&mut self, line: &str, sink: &mut dyn EventSink) -> Result<Frame, FrameError> {
        self.state = DriverState::ProcessingFrame;
        let result = Frame::parse_with(line, self.config.numeric_policy);
        match &result {
            Ok(frame) => self.apply(*frame, sink),
            Err(err) => self.reject(line, err, sink),
        }
        self.state = DriverState::AwaitingLine;
        result
    }

    /// Statistics and message for the caller's final report.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            frames_processed: self.frames_processed,
            invalid_frames: self.invalid_frames,
            idle_reads: self.idle_reads,
            characters_decoded: self.accumulator.len(),
            message: self.accumulator.render(),
            termination: self.termination.clone(),
        }
    }

    /// Start a fresh session with the same configuration.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.rotor.reset();
        self.state = DriverState::AwaitingLine;
        self.termination = None;
        self.frames_processed = 0;
        self.invalid_frames = 0;
        self.idle_reads = 0;
        self.consecutive_idle = 0;
    }

    fn apply(&mut self, frame: Frame, sink: &mut dyn EventSink) {
        let applied = frame.apply(&mut self.accumulator, &mut self.rotor);
        self.frames_processed += 1;

        let kind_labels = self.labels.with(&[("kind", frame.kind().as_str().to_string())]);
        metrics::counter!(metric_defs::FRAMES_APPLIED.name, &kind_labels).increment(1);

        let event = match applied {
            Applied::Loaded { raw, decoded } => {
                metrics::gauge!(metric_defs::MESSAGE_LENGTH.name, &self.labels.to_labels())
                    .set(self.accumulator.len() as f64);
                DecodeEvent::Loaded {
                    rendering: frame.render(),
                    raw,
                    decoded,
                    message: self.accumulator.render(),
                }
            }
            Applied::Rotated { delta, head } => {
                let labels = self.labels.to_labels();
                metrics::histogram!(metric_defs::ROTATION_DELTA.name, &labels).record(delta as f64);
                metrics::gauge!(metric_defs::ROTOR_OFFSET.name, &labels).set(self.rotor.offset() as f64);
                DecodeEvent::Rotated {
                    rendering: frame.render(),
                    delta,
                    head,
                }
            }
        };
        sink.on_event(&event);
    }

    fn reject(&mut self, line: &str, err: &FrameError, sink: &mut dyn EventSink) {
        self.invalid_frames += 1;
        let reason_labels = self.labels.with(&[("reason", err.label().to_string())]);
        metrics::counter!(metric_defs::FRAMES_INVALID.name, &reason_labels).increment(1);

        sink.on_event(&DecodeEvent::InvalidFrame {
            line: line.to_string(),
            reason: err.to_string(),
            unknown_kind: err.is_unknown_kind(),
        });
    }

    fn terminate(&mut self, termination: Termination, sink: &mut dyn EventSink) -> Termination {
        debug!(%termination, frames = self.frames_processed, "decoding terminated");
        self.state = DriverState::Terminated;
        self.termination = Some(termination.clone());
        sink.on_event(&DecodeEvent::Terminated {
            termination: termination.clone(),
        });
        termination
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
