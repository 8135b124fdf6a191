//! PRT-7 decoder runner.
//!
//! Wires the frame protocol to real transports: line sources (stdin, files,
//! serial ports, TCP serial bridges), the decode loop, event reporting
//! and the end-of-session summary. The `prt7` binary is a thin CLI over this
//! library.
//!
//! ```rust
//! use prt7_runner::{Decoder, ScriptedLineSource, Termination};
//!
//! let mut source = ScriptedLineSource::from_lines(["M,-1", "L,A"]);
//! let mut events = Vec::new();
//! let mut decoder = Decoder::default();
//!
//! assert_eq!(decoder.run(&mut source, &mut events), Termination::Idle);
//! assert_eq!(decoder.summary().message, "Z");
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod report;
pub mod script;
pub mod source;

pub use config::{DecoderConfig, OutputFormat, RunConfig, SourceConfig, DEFAULT_IDLE_THRESHOLD};
pub use driver::{Decoder, DriverState};
pub use error::{ConfigError, RunnerError, RunnerResult, SourceError};
pub use report::{
    ConsoleSink, DecodeEvent, EventSink, NullSink, SessionSummary, Termination, TracingSink,
};
pub use script::{generate_script, write_script, ScriptOptions};
pub use source::{
    ChannelReader, LineRead, LineSource, ScriptedLineSource, StreamLineSource, DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT_MS,
};

use std::io::Read;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Open the line source a run configuration points at.
///
/// With a `stop` flag, a source waiting for data gives up once the flag is set.
pub fn open_source(config: &RunConfig, stop: Option<Arc<AtomicBool>>) -> Result<Box<dyn LineSource>, SourceError> {
    let timeout = config.read_timeout();
    Ok(match &config.source {
        SourceConfig::Stdin => boxed(StreamLineSource::from_stdin(timeout)?, stop),
        SourceConfig::File(path) => boxed(StreamLineSource::open(path)?, stop),
        SourceConfig::Serial(path) => boxed(StreamLineSource::open_serial(path, config.baud, timeout)?, stop),
        SourceConfig::Tcp(addr) => boxed(StreamLineSource::connect(addr.as_str(), timeout)?, stop),
    })
}

fn boxed<R: Read + 'static>(source: StreamLineSource<R>, stop: Option<Arc<AtomicBool>>) -> Box<dyn LineSource> {
    match stop {
        Some(flag) => Box::new(source.with_stop_flag(flag)),
        None => Box::new(source),
    }
}

/// Fans events out to several sinks.
pub struct MultiSink<'a> {
    sinks: Vec<&'a mut dyn EventSink>,
}

impl<'a> MultiSink<'a> {
    /// Combine `sinks`; each receives every event in order.
    pub fn new(sinks: Vec<&'a mut dyn EventSink>) -> Self {
        MultiSink { sinks }
    }
}

impl EventSink for MultiSink<'_> {
    fn on_event(&mut self, event: &DecodeEvent) {
        for sink in self.sinks.iter_mut() {
            sink.on_event(event);
        }
    }
}
