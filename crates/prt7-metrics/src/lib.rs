//! Metrics infrastructure for the PRT-7 decoder.
//!
//! This crate declares every metric the decoder emits as a structured
//! [`Metric`] constant and re-exports the `metrics` crate. Nothing is recorded
//! unless the binary installs a recorder; without one the macros are no-ops.
//!
//! # Example
//!
//! ```rust,ignore
//! use prt7_metrics::{MetricLabels, metric_defs, describe_metrics};
//!
//! describe_metrics();
//!
//! let labels = MetricLabels::new("stdin");
//! metrics::counter!(
//!     metric_defs::FRAMES_APPLIED.name,
//!     &labels.with(&[("kind", "load".to_string())])
//! )
//! .increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use prt7_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const LINES: Metric = Metric::counter("prt7.lines")
///     .with_description("Lines read")
///     .with_unit(Unit::Count)
///     .with_labels(&["source"]);
///
/// assert_eq!(LINES.name, "prt7.lines");
/// assert_eq!(LINES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "prt7.frames.applied").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the decoder.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Label present on every decoder metric.
    pub const STANDARD_LABELS: &[&str] = &["source"];

    /// Frames parsed and applied.
    ///
    /// Labels: source, kind (`load` or `map`)
    pub const FRAMES_APPLIED: Metric = Metric::counter("prt7.frames.applied")
        .with_description("Frames parsed and applied")
        .with_unit(Unit::Count)
        .with_labels(&["source", "kind"]);

    /// Lines rejected by the frame parser.
    ///
    /// Labels: source, reason (`too_short`, `missing_comma`, `unknown_kind`, `invalid_rotation`)
    pub const FRAMES_INVALID: Metric = Metric::counter("prt7.frames.invalid")
        .with_description("Lines rejected by the frame parser")
        .with_unit(Unit::Count)
        .with_labels(&["source", "reason"]);

    /// Empty reads from the line source.
    pub const LINES_IDLE: Metric = Metric::counter("prt7.lines.idle")
        .with_description("Empty reads from the line source")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Length of the decoded message.
    pub const MESSAGE_LENGTH: Metric = Metric::gauge("prt7.message.length")
        .with_description("Characters decoded so far")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Current rotor offset, 0..26.
    pub const ROTOR_OFFSET: Metric = Metric::gauge("prt7.rotor.offset")
        .with_description("Current rotor offset")
        .with_labels(&["source"]);

    /// Map frame rotation deltas as received.
    pub const ROTATION_DELTA: Metric = Metric::histogram("prt7.rotor.delta")
        .with_description("Rotation delta carried by map frames")
        .with_labels(&["source"]);

    /// Every metric, for bulk registration.
    pub const ALL: &[&Metric] = &[
        &FRAMES_APPLIED,
        &FRAMES_INVALID,
        &LINES_IDLE,
        &MESSAGE_LENGTH,
        &ROTOR_OFFSET,
        &ROTATION_DELTA,
    ];
}

/// Labels identifying which line source a metric came from.
///
/// ```rust
/// use prt7_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("tcp:127.0.0.1:5000");
/// let extended = labels.with(&[("kind", "map".to_string())]);
/// assert_eq!(extended.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Line source description (e.g. `stdin`, `file:frames.txt`).
    pub source: String,
}

impl MetricLabels {
    /// Creates labels for the given source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("source", self.source.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all decoder metrics.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
