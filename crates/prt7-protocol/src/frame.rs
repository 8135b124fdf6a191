//! Frame parsing, rendering and application.
//!
//! Each text line carries one frame:
//!
//! ```text
//! L,<char>   load: decode <char> through the rotor and append it
//! M,<int>    map:  turn the rotor by <int> positions
//! ```
//!
//! The kind letter is case-insensitive. Only the first payload character of
//! a load frame is used.

use std::fmt;

use crate::accumulator::Accumulator;
use crate::error::{FrameError, ProtocolResult};
use crate::rotor::Rotor;

/// Separator between kind and payload.
pub const FRAME_SEPARATOR: char = ',';

/// Shortest line that can hold a frame (`K,P`).
pub const MIN_FRAME_LEN: usize = 3;

/// How the payload of a map frame is converted to a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericPolicy {
    /// Best-effort conversion: leading whitespace, an optional sign and
    /// digits are consumed; anything else stops the scan. No digits gives 0.
    #[default]
    Lenient,
    /// The payload must be a complete signed decimal integer.
    Strict,
}

/// Discriminant of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Carries one character to decode.
    Load,
    /// Carries a rotation delta.
    Map,
}

impl FrameKind {
    /// Wire letter for this kind.
    pub fn as_char(&self) -> char {
        match self {
            FrameKind::Load => 'L',
            FrameKind::Map => 'M',
        }
    }

    /// Lowercase name, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Load => "load",
            FrameKind::Map => "map",
        }
    }

    /// Parse a kind letter (case-insensitive).
    pub fn from_char(c: char) -> Option<FrameKind> {
        match c {
            'L' | 'l' => Some(FrameKind::Load),
            'M' | 'm' => Some(FrameKind::Map),
            _ => None,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded protocol unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Raw (not yet decoded) character.
    Load(char),
    /// Signed rotation delta.
    Map(i32),
}

/// Observable result of applying a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A character was decoded and appended.
    Loaded {
        /// The character as received.
        raw: char,
        /// The character after passing through the rotor.
        decoded: char,
    },
    /// The rotor was turned.
    Rotated {
        /// Requested delta.
        delta: i32,
        /// Letter at the head after the rotation.
        head: char,
    },
}

impl Frame {
    /// Parse one line with the lenient numeric policy.
    pub fn parse(line: &str) -> ProtocolResult<Frame> {
        Frame::parse_with(line, NumericPolicy::Lenient)
    }

    /// Parse one line (line terminators already stripped).
    pub fn parse_with(line: &str, policy: NumericPolicy) -> ProtocolResult<Frame> {
        let len = line.chars().count();
        if len < MIN_FRAME_LEN {
            return Err(FrameError::TooShort { len });
        }

        let mut chars = line.chars();
        // Length was checked above.
        let (Some(kind), Some(separator)) = (chars.next(), chars.next()) else {
            return Err(FrameError::TooShort { len });
        };
        if separator != FRAME_SEPARATOR {
            return Err(FrameError::MissingComma);
        }
        let payload = chars.as_str();

        let frame = match FrameKind::from_char(kind) {
            Some(FrameKind::Load) => match payload.chars().next() {
                Some(c) => Frame::Load(c),
                None => return Err(FrameError::TooShort { len }),
            },
            Some(FrameKind::Map) => Frame::Map(parse_rotation(payload, policy)?),
            None => return Err(FrameError::UnknownKind(kind)),
        };

        log::trace!("parsed frame {frame} from {line:?}");
        Ok(frame)
    }

    /// The kind of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Load(_) => FrameKind::Load,
            Frame::Map(_) => FrameKind::Map,
        }
    }

    /// Canonical wire form: `L,<char>` or `M,<int>`.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Apply this frame to the decoding state.
    ///
    /// Load frames only touch the accumulator; map frames only touch the rotor.
    pub fn apply(&self, accumulator: &mut Accumulator, rotor: &mut Rotor) -> Applied {
        match *self {
            Frame::Load(raw) => {
                let decoded = rotor.map(raw);
                accumulator.append(decoded);
                Applied::Loaded { raw, decoded }
            }
            Frame::Map(delta) => {
                rotor.rotate(delta);
                Applied::Rotated {
                    delta,
                    head: rotor.current_head(),
                }
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Load(c) => write!(f, "{}{}{}", FrameKind::Load.as_char(), FRAME_SEPARATOR, c),
            Frame::Map(n) => write!(f, "{}{}{}", FrameKind::Map.as_char(), FRAME_SEPARATOR, n),
        }
    }
}

impl std::str::FromStr for Frame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frame::parse(s)
    }
}

/// Convert a map payload into a rotation according to `policy`.
pub fn parse_rotation(payload: &str, policy: NumericPolicy) -> ProtocolResult<i32> {
    match policy {
        NumericPolicy::Lenient => Ok(lenient_int(payload)),
        NumericPolicy::Strict => payload
            .trim()
            .parse::<i32>()
            .map_err(|_| FrameError::InvalidRotation(payload.to_string())),
    }
}

/// Best-effort decimal conversion. Out-of-range values saturate.
fn lenient_int(payload: &str) -> i32 {
    let mut bytes = payload
        .bytes()
        .skip_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for b in bytes {
        if !b.is_ascii_digit() {
            break;
        }
        value = (value * 10 + (b - b'0') as i64).min(i32::MAX as i64 + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
