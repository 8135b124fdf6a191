//! Error types for the PRT-7 protocol.

use thiserror::Error;

/// Reasons a text line could not be parsed into a [`Frame`](crate::Frame).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The line is shorter than the minimal `K,P` form.
    #[error("frame too short: {len} characters (min 3)")]
    TooShort {
        /// Length of the rejected line in characters.
        len: usize,
    },

    /// The character after the kind is not a comma.
    #[error("missing comma after frame kind")]
    MissingComma,

    /// The kind character is neither `L` nor `M`.
    #[error("unknown frame kind: {0:?}")]
    UnknownKind(char),

    /// The rotation payload is not a decimal integer (strict policy only).
    #[error("invalid rotation: {0:?}")]
    InvalidRotation(String),
}

impl FrameError {
    /// Short stable label for this error, used in metrics and reports.
    pub fn label(&self) -> &'static str {
        match self {
            FrameError::TooShort { .. } => "too_short",
            FrameError::MissingComma => "missing_comma",
            FrameError::UnknownKind(_) => "unknown_kind",
            FrameError::InvalidRotation(_) => "invalid_rotation",
        }
    }

    /// Whether the line had a recognizable `K,` shape but an unknown kind.
    ///
    /// Callers report this case separately from malformed lines.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, FrameError::UnknownKind(_))
    }
}

/// Errors produced while encoding a message into frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The character cannot be carried inside a single text line.
    #[error("character {ch:?} at position {position} cannot be sent in a frame")]
    UnencodableCharacter {
        /// The offending character.
        ch: char,
        /// Character index within the message.
        position: usize,
    },
}

/// Result type alias for frame parsing.
pub type ProtocolResult<T> = Result<T, FrameError>;
