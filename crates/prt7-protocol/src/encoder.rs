//! Message to frame-script encoding.
//!
//! This is the transmitter side of the protocol: given a plaintext message and
//! a rotation schedule, produce the frames whose decoding yields the message
//! (letters uppercased).

use crate::error::EncodeError;
use crate::frame::Frame;
use crate::rotor::Rotor;

/// Encode `message` into frames.
///
/// `schedule` is called before each character with its position and returns
/// the rotation to send first; zero means no map frame.
pub fn encode_message<F>(message: &str, mut schedule: F) -> Result<Vec<Frame>, EncodeError>
where
    F: FnMut(usize, char) -> i32,
{
    let mut rotor = Rotor::new();
    let mut frames = Vec::with_capacity(message.len());

    for (position, ch) in message.chars().enumerate() {
        if matches!(ch, '\r' | '\n') {
            return Err(EncodeError::UnencodableCharacter { ch, position });
        }

        let delta = schedule(position, ch);
        if delta != 0 {
            rotor.rotate(delta);
            frames.push(Frame::Map(delta));
        }

        frames.push(Frame::Load(rotor.unmap(ch)));
    }

    Ok(frames)
}

/// Encode `message` without any rotation.
pub fn encode_plain(message: &str) -> Result<Vec<Frame>, EncodeError> {
    encode_message(message, |_, _| 0)
}
