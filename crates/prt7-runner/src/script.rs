//! Frame script generation.
//!
//! Produces the frame lines a transmitter would send for a message, with
//! rotations drawn from a seeded RNG so the same seed always yields the same
//! script.

use std::io::Write;

use prt7_protocol::{encode_message, EncodeError, Frame, LineCodec};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Options for [`generate_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// RNG seed.
    pub seed: u64,
    /// Largest rotation magnitude to send. Zero disables map frames.
    pub max_rotation: u32,
    /// Send a map frame before every n-th character. Zero disables map frames.
    pub rotate_every: usize,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        ScriptOptions {
            seed: 0,
            max_rotation: 25,
            rotate_every: 4,
        }
    }
}

impl ScriptOptions {
    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the maximum rotation magnitude.
    pub fn with_max_rotation(mut self, max_rotation: u32) -> Self {
        self.max_rotation = max_rotation;
        self
    }

    /// Set the rotation interval.
    pub fn with_rotate_every(mut self, rotate_every: usize) -> Self {
        self.rotate_every = rotate_every;
        self
    }
}

/// Encode `message` into frames with pseudo-random rotations.
pub fn generate_script(message: &str, options: &ScriptOptions) -> Result<Vec<Frame>, EncodeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let max = options.max_rotation.min(i32::MAX as u32) as i32;

    encode_message(message, |position, _| {
        if max == 0 || options.rotate_every == 0 || position % options.rotate_every != 0 {
            return 0;
        }
        rng.gen_range(-max..=max)
    })
}

/// Write frames one per line.
pub fn write_script<W: Write>(frames: &[Frame], out: &mut W) -> std::io::Result<()> {
    for frame in frames {
        out.write_all(&LineCodec::encode_line(&frame.render()))?;
    }
    out.flush()
}
