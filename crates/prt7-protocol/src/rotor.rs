//! Rotating substitution cipher.
//!
//! The rotor is a fixed ring of the 26 uppercase letters plus a rotation
//! offset. Map frames turn the ring; load frames are decoded by shifting
//! each letter forward by the current offset:
//!
//! ```text
//! offset = 2          head
//!                      v
//!   A B C D ... Y Z    C D E F ... A B
//!   A -> C, B -> D, ..., Y -> A, Z -> B
//! ```

use std::fmt;

/// Number of symbols on the ring.
pub const ALPHABET_LEN: usize = 26;

/// The fixed ring ordering. Never changes; only the offset moves.
pub const ALPHABET: [u8; ALPHABET_LEN] = *b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Rotating Caesar-style substitution over `A`..=`Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rotor {
    /// Always in `0..26`.
    offset: u8,
}

impl Rotor {
    /// Create a rotor with the head at `A` (offset 0).
    pub fn new() -> Self {
        Rotor { offset: 0 }
    }

    /// Create a rotor already turned by `n` positions.
    pub fn with_offset(n: i32) -> Self {
        let mut rotor = Rotor::new();
        rotor.rotate(n);
        rotor
    }

    /// Current offset, normalized into `0..26`.
    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Turn the ring by `n` positions. Negative values turn backwards;
    /// any multiple of 26 is a no-op.
    pub fn rotate(&mut self, n: i32) {
        if n == 0 {
            return;
        }
        let delta = n.rem_euclid(ALPHABET_LEN as i32);
        self.offset = ((self.offset as i32 + delta) % ALPHABET_LEN as i32) as u8;
    }

    /// Put the head back on `A`.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Decode one character.
    ///
    /// Letters are case-folded and shifted forward by the offset; anything
    /// outside `A`..=`Z` after folding is returned unchanged.
    pub fn map(&self, input: char) -> char {
        let upper = input.to_ascii_uppercase();
        match index_of(upper) {
            Some(idx) => letter_at(idx + self.offset as usize),
            None => input,
        }
    }

    /// Undo [`map`](Self::map) for an uppercase letter; other characters pass through.
    pub fn unmap(&self, output: char) -> char {
        match index_of(output.to_ascii_uppercase()) {
            Some(idx) => letter_at(idx + ALPHABET_LEN - self.offset as usize),
            None => output,
        }
    }

    /// The letter currently at the head. `map('A')` always equals this.
    pub fn current_head(&self) -> char {
        letter_at(self.offset as usize)
    }
}

/// Renders the ring starting at the head, e.g. `C D E ... Z A B`.
impl fmt::Display for Rotor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..ALPHABET_LEN {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", letter_at(self.offset as usize + i))?;
        }
        Ok(())
    }
}

fn index_of(c: char) -> Option<usize> {
    if c.is_ascii_uppercase() {
        Some((c as u8 - b'A') as usize)
    } else {
        None
    }
}

fn letter_at(position: usize) -> char {
    ALPHABET[position % ALPHABET_LEN] as char
}
