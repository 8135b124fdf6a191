//! Ordered store of decoded characters.

use std::fmt;

/// Append-only sequence of decoded characters, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    chars: Vec<char>,
}

impl Accumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Accumulator { chars: Vec::new() }
    }

    /// Append one decoded character.
    pub fn append(&mut self, c: char) {
        self.chars.push(c);
    }

    /// Number of characters decoded so far.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Whether nothing has been decoded yet.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Materialize the message. Does not consume or mutate the accumulator.
    pub fn render(&self) -> String {
        self.chars.iter().collect()
    }

    /// The decoded characters as a slice.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Iterate over decoded characters in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.chars.iter().copied()
    }

    /// Reset to empty.
    pub fn clear(&mut self) {
        self.chars.clear();
    }
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.chars {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl Extend<char> for Accumulator {
    fn extend<T: IntoIterator<Item = char>>(&mut self, iter: T) {
        self.chars.extend(iter);
    }
}
