//! Command tags.

use crate::types::Tag;

/// Generates sequential command tags (`A0000`, `A0001`, ...).
///
/// A client holds one generator per connection so every tagged response
/// can be matched to the command that caused it.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Returns the next tag.
    ///
    /// The counter wraps after `u32::MAX`; tags only have to be unique
    /// among commands in flight, and this client has one at a time.
    pub fn next_tag(&mut self) -> Tag {
        let n = self.counter;
        self.counter = self.counter.wrapping_add(1);
        Tag(format!("{}{n:04}", self.prefix))
    }

    /// Number of tags handed out so far (modulo wrapping).
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}
