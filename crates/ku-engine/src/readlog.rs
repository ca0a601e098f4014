use serde::{Deserialize, Serialize};

/// One bit per global script line: set once a text line has been fully
/// displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadLog {
    bits: Vec<u64>,
}

impl ReadLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line as read.
    pub fn mark(&mut self, line: usize) {
        let (word, bit) = (line / 64, line % 64);
        if self.bits.len() <= word {
            self.bits.resize(word + 1, 0);
        }
        self.bits[word] |= 1 << bit;
    }

    /// Whether a line has been read.
    pub fn is_read(&self, line: usize) -> bool {
        self.bits
            .get(line / 64)
            .is_some_and(|w| w & (1 << (line % 64)) != 0)
    }

    /// Number of read lines.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}
