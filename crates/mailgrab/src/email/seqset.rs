//! IMAP sequence sets.

use std::collections::BTreeSet;
use std::fmt;

/// A set of message sequence numbers, rendered in IMAP `sequence-set` syntax.
///
/// Consecutive numbers collapse into ranges, so `{1, 2, 3, 7}` renders as
/// `1:3,7`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeqSet {
    nums: BTreeSet<u32>,
}

impl SeqSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sequence number. Returns false if it was already present.
    pub fn insert(&mut self, seq: u32) -> bool {
        self.nums.insert(seq)
    }

    pub fn len(&self) -> usize {
        self.nums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nums.is_empty()
    }
}

impl FromIterator<u32> for SeqSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            nums: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for SeqSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nums = self.nums.iter().copied().peekable();
        let mut first = true;

        while let Some(start) = nums.next() {
            let mut end = start;
            while nums.peek() == Some(&(end + 1)) {
                end += 1;
                nums.next();
            }

            if !first {
                f.write_str(",")?;
            }
            first = false;

            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}:{}", start, end)?;
            }
        }

        Ok(())
    }
}
