//! UID sets for UID commands.

use std::fmt;

use super::Uid;

/// A set of UIDs, kept as sorted disjoint inclusive ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSet {
    ranges: Vec<(Uid, Uid)>,
}

impl UidSet {
    /// Builds a set from UIDs in any order. Returns `None` if empty.
    #[must_use]
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Option<Self> {
        let mut sorted: Vec<Uid> = uids.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<(Uid, Uid)> = Vec::new();
        for uid in sorted {
            match ranges.last_mut() {
                Some((_, end)) if end.get().checked_add(1) == Some(uid.get()) => *end = uid,
                _ => ranges.push((uid, uid)),
            }
        }

        (!ranges.is_empty()).then_some(Self { ranges })
    }

    /// Creates a set holding a single UID.
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self {
            ranges: vec![(uid, uid)],
        }
    }

    /// Returns true if the UID is in the set.
    #[must_use]
    pub fn contains(&self, uid: Uid) -> bool {
        self.ranges
            .iter()
            .any(|&(start, end)| start <= uid && uid <= end)
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}
