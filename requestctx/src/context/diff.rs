//! Ordered set difference over callback entries.

use super::data::SharedEntry;

/// Calls `exec` for every entry of `data` whose identity is not in `other`.
///
/// Both slices must be sorted by [`SharedEntry::id`]. Runs as a single
/// linear merge without building the difference.
pub(crate) fn for_each_difference<F>(data: &[SharedEntry], other: &[SharedEntry], mut exec: F)
where
    F: FnMut(&SharedEntry),
{
    let mut others = other.iter().peekable();
    for entry in data {
        while others.next_if(|o| o.id() < entry.id()).is_some() {}
        if others.next_if(|o| o.id() == entry.id()).is_none() {
            exec(entry);
        }
    }
}
