//! OFFSET / LIMIT.

use crate::ast::Limit;
use alloc::vec::Vec;

/// A resolved row window: skip `offset`, then keep at most `count`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    offset: usize,
    count: Option<usize>,
}

impl Pagination {
    /// Combines a LIMIT clause with a separate OFFSET. The `[offset, count]`
    /// form carries its own offset and ignores the separate one.
    pub fn new(limit: Option<Limit>, offset: Option<usize>) -> Self {
        match limit {
            Some(Limit::Range { offset, count }) => Self {
                offset,
                count: Some(count),
            },
            Some(Limit::Count(count)) => Self {
                offset: offset.unwrap_or(0),
                count: Some(count),
            },
            None => Self {
                offset: offset.unwrap_or(0),
                count: None,
            },
        }
    }

    /// Applies the window in place.
    pub fn apply<T>(&self, items: &mut Vec<T>) {
        let len = items.len();
        let start = self.offset.min(len);
        let end = match self.count {
            Some(count) => self.offset.saturating_add(count).min(len),
            None => len,
        };

        // Truncate tail first (drops elements after end)
        items.truncate(end);
        // Remove head elements (drops elements before start)
        if start > 0 {
            items.drain(..start);
        }
    }
}
