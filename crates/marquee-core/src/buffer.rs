//! Buffered range tracking
//!
//! Mirrors the sink's buffered intervals for the buffering bar. Purely
//! observational: nothing here feeds back into playback decisions.

use crate::types::BufferRange;
use std::sync::Arc;
use tracing::debug;

/// Tracks the buffered intervals reported by the media sink
#[derive(Debug, Clone)]
pub struct BufferTracker {
    /// Sorted by start; no two ranges overlap or touch
    ranges: Arc<[BufferRange]>,
}

impl BufferTracker {
    pub fn new() -> Self {
        Self {
            ranges: Arc::from(Vec::new()),
        }
    }

    /// Replace the tracked set with the sink's current intervals.
    ///
    /// The new set is built aside and swapped in whole, so a snapshot
    /// taken through [`ranges`](Self::ranges) is never partially updated.
    /// Returns true if the set changed.
    pub fn update<I>(&mut self, raw: I) -> bool
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let merged = merge_ranges(raw);
        if self.ranges[..] == merged[..] {
            return false;
        }
        debug!(ranges = merged.len(), "Buffered ranges updated");
        self.ranges = Arc::from(merged);
        true
    }

    /// Snapshot of the tracked set
    pub fn ranges(&self) -> Arc<[BufferRange]> {
        Arc::clone(&self.ranges)
    }

    /// Seconds buffered contiguously from `position`
    pub fn buffered_ahead(&self, position: f64) -> f64 {
        self.ranges
            .iter()
            .find(|range| range.contains(position))
            .map(|range| range.end - position)
            .unwrap_or(0.0)
    }

    /// Whether `time` lies inside a buffered range
    pub fn contains(&self, time: f64) -> bool {
        self.ranges.iter().any(|range| range.contains(time))
    }

    /// Total buffered seconds
    pub fn total_buffered(&self) -> f64 {
        self.ranges.iter().map(BufferRange::len).sum()
    }

    pub fn clear(&mut self) {
        if !self.ranges.is_empty() {
            self.ranges = Arc::from(Vec::new());
        }
    }
}

impl Default for BufferTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort raw intervals and merge every pair with a gap of zero or less.
/// Non-finite or inverted intervals are dropped.
pub fn merge_ranges<I>(raw: I) -> Vec<BufferRange>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut ranges: Vec<BufferRange> = raw
        .into_iter()
        .filter(|(start, end)| start.is_finite() && end.is_finite() && start <= end)
        .map(|(start, end)| BufferRange::new(start.max(0.0), end.max(0.0)))
        .collect();
    ranges.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<BufferRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            // Contiguous or overlapping
            Some(last) if range.start <= last.end => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}
