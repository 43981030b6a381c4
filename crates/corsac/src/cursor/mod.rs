//! Read-side cursors and the query planner.
//!
//! A query touches many chunks whose time ranges may or may not overlap.
//! Every reader is one closed [`Cursor`] variant:
//!
//! - [`SingleCursor`] walks one decoded chunk.
//! - [`MergeCursor`] k-way merges overlapping readers by timestamp.
//! - [`LinearCursor`] concatenates disjoint readers in time order.
//!
//! [`CursorPlanner::plan`] assembles them so merging is only paid where
//! ranges actually overlap:
//!
//! ```text
//!            LinearCursor
//!           /     |      \
//!   MergeCursor  Single  MergeCursor      (groups in min-time order)
//!    /   |   \            /    \
//!   S    S    S          S      S         (one reader per chunk)
//! ```
//!
//! All cursors emit records in ascending timestamp order. When several
//! readers carry the same timestamp, the record from the earliest reader
//! in construction order wins and the duplicates are dropped.

use crate::error::{Result, StoreError};
use crate::record::{Record, TimeRange, Timestamp};
use std::collections::VecDeque;
use tracing::debug;

/// A positioned reader over one or more chunks.
///
/// The set of variants is closed on purpose: every composition a plan can
/// produce is one of these three, and callers dispatch with a `match`
/// instead of dynamic polymorphism.
#[derive(Debug)]
pub enum Cursor {
    /// Reader over one decoded chunk.
    Single(SingleCursor),
    /// K-way merge of overlapping readers.
    Merge(MergeCursor),
    /// Concatenation of disjoint readers.
    Linear(LinearCursor),
}

impl Cursor {
    /// Returns the next record and advances, or `None` once exhausted.
    pub fn read_next(&mut self) -> Option<Record> {
        match self {
            Self::Single(c) => c.read_next(),
            Self::Merge(c) => c.read_next(),
            Self::Linear(c) => c.read_next(),
        }
    }

    /// Peeks at the next record without advancing.
    pub fn top(&self) -> Option<Record> {
        match self {
            Self::Single(c) => c.top(),
            Self::Merge(c) => c.top(),
            Self::Linear(c) => c.top(),
        }
    }

    /// True once no records remain.
    pub fn is_end(&self) -> bool {
        self.top().is_none()
    }

    /// Smallest timestamp this cursor covers. Fixed at construction; it
    /// does not shift as records are consumed.
    pub fn min_time(&self) -> Timestamp {
        match self {
            Self::Single(c) => c.min_time,
            Self::Merge(c) => c.min_time,
            Self::Linear(c) => c.min_time,
        }
    }

    /// Largest timestamp this cursor covers. Fixed at construction.
    pub fn max_time(&self) -> Timestamp {
        match self {
            Self::Single(c) => c.max_time,
            Self::Merge(c) => c.max_time,
            Self::Linear(c) => c.max_time,
        }
    }

    /// Covered time interval (inclusive).
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.min_time(), self.max_time())
    }

    /// Upper bound on the number of records still to be emitted. Duplicate
    /// drops can make the real count smaller.
    pub fn count(&self) -> usize {
        match self {
            Self::Single(c) => c.records.len() - c.next,
            Self::Merge(c) => c.readers.iter().map(Cursor::count).sum(),
            Self::Linear(c) => c.cursors.iter().map(Cursor::count).sum(),
        }
    }
}

/// Reader over one decoded chunk: a sorted record run walked front to back.
#[derive(Debug)]
pub struct SingleCursor {
    records: Vec<Record>,
    next: usize,
    min_time: Timestamp,
    max_time: Timestamp,
}

impl SingleCursor {
    /// Wraps a run of records already sorted by ascending time.
    pub fn new(records: Vec<Record>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].time <= w[1].time));
        let min_time = records.first().map_or(0, |r| r.time);
        let max_time = records.last().map_or(0, |r| r.time);
        Self {
            records,
            next: 0,
            min_time,
            max_time,
        }
    }

    fn read_next(&mut self) -> Option<Record> {
        let rec = *self.records.get(self.next)?;
        // First-wins: skip later records sharing the emitted timestamp.
        self.next += 1;
        while self
            .records
            .get(self.next)
            .is_some_and(|r| r.time == rec.time)
        {
            self.next += 1;
        }
        Some(rec)
    }

    fn top(&self) -> Option<Record> {
        self.records.get(self.next).copied()
    }
}

/// K-way merge of readers with overlapping time ranges.
#[derive(Debug)]
pub struct MergeCursor {
    readers: Vec<Cursor>,
    min_time: Timestamp,
    max_time: Timestamp,
}

impl MergeCursor {
    /// Builds a merge over `readers`.
    ///
    /// Nested merge and linear cursors are flattened into their leaves, so
    /// the per-record scan always runs over the real reader set. Reader
    /// order is preserved; on timestamp ties the earliest reader wins.
    pub fn new(readers: Vec<Cursor>) -> Self {
        let mut flat = Vec::with_capacity(readers.len());
        for cursor in readers {
            Self::flatten_into(cursor, &mut flat);
        }
        let min_time = flat.iter().map(Cursor::min_time).min().unwrap_or(0);
        let max_time = flat.iter().map(Cursor::max_time).max().unwrap_or(0);
        Self {
            readers: flat,
            min_time,
            max_time,
        }
    }

    fn flatten_into(cursor: Cursor, out: &mut Vec<Cursor>) {
        match cursor {
            Cursor::Merge(inner) => {
                for c in inner.readers {
                    Self::flatten_into(c, out);
                }
            }
            Cursor::Linear(inner) => {
                for c in inner.cursors {
                    Self::flatten_into(c, out);
                }
            }
            leaf @ Cursor::Single(_) => out.push(leaf),
        }
    }

    fn read_next(&mut self) -> Option<Record> {
        let mut best: Option<(usize, Timestamp)> = None;
        for (i, reader) in self.readers.iter().enumerate() {
            if let Some(top) = reader.top() {
                // Strictly-less keeps the earliest reader on ties.
                if best.is_none_or(|(_, t)| top.time < t) {
                    best = Some((i, top.time));
                }
            }
        }
        let (winner, time) = best?;
        let rec = self.readers[winner].read_next();

        // Drop the same timestamp from every other reader.
        for (i, reader) in self.readers.iter_mut().enumerate() {
            if i == winner {
                continue;
            }
            while reader.top().is_some_and(|r| r.time == time) {
                reader.read_next();
            }
        }
        rec
    }

    fn top(&self) -> Option<Record> {
        let mut best: Option<Record> = None;
        for reader in &self.readers {
            if let Some(top) = reader.top() {
                if best.is_none_or(|b| top.time < b.time) {
                    best = Some(top);
                }
            }
        }
        best
    }
}

/// Concatenation of readers whose time ranges do not overlap.
#[derive(Debug)]
pub struct LinearCursor {
    cursors: VecDeque<Cursor>,
    min_time: Timestamp,
    max_time: Timestamp,
}

impl LinearCursor {
    /// Builds a concatenation over `cursors`, ordered by minimum time.
    ///
    /// Nested linear cursors are unpacked into their children; merge
    /// cursors stay intact, since unpacking one would re-interleave ranges
    /// the planner grouped for merging.
    pub fn new(cursors: Vec<Cursor>) -> Self {
        let mut flat = Vec::with_capacity(cursors.len());
        for cursor in cursors {
            match cursor {
                Cursor::Linear(inner) => flat.extend(inner.cursors),
                other => flat.push(other),
            }
        }
        flat.sort_by_key(Cursor::min_time);
        let min_time = flat.first().map_or(0, Cursor::min_time);
        let max_time = flat.iter().map(Cursor::max_time).max().unwrap_or(0);
        Self {
            cursors: flat.into(),
            min_time,
            max_time,
        }
    }

    fn read_next(&mut self) -> Option<Record> {
        loop {
            let front = self.cursors.front_mut()?;
            match front.read_next() {
                Some(rec) => return Some(rec),
                None => {
                    self.cursors.pop_front();
                }
            }
        }
    }

    fn top(&self) -> Option<Record> {
        self.cursors.iter().find_map(Cursor::top)
    }
}

/// Groups chunk readers into the cheapest cursor tree for a query.
pub struct CursorPlanner;

impl CursorPlanner {
    /// Plans a cursor tree over `cursors`.
    ///
    /// Readers are grouped by time-range overlap in a single greedy pass:
    /// each unprocessed reader seeds a group and every later reader
    /// overlapping *that seed's* range joins it. Groups of two or more
    /// become a [`MergeCursor`]; the groups, being pairwise disjoint from
    /// each seed's point of view, are chained by a [`LinearCursor`].
    ///
    /// Fails with [`StoreError::EmptyPlan`] on an empty input. A single
    /// reader is returned as-is.
    pub fn plan(mut cursors: Vec<Cursor>) -> Result<Cursor> {
        if cursors.is_empty() {
            return Err(StoreError::EmptyPlan);
        }
        if cursors.len() == 1 {
            if let Some(only) = cursors.pop() {
                return Ok(only);
            }
        }

        let ranges: Vec<TimeRange> = cursors.iter().map(Cursor::time_range).collect();
        let mut slots: Vec<Option<Cursor>> = cursors.into_iter().map(Some).collect();
        let mut processed = vec![false; slots.len()];
        let mut groups: Vec<Cursor> = Vec::new();

        for i in 0..slots.len() {
            if processed[i] {
                continue;
            }
            processed[i] = true;
            let mut members: Vec<Cursor> = Vec::new();
            if let Some(seed) = slots[i].take() {
                members.push(seed);
            }
            for j in (i + 1)..slots.len() {
                if processed[j] || !ranges[i].overlaps(&ranges[j]) {
                    continue;
                }
                processed[j] = true;
                if let Some(member) = slots[j].take() {
                    members.push(member);
                }
            }
            if members.len() > 1 {
                groups.push(Cursor::Merge(MergeCursor::new(members)));
            } else if let Some(single) = members.pop() {
                groups.push(single);
            }
        }

        debug!(groups = groups.len(), "planned cursor tree");
        if groups.len() == 1 {
            if let Some(only) = groups.pop() {
                return Ok(only);
            }
        }
        Ok(Cursor::Linear(LinearCursor::new(groups)))
    }
}
