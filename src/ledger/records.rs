/*
records.rs

Copyright 2025 Hervé Quatremain

This file is part of Boxpool.

Boxpool is free software: you can redistribute it and/or modify it under the
terms of the GNU General Public License as published by the Free Software
Foundation, either version 3 of the License, or (at your option) any later
version.

Boxpool is distributed in the hope that it will be useful, but WITHOUT ANY
WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
A PARTICULAR PURPOSE. See the GNU General Public License for more details.

You should have received a copy of the GNU General Public License along with
Boxpool. If not, see <https://www.gnu.org/licenses/>.

SPDX-License-Identifier: GPL-3.0-or-later
*/

//! Solve records.
//!
//! Each accepted submission adds a [`SolveRecord`] to the records of the player. The records
//! can be filtered by category, sorted, and read page by page with [`SolveRecords::query`].

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::puzzle::{Category, PuzzleKey};

/// Object that represents a solved puzzle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SolveRecord {
    pub puzzle_key: PuzzleKey,

    /// Number of steps reported by the player.
    pub steps: u32,

    /// Time reported by the player.
    pub elapsed_ms: u64,

    /// Verified move string, so that the solution can be replayed.
    pub moves: String,

    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
}

/// Steps and time of a solution. Fewer steps is better, then the shorter time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub steps: u32,
    pub elapsed_ms: u64,
}

impl Score {
    pub fn new(steps: u32, elapsed_ms: u64) -> Self {
        Self { steps, elapsed_ms }
    }
}

impl SolveRecord {
    pub fn score(&self) -> Score {
        Score::new(self.steps, self.elapsed_ms)
    }

    /// Keep the given result if it is better than the recorded one. Return whether it was.
    pub fn improve(&mut self, steps: u32, elapsed_ms: u64, moves: &str) -> bool {
        if Score::new(steps, elapsed_ms) >= self.score() {
            return false;
        }
        self.steps = steps;
        self.elapsed_ms = elapsed_ms;
        self.moves = moves.to_string();
        true
    }
}

/// Sort key for the records.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    CompletedAt,
    Steps,
    TimeMs,
}

/// Sort order for the records.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Parameters for reading the records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordQuery {
    /// Only return the records of this category. All the categories when None.
    pub category: Option<Category>,

    pub sort_by: SortBy,

    pub sort_order: SortOrder,

    /// Page number, starting at 1. Page 0 is read as page 1.
    pub page: usize,
}

/// Page of records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<SolveRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_records: usize,
}

/// List of the records of a player, in completion order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveRecords {
    list: Vec<SolveRecord>,
}

impl SolveRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Add a record.
    pub fn add(&mut self, record: SolveRecord) {
        self.list.push(record);
    }

    /// Return the record of the given puzzle, if the player solved it.
    pub fn find(&self, key: PuzzleKey) -> Option<&SolveRecord> {
        self.list.iter().find(|r| r.puzzle_key == key)
    }

    /// Keep the better result in the record of the given puzzle. Return whether it changed.
    pub fn improve(&mut self, key: PuzzleKey, steps: u32, elapsed_ms: u64, moves: &str) -> bool {
        self.list
            .iter_mut()
            .find(|r| r.puzzle_key == key)
            .is_some_and(|r| r.improve(steps, elapsed_ms, moves))
    }

    /// Return a page of records.
    pub fn query(&self, query: &RecordQuery, page_size: usize) -> RecordPage {
        let page_size: usize = page_size.max(1);
        let mut selected: Vec<&SolveRecord> = self
            .list
            .iter()
            .filter(|r| query.category.is_none_or(|c| r.puzzle_key.category == c))
            .collect();

        selected.sort_by(|a, b| {
            let ord: Ordering = match query.sort_by {
                SortBy::CompletedAt => a.completed_at.cmp(&b.completed_at),
                SortBy::Steps => a.steps.cmp(&b.steps),
                SortBy::TimeMs => a.elapsed_ms.cmp(&b.elapsed_ms),
            };
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total_records: usize = selected.len();
        let total_pages: usize = total_records.div_ceil(page_size);
        let page: usize = query.page.max(1);
        let records: Vec<SolveRecord> = selected
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        RecordPage {
            records,
            page,
            total_pages,
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(category: Category, level: u32, steps: u32, elapsed_ms: u64) -> SolveRecord {
        SolveRecord {
            puzzle_key: PuzzleKey::new(category, 0, level),
            steps,
            elapsed_ms,
            moves: "r".repeat(steps as usize),
            completed_at: Utc.timestamp_opt(1_700_000_000 + level as i64, 0).unwrap(),
        }
    }

    fn records() -> SolveRecords {
        let mut r = SolveRecords::new();
        r.add(record(Category::Medium, 1, 30, 9000));
        r.add(record(Category::Hard, 2, 10, 20000));
        r.add(record(Category::Medium, 3, 20, 5000));
        r
    }

    #[test]
    fn test_default_order_is_most_recent_first() {
        let page = records().query(&RecordQuery::default(), 10);
        let levels: Vec<u32> = page.records.iter().map(|r| r.puzzle_key.level_index).collect();
        assert_eq!(levels, vec![3, 2, 1]);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_filter_and_sort() {
        let query = RecordQuery {
            category: Some(Category::Medium),
            sort_by: SortBy::TimeMs,
            sort_order: SortOrder::Asc,
            page: 1,
        };
        let page = records().query(&query, 10);
        let times: Vec<u64> = page.records.iter().map(|r| r.elapsed_ms).collect();
        assert_eq!(times, vec![5000, 9000]);
        assert_eq!(page.total_records, 2);
    }

    #[test]
    fn test_pages() {
        let query = RecordQuery {
            sort_by: SortBy::Steps,
            sort_order: SortOrder::Asc,
            page: 2,
            ..Default::default()
        };
        let page = records().query(&query, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].steps, 30);

        let beyond = RecordQuery { page: 3, ..query };
        assert!(records().query(&beyond, 2).records.is_empty());
    }

    #[test]
    fn test_improve() {
        let mut r = records();
        let key = PuzzleKey::new(Category::Medium, 0, 1);
        assert!(!r.improve(key, 30, 9000, "x"));
        assert!(!r.improve(key, 31, 10, "x"));
        assert!(r.improve(key, 30, 8000, "rrr"));
        assert!(r.improve(key, 29, 60000, "rr"));
        let record = r.find(key).unwrap();
        assert_eq!((record.steps, record.elapsed_ms, record.moves.as_str()), (29, 60000, "rr"));
        assert_eq!(record.completed_at.timestamp(), 1_700_000_001);
        assert!(!r.improve(PuzzleKey::new(Category::Hard, 0, 9), 1, 1, "r"));
    }

    #[test]
    fn test_find() {
        let r = records();
        assert!(r.find(PuzzleKey::new(Category::Hard, 0, 2)).is_some());
        assert!(r.find(PuzzleKey::new(Category::Hard, 0, 1)).is_none());
    }
}
