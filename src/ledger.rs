/*
ledger.rs

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

//! Progress ledger.
//!
//! The ledger keeps one [`UserProgress`] row per player and one [`GlobalProgress`] row per
//! category. Each row is behind its own mutex, which is the row lock of the storage: the service
//! holds the user row lock for the whole duration of an assignment or of a submission, so that
//! the pool transition and the counter updates are seen together or not at all.
//!
//! Lock order, to be followed by every caller: user row, pool entry, global row. The user map
//! is only locked for lookups, never while waiting for another lock.

pub mod records;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::puzzle::{Category, CategoryTable, PuzzleKey, UserId};
pub use records::{RecordPage, RecordQuery, Score, SolveRecord, SolveRecords, SortBy, SortOrder};

/// Lock a mutex, recovering the data if another thread panicked while holding it.
///
/// The rows only hold counters and keys, which are always left consistent between two
/// statements.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Progress of a player.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user: UserId,

    /// Number of solved puzzles per category.
    pub solved: CategoryTable<u64>,

    pub total_solved: u64,

    /// Current assignment per category.
    pub assigned: CategoryTable<Option<PuzzleKey>>,

    pub records: SolveRecords,

    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            updated_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Ordinal of the next puzzle the player works on, starting at 1.
    pub fn ordinal(&self) -> u64 {
        self.total_solved + 1
    }

    /// Record an accepted solution.
    ///
    /// The caller must hold the user row lock together with the lock of the solved pool entry.
    pub fn credit(&mut self, record: SolveRecord) {
        let category: Category = record.puzzle_key.category;
        self.solved[category] += 1;
        self.total_solved += 1;
        self.records.add(record);
        self.updated_at = Utc::now();
    }
}

/// Progress of all the players in a category.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalProgress {
    pub category: Category,

    /// Number of instances in the pool.
    pub total_count: u64,

    pub solved_count: u64,
}

impl GlobalProgress {
    pub fn new(category: Category, total_count: u64) -> Self {
        Self {
            category,
            total_count,
            solved_count: 0,
        }
    }

    /// Count one more solved instance.
    pub fn credit(&mut self) {
        self.solved_count += 1;
    }
}

/// Storage for the per-user and per-category counters.
#[derive(Debug)]
pub struct Ledger {
    users: Mutex<HashMap<UserId, Arc<Mutex<UserProgress>>>>,
    global: CategoryTable<Mutex<GlobalProgress>>,
}

impl Ledger {
    /// Create an empty ledger. The pool size of each category is given by `totals`.
    pub fn new(totals: CategoryTable<u64>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            global: CategoryTable::from_fn(|c| Mutex::new(GlobalProgress::new(c, totals[c]))),
        }
    }

    /// Rebuild a ledger from saved rows.
    pub fn from_rows(users: Vec<UserProgress>, global: Vec<GlobalProgress>) -> Self {
        let ledger: Self = Self::new(CategoryTable::default());
        {
            let mut map = lock(&ledger.users);
            for progress in users {
                map.insert(progress.user, Arc::new(Mutex::new(progress)));
            }
        }
        for row in global {
            let category: Category = row.category;
            *lock(&ledger.global[category]) = row;
        }
        ledger
    }

    /// Set the pool size of each category, keeping the solved counters.
    pub fn set_totals(&self, totals: CategoryTable<u64>) {
        for (category, total) in totals.iter() {
            let mut row = self.global(category);
            if row.total_count != *total {
                debug!(
                    "Pool size of the {category} category: {} -> {total}",
                    row.total_count
                );
                row.total_count = *total;
            }
        }
    }

    /// Return the row of the given player, creating an empty row on first use.
    ///
    /// The user map is only locked for the lookup.
    pub fn user(&self, user: UserId) -> Arc<Mutex<UserProgress>> {
        let mut map = lock(&self.users);
        map.entry(user)
            .or_insert_with(|| {
                debug!("New progress row for user {user}");
                Arc::new(Mutex::new(UserProgress::new(user)))
            })
            .clone()
    }

    /// Return a copy of the row of the given player, without creating it.
    pub fn user_snapshot(&self, user: UserId) -> Option<UserProgress> {
        let row: Arc<Mutex<UserProgress>> = lock(&self.users).get(&user)?.clone();
        let progress: UserProgress = lock(&row).clone();
        Some(progress)
    }

    /// Lock the global row of the given category.
    pub fn global(&self, category: Category) -> MutexGuard<'_, GlobalProgress> {
        lock(&self.global[category])
    }

    /// Copy the user rows, in player order.
    ///
    /// The copy is only consistent with the pool when no operation is running, which the
    /// service guarantees while it saves its state.
    pub fn user_rows(&self) -> Vec<UserProgress> {
        let mut rows: Vec<(UserId, Arc<Mutex<UserProgress>>)> = lock(&self.users)
            .iter()
            .map(|(user, row)| (*user, row.clone()))
            .collect();
        rows.sort_by_key(|(user, _)| *user);
        rows.iter().map(|(_, row)| lock(row).clone()).collect()
    }

    /// Copy the global rows.
    pub fn global_rows(&self) -> Vec<GlobalProgress> {
        Category::ALL.iter().map(|c| self.global(*c).clone()).collect()
    }
}
