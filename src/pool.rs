/*
pool.rs

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

//! Level pool manager.
//!
//! The pool holds one [`PoolEntry`] per puzzle instance, grouped by category. Each entry is
//! behind its own mutex, which plays the role of a row lock:
//!
//! - Assignment scans the entries with [`Mutex::try_lock`] and skips the locked ones, so that
//!   concurrent callers never wait on each other and never receive the same instance.
//! - Solving and releasing lock one known entry and wait for it.
//!
//! Entries are never removed. A solved entry keeps the identifier of the solver.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, TryLockError};
use thiserror::Error;

use crate::ledger::{UserProgress, lock};
use crate::puzzle::{Category, CategoryTable, DatasetError, PuzzleKey, PuzzleSource, UserId};

/// Errors from the pool operations.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("no available puzzle left in the {0} category")]
    PoolExhausted(Category),

    #[error("all the available puzzles in the {0} category are being assigned, try again")]
    ConcurrencyConflict(Category),

    #[error("puzzle {key} is not assigned to user {user}")]
    NotAssigned { key: PuzzleKey, user: UserId },

    #[error("puzzle {0} is not in the pool")]
    UnknownPuzzle(PuzzleKey),
}

impl PoolError {
    /// Whether no puzzle could be assigned. Callers handle both cases the same way.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            PoolError::PoolExhausted(_) | PoolError::ConcurrencyConflict(_)
        )
    }
}

/// State of a pool entry.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Available,
    Assigned,
    Solved,
}

/// Pool entry for one puzzle instance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolEntry {
    pub key: PuzzleKey,
    pub status: EntryStatus,

    /// Player who holds the entry. Always set for assigned and solved entries.
    pub assigned_to: Option<UserId>,

    pub updated_at: DateTime<Utc>,
}

impl PoolEntry {
    pub fn new(key: PuzzleKey) -> Self {
        Self {
            key,
            status: EntryStatus::Available,
            assigned_to: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether the entry is currently assigned to the given player.
    pub fn is_assigned_to(&self, user: UserId) -> bool {
        self.status == EntryStatus::Assigned && self.assigned_to == Some(user)
    }

    /// Whether the given player solved the entry.
    pub fn is_solved_by(&self, user: UserId) -> bool {
        self.status == EntryStatus::Solved && self.assigned_to == Some(user)
    }

    fn transition(&mut self, status: EntryStatus, assigned_to: Option<UserId>) {
        self.status = status;
        self.assigned_to = assigned_to;
        self.updated_at = Utc::now();
    }
}

/// Pool of puzzle instances.
#[derive(Debug)]
pub struct LevelPool {
    shelves: CategoryTable<Vec<Mutex<PoolEntry>>>,

    /// Position of each key in its category shelf.
    index: HashMap<PuzzleKey, usize>,
}

impl LevelPool {
    /// Create a pool from entries. Duplicated keys are ignored.
    pub fn from_entries(entries: impl IntoIterator<Item = PoolEntry>) -> Self {
        let mut shelves: CategoryTable<Vec<Mutex<PoolEntry>>> = CategoryTable::default();
        let mut index: HashMap<PuzzleKey, usize> = HashMap::new();
        for entry in entries {
            let shelf = &mut shelves[entry.key.category];
            if index.contains_key(&entry.key) {
                warn!("Duplicated pool entry {}", entry.key);
                continue;
            }
            index.insert(entry.key, shelf.len());
            shelf.push(Mutex::new(entry));
        }
        Self { shelves, index }
    }

    /// Create a pool with one available entry per key.
    pub fn new(keys: impl IntoIterator<Item = PuzzleKey>) -> Self {
        Self::from_entries(keys.into_iter().map(PoolEntry::new))
    }

    /// Seed a pool with all the puzzles of a source.
    pub fn from_source(source: &dyn PuzzleSource) -> Result<Self, DatasetError> {
        let mut keys: Vec<PuzzleKey> = Vec::new();
        for category in Category::ALL {
            let found: Vec<PuzzleKey> = source.keys(category)?;
            info!("Seeding {} {category} puzzles", found.len());
            keys.extend(found);
        }
        Ok(Self::new(keys))
    }

    /// Number of entries in the given category.
    pub fn len(&self, category: Category) -> usize {
        self.shelves[category].len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: PuzzleKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Number of entries per category.
    pub fn totals(&self) -> CategoryTable<u64> {
        CategoryTable::from_fn(|c| self.len(c) as u64)
    }

    /// Keys of the given category.
    pub fn keys(&self, category: Category) -> Vec<PuzzleKey> {
        self.shelves[category].iter().map(|e| lock(e).key).collect()
    }

    /// Number of entries with the given status, in the given category.
    ///
    /// Waits for every entry of the category in turn.
    pub fn count(&self, category: Category, status: EntryStatus) -> usize {
        self.shelves[category]
            .iter()
            .filter(|&e| lock(e).status == status)
            .count()
    }

    /// Lock the entry of the given key, waiting for other holders.
    pub fn lock(&self, key: PuzzleKey) -> Result<MutexGuard<'_, PoolEntry>, PoolError> {
        let position: usize = *self.index.get(&key).ok_or(PoolError::UnknownPuzzle(key))?;
        Ok(lock(&self.shelves[key.category][position]))
    }

    /// Copy all the entries, in category then insertion order.
    pub fn entries(&self) -> Vec<PoolEntry> {
        self.shelves
            .iter()
            .flat_map(|(_, shelf)| shelf.iter().map(|e| lock(e).clone()))
            .collect()
    }

    /// Assign an instance of the category to the player.
    ///
    /// The caller must hold the user row lock of `progress`. If the player already has an
    /// assignment in the category, that assignment is returned again. Otherwise an available
    /// entry is picked, starting the scan at a random position and skipping the entries locked
    /// by concurrent callers. The chosen entry and the user row are updated together.
    pub fn assign(
        &self,
        progress: &mut UserProgress,
        category: Category,
    ) -> Result<PoolEntry, PoolError> {
        let user: UserId = progress.user;

        if let Some(key) = progress.assigned[category] {
            let entry = self.lock(key)?;
            if entry.is_assigned_to(user) {
                debug!("User {user} keeps puzzle {key}");
                return Ok(entry.clone());
            }
            warn!("Stale assignment {key} for user {user}, picking another puzzle");
            progress.assigned[category] = None;
        }

        let shelf: &[Mutex<PoolEntry>] = &self.shelves[category];
        if shelf.is_empty() {
            return Err(PoolError::PoolExhausted(category));
        }

        let start: usize = rand::rng().random_range(0..shelf.len());
        let mut skipped: usize = 0;
        for offset in 0..shelf.len() {
            let row: &Mutex<PoolEntry> = &shelf[(start + offset) % shelf.len()];
            let mut entry: MutexGuard<'_, PoolEntry> = match row.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    skipped += 1;
                    continue;
                }
            };
            if entry.status != EntryStatus::Available {
                continue;
            }
            entry.transition(EntryStatus::Assigned, Some(user));
            progress.assigned[category] = Some(entry.key);
            progress.updated_at = entry.updated_at;
            info!("Puzzle {} assigned to user {user}", entry.key);
            return Ok(entry.clone());
        }

        if skipped > 0 {
            debug!("No free {category} puzzle for user {user}, {skipped} locked entries skipped");
            Err(PoolError::ConcurrencyConflict(category))
        } else {
            Err(PoolError::PoolExhausted(category))
        }
    }

    /// Give back all the outstanding assignments of the player.
    ///
    /// The caller must hold the user row lock of `progress`. Return the released keys, which is
    /// empty when the player had no assignment.
    pub fn release(&self, progress: &mut UserProgress) -> Result<Vec<PuzzleKey>, PoolError> {
        let user: UserId = progress.user;
        let mut released: Vec<PuzzleKey> = Vec::new();
        for (_, slot) in progress.assigned.iter_mut() {
            let Some(key) = slot.take() else {
                continue;
            };
            let mut entry = self.lock(key)?;
            if entry.is_assigned_to(user) {
                entry.transition(EntryStatus::Available, None);
                info!("Puzzle {key} released by user {user}");
                released.push(key);
            } else {
                warn!("Dropping stale assignment {key} for user {user}");
            }
        }
        if !released.is_empty() {
            progress.updated_at = Utc::now();
        }
        Ok(released)
    }

    /// Mark a locked entry as solved by the player.
    ///
    /// The caller must hold both the entry lock and the user row lock of `progress`. The entry
    /// must be assigned to the player.
    pub fn mark_solved(
        &self,
        entry: &mut PoolEntry,
        progress: &mut UserProgress,
    ) -> Result<(), PoolError> {
        let user: UserId = progress.user;
        if !entry.is_assigned_to(user) {
            return Err(PoolError::NotAssigned {
                key: entry.key,
                user,
            });
        }
        entry.transition(EntryStatus::Solved, Some(user));
        let category: Category = entry.key.category;
        if progress.assigned[category] == Some(entry.key) {
            progress.assigned[category] = None;
        }
        info!("Puzzle {} solved by user {user}", entry.key);
        Ok(())
    }
}
