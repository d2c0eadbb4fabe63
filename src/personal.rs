/*
personal.rs

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


//! Personal level pools.
//!
//! Next to the shared pool, each player has an endless pool of their own. These levels are not
//! identified by a puzzle key but by their number in the journey of the player: level 1, level
//! 2, and so on. The next level is produced by a [`LevelGenerator`] when the player asks for it,
//! and only one level is in progress at a time.
//!
//! The code of a [`LevelSubmission`] covers the level number instead of a puzzle key:
//! `{user_id}:{level_number}:{steps}:{elapsed_ms}:{moves}`. Submitting the level in progress
//! completes it and advances the level count of the player. Submitting a completed level again
//! is a replay: it is verified against that level, it never advances the count, and the record
//! of the level keeps the better steps and time.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::board::{Grid, GridError};
use crate::ledger::lock;
use crate::ledger::records::Score;
use crate::puzzle::{DatasetError, PuzzleKey, PuzzleSource, UserId};
use crate::signing::canonical_payload;
use crate::verify::{Claim, Rejection, Verifier};

/// Errors from the level generators.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("no puzzle to draw the level from")]
    Empty,

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Errors from the personal pool operations.
#[derive(Debug, Error)]
pub enum PersonalError {
    #[error("user {0} has no level in progress")]
    NoActiveLevel(UserId),

    #[error("user {user} has no level {number} to submit")]
    UnknownLevel { user: UserId, number: u64 },

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error("malformed level: {0}")]
    Malformed(#[from] GridError),

    #[error("submission rejected: {0}")]
    Rejected(#[from] Rejection),
}

/// Source of new personal levels.
pub trait LevelGenerator: Send + Sync {
    /// Return the rows of a new level for the player.
    fn generate(&self, user: UserId, number: u64) -> Result<Vec<String>, GeneratorError>;
}

/// Generator that draws the levels at random from a puzzle source.
pub struct DatasetGenerator {
    source: Arc<dyn PuzzleSource>,
    keys: Vec<PuzzleKey>,
}

impl DatasetGenerator {
    pub fn new(source: Arc<dyn PuzzleSource>, keys: Vec<PuzzleKey>) -> Self {
        Self { source, keys }
    }
}

impl LevelGenerator for DatasetGenerator {
    fn generate(&self, user: UserId, number: u64) -> Result<Vec<String>, GeneratorError> {
        let key: PuzzleKey = *self
            .keys
            .choose(&mut rand::rng())
            .ok_or(GeneratorError::Empty)?;
        debug!("Level {number} of user {user} drawn from {key}");
        Ok(self.source.load(key)?.grid().to_rows())
    }
}

/// Best result on a personal level.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelRecord {
    pub steps: u32,
    pub elapsed_ms: u64,
    pub moves: String,

    /// First completion.
    pub completed_at: DateTime<Utc>,
}

impl LevelRecord {
    pub fn score(&self) -> Score {
        Score::new(self.steps, self.elapsed_ms)
    }
}

/// Level of a personal pool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalLevel {
    /// Position in the journey of the player, starting at 1.
    pub number: u64,

    /// Compacted grid rows.
    pub rows: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// None while the level is in progress.
    pub record: Option<LevelRecord>,
}

impl PersonalLevel {
    pub fn is_completed(&self) -> bool {
        self.record.is_some()
    }

    pub fn grid(&self) -> Result<Grid, GridError> {
        Grid::parse(self.rows.as_slice())
    }
}

/// Personal pool of a player.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalProgress {
    pub user: UserId,

    /// Number of completed levels.
    pub level_count: u64,

    /// Levels, in number order.
    pub levels: Vec<PersonalLevel>,
}

impl PersonalProgress {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            level_count: 0,
            levels: Vec::new(),
        }
    }

    /// Number of the level to complete next.
    pub fn next_number(&self) -> u64 {
        self.level_count + 1
    }

    /// Level in progress, if any.
    pub fn current(&self) -> Option<&PersonalLevel> {
        self.levels
            .last()
            .filter(|l| l.number == self.next_number() && !l.is_completed())
    }

    pub fn level(&self, number: u64) -> Option<&PersonalLevel> {
        self.levels.iter().find(|l| l.number == number)
    }

    fn level_mut(&mut self, number: u64) -> Option<&mut PersonalLevel> {
        self.levels.iter_mut().find(|l| l.number == number)
    }
}

/// Solution to a personal level.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelSubmission {
    #[serde(rename = "userId")]
    pub user: UserId,

    pub level_number: u64,
    pub steps: u32,
    pub elapsed_ms: u64,
    pub moves: String,
    pub code: String,
}

impl LevelSubmission {
    /// Canonical payload for the submission.
    pub fn payload(&self) -> String {
        canonical_payload(
            self.user,
            &self.level_number,
            self.steps,
            self.elapsed_ms,
            &self.moves,
        )
    }
}

impl Claim for LevelSubmission {
    fn user(&self) -> UserId {
        self.user
    }

    fn payload(&self) -> String {
        LevelSubmission::payload(self)
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn moves(&self) -> &str {
        &self.moves
    }

    fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

/// Outcome of an accepted personal submission.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelReceipt {
    pub accepted: bool,

    /// The level was already completed. The level count did not change.
    pub replay: bool,

    /// The record of the level now holds the submitted steps and time.
    pub improved: bool,

    /// Number of completed levels after the submission.
    pub level_count: u64,
}

/// Personal pools of all the players.
pub struct PersonalPools {
    users: Mutex<HashMap<UserId, Arc<Mutex<PersonalProgress>>>>,
    generator: Arc<dyn LevelGenerator>,
}

impl PersonalPools {
    pub fn new(generator: Arc<dyn LevelGenerator>) -> Self {
        Self::from_rows(generator, Vec::new())
    }

    /// Rebuild the pools from saved rows.
    pub fn from_rows(generator: Arc<dyn LevelGenerator>, rows: Vec<PersonalProgress>) -> Self {
        let users = rows
            .into_iter()
            .map(|row| (row.user, Arc::new(Mutex::new(row))))
            .collect();
        Self {
            users: Mutex::new(users),
            generator,
        }
    }

    /// Return the row of the player, creating it if needed.
    fn user(&self, user: UserId) -> Arc<Mutex<PersonalProgress>> {
        Arc::clone(
            lock(&self.users)
                .entry(user)
                .or_insert_with(|| Arc::new(Mutex::new(PersonalProgress::new(user)))),
        )
    }

    /// Copy of the pool of the player. Unknown players have an empty pool.
    pub fn progress(&self, user: UserId) -> PersonalProgress {
        let row = lock(&self.users).get(&user).cloned();
        match row {
            Some(row) => lock(&row).clone(),
            None => PersonalProgress::new(user),
        }
    }

    /// Copy all the rows, in user order.
    pub fn rows(&self) -> Vec<PersonalProgress> {
        let rows: Vec<Arc<Mutex<PersonalProgress>>> =
            lock(&self.users).values().cloned().collect();
        let mut rows: Vec<PersonalProgress> = rows.iter().map(|r| lock(r).clone()).collect();
        rows.sort_by_key(|r| r.user);
        rows
    }

    /// Return the level in progress, generating the next one if needed.
    ///
    /// Without `discard`, calling the operation again returns the same level. With `discard`,
    /// the level in progress is replaced by a new one with the same number.
    pub fn current(
        &self,
        user: UserId,
        discard: bool,
    ) -> Result<(PersonalLevel, bool), PersonalError> {
        let row = self.user(user);
        let mut progress = lock(&row);
        let number: u64 = progress.next_number();

        if let Some(level) = progress.current() {
            if !discard {
                return Ok((level.clone(), false));
            }
        } else if discard {
            return Err(PersonalError::NoActiveLevel(user));
        }

        let rows: Vec<String> = self.generator.generate(user, number)?;
        Grid::parse(rows.as_slice())?;
        let level = PersonalLevel {
            number,
            rows,
            created_at: Utc::now(),
            record: None,
        };
        if discard {
            info!("User {user} discarded level {number}");
            progress.levels.pop();
        } else {
            debug!("Level {number} created for user {user}");
        }
        progress.levels.push(level.clone());
        Ok((level, true))
    }

    /// Verify a submission and record it.
    ///
    /// The code and the timing are checked first, then the moves are replayed on the level
    /// under the row lock of the player.
    pub fn submit(
        &self,
        verifier: &Verifier,
        submission: &LevelSubmission,
    ) -> Result<LevelReceipt, PersonalError> {
        let user: UserId = submission.user;
        let number: u64 = submission.level_number;
        verifier.check_claim(submission)?;

        let row = self.user(user);
        let mut progress = lock(&row);
        let next: u64 = progress.next_number();
        let level: &mut PersonalLevel = match progress.level_mut(number) {
            Some(l) if l.is_completed() || number == next => l,
            _ => return Err(PersonalError::UnknownLevel { user, number }),
        };
        if let Err(rejection) = verifier.check_solution(&level.grid()?, &submission.moves) {
            warn!("Submission for level {number} by user {user} rejected: {rejection}");
            return Err(rejection.into());
        }

        let score = Score::new(submission.steps, submission.elapsed_ms);
        let (replay, improved): (bool, bool) = match &mut level.record {
            Some(record) => {
                let improved: bool = score < record.score();
                if improved {
                    record.steps = submission.steps;
                    record.elapsed_ms = submission.elapsed_ms;
                    record.moves = submission.moves.clone();
                }
                (true, improved)
            }
            None => {
                level.record = Some(LevelRecord {
                    steps: submission.steps,
                    elapsed_ms: submission.elapsed_ms,
                    moves: submission.moves.clone(),
                    completed_at: Utc::now(),
                });
                (false, true)
            }
        };
        if !replay {
            progress.level_count += 1;
            info!("User {user} completed level {number}");
        }
        Ok(LevelReceipt {
            accepted: true,
            replay,
            improved,
            level_count: progress.level_count,
        })
    }
}
