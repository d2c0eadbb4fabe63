/*
service.rs

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

//! Puzzle service.
//!
//! [`PuzzleService`] is the entry point of the library. It composes the [`LevelPool`], the
//! [`Ledger`], the puzzle source, and the [`Verifier`], and exposes the player operations:
//!
//! - [`PuzzleService::request_assignment`]
//! - [`PuzzleService::submit_solution`]
//! - [`PuzzleService::release`]
//! - [`PuzzleService::user_progress`], [`PuzzleService::global_progress`], and
//!   [`PuzzleService::records`] for the read side.
//! - [`PuzzleService::personal_level`] and [`PuzzleService::submit_level`] for the personal
//!   level pools.
//!
//! Every state change is followed by cache invalidation events on an [`async_channel`] channel.
//! Events are dropped when the channel is full or when nobody listens. State changes also raise
//! a flag, so that [`PuzzleService::state_if_changed`] only copies the state when there is
//! something new to save.

use async_channel::{Receiver, Sender};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::config::Settings;
use crate::ledger::{
    GlobalProgress, Ledger, RecordPage, RecordQuery, SolveRecord, UserProgress, lock,
};
use crate::personal::{
    DatasetGenerator, LevelGenerator, LevelReceipt, LevelSubmission, PersonalError, PersonalLevel,
    PersonalPools, PersonalProgress,
};
use crate::pool::{EntryStatus, LevelPool, PoolEntry, PoolError};
use crate::puzzle::{Category, DatasetError, PuzzleInstance, PuzzleKey, PuzzleSource, UserId};
use crate::saver::state::PoolState;
use crate::verify::{Rejection, Submission, Verifier};

/// Errors from the service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("submission rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Personal(#[from] PersonalError),
}

impl ServiceError {
    /// Whether no puzzle is left to assign.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ServiceError::Pool(e) if e.is_exhausted())
    }
}

/// Cache invalidation event.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Invalidation {
    /// Progress counters or assignments of the player changed.
    UserData(UserId),

    /// Records of the player changed.
    Records(UserId),

    /// Global progress of the category changed.
    GlobalProgress(Category),
}

/// Puzzle assigned to a player.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub puzzle_key: PuzzleKey,

    /// Compacted grid rows.
    pub grid: Vec<String>,

    /// Position of the puzzle in the journey of the player, starting at 1.
    pub ordinal: u64,
}

/// Result of an accepted submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub accepted: bool,

    /// The player had already solved this puzzle. Nothing was counted again.
    pub already_solved: bool,

    /// The record of the puzzle now holds the submitted steps and time.
    pub improved: bool,

    /// Next puzzle assigned in the same category, if any is left.
    pub next_puzzle_key: Option<PuzzleKey>,
}

/// Puzzle distribution service.
pub struct PuzzleService {
    pool: LevelPool,
    ledger: Ledger,
    personal: PersonalPools,
    source: Arc<dyn PuzzleSource>,
    verifier: Verifier,
    page_size: usize,

    /// Player operations share the gate. Taking a copy of the state closes it.
    gate: RwLock<()>,

    /// Set by every state change, cleared by [`PuzzleService::state_if_changed`].
    changed: AtomicBool,

    sender: Sender<Invalidation>,
    receiver: Receiver<Invalidation>,
}

impl PuzzleService {
    /// Create a service with all the puzzles of the source available.
    pub fn new(
        source: Arc<dyn PuzzleSource>,
        verifier: Verifier,
        settings: &Settings,
    ) -> Result<Self, DatasetError> {
        let pool: LevelPool = LevelPool::from_source(source.as_ref())?;
        let ledger: Ledger = Ledger::new(pool.totals());
        Ok(Self::with_parts(
            pool,
            ledger,
            Vec::new(),
            source,
            verifier,
            settings,
        ))
    }

    /// Create a service from a saved state.
    pub fn from_state(
        source: Arc<dyn PuzzleSource>,
        verifier: Verifier,
        settings: &Settings,
        state: PoolState,
    ) -> Self {
        info!(
            "Restoring {} pool entries and {} users saved at {}",
            state.entries.len(),
            state.users.len(),
            state.saved_at
        );
        let pool: LevelPool = LevelPool::from_entries(state.entries);
        let ledger: Ledger = Ledger::from_rows(state.users, state.global);
        // The pool sizes come from the entries, not from the saved counters
        ledger.set_totals(pool.totals());
        Self::with_parts(pool, ledger, state.personal, source, verifier, settings)
    }

    fn with_parts(
        pool: LevelPool,
        ledger: Ledger,
        personal: Vec<PersonalProgress>,
        source: Arc<dyn PuzzleSource>,
        verifier: Verifier,
        settings: &Settings,
    ) -> Self {
        let (sender, receiver) =
            async_channel::bounded::<Invalidation>(settings.invalidation_capacity.max(1));
        let generator = DatasetGenerator::new(
            Arc::clone(&source),
            pool.keys(settings.personal_category),
        );
        Self {
            pool,
            ledger,
            personal: PersonalPools::from_rows(Arc::new(generator), personal),
            source,
            verifier,
            page_size: settings.page_size,
            gate: RwLock::new(()),
            changed: AtomicBool::new(false),
            sender,
            receiver,
        }
    }

    /// Replace the generator of the personal levels.
    pub fn with_generator(mut self, generator: Arc<dyn LevelGenerator>) -> Self {
        self.personal = PersonalPools::from_rows(generator, self.personal.rows());
        self
    }

    pub fn pool(&self) -> &LevelPool {
        &self.pool
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Return a receiver for the cache invalidation events.
    pub fn invalidations(&self) -> Receiver<Invalidation> {
        self.receiver.clone()
    }

    fn enter(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that the state differs from the last copy.
    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::SeqCst);
    }

    fn notify(&self, event: Invalidation) {
        if let Err(e) = self.sender.try_send(event) {
            debug!("Cache invalidation dropped: {e}");
        }
    }

    /// Assign a puzzle under the user row lock. Return the entry and the ordinal.
    fn assign(&self, user: UserId, category: Category) -> Result<(PoolEntry, u64), PoolError> {
        let row = self.ledger.user(user);
        let mut progress = lock(&row);
        let had_assignment: bool = progress.assigned[category].is_some();
        let entry: PoolEntry = self.pool.assign(&mut progress, category)?;
        let ordinal: u64 = progress.ordinal();
        drop(progress);

        if !had_assignment {
            self.mark_changed();
            self.notify(Invalidation::UserData(user));
        }
        Ok((entry, ordinal))
    }

    /// Return the puzzle the player works on in the category, assigning one if needed.
    ///
    /// Calling the operation again without solving or releasing the puzzle returns the same
    /// puzzle.
    pub fn request_assignment(
        &self,
        user: UserId,
        category: Category,
    ) -> Result<Assignment, ServiceError> {
        let _gate = self.enter();
        let (entry, ordinal) = self.assign(user, category)?;
        let instance: PuzzleInstance = self.source.load(entry.key)?;
        Ok(Assignment {
            puzzle_key: entry.key,
            grid: instance.grid().to_rows(),
            ordinal,
        })
    }

    /// Verify a submission and record the solution.
    ///
    /// The code and the timing are checked before the puzzle is read from the source. The pool
    /// transition, the player counters, and the global counter are updated together. When the
    /// puzzle was already solved by the same player, nothing is counted again and the record
    /// only keeps the better steps and time. After a new solution, the next puzzle of the
    /// category is assigned if one is left.
    pub fn submit_solution(&self, submission: &Submission) -> Result<SubmitReceipt, ServiceError> {
        let _gate = self.enter();
        let user: UserId = submission.user;
        let key: PuzzleKey = submission.key;
        let category: Category = key.category;

        if !self.pool.contains(key) {
            return Err(PoolError::UnknownPuzzle(key).into());
        }
        if let Err(rejection) = self.verifier.check_claim(submission) {
            warn!("Submission for {key} by user {user} rejected: {rejection}");
            return Err(rejection.into());
        }
        let instance: PuzzleInstance = self.source.load(key)?;
        if let Err(rejection) = self
            .verifier
            .check_solution(instance.grid(), &submission.moves)
        {
            warn!("Submission for {key} by user {user} rejected: {rejection}");
            return Err(rejection.into());
        }

        {
            let row = self.ledger.user(user);
            let mut progress = lock(&row);
            let mut entry = self.pool.lock(key)?;

            if entry.is_solved_by(user) {
                let improved: bool = progress.records.improve(
                    key,
                    submission.steps,
                    submission.elapsed_ms,
                    &submission.moves,
                );
                if improved {
                    info!("Puzzle {key} replayed by user {user} with a better result");
                    self.mark_changed();
                    self.notify(Invalidation::Records(user));
                } else {
                    info!("Puzzle {key} already solved by user {user}");
                }
                return Ok(SubmitReceipt {
                    accepted: true,
                    already_solved: true,
                    improved,
                    next_puzzle_key: progress.assigned[category],
                });
            }

            self.pool.mark_solved(&mut entry, &mut progress)?;
            progress.credit(SolveRecord {
                puzzle_key: key,
                steps: submission.steps,
                elapsed_ms: submission.elapsed_ms,
                moves: submission.moves.clone(),
                completed_at: Utc::now(),
            });
            self.ledger.global(category).credit();
            self.mark_changed();
        }

        self.notify(Invalidation::UserData(user));
        self.notify(Invalidation::Records(user));
        self.notify(Invalidation::GlobalProgress(category));

        let next_puzzle_key: Option<PuzzleKey> = match self.assign(user, category) {
            Ok((entry, _)) => Some(entry.key),
            Err(e) if e.is_exhausted() => {
                info!("No next {category} puzzle for user {user}: {e}");
                None
            }
            Err(e) => {
                warn!("Cannot assign the next {category} puzzle to user {user}: {e}");
                None
            }
        };

        Ok(SubmitReceipt {
            accepted: true,
            already_solved: false,
            improved: true,
            next_puzzle_key,
        })
    }

    /// Give back the outstanding assignments of the player.
    pub fn release(&self, user: UserId) -> Result<Vec<PuzzleKey>, ServiceError> {
        let _gate = self.enter();
        let row = self.ledger.user(user);
        let released: Vec<PuzzleKey> = self.pool.release(&mut lock(&row))?;
        if !released.is_empty() {
            self.mark_changed();
            self.notify(Invalidation::UserData(user));
        }
        Ok(released)
    }

    /// Return the personal level in progress, generating the next one if needed.
    ///
    /// With `discard`, the level in progress is replaced by a new one with the same number.
    pub fn personal_level(
        &self,
        user: UserId,
        discard: bool,
    ) -> Result<PersonalLevel, ServiceError> {
        let _gate = self.enter();
        let (level, created) = self.personal.current(user, discard)?;
        if created {
            self.mark_changed();
            self.notify(Invalidation::UserData(user));
        }
        Ok(level)
    }

    /// Verify and record a solution to a personal level.
    pub fn submit_level(
        &self,
        submission: &LevelSubmission,
    ) -> Result<LevelReceipt, ServiceError> {
        let _gate = self.enter();
        let receipt: LevelReceipt = self.personal.submit(&self.verifier, submission)?;
        if receipt.improved {
            self.mark_changed();
            if !receipt.replay {
                self.notify(Invalidation::UserData(submission.user));
            }
            self.notify(Invalidation::Records(submission.user));
        }
        Ok(receipt)
    }

    /// Return the personal pool of the player.
    pub fn personal_progress(&self, user: UserId) -> PersonalProgress {
        self.personal.progress(user)
    }

    /// Return the progress of the player. Unknown players have no progress yet.
    pub fn user_progress(&self, user: UserId) -> UserProgress {
        self.ledger
            .user_snapshot(user)
            .unwrap_or_else(|| UserProgress::new(user))
    }

    /// Return the progress of all the players in the category.
    pub fn global_progress(&self, category: Category) -> GlobalProgress {
        self.ledger.global(category).clone()
    }

    /// Return a page of the records of the player.
    pub fn records(&self, user: UserId, query: &RecordQuery) -> RecordPage {
        self.user_progress(user)
            .records
            .query(query, self.page_size)
    }

    /// Number of entries in the given state, for the given category.
    pub fn count(&self, category: Category, status: EntryStatus) -> usize {
        self.pool.count(category, status)
    }

    /// Return a consistent copy of the pool and of the ledger.
    ///
    /// Player operations wait while the copy is taken.
    pub fn state(&self) -> PoolState {
        let _gate = self.close();
        self.changed.store(false, Ordering::SeqCst);
        self.copy_state()
    }

    /// Return a consistent copy of the state if it changed since the last copy.
    pub fn state_if_changed(&self) -> Option<PoolState> {
        let _gate = self.close();
        if !self.changed.swap(false, Ordering::SeqCst) {
            return None;
        }
        Some(self.copy_state())
    }

    /// Copy the state. The caller holds the gate closed.
    fn copy_state(&self) -> PoolState {
        PoolState {
            saved_at: Utc::now(),
            entries: self.pool.entries(),
            users: self.ledger.user_rows(),
            global: self.ledger.global_rows(),
            personal: self.personal.rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::MemoryDataset;
    use crate::session::Session;
    use crate::signing::Signer;
    use crate::personal::GeneratorError;
    use std::sync::atomic::AtomicUsize;

    const LEVEL: [&str; 6] = [
        "######", //
        "#@$ .#", //
        "#  $ #", //
        "#    #", //
        "#  . #", //
        "######",
    ];

    fn dataset(count: u32) -> MemoryDataset {
        let mut dataset = MemoryDataset::new();
        for i in 0..count {
            dataset.insert(PuzzleKey::new(Category::Medium, 0, i), &LEVEL);
        }
        dataset
    }

    fn verifier() -> Verifier {
        Verifier::new(Signer::new(b"test secret").unwrap(), 100)
    }

    fn service(count: u32) -> PuzzleService {
        PuzzleService::new(Arc::new(dataset(count)), verifier(), &Settings::default()).unwrap()
    }

    /// Dataset that counts the puzzles read from it.
    struct CountingSource {
        inner: MemoryDataset,
        loads: AtomicUsize,
    }

    impl PuzzleSource for CountingSource {
        fn rows(&self, key: PuzzleKey) -> Result<Vec<String>, DatasetError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.rows(key)
        }

        fn keys(&self, category: Category) -> Result<Vec<PuzzleKey>, DatasetError> {
            self.inner.keys(category)
        }
    }

    fn level_submission(
        service: &PuzzleService,
        user: UserId,
        number: u64,
        elapsed_ms: u64,
    ) -> LevelSubmission {
        let mut submission = LevelSubmission {
            user,
            level_number: number,
            steps: 4,
            elapsed_ms,
            moves: "rrdd".to_string(),
            code: String::new(),
        };
        submission.code = service.verifier().signer().sign(&submission.payload());
        submission
    }

    fn solve(service: &PuzzleService, user: UserId, key: PuzzleKey, elapsed_ms: u64) -> Submission {
        let instance = service.source.load(key).unwrap();
        let mut session = Session::new(instance.grid().clone());
        for d in "rrdd".chars().filter_map(crate::board::Direction::from_char) {
            session.apply(d);
        }
        assert!(session.is_completed());
        let mut submission = session.submission(service.verifier().signer(), user, key);
        if submission.elapsed_ms != elapsed_ms {
            submission.elapsed_ms = elapsed_ms;
            submission.code = service.verifier().signer().sign(&submission.payload());
        }
        submission
    }

    #[test]
    fn test_assignment_and_submission() {
        let service = service(3);
        let events = service.invalidations();

        let assignment = service.request_assignment(1, Category::Medium).unwrap();
        assert_eq!(assignment.ordinal, 1);
        assert_eq!(assignment.grid[1], "#@$ .#");
        assert_eq!(events.try_recv(), Ok(Invalidation::UserData(1)));

        let again = service.request_assignment(1, Category::Medium).unwrap();
        assert_eq!(again, assignment);
        assert!(events.try_recv().is_err());

        let submission = solve(&service, 1, assignment.puzzle_key, 500);
        let receipt = service.submit_solution(&submission).unwrap();
        assert!(receipt.accepted);
        assert!(!receipt.already_solved);
        let next = receipt.next_puzzle_key.unwrap();
        assert_ne!(next, assignment.puzzle_key);

        let progress = service.user_progress(1);
        assert_eq!(progress.total_solved, 1);
        assert_eq!(progress.solved[Category::Medium], 1);
        assert_eq!(progress.assigned[Category::Medium], Some(next));
        assert_eq!(service.global_progress(Category::Medium).solved_count, 1);
        assert_eq!(service.count(Category::Medium, EntryStatus::Solved), 1);

        let next_assignment = service.request_assignment(1, Category::Medium).unwrap();
        assert_eq!(next_assignment.puzzle_key, next);
        assert_eq!(next_assignment.ordinal, 2);
    }

    #[test]
    fn test_resubmission_counts_once() {
        let service = service(1);
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        let submission = solve(&service, 1, key, 500);
        let first = service.submit_solution(&submission).unwrap();
        assert_eq!(first.next_puzzle_key, None);

        let second = service.submit_solution(&submission).unwrap();
        assert!(second.accepted);
        assert!(second.already_solved);
        assert_eq!(service.user_progress(1).total_solved, 1);
        assert_eq!(service.global_progress(Category::Medium).solved_count, 1);
    }

    #[test]
    fn test_rejections_change_nothing() {
        let service = service(2);
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;

        let mut tampered = solve(&service, 1, key, 500);
        tampered.steps += 1;
        assert!(matches!(
            service.submit_solution(&tampered),
            Err(ServiceError::Rejected(Rejection::TamperedPayload))
        ));

        let too_fast = solve(&service, 1, key, 399);
        assert!(matches!(
            service.submit_solution(&too_fast),
            Err(ServiceError::Rejected(Rejection::ImplausibleTiming { .. }))
        ));

        let progress = service.user_progress(1);
        assert_eq!(progress.total_solved, 0);
        assert_eq!(progress.assigned[Category::Medium], Some(key));
        assert_eq!(service.count(Category::Medium, EntryStatus::Assigned), 1);
    }

    #[test]
    fn test_submission_for_someone_else_puzzle() {
        let service = service(2);
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        let submission = solve(&service, 2, key, 500);
        assert!(matches!(
            service.submit_solution(&submission),
            Err(ServiceError::Pool(PoolError::NotAssigned { user: 2, .. }))
        ));
        assert_eq!(service.user_progress(2).total_solved, 0);
    }

    #[test]
    fn test_exhausted() {
        let service = service(1);
        service.request_assignment(1, Category::Medium).unwrap();
        let error = service.request_assignment(2, Category::Medium).unwrap_err();
        assert!(error.is_exhausted());
        assert!(
            service
                .request_assignment(2, Category::Hard)
                .unwrap_err()
                .is_exhausted()
        );
    }

    #[test]
    fn test_release_and_restore() {
        let service = service(2);
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        assert_eq!(service.release(1).unwrap(), vec![key]);
        assert!(service.release(1).unwrap().is_empty());
        assert_eq!(service.count(Category::Medium, EntryStatus::Available), 2);

        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        let state = service.state();
        let restored = PuzzleService::from_state(
            service.source.clone(),
            service.verifier().clone(),
            &Settings::default(),
            state,
        );
        assert_eq!(
            restored.request_assignment(1, Category::Medium).unwrap().puzzle_key,
            key
        );
        assert_eq!(restored.global_progress(Category::Medium).total_count, 2);
    }

    #[test]
    fn test_restored_counters_follow_the_pool() {
        let service = service(3);
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        let mut state = service.state();
        state.global.retain(|g| g.category != Category::Medium);
        for row in state.global.iter_mut() {
            row.total_count = 0;
        }

        let restored = PuzzleService::from_state(
            service.source.clone(),
            verifier(),
            &Settings::default(),
            state,
        );
        assert_eq!(restored.global_progress(Category::Medium).total_count, 3);
        restored.submit_solution(&solve(&restored, 1, key, 500)).unwrap();
        let global = restored.global_progress(Category::Medium);
        assert_eq!(global.solved_count, 1);
        assert_eq!(global.total_count, 3);
    }

    #[test]
    fn test_only_changes_are_flagged() {
        let service = service(2);
        assert!(service.state_if_changed().is_none());

        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        assert!(service.state_if_changed().is_some());
        service.request_assignment(1, Category::Medium).unwrap();
        service.user_progress(1);
        assert!(service.state_if_changed().is_none());

        let mut tampered = solve(&service, 1, key, 500);
        tampered.elapsed_ms += 1;
        assert!(service.submit_solution(&tampered).is_err());
        assert!(service.state_if_changed().is_none());

        let submission = solve(&service, 1, key, 500);
        service.submit_solution(&submission).unwrap();
        assert!(service.state_if_changed().is_some());
        service.submit_solution(&submission).unwrap();
        assert!(service.state_if_changed().is_none());

        service.release(1).unwrap();
        assert!(service.state_if_changed().is_some());
        service.release(1).unwrap();
        assert!(service.state_if_changed().is_none());

        service.mark_changed();
        assert_eq!(service.state().users.len(), 1);
        assert!(service.state_if_changed().is_none());
    }

    #[test]
    fn test_claim_is_checked_before_loading() {
        let source = Arc::new(CountingSource {
            inner: dataset(2),
            loads: AtomicUsize::new(0),
        });
        let shared: Arc<dyn PuzzleSource> = source.clone();
        let service = PuzzleService::new(shared, verifier(), &Settings::default()).unwrap();
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        let mut submission = solve(&service, 1, key, 500);
        source.loads.store(0, Ordering::SeqCst);

        submission.moves = "uuuu".to_string();
        assert!(matches!(
            service.submit_solution(&submission),
            Err(ServiceError::Rejected(Rejection::TamperedPayload))
        ));
        let too_fast = solve(&service, 1, key, 10);
        source.loads.store(0, Ordering::SeqCst);
        assert!(matches!(
            service.submit_solution(&too_fast),
            Err(ServiceError::Rejected(Rejection::ImplausibleTiming { .. }))
        ));
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);

        let valid = solve(&service, 1, key, 500);
        source.loads.store(0, Ordering::SeqCst);
        service.submit_solution(&valid).unwrap();
        assert!(source.loads.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_replay_keeps_the_better_record() {
        let service = service(2);
        let key = service.request_assignment(1, Category::Medium).unwrap().puzzle_key;
        service.submit_solution(&solve(&service, 1, key, 900)).unwrap();
        service.state_if_changed();

        let slower = service.submit_solution(&solve(&service, 1, key, 1200)).unwrap();
        assert!(slower.already_solved);
        assert!(!slower.improved);
        assert!(service.state_if_changed().is_none());

        let faster = service.submit_solution(&solve(&service, 1, key, 450)).unwrap();
        assert!(faster.already_solved);
        assert!(faster.improved);
        assert!(service.state_if_changed().is_some());

        let progress = service.user_progress(1);
        assert_eq!(progress.total_solved, 1);
        assert_eq!(progress.records.find(key).unwrap().elapsed_ms, 450);
        assert_eq!(service.global_progress(Category::Medium).solved_count, 1);
    }

    #[test]
    fn test_personal_levels() {
        let settings = Settings {
            personal_category: Category::Medium,
            ..Settings::default()
        };
        let service = PuzzleService::new(Arc::new(dataset(2)), verifier(), &settings).unwrap();
        let events = service.invalidations();

        let level = service.personal_level(1, false).unwrap();
        assert_eq!(level.number, 1);
        assert_eq!(level.rows[1], "#@$ .#");
        assert_eq!(events.try_recv(), Ok(Invalidation::UserData(1)));
        assert!(service.state_if_changed().is_some());
        assert_eq!(service.personal_level(1, false).unwrap(), level);
        assert!(service.state_if_changed().is_none());

        let receipt = service.submit_level(&level_submission(&service, 1, 1, 800)).unwrap();
        assert!(!receipt.replay);
        assert_eq!(receipt.level_count, 1);
        let replay = service.submit_level(&level_submission(&service, 1, 1, 600)).unwrap();
        assert!(replay.replay && replay.improved);
        assert_eq!(replay.level_count, 1);
        assert_eq!(service.personal_level(1, false).unwrap().number, 2);
        // The shared pool is untouched
        assert_eq!(service.user_progress(1).total_solved, 0);

        let restored = PuzzleService::from_state(
            service.source.clone(),
            verifier(),
            &settings,
            service.state(),
        );
        let progress = restored.personal_progress(1);
        assert_eq!(progress.level_count, 1);
        assert_eq!(progress.level(1).unwrap().record.as_ref().unwrap().elapsed_ms, 600);
        assert_eq!(restored.personal_level(1, false).unwrap().number, 2);
    }

    struct OneLevel;

    impl LevelGenerator for OneLevel {
        fn generate(&self, _user: UserId, _number: u64) -> Result<Vec<String>, GeneratorError> {
            Ok(vec!["#####".into(), "#@$.#".into(), "#####".into()])
        }
    }

    #[test]
    fn test_custom_generator() {
        let service = service(1).with_generator(Arc::new(OneLevel));
        assert_eq!(service.personal_level(2, false).unwrap().rows[1], "#@$.#");
    }

    #[test]
    fn test_personal_level_without_puzzles() {
        let service = service(1);
        assert!(matches!(
            service.personal_level(1, false),
            Err(ServiceError::Personal(PersonalError::Generator(_)))
        ));
        assert!(service.state_if_changed().is_none());
    }
}
