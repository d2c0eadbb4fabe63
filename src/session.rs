/*
session.rs

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

//! Manage the status of a puzzle being played.
//!
//! A [`Session`] is owned by the player's runtime. The server never sees the intermediate
//! states: it only receives the final [`Submission`] built by [`Session::submission`], and
//! replays the moves by itself.

use std::time::{Duration, Instant};

use crate::board::{Direction, Grid, MoveOutcome};
use crate::personal::LevelSubmission;
use crate::puzzle::{PuzzleKey, UserId};
use crate::signing::{Signer, canonical_payload};
use crate::verify::Submission;

/// Number of steps and time spent on the puzzle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GameStats {
    pub steps: u32,
    pub elapsed_ms: u64,
}

/// Status of a puzzle being played.
#[derive(Debug, Clone)]
pub struct Session {
    /// Starting grid, used to restart the puzzle.
    initial: Grid,

    /// Current grid.
    grid: Grid,

    /// Number of legal moves so far.
    steps: u32,

    /// Time of the first move. The timer does not run before the player moves.
    start_time: Option<Instant>,

    /// Time spent when the puzzle was solved.
    final_duration: Option<Duration>,

    /// Last direction the player tried, legal or not. Used for animations.
    last_direction: Option<Direction>,

    /// Legal moves, in order.
    moves: Vec<Direction>,
}

impl Session {
    /// Create a [`Session`] object for the given starting grid.
    pub fn new(grid: Grid) -> Self {
        Self {
            initial: grid.clone(),
            grid,
            steps: 0,
            start_time: None,
            final_duration: None,
            last_direction: None,
            moves: Vec::new(),
        }
    }

    /// Restart the puzzle from its starting grid.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial.clone());
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    /// Whether the puzzle is solved. No more moves are accepted after that.
    pub fn is_completed(&self) -> bool {
        self.final_duration.is_some()
    }

    /// Legal moves so far, as a move string.
    pub fn moves(&self) -> String {
        Direction::encode_moves(&self.moves)
    }

    /// Time spent on the puzzle. The time stops when the puzzle is solved.
    pub fn elapsed(&self) -> Duration {
        match (self.final_duration, self.start_time) {
            (Some(d), _) => d,
            (None, Some(start)) => start.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    pub fn stats(&self) -> GameStats {
        GameStats {
            steps: self.steps,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    /// Try to move the player.
    ///
    /// A blocked move only records the direction. A legal move increments the step counter and
    /// is added to the move string.
    pub fn apply(&mut self, direction: Direction) -> MoveOutcome {
        if self.is_completed() {
            return MoveOutcome::Blocked;
        }
        let start: Instant = *self.start_time.get_or_insert_with(Instant::now);
        self.last_direction = Some(direction);

        let outcome: MoveOutcome = self.grid.move_player(direction);
        if outcome.moved() {
            self.steps += 1;
            self.moves.push(direction);
            if self.grid.is_solved() {
                self.final_duration = Some(start.elapsed());
            }
        }
        outcome
    }

    /// Build the signed submission for the current state.
    pub fn submission(&self, signer: &Signer, user: UserId, key: PuzzleKey) -> Submission {
        let stats: GameStats = self.stats();
        let moves: String = self.moves();
        let payload: String =
            canonical_payload(user, &key, stats.steps, stats.elapsed_ms, &moves);
        Submission {
            user,
            key,
            steps: stats.steps,
            elapsed_ms: stats.elapsed_ms,
            code: signer.sign(&payload),
            moves,
        }
    }

    /// Build the signed submission for a personal level.
    pub fn level_submission(
        &self,
        signer: &Signer,
        user: UserId,
        level_number: u64,
    ) -> LevelSubmission {
        let stats: GameStats = self.stats();
        let mut submission = LevelSubmission {
            user,
            level_number,
            steps: stats.steps,
            elapsed_ms: stats.elapsed_ms,
            moves: self.moves(),
            code: String::new(),
        };
        submission.code = signer.sign(&submission.payload());
        submission
    }
}
