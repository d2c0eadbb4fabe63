/*
verify.rs

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

//! Verify the solutions submitted by the players.
//!
//! A [`Submission`] is untrusted. The [`Verifier`] runs three checks, cheapest first:
//!
//! 1. The code must match the HMAC of the canonical payload (see [`crate::signing`]). Any change
//!    to the user, puzzle, steps, time, or moves after the code was computed is detected.
//! 2. The reported time must be at least `moves * min_time_per_move_ms`. This rejects instant,
//!    scripted submissions. It is a heuristic: a fast human solving a short puzzle is not
//!    distinguishable from a slow script.
//! 3. The moves are replayed on the starting grid of the puzzle, and the final grid must be
//!    solved.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Direction, Grid};
use crate::puzzle::{PuzzleKey, UserId};
use crate::signing::{Signer, canonical_payload};

/// Reasons for rejecting a submission.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Rejection {
    #[error("the submission code does not match its content")]
    TamperedPayload,

    #[error("{elapsed_ms} ms is too fast for {moves} moves (at least {minimum_ms} ms expected)")]
    ImplausibleTiming {
        moves: usize,
        elapsed_ms: u64,
        minimum_ms: u64,
    },

    #[error("invalid move {letter:?} at position {position}")]
    MalformedMoves { letter: char, position: usize },

    #[error("the moves do not solve the puzzle")]
    InvalidSolution,
}

/// Solution reported by a player.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "userId")]
    pub user: UserId,

    #[serde(rename = "puzzleKey")]
    pub key: PuzzleKey,

    /// Number of steps reported by the player.
    pub steps: u32,

    /// Time reported by the player.
    pub elapsed_ms: u64,

    /// Move string (`u`, `d`, `l`, `r`).
    pub moves: String,

    /// Code computed by the player's runtime.
    pub code: String,
}

impl Submission {
    /// Canonical payload for the submission.
    pub fn payload(&self) -> String {
        canonical_payload(
            self.user,
            &self.key,
            self.steps,
            self.elapsed_ms,
            &self.moves,
        )
    }
}

/// Signed solution, whatever identifies the puzzle.
pub trait Claim {
    fn user(&self) -> UserId;

    /// Canonical payload covered by the code.
    fn payload(&self) -> String;

    fn code(&self) -> &str;

    fn moves(&self) -> &str;

    fn elapsed_ms(&self) -> u64;
}

impl Claim for Submission {
    fn user(&self) -> UserId {
        self.user
    }

    fn payload(&self) -> String {
        Submission::payload(self)
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

/// Submission verifier.
#[derive(Debug, Clone)]
pub struct Verifier {
    signer: Signer,

    /// Minimum time per move, in milliseconds.
    min_time_per_move_ms: u64,
}

impl Verifier {
    /// Create a [`Verifier`] object.
    pub fn new(signer: Signer, min_time_per_move_ms: u64) -> Self {
        Self {
            signer,
            min_time_per_move_ms,
        }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Minimum plausible time for the given number of moves.
    pub fn minimum_time_ms(&self, moves: usize) -> u64 {
        (moves as u64).saturating_mul(self.min_time_per_move_ms)
    }

    /// Verify the code of the submission.
    pub fn check_code(&self, claim: &impl Claim) -> Result<(), Rejection> {
        if self.signer.verify(&claim.payload(), claim.code()) {
            Ok(())
        } else {
            Err(Rejection::TamperedPayload)
        }
    }

    /// Verify that the reported time is plausible for the number of moves.
    pub fn check_timing(&self, claim: &impl Claim) -> Result<(), Rejection> {
        let moves: usize = claim.moves().chars().count();
        let minimum_ms: u64 = self.minimum_time_ms(moves);
        if claim.elapsed_ms() < minimum_ms {
            return Err(Rejection::ImplausibleTiming {
                moves,
                elapsed_ms: claim.elapsed_ms(),
                minimum_ms,
            });
        }
        Ok(())
    }

    /// Run the checks that do not need the puzzle: code, then timing.
    pub fn check_claim(&self, claim: &impl Claim) -> Result<(), Rejection> {
        self.check_code(claim)?;
        self.check_timing(claim)
    }

    /// Replay the moves on the starting grid and verify that the puzzle ends solved.
    pub fn check_solution(&self, start: &Grid, moves: &str) -> Result<(), Rejection> {
        let directions: Vec<Direction> = Direction::parse_moves(moves).map_err(|position| {
            Rejection::MalformedMoves {
                letter: moves.chars().nth(position).unwrap_or_default(),
                position,
            }
        })?;
        if start.replay(&directions).is_solved() {
            Ok(())
        } else {
            Err(Rejection::InvalidSolution)
        }
    }

    /// Run all the checks on the submission, for the given starting grid.
    pub fn verify(&self, start: &Grid, claim: &impl Claim) -> Result<(), Rejection> {
        self.check_claim(claim)?;
        self.check_solution(start, claim.moves())?;
        debug!("Submission by user {} verified", claim.user());
        Ok(())
    }
}
