/*
board.rs

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

//! Sokoban grid engine.
//!
//! The engine is a pure state machine with no I/O:
//!
//! * [`cell`] defines the cell alphabet of the textual puzzles and the movement directions.
//! * [`compact`] removes the wall cells that do not border the playing area.
//! * [`grid::Grid`] parses a puzzle, applies moves with the push rules, and detects the solved
//!   state.
//!
//! The same engine is used by the player's [`crate::session::Session`] and by the server-side
//! replay in [`crate::verify`], so both sides agree on what a legal move is.

pub mod cell;
pub mod compact;
pub mod grid;

pub use cell::{Cell, Direction};
pub use grid::{Grid, GridError, MoveOutcome, Position};
