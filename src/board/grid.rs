/*
grid.rs

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

//! Sokoban grid and push rules.
//!
//! A [`Grid`] is built from the textual puzzle by [`Grid::parse`], which also validates the
//! puzzle. After that, [`Grid::move_player`] and [`Grid::replay`] cannot fail: an illegal move
//! leaves the grid unchanged.

use log::{Level, debug, log_enabled};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::cell::{Cell, Direction};
use super::compact;

/// Errors for malformed puzzles.
#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("the puzzle is empty")]
    Empty,

    #[error("unknown symbol {symbol:?} at column {x}, row {y}")]
    UnknownSymbol { symbol: char, x: usize, y: usize },

    #[error("player not found in the puzzle")]
    NoPlayer,

    #[error("several players in the puzzle (at least {0})")]
    SeveralPlayers(usize),

    #[error("the puzzle has {boxes} boxes and {goals} goals")]
    BoxGoalMismatch { boxes: usize, goals: usize },
}

/// Cell coordinates. `x` is the column and `y` the row.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    /// Return the neighbor position in the given direction, or None if it would be negative.
    fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

/// Result of a move.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The move is illegal. The grid is unchanged.
    Blocked,

    /// The player moved to an empty floor or goal cell.
    Walked,

    /// The player pushed a box and followed it.
    Pushed,
}

impl MoveOutcome {
    /// Whether the player moved (the step counter must be incremented).
    pub fn moved(self) -> bool {
        self != MoveOutcome::Blocked
    }
}

/// Sokoban grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    /// Grid cells, indexed by row and then column. All the rows have the same length.
    cells: Vec<Vec<Cell>>,

    /// Current player position.
    player: Position,
}

impl Grid {
    /// Build a [`Grid`] from the textual rows of a puzzle.
    ///
    /// The rows are compacted first (see [`compact`]).
    ///
    /// # Errors
    ///
    /// The method returns an error when the puzzle contains unknown symbols, when the number of
    /// players is not exactly one, or when there are more boxes than goals.
    pub fn parse<S: AsRef<str>>(raw_rows: &[S]) -> Result<Self, GridError> {
        let raw: Vec<&str> = raw_rows.iter().map(|r| r.as_ref()).collect();
        let symbols: Vec<Vec<char>> = compact::compact(&raw);
        if symbols.is_empty() {
            return Err(GridError::Empty);
        }

        let mut cells: Vec<Vec<Cell>> = Vec::with_capacity(symbols.len());
        let mut player: Option<Position> = None;
        let mut players: usize = 0;
        for (y, row) in symbols.iter().enumerate() {
            let mut cols: Vec<Cell> = Vec::with_capacity(row.len());
            for (x, c) in row.iter().enumerate() {
                let cell: Cell =
                    Cell::from_char(*c).ok_or(GridError::UnknownSymbol { symbol: *c, x, y })?;
                if cell.is_player() {
                    players += 1;
                    player = Some(Position { x, y });
                }
                cols.push(cell);
            }
            cells.push(cols);
        }

        if players > 1 {
            return Err(GridError::SeveralPlayers(players));
        }
        let player: Position = player.ok_or(GridError::NoPlayer)?;

        let grid = Self { cells, player };
        let (boxes, goals) = (grid.count(Cell::is_box), grid.count(Cell::is_goal));
        if boxes > goals {
            return Err(GridError::BoxGoalMismatch { boxes, goals });
        }

        if log_enabled!(Level::Debug) {
            debug!("Parsed puzzle:\n{grid}");
        }
        Ok(grid)
    }

    /// Build a [`Grid`] from a puzzle where rows are separated by new lines.
    pub fn parse_text(text: &str) -> Result<Self, GridError> {
        let rows: Vec<&str> = text.lines().collect();
        Self::parse(&rows)
    }

    pub fn width(&self) -> usize {
        self.cells.first().map_or(0, |r| r.len())
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn player(&self) -> Position {
        self.player
    }

    /// Return the cell at the given position, or None if the position is outside the grid.
    ///
    /// Removed wall cells ([`Cell::Void`]) are reported as outside the grid.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        self.cells
            .get(pos.y)?
            .get(pos.x)
            .copied()
            .filter(|c| *c != Cell::Void)
    }

    fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.y][pos.x] = cell;
    }

    /// Number of cells that match the given predicate.
    pub fn count(&self, predicate: impl Fn(Cell) -> bool) -> usize {
        self.cells.iter().flatten().filter(|c| predicate(**c)).count()
    }

    /// Whether the puzzle is solved: no box stands outside a goal.
    pub fn is_solved(&self) -> bool {
        !self.cells.iter().flatten().any(|c| *c == Cell::Box)
    }

    /// Move the player one cell in the given direction, pushing a box if there is one.
    ///
    /// The move is legal when the destination is inside the grid and is not a wall. When the
    /// destination holds a box, the cell beyond the box must also be inside the grid and must be
    /// an empty floor or goal cell. Only one box can be pushed at a time, and boxes cannot be
    /// pulled.
    pub fn move_player(&mut self, direction: Direction) -> MoveOutcome {
        let from: Position = self.player;
        let Some(to) = from.step(direction) else {
            return MoveOutcome::Blocked;
        };
        let Some(target) = self.get(to) else {
            return MoveOutcome::Blocked;
        };

        let outcome: MoveOutcome = if target.is_open() {
            MoveOutcome::Walked
        } else if target.is_box() {
            let Some(beyond) = to.step(direction) else {
                return MoveOutcome::Blocked;
            };
            match self.get(beyond) {
                Some(c) if c.is_open() => {
                    self.set(beyond, c.with_box());
                    MoveOutcome::Pushed
                }
                _ => return MoveOutcome::Blocked,
            }
        } else {
            return MoveOutcome::Blocked;
        };

        let current: Cell = self.cells[from.y][from.x];
        self.set(from, current.vacated());
        self.set(to, target.with_player());
        self.player = to;
        outcome
    }

    /// Return the grid obtained by playing all the given moves from this grid.
    ///
    /// The grid itself is not modified. Blocked moves are skipped.
    pub fn replay(&self, moves: &[Direction]) -> Grid {
        let mut grid: Grid = self.clone();
        for direction in moves {
            grid.move_player(*direction);
        }
        grid
    }

    /// Return the grid as textual rows. Removed walls are kept as `-`.
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.as_char()).collect())
            .collect()
    }
}

/// Display the grid for terminals. Removed walls are displayed as spaces.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, row) in self.cells.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let line: String = row
                .iter()
                .map(|c| if *c == Cell::Void { ' ' } else { c.as_char() })
                .collect();
            write!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}
