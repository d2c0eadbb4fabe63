/*
cell.rs

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

//! Cells of a Sokoban grid and movement directions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Representation of a grid cell from the textual puzzle.
///
/// - `#` is a [`Cell::Wall`].
/// - ` ` is a [`Cell::Floor`].
/// - `.` is a [`Cell::Goal`].
/// - `$` is a [`Cell::Box`].
/// - `*` is a [`Cell::BoxOnGoal`].
/// - `@` is a [`Cell::Player`].
/// - `+` is a [`Cell::PlayerOnGoal`].
/// - `-` is a [`Cell::Void`], a wall cell removed by the compaction pass. It renders as empty and
///   behaves like the outside of the grid.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Cell {
    Wall,
    #[default]
    Floor,
    Goal,
    Box,
    BoxOnGoal,
    Player,
    PlayerOnGoal,
    Void,
}

impl Cell {
    /// Return the cell for the given puzzle symbol, or None if the symbol is unknown.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '#' => Some(Cell::Wall),
            ' ' => Some(Cell::Floor),
            '.' => Some(Cell::Goal),
            '$' => Some(Cell::Box),
            '*' => Some(Cell::BoxOnGoal),
            '@' => Some(Cell::Player),
            '+' => Some(Cell::PlayerOnGoal),
            '-' => Some(Cell::Void),
            _ => None,
        }
    }

    /// Return the puzzle symbol for the cell.
    pub fn as_char(self) -> char {
        match self {
            Cell::Wall => '#',
            Cell::Floor => ' ',
            Cell::Goal => '.',
            Cell::Box => '$',
            Cell::BoxOnGoal => '*',
            Cell::Player => '@',
            Cell::PlayerOnGoal => '+',
            Cell::Void => '-',
        }
    }

    pub fn is_box(self) -> bool {
        matches!(self, Cell::Box | Cell::BoxOnGoal)
    }

    pub fn is_player(self) -> bool {
        matches!(self, Cell::Player | Cell::PlayerOnGoal)
    }

    /// Whether the cell is a goal, whatever stands on it.
    pub fn is_goal(self) -> bool {
        matches!(self, Cell::Goal | Cell::BoxOnGoal | Cell::PlayerOnGoal)
    }

    /// Whether a box or the player can enter the cell once it is vacated.
    pub fn is_open(self) -> bool {
        matches!(self, Cell::Floor | Cell::Goal)
    }

    /// Cell left behind when the player or a box moves away.
    pub fn vacated(self) -> Cell {
        if self.is_goal() { Cell::Goal } else { Cell::Floor }
    }

    /// Cell after the player steps on it. The cell must be open or hold a box being pushed away.
    pub fn with_player(self) -> Cell {
        if self.is_goal() {
            Cell::PlayerOnGoal
        } else {
            Cell::Player
        }
    }

    /// Cell after a box is pushed on it. The cell must be open.
    pub fn with_box(self) -> Cell {
        if self.is_goal() {
            Cell::BoxOnGoal
        } else {
            Cell::Box
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Player movement.
///
/// In move strings, each direction is a single lower case letter: `u`, `d`, `l`, or `r`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Return the direction for a move string letter. Upper case letters are accepted.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'u' => Some(Direction::Up),
            'd' => Some(Direction::Down),
            'l' => Some(Direction::Left),
            'r' => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Direction::Up => 'u',
            Direction::Down => 'd',
            Direction::Left => 'l',
            Direction::Right => 'r',
        }
    }

    /// Column and row offsets of a one-cell move.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Decode a whole move string.
    ///
    /// Return the position of the first invalid letter as the error.
    pub fn parse_moves(moves: &str) -> Result<Vec<Direction>, usize> {
        moves
            .chars()
            .enumerate()
            .map(|(i, c)| Direction::from_char(c).ok_or(i))
            .collect()
    }

    /// Encode a list of directions as a move string.
    pub fn encode_moves(moves: &[Direction]) -> String {
        moves.iter().map(|d| d.as_char()).collect()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}
