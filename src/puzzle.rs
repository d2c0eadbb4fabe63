/*
puzzle.rs

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

//! Puzzle identification and puzzle datasets.
//!
//! A [`PuzzleInstance`] is an immutable puzzle layout with its [`key::PuzzleKey`] identifier.
//! Instances are read from a [`dataset::PuzzleSource`], which is a read-only collaborator: the
//! pool only stores keys and loads the layout when a player needs it.

pub mod category;
pub mod dataset;
pub mod key;

use thiserror::Error;

use crate::board::{Grid, GridError};

pub use category::{Category, CategoryTable};
pub use dataset::{DatasetError, DirectoryDataset, MemoryDataset, PuzzleSource};
pub use key::PuzzleKey;

/// User identifier, provided by the account management layer.
pub type UserId = u64;

/// Errors when parsing categories and puzzle keys.
#[derive(Debug, Error, PartialEq)]
pub enum KeyError {
    #[error("unknown category {0:?}")]
    UnknownCategory(String),

    #[error("malformed puzzle key {0:?}")]
    Malformed(String),
}

/// Immutable puzzle.
#[derive(Debug, Clone)]
pub struct PuzzleInstance {
    pub key: PuzzleKey,

    /// Source rows, as read from the dataset.
    pub rows: Vec<String>,

    /// Parsed and compacted grid.
    grid: Grid,
}

impl PuzzleInstance {
    /// Create a [`PuzzleInstance`] object after validating the puzzle rows.
    pub fn new(key: PuzzleKey, rows: Vec<String>) -> Result<Self, GridError> {
        let grid: Grid = Grid::parse(&rows)?;
        Ok(Self { key, rows, grid })
    }

    /// Starting grid of the puzzle.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}
