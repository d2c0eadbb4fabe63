/*
dataset.rs

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

//! Read puzzles from a dataset.
//!
//! Datasets are read-only. The [`DirectoryDataset`] reads puzzle files in the Boxoban format from
//! a directory tree organized as `<category>/<file_index>.txt`. In a file, each puzzle starts with
//! a `; <number>` line followed by the rows of the puzzle:
//!
//! ```text
//! ; 0
//! ##########
//! #@ $  .  #
//! ##########
//!
//! ; 1
//! ...
//! ```
//!
//! The [`MemoryDataset`] keeps the puzzles in memory.

use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::PuzzleInstance;
use super::category::Category;
use super::key::PuzzleKey;
use crate::board::GridError;

/// Errors when reading puzzles.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("puzzle {0} not found in the dataset")]
    NotFound(PuzzleKey),

    #[error("puzzle {key} is malformed: {source}")]
    Malformed { key: PuzzleKey, source: GridError },
}

/// Source of puzzle instances.
pub trait PuzzleSource: Send + Sync {
    /// Return the textual rows of the given puzzle.
    fn rows(&self, key: PuzzleKey) -> Result<Vec<String>, DatasetError>;

    /// Return the keys of all the puzzles in the given category.
    fn keys(&self, category: Category) -> Result<Vec<PuzzleKey>, DatasetError>;

    /// Return the validated [`PuzzleInstance`] for the given key.
    fn load(&self, key: PuzzleKey) -> Result<PuzzleInstance, DatasetError> {
        let rows: Vec<String> = self.rows(key)?;
        PuzzleInstance::new(key, rows).map_err(|source| DatasetError::Malformed { key, source })
    }
}

/// Split the content of a Boxoban file into puzzles.
///
/// Lines before the first `;` line are ignored. Blank lines are ignored.
pub fn split_puzzles(text: &str) -> Vec<Vec<String>> {
    let mut puzzles: Vec<Vec<String>> = Vec::new();
    for line in text.lines() {
        let line: &str = line.trim_end_matches('\r');
        if line.starts_with(';') {
            puzzles.push(Vec::new());
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Some(p) = puzzles.last_mut() {
            p.push(line.to_string());
        }
    }
    puzzles
}

/// Dataset stored in a directory.
pub struct DirectoryDataset {
    /// Directory that contains one subdirectory per category.
    root: PathBuf,
}

impl DirectoryDataset {
    /// Create a [`DirectoryDataset`] object.
    pub fn new(root: PathBuf) -> Self {
        debug!("Dataset directory: {root:?}");
        Self { root }
    }

    /// Path of a dataset file. Boxoban files are named with three digits, `000.txt`.
    fn file_path(&self, category: Category, file_index: u32) -> PathBuf {
        let dir: PathBuf = self.root.join(category.as_str());
        let padded: PathBuf = dir.join(format!("{file_index:03}.txt"));
        if padded.exists() {
            padded
        } else {
            dir.join(format!("{file_index}.txt"))
        }
    }

    fn read(path: &Path) -> Result<String, DatasetError> {
        fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl PuzzleSource for DirectoryDataset {
    fn rows(&self, key: PuzzleKey) -> Result<Vec<String>, DatasetError> {
        let path: PathBuf = self.file_path(key.category, key.file_index);
        let text: String = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(DatasetError::NotFound(key));
            }
            Err(source) => return Err(DatasetError::Io { path, source }),
        };
        split_puzzles(&text)
            .into_iter()
            .nth(key.level_index as usize)
            .ok_or(DatasetError::NotFound(key))
    }

    fn keys(&self, category: Category) -> Result<Vec<PuzzleKey>, DatasetError> {
        let mut dir: PathBuf = self.root.clone();
        dir.push(category.as_str());

        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            // A category without a directory has no puzzles
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(DatasetError::Io { path: dir, source }),
        };

        let mut keys: Vec<PuzzleKey> = Vec::new();
        for entry in entries {
            let path: PathBuf = entry
                .map_err(|source| DatasetError::Io {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.extension().is_none_or(|e| e != "txt") {
                continue;
            }
            let Some(file_index) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            let count: usize = split_puzzles(&Self::read(&path)?).len();
            keys.extend((0..count as u32).map(|i| PuzzleKey::new(category, file_index, i)));
        }
        keys.sort();
        debug!("Found {} puzzles for category {category}", keys.len());
        Ok(keys)
    }
}

/// Dataset stored in memory.
#[derive(Debug, Default)]
pub struct MemoryDataset {
    puzzles: BTreeMap<PuzzleKey, Vec<String>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a puzzle.
    pub fn insert<S: AsRef<str>>(&mut self, key: PuzzleKey, rows: &[S]) {
        self.puzzles
            .insert(key, rows.iter().map(|r| r.as_ref().to_string()).collect());
    }
}

impl PuzzleSource for MemoryDataset {
    fn rows(&self, key: PuzzleKey) -> Result<Vec<String>, DatasetError> {
        self.puzzles
            .get(&key)
            .cloned()
            .ok_or(DatasetError::NotFound(key))
    }

    fn keys(&self, category: Category) -> Result<Vec<PuzzleKey>, DatasetError> {
        Ok(self
            .puzzles
            .keys()
            .filter(|k| k.category == category)
            .copied()
            .collect())
    }
}
