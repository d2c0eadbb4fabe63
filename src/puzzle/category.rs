/*
category.rs

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

//! Puzzle categories.
//!
//! The shared pool is partitioned by [`Category`]. Counters that exist once per category are
//! stored in a [`CategoryTable`], indexed by the category itself, so that no code has to select
//! a counter from the category name.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use strum_macros::FromRepr;

use super::KeyError;

/// Difficulty bucket of the puzzle pool.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Copy,
    Clone,
    PartialOrd,
    Ord,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    FromRepr,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum Category {
    #[default]
    Medium,
    Hard,
    Unfiltered,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 3;

    /// All the categories, in their numeric order.
    pub const ALL: [Category; Category::COUNT] =
        [Category::Medium, Category::Hard, Category::Unfiltered];

    /// Name of the category, also used as the dataset directory name and in puzzle keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Medium => "medium",
            Category::Hard => "hard",
            Category::Unfiltered => "unfiltered",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| KeyError::UnknownCategory(s.to_string()))
    }
}

/// One value per [`Category`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTable<T> {
    values: [T; Category::COUNT],
}

impl<T> CategoryTable<T> {
    /// Create a table from a function that computes the value of each category.
    pub fn from_fn(f: impl FnMut(Category) -> T) -> Self {
        Self {
            values: Category::ALL.map(f),
        }
    }

    /// Iterate over the categories and their values.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().zip(self.values.iter())
    }

    /// Iterate over the categories and mutable references to their values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Category, &mut T)> {
        Category::ALL.into_iter().zip(self.values.iter_mut())
    }
}

impl<T> Index<Category> for CategoryTable<T> {
    type Output = T;

    fn index(&self, category: Category) -> &T {
        &self.values[category as usize]
    }
}

impl<T> IndexMut<Category> for CategoryTable<T> {
    fn index_mut(&mut self, category: Category) -> &mut T {
        &mut self.values[category as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
            assert_eq!(Category::from_repr(c as usize), Some(c));
        }
        assert!("easy".parse::<Category>().is_err());
    }

    #[test]
    fn test_table() {
        let mut t: CategoryTable<u64> = CategoryTable::default();
        t[Category::Hard] += 2;
        t[Category::Unfiltered] += 1;
        assert_eq!(t[Category::Medium], 0);
        assert_eq!(t[Category::Hard], 2);
        let total: u64 = t.iter().map(|(_, v)| *v).sum();
        assert_eq!(total, 3);
    }
}
