/*
key.rs

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

//! Puzzle keys.
//!
//! A [`PuzzleKey`] identifies a puzzle of the dataset: the category, the index of the dataset
//! file in the category directory, and the index of the puzzle in that file.
//! Its string form, such as `medium-0-420`, is the identifying segment of the signed payload.

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::KeyError;
use super::category::Category;

/// Identifier of a puzzle instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PuzzleKey {
    pub category: Category,
    pub file_index: u32,
    pub level_index: u32,
}

impl PuzzleKey {
    pub fn new(category: Category, file_index: u32, level_index: u32) -> Self {
        Self {
            category,
            file_index,
            level_index,
        }
    }
}

impl fmt::Display for PuzzleKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.category, self.file_index, self.level_index
        )
    }
}

impl FromStr for PuzzleKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        let (Some(category), Some(file), Some(level), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyError::Malformed(s.to_string()));
        };
        let file_index: u32 = file
            .parse()
            .map_err(|_| KeyError::Malformed(s.to_string()))?;
        let level_index: u32 = level
            .parse()
            .map_err(|_| KeyError::Malformed(s.to_string()))?;
        Ok(Self {
            category: category.parse()?,
            file_index,
            level_index,
        })
    }
}

/// Serialize a [`PuzzleKey`] object as its string form.
impl Serialize for PuzzleKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Deserialize a [`PuzzleKey`] object from its string form.
impl<'de> Deserialize<'de> for PuzzleKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = PuzzleKey;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a puzzle key such as `medium-0-420`")
            }

            fn visit_str<E>(self, value: &str) -> Result<PuzzleKey, E>
            where
                E: de::Error,
            {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}
