/*
compact.rs

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

//! Remove the walls that do not border the playing area.
//!
//! Dataset puzzles are stored in a fixed frame, and most of them are surrounded by thick wall
//! areas. The compaction marks every wall whose eight neighbors are walls (or outside the puzzle)
//! with the `-` symbol, and then drops the rows and the columns that only contain such cells.
//! Rows are padded with `-` so that the result is rectangular.
//!
//! The pass never touches a non-wall cell, and a `-` cell blocks movement exactly like a wall,
//! so solvability is not affected.

use log::debug;

/// Symbol for the removed wall cells.
pub const VOID: char = '-';

/// Neighbor offsets (column, row), including diagonals.
const NEIGHBORS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Return the symbol at the given coordinates, or None if they are outside the puzzle.
fn symbol_at(rows: &[Vec<char>], x: isize, y: isize) -> Option<char> {
    if x < 0 || y < 0 {
        return None;
    }
    rows.get(y as usize)?.get(x as usize).copied()
}

/// Whether the wall at the given coordinates is only surrounded by other walls.
fn is_buried_wall(rows: &[Vec<char>], x: usize, y: usize) -> bool {
    NEIGHBORS.iter().all(|(dx, dy)| {
        match symbol_at(rows, x as isize + dx, y as isize + dy) {
            Some(c) => c == '#',
            None => true,
        }
    })
}

/// Compact the given puzzle rows.
///
/// The returned matrix is rectangular. An empty input returns an empty matrix.
pub fn compact(raw_rows: &[&str]) -> Vec<Vec<char>> {
    let rows: Vec<Vec<char>> = raw_rows.iter().map(|r| r.chars().collect()).collect();

    // Mark the buried walls
    let mut marked: Vec<Vec<char>> = rows
        .iter()
        .enumerate()
        .map(|(y, row)| {
            row.iter()
                .enumerate()
                .map(|(x, c)| {
                    if *c == '#' && is_buried_wall(&rows, x, y) {
                        VOID
                    } else {
                        *c
                    }
                })
                .collect()
        })
        .collect();

    // Fill the end of the rows to get a rectangular matrix
    let width: usize = marked.iter().map(|r| r.len()).max().unwrap_or(0);
    for row in &mut marked {
        row.resize(width, VOID);
    }

    // Drop the rows with only removed walls
    marked.retain(|row| row.iter().any(|c| *c != VOID));

    // Drop the columns with only removed walls
    let keep: Vec<bool> = (0..width)
        .map(|x| marked.iter().any(|row| row[x] != VOID))
        .collect();
    let compacted: Vec<Vec<char>> = marked
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(keep.iter())
                .filter_map(|(c, k)| if *k { Some(c) } else { None })
                .collect()
        })
        .collect();

    debug!(
        "Compacted puzzle from {}x{} to {}x{}",
        width,
        raw_rows.len(),
        compacted.first().map_or(0, |r| r.len()),
        compacted.len()
    );
    compacted
}
