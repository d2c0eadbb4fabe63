/*
lib.rs

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

//! Sokoban puzzle pool.
//!
//! Boxpool hands out Sokoban puzzles from a shared pool, one puzzle per player and per category
//! at a time, and verifies the submitted solutions before crediting them:
//!
//! - [`board`] parses and plays puzzles.
//! - [`pool`] assigns puzzles without handing the same puzzle to two players.
//! - [`verify`] checks the signed submissions by replaying them.
//! - [`ledger`] counts the solved puzzles per player and per category.
//! - [`personal`] gives each player an endless pool of numbered levels.
//! - [`service`] ties them together.

pub mod application;
pub mod board;
pub mod cli_options;
pub mod config;
pub mod ledger;
pub mod personal;
pub mod pool;
pub mod protocol;
pub mod puzzle;
pub mod saver;
pub mod service;
pub mod session;
pub mod signing;
pub mod verify;

pub use service::{Assignment, Invalidation, PuzzleService, ServiceError, SubmitReceipt};
