/*
cli_options.rs

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

//! Process command-line options.
//!
//! Without `--serve`, the options run a single command and exit. They are intended for
//! operators and for developers preparing puzzle datasets.
//!
//! # Examples
//!
//! List the categories and their progress:
//!
//! ```text
//! $ boxpool --ls
//! medium 12/450000
//! hard 0/3332
//! unfiltered 1/900000
//! ```
//!
//! Replay moves against the third level of a Boxoban file:
//!
//! ```text
//! $ boxpool --check boxoban-levels/medium/000.txt --level 2 --moves rrdd
//! ```
//!
//! Compute the code of a payload with the secret from `HMAC_SECRET_KEY`:
//!
//! ```text
//! $ boxpool --sign '7:medium-0-420:4:900:rrdd'
//! ```

use clap::Parser;
use log::debug;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::board::{Direction, Grid};
use crate::config::{COPYRIGHT_NOTICE, Settings, signer_from_env};
use crate::puzzle::{Category, DirectoryDataset, PuzzleSource, dataset::split_puzzles};
use crate::saver::state::SaverState;
use crate::session::Session;

/// Distribute Sokoban puzzles and verify their solutions.
#[derive(Parser)]
#[command(about, long_about = None, version, long_version = COPYRIGHT_NOTICE)]
struct Args {
    /// List the puzzle categories with their progress
    #[arg(short, long, default_value_t = false)]
    ls: bool,

    /// Boxoban file with the level to check
    #[arg(short, long, requires = "moves")]
    check: Option<PathBuf>,

    /// Moves to replay, as a string of u, d, l, and r letters
    #[arg(short, long, requires = "check")]
    moves: Option<String>,

    /// Level number in the Boxoban file
    #[arg(short = 'n', long, default_value_t = 0, requires = "check")]
    level: usize,

    /// Print the code for a payload, by using the secret from HMAC_SECRET_KEY
    #[arg(long)]
    sign: Option<String>,

    /// Answer JSON-lines requests from the standard input
    #[arg(short, long, default_value_t = false)]
    serve: bool,

    /// Settings file
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Enable debug messages
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

/// What the binary must do after the options are processed.
pub enum Mode {
    /// Exit with the given code.
    Exit(u8),

    /// Run the request/response application.
    Serve(Settings),
}

/// Parse and process command-line options.
pub fn parse() -> Mode {
    let args: Args = Args::parse();

    if args.debug {
        unsafe {
            env::set_var("RUST_LOG", "debug");
        }
    }
    env_logger::init();

    let settings: Settings = match Settings::load(&args.settings) {
        Ok(s) => s,
        Err(error) => {
            eprintln!("Error: {}: {error}", args.settings.display());
            return Mode::Exit(1);
        }
    };
    debug!("Settings: {settings:?}");

    if args.ls {
        return Mode::Exit(list(&settings));
    }

    if let (Some(file), Some(moves)) = (&args.check, &args.moves) {
        return Mode::Exit(check(file, args.level, moves));
    }

    if let Some(payload) = &args.sign {
        return match signer_from_env() {
            Ok(signer) => {
                println!("{}", signer.sign(payload));
                Mode::Exit(0)
            }
            Err(error) => {
                eprintln!("Error: {error}");
                Mode::Exit(1)
            }
        };
    }

    if args.serve {
        return Mode::Serve(settings);
    }

    eprintln!("Nothing to do. Use --help to list the options.");
    Mode::Exit(2)
}

//
// List the categories, from the saved state or from the dataset
//
fn list(settings: &Settings) -> u8 {
    let saver: SaverState = SaverState::new(settings.data_dir.clone());
    match saver.get_state() {
        Ok(Some(state)) => {
            for row in state.global {
                println!("{} {}/{}", row.category, row.solved_count, row.total_count);
            }
            return 0;
        }
        Ok(None) => debug!("No saved state"),
        Err(error) => {
            eprintln!("Error: cannot read the saved state: {error}");
            return 1;
        }
    }

    let dataset: DirectoryDataset = DirectoryDataset::new(settings.dataset_dir.clone());
    for category in Category::ALL {
        match dataset.keys(category) {
            Ok(keys) => println!("{category} 0/{}", keys.len()),
            Err(error) => {
                eprintln!("Error: {error}");
                return 1;
            }
        }
    }
    0
}

//
// Replay moves against a level and print the result
//
fn check(file: &Path, level: usize, moves: &str) -> u8 {
    let text: String = match fs::read_to_string(file) {
        Ok(t) => t,
        Err(error) => {
            eprintln!("Error: {}: {error}", file.display());
            return 1;
        }
    };
    let puzzles: Vec<Vec<String>> = split_puzzles(&text);
    let Some(rows) = puzzles.get(level) else {
        eprintln!(
            "Unknown level {level}. The file contains {} levels.",
            puzzles.len()
        );
        return 1;
    };
    let grid: Grid = match Grid::parse(rows.as_slice()) {
        Ok(g) => g,
        Err(error) => {
            eprintln!("Error: level {level}: {error}");
            return 1;
        }
    };
    let directions: Vec<Direction> = match Direction::parse_moves(moves) {
        Ok(d) => d,
        Err(position) => {
            eprintln!("Error: invalid move at position {position}");
            return 1;
        }
    };

    let mut session: Session = Session::new(grid);
    for direction in directions {
        session.apply(direction);
    }
    println!("{}", session.grid());
    println!();
    println!("Steps: {}", session.steps());
    if session.is_completed() {
        println!("Solved");
        0
    } else {
        println!("Not solved");
        1
    }
}
