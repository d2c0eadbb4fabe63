/*
application.rs

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

//! Request/response application.
//!
//! The application restores the saved state on startup, answers JSON-lines requests until the
//! input is closed, and saves the state on shutdown.
//!
//! While running, a changed state is saved at most once per save interval. Requests that change
//! nothing never trigger a save.

use log::{debug, info, warn};
use std::error::Error;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{Settings, signer_from_env};
use crate::protocol::handle_line;
use crate::puzzle::{DirectoryDataset, PuzzleSource};
use crate::saver::state::{PoolState, SaverState};
use crate::service::PuzzleService;
use crate::verify::Verifier;

pub struct BoxpoolApplication {
    service: PuzzleService,
    saver: SaverState,
    save_interval: Duration,
}

impl BoxpoolApplication {
    /// Build the service from the settings, restoring the saved state if there is one.
    pub fn startup(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        let verifier: Verifier = Verifier::new(signer_from_env()?, settings.min_time_per_move_ms);
        let source: Arc<dyn PuzzleSource> =
            Arc::new(DirectoryDataset::new(settings.dataset_dir.clone()));
        let saver: SaverState = SaverState::new(settings.data_dir.clone());
        Self::with_parts(source, verifier, settings, saver)
    }

    /// Build the application from its parts.
    pub fn with_parts(
        source: Arc<dyn PuzzleSource>,
        verifier: Verifier,
        settings: &Settings,
        saver: SaverState,
    ) -> Result<Self, Box<dyn Error>> {
        debug!("Getting the saved state");
        let saved: Option<PoolState> = match saver.get_state() {
            Ok(state) => state,
            Err(error) => {
                warn!("Error getting the saved state: {error}");
                // Delete the file in error, the pool is seeded again from the dataset
                saver.delete_save();
                None
            }
        };

        let service: PuzzleService = match saved {
            Some(state) => PuzzleService::from_state(source, verifier, settings, state),
            None => {
                info!("No saved state, seeding the pool from the dataset");
                PuzzleService::new(source, verifier, settings)?
            }
        };
        Ok(Self {
            service,
            saver,
            save_interval: Duration::from_secs(settings.save_interval_secs),
        })
    }

    pub fn service(&self) -> &PuzzleService {
        &self.service
    }

    /// Save the state of the service if it changed. Return whether it was saved.
    pub fn save(&self) -> bool {
        let Some(state) = self.service.state_if_changed() else {
            debug!("State unchanged, not saving");
            return false;
        };
        match self.saver.save_state(&state) {
            Ok(()) => true,
            Err(error) => {
                warn!("Error saving the state: {error}");
                // Try again on the next save
                self.service.mark_changed();
                false
            }
        }
    }

    /// Answer the requests from `input` until it is closed.
    ///
    /// A changed state is saved when the save interval has elapsed since the last save.
    pub fn run(&self, input: impl BufRead, mut output: impl Write) -> Result<(), Box<dyn Error>> {
        let mut last_save: Instant = Instant::now();
        for line in input.lines() {
            let line: String = line?;
            if line.trim().is_empty() {
                continue;
            }
            let response: String = handle_line(&self.service, &line);
            writeln!(output, "{response}")?;
            output.flush()?;
            if last_save.elapsed() >= self.save_interval && self.save() {
                last_save = Instant::now();
            }
        }
        Ok(())
    }

    /// Save the state before exiting.
    pub fn shutdown(self) {
        debug!("Saving the state");
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::{Category, MemoryDataset, PuzzleKey};
    use crate::signing::Signer;
    use std::fs;
    use std::io::Cursor;

    fn source() -> Arc<dyn PuzzleSource> {
        let mut dataset = MemoryDataset::new();
        for i in 0..3 {
            dataset.insert(
                PuzzleKey::new(Category::Hard, 1, i),
                &["#####", "#@$.#", "#####"],
            );
        }
        Arc::new(dataset)
    }

    fn app_with(dir: &std::path::Path, save_interval_secs: u64) -> BoxpoolApplication {
        let verifier = Verifier::new(Signer::new(b"k").unwrap(), 100);
        let settings = Settings {
            save_interval_secs,
            ..Settings::default()
        };
        BoxpoolApplication::with_parts(
            source(),
            verifier,
            &settings,
            SaverState::new(dir.to_path_buf()),
        )
        .unwrap()
    }

    fn app(dir: &std::path::Path) -> BoxpoolApplication {
        app_with(dir, 0)
    }

    fn run(app: &BoxpoolApplication, requests: &str) {
        let mut output: Vec<u8> = Vec::new();
        app.run(Cursor::new(requests.to_string()), &mut output).unwrap();
    }

    #[test]
    fn test_run_saves_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let first = app(dir.path());
        let input = Cursor::new(
            "{\"op\":\"requestAssignment\",\"userId\":5,\"category\":\"hard\"}\n\n{\"op\":\"nope\"}\n",
        );
        let mut output: Vec<u8> = Vec::new();
        first.run(input, &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"ok":true"#));
        assert!(lines[1].starts_with(r#"{"ok":false"#));
        let key = first.service().user_progress(5).assigned[Category::Hard].unwrap();
        first.shutdown();

        let second = app(dir.path());
        assert_eq!(
            second.service().user_progress(5).assigned[Category::Hard],
            Some(key)
        );
    }

    #[test]
    fn test_requests_that_change_nothing_do_not_save() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");
        let application = app(dir.path());
        let assign = "{\"op\":\"requestAssignment\",\"userId\":5,\"category\":\"hard\"}\n";

        run(&application, assign);
        assert!(state_file.exists());
        fs::remove_file(&state_file).unwrap();

        // Same assignment again, then reads and a rejected submission
        run(&application, assign);
        run(
            &application,
            "{\"op\":\"userProgress\",\"userId\":5}\n{\"op\":\"globalProgress\"}\n",
        );
        run(
            &application,
            "{\"op\":\"submitSolution\",\"userId\":5,\"puzzleKey\":\"hard-1-0\",\"steps\":1,\"elapsedMs\":900,\"moves\":\"r\",\"code\":\"00\"}\n",
        );
        assert!(!state_file.exists());
        application.shutdown();
        assert!(!state_file.exists());

        let application = app(dir.path());
        run(&application, "{\"op\":\"release\",\"userId\":5}\n");
        assert!(!state_file.exists());
        run(&application, assign);
        assert!(state_file.exists());
    }

    #[test]
    fn test_saves_are_spaced_out() {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");
        let application = app_with(dir.path(), 3600);
        run(
            &application,
            "{\"op\":\"requestAssignment\",\"userId\":5,\"category\":\"hard\"}\n",
        );
        assert!(!state_file.exists());
        application.shutdown();
        assert!(state_file.exists());
    }

    #[test]
    fn test_corrupted_state_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("state.json"), "not json").unwrap();
        let application = app(dir.path());
        assert_eq!(application.service().pool().len(Category::Hard), 3);
        assert!(!dir.path().join("state.json").exists());
    }
}
