/*
state.rs

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

//! Save and restore the state of the puzzle service.
//!
//! The saved object is a serialization of the [`PoolState`] object in JSON format by using
//! [`serde`]. The file is first written next to its final location and then renamed, so that an
//! interrupted save never leaves a truncated state file behind.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::{File, remove_file, rename};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use crate::ledger::{GlobalProgress, UserProgress};
use crate::personal::PersonalProgress;
use crate::pool::PoolEntry;

/// Consistent copy of the pool and of the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<PoolEntry>,
    pub users: Vec<UserProgress>,
    pub global: Vec<GlobalProgress>,

    /// Personal level pools. Absent from the states saved before they existed.
    #[serde(default)]
    pub personal: Vec<PersonalProgress>,
}

/// Object to save and restore the service state.
pub struct SaverState {
    /// Absolute path to the save file.
    save_file: PathBuf,
}

impl SaverState {
    /// Create a [`SaverState`] object.
    ///
    /// The provided [`PathBuf`] is the path to the directory where the state must be saved.
    pub fn new(mut data_dir: PathBuf) -> Self {
        data_dir.push("state.json");
        debug!("State file: {data_dir:?}");
        Self {
            save_file: data_dir,
        }
    }

    /// Retrieve the [`PoolState`] object from the state file.
    ///
    /// Return the [`PoolState`] object or None if the state file does not exist.
    pub fn get_state(&self) -> Result<Option<PoolState>, Box<dyn Error>> {
        let file: File = match File::open(&self.save_file) {
            Ok(f) => f,
            Err(error) => match error.kind() {
                ErrorKind::NotFound => return Ok(None),
                _ => return Err(Box::new(error)),
            },
        };
        let reader: BufReader<File> = BufReader::new(file);
        let state: PoolState = serde_json::from_reader(reader)?;
        Ok(Some(state))
    }

    /// Save the provided [`PoolState`] object.
    pub fn save_state(&self, state: &PoolState) -> Result<(), Box<dyn Error>> {
        let tmp_file: PathBuf = self.save_file.with_extension("json.tmp");
        let file: File = File::create(&tmp_file)?;
        let mut writer: BufWriter<File> = BufWriter::new(file);

        serde_json::to_writer(&mut writer, state)?;
        writer.flush()?;
        drop(writer);
        rename(&tmp_file, &self.save_file)?;
        debug!(
            "State saved: {} entries, {} users",
            state.entries.len(),
            state.users.len()
        );
        Ok(())
    }

    /// Delete the state file.
    pub fn delete_save(&self) {
        let _ = remove_file(&self.save_file);
    }
}
