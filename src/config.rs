/*
config.rs

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

//! Configuration constants and runtime settings.
//!
//! The settings are read from an optional JSON file. Missing keys take their default value. The
//! signing secret is never stored in the file: it comes from the `HMAC_SECRET_KEY` environment
//! variable.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use crate::puzzle::Category;
use crate::signing::{Signer, SignerError};

pub const COPYRIGHT_NOTICE: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nCopyright 2025 Hervé Quatremain\n",
    "License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>.\n",
    "This is free software: you are free to change and redistribute it.\n",
    "There is NO WARRANTY, to the extent permitted by law."
);

/// Environment variable that holds the signing secret.
pub const SECRET_ENV: &str = "HMAC_SECRET_KEY";

/// Minimum plausible time per move, in milliseconds.
pub const MIN_TIME_PER_MOVE_MS: u64 = 100;

/// Number of records per page.
pub const PAGE_SIZE: usize = 10;

/// Minimum delay between two saves, in seconds.
pub const SAVE_INTERVAL_SECS: u64 = 30;

/// Runtime settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Directory with one sub-directory of Boxoban files per category.
    pub dataset_dir: PathBuf,

    /// Directory where the service state is saved.
    pub data_dir: PathBuf,

    pub min_time_per_move_ms: u64,

    pub page_size: usize,

    /// Number of pending cache invalidation events before new events are dropped.
    pub invalidation_capacity: usize,

    /// Minimum delay between two saves of a changed state. 0 saves after each change.
    pub save_interval_secs: u64,

    /// Category that personal levels are drawn from.
    pub personal_category: Category,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("boxoban-levels"),
            data_dir: PathBuf::from("."),
            min_time_per_move_ms: MIN_TIME_PER_MOVE_MS,
            page_size: PAGE_SIZE,
            invalidation_capacity: 64,
            save_interval_secs: SAVE_INTERVAL_SECS,
            personal_category: Category::Unfiltered,
        }
    }
}

impl Settings {
    /// Read the settings file. A missing file gives the default settings.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file: File = match File::open(path) {
            Ok(f) => f,
            Err(error) => match error.kind() {
                ErrorKind::NotFound => {
                    debug!("No settings file {path:?}, using the defaults");
                    return Ok(Self::default());
                }
                _ => return Err(Box::new(error)),
            },
        };
        let settings: Settings = serde_json::from_reader(BufReader::new(file))?;
        info!("Settings loaded from {path:?}");
        Ok(settings)
    }
}

/// Build the signer from the secret in the environment.
pub fn signer_from_env() -> Result<Signer, SignerError> {
    let secret: String = env::var(SECRET_ENV).unwrap_or_default();
    Signer::new(secret.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"pageSize": 25, "dataDir": "/var/lib/boxpool", "personalCategory": "hard"}"#,
        )
        .unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.personal_category, Category::Hard);
        assert_eq!(settings.save_interval_secs, SAVE_INTERVAL_SECS);
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/boxpool"));
        assert_eq!(settings.min_time_per_move_ms, MIN_TIME_PER_MOVE_MS);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "page size: 25").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
