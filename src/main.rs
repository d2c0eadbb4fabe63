/*
main.rs

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

use std::io;
use std::process::ExitCode;

use boxpool::application::BoxpoolApplication;
use boxpool::cli_options::{self, Mode};
use log::error;

fn main() -> ExitCode {
    let settings = match cli_options::parse() {
        Mode::Exit(ret) => return ExitCode::from(ret),
        Mode::Serve(settings) => settings,
    };

    let app: BoxpoolApplication = match BoxpoolApplication::startup(&settings) {
        Ok(a) => a,
        Err(e) => {
            error!("Cannot start: {e}");
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    let result = app.run(io::stdin().lock(), io::stdout().lock());
    app.shutdown();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}
