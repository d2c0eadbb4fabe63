/*
protocol.rs

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

//! JSON-lines request and response format.
//!
//! Each request is one JSON object on one line, with the operation in the `op` field:
//!
//! ```text
//! {"op":"requestAssignment","userId":7,"category":"medium"}
//! {"op":"submitSolution","userId":7,"puzzleKey":"medium-0-420","steps":4,"elapsedMs":900,"moves":"rrdd","code":"…"}
//! {"op":"release","userId":7}
//! {"op":"userProgress","userId":7}
//! {"op":"globalProgress"}
//! {"op":"records","userId":7,"category":"hard","sortBy":"steps","sortOrder":"asc","page":2}
//! {"op":"personalLevel","userId":7,"discard":false}
//! {"op":"submitLevel","userId":7,"levelNumber":3,"steps":4,"elapsedMs":900,"moves":"rrdd","code":"…"}
//! {"op":"personalProgress","userId":7}
//! ```
//!
//! Each response is one JSON object on one line: `{"ok":true,"result":…}` or
//! `{"ok":false,"error":"…","exhausted":false}`.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ledger::RecordQuery;
use crate::personal::LevelSubmission;
use crate::puzzle::{Category, UserId};
use crate::service::{PuzzleService, ServiceError};
use crate::verify::Submission;

/// Request from a client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    RequestAssignment { user_id: UserId, category: Category },

    SubmitSolution(Submission),

    #[serde(rename_all = "camelCase")]
    Release { user_id: UserId },

    #[serde(rename_all = "camelCase")]
    UserProgress { user_id: UserId },

    /// Global progress of one category, or of all of them.
    GlobalProgress {
        #[serde(default)]
        category: Option<Category>,
    },

    #[serde(rename_all = "camelCase")]
    Records {
        user_id: UserId,
        #[serde(flatten)]
        query: RecordQuery,
    },

    /// Personal level in progress. `discard` replaces it with a new one.
    #[serde(rename_all = "camelCase")]
    PersonalLevel {
        user_id: UserId,
        #[serde(default)]
        discard: bool,
    },

    SubmitLevel(LevelSubmission),

    #[serde(rename_all = "camelCase")]
    PersonalProgress { user_id: UserId },
}

/// Response to a client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Success {
        ok: bool,
        result: Value,
    },
    Failure {
        ok: bool,
        error: String,
        exhausted: bool,
    },
}

impl Response {
    fn success(result: Value) -> Self {
        Response::Success { ok: true, result }
    }

    fn failure(error: String, exhausted: bool) -> Self {
        Response::Failure {
            ok: false,
            error,
            exhausted,
        }
    }
}

/// Build the response for the result of an operation.
fn respond<T: Serialize>(result: Result<T, ServiceError>) -> Response {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(v) => Response::success(v),
            Err(error) => {
                warn!("Cannot serialize the result: {error}");
                Response::failure(format!("cannot serialize the result: {error}"), false)
            }
        },
        Err(error) => Response::failure(error.to_string(), error.is_exhausted()),
    }
}

/// Run a request against the service.
pub fn dispatch(service: &PuzzleService, request: &Request) -> Response {
    debug!("Request: {request:?}");
    match request {
        Request::RequestAssignment { user_id, category } => {
            respond(service.request_assignment(*user_id, *category))
        }
        Request::SubmitSolution(submission) => respond(service.submit_solution(submission)),
        Request::Release { user_id } => respond(service.release(*user_id)),
        Request::UserProgress { user_id } => respond(Ok(service.user_progress(*user_id))),
        Request::GlobalProgress { category } => {
            let rows: Vec<_> = match category {
                Some(c) => vec![service.global_progress(*c)],
                None => Category::ALL
                    .iter()
                    .map(|c| service.global_progress(*c))
                    .collect(),
            };
            respond(Ok(rows))
        }
        Request::Records { user_id, query } => respond(Ok(service.records(*user_id, query))),
        Request::PersonalLevel { user_id, discard } => {
            respond(service.personal_level(*user_id, *discard))
        }
        Request::SubmitLevel(submission) => respond(service.submit_level(submission)),
        Request::PersonalProgress { user_id } => {
            respond(Ok(service.personal_progress(*user_id)))
        }
    }
}

/// Parse and run one request line. Return the response line.
pub fn handle_line(service: &PuzzleService, line: &str) -> String {
    let response: Response = match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(service, &request),
        Err(error) => {
            warn!("Invalid request: {error}");
            Response::failure(format!("invalid request: {error}"), false)
        }
    };
    match serde_json::to_string(&response) {
        Ok(t) => t,
        Err(error) => format!(r#"{{"ok":false,"error":"{error}","exhausted":false}}"#),
    }
}
