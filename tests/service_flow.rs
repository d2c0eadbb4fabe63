/*
service_flow.rs

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

use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use boxpool::board::Direction;
use boxpool::config::Settings;
use boxpool::ledger::{RecordQuery, SortBy, SortOrder};
use boxpool::pool::EntryStatus;
use boxpool::protocol::handle_line;
use boxpool::puzzle::{Category, DirectoryDataset, PuzzleKey, PuzzleSource};
use boxpool::session::Session;
use boxpool::signing::Signer;
use boxpool::verify::{Rejection, Submission, Verifier};
use boxpool::{Invalidation, PuzzleService, ServiceError};

const MIN_TIME: u64 = 100;

/// Two boxes and two goals. `rrdd` solves it.
const LEVELS: &str = "; 0
######
#@$ .#
#  $ #
#    #
#  . #
######

; 1
######
#@$ .#
#  $ #
#    #
#  . #
######

; 2
######
#@$ .#
#  $ #
#    #
#  . #
######
";

fn dataset() -> (tempfile::TempDir, Arc<dyn PuzzleSource>) {
    let dir = tempfile::tempdir().unwrap();
    for category in ["medium", "hard"] {
        fs::create_dir(dir.path().join(category)).unwrap();
        fs::write(dir.path().join(category).join("0.txt"), LEVELS).unwrap();
    }
    fs::write(dir.path().join("medium").join("1.txt"), LEVELS).unwrap();
    let source: Arc<dyn PuzzleSource> = Arc::new(DirectoryDataset::new(dir.path().to_path_buf()));
    (dir, source)
}

fn service() -> (tempfile::TempDir, PuzzleService) {
    let (dir, source) = dataset();
    let verifier = Verifier::new(Signer::new(b"integration secret").unwrap(), MIN_TIME);
    let service = PuzzleService::new(source, verifier, &Settings::default()).unwrap();
    (dir, service)
}

fn signed(
    service: &PuzzleService,
    user: u64,
    key: PuzzleKey,
    moves: &str,
    elapsed_ms: u64,
) -> Submission {
    let mut submission = Submission {
        user,
        key,
        steps: moves.len() as u32,
        elapsed_ms,
        moves: moves.to_string(),
        code: String::new(),
    };
    submission.code = service.verifier().signer().sign(&submission.payload());
    submission
}

#[test]
fn end_to_end() {
    let (_dir, service) = service();
    let events = service.invalidations();
    assert_eq!(service.pool().len(Category::Medium), 6);

    let assignment = service.request_assignment(42, Category::Medium).unwrap();
    assert_eq!(assignment.ordinal, 1);

    // Play the puzzle the way a client does
    let grid = boxpool::board::Grid::parse(assignment.grid.as_slice()).unwrap();
    let mut session = Session::new(grid);
    for d in Direction::parse_moves("rrdd").unwrap() {
        session.apply(d);
    }
    assert!(session.is_completed());
    let mut submission =
        session.submission(service.verifier().signer(), 42, assignment.puzzle_key);
    submission.elapsed_ms = 4 * MIN_TIME;
    submission.code = service.verifier().signer().sign(&submission.payload());

    let before = service.global_progress(Category::Medium).solved_count;
    let receipt = service.submit_solution(&submission).unwrap();
    assert!(receipt.accepted);
    assert!(!receipt.already_solved);
    assert!(receipt.next_puzzle_key.is_some());
    assert_eq!(
        service.global_progress(Category::Medium).solved_count,
        before + 1
    );
    assert_eq!(service.global_progress(Category::Hard).solved_count, 0);
    assert_eq!(
        service.pool().lock(assignment.puzzle_key).unwrap().status,
        EntryStatus::Solved
    );

    let received: HashSet<Invalidation> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(received.contains(&Invalidation::UserData(42)));
    assert!(received.contains(&Invalidation::Records(42)));
    assert!(received.contains(&Invalidation::GlobalProgress(Category::Medium)));

    let page = service.records(42, &RecordQuery::default());
    assert_eq!(page.total_records, 1);
    assert_eq!(page.records[0].moves, "rrdd");
}

#[test]
fn tampering_is_detected() {
    let (_dir, service) = service();
    let key = service
        .request_assignment(1, Category::Hard)
        .unwrap()
        .puzzle_key;
    let original = signed(&service, 1, key, "rrdd", 1000);

    for position in 0..original.moves.len() {
        let mut tampered = original.clone();
        let mut letters: Vec<char> = tampered.moves.chars().collect();
        letters[position] = if letters[position] == 'u' { 'd' } else { 'u' };
        tampered.moves = letters.into_iter().collect();
        assert!(matches!(
            service.submit_solution(&tampered),
            Err(ServiceError::Rejected(Rejection::TamperedPayload))
        ));
    }

    let mut tampered = original.clone();
    tampered.steps = 5;
    assert!(matches!(
        service.submit_solution(&tampered),
        Err(ServiceError::Rejected(Rejection::TamperedPayload))
    ));

    let mut tampered = original.clone();
    tampered.elapsed_ms = 1001;
    assert!(matches!(
        service.submit_solution(&tampered),
        Err(ServiceError::Rejected(Rejection::TamperedPayload))
    ));

    assert!(service.submit_solution(&original).unwrap().accepted);
}

#[test]
fn timing_floor_and_wrong_solution() {
    let (_dir, service) = service();
    let key = service
        .request_assignment(1, Category::Medium)
        .unwrap()
        .puzzle_key;

    let fast = signed(&service, 1, key, "rrdd", 4 * MIN_TIME - 1);
    assert_eq!(
        service.submit_solution(&fast).unwrap_err().to_string(),
        "submission rejected: 399 ms is too fast for 4 moves (at least 400 ms expected)"
    );

    let wrong = signed(&service, 1, key, "rrd", 1000);
    assert!(matches!(
        service.submit_solution(&wrong),
        Err(ServiceError::Rejected(Rejection::InvalidSolution))
    ));

    assert_eq!(service.user_progress(1).total_solved, 0);
    assert_eq!(service.global_progress(Category::Medium).solved_count, 0);
}

#[test]
fn concurrent_players() {
    let (_dir, service) = service();
    let total = service.pool().len(Category::Medium);
    let players = total as u64 + 1;
    let barrier = Barrier::new(players as usize);

    let results: Vec<Result<PuzzleKey, ServiceError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..players)
            .map(|user| {
                let service = &service;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    service
                        .request_assignment(user, Category::Medium)
                        .map(|a| a.puzzle_key)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let keys: HashSet<PuzzleKey> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .copied()
        .collect();
    assert_eq!(keys.len(), total);
    let failures: Vec<&ServiceError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].is_exhausted());
}

#[test]
fn concurrent_solutions_are_counted_once_each() {
    let (_dir, service) = service();
    let players: u64 = 4;
    let barrier = Barrier::new(players as usize);

    thread::scope(|s| {
        for user in 0..players {
            let service = &service;
            let barrier = &barrier;
            s.spawn(move || {
                let key = service
                    .request_assignment(user, Category::Medium)
                    .unwrap()
                    .puzzle_key;
                let submission = signed(service, user, key, "rrdd", 1000);
                barrier.wait();
                // The retry must not be counted again
                assert!(!service.submit_solution(&submission).unwrap().already_solved);
                assert!(service.submit_solution(&submission).unwrap().already_solved);
            });
        }
    });

    assert_eq!(
        service.global_progress(Category::Medium).solved_count,
        players
    );
    assert_eq!(
        service.pool().count(Category::Medium, EntryStatus::Solved),
        players as usize
    );
    for user in 0..players {
        assert_eq!(service.user_progress(user).total_solved, 1);
    }
}

#[test]
fn json_lines_session() {
    let (_dir, service) = service();
    let response = handle_line(
        &service,
        r#"{"op":"requestAssignment","userId":9,"category":"medium"}"#,
    );
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["result"]["ordinal"], 1);
    let key: PuzzleKey = value["result"]["puzzleKey"].as_str().unwrap().parse().unwrap();

    let submission = signed(&service, 9, key, "rrdd", 2000);
    let mut request = serde_json::to_value(&submission).unwrap();
    request["op"] = "submitSolution".into();
    let response = handle_line(&service, &request.to_string());
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"]["accepted"], true);
    assert_eq!(value["result"]["alreadySolved"], false);

    let response = handle_line(
        &service,
        r#"{"op":"records","userId":9,"sortBy":"steps","sortOrder":"asc"}"#,
    );
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"]["totalRecords"], 1);
    assert_eq!(value["result"]["records"][0]["puzzleKey"], key.to_string());

    let response = handle_line(&service, r#"{"op":"globalProgress","category":"medium"}"#);
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"][0]["solvedCount"], 1);
    assert_eq!(value["result"][0]["totalCount"], 6);

    let response = handle_line(&service, r#"{"op":"release","userId":9}"#);
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"].as_array().unwrap().len(), 1);

    let response = handle_line(&service, r#"{"op":"submitSolution"}"#);
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["ok"], false);
}

#[test]
fn records_query_over_several_solutions() {
    let (_dir, service) = service();
    for elapsed in [3000, 1000, 2000] {
        let key = service
            .request_assignment(5, Category::Medium)
            .unwrap()
            .puzzle_key;
        let submission = signed(&service, 5, key, "rrdd", elapsed);
        service.submit_solution(&submission).unwrap();
    }
    let key = service.request_assignment(5, Category::Hard).unwrap().puzzle_key;
    service
        .submit_solution(&signed(&service, 5, key, "rrdd", 500))
        .unwrap();

    let query = RecordQuery {
        category: Some(Category::Medium),
        sort_by: SortBy::TimeMs,
        sort_order: SortOrder::Asc,
        page: 1,
    };
    let page = service.records(5, &query);
    let times: Vec<u64> = page.records.iter().map(|r| r.elapsed_ms).collect();
    assert_eq!(times, vec![1000, 2000, 3000]);

    let progress = service.user_progress(5);
    assert_eq!(progress.total_solved, 4);
    assert_eq!(progress.solved[Category::Medium], 3);
    assert_eq!(progress.solved[Category::Hard], 1);
    assert_eq!(
        service.request_assignment(5, Category::Hard).unwrap().ordinal,
        5
    );
}

#[test]
fn personal_levels_over_json_lines() {
    let (_dir, source) = dataset();
    let settings = Settings {
        personal_category: Category::Hard,
        ..Settings::default()
    };
    let verifier = Verifier::new(Signer::new(b"integration secret").unwrap(), MIN_TIME);
    let service = PuzzleService::new(source, verifier, &settings).unwrap();

    let response = handle_line(&service, r#"{"op":"personalLevel","userId":4}"#);
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["result"]["number"], 1);
    let rows: Vec<String> = serde_json::from_value(value["result"]["rows"].clone()).unwrap();

    let mut session = Session::new(boxpool::board::Grid::parse(rows.as_slice()).unwrap());
    for d in Direction::parse_moves("rrdd").unwrap() {
        session.apply(d);
    }
    let mut submission = session.level_submission(service.verifier().signer(), 4, 1);
    submission.elapsed_ms = 1000;
    submission.code = service.verifier().signer().sign(&submission.payload());
    let mut request = serde_json::to_value(&submission).unwrap();
    request["op"] = "submitLevel".into();
    let response = handle_line(&service, &request.to_string());
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"]["replay"], false);
    assert_eq!(value["result"]["levelCount"], 1);

    // A replay at the same speed keeps the first record
    let response = handle_line(&service, &request.to_string());
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"]["replay"], true);
    assert_eq!(value["result"]["improved"], false);

    handle_line(&service, r#"{"op":"personalLevel","userId":4}"#);
    let response = handle_line(&service, r#"{"op":"personalLevel","userId":4,"discard":true}"#);
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"]["number"], 2);

    let response = handle_line(&service, r#"{"op":"personalProgress","userId":4}"#);
    let value: serde_json::Value = serde_json::from_str(&response).unwrap();
    assert_eq!(value["result"]["levelCount"], 1);
    assert_eq!(value["result"]["levels"].as_array().unwrap().len(), 2);
}
