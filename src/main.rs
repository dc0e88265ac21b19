use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::process::ExitCode;

use serde::Deserialize;

use danci_scheduler::config::SchedulerConfig;
use danci_scheduler::logging::{init_tracing, LogSettings};
use danci_scheduler::review::ReviewCoordinator;
use danci_scheduler::session::{RetryPolicy, RetryQueue, SeededRandom};
use danci_scheduler::types::{Grade, ReviewInput, StudyMode};

/// One line of the replay log.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewEvent {
    user_id: String,
    item_id: String,
    quality: u8,
    #[serde(default)]
    mode: StudyMode,
    response_time_ms: Option<i64>,
    timestamp: i64,
    #[serde(default)]
    session_position: usize,
    #[serde(default)]
    session_total: usize,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing(&LogSettings::from_env());

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: danci-scheduler <reviews.jsonl>");
        return ExitCode::from(2);
    };

    let config = match SchedulerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid scheduler configuration");
            return ExitCode::FAILURE;
        }
    };
    let coordinator = match ReviewCoordinator::in_memory(config) {
        Ok(coordinator) => coordinator,
        Err(err) => {
            tracing::error!(error = %err, "failed to build review coordinator");
            return ExitCode::FAILURE;
        }
    };

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            tracing::error!(error = %err, path = %path, "cannot open review log");
            return ExitCode::FAILURE;
        }
    };

    let mut queues: HashMap<String, RetryQueue> = HashMap::new();
    let mut random = SeededRandom::from_entropy();
    let mut failed = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, line = line_no + 1, "read failed");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let event: ReviewEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, line = line_no + 1, "skipping malformed event");
                failed += 1;
                continue;
            }
        };
        let grade = match Grade::from_quality(event.quality, event.mode) {
            Ok(grade) => grade,
            Err(err) => {
                tracing::warn!(error = %err, line = line_no + 1, "skipping event with invalid grade");
                failed += 1;
                continue;
            }
        };
        let mut input = ReviewInput::new(grade);
        if let Some(rt) = event.response_time_ms {
            input = input.with_response_time(rt);
        }

        let queue = queues.entry(event.user_id.clone()).or_default();
        let result = coordinator.submit_session_review(
            &event.user_id,
            &event.item_id,
            input,
            event.session_position,
            event.session_total.max(event.session_position + 1),
            event.timestamp,
            queue,
            RetryPolicy::HalfWay,
            &mut random,
        );

        match result.and_then(|outcome| serde_json::to_string(&outcome).map_err(Into::into)) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::warn!(error = %err, line = line_no + 1, user_id = %event.user_id, "review rejected");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        tracing::warn!(failed, "replay finished with rejected events");
    }
    ExitCode::SUCCESS
}
