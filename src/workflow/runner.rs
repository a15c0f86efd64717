//! Workflow execution: a single run over one [`DataRow`], and a batch
//! run over many rows with aggregated quality scores (spec §4.7).

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{ConnectionError, Error, FieldError, Result, TimeoutError};
use crate::session::{open_session, Session, SessionConfig};
use crate::workflow::artifact::{ArtifactEntry, ArtifactSink, FileArtifactSink, MemoryArtifactSink, StepOutcome};
use crate::workflow::data_row::DataRow;
use crate::workflow::params::substitute;
use crate::workflow::step::{
    AssertStep, CaptureStep, Expectation, FieldTarget, FillStep, LoginStep, NavigateStep, OnError, Step,
    SubmitStep, WorkflowStep,
};
use crate::workflow::Workflow;

/// How often a `Navigate`/`Submit` step polls for the keyboard to lock
/// after sending its AID, before switching to the efficient
/// condition-variable wait for it to unlock again.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub run_id: String,
    pub success: bool,
    pub duration: Duration,
    pub captures: Vec<(String, String)>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchMetrics {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub p50_latency: Duration,
    pub p99_latency: Duration,
    pub correctness_score: f64,
    /// `None` when the batch contains no repeated data rows to compare
    /// against each other (see [`idempotency_score`]).
    pub idempotency_score: Option<f64>,
    pub latency_score: f64,
    pub results: Vec<WorkflowResult>,
}

/// Runs `wf` once against `row`, recording one artifact entry per step
/// to `sink`. The session opened by the workflow's `Login` step is
/// closed before returning, success or failure.
pub fn run_workflow(wf: &Workflow, row: &DataRow, sink: &dyn ArtifactSink) -> WorkflowResult {
    let run_id = Uuid::new_v4().to_string();
    let start = Instant::now();
    let mut session: Option<Session> = None;
    let mut captures = Vec::new();
    let mut error = None;

    for (index, step) in wf.steps.iter().enumerate() {
        let attempts = match step.on_error {
            OnError::Retry(n) => n + 1,
            OnError::Abort | OnError::Continue => 1,
        };

        let mut outcome = Err(Error::Cancelled);
        for _ in 0..attempts {
            outcome = run_step(&mut session, step, row);
            if outcome.is_ok() {
                break;
            }
        }

        let capture = outcome.as_ref().ok().cloned().flatten();
        let step_outcome = match &outcome {
            Ok(_) => StepOutcome::Success,
            Err(e) => StepOutcome::Failure { message: e.to_string() },
        };
        let _ = sink.record(ArtifactEntry {
            run_id: run_id.clone(),
            timestamp: Utc::now(),
            step_index: index,
            step_kind: step.step.kind().to_string(),
            outcome: step_outcome,
            capture: capture.clone(),
        });
        if let Some(c) = capture {
            captures.push(c);
        }

        if let Err(e) = outcome {
            error.get_or_insert_with(|| e.to_string());
            match step.on_error {
                OnError::Continue => continue,
                OnError::Abort | OnError::Retry(_) => break,
            }
        }
    }

    if let Some(mut s) = session {
        s.disconnect();
    }

    WorkflowResult {
        run_id,
        success: error.is_none(),
        duration: start.elapsed(),
        captures,
        error,
    }
}

/// Runs `wf` over `rows` concurrently, bounded by `concurrency`. Each
/// row's workflow runs on its own blocking thread (the session's I/O
/// stays synchronous); only the fan-out scheduling uses `tokio`.
pub fn run_batch(wf: &Workflow, rows: &[DataRow], concurrency: usize) -> BatchMetrics {
    let batch_id = Uuid::new_v4().to_string();
    let sink: Arc<dyn ArtifactSink> = match FileArtifactSink::create(&FileArtifactSink::default_dir(), &batch_id) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            log::warn!("falling back to in-memory artifact sink for batch {batch_id}: {e}");
            Arc::new(MemoryArtifactSink::new())
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(concurrency.max(1))
        .enable_all()
        .build()
        .expect("failed to start batch execution runtime");

    let results: Vec<WorkflowResult> = runtime.block_on(async {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(rows.len());
        for row in rows {
            let permit = semaphore.clone().acquire_owned().await.expect("batch semaphore closed early");
            let wf = wf.clone();
            let row = row.clone();
            let sink = sink.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run_workflow(&wf, &row, sink.as_ref())
            }));
        }
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => log::warn!("workflow task panicked: {e}"),
            }
        }
        results
    });

    aggregate(wf, rows, results)
}

/// Compares two runs' captured values for equality; `1.0` if every
/// capture matches, `0.0` otherwise. Scenario: running the same
/// workflow twice against the same data row and comparing the results.
pub fn idempotency_score(a: &WorkflowResult, b: &WorkflowResult) -> f64 {
    let mut a_sorted = a.captures.clone();
    let mut b_sorted = b.captures.clone();
    a_sorted.sort();
    b_sorted.sort();
    if a_sorted == b_sorted {
        1.0
    } else {
        0.0
    }
}

fn run_step(session: &mut Option<Session>, step: &WorkflowStep, row: &DataRow) -> Result<Option<(String, String)>> {
    if let Step::Login(login) = &step.step {
        *session = Some(apply_login(login, row, step.timeout)?);
        return Ok(None);
    }

    let active = session.as_ref().ok_or_else(|| {
        Error::Connection(ConnectionError::Closed {
            reason: "workflow step requires an active session; the first step must be a Login".into(),
        })
    })?;

    match &step.step {
        Step::Login(_) => unreachable!("handled above"),
        Step::Navigate(navigate) => {
            apply_navigate(active, navigate, step.timeout, row)?;
            Ok(None)
        }
        Step::Fill(fill) => {
            apply_fill(active, fill, row)?;
            Ok(None)
        }
        Step::Submit(submit) => {
            apply_submit(active, submit, step.timeout)?;
            Ok(None)
        }
        Step::Assert(assert) => {
            apply_assert(active, assert, row)?;
            Ok(None)
        }
        Step::Capture(capture) => apply_capture(active, capture).map(Some),
    }
}

fn apply_login(login: &LoginStep, row: &DataRow, timeout: Duration) -> Result<Session> {
    let user = substitute(&login.user, row)?;
    let password = substitute(&login.password, row)?;
    let mut config = SessionConfig::new(login.host.clone(), login.port)
        .with_credentials(user, password)
        .with_tls_env_override();
    if let Some(device_name) = &login.device_name {
        config = config.with_device_name(device_name.clone());
    }
    let mut session = open_session(config);
    session.connect()?;
    session.wait_for_keyboard_unlock(timeout)?;
    Ok(session)
}

fn apply_navigate(session: &Session, navigate: &NavigateStep, timeout: Duration, row: &DataRow) -> Result<()> {
    for key in &navigate.via_keys {
        session.send_key(*key)?;
    }
    poll_lock_then_unlock(session, timeout)?;
    check_expectation(session, &navigate.identifier, row)
}

fn apply_fill(session: &Session, fill: &FillStep, row: &DataRow) -> Result<()> {
    let (target_row, target_col) = resolve_target(session, &fill.target)?;
    session.move_cursor_to(target_row, target_col);
    let value = substitute(&fill.value, row)?;
    session.send_string(&value)
}

fn apply_submit(session: &Session, submit: &SubmitStep, timeout: Duration) -> Result<()> {
    session.send_key(crate::keyboard::Key::Aid(submit.aid))?;
    poll_lock_then_unlock(session, timeout)
}

fn apply_assert(session: &Session, assert: &AssertStep, row: &DataRow) -> Result<()> {
    check_expectation(session, &assert.expectation, row)
}

/// Evaluates one [`Expectation`] against the session's current screen;
/// shared by `Assert` and `Navigate`'s post-unlock screen-identifier check.
fn check_expectation(session: &Session, expectation: &Expectation, row: &DataRow) -> Result<()> {
    let snapshot = session.screen();
    match expectation {
        Expectation::KeyboardUnlocked => {
            if session.oia().keyboard_locked() {
                return Err(Error::Assertion(crate::error::AssertionError {
                    expected: "keyboard unlocked".into(),
                    actual: "keyboard locked".into(),
                    screen_snapshot: snapshot.text,
                }));
            }
            Ok(())
        }
        Expectation::TextContains(needle) => {
            let needle = substitute(needle, row)?;
            if snapshot.text.contains(&needle) {
                Ok(())
            } else {
                Err(Error::Assertion(crate::error::AssertionError {
                    expected: format!("screen contains '{needle}'"),
                    actual: "not found".into(),
                    screen_snapshot: snapshot.text,
                }))
            }
        }
        Expectation::TextAt { row: target_row, col: target_col, equals } => {
            let equals = substitute(equals, row)?;
            let actual = text_at(&snapshot, *target_row, *target_col, equals.chars().count());
            if actual == equals {
                Ok(())
            } else {
                Err(Error::Assertion(crate::error::AssertionError { expected: equals, actual, screen_snapshot: snapshot.text }))
            }
        }
        Expectation::FieldEquals { target, equals } => {
            let equals = substitute(equals, row)?;
            let (target_row, target_col) = resolve_target(session, target)?;
            let actual = field_text_at(&snapshot, target_row, target_col)?;
            if actual == equals {
                Ok(())
            } else {
                Err(Error::Assertion(crate::error::AssertionError { expected: equals, actual, screen_snapshot: snapshot.text }))
            }
        }
    }
}

fn apply_capture(session: &Session, capture: &CaptureStep) -> Result<(String, String)> {
    let snapshot = session.screen();
    let (target_row, target_col) = resolve_target(session, &capture.target)?;
    let value = field_text_at(&snapshot, target_row, target_col)?;
    Ok((capture.name.clone(), value))
}

/// Polls (non-blocking sleep loop) for the keyboard to lock after an
/// AID send, then switches to the condition-variable-backed wait for
/// it to unlock, sharing one overall deadline across both phases.
fn poll_lock_then_unlock(session: &Session, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !session.oia().keyboard_locked() {
        if Instant::now() >= deadline {
            return Err(Error::Timeout(TimeoutError {
                waited_for: "keyboard to lock after AID key".into(),
                elapsed_ms: timeout.as_millis() as u64,
            }));
        }
        thread::sleep(LOCK_POLL_INTERVAL);
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    session.wait_for_keyboard_unlock(remaining)
}

fn resolve_target(session: &Session, target: &FieldTarget) -> Result<(usize, usize)> {
    match target {
        FieldTarget::Named(name) => session.field_position(name),
        FieldTarget::Position { row, col } => Ok((*row, *col)),
    }
}

fn text_at(snapshot: &crate::session::ScreenSnapshot, row: usize, col: usize, len: usize) -> String {
    (0..len).map(|offset| snapshot.char_at(row, col + offset)).collect()
}

fn field_text_at(snapshot: &crate::session::ScreenSnapshot, row: usize, col: usize) -> Result<String> {
    let pos = row * snapshot.cols + col;
    let field = snapshot
        .field_at(pos)
        .ok_or_else(|| Error::Field(FieldError::NotFound { name: format!("position {row},{col}") }))?;
    let text: String = (0..field.length)
        .map(|offset| {
            let p = field.start_pos + offset;
            snapshot.char_at(p / snapshot.cols, p % snapshot.cols)
        })
        .collect();
    Ok(text.trim_end().to_string())
}

fn aggregate(wf: &Workflow, rows: &[DataRow], results: Vec<WorkflowResult>) -> BatchMetrics {
    let total = results.len();
    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = total - succeeded;

    let mut latencies: Vec<Duration> = results.iter().map(|r| r.duration).collect();
    latencies.sort();
    let p50_latency = percentile(&latencies, 0.50);
    let p99_latency = percentile(&latencies, 0.99);

    let correctness_score = if total == 0 { 0.0 } else { succeeded as f64 / total as f64 };
    let idempotency_score = duplicate_row_idempotency(rows, &results);

    let max_latency = wf.tolerances.max_latency;
    let latency_score = if max_latency.is_zero() {
        1.0
    } else {
        (1.0 - p99_latency.as_secs_f64() / max_latency.as_secs_f64()).clamp(0.0, 1.0)
    };

    BatchMetrics { total, succeeded, failed, p50_latency, p99_latency, correctness_score, idempotency_score, latency_score, results }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (((sorted.len() - 1) as f64) * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Averages [`idempotency_score`] across every pair of rows sharing
/// identical column values; `None` if the batch has no such repeats.
fn duplicate_row_idempotency(rows: &[DataRow], results: &[WorkflowResult]) -> Option<f64> {
    let mut groups: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let mut key: Vec<String> = row
            .columns()
            .into_iter()
            .map(|name| format!("{name}={}", row.get(&name).unwrap_or("")))
            .collect();
        key.sort();
        groups.entry(key).or_default().push(index);
    }

    let mut scores = Vec::new();
    for indices in groups.values() {
        for pair in indices.windows(2) {
            if let (Some(a), Some(b)) = (results.get(pair[0]), results.get(pair[1])) {
                scores.push(idempotency_score(a, b));
            }
        }
    }
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowTolerances;
    use std::collections::HashMap as Map;

    fn empty_row() -> DataRow {
        DataRow::new(Map::new())
    }

    fn result(captures: Vec<(&str, &str)>, success: bool, duration: Duration) -> WorkflowResult {
        WorkflowResult {
            run_id: "r".into(),
            success,
            duration,
            captures: captures.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            error: None,
        }
    }

    #[test]
    fn idempotency_score_is_one_for_matching_captures() {
        let a = result(vec![("balance", "100")], true, Duration::from_millis(10));
        let b = result(vec![("balance", "100")], true, Duration::from_millis(12));
        assert_eq!(idempotency_score(&a, &b), 1.0);
    }

    #[test]
    fn idempotency_score_is_zero_for_differing_captures() {
        let a = result(vec![("balance", "100")], true, Duration::from_millis(10));
        let b = result(vec![("balance", "101")], true, Duration::from_millis(10));
        assert_eq!(idempotency_score(&a, &b), 0.0);
    }

    #[test]
    fn percentile_picks_nearest_rank() {
        let durations = vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(30),
            Duration::from_millis(40),
        ];
        assert_eq!(percentile(&durations, 0.0), Duration::from_millis(10));
        assert_eq!(percentile(&durations, 1.0), Duration::from_millis(40));
    }

    #[test]
    fn aggregate_reports_none_idempotency_without_duplicate_rows() {
        let wf = Workflow { name: "t".into(), tolerances: WorkflowTolerances::default(), steps: vec![] };
        let rows = vec![empty_row()];
        let results = vec![result(vec![], true, Duration::from_millis(5))];
        let metrics = aggregate(&wf, &rows, results);
        assert_eq!(metrics.idempotency_score, None);
        assert_eq!(metrics.correctness_score, 1.0);
    }

    #[test]
    fn aggregate_averages_idempotency_across_duplicate_rows() {
        let wf = Workflow { name: "t".into(), tolerances: WorkflowTolerances::default(), steps: vec![] };
        let rows = vec![empty_row(), empty_row()];
        let results = vec![
            result(vec![("x", "1")], true, Duration::from_millis(5)),
            result(vec![("x", "1")], true, Duration::from_millis(6)),
        ];
        let metrics = aggregate(&wf, &rows, results);
        assert_eq!(metrics.idempotency_score, Some(1.0));
    }
}
