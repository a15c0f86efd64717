//! Scripted, headless screen-navigation runs (spec §4.7): a closed
//! sequence of steps executed against one session, optionally fanned
//! out over a batch of data rows with aggregated quality scores.

mod artifact;
mod data_row;
mod params;
mod runner;
mod step;

use std::time::Duration;

pub use artifact::{ArtifactEntry, ArtifactSink, FileArtifactSink, MemoryArtifactSink, StepOutcome};
pub use data_row::{parse_csv, DataRow};
pub use runner::{idempotency_score, run_batch, run_workflow, BatchMetrics, WorkflowResult};
pub use step::{
    AssertStep, CaptureStep, Expectation, FieldTarget, FillStep, LoginStep, NavigateStep, OnError, Step,
    SubmitStep, WorkflowStep,
};

/// Acceptance thresholds a batch run's [`BatchMetrics`] are judged
/// against; `max_latency` anchors the `latency_score` normalization in
/// [`run_batch`].
#[derive(Debug, Clone)]
pub struct WorkflowTolerances {
    pub max_latency: Duration,
}

impl Default for WorkflowTolerances {
    fn default() -> Self {
        WorkflowTolerances { max_latency: Duration::from_secs(5) }
    }
}

/// A named, ordered sequence of steps. The first step must be a
/// [`Step::Login`]; every subsequent step runs against the session it
/// opens.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub tolerances: WorkflowTolerances,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Workflow { name: name.into(), tolerances: WorkflowTolerances::default(), steps }
    }

    pub fn with_tolerances(mut self, tolerances: WorkflowTolerances) -> Self {
        self.tolerances = tolerances;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codes::Aid;
    use std::collections::HashMap;

    fn sample_workflow() -> Workflow {
        Workflow::new(
            "sign-on",
            vec![
                WorkflowStep::new(
                    Step::Login(LoginStep {
                        host: "127.0.0.1".into(),
                        port: 23,
                        user: "${user}".into(),
                        password: "${password}".into(),
                        device_name: None,
                    }),
                    Duration::from_secs(5),
                ),
                WorkflowStep::new(Step::Submit(SubmitStep { aid: Aid::Enter }), Duration::from_secs(5)),
            ],
        )
    }

    #[test]
    fn running_against_an_unreachable_host_reports_connection_failure() {
        let mut columns = HashMap::new();
        columns.insert("user".to_string(), "USER1".to_string());
        columns.insert("password".to_string(), "PASS1".to_string());
        let row = DataRow::new(columns);
        let sink = MemoryArtifactSink::new();

        let result = run_workflow(&sample_workflow(), &row, &sink);

        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.entries()[0].step_kind, "login");
    }

    #[test]
    fn missing_parameter_fails_before_any_network_activity() {
        let row = DataRow::new(HashMap::new());
        let sink = MemoryArtifactSink::new();

        let result = run_workflow(&sample_workflow(), &row, &sink);

        assert!(!result.success);
        assert!(result.error.unwrap().contains("user"));
    }
}
