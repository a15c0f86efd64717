//! Workflow step types (spec §4.7). A workflow is a closed sequence of
//! these six step kinds; there is no plugin mechanism for a seventh.

use std::time::Duration;

use crate::keyboard::Key;
use crate::protocol::codes::Aid;

/// How a field is addressed by a `Fill`/`Assert` step: by the name
/// registered via [`crate::session::Session::register_field`], or
/// directly by screen position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Named(String),
    Position { row: usize, col: usize },
}

#[derive(Debug, Clone)]
pub struct LoginStep {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub device_name: Option<String>,
}

/// Sends `via_keys` in order, waits for the keyboard lock→unlock cycle
/// the last key's AID triggers, then verifies `identifier` against the
/// resulting screen (spec §4.7 Navigate: `{target_screen_hint, via_keys}`).
#[derive(Debug, Clone)]
pub struct NavigateStep {
    pub via_keys: Vec<Key>,
    pub identifier: Expectation,
}

#[derive(Debug, Clone)]
pub struct FillStep {
    pub target: FieldTarget,
    /// May contain `${name}` placeholders resolved against the
    /// workflow's current data row.
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct SubmitStep {
    pub aid: Aid,
}

/// What an `Assert` step checks for.
#[derive(Debug, Clone)]
pub enum Expectation {
    TextAt { row: usize, col: usize, equals: String },
    TextContains(String),
    FieldEquals { target: FieldTarget, equals: String },
    KeyboardUnlocked,
}

#[derive(Debug, Clone)]
pub struct AssertStep {
    pub expectation: Expectation,
}

#[derive(Debug, Clone)]
pub struct CaptureStep {
    pub name: String,
    pub target: FieldTarget,
}

/// The closed set of actions a workflow step may perform.
#[derive(Debug, Clone)]
pub enum Step {
    Login(LoginStep),
    Navigate(NavigateStep),
    Fill(FillStep),
    Submit(SubmitStep),
    Assert(AssertStep),
    Capture(CaptureStep),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Login(_) => "login",
            Step::Navigate(_) => "navigate",
            Step::Fill(_) => "fill",
            Step::Submit(_) => "submit",
            Step::Assert(_) => "assert",
            Step::Capture(_) => "capture",
        }
    }
}

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    Abort,
    Continue,
    Retry(u32),
}

impl Default for OnError {
    fn default() -> Self {
        OnError::Abort
    }
}

/// A step plus its per-step execution policy.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub step: Step,
    pub timeout: Duration,
    pub on_error: OnError,
}

impl WorkflowStep {
    pub fn new(step: Step, timeout: Duration) -> Self {
        WorkflowStep { step, timeout, on_error: OnError::Abort }
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kind_names_match_variants() {
        let step = WorkflowStep::new(
            Step::Capture(CaptureStep { name: "x".into(), target: FieldTarget::Position { row: 0, col: 0 } }),
            Duration::from_secs(5),
        );
        assert_eq!(step.step.kind(), "capture");
        assert_eq!(step.on_error, OnError::Abort);
    }

    #[test]
    fn on_error_defaults_to_abort() {
        assert_eq!(OnError::default(), OnError::Abort);
    }

    #[test]
    fn navigate_step_carries_key_sequence_and_identifier() {
        let step = NavigateStep {
            via_keys: vec![Key::Tab, Key::Aid(Aid::Enter)],
            identifier: Expectation::TextContains("Main Menu".into()),
        };
        assert_eq!(step.via_keys.len(), 2);
        assert!(matches!(step.identifier, Expectation::TextContains(_)));
    }
}
