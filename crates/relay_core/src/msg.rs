use std::fmt;

use crate::BatchMode;

/// What one line of tool output means for progress tracking.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A marker announced that item `index` (1-based) is starting.
    ItemStarted { index: usize, label: String },
    /// Item `index` finished, announced by a marker or inferred from tool output.
    ItemFinished { index: usize, label: String },
    /// Only the fields present on the line are set.
    ProgressUpdate {
        item_percent: Option<f64>,
        throughput: Option<f64>,
    },
    /// Anything else worth showing in the log.
    PlainLine { text: String },
}

/// Terminal status of one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// The tool exited unsuccessfully; `None` when killed by a signal.
    Failed { code: Option<i32> },
    /// The run could not complete (spawn or IO failure).
    Error { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "success"),
            RunOutcome::Failed { code: Some(code) } => write!(f, "failed with exit code {code}"),
            RunOutcome::Failed { code: None } => write!(f, "failed (terminated)"),
            RunOutcome::Error { reason } => write!(f, "error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A lane accepted a batch; resets the aggregate.
    RunStarted {
        total: usize,
        mode: BatchMode,
        label: String,
    },
    /// One classified output line.
    Event(ProgressEvent),
    /// The run reached its terminal status.
    RunFinished(RunOutcome),
}
