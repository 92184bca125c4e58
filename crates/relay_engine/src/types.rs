use std::fmt;
use std::sync::mpsc;

use relay_core::{Lane, ProgressView, RunOutcome};

/// Notifications delivered to the front-end, in the order they happened on
/// each lane. `token` tells runs on the same lane apart.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Log {
        lane: Lane,
        token: u64,
        line: String,
    },
    Progress {
        lane: Lane,
        token: u64,
        view: ProgressView,
    },
    RunFinished {
        lane: Lane,
        token: u64,
        outcome: RunOutcome,
    },
}

impl EngineEvent {
    /// The run this event belongs to.
    pub fn ticket(&self) -> RunTicket {
        match self {
            EngineEvent::Log { lane, token, .. }
            | EngineEvent::Progress { lane, token, .. }
            | EngineEvent::RunFinished { lane, token, .. } => RunTicket {
                lane: *lane,
                token: *token,
            },
        }
    }
}

/// Observer for lane workers. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Forwards events into a channel for polling front-ends.
pub struct ChannelProgressSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Identifies one accepted run on a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    pub lane: Lane,
    pub token: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateFailure {
    pub pid: u32,
    pub reason: String,
}

/// What `terminate_all` did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TerminateReport {
    /// Lanes whose tracked process was signalled.
    pub lanes: Vec<Lane>,
    /// Processes found by name and signalled.
    pub swept: Vec<u32>,
    pub failures: Vec<TerminateFailure>,
}

impl TerminateReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for TerminateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "terminated {} tracked run(s), swept {} process(es), {} failure(s)",
            self.lanes.len(),
            self.swept.len(),
            self.failures.len()
        )
    }
}
