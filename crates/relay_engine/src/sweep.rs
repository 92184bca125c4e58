use std::collections::HashSet;
use std::path::Path;

use sysinfo::{Pid, Process, ProcessesToUpdate, Signal, System};

use crate::TerminateFailure;

/// Snapshot of the OS process table used for termination.
pub struct ProcessTable {
    system: System,
}

impl ProcessTable {
    pub fn capture() -> Self {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        Self { system }
    }

    /// `root` followed by every process that descends from it.
    pub fn tree(&self, root: u32) -> Vec<u32> {
        let root = Pid::from_u32(root);
        let mut members = vec![root];
        let mut cursor = 0;
        while cursor < members.len() {
            let parent = members[cursor];
            for (pid, process) in self.system.processes() {
                if process.parent() == Some(parent) && !members.contains(pid) {
                    members.push(*pid);
                }
            }
            cursor += 1;
        }
        members.into_iter().map(Pid::as_u32).collect()
    }

    /// Signal `root`, then its descendants.
    pub fn terminate_tree(&self, root: u32) -> Result<Vec<u32>, TerminateFailure> {
        let members = self.tree(root);
        let mut failure = None;
        for pid in &members {
            match self.system.process(Pid::from_u32(*pid)) {
                Some(process) => {
                    if !terminate(process) && *pid == root {
                        failure = Some(TerminateFailure {
                            pid: *pid,
                            reason: "signal was not delivered".to_string(),
                        });
                    }
                }
                None if *pid == root => {
                    failure = Some(TerminateFailure {
                        pid: root,
                        reason: "process already exited".to_string(),
                    });
                }
                None => {}
            }
        }
        match failure {
            Some(failure) => Err(failure),
            None => Ok(members),
        }
    }

    /// Signal every process whose executable stem equals `stem`, skipping
    /// the current process and anything in `exclude`.
    pub fn terminate_named(
        &self,
        stem: &str,
        exclude: &HashSet<u32>,
    ) -> (Vec<u32>, Vec<TerminateFailure>) {
        let own = std::process::id();
        let mut swept = Vec::new();
        let mut failures = Vec::new();
        for (pid, process) in self.system.processes() {
            let pid = pid.as_u32();
            if pid == own || exclude.contains(&pid) || !stem_matches(process, stem) {
                continue;
            }
            if terminate(process) {
                swept.push(pid);
            } else {
                failures.push(TerminateFailure {
                    pid,
                    reason: "signal was not delivered".to_string(),
                });
            }
        }
        swept.sort_unstable();
        (swept, failures)
    }
}

fn stem_matches(process: &Process, stem: &str) -> bool {
    Path::new(process.name())
        .file_stem()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(stem))
}

/// Graceful terminate, hard kill when the platform has no such signal or
/// delivery fails.
fn terminate(process: &Process) -> bool {
    match process.kill_with(Signal::Term) {
        Some(true) => true,
        Some(false) | None => process.kill(),
    }
}
