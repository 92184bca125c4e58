use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;

use engine_logging::{engine_info, engine_warn};
use relay_core::{compile, JobBatch, Lane, ProgressView, Transport};

use crate::persist::ensure_output_dir;
use crate::registry::{Registry, RunSlot};
use crate::runner::{LaneRunner, RunConfig, RunContext};
use crate::sweep::ProcessTable;
use crate::{
    ChannelProgressSink, EngineEvent, ProgressSink, RelayError, RelaySettings, RunTicket,
    TerminateReport,
};

/// Owns every running batch: one per lane, each streamed by its own worker.
pub struct Supervisor {
    settings: RelaySettings,
    sink: Arc<dyn ProgressSink>,
    registry: Arc<Registry>,
    snapshots: Mutex<HashMap<Lane, Arc<Mutex<ProgressView>>>>,
    next_token: AtomicU64,
}

impl Supervisor {
    pub fn new(settings: RelaySettings, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            settings,
            sink,
            registry: Arc::new(Registry::default()),
            snapshots: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Supervisor whose events are delivered to the returned receiver.
    pub fn with_channel(settings: RelaySettings) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel();
        let sink = Arc::new(ChannelProgressSink::new(tx));
        (Self::new(settings, sink), rx)
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Validate, launch and hand the batch to a lane worker.
    ///
    /// Parameter and launch problems are returned here and leave the lane
    /// idle. Everything that happens after launch is reported through the
    /// sink and ends with exactly one `RunFinished`.
    pub fn start(&self, batch: &JobBatch) -> Result<RunTicket, RelayError> {
        let lane = batch.lane();
        let compiled = compile(batch)?;
        let config = RunConfig {
            program: self.settings.program.clone(),
            strategy: self.settings.strategy,
            env: self.settings.env.vars()?,
            legacy_encoding: self.settings.legacy_encoding.clone(),
            label_plain_lines: self.settings.label_plain_lines,
        };

        let mut slots = self.registry.lock();
        if slots.contains_key(&lane) {
            return Err(RelayError::AlreadyRunning { lane });
        }
        if let Transport::Download {
            output_dir: Some(dir),
            ..
        } = &batch.params().transport
        {
            ensure_output_dir(dir).map_err(|err| {
                RelayError::InvalidParameter(format!("download directory: {err}"))
            })?;
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let snapshot = Arc::new(Mutex::new(ProgressView::default()));
        let ctx = RunContext {
            lane,
            token,
            sink: Arc::clone(&self.sink),
            snapshot: Arc::clone(&snapshot),
            registry: Arc::clone(&self.registry),
            cancelled: Arc::clone(&cancelled),
        };
        let runner = LaneRunner::prepare(&config, &compiled, ctx)?;
        let pid = runner.pid();
        slots.insert(
            lane,
            RunSlot {
                token,
                pid,
                cancelled,
            },
        );
        drop(slots);

        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(lane, snapshot);

        let spawned = thread::Builder::new()
            .name(format!("relay-{lane}"))
            .spawn(move || runner.run());
        if let Err(err) = spawned {
            // Dropping the runner does not stop its process.
            self.registry.release(lane, token);
            ProcessTable::capture().terminate_tree(pid).ok();
            return Err(RelayError::Io(err));
        }

        engine_info!("Started {lane} run {token} (pid {pid})");
        Ok(RunTicket { lane, token })
    }

    pub fn is_running(&self, lane: Lane) -> bool {
        self.registry.is_active(lane)
    }

    /// Latest progress of the lane's most recent run.
    pub fn snapshot(&self, lane: Lane) -> Option<ProgressView> {
        let snapshots = self.snapshots.lock().unwrap_or_else(PoisonError::into_inner);
        snapshots
            .get(&lane)
            .map(|view| view.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Stop every tracked run, then sweep stray tool processes by name.
    ///
    /// The registry is empty when this returns, whether or not each signal
    /// was delivered.
    pub fn terminate_all(&self) -> TerminateReport {
        let slots = self.registry.drain();
        let table = ProcessTable::capture();
        let mut report = TerminateReport::default();
        let mut handled = HashSet::new();

        for (lane, slot) in slots {
            match table.terminate_tree(slot.pid) {
                Ok(pids) => {
                    engine_info!("Terminated {lane} run {} (pid {})", slot.token, slot.pid);
                    handled.extend(pids);
                    report.lanes.push(lane);
                }
                Err(failure) => {
                    engine_warn!(
                        "Could not terminate {lane} pid {}: {}",
                        failure.pid,
                        failure.reason
                    );
                    report.failures.push(failure);
                }
            }
        }

        if let Some(stem) = self.settings.program_stem() {
            let (swept, failures) = table.terminate_named(&stem, &handled);
            for pid in &swept {
                engine_info!("Terminated stray {stem} process {pid}");
            }
            report.swept = swept;
            report.failures.extend(failures);
        }
        report
    }
}
