use std::env;
use std::io::{self, PipeReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use relay_core::{
    classify, update, BatchMode, ClassifierState, CompiledBatch, CompiledStep, Effect, Lane, Msg,
    ProgressState, ProgressView, RunOutcome,
};
use tempfile::TempPath;

use crate::registry::Registry;
use crate::script::{render_script, write_script, ScriptFlavor};
use crate::{EngineEvent, InvocationStrategy, LegacyEncoding, Normalizer, ProgressSink, RelayError};

/// Lines buffered between the reader threads and the lane worker.
const LINE_BUFFER: usize = 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 8 * 1024;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunnerState {
    Idle,
    Starting,
    Streaming,
    Draining,
    Terminated,
}

/// Everything a run needs from the settings, resolved once at start.
#[derive(Debug, Clone)]
pub(crate) struct RunConfig {
    pub program: PathBuf,
    pub strategy: InvocationStrategy,
    pub env: Vec<(String, String)>,
    pub legacy_encoding: LegacyEncoding,
    pub label_plain_lines: bool,
}

/// Shared handles for one accepted run.
pub(crate) struct RunContext {
    pub lane: Lane,
    pub token: u64,
    pub sink: Arc<dyn ProgressSink>,
    pub snapshot: Arc<Mutex<ProgressView>>,
    pub registry: Arc<Registry>,
    pub cancelled: Arc<AtomicBool>,
}

enum Plan {
    /// The generated script; removed from disk at drain.
    Script(TempPath),
    /// Every step in order; the first one is already running.
    Direct {
        program: PathBuf,
        env: Vec<(String, String)>,
        steps: Vec<CompiledStep>,
    },
}

enum Chunk {
    Line(Vec<u8>),
    Closed,
}

/// Drives one batch from spawn to the terminal notification.
pub(crate) struct LaneRunner {
    ctx: RunContext,
    state: RunnerState,
    plan: Option<Plan>,
    child: Child,
    /// Read end of the pipe shared by the child's stdout and stderr.
    output: Option<PipeReader>,
    total: usize,
    mode: BatchMode,
    label: String,
    normalizer: Normalizer,
    classifier: ClassifierState,
    progress: ProgressState,
}

impl LaneRunner {
    /// Materialize the batch and spawn its first process on the caller's
    /// thread, so launch failures are reported before anything is registered.
    pub fn prepare(
        config: &RunConfig,
        compiled: &CompiledBatch,
        ctx: RunContext,
    ) -> Result<Self, RelayError> {
        let mut state = RunnerState::Idle;
        transition(ctx.lane, &mut state, RunnerState::Starting);
        let program = resolve_program(&config.program).map_err(|source| RelayError::Spawn {
            program: config.program.clone(),
            source,
        })?;

        let (child, output, plan) = match config.strategy {
            InvocationStrategy::Script => {
                let flavor = ScriptFlavor::native();
                let contents = render_script(flavor, &program, &config.env, compiled);
                let script = write_script(flavor, &contents)?;
                engine_debug!("Wrote batch script {}", script.display());
                let (child, output) = spawn(flavor.launcher(&script), &program)?;
                (child, output, Plan::Script(script))
            }
            InvocationStrategy::Direct => {
                let first = compiled.steps.first().ok_or(RelayError::EmptyBatch)?;
                let (child, output) =
                    spawn(direct_command(&program, &config.env, first), &program)?;
                let plan = Plan::Direct {
                    program,
                    env: config.env.clone(),
                    steps: compiled.steps.clone(),
                };
                (child, output, plan)
            }
        };
        engine_info!(
            "Spawned {} (pid {}) for {} item(s)",
            config.program.display(),
            child.id(),
            compiled.item_count
        );

        Ok(Self {
            normalizer: Normalizer::new(&config.legacy_encoding),
            classifier: ClassifierState::new(compiled.mode)
                .with_label_prefix(config.label_plain_lines),
            progress: ProgressState::new(),
            total: compiled.item_count,
            mode: compiled.mode,
            label: compiled.summary_label(),
            ctx,
            state,
            plan: Some(plan),
            child,
            output: Some(output),
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Stream to completion. Always ends with exactly one `RunFinished`.
    pub fn run(mut self) {
        engine_logging::set_lane_tag(self.ctx.lane.as_str());
        self.enter(RunnerState::Streaming);
        self.apply(Msg::RunStarted {
            total: self.total,
            mode: self.mode,
            label: self.label.clone(),
        });

        let plan = self.plan.take();
        let result = match plan {
            Some(Plan::Script(script)) => {
                let result = match self.pump() {
                    Ok(_) if self.is_cancelled() => Err(RelayError::BatchFailed { code: None }),
                    other => other.and_then(exit_result),
                };
                self.enter(RunnerState::Draining);
                if let Err(err) = script.close() {
                    engine_warn!("Could not remove batch script: {err}");
                }
                result
            }
            Some(Plan::Direct {
                program,
                env,
                steps,
            }) => {
                let result = self.run_direct(&program, &env, &steps);
                self.enter(RunnerState::Draining);
                result
            }
            None => Err(RelayError::EmptyBatch),
        };

        let outcome = match result {
            Ok(()) => RunOutcome::Success,
            Err(RelayError::BatchFailed { code }) => {
                engine_warn!("{}", RelayError::BatchFailed { code });
                RunOutcome::Failed { code }
            }
            Err(err) => {
                engine_warn!("Run aborted: {err}");
                RunOutcome::Error {
                    reason: err.to_string(),
                }
            }
        };
        self.drain();
        self.apply(Msg::RunFinished(outcome.clone()));
        self.ctx.sink.emit(EngineEvent::RunFinished {
            lane: self.ctx.lane,
            token: self.ctx.token,
            outcome,
        });
        self.enter(RunnerState::Terminated);
        engine_logging::clear_lane_tag();
    }

    fn run_direct(
        &mut self,
        program: &Path,
        env: &[(String, String)],
        steps: &[CompiledStep],
    ) -> Result<(), RelayError> {
        let mut last_failure = None;
        for (position, step) in steps.iter().enumerate() {
            if position > 0 {
                if self.is_cancelled() {
                    return Err(RelayError::BatchFailed { code: None });
                }
                let (child, output) = spawn(direct_command(program, env, step), program)?;
                let pid = child.id();
                self.child = child;
                self.output = Some(output);
                if !self.ctx.registry.update_pid(self.ctx.lane, self.ctx.token, pid) {
                    self.kill_child();
                    return Err(RelayError::BatchFailed { code: None });
                }
                engine_debug!("Spawned step {}/{} (pid {pid})", step.index, step.total);
            }
            self.feed(&step.start_marker);
            let status = self.pump()?;
            if self.is_cancelled() {
                return Err(RelayError::BatchFailed { code: None });
            }
            if let Err(err) = exit_result(status) {
                last_failure = Some(err);
            }
            self.feed(&step.done_marker);
        }
        match last_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Forward output lines until the output pipe has closed and the process
    /// has exited.
    fn pump(&mut self) -> Result<ExitStatus, RelayError> {
        let (tx, rx) = mpsc::sync_channel(LINE_BUFFER);
        let mut open = 0usize;
        if let Some(output) = self.output.take() {
            spawn_reader(self.ctx.lane, output, tx)?;
            open += 1;
        }

        let mut exit = None;
        loop {
            if open > 0 {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(Chunk::Line(bytes)) => self.handle_raw(&bytes),
                    Ok(Chunk::Closed) => open -= 1,
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => open = 0,
                }
            }
            if exit.is_none() {
                exit = self.child.try_wait()?;
            }
            if open == 0 {
                return match exit {
                    Some(status) => Ok(status),
                    None => Ok(self.child.wait()?),
                };
            }
        }
    }

    fn handle_raw(&mut self, bytes: &[u8]) {
        let line = self.normalizer.normalize(bytes);
        if line.lossy {
            engine_debug!("Replaced undecodable bytes in tool output");
        }
        self.feed(&line.text);
    }

    fn feed(&mut self, text: &str) {
        let (event, next) = classify(&self.classifier, text);
        self.classifier = next;
        if let Some(event) = event {
            self.apply(Msg::Event(event));
        }
    }

    fn apply(&mut self, msg: Msg) {
        let (progress, effects) = update(std::mem::take(&mut self.progress), msg);
        self.progress = progress;
        for effect in effects {
            match effect {
                Effect::Log(line) => {
                    engine_info!("{line}");
                    self.ctx.sink.emit(EngineEvent::Log {
                        lane: self.ctx.lane,
                        token: self.ctx.token,
                        line,
                    });
                }
                Effect::Progress(view) => {
                    *self
                        .ctx
                        .snapshot
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = view.clone();
                    self.ctx.sink.emit(EngineEvent::Progress {
                        lane: self.ctx.lane,
                        token: self.ctx.token,
                        view,
                    });
                }
            }
        }
    }

    /// Reap the process and give the lane back.
    fn drain(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.kill_child();
        }
        if !self.ctx.registry.release(self.ctx.lane, self.ctx.token) {
            engine_debug!("Registry entry already cleared");
        }
    }

    fn kill_child(&mut self) {
        if let Err(err) = self.child.kill() {
            engine_debug!("Kill failed: {err}");
        }
        let _ = self.child.wait();
    }

    fn is_cancelled(&self) -> bool {
        self.ctx.cancelled.load(Ordering::SeqCst)
    }

    fn enter(&mut self, next: RunnerState) {
        transition(self.ctx.lane, &mut self.state, next);
    }
}

fn transition(lane: Lane, state: &mut RunnerState, next: RunnerState) {
    engine_debug!("{lane} runner {state:?} -> {next:?}");
    *state = next;
}

fn exit_result(status: ExitStatus) -> Result<(), RelayError> {
    if status.success() {
        Ok(())
    } else {
        Err(RelayError::BatchFailed {
            code: status.code(),
        })
    }
}

fn direct_command(program: &Path, env: &[(String, String)], step: &CompiledStep) -> Command {
    let mut command = Command::new(program);
    command
        .args(&step.args)
        .envs(env.iter().map(|(name, value)| (name, value)));
    command
}

/// Spawn with stdout and stderr writing into one pipe, so lines reach the
/// reader in the order the child wrote them.
fn spawn(mut command: Command, program: &Path) -> Result<(Child, PipeReader), RelayError> {
    let (reader, writer) = io::pipe()?;
    let stderr = writer.try_clone()?;
    command.stdin(Stdio::null()).stdout(writer).stderr(stderr);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    let child = command.spawn().map_err(|source| RelayError::Spawn {
        program: program.to_path_buf(),
        source,
    })?;
    // The reader only sees end of stream once our write ends are gone.
    drop(command);
    Ok((child, reader))
}

/// Locate the tool the way a shell would, so a missing binary fails the
/// launch instead of the first step.
fn resolve_program(program: &Path) -> io::Result<PathBuf> {
    let not_found = || io::Error::new(io::ErrorKind::NotFound, "program not found");
    if program.components().count() > 1 || program.is_absolute() {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(not_found())
        };
    }
    let path_var = env::var_os("PATH").ok_or_else(not_found)?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if cfg!(windows) && candidate.extension().is_none() {
            let with_exe = candidate.with_extension("exe");
            if with_exe.is_file() {
                return Ok(with_exe);
            }
        }
    }
    Err(not_found())
}

fn spawn_reader<R>(lane: Lane, source: R, tx: SyncSender<Chunk>) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    let name = format!("relay-{lane}-output");
    thread::Builder::new().name(name).spawn(move || {
        engine_logging::set_lane_tag(lane.as_str());
        read_lines(source, &tx);
    })?;
    Ok(())
}

/// Split a byte stream on `\n` and `\r`; empty segments are skipped.
fn read_lines<R: Read>(mut source: R, tx: &SyncSender<Chunk>) {
    let mut buf = [0u8; READ_CHUNK];
    let mut line = Vec::new();
    loop {
        match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for &byte in &buf[..n] {
                    if byte == b'\n' || byte == b'\r' {
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(Chunk::Line(std::mem::take(&mut line))).is_err() {
                            return;
                        }
                    } else {
                        line.push(byte);
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                engine_debug!("Output stream closed with error: {err}");
                break;
            }
        }
    }
    if !line.is_empty() {
        let _ = tx.send(Chunk::Line(line));
    }
    let _ = tx.send(Chunk::Closed);
}
