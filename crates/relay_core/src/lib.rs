//! Relay core: batch compilation, output classification and the pure
//! progress state machine. Nothing in this crate touches processes or files.
mod batch;
mod classify;
mod effect;
mod msg;
mod state;
mod units;
mod update;
mod view_model;

pub use batch::{
    compile, done_marker, parse_urls, start_marker, BatchError, BatchMode, CompiledBatch,
    CompiledStep, JobBatch, Lane, LocalFile, ToolParams, Transport, WorkItem, MARKER_TOKEN,
};
pub use classify::{classify, ActiveItem, ClassifierState};
pub use effect::Effect;
pub use msg::{Msg, ProgressEvent, RunOutcome};
pub use state::ProgressState;
pub use units::{format_rate, parse_rate, rate_from_parts, unit_multiplier};
pub use update::update;
pub use view_model::{percent_text, render_bar, ProgressView, PERCENT_EPSILON};
