//! Relay engine: launches the transfer tool, streams its output through the
//! core classifier and aggregator, and supervises runs per lane.
mod error;
mod files;
mod normalize;
mod persist;
mod registry;
mod runner;
mod script;
mod settings;
mod supervisor;
mod sweep;
mod types;

pub use error::RelayError;
pub use files::collect_local_files;
pub use normalize::{NormalizedLine, Normalizer};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use script::{render_script, ScriptFlavor};
pub use settings::{
    EnvSettings, InvocationStrategy, LegacyEncoding, RelaySettings, DEFAULT_NAMESPACE,
    DEFAULT_PROXY,
};
pub use supervisor::Supervisor;
pub use sweep::ProcessTable;
pub use types::{
    ChannelProgressSink, EngineEvent, ProgressSink, RunTicket, TerminateFailure,
    TerminateReport,
};
