use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Literal token that opens every synthetic marker line.
pub const MARKER_TOKEN: &str = "[RELAY_MARKER]";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("batch has no work items")]
    EmptyBatch,
}

/// A file picked for upload: absolute path plus the name shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub display_name: String,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
        }
    }

    /// Builds a file item whose display name is the path's file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, display_name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Remote { url: String },
    Local(LocalFile),
}

impl WorkItem {
    pub fn remote(url: impl Into<String>) -> Self {
        WorkItem::Remote { url: url.into() }
    }

    pub fn local(file: LocalFile) -> Self {
        WorkItem::Local(file)
    }

    /// Human label used in marker lines and logs.
    pub fn label(&self) -> &str {
        match self {
            WorkItem::Remote { url } => url,
            WorkItem::Local(file) => &file.display_name,
        }
    }
}

/// Split pasted text into remote items: one per non-empty trimmed line.
pub fn parse_urls(raw: &str) -> Vec<WorkItem> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(WorkItem::remote)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// One tool invocation per item.
    #[default]
    Single,
    /// One tool invocation covering every item.
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    Download,
    Upload,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Download => "download",
            Lane::Upload => "upload",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Direction-specific flags handed to the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Download {
        output_dir: Option<PathBuf>,
        skip_same: bool,
        takeout: bool,
    },
    Upload {
        chat: String,
        as_photo: bool,
        delete_after: bool,
    },
}

impl Transport {
    pub fn lane(&self) -> Lane {
        match self {
            Transport::Download { .. } => Lane::Download,
            Transport::Upload { .. } => Lane::Upload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParams {
    pub threads: u32,
    pub concurrency: u32,
    pub transport: Transport,
}

/// Work items plus everything needed to invoke the tool for them.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobBatch {
    items: Vec<WorkItem>,
    mode: BatchMode,
    params: ToolParams,
}

impl JobBatch {
    pub fn new(items: Vec<WorkItem>, mode: BatchMode, params: ToolParams) -> Self {
        Self {
            items,
            mode,
            params,
        }
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn params(&self) -> &ToolParams {
        &self.params
    }

    pub fn lane(&self) -> Lane {
        self.params.transport.lane()
    }
}

/// One tool invocation bracketed by its marker lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStep {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub start_marker: String,
    /// Tool arguments, without the program itself.
    pub args: Vec<String>,
    pub done_marker: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBatch {
    pub lane: Lane,
    pub mode: BatchMode,
    pub item_count: usize,
    pub steps: Vec<CompiledStep>,
}

impl CompiledBatch {
    /// Label describing the whole batch, used in run-level log lines.
    pub fn summary_label(&self) -> String {
        format!("{} batch", self.lane)
    }
}

pub fn start_marker(index: usize, total: usize, label: &str) -> String {
    format!("{MARKER_TOKEN} START {index}/{total}: {}", marker_safe(label))
}

pub fn done_marker(index: usize, total: usize, label: &str) -> String {
    format!("{MARKER_TOKEN} DONE {index}/{total}: {}", marker_safe(label))
}

// Marker lines must stay on one line.
fn marker_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Turn a batch into the ordered list of tool invocations to run.
pub fn compile(batch: &JobBatch) -> Result<CompiledBatch, BatchError> {
    let params = batch.params();
    if params.threads < 1 {
        return Err(BatchError::InvalidParameter(format!(
            "thread count must be at least 1, got {}",
            params.threads
        )));
    }
    if params.concurrency < 1 {
        return Err(BatchError::InvalidParameter(format!(
            "concurrency must be at least 1, got {}",
            params.concurrency
        )));
    }
    if batch.items().is_empty() {
        return Err(BatchError::EmptyBatch);
    }
    if let Transport::Upload { chat, .. } = &params.transport {
        if chat.trim().is_empty() {
            return Err(BatchError::InvalidParameter(
                "upload target chat must not be empty".to_string(),
            ));
        }
    }
    for item in batch.items() {
        validate_item(item, &params.transport)?;
    }

    let item_count = batch.items().len();
    let steps = match batch.mode() {
        BatchMode::Single => batch
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| {
                build_step(
                    i + 1,
                    item_count,
                    item.label().to_string(),
                    std::slice::from_ref(item),
                    params,
                )
            })
            .collect(),
        BatchMode::Merged => {
            let label = if item_count == 1 {
                "1 item".to_string()
            } else {
                format!("{item_count} items")
            };
            vec![build_step(1, 1, label, batch.items(), params)]
        }
    };

    Ok(CompiledBatch {
        lane: batch.lane(),
        mode: batch.mode(),
        item_count,
        steps,
    })
}

fn validate_item(item: &WorkItem, transport: &Transport) -> Result<(), BatchError> {
    match (item, transport) {
        (WorkItem::Remote { url }, Transport::Download { .. }) => Url::parse(url)
            .map(|_| ())
            .map_err(|err| BatchError::InvalidParameter(format!("invalid link {url:?}: {err}"))),
        (WorkItem::Local(file), Transport::Upload { .. }) => {
            if file.path.as_os_str().is_empty() {
                Err(BatchError::InvalidParameter(
                    "upload file path must not be empty".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        (WorkItem::Remote { url }, Transport::Upload { .. }) => Err(BatchError::InvalidParameter(
            format!("upload batch cannot contain a link: {url}"),
        )),
        (WorkItem::Local(file), Transport::Download { .. }) => {
            Err(BatchError::InvalidParameter(format!(
                "download batch cannot contain a local file: {}",
                file.display_name
            )))
        }
    }
}

fn build_step(
    index: usize,
    total: usize,
    label: String,
    items: &[WorkItem],
    params: &ToolParams,
) -> CompiledStep {
    let mut args = Vec::new();
    match &params.transport {
        Transport::Download {
            output_dir,
            skip_same,
            takeout,
        } => {
            args.push("dl".to_string());
            for item in items {
                args.push("-u".to_string());
                args.push(item.label().to_string());
            }
            push_tuning(&mut args, params);
            if let Some(dir) = output_dir {
                args.push("-d".to_string());
                args.push(dir.to_string_lossy().into_owned());
            }
            if *skip_same {
                args.push("--skip-same".to_string());
            }
            if *takeout {
                args.push("--takeout".to_string());
            }
        }
        Transport::Upload {
            chat,
            as_photo,
            delete_after,
        } => {
            args.push("up".to_string());
            for item in items {
                if let WorkItem::Local(file) = item {
                    args.push("-p".to_string());
                    args.push(file.path.to_string_lossy().into_owned());
                }
            }
            args.push("-c".to_string());
            args.push(chat.trim().to_string());
            push_tuning(&mut args, params);
            if *as_photo {
                args.push("--photo".to_string());
            }
            if *delete_after {
                args.push("--rm".to_string());
            }
        }
    }

    CompiledStep {
        index,
        total,
        start_marker: start_marker(index, total, &label),
        done_marker: done_marker(index, total, &label),
        label,
        args,
    }
}

fn push_tuning(args: &mut Vec<String>, params: &ToolParams) {
    args.push("-t".to_string());
    args.push(params.threads.to_string());
    args.push("-l".to_string());
    args.push(params.concurrency.to_string());
}
