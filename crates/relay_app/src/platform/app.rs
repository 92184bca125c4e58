use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use relay_core::{
    parse_urls, BatchMode, JobBatch, LocalFile, RunOutcome, ToolParams, Transport, WorkItem,
};
use relay_engine::{collect_local_files, RelayError, RelaySettings, Supervisor};

use super::cli::{Cli, Commands, ConfigCommands, RunArgs};
use super::effects::TerminalRenderer;
use super::{logging, persistence};

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log.into());
    let settings = persistence::load_settings(&cli.config_dir);

    match cli.command {
        Commands::Download {
            urls,
            file,
            dir,
            skip_same,
            takeout,
            run,
        } => {
            let mut items: Vec<WorkItem> = urls.iter().flat_map(|url| parse_urls(url)).collect();
            if let Some(file) = file {
                let text = fs::read_to_string(&file)
                    .with_context(|| format!("reading links from {}", file.display()))?;
                items.extend(parse_urls(&text));
            }
            let transport = Transport::Download {
                output_dir: dir.or_else(|| settings.download_dir.clone()),
                skip_same,
                takeout,
            };
            let batch = build_batch(&settings, items, &run, transport);
            run_batch(settings, &batch)
        }
        Commands::Upload {
            paths,
            chat,
            photo,
            rm,
            run,
        } => {
            let items = upload_items(&paths)?;
            let transport = Transport::Upload {
                chat,
                as_photo: photo,
                delete_after: rm,
            };
            let batch = build_batch(&settings, items, &run, transport);
            run_batch(settings, &batch)
        }
        Commands::Kill => {
            let (supervisor, _events) = Supervisor::with_channel(settings);
            let report = supervisor.terminate_all();
            for pid in &report.swept {
                println!("terminated process {pid}");
            }
            for failure in &report.failures {
                println!("could not terminate {}: {}", failure.pid, failure.reason);
            }
            println!("{report}");
            Ok(())
        }
        Commands::Config { command } => configure(&cli.config_dir, settings, command),
    }
}

fn build_batch(
    settings: &RelaySettings,
    items: Vec<WorkItem>,
    run: &RunArgs,
    transport: Transport,
) -> JobBatch {
    let mode = if run.merged {
        BatchMode::Merged
    } else {
        BatchMode::Single
    };
    let params = ToolParams {
        threads: run.threads.unwrap_or(settings.threads),
        concurrency: run.concurrency.unwrap_or(settings.concurrency),
        transport,
    };
    JobBatch::new(items, mode, params)
}

fn upload_items(paths: &[PathBuf]) -> anyhow::Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    for path in paths {
        if path.is_dir() {
            let files = collect_local_files(path)?;
            if files.is_empty() {
                engine_warn!("Directory {} has no files", path.display());
            }
            items.extend(files.into_iter().map(WorkItem::local));
        } else {
            let absolute = fs::canonicalize(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            items.push(WorkItem::local(LocalFile::from_path(absolute)));
        }
    }
    Ok(items)
}

fn run_batch(settings: RelaySettings, batch: &JobBatch) -> anyhow::Result<()> {
    let (supervisor, events) = Supervisor::with_channel(settings);
    let ticket = supervisor.start(batch)?;
    engine_info!("Accepted {} run {}", ticket.lane, ticket.token);

    let mut renderer = TerminalRenderer::new(io::stdout().lock());
    for event in events.iter() {
        // Other runs, including ones still draining on this lane, are ignored.
        if event.ticket() != ticket {
            continue;
        }
        if let Some(outcome) = renderer.render(&event)? {
            return match outcome {
                RunOutcome::Success => Ok(()),
                RunOutcome::Failed { code } => Err(RelayError::BatchFailed { code }.into()),
                RunOutcome::Error { reason } => bail!(reason),
            };
        }
    }
    bail!("engine stopped before the run finished")
}

fn configure(
    config_dir: &Path,
    mut settings: RelaySettings,
    command: ConfigCommands,
) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            let text = ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::new())?;
            println!("{text}");
            return Ok(());
        }
        ConfigCommands::SetNamespace { namespace } => {
            let namespace = namespace.trim().to_string();
            if namespace.is_empty() {
                bail!("namespace must not be empty");
            }
            println!("TDL_NS={namespace}");
            settings.env.namespace = namespace;
        }
        ConfigCommands::SetProxy { proxy } => {
            let proxy = proxy
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            match &proxy {
                Some(proxy) => println!("TDL_PROXY={proxy}"),
                None => println!("TDL_PROXY cleared"),
            }
            settings.env.proxy = proxy;
        }
        ConfigCommands::SetTool { path } => {
            if !path.is_file() {
                engine_warn!("{} does not exist yet", path.display());
            }
            println!("tool={}", path.display());
            settings.program = path;
        }
    }
    persistence::save_settings(config_dir, &settings)
}
