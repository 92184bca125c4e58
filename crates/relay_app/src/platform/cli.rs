use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(author, version, about = "Batch runner for the tdl transfer tool", long_about = None)]
pub struct Cli {
    /// Directory holding relay_settings.ron
    #[arg(long, global = true, default_value = ".")]
    pub config_dir: PathBuf,
    /// Where log records go
    #[arg(long, global = true, value_enum, default_value_t = LogTarget::File)]
    pub log: LogTarget,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

/// Options shared by both transfer directions.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// One tool invocation for all items instead of one per item
    #[arg(long)]
    pub merged: bool,
    /// Threads per transfer (defaults to the saved setting)
    #[arg(short = 't', long)]
    pub threads: Option<u32>,
    /// Concurrent transfers (defaults to the saved setting)
    #[arg(short = 'l', long = "limit")]
    pub concurrency: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download messages by link
    Download {
        /// Message links
        urls: Vec<String>,
        /// Read links from a file, one per line
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
        /// Output directory (defaults to the saved setting)
        #[arg(short = 'd', long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        skip_same: bool,
        #[arg(long)]
        takeout: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Upload files; directories are walked recursively
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Target chat
        #[arg(short = 'c', long)]
        chat: String,
        /// Send images as photos
        #[arg(long)]
        photo: bool,
        /// Delete local files after upload
        #[arg(long)]
        rm: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Terminate every running tool process
    Kill,
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    Show,
    /// Set TDL_NS
    SetNamespace { namespace: String },
    /// Set TDL_PROXY; omit the value to clear it
    SetProxy { proxy: Option<String> },
    /// Path to the tdl executable
    SetTool { path: PathBuf },
}
