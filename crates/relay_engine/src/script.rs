use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use relay_core::CompiledBatch;
use tempfile::TempPath;

use crate::RelayError;

const RC_VAR: &str = "relay_rc";

/// Shell dialect of the generated batch script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    Posix,
    Cmd,
}

impl ScriptFlavor {
    pub fn native() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Cmd
        } else {
            ScriptFlavor::Posix
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ScriptFlavor::Posix => ".sh",
            ScriptFlavor::Cmd => ".cmd",
        }
    }

    /// Command that runs `script` with this dialect's interpreter.
    pub(crate) fn launcher(self, script: &Path) -> Command {
        match self {
            ScriptFlavor::Posix => {
                let mut command = Command::new("sh");
                command.arg(script);
                command
            }
            ScriptFlavor::Cmd => {
                let mut command = Command::new("cmd");
                command.arg("/C").arg(script);
                command
            }
        }
    }
}

/// Render the whole batch as one script.
///
/// Each step echoes its start marker, runs the tool, and echoes its done
/// marker. The script exits with the last non-zero status of any step.
pub fn render_script(
    flavor: ScriptFlavor,
    program: &Path,
    env: &[(String, String)],
    batch: &CompiledBatch,
) -> String {
    let program = program.to_string_lossy();
    let mut out = String::new();
    match flavor {
        ScriptFlavor::Posix => {
            out.push_str("#!/bin/sh\n");
            for (name, value) in env {
                let _ = writeln!(out, "export {name}={}", sh_quote(value));
            }
            let _ = writeln!(out, "{RC_VAR}=0");
            for step in &batch.steps {
                let _ = writeln!(out, "printf '%s\\n' {}", sh_quote(&step.start_marker));
                let mut line = sh_quote(&program);
                for arg in &step.args {
                    line.push(' ');
                    line.push_str(&sh_quote(arg));
                }
                let _ = writeln!(out, "{line} || {RC_VAR}=$?");
                let _ = writeln!(out, "printf '%s\\n' {}", sh_quote(&step.done_marker));
            }
            let _ = writeln!(out, "exit ${RC_VAR}");
        }
        ScriptFlavor::Cmd => {
            out.push_str("@echo off\r\n");
            out.push_str("chcp 65001 > nul\r\n");
            for (name, value) in env {
                let _ = write!(out, "set \"{name}={}\"\r\n", cmd_escape_percent(value));
            }
            let _ = write!(out, "set {RC_VAR}=0\r\n");
            for step in &batch.steps {
                let _ = write!(out, "echo {}\r\n", cmd_echo(&step.start_marker));
                let mut line = cmd_quote(&program);
                for arg in &step.args {
                    line.push(' ');
                    line.push_str(&cmd_quote(arg));
                }
                let _ = write!(out, "{line}\r\n");
                let _ = write!(out, "if errorlevel 1 set {RC_VAR}=%errorlevel%\r\n");
                let _ = write!(out, "echo {}\r\n", cmd_echo(&step.done_marker));
            }
            let _ = write!(out, "exit /b %{RC_VAR}%\r\n");
        }
    }
    out
}

/// Write `contents` to a fresh temp file. The file is removed when the
/// returned path is dropped or closed.
pub(crate) fn write_script(flavor: ScriptFlavor, contents: &str) -> Result<TempPath, RelayError> {
    let mut file = tempfile::Builder::new()
        .prefix("relay-batch-")
        .suffix(flavor.suffix())
        .tempfile()
        .map_err(RelayError::Script)?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.flush())
        .map_err(RelayError::Script)?;
    Ok(file.into_temp_path())
}

fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn cmd_escape_percent(value: &str) -> String {
    value.replace('%', "%%")
}

fn cmd_quote(value: &str) -> String {
    format!("\"{}\"", cmd_escape_percent(value).replace('"', "\"\""))
}

fn cmd_echo(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '^' | '&' | '|' | '<' | '>' => {
                escaped.push('^');
                escaped.push(c);
            }
            '%' => escaped.push_str("%%"),
            _ => escaped.push(c),
        }
    }
    escaped
}
