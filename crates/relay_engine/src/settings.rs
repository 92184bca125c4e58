use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::RelayError;

pub const DEFAULT_NAMESPACE: &str = "quickstart";
pub const DEFAULT_PROXY: &str = "socks5://127.0.0.1:56789";

/// How a compiled batch reaches the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvocationStrategy {
    /// One generated shell script per run, markers echoed by the script.
    #[default]
    Script,
    /// One process per step, markers injected by the lane worker.
    Direct,
}

/// Second decoding attempt for output that is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyEncoding {
    None,
    /// Any WHATWG label such as `gbk` or `shift_jis`.
    Label(String),
    /// Guess per line with chardetng.
    Detect,
}

impl Default for LegacyEncoding {
    fn default() -> Self {
        if cfg!(windows) {
            LegacyEncoding::Detect
        } else {
            LegacyEncoding::None
        }
    }
}

/// Environment handed to every tool invocation of a lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    pub namespace: String,
    pub proxy: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            proxy: Some(DEFAULT_PROXY.to_string()),
            extra: BTreeMap::new(),
        }
    }
}

impl EnvSettings {
    /// Variables in the order they are exported, `TDL_NS` first.
    pub fn vars(&self) -> Result<Vec<(String, String)>, RelayError> {
        let mut vars = Vec::with_capacity(2 + self.extra.len());
        let namespace = self.namespace.trim();
        if !namespace.is_empty() {
            vars.push(("TDL_NS".to_string(), namespace.to_string()));
        }
        if let Some(proxy) = self.proxy.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            vars.push(("TDL_PROXY".to_string(), proxy.to_string()));
        }
        for (name, value) in &self.extra {
            if !is_env_name(name) {
                return Err(RelayError::InvalidParameter(format!(
                    "'{name}' is not a valid environment variable name"
                )));
            }
            vars.push((name.clone(), value.clone()));
        }
        Ok(vars)
    }
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Path or name of the transfer tool.
    pub program: PathBuf,
    pub env: EnvSettings,
    pub strategy: InvocationStrategy,
    pub legacy_encoding: LegacyEncoding,
    pub threads: u32,
    pub concurrency: u32,
    pub download_dir: Option<PathBuf>,
    /// Prefix plain log lines with the label of the item being transferred.
    pub label_plain_lines: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        let program = if cfg!(windows) { "tdl.exe" } else { "tdl" };
        Self {
            program: PathBuf::from(program),
            env: EnvSettings::default(),
            strategy: InvocationStrategy::default(),
            legacy_encoding: LegacyEncoding::default(),
            threads: 4,
            concurrency: 2,
            download_dir: None,
            label_plain_lines: false,
        }
    }
}

impl RelaySettings {
    /// Executable stem used by the process sweep, e.g. `tdl` for `C:\bin\tdl.exe`.
    pub fn program_stem(&self) -> Option<String> {
        program_stem(&self.program)
    }
}

pub(crate) fn program_stem(program: &Path) -> Option<String> {
    program
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_skip_blank_proxy_and_reject_bad_names() {
        let mut env = EnvSettings {
            proxy: Some("  ".to_string()),
            ..EnvSettings::default()
        };
        env.extra.insert("HTTP_TIMEOUT".to_string(), "30".to_string());
        let vars = env.vars().unwrap();
        assert_eq!(
            vars,
            vec![
                ("TDL_NS".to_string(), "quickstart".to_string()),
                ("HTTP_TIMEOUT".to_string(), "30".to_string()),
            ]
        );

        env.extra.insert("1BAD".to_string(), "x".to_string());
        assert!(matches!(env.vars(), Err(RelayError::InvalidParameter(_))));
    }

    #[test]
    fn stem_drops_directory_and_extension() {
        assert_eq!(program_stem(Path::new("/opt/bin/tdl")), Some("tdl".to_string()));
        assert_eq!(program_stem(Path::new("tools/tdl.exe")), Some("tdl".to_string()));
    }
}
