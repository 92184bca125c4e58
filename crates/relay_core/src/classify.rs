//! Line classifier for tool output.
//!
//! Every check is a fixed-format pattern. The bar pattern and the completion
//! wording follow what current `tdl` releases print; other renderings simply
//! fall through to the bare patterns or to plain log lines.

use std::sync::OnceLock;

use regex::Regex;

use crate::{rate_from_parts, BatchMode, ProgressEvent, MARKER_TOKEN};

const BAR_FILLED: &[char] = &['█', '#', '=', '>', '■', '▉', '▊', '▋', '▌', '▍', '▎', '▏'];
const BAR_EMPTY: &[char] = &['░', '.', ' ', '-', '□', '_'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveItem {
    pub index: usize,
    pub label: String,
}

/// The small amount of context carried from one line to the next.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifierState {
    mode: BatchMode,
    label_plain_lines: bool,
    active: Option<ActiveItem>,
    tool_completions: usize,
}

impl ClassifierState {
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Prefix plain log lines with the active item's label.
    pub fn with_label_prefix(mut self, enabled: bool) -> Self {
        self.label_plain_lines = enabled;
        self
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn active(&self) -> Option<&ActiveItem> {
        self.active.as_ref()
    }

    /// Completions inferred from the tool's own output (merged mode).
    pub fn tool_completions(&self) -> usize {
        self.tool_completions
    }
}

struct Patterns {
    start: Regex,
    done: Regex,
    noise: Regex,
    bar: Regex,
    percent: Regex,
    rate: Regex,
    completion: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let token = regex::escape(MARKER_TOKEN);
        Patterns {
            start: Regex::new(&format!(r"^{token} START (\d+)/(\d+)(?::\s?(.*))?$"))
                .expect("valid start marker regex"),
            done: Regex::new(&format!(r"^{token} DONE (\d+)/(\d+)(?::\s?(.*))?$"))
                .expect("valid done marker regex"),
            noise: Regex::new(r"(?i)^CPU:\s*\d+(?:\.\d+)?\s*%.*\bMemory:")
                .expect("valid telemetry regex"),
            bar: Regex::new(
                r"\[(?P<bar>[^\[\]]{2,})\][^\[\]]*\[\s*(?P<secs>\d+(?:\.\d+)?)s;\s*(?P<num>\d+(?:\.\d+)?)\s*(?P<unit>[A-Za-z]{1,4})/s\s*\]",
            )
            .expect("valid bar regex"),
            percent: Regex::new(r"(\d+(?:\.\d+)?)\s?%").expect("valid percent regex"),
            rate: Regex::new(r"(\d+(?:\.\d+)?)\s*([A-Za-z]{1,3})/s\b").expect("valid rate regex"),
            completion: Regex::new(r"(?i)^(?P<label>.*?)\s*->.*\bdone\b")
                .expect("valid completion regex"),
        }
    })
}

/// Classify one normalized line.
///
/// Pure: the same state and line always give the same event and next state.
pub fn classify(state: &ClassifierState, line: &str) -> (Option<ProgressEvent>, ClassifierState) {
    let mut next = state.clone();
    let line = line.trim();
    if line.is_empty() {
        return (None, next);
    }
    let p = patterns();

    if let Some(caps) = p.start.captures(line) {
        if let Some(index) = parse_index(&caps[1]) {
            let label = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            next.active = Some(ActiveItem {
                index,
                label: label.clone(),
            });
            return (Some(ProgressEvent::ItemStarted { index, label }), next);
        }
    }

    if let Some(caps) = p.done.captures(line) {
        if let Some(index) = parse_index(&caps[1]) {
            let label = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|label| !label.is_empty())
                .or_else(|| {
                    state
                        .active
                        .as_ref()
                        .filter(|active| active.index == index)
                        .map(|active| active.label.clone())
                })
                .unwrap_or_default();
            next.active = None;
            return (Some(ProgressEvent::ItemFinished { index, label }), next);
        }
    }

    if p.noise.is_match(line) {
        return (None, next);
    }

    if state.mode == BatchMode::Merged {
        if let Some(caps) = p.completion.captures(line) {
            next.tool_completions = state.tool_completions + 1;
            let label = caps["label"].trim();
            let label = if label.is_empty() {
                format!("item {}", next.tool_completions)
            } else {
                label.to_string()
            };
            return (
                Some(ProgressEvent::ItemFinished {
                    index: next.tool_completions,
                    label,
                }),
                next,
            );
        }
    }

    if let Some(caps) = p.bar.captures(line) {
        if let Some(percent) = bar_fill_percent(&caps["bar"]) {
            return (
                Some(ProgressEvent::ProgressUpdate {
                    item_percent: Some(percent),
                    throughput: rate_from_parts(&caps["num"], &caps["unit"]),
                }),
                next,
            );
        }
    }

    let item_percent = p
        .percent
        .captures(line)
        .and_then(|caps| caps[1].parse::<f64>().ok());
    let throughput = p
        .rate
        .captures(line)
        .and_then(|caps| rate_from_parts(&caps[1], &caps[2]));
    if item_percent.is_some() || throughput.is_some() {
        return (
            Some(ProgressEvent::ProgressUpdate {
                item_percent,
                throughput,
            }),
            next,
        );
    }

    let text = match (&state.active, state.label_plain_lines) {
        (Some(active), true) if !active.label.is_empty() => format!("[{}] {line}", active.label),
        _ => line.to_string(),
    };
    (Some(ProgressEvent::PlainLine { text }), next)
}

fn parse_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|index| *index > 0)
}

/// Share of fill characters inside a bar, or `None` if it is not a bar.
fn bar_fill_percent(bar: &str) -> Option<f64> {
    let mut filled = 0usize;
    let mut total = 0usize;
    for c in bar.chars() {
        if BAR_FILLED.contains(&c) {
            filled += 1;
        } else if !BAR_EMPTY.contains(&c) {
            return None;
        }
        total += 1;
    }
    if total == 0 || bar.chars().all(|c| c == ' ') {
        return None;
    }
    Some(filled as f64 * 100.0 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fill_counts_mixed_characters() {
        assert_eq!(bar_fill_percent("##.."), Some(50.0));
        assert_eq!(bar_fill_percent("████░░░░░░"), Some(40.0));
        assert_eq!(bar_fill_percent("INFO"), None);
        assert_eq!(bar_fill_percent("    "), None);
    }
}
