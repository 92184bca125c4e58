use std::collections::VecDeque;
use std::io::{self, Write};

use chrono::Local;
use relay_core::{render_bar, Lane, ProgressView, RunOutcome};
use relay_engine::EngineEvent;

/// Lines kept per lane; older ones are dropped first.
pub const LOG_HISTORY_LIMIT: usize = 1000;
const BAR_WIDTH: usize = 24;

/// Timestamped log lines, capped at `LOG_HISTORY_LIMIT`.
#[derive(Debug, Default)]
pub struct LogHistory {
    lines: VecDeque<String>,
}

impl LogHistory {
    /// Stamp `text` with the local time and store it. Returns the stored line.
    pub fn push(&mut self, text: &str) -> &str {
        self.push_stamped(format!("[{}] {text}", Local::now().format("%H:%M:%S")))
    }

    fn push_stamped(&mut self, line: String) -> &str {
        if self.lines.len() == LOG_HISTORY_LIMIT {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.lines.back().map(String::as_str).unwrap_or_default()
    }
}

/// Draws engine events on a terminal: log lines scroll, the progress line
/// is redrawn in place.
pub struct TerminalRenderer<W: Write> {
    out: W,
    download: LogHistory,
    upload: LogHistory,
    status_visible: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            download: LogHistory::default(),
            upload: LogHistory::default(),
            status_visible: false,
        }
    }

    /// Render one event. Returns the outcome when the event ends a run.
    pub fn render(&mut self, event: &EngineEvent) -> io::Result<Option<RunOutcome>> {
        match event {
            EngineEvent::Log { lane, line, .. } => {
                self.log_line(*lane, line)?;
                Ok(None)
            }
            EngineEvent::Progress { lane, view, .. } => {
                self.status_line(*lane, view)?;
                Ok(None)
            }
            EngineEvent::RunFinished { lane, outcome, .. } => {
                self.clear_status()?;
                self.log_line(*lane, &format!("Run finished: {outcome}"))?;
                Ok(Some(outcome.clone()))
            }
        }
    }

    fn log_line(&mut self, lane: Lane, text: &str) -> io::Result<()> {
        self.clear_status()?;
        let history = match lane {
            Lane::Download => &mut self.download,
            Lane::Upload => &mut self.upload,
        };
        let line = history.push(text);
        writeln!(self.out, "{lane:>8} {line}")?;
        self.out.flush()
    }

    fn status_line(&mut self, lane: Lane, view: &ProgressView) -> io::Result<()> {
        let label = if view.label.is_empty() { "-" } else { view.label.as_str() };
        write!(
            self.out,
            "\r\x1b[2K{lane:>8} {} {}/{} {} | {label}",
            render_bar(view.overall_percent, BAR_WIDTH),
            view.completed,
            view.total,
            view.throughput_text,
        )?;
        self.status_visible = true;
        self.out.flush()
    }

    fn clear_status(&mut self) -> io::Result<()> {
        if self.status_visible {
            write!(self.out, "\r\x1b[2K")?;
            self.status_visible = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn history_drops_the_oldest_lines() {
        let mut history = LogHistory::default();
        for i in 0..LOG_HISTORY_LIMIT + 5 {
            history.push_stamped(format!("line {i}"));
        }
        assert_eq!(history.lines.len(), LOG_HISTORY_LIMIT);
        assert_eq!(history.lines.front().map(String::as_str), Some("line 5"));
    }

    #[test]
    fn pushed_lines_carry_a_clock_stamp() {
        let mut history = LogHistory::default();
        let line = history.push("hello").to_string();
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] hello");
    }

    #[test]
    fn progress_redraws_in_place_and_logs_clear_it() {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let view = ProgressView {
            label: "a.jpg".to_string(),
            overall_percent: 50.0,
            completed: 1,
            total: 2,
            throughput_text: "1.00 MB/s".to_string(),
            ..ProgressView::default()
        };
        renderer
            .render(&EngineEvent::Progress {
                lane: Lane::Upload,
                token: 1,
                view,
            })
            .unwrap();
        let outcome = renderer
            .render(&EngineEvent::RunFinished {
                lane: Lane::Upload,
                token: 1,
                outcome: RunOutcome::Success,
            })
            .unwrap();
        assert_eq!(outcome, Some(RunOutcome::Success));

        let text = String::from_utf8(renderer.out.clone()).unwrap();
        assert!(text.starts_with("\r\x1b[2K  upload [████████████░░░░░░░░░░░░] 50.0% 1/2 1.00 MB/s | a.jpg"));
        assert!(text.ends_with("Run finished: success\n"));
        assert_eq!(renderer.upload.lines.len(), 1);
        assert!(renderer.download.lines.is_empty());
    }
}
