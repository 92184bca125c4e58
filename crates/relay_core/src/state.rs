use crate::view_model::percent_text;
use crate::{format_rate, BatchMode, ProgressView, RunOutcome};

/// Aggregated progress of one lane.
///
/// Invariants: `completed <= total`, percentages stay within `[0, 100]`, and
/// the overall percentage never decreases between `reset` and `finish_run`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressState {
    mode: BatchMode,
    total: usize,
    completed: usize,
    current_index: Option<usize>,
    label: String,
    item_percent: f64,
    overall_percent: f64,
    throughput: Option<f64>,
    running: bool,
    last_emitted: Option<ProgressView>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn item_percent(&self) -> f64 {
        self.item_percent
    }

    pub fn overall_percent(&self) -> f64 {
        self.overall_percent
    }

    /// Last observed throughput in bytes per second.
    pub fn throughput(&self) -> Option<f64> {
        self.throughput
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn view(&self) -> ProgressView {
        ProgressView {
            label: self.label.clone(),
            current_index: self.current_index,
            item_percent: self.item_percent,
            overall_percent: self.overall_percent,
            item_text: percent_text(self.item_percent),
            overall_text: percent_text(self.overall_percent),
            throughput_text: format_rate(self.throughput.unwrap_or(0.0)),
            completed: self.completed,
            total: self.total,
        }
    }

    /// Returns the current view if it differs from the last one handed out.
    pub fn take_changed_view(&mut self) -> Option<ProgressView> {
        let view = self.view();
        let changed = match &self.last_emitted {
            Some(previous) => view.differs_from(previous),
            None => true,
        };
        if changed {
            self.last_emitted = Some(view.clone());
            Some(view)
        } else {
            None
        }
    }

    pub(crate) fn reset(&mut self, total: usize, mode: BatchMode, label: String) {
        *self = Self {
            mode,
            total,
            label,
            running: true,
            ..Self::default()
        };
    }

    pub(crate) fn start_item(&mut self, index: usize, label: String) {
        self.current_index = Some(index);
        self.label = label;
        self.item_percent = 0.0;
        self.refresh_overall();
    }

    pub(crate) fn apply_progress(&mut self, item_percent: Option<f64>, throughput: Option<f64>) {
        if let Some(percent) = item_percent {
            self.item_percent = clamp_percent(percent);
            match self.mode {
                BatchMode::Single => self.refresh_overall(),
                BatchMode::Merged => self.raise_overall(self.item_percent),
            }
        }
        if let Some(rate) = throughput {
            if rate.is_finite() && rate >= 0.0 {
                self.throughput = Some(rate);
            }
        }
    }

    pub(crate) fn finish_item(&mut self, index: usize) {
        let next = match self.mode {
            BatchMode::Single => self.completed.saturating_add(1),
            BatchMode::Merged => self.completed.max(index),
        };
        self.completed = next.min(self.total);
        self.item_percent = 100.0;
        match self.mode {
            // The finished item is already counted in `completed`.
            BatchMode::Single => self.raise_overall(self.completed_share()),
            BatchMode::Merged => self.refresh_overall(),
        }
    }

    pub(crate) fn finish_run(&mut self, outcome: &RunOutcome) {
        if outcome.is_success() {
            self.completed = self.total;
            self.item_percent = 100.0;
            self.overall_percent = 100.0;
        }
        self.throughput = None;
        self.running = false;
    }

    fn completed_share(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    fn refresh_overall(&mut self) {
        let computed = match self.mode {
            BatchMode::Single if self.total > 0 => {
                (self.completed as f64 + self.item_percent / 100.0) / self.total as f64 * 100.0
            }
            BatchMode::Single => 0.0,
            BatchMode::Merged => self.completed_share(),
        };
        self.raise_overall(computed);
    }

    fn raise_overall(&mut self, candidate: f64) {
        self.overall_percent = self.overall_percent.max(clamp_percent(candidate));
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
