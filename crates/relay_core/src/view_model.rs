/// Smallest percentage movement that is worth a redraw.
pub const PERCENT_EPSILON: f64 = 0.01;

const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';

/// UI-ready projection of a lane's progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressView {
    pub label: String,
    pub current_index: Option<usize>,
    pub item_percent: f64,
    pub overall_percent: f64,
    pub item_text: String,
    pub overall_text: String,
    pub throughput_text: String,
    pub completed: usize,
    pub total: usize,
}

impl ProgressView {
    /// True when redrawing `self` over `previous` would show something new.
    pub fn differs_from(&self, previous: &ProgressView) -> bool {
        (self.item_percent - previous.item_percent).abs() >= PERCENT_EPSILON
            || (self.overall_percent - previous.overall_percent).abs() >= PERCENT_EPSILON
            || self.item_text != previous.item_text
            || self.overall_text != previous.overall_text
            || self.throughput_text != previous.throughput_text
            || self.label != previous.label
            || self.current_index != previous.current_index
            || self.completed != previous.completed
            || self.total != previous.total
    }
}

/// Integer percent label, truncated like a progress bar caption: `"45%"`.
pub fn percent_text(percent: f64) -> String {
    format!("{}%", percent.clamp(0.0, 100.0).floor() as u32)
}

/// Text progress bar: `[█████░░░░░] 50.0%`.
pub fn render_bar(percent: f64, width: usize) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = ((width as f64) * percent / 100.0).floor() as usize;
    let filled = filled.min(width);
    let mut bar = String::with_capacity(width * 3 + 10);
    bar.push('[');
    bar.extend(std::iter::repeat(BAR_FILLED).take(filled));
    bar.extend(std::iter::repeat(BAR_EMPTY).take(width - filled));
    bar.push(']');
    format!("{bar} {percent:.1}%")
}
