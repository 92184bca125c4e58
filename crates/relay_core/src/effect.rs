use crate::ProgressView;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append one line to the lane's log.
    Log(String),
    /// Progress display changed enough to be worth redrawing.
    Progress(ProgressView),
}
