use crate::{BatchMode, Effect, Msg, ProgressEvent, ProgressState, RunOutcome};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages must arrive in output order; the state never reorders them.
pub fn update(mut state: ProgressState, msg: Msg) -> (ProgressState, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::RunStarted { total, mode, label } => {
            effects.push(Effect::Log(format!("Starting {label}: {total} item(s)")));
            state.reset(total, mode, label);
        }
        Msg::Event(ProgressEvent::ItemStarted { index, label }) => {
            // A merged run has one step covering every item.
            effects.push(Effect::Log(match state.mode() {
                BatchMode::Single => format!("Started ({index}/{}): {label}", state.total()),
                BatchMode::Merged => format!("Started: {label}"),
            }));
            state.start_item(index, label);
        }
        Msg::Event(ProgressEvent::ProgressUpdate {
            item_percent,
            throughput,
        }) => {
            state.apply_progress(item_percent, throughput);
        }
        Msg::Event(ProgressEvent::ItemFinished { index, label }) => {
            state.finish_item(index);
            let done = match state.mode() {
                BatchMode::Single => index,
                BatchMode::Merged => state.completed(),
            };
            effects.push(Effect::Log(format!(
                "Finished ({done}/{}): {label}",
                state.total()
            )));
        }
        Msg::Event(ProgressEvent::PlainLine { text }) => {
            effects.push(Effect::Log(text));
        }
        Msg::RunFinished(outcome) => {
            state.finish_run(&outcome);
            effects.push(Effect::Log(match &outcome {
                RunOutcome::Success => format!(
                    "All {} item(s) completed successfully",
                    state.total()
                ),
                other => format!(
                    "Run ended: {other} ({}/{} item(s) completed)",
                    state.completed(),
                    state.total()
                ),
            }));
        }
    }

    if let Some(view) = state.take_changed_view() {
        effects.push(Effect::Progress(view));
    }
    (state, effects)
}
