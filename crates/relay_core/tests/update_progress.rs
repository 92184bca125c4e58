use std::sync::Once;

use relay_core::{
    update, BatchMode, Effect, Msg, ProgressEvent, ProgressState, ProgressView, RunOutcome,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn started(index: usize, label: &str) -> Msg {
    Msg::Event(ProgressEvent::ItemStarted {
        index,
        label: label.to_string(),
    })
}

fn finished(index: usize, label: &str) -> Msg {
    Msg::Event(ProgressEvent::ItemFinished {
        index,
        label: label.to_string(),
    })
}

fn progress(percent: f64) -> Msg {
    Msg::Event(ProgressEvent::ProgressUpdate {
        item_percent: Some(percent),
        throughput: None,
    })
}

fn run(state: ProgressState, msgs: Vec<Msg>) -> (ProgressState, Vec<Effect>) {
    let mut state = state;
    let mut all = Vec::new();
    for msg in msgs {
        let (next, effects) = update(state, msg);
        state = next;
        all.extend(effects);
    }
    (state, all)
}

fn views(effects: &[Effect]) -> Vec<ProgressView> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Progress(view) => Some(view.clone()),
            Effect::Log(_) => None,
        })
        .collect()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.05
}

#[test]
fn three_single_items_walk_the_overall_bar() {
    init_logging();
    let (state, effects) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 3,
                mode: BatchMode::Single,
                label: "download batch".to_string(),
            },
            started(1, "a"),
            progress(50.0),
            progress(100.0),
            finished(1, "a"),
            started(2, "b"),
            finished(2, "b"),
            started(3, "c"),
            finished(3, "c"),
        ],
    );

    let overall: Vec<f64> = views(&effects).iter().map(|v| v.overall_percent).collect();
    for expected in [16.67, 33.33, 66.67, 100.0] {
        assert!(
            overall.iter().any(|value| close(*value, expected)),
            "expected {expected} in {overall:?}"
        );
    }
    assert!(overall.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(state.completed(), 3);
    assert_eq!(state.total(), 3);
}

#[test]
fn completed_count_never_passes_total() {
    init_logging();
    let (state, effects) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 1,
                mode: BatchMode::Single,
                label: "upload batch".to_string(),
            },
            finished(1, "a"),
            finished(1, "a"),
            finished(2, "stray"),
        ],
    );
    assert_eq!(state.completed(), 1);
    let completed: Vec<usize> = views(&effects).iter().map(|v| v.completed).collect();
    assert!(completed.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(completed.iter().all(|count| *count <= 1));
}

#[test]
fn finished_item_shows_full_bar_until_next_start() {
    init_logging();
    let (state, _) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 2,
                mode: BatchMode::Single,
                label: "download batch".to_string(),
            },
            started(1, "a"),
            progress(20.0),
            finished(1, "a"),
        ],
    );
    assert_eq!(state.item_percent(), 100.0);

    let (state, _) = update(state, started(2, "b"));
    assert_eq!(state.item_percent(), 0.0);
    assert_eq!(state.label(), "b");
    assert!(close(state.overall_percent(), 50.0));
}

#[test]
fn merged_mode_reports_tool_percentage_directly() {
    init_logging();
    let (state, _) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 4,
                mode: BatchMode::Merged,
                label: "upload batch".to_string(),
            },
            started(1, "4 items"),
            progress(40.0),
            progress(30.0),
        ],
    );
    assert_eq!(state.item_percent(), 30.0);
    assert_eq!(state.overall_percent(), 40.0);

    let (state, _) = update(state, finished(3, "c.jpg"));
    assert_eq!(state.completed(), 3);
    assert_eq!(state.overall_percent(), 75.0);
}

#[test]
fn tiny_moves_do_not_redraw() {
    init_logging();
    let (state, _) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 1,
                mode: BatchMode::Single,
                label: "download batch".to_string(),
            },
            progress(10.0),
        ],
    );
    let (state, effects) = update(state, progress(10.005));
    assert!(views(&effects).is_empty());

    let (_, effects) = update(state, progress(10.5));
    assert_eq!(views(&effects).len(), 1);
}

#[test]
fn throughput_holds_until_the_run_ends() {
    init_logging();
    let (state, _) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 1,
                mode: BatchMode::Single,
                label: "download batch".to_string(),
            },
            Msg::Event(ProgressEvent::ProgressUpdate {
                item_percent: None,
                throughput: Some(13_107_200.0),
            }),
            Msg::Event(ProgressEvent::PlainLine {
                text: "waiting for peer".to_string(),
            }),
            progress(60.0),
        ],
    );
    assert_eq!(state.view().throughput_text, "12.50 MB/s");

    let (state, effects) = update(state, Msg::RunFinished(RunOutcome::Failed { code: Some(2) }));
    assert_eq!(state.view().throughput_text, "0 B/s");
    assert!(!state.is_running());
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Log(line) if line.contains("failed with exit code 2")
    )));
    assert_eq!(state.completed(), 0);
}

#[test]
fn successful_run_fills_both_bars() {
    init_logging();
    let (state, _) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 2,
                mode: BatchMode::Merged,
                label: "download batch".to_string(),
            },
            progress(70.0),
            Msg::RunFinished(RunOutcome::Success),
        ],
    );
    let view = state.view();
    assert_eq!(view.overall_text, "100%");
    assert_eq!(view.item_text, "100%");
    assert_eq!(view.completed, 2);
}

#[test]
fn plain_lines_become_log_effects() {
    init_logging();
    let (_, effects) = update(
        ProgressState::new(),
        Msg::Event(ProgressEvent::PlainLine {
            text: "hello".to_string(),
        }),
    );
    assert_eq!(effects[0], Effect::Log("hello".to_string()));
}

#[test]
fn merged_logs_count_items_not_steps() {
    init_logging();
    let (_, effects) = run(
        ProgressState::new(),
        vec![
            Msg::RunStarted {
                total: 2,
                mode: BatchMode::Merged,
                label: "upload batch".to_string(),
            },
            started(1, "2 items"),
            finished(1, "a.jpg"),
            finished(2, "b.jpg"),
            finished(1, "2 items"),
        ],
    );
    let lines: Vec<&str> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Log(line) => Some(line.as_str()),
            Effect::Progress(_) => None,
        })
        .collect();
    assert_eq!(
        lines,
        vec![
            "Starting upload batch: 2 item(s)",
            "Started: 2 items",
            "Finished (1/2): a.jpg",
            "Finished (2/2): b.jpg",
            "Finished (2/2): 2 items",
        ]
    );
}
