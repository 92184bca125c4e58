use std::path::PathBuf;

use pretty_assertions::assert_eq;
use relay_core::{
    compile, parse_urls, BatchError, BatchMode, JobBatch, Lane, LocalFile, ToolParams, Transport,
    WorkItem,
};

fn download_params(threads: u32, concurrency: u32) -> ToolParams {
    ToolParams {
        threads,
        concurrency,
        transport: Transport::Download {
            output_dir: None,
            skip_same: false,
            takeout: false,
        },
    }
}

fn upload_params(chat: &str) -> ToolParams {
    ToolParams {
        threads: 4,
        concurrency: 2,
        transport: Transport::Upload {
            chat: chat.to_string(),
            as_photo: true,
            delete_after: true,
        },
    }
}

#[test]
fn pasted_links_are_trimmed_and_blank_lines_dropped() {
    let items = parse_urls("  https://t.me/a/1 \n\n https://t.me/b/2\n   \n");
    assert_eq!(
        items,
        vec![
            WorkItem::remote("https://t.me/a/1"),
            WorkItem::remote("https://t.me/b/2"),
        ]
    );
}

#[test]
fn single_mode_brackets_every_item() {
    let batch = JobBatch::new(
        parse_urls("https://t.me/a/1\nhttps://t.me/b/2"),
        BatchMode::Single,
        download_params(4, 2),
    );
    let compiled = compile(&batch).unwrap();

    assert_eq!(compiled.lane, Lane::Download);
    assert_eq!(compiled.item_count, 2);
    assert_eq!(compiled.steps.len(), 2);

    let first = &compiled.steps[0];
    assert_eq!(first.index, 1);
    assert_eq!(first.total, 2);
    assert_eq!(
        first.args,
        vec!["dl", "-u", "https://t.me/a/1", "-t", "4", "-l", "2"]
    );
    assert_eq!(
        first.start_marker,
        "[RELAY_MARKER] START 1/2: https://t.me/a/1"
    );
    assert_eq!(first.done_marker, "[RELAY_MARKER] DONE 1/2: https://t.me/a/1");
    assert_eq!(
        compiled.steps[1].start_marker,
        "[RELAY_MARKER] START 2/2: https://t.me/b/2"
    );
}

#[test]
fn download_options_are_appended() {
    let params = ToolParams {
        threads: 8,
        concurrency: 1,
        transport: Transport::Download {
            output_dir: Some(PathBuf::from("downloads")),
            skip_same: true,
            takeout: true,
        },
    };
    let batch = JobBatch::new(parse_urls("https://t.me/a/1"), BatchMode::Single, params);
    let compiled = compile(&batch).unwrap();
    assert_eq!(
        compiled.steps[0].args,
        vec![
            "dl",
            "-u",
            "https://t.me/a/1",
            "-t",
            "8",
            "-l",
            "1",
            "-d",
            "downloads",
            "--skip-same",
            "--takeout"
        ]
    );
}

#[test]
fn merged_mode_emits_one_invocation_for_all_items() {
    let items = vec![
        WorkItem::local(LocalFile::new("/srv/a.jpg", "a.jpg")),
        WorkItem::local(LocalFile::new("/srv/sub/b.jpg", "sub/b.jpg")),
    ];
    let batch = JobBatch::new(items, BatchMode::Merged, upload_params(" me "));
    let compiled = compile(&batch).unwrap();

    assert_eq!(compiled.lane, Lane::Upload);
    assert_eq!(compiled.mode, BatchMode::Merged);
    assert_eq!(compiled.item_count, 2);
    assert_eq!(compiled.steps.len(), 1);
    let step = &compiled.steps[0];
    assert_eq!(step.label, "2 items");
    assert_eq!(step.start_marker, "[RELAY_MARKER] START 1/1: 2 items");
    assert_eq!(
        step.args,
        vec![
            "up",
            "-p",
            "/srv/a.jpg",
            "-p",
            "/srv/sub/b.jpg",
            "-c",
            "me",
            "-t",
            "4",
            "-l",
            "2",
            "--photo",
            "--rm"
        ]
    );
}

#[test]
fn bad_counts_are_rejected_before_anything_runs() {
    let items = parse_urls("https://t.me/a/1");
    let zero_threads = JobBatch::new(items.clone(), BatchMode::Single, download_params(0, 1));
    assert!(matches!(
        compile(&zero_threads),
        Err(BatchError::InvalidParameter(_))
    ));

    let zero_concurrency = JobBatch::new(items, BatchMode::Single, download_params(1, 0));
    assert!(matches!(
        compile(&zero_concurrency),
        Err(BatchError::InvalidParameter(_))
    ));
}

#[test]
fn empty_batches_are_rejected() {
    let batch = JobBatch::new(Vec::new(), BatchMode::Merged, download_params(1, 1));
    assert_eq!(compile(&batch), Err(BatchError::EmptyBatch));
}

#[test]
fn items_must_match_the_transfer_direction() {
    let upload_with_link = JobBatch::new(
        parse_urls("https://t.me/a/1"),
        BatchMode::Single,
        upload_params("me"),
    );
    assert!(matches!(
        compile(&upload_with_link),
        Err(BatchError::InvalidParameter(_))
    ));

    let no_chat = JobBatch::new(
        vec![WorkItem::local(LocalFile::from_path("/srv/a.jpg"))],
        BatchMode::Single,
        upload_params("   "),
    );
    assert!(matches!(
        compile(&no_chat),
        Err(BatchError::InvalidParameter(_))
    ));

    let bad_link = JobBatch::new(
        parse_urls("not a link"),
        BatchMode::Single,
        download_params(1, 1),
    );
    assert!(matches!(
        compile(&bad_link),
        Err(BatchError::InvalidParameter(_))
    ));
}
