use pretty_assertions::assert_eq;
use relay_engine::{LegacyEncoding, Normalizer};

#[test]
fn utf8_lines_pass_through() {
    let normalizer = Normalizer::new(&LegacyEncoding::None);
    let line = normalizer.normalize("下载完成 -> done\n".as_bytes());
    assert_eq!(line.text, "下载完成 -> done");
    assert_eq!(line.encoding, "UTF-8");
    assert!(!line.lossy);
}

#[test]
fn gbk_output_decodes_with_a_legacy_label() {
    let normalizer = Normalizer::new(&LegacyEncoding::Label("gbk".to_string()));
    let line = normalizer.normalize(&[0xCF, 0xC2, 0xD4, 0xD8]);
    assert_eq!(line.text, "下载");
    assert_eq!(line.encoding, "GBK");
}

#[test]
fn invalid_bytes_never_fail() {
    let normalizer = Normalizer::new(&LegacyEncoding::None);
    let line = normalizer.normalize(&[0x66, 0xFF, 0x6F]);
    assert!(line.text.contains('\u{FFFD}'));
    assert!(line.text.starts_with('f'));
    assert!(line.lossy);
}

#[test]
fn unknown_labels_fall_back_to_lossy_utf8() {
    let normalizer = Normalizer::new(&LegacyEncoding::Label("no-such-charset".to_string()));
    let line = normalizer.normalize(&[0xFF]);
    assert_eq!(line.text, "\u{FFFD}");
}

#[test]
fn colors_and_redraws_are_removed() {
    let normalizer = Normalizer::new(&LegacyEncoding::None);
    let raw = b"\x1b[32m[##...] 40%\x1b[0m\r\x1b[2K\x1b[32m[####.] 80%\x1b[0m\r\n";
    let line = normalizer.normalize(raw);
    assert_eq!(line.text, "[####.] 80%");
}
