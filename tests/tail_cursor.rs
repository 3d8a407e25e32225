// tests/tail_cursor.rs

use std::error::Error;
use std::path::Path;

use proptest::prelude::*;

use logbeacon::errors::{FileAccessError, WatcherError};
use logbeacon::fs::mock::MockFileSystem;
use logbeacon::tail::{ReadLimits, TailCursor};

type TestResult = Result<(), Box<dyn Error>>;

const LOG: &str = "/logs/app.log";

fn cursor_on(fs: &MockFileSystem, initial: &[u8], limits: ReadLimits) -> TailCursor {
    fs.add_file(LOG, initial.to_vec());
    TailCursor::open_at_end(fs, Path::new(LOG), limits).expect("open cursor")
}

#[test]
fn existing_content_is_skipped() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"old line\nERROR old\n", ReadLimits::default());

    assert_eq!(cursor.offset(), 19);
    assert!(cursor.read_new_lines()?.lines.is_empty());

    fs.append(LOG, b"new line\n");
    assert_eq!(cursor.read_new_lines()?.lines, vec!["new line"]);
    Ok(())
}

#[test]
fn partial_line_waits_for_its_newline() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());

    fs.append(LOG, b"ERROR: connec");
    assert!(cursor.read_new_lines()?.lines.is_empty());
    assert_eq!(cursor.pending_fragment(), b"ERROR: connec");

    fs.append(LOG, b"tion refused\nnext");
    assert_eq!(
        cursor.read_new_lines()?.lines,
        vec!["ERROR: connection refused"]
    );
    assert_eq!(cursor.pending_fragment(), b"next");
    Ok(())
}

#[test]
fn crlf_and_blank_lines_are_normalised() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());

    fs.append(LOG, b"one\r\n\r\n\ntwo\n");
    assert_eq!(cursor.read_new_lines()?.lines, vec!["one", "two"]);
    Ok(())
}

#[test]
fn truncation_restarts_from_the_top() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"a fairly long first generation\n", ReadLimits::default());

    fs.truncate(LOG, 0);
    fs.append(LOG, b"rotated\n");

    assert_eq!(cursor.read_new_lines()?.lines, vec!["rotated"]);
    assert_eq!(cursor.offset(), 8);
    Ok(())
}

#[test]
fn per_event_cap_defers_the_rest() -> TestResult {
    let fs = MockFileSystem::new();
    let limits = ReadLimits {
        chunk_size: 4,
        per_event_cap: 10,
        max_partial_line: 1024,
    };
    let mut cursor = cursor_on(&fs, b"", limits);

    fs.append(LOG, b"aaaa\nbbbb\ncccc\ndddd\n");

    let first = cursor.read_new_lines()?;
    assert_eq!(first.lines, vec!["aaaa", "bbbb"]);
    assert!(first.more_pending);

    let second = cursor.read_new_lines()?;
    assert_eq!(second.lines, vec!["cccc", "dddd"]);
    assert!(!second.more_pending);
    Ok(())
}

#[test]
fn split_multibyte_character_is_carried_over() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());

    let text = "überfall ✓\n".as_bytes();
    fs.append(LOG, &text[..1]);
    assert!(cursor.read_new_lines()?.lines.is_empty());

    fs.append(LOG, &text[1..]);
    assert_eq!(cursor.read_new_lines()?.lines, vec!["überfall ✓"]);
    Ok(())
}

#[test]
fn invalid_utf8_line_is_dropped_and_reading_continues() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());

    fs.append(LOG, b"bad \xff\xfe bytes\n");
    assert!(cursor.read_new_lines()?.lines.is_empty());

    fs.append(LOG, b"good\n");
    assert_eq!(cursor.read_new_lines()?.lines, vec!["good"]);
    Ok(())
}

#[test]
fn invalid_line_does_not_take_its_neighbours_with_it() -> TestResult {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());

    fs.append(LOG, b"ERROR ok\n\xff bad\nWARN after\n");
    assert_eq!(cursor.read_new_lines()?.lines, vec!["ERROR ok", "WARN after"]);
    Ok(())
}

#[test]
fn overlong_fragment_is_forced_out() -> TestResult {
    let fs = MockFileSystem::new();
    let limits = ReadLimits {
        max_partial_line: 8,
        ..ReadLimits::default()
    };
    let mut cursor = cursor_on(&fs, b"", limits);

    fs.append(LOG, b"0123456789");
    assert_eq!(cursor.read_new_lines()?.lines, vec!["0123456789"]);
    assert!(cursor.pending_fragment().is_empty());
    Ok(())
}

#[test]
fn open_errors_are_classified() {
    let fs = MockFileSystem::new();
    fs.add_dir("/logs");
    fs.add_file("/logs/secret.log", b"".to_vec());
    fs.deny("/logs/secret.log");

    let missing = TailCursor::open_at_end(&fs, Path::new("/logs/none.log"), ReadLimits::default());
    assert!(matches!(missing, Err(FileAccessError::Missing(_))));

    let dir = TailCursor::open_at_end(&fs, Path::new("/logs"), ReadLimits::default());
    assert!(matches!(dir, Err(FileAccessError::IsDirectory(_))));

    let denied =
        TailCursor::open_at_end(&fs, Path::new("/logs/secret.log"), ReadLimits::default());
    assert!(matches!(denied, Err(FileAccessError::Unreadable(_))));
}

#[test]
fn read_errors_map_to_watcher_errors() {
    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());
    fs.break_handles(LOG);
    assert!(matches!(
        cursor.read_new_lines(),
        Err(WatcherError::DescriptorInvalid(_))
    ));

    let fs = MockFileSystem::new();
    let mut cursor = cursor_on(&fs, b"", ReadLimits::default());
    fs.remove(LOG);
    assert!(matches!(
        cursor.read_new_lines(),
        Err(WatcherError::FileDeleted(_))
    ));
}

proptest! {
    /// However the appended text is split into writes and reads, every
    /// complete non-empty line comes out exactly once, in order.
    #[test]
    fn appended_lines_are_delivered_exactly_once(
        lines in proptest::collection::vec("[a-z ]{0,12}", 1..20),
        cuts in proptest::collection::vec(1usize..16, 1..10),
        cap in 3usize..32,
    ) {
        let fs = MockFileSystem::new();
        let limits = ReadLimits { chunk_size: 5, per_event_cap: cap, max_partial_line: 4096 };
        let mut cursor = cursor_on(&fs, b"", limits);

        let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
        let bytes = text.as_bytes();

        let mut seen = Vec::new();
        let mut pos = 0;
        let mut cut = cuts.iter().cycle();
        while pos < bytes.len() {
            let end = (pos + cut.next().copied().unwrap_or(1)).min(bytes.len());
            fs.append(LOG, &bytes[pos..end]);
            pos = end;
            loop {
                let outcome = cursor.read_new_lines().expect("read");
                seen.extend(outcome.lines);
                if !outcome.more_pending {
                    break;
                }
            }
        }

        let expected: Vec<String> = lines.into_iter().filter(|l| !l.is_empty()).collect();
        prop_assert_eq!(seen, expected);
        prop_assert!(cursor.pending_fragment().is_empty());
    }
}
