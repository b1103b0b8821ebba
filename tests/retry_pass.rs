#[path = "common/mod.rs"]
mod common;

use common::*;
use rosterize::{FailureLedger, RetryState, RosterPipeline};
use std::sync::Arc;
use std::time::Duration;

fn pipeline(base: &std::path::Path) -> RosterPipeline {
    RosterPipeline::new()
        .base_dir(base)
        .progress(false)
        .retry_backoff(Duration::from_millis(1))
}

fn split_and_fail(base: &std::path::Path, failing: &[&str]) -> FailureLedger {
    let master = base.join("Guntur District.xlsx");
    let rows = vec![
        member_row("1", "Tenali", "J-1", "Member A", "9000000001", "Ravi", "8000000001"),
        member_row("2", "Tenali", "J-2", "Member B", "9000000002", "Kiran", "8000000002"),
    ];
    write_master(&master, &[("Mandal List", rows)]);
    pipeline(base).split(&master).unwrap();

    let backend = Arc::new(MockBackend::flaky(failing, usize::MAX));
    pipeline(base).export_with(backend, "Guntur", None).unwrap();
    FailureLedger::new(&base.join("pdfs_guntur").join("mandal list"), "mandal list")
}

/// A file that fails once then converts on retry is pruned from the ledger,
/// and the empty ledger disappears.
#[test]
fn retry_recovers_and_prunes_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = split_and_fail(dir.path(), &["Kiran.xlsx"]);
    assert_eq!(ledger.read().unwrap(), vec!["Kiran.xlsx"]);

    // The retry backend succeeds on the first attempt.
    let backend = Arc::new(MockBackend::reliable());
    let report = pipeline(dir.path()).retry_with(backend).unwrap();

    assert_eq!(report.tags.len(), 1);
    assert_eq!(report.tags[0].attempted, 1);
    assert_eq!(report.tags[0].succeeded, 1);
    assert_eq!(report.tags[0].still_failing, 0);
    assert_eq!(report.tags[0].files[0].state, RetryState::Succeeded);
    assert!(!ledger.exists());
    assert!(dir
        .path()
        .join("pdfs_guntur/mandal list/Kiran.pdf")
        .is_file());
}

/// A file that keeps failing exhausts its attempts and stays on the ledger.
#[test]
fn retry_keeps_persistent_failures() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = split_and_fail(dir.path(), &["Kiran.xlsx"]);

    let backend = Arc::new(MockBackend::flaky(&["Kiran.xlsx"], usize::MAX));
    let state = backend.state.clone();
    let report = pipeline(dir.path())
        .retry_attempts(3)
        .retry_with(backend)
        .unwrap();

    assert_eq!(report.tags[0].still_failing, 1);
    let file = &report.tags[0].files[0];
    assert_eq!(file.state, RetryState::StillFailing);
    assert_eq!(file.attempts, 3);
    assert!(file.last_error.is_some());
    assert_eq!(*state.attempts.lock().unwrap().get("Kiran.pdf").unwrap(), 3);
    assert_eq!(ledger.read().unwrap(), vec!["Kiran.xlsx"]);
}

/// Flakiness that clears on the second attempt succeeds within the budget.
#[test]
fn retry_succeeds_after_transient_failures() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = split_and_fail(dir.path(), &["Kiran.xlsx"]);

    let backend = Arc::new(MockBackend::flaky(&["Kiran.xlsx"], 1));
    let report = pipeline(dir.path())
        .retry_attempts(3)
        .retry_with(backend)
        .unwrap();

    let file = &report.tags[0].files[0];
    assert_eq!(file.state, RetryState::Succeeded);
    assert_eq!(file.attempts, 2);
    assert!(!ledger.exists());
}

/// The retry pass repairs bad contact values in the source sheet before
/// re-exporting it.
#[test]
fn retry_repairs_sheet_before_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    // The raw master carries an error marker that the split scrubs; poison
    // the rendered sheet afterwards to simulate a sheet edited by hand.
    let rows = vec![member_row("1", "Tenali", "J-1", "Member A", "9000000001", "Ravi", "8000000001")];
    write_master(&master, &[("Mandal List", rows)]);
    pipeline(dir.path()).split(&master).unwrap();

    let backend = Arc::new(MockBackend::flaky(&["Ravi.xlsx"], usize::MAX));
    pipeline(dir.path()).export_with(backend, "Guntur", None).unwrap();

    let sheet = dir.path().join("excels_guntur/mandal list/Ravi.xlsx");
    // Rewrite the sheet with a broken phone value.
    let mut grid = read_sheet_rows(&sheet);
    assert_eq!(grid[2][4], "9000000001");
    grid[2][4] = "#N/A".to_string();
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let ws = workbook.add_worksheet();
    for (ri, row) in grid.iter().enumerate() {
        for (ci, value) in row.iter().enumerate() {
            if !value.is_empty() {
                ws.write_string(ri as u32, ci as u16, value).unwrap();
            }
        }
    }
    workbook.save(&sheet).unwrap();

    let backend = Arc::new(MockBackend::reliable());
    pipeline(dir.path()).retry_with(backend).unwrap();

    let repaired = read_sheet_rows(&sheet);
    assert_eq!(repaired[2][4], "1111111111");
}

/// Ledgers from several tabs are all visited in one pass.
#[test]
fn retry_walks_every_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let north = vec![member_row("1", "Tenali", "J-1", "A", "9000000001", "Ravi", "8000000001")];
    let south = vec![member_row("1", "Bapatla", "J-2", "B", "9000000002", "Asha", "8000000002")];
    write_master(&master, &[("North", north), ("South", south)]);
    pipeline(dir.path()).split(&master).unwrap();

    let backend = Arc::new(MockBackend::flaky(&["Ravi.xlsx", "Asha.xlsx"], usize::MAX));
    pipeline(dir.path()).export_with(backend, "Guntur", None).unwrap();

    let backend = Arc::new(MockBackend::reliable());
    let report = pipeline(dir.path()).retry_with(backend).unwrap();

    let mut tags: Vec<&str> = report.tags.iter().map(|t| t.tag.as_str()).collect();
    tags.sort();
    assert_eq!(tags, vec!["north", "south"]);
    assert!(report.unreadable_ledgers.is_empty());
}

/// A ledger that cannot be parsed is reported and skipped, and the file is
/// left on disk untouched while healthy tabs still get their pass.
#[test]
fn retry_skips_unreadable_ledgers() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let north = vec![member_row("1", "Tenali", "J-1", "A", "9000000001", "Ravi", "8000000001")];
    let south = vec![member_row("1", "Bapatla", "J-2", "B", "9000000002", "Asha", "8000000002")];
    write_master(&master, &[("North", north), ("South", south)]);
    pipeline(dir.path()).split(&master).unwrap();

    let backend = Arc::new(MockBackend::flaky(&["Ravi.xlsx", "Asha.xlsx"], usize::MAX));
    pipeline(dir.path()).export_with(backend, "Guntur", None).unwrap();

    // Clobber one ledger with bytes no parser will accept.
    let bad = dir.path().join("pdfs_guntur/north/failed_list_north.xlsx");
    std::fs::write(&bad, b"garbage bytes").unwrap();

    let backend = Arc::new(MockBackend::reliable());
    let report = pipeline(dir.path()).retry_with(backend).unwrap();

    assert_eq!(report.unreadable_ledgers.len(), 1);
    assert!(report.unreadable_ledgers[0].ends_with("failed_list_north.xlsx"));
    // The broken file stays as-is: deleting it would erase the retry signal.
    assert_eq!(std::fs::read(&bad).unwrap(), b"garbage bytes");

    assert_eq!(report.tags.len(), 1);
    assert_eq!(report.tags[0].tag, "south");
    assert_eq!(report.tags[0].succeeded, 1);
    assert!(dir.path().join("pdfs_guntur/south/Asha.pdf").is_file());
}

/// A file listed in a ledger whose source sheet is gone is reported as still
/// failing without touching the backend.
#[test]
fn retry_reports_missing_sources() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = split_and_fail(dir.path(), &["Kiran.xlsx"]);
    std::fs::remove_file(dir.path().join("excels_guntur/mandal list/Kiran.xlsx")).unwrap();

    let backend = Arc::new(MockBackend::reliable());
    let state = backend.state.clone();
    let report = pipeline(dir.path()).retry_with(backend).unwrap();

    let file = &report.tags[0].files[0];
    assert_eq!(file.state, RetryState::StillFailing);
    assert_eq!(file.attempts, 0);
    assert!(state.attempts.lock().unwrap().is_empty());
    assert_eq!(ledger.read().unwrap(), vec!["Kiran.xlsx"]);
}
