#[path = "common/mod.rs"]
mod common;

use common::*;
use rosterize::RosterPipeline;

fn pipeline(base: &std::path::Path) -> RosterPipeline {
    RosterPipeline::new().base_dir(base).progress(false)
}

/// Five member rows across two volunteers plus two same-named volunteers with
/// different numbers: every named row lands in exactly one sheet, and the
/// duplicated name gets a phone suffix on both files.
#[test]
fn split_groups_rows_and_disambiguates_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let rows = vec![
        member_row("1", "Tenali", "J-100", "Member A", "9000000001", "Ravi", "8000000001"),
        member_row("2", "Tenali", "J-101", "Member B", "9000000002", "Ravi", "8000000001"),
        member_row("3", "Bapatla", "J-102", "Member C", "9000000003", "Asha", "8000000002"),
        member_row("4", "Bapatla", "J-103", "Member D", "9000000004", "Asha", "8000000003"),
        member_row("5", "Tenali", "J-104", "Member E", "9000000005", "Kiran", "8000000004"),
    ];
    write_master(&master, &[("Mandal List", rows)]);

    let report = pipeline(dir.path()).split(&master).unwrap();
    assert_eq!(report.district, "Guntur");
    assert_eq!(report.tabs.len(), 1);
    let tab = &report.tabs[0];
    assert_eq!(tab.rows, 5);
    assert_eq!(tab.skipped, 0);
    assert_eq!(tab.volunteers, 4);
    assert_eq!(tab.duplicate_names, 1);
    assert_eq!(tab.files_written, 4);
    assert_eq!(tab.write_failures, 0);

    let tab_dir = dir.path().join("excels_guntur").join("mandal list");
    assert_eq!(
        sheet_names_in(&tab_dir),
        vec![
            "Asha_8000000002.xlsx",
            "Asha_8000000003.xlsx",
            "Kiran.xlsx",
            "Ravi.xlsx",
        ]
    );
    // The pdf side of the tree is mirrored up front.
    assert!(dir.path().join("pdfs_guntur").join("mandal list").is_dir());
}

/// A rendered sheet carries the title, captions, payload columns and an empty
/// status column; the phone column survives as text.
#[test]
fn split_renders_title_captions_and_payload() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let rows = vec![
        member_row("1", "Tenali", "J-100", "Member A", "9000000001", "Ravi", "8000000001"),
        member_row("2", "Tenali", "J-101", "Member B", "9000000002", "Ravi", "8000000001"),
    ];
    write_master(&master, &[("Mandal List", rows)]);
    pipeline(dir.path()).split(&master).unwrap();

    let sheet = dir
        .path()
        .join("excels_guntur")
        .join("mandal list")
        .join("Ravi.xlsx");
    let grid = read_sheet_rows(&sheet);
    assert_eq!(
        grid[0][0],
        "Kriya VolunteerName: Ravi    Volunteer number: 8000000001"
    );
    assert_eq!(
        grid[1],
        vec!["S No", "Mandal", "JSP Id", "Name", "Mobile", "Status"]
    );
    assert_eq!(grid[2][0], "1");
    assert_eq!(grid[2][1], "Tenali");
    assert_eq!(grid[2][2], "J-100");
    assert_eq!(grid[2][3], "Member A");
    assert_eq!(grid[2][4], "9000000001");
    assert_eq!(grid[3][0], "2");
    assert_eq!(grid[3][3], "Member B");
    // Status stays blank for the manual pass.
    assert!(grid[2].get(5).map(|s| s.is_empty()).unwrap_or(true));
}

/// Rows without a volunteer name are counted as skipped and produce no sheet.
#[test]
fn split_skips_unassigned_rows() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Krishna District.xlsx");
    let rows = vec![
        member_row("1", "Vijayawada", "J-1", "Member A", "9000000001", "Lakshmi", "8000000001"),
        member_row("2", "Vijayawada", "J-2", "Member B", "9000000002", "", ""),
        member_row("3", "Vijayawada", "J-3", "Member C", "9000000003", "  ", ""),
    ];
    write_master(&master, &[("North", rows)]);

    let report = pipeline(dir.path()).split(&master).unwrap();
    let tab = &report.tabs[0];
    assert_eq!(tab.rows, 3);
    assert_eq!(tab.skipped, 2);
    assert_eq!(tab.volunteers, 1);

    let tab_dir = dir.path().join("excels_krishna").join("north");
    assert_eq!(sheet_names_in(&tab_dir), vec!["Lakshmi.xlsx"]);
}

/// Splitting twice overwrites in place: same files, no strays.
#[test]
fn split_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let rows = vec![
        member_row("1", "Tenali", "J-1", "Member A", "9000000001", "Ravi", "8000000001"),
        member_row("2", "Tenali", "J-2", "Member B", "9000000002", "Kiran", "8000000002"),
    ];
    write_master(&master, &[("Mandal List", rows)]);

    let pipe = pipeline(dir.path());
    pipe.split(&master).unwrap();
    let first = sheet_names_in(&dir.path().join("excels_guntur").join("mandal list"));
    let report = pipe.split(&master).unwrap();
    let second = sheet_names_in(&dir.path().join("excels_guntur").join("mandal list"));
    assert_eq!(first, second);
    assert_eq!(report.tabs[0].files_written, 2);
}

/// Bad contact values in the master are scrubbed during the split, so the
/// rendered sheets never carry error markers.
#[test]
fn split_repairs_contact_values_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let rows = vec![
        member_row("1", "Tenali", "J-1", "Member A", "#ERROR!", "Ravi", "8000000001"),
        member_row("2", "Tenali", "J-2", "Member B", "90-000@000x02", "Ravi", "8000000001"),
    ];
    write_master(&master, &[("Mandal List", rows)]);

    let report = pipeline(dir.path()).split(&master).unwrap();
    assert_eq!(report.tabs[0].contact_fixes, 2);

    let grid = read_sheet_rows(
        &dir.path()
            .join("excels_guntur")
            .join("mandal list")
            .join("Ravi.xlsx"),
    );
    assert_eq!(grid[2][4], "1111111111");
    assert_eq!(grid[3][4], "90-00000002");
}

/// A disambiguating phone suffix with path-unsafe characters is sanitized,
/// so both sibling files still get written.
#[test]
fn split_sanitizes_phone_suffix_in_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let rows = vec![
        member_row("1", "Tenali", "J-1", "Member A", "9000000001", "Asha", "80/0000:01"),
        member_row("2", "Bapatla", "J-2", "Member B", "9000000002", "Asha", "8000000002"),
    ];
    write_master(&master, &[("Mandal List", rows)]);

    let report = pipeline(dir.path()).split(&master).unwrap();
    assert_eq!(report.tabs[0].files_written, 2);
    assert_eq!(report.tabs[0].write_failures, 0);

    let tab_dir = dir.path().join("excels_guntur").join("mandal list");
    assert_eq!(
        sheet_names_in(&tab_dir),
        vec!["Asha_8000000002.xlsx", "Asha_80_0000_01.xlsx"]
    );
}

/// Multi-tab masters produce one folder per tab, with the same volunteer
/// kept separate across tabs.
#[test]
fn split_keeps_tabs_separate() {
    let dir = tempfile::tempdir().unwrap();
    let master = dir.path().join("Guntur District.xlsx");
    let north = vec![member_row("1", "Tenali", "J-1", "A", "9000000001", "Ravi", "8000000001")];
    let south = vec![member_row("1", "Bapatla", "J-2", "B", "9000000002", "Ravi", "8000000001")];
    write_master(&master, &[("North Zone", north), ("South Zone", south)]);

    let report = pipeline(dir.path()).split(&master).unwrap();
    assert_eq!(report.tabs.len(), 2);

    let root = dir.path().join("excels_guntur");
    assert_eq!(sheet_names_in(&root.join("north zone")), vec!["Ravi.xlsx"]);
    assert_eq!(sheet_names_in(&root.join("south zone")), vec!["Ravi.xlsx"]);
}
