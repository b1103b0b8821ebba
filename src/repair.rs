//! Contact-field repair heuristics and corrupted-sheet recovery.
//!
//! Malformed phone values are the dominant cause of export failures, so the
//! retry path scrubs them before every attempt. The heuristic is idempotent:
//! repairing an already-repaired value changes nothing.

use crate::field::Field;
use crate::grouper::NAME_COL;
use crate::paths::sheet_files;
use crate::render::{self, VolunteerSheet, CAPTIONS};
use crate::source::{load_raw_rows, SourceLoader, SourceTable};
use crate::util::{copy_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

/// Fallback written wherever a contact value is missing or unusable.
pub const PHONE_SENTINEL: &str = "1111111111";

/// Files this small cannot be a workbook; skip the parse attempt.
const MIN_PLAUSIBLE_SHEET_BYTES: u64 = 512;

fn is_phone_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')')
}

/// Repair one contact value. Returns the repaired string and whether it
/// changed: empty and `#...` error-marker values become the sentinel, stray
/// characters are stripped, and a value stripped down to nothing falls back
/// to the sentinel too. Numeric cells pass through as digit strings.
pub fn repair_phone(field: &Field) -> (String, bool) {
    match field {
        Field::Empty => (PHONE_SENTINEL.to_string(), true),
        Field::Error(_) => (PHONE_SENTINEL.to_string(), true),
        Field::Number(_) => (field.display_string(), false),
        Field::Text(s) => {
            if s.trim().is_empty() || s.starts_with('#') {
                return (PHONE_SENTINEL.to_string(), true);
            }
            let cleaned: String = s.chars().filter(|c| is_phone_char(*c)).collect();
            if cleaned.is_empty() {
                (PHONE_SENTINEL.to_string(), true)
            } else {
                let changed = cleaned != *s;
                (cleaned, changed)
            }
        }
    }
}

/// Find the contact column of a loaded table by caption ("mobile"/"phone",
/// case-insensitive) and repair every value in it. Returns the number of
/// values fixed, or `None` when the table has no contact column.
pub fn clean_contact_column(table: &mut SourceTable) -> Option<usize> {
    let col = table
        .columns
        .iter()
        .position(|c| {
            let c = c.to_lowercase();
            c.contains("mobile") || c.contains("phone")
        })?;
    let mut fixed = 0;
    for row in &mut table.rows {
        if let Some(field) = row.get_mut(col) {
            let (value, changed) = repair_phone(field);
            if changed {
                *field = Field::Text(value);
                fixed += 1;
            }
        }
    }
    Some(fixed)
}

/// What an on-disk repair did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkbookRepair {
    pub fixed_values: usize,
    pub synthesized_column: bool,
}

impl WorkbookRepair {
    pub fn changed(&self) -> bool {
        self.fixed_values > 0 || self.synthesized_column
    }
}

/// Repair the contact column of a volunteer sheet on disk. The sheet is
/// rewritten through a temp file and atomically swapped in; when the sheet
/// has no contact column at all, one is synthesized with the sentinel in
/// every data row. Untouched sheets are left as-is.
pub fn repair_workbook(path: &Path) -> Result<WorkbookRepair> {
    let mut rows =
        load_raw_rows(path).with_context(|| format!("read sheet for repair {}", path.display()))?;

    // Locate the caption row and contact column; volunteer sheets have the
    // captions under a merged title, so scan the first few rows.
    let mut found: Option<(usize, usize)> = None;
    'scan: for (ri, row) in rows.iter().take(4).enumerate() {
        for (ci, field) in row.iter().enumerate() {
            let text = field.display_string().to_lowercase();
            if text.contains("mobile") || text.contains("phone") {
                found = Some((ri, ci));
                break 'scan;
            }
        }
    }

    let mut repair = WorkbookRepair::default();
    match found {
        Some((caption_row, col)) => {
            for row in rows.iter_mut().skip(caption_row + 1) {
                if let Some(field) = row.get_mut(col) {
                    let (value, changed) = repair_phone(field);
                    if changed {
                        *field = Field::Text(value);
                        repair.fixed_values += 1;
                    }
                }
            }
            if repair.fixed_values == 0 {
                return Ok(repair);
            }
            rewrite_sheet(path, &rows)?;
        }
        None => {
            // No contact column anywhere: synthesize one, sentinel throughout.
            let caption_row = 0;
            let width = rows.iter().map(Vec::len).max().unwrap_or(0);
            for (ri, row) in rows.iter_mut().enumerate() {
                row.resize(width, Field::Empty);
                if ri == caption_row {
                    row.push(Field::Text("Mobile".to_string()));
                } else {
                    row.push(Field::Text(PHONE_SENTINEL.to_string()));
                }
            }
            repair.synthesized_column = true;
            rewrite_sheet(path, &rows)?;
        }
    }
    Ok(repair)
}

/// Rewrite a sheet from raw rows. A recognizable volunteer sheet is rebuilt
/// through the renderer so it keeps its styling and print settings; anything
/// else gets a plain grid.
fn rewrite_sheet(path: &Path, rows: &[Vec<Field>]) -> Result<()> {
    let tmp = path.with_extension("repair.tmp.xlsx");
    if let Some(sheet) = as_volunteer_sheet(rows) {
        render::write_sheet(&sheet, &tmp)?;
    } else {
        write_plain_grid(&tmp, rows)?;
    }
    replace_file_atomic_backoff(&tmp, path)
        .with_context(|| format!("replace repaired sheet {}", path.display()))
}

/// Reconstruct the document model from rendered rows when the layout matches
/// the roster shape (merged title, then the standard captions).
fn as_volunteer_sheet(rows: &[Vec<Field>]) -> Option<VolunteerSheet> {
    let captions = rows.get(1)?;
    let matches = CAPTIONS
        .iter()
        .enumerate()
        .all(|(i, c)| captions.get(i).map(|f| f.display_string() == *c).unwrap_or(false));
    if !matches {
        return None;
    }
    let title = rows.first()?.first()?.display_string();
    let (name, number) = parse_title(&title)?;
    let data = rows[2..]
        .iter()
        .map(|r| {
            let pick = |i: usize| r.get(i).cloned().unwrap_or(Field::Empty);
            // Rendered columns 1..=4 hold Mandal, JSP Id, Name, Mobile.
            [pick(1), pick(2), pick(3), pick(4)]
        })
        .collect();
    Some(VolunteerSheet {
        name,
        number,
        rows: data,
    })
}

fn parse_title(title: &str) -> Option<(String, String)> {
    let rest = title.strip_prefix("Kriya VolunteerName:")?;
    let (name, number) = rest.split_once("Volunteer number:")?;
    Some((name.trim().to_string(), number.trim().to_string()))
}

fn write_plain_grid(path: &Path, rows: &[Vec<Field>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    for (ri, row) in rows.iter().enumerate() {
        for (ci, field) in row.iter().enumerate() {
            match field {
                Field::Number(n) => {
                    ws.write_number(ri as u32, ci as u16, *n)?;
                }
                Field::Empty => {}
                other => {
                    ws.write_string(ri as u32, ci as u16, &other.display_string())?;
                }
            }
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("write repaired grid {}", path.display()))?;
    Ok(())
}

/// Sheets in `dir` that look corrupted: unreadable by the parser, or too
/// small to be a real workbook.
pub fn find_corrupted(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for path in sheet_files(dir) {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size < MIN_PLAUSIBLE_SHEET_BYTES {
            out.push(path);
            continue;
        }
        if load_raw_rows(&path).is_err() {
            out.push(path);
        }
    }
    out
}

/// Rebuild a volunteer sheet from the master by entity name (the file stem).
/// The broken file is backed up to `<name>.xlsx.bak` first. Returns false
/// when the master has no rows for that name.
pub fn rebuild_from_master(
    master: &Path,
    sheet_path: &Path,
    loader: &dyn SourceLoader,
) -> Result<bool> {
    let name = sheet_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let tabs = loader.load(master)?;
    let mut group = collect_rows(&tabs, &name, None);
    if group.is_empty() {
        // Duplicate-name stems carry a phone suffix: "Asha_9998887777".
        if let Some((base, phone)) = name.rsplit_once('_') {
            group = collect_rows(&tabs, base, Some(phone));
        }
    }
    if group.is_empty() {
        return Ok(false);
    }
    if sheet_path.exists() {
        let backup = sheet_path.with_extension("xlsx.bak");
        copy_with_backoff(sheet_path, &backup, 8, 50)?;
    }
    let display_name = group
        .first()
        .and_then(|r| r.get(NAME_COL))
        .map(Field::display_string)
        .unwrap_or_else(|| name.clone());
    let sheet = VolunteerSheet::from_group(&display_name, &group);
    render::write_sheet(&sheet, sheet_path)?;
    Ok(true)
}

fn collect_rows(
    tabs: &[(String, SourceTable)],
    name: &str,
    phone: Option<&str>,
) -> Vec<Vec<Field>> {
    use crate::grouper::PHONE_COL;
    let mut out = Vec::new();
    for (_, table) in tabs {
        for row in &table.rows {
            if row.get(NAME_COL).map(Field::display_string).as_deref() != Some(name) {
                continue;
            }
            if let Some(p) = phone {
                if row.get(PHONE_COL).map(Field::display_string).as_deref() != Some(p) {
                    continue;
                }
            }
            out.push(row.clone());
        }
    }
    out
}
