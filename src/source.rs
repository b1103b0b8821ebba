//! Source loader seam: a master workbook becomes ordered tabs of rows.
//!
//! The pipeline core only depends on the [`SourceLoader`] contract; the
//! calamine-backed [`XlsxSource`] is the one real implementation.

use crate::field::Field;
use anyhow::{Context, Result};
use calamine::{open_workbook, Reader, Xlsx};
use std::path::Path;

/// One loaded tab: column captions from the header row plus data rows in
/// source order. Rows keep their original field positions.
#[derive(Clone, Debug, Default)]
pub struct SourceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Field>>,
}

pub trait SourceLoader {
    /// Load every tab of the workbook, preserving tab order and row order.
    fn load(&self, path: &Path) -> Result<Vec<(String, SourceTable)>>;
}

/// Reads `.xlsx` masters via calamine.
pub struct XlsxSource;

impl SourceLoader for XlsxSource {
    fn load(&self, path: &Path) -> Result<Vec<(String, SourceTable)>> {
        let mut workbook: Xlsx<_> = open_workbook(path)
            .with_context(|| format!("open master workbook {}", path.display()))?;
        let names = workbook.sheet_names().to_owned();
        let mut tabs = Vec::with_capacity(names.len());
        for name in names {
            let range = workbook
                .worksheet_range(&name)
                .with_context(|| format!("read tab '{}' of {}", name, path.display()))?;
            let mut rows = range
                .rows()
                .map(|r| r.iter().map(Field::from).collect::<Vec<Field>>());
            let columns = rows
                .next()
                .map(|header| header.iter().map(Field::display_string).collect())
                .unwrap_or_default();
            let table = SourceTable { columns, rows: rows.collect() };
            tabs.push((name, table));
        }
        Ok(tabs)
    }
}

/// All rows of the first sheet of a workbook, header included. Used by the
/// repair path, which must see the raw layout of a volunteer sheet rather
/// than assume the first row is a caption row.
pub fn load_raw_rows(path: &Path) -> Result<Vec<Vec<Field>>> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("open workbook {}", path.display()))?;
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("{} has no sheets", path.display()))?;
    let range = workbook
        .worksheet_range(&name)
        .with_context(|| format!("read sheet '{}' of {}", name, path.display()))?;
    Ok(range
        .rows()
        .map(|r| r.iter().map(Field::from).collect())
        .collect())
}

/// Row count of the first sheet, header rows included. Drives pagination.
pub fn sheet_row_count(path: &Path) -> Result<usize> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("open workbook {}", path.display()))?;
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("{} has no sheets", path.display()))?;
    let range = workbook
        .worksheet_range(&name)
        .with_context(|| format!("read sheet '{}' of {}", name, path.display()))?;
    Ok(range.height())
}
