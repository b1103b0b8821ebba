//! Failure ledger: the per-tab spreadsheet of export failures awaiting retry.
//!
//! A non-empty ledger is the durable signal that a tab needs another pass.
//! The ledger is written once per batch, after all parallel work has settled,
//! so there is never more than one writer.

use crate::field::Field;
use crate::source::load_raw_rows;
use crate::util::remove_with_backoff;
use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

pub const LEDGER_COLUMNS: [&str; 3] = ["File Name", "Error Message", "Date/Time"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailureRecord {
    pub file_name: String,
    pub error: String,
}

/// Handle on one tab's ledger file (`failed_list_<tag>.xlsx` in the tab's
/// PDF folder).
#[derive(Clone, Debug)]
pub struct FailureLedger {
    tag: String,
    path: PathBuf,
}

impl FailureLedger {
    pub fn new(pdf_tab_dir: &Path, tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            path: pdf_tab_dir.join(format!("{}{}.xlsx", crate::paths::LEDGER_PREFIX, tag)),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist the given failures, stamped with the capture time. Overwrites
    /// any previous ledger; a no-op when `failures` is empty.
    pub fn record(&self, failures: &[FailureRecord]) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        self.write(failures)
    }

    /// The failing file names currently on record. Corrupt or unreadable
    /// ledgers surface as errors for the caller to report; they are never
    /// silently treated as empty.
    pub fn read(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Ok(self.read_records()?.into_iter().map(|r| r.file_name).collect())
    }

    /// Rewrite keeping only `still_failing`. An empty set means full
    /// recovery: the ledger file is deleted.
    pub fn update(&self, still_failing: &[String]) -> Result<()> {
        if still_failing.is_empty() {
            remove_with_backoff(&self.path, 8, 50)?;
            return Ok(());
        }
        let old = self.read_records().unwrap_or_default();
        let kept: Vec<FailureRecord> = still_failing
            .iter()
            .map(|name| {
                let error = old
                    .iter()
                    .find(|r| &r.file_name == name)
                    .map(|r| r.error.clone())
                    .unwrap_or_else(|| "conversion failed after retry".to_string());
                FailureRecord {
                    file_name: name.clone(),
                    error,
                }
            })
            .collect();
        self.write(&kept)
    }

    fn read_records(&self) -> Result<Vec<FailureRecord>> {
        let rows = load_raw_rows(&self.path)
            .with_context(|| format!("read failure ledger {}", self.path.display()))?;
        // The caption row sits below the merged title; find it rather than
        // assume its position.
        let caption_row = rows
            .iter()
            .position(|r| {
                r.first()
                    .map(|f| f.display_string() == LEDGER_COLUMNS[0])
                    .unwrap_or(false)
            })
            .with_context(|| {
                format!("ledger {} has no '{}' column", self.path.display(), LEDGER_COLUMNS[0])
            })?;
        let mut out = Vec::new();
        for row in rows.iter().skip(caption_row + 1) {
            let file_name = row.first().map(Field::display_string).unwrap_or_default();
            if file_name.trim().is_empty() {
                continue;
            }
            let error = row.get(1).map(Field::display_string).unwrap_or_default();
            out.push(FailureRecord { file_name, error });
        }
        Ok(out)
    }

    fn write(&self, failures: &[FailureRecord]) -> Result<()> {
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        ws.set_name("Failed Files")?;

        let title_fmt = Format::new().set_bold().set_font_size(14);
        let caption_fmt = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xDDDDDD));

        ws.merge_range(
            0,
            0,
            0,
            2,
            &format!("Failed PDF conversions - {}", self.tag),
            &title_fmt,
        )?;
        // Row 1 left blank, captions on row 2, data from row 3.
        for (col, caption) in LEDGER_COLUMNS.iter().enumerate() {
            ws.write_string_with_format(2, col as u16, *caption, &caption_fmt)?;
        }

        let stamp = timestamp_now();
        for (i, failure) in failures.iter().enumerate() {
            let r = (i + 3) as u32;
            ws.write_string(r, 0, &failure.file_name)?;
            ws.write_string(r, 1, &failure.error)?;
            ws.write_string(r, 2, &stamp)?;
        }

        ws.set_column_width(0, 40)?;
        ws.set_column_width(1, 60)?;
        ws.set_column_width(2, 20)?;

        workbook
            .save(&self.path)
            .with_context(|| format!("write failure ledger {}", self.path.display()))?;
        Ok(())
    }
}

fn timestamp_now() -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| String::from("unknown"))
}
