//! Structured run reports: per-stage outcome structs, a one-line human
//! summary for each, and JSON serialization for downstream tooling.

use crate::export::FolderExport;
use crate::retry::TagRetry;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Outcome of splitting one master tab into per-volunteer sheets.
#[derive(Clone, Debug, Serialize)]
pub struct TabSplit {
    pub tab: String,
    pub rows: usize,
    pub skipped: usize,
    pub volunteers: usize,
    pub duplicate_names: usize,
    pub files_written: usize,
    pub write_failures: usize,
    pub contact_fixes: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SplitReport {
    pub district: String,
    pub tabs: Vec<TabSplit>,
}

impl SplitReport {
    pub fn summary(&self) -> String {
        let written: usize = self.tabs.iter().map(|t| t.files_written).sum();
        let failures: usize = self.tabs.iter().map(|t| t.write_failures).sum();
        format!(
            "district {}: {} tabs, {} sheets written, {} failures",
            self.district,
            self.tabs.len(),
            written,
            failures
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExportReport {
    pub district: String,
    pub folders: Vec<FolderExport>,
}

impl ExportReport {
    pub fn summary(&self) -> String {
        let exported: usize = self.folders.iter().map(|f| f.exported).sum();
        let failed: usize = self.folders.iter().map(|f| f.failed).sum();
        format!(
            "district {}: {} folders, {} PDFs exported, {} failed",
            self.district,
            self.folders.len(),
            exported,
            failed
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RetryReport {
    pub tags: Vec<TagRetry>,
    /// Ledgers that could not be parsed and were left untouched.
    pub unreadable_ledgers: Vec<String>,
}

impl RetryReport {
    pub fn summary(&self) -> String {
        let succeeded: usize = self.tags.iter().map(|t| t.succeeded).sum();
        let still: usize = self.tags.iter().map(|t| t.still_failing).sum();
        let mut line = format!(
            "{} ledgers retried, {} recovered, {} still failing",
            self.tags.len(),
            succeeded,
            still
        );
        if !self.unreadable_ledgers.is_empty() {
            line.push_str(&format!(
                ", {} unreadable ledgers skipped",
                self.unreadable_ledgers.len()
            ));
        }
        line
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SheetRepair {
    pub file_name: String,
    pub rebuilt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RepairReport {
    pub district: String,
    pub corrupted: usize,
    pub repairs: Vec<SheetRepair>,
}

impl RepairReport {
    pub fn summary(&self) -> String {
        let rebuilt = self.repairs.iter().filter(|r| r.rebuilt).count();
        format!(
            "district {}: {} corrupted sheets found, {} rebuilt",
            self.district, self.corrupted, rebuilt
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
}

impl CleanupReport {
    pub fn summary(&self) -> String {
        format!("{} temp files removed", self.removed)
    }
}

/// Write a report as pretty JSON.
pub fn write_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize report")?;
    std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
    Ok(())
}
