//! Batch PDF export of one sheet folder, with per-file failure capture.
//!
//! Worker threads share a [`SessionPool`]; each file gets a fresh
//! open/configure/export/close cycle so a failure never leaks document state
//! into the next job. Session-level errors abort the batch, document-level
//! errors land in the tab's failure ledger.

use crate::backend::{BackendSession, PageSetup, SessionPool};
use crate::concurrency::for_each_limited;
use crate::ledger::{FailureLedger, FailureRecord};
use crate::paths::{plan_export_jobs, ExportJob};
use crate::progress::make_count_progress;
use crate::source::sheet_row_count;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Result of exporting one document.
#[derive(Clone, Debug, Serialize)]
pub struct ExportOutcome {
    pub file_name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result for one tab folder.
#[derive(Clone, Debug, Serialize)]
pub struct FolderExport {
    pub tag: String,
    pub planned: usize,
    pub exported: usize,
    pub failed: usize,
    pub outcomes: Vec<ExportOutcome>,
}

/// Run one export cycle on an already checked-out session. The sheet's row
/// count drives the page budget embedded at configure time.
pub fn export_one(session: &mut dyn BackendSession, job: &ExportJob) -> Result<()> {
    let rows = sheet_row_count(&job.sheet)
        .with_context(|| format!("inspect sheet {}", job.sheet.display()))?;
    let result = session
        .open(&job.sheet)
        .and_then(|_| session.configure(&PageSetup::for_rows(rows)))
        .and_then(|_| session.export(&job.pdf));
    session.close();
    result
}

/// Export every sheet in `sheet_dir` to a PDF in `pdf_dir`, up to `workers`
/// files in flight at once. Failures are appended to the tab's ledger after
/// the batch finishes; an error return means the backend itself broke.
pub fn export_folder(
    pool: &SessionPool,
    sheet_dir: &Path,
    pdf_dir: &Path,
    tag: &str,
    workers: usize,
    progress: bool,
) -> Result<FolderExport> {
    std::fs::create_dir_all(pdf_dir)
        .with_context(|| format!("create pdf folder {}", pdf_dir.display()))?;
    let jobs = plan_export_jobs(sheet_dir, pdf_dir);

    let bar = progress.then(|| make_count_progress(jobs.len() as u64, tag));
    let exported = AtomicUsize::new(0);
    let outcomes: Mutex<Vec<ExportOutcome>> = Mutex::new(Vec::with_capacity(jobs.len()));

    for_each_limited(&jobs, workers, |job| {
        let result = pool.with_session(|session| export_one(session, job))?;
        match result {
            Ok(()) => {
                exported.fetch_add(1, Ordering::Relaxed);
                debug!(file = %job.file_name, "exported");
                outcomes.lock().push(ExportOutcome {
                    file_name: job.file_name.clone(),
                    ok: true,
                    error: None,
                });
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(file = %job.file_name, error = %message, "export failed");
                outcomes.lock().push(ExportOutcome {
                    file_name: job.file_name.clone(),
                    ok: false,
                    error: Some(message),
                });
            }
        }
        if let Some(bar) = &bar {
            bar.inc(1);
        }
        Ok(())
    })?;
    if let Some(bar) = &bar {
        bar.finish();
    }

    let mut outcomes = outcomes.into_inner();
    outcomes.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let failures: Vec<FailureRecord> = outcomes
        .iter()
        .filter(|o| !o.ok)
        .map(|o| FailureRecord {
            file_name: o.file_name.clone(),
            error: o.error.clone().unwrap_or_default(),
        })
        .collect();
    FailureLedger::new(pdf_dir, tag).record(&failures)?;

    Ok(FolderExport {
        tag: tag.to_string(),
        planned: jobs.len(),
        exported: exported.load(Ordering::Relaxed),
        failed: failures.len(),
        outcomes,
    })
}
