//! Retry pass over failure ledgers: repair, re-export, prune.
//!
//! Retries run serially per tab. Each attempt repairs the source sheet first
//! (bad contact values are the usual culprit), then re-exports; between
//! attempts the pass backs off to let a wedged converter recover. Ledgers are
//! rewritten with only the files that still fail, and deleted when empty.

use crate::backend::SessionPool;
use crate::export::export_one;
use crate::ledger::FailureLedger;
use crate::paths::ExportJob;
use crate::repair::repair_workbook;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Pending,
    Attempting,
    Succeeded,
    StillFailing,
}

#[derive(Clone, Debug, Serialize)]
pub struct FileRetry {
    pub file_name: String,
    pub state: RetryState,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Result of re-running one tab's ledger.
#[derive(Clone, Debug, Serialize)]
pub struct TagRetry {
    pub tag: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub still_failing: usize,
    pub files: Vec<FileRetry>,
}

/// Retry one previously failed file up to `max_attempts` times.
pub fn retry_file(
    pool: &SessionPool,
    job: &ExportJob,
    max_attempts: usize,
    backoff: Duration,
) -> Result<FileRetry> {
    let mut retry = FileRetry {
        file_name: job.file_name.clone(),
        state: RetryState::Pending,
        attempts: 0,
        last_error: None,
    };
    if !job.sheet.exists() {
        retry.state = RetryState::StillFailing;
        retry.last_error = Some(format!("source sheet missing: {}", job.sheet.display()));
        return Ok(retry);
    }

    for attempt in 1..=max_attempts.max(1) {
        if attempt > 1 {
            std::thread::sleep(backoff);
        }
        retry.state = RetryState::Attempting;
        retry.attempts = attempt;

        match repair_workbook(&job.sheet) {
            Ok(r) if r.changed() => {
                info!(file = %job.file_name, fixed = r.fixed_values, "repaired before retry")
            }
            Ok(_) => {}
            Err(e) => warn!(file = %job.file_name, error = %format!("{e:#}"), "repair failed"),
        }

        let result = pool.with_session(|session| export_one(session, job))?;
        match result {
            Ok(()) => {
                retry.state = RetryState::Succeeded;
                retry.last_error = None;
                return Ok(retry);
            }
            Err(e) => {
                retry.last_error = Some(format!("{e:#}"));
            }
        }
    }
    retry.state = RetryState::StillFailing;
    Ok(retry)
}

/// Re-run every file in one tab's ledger, then rewrite the ledger with the
/// files that still fail (or delete it when none do).
pub fn retry_tag(
    pool: &SessionPool,
    sheet_dir: &Path,
    pdf_dir: &Path,
    tag: &str,
    max_attempts: usize,
    backoff: Duration,
) -> Result<TagRetry> {
    let ledger = FailureLedger::new(pdf_dir, tag);
    let names = ledger.read()?;

    let mut files = Vec::with_capacity(names.len());
    for name in &names {
        let job = ExportJob::for_file(sheet_dir, pdf_dir, name);
        files.push(retry_file(pool, &job, max_attempts, backoff)?);
    }

    let still_failing: Vec<String> = files
        .iter()
        .filter(|f| f.state == RetryState::StillFailing)
        .map(|f| f.file_name.clone())
        .collect();
    ledger.update(&still_failing)?;

    let succeeded = files
        .iter()
        .filter(|f| f.state == RetryState::Succeeded)
        .count();
    info!(
        tag,
        attempted = names.len(),
        succeeded,
        still_failing = still_failing.len(),
        "retry pass finished"
    );
    Ok(TagRetry {
        tag: tag.to_string(),
        attempted: names.len(),
        succeeded,
        still_failing: still_failing.len(),
        files,
    })
}
