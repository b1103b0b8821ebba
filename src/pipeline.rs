use crate::backend::{Backend, CommandBackend, SessionPool};
use crate::cleanup::scrub_temp_files;
use crate::config::RosterOptions;
use crate::export::export_folder;
use crate::grouper::EntityGroups;
use crate::ledger::FailureLedger;
use crate::paths::{
    discover_ledgers, discover_pdf_districts, district_from_master, pdfs_root, sanitize_component,
    sheets_root, tab_folders,
};
use crate::progress::make_count_progress;
use crate::render::{write_sheet, VolunteerSheet};
use crate::repair::{clean_contact_column, find_corrupted, rebuild_from_master};
use crate::report::{
    CleanupReport, ExportReport, RepairReport, RetryReport, SheetRepair, SplitReport, TabSplit,
};
use crate::retry::retry_tag;
use crate::source::{SourceLoader, XlsxSource};
use crate::util::init_tracing_once;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point: configure once, then run the stages in order. Every stage is
/// independent, so a crashed export can be re-run without re-splitting.
#[derive(Clone)]
pub struct RosterPipeline {
    pub(crate) opts: RosterOptions,
}

impl RosterPipeline {
    pub fn new() -> Self {
        Self {
            opts: RosterOptions::default(),
        }
    }

    // -------- Builder methods --------
    pub fn base_dir(mut self, base: impl AsRef<Path>) -> Self {
        self.opts = self.opts.with_base_dir(base);
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.opts = self.opts.with_workers(n);
        self
    }
    pub fn session_cap(mut self, cap: usize) -> Self {
        self.opts = self.opts.with_session_cap(cap);
        self
    }
    pub fn parallelism(mut self, threads: usize) -> Self {
        self.opts = self.opts.with_parallelism(threads);
        self
    }
    pub fn progress(mut self, yes: bool) -> Self {
        self.opts = self.opts.with_progress(yes);
        self
    }
    pub fn progress_label(mut self, label: impl AsRef<str>) -> Self {
        self.opts = self.opts.with_progress_label(label);
        self
    }
    pub fn retry_attempts(mut self, attempts: usize) -> Self {
        self.opts = self.opts.with_retry_attempts(attempts);
        self
    }
    pub fn retry_backoff(mut self, backoff: std::time::Duration) -> Self {
        self.opts = self.opts.with_retry_backoff(backoff);
        self
    }
    pub fn converter(mut self, program: impl AsRef<str>) -> Self {
        self.opts = self.opts.with_converter(program);
        self
    }
    pub fn converter_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.opts = self.opts.with_converter_timeout(timeout);
        self
    }

    fn init(&self) {
        init_tracing_once();
        if let Some(n) = self.opts.parallelism {
            if n > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build_global()
                    .ok();
            }
        }
    }

    fn default_backend(&self) -> Arc<dyn Backend> {
        Arc::new(CommandBackend::new(
            &self.opts.converter,
            self.opts.converter_timeout,
        ))
    }

    // -------- Stages --------

    /// Split a master workbook into one styled sheet per volunteer, mirrored
    /// under `excels_<district>/<tab>/`. An unreadable master is fatal; a
    /// failure writing one volunteer's sheet is counted and skipped.
    pub fn split(&self, master: impl AsRef<Path>) -> Result<SplitReport> {
        self.split_with(master.as_ref(), &XlsxSource)
    }

    pub fn split_with(&self, master: &Path, loader: &dyn SourceLoader) -> Result<SplitReport> {
        self.init();
        let district = district_from_master(master);
        if district.is_empty() {
            bail!("cannot derive district from {}", master.display());
        }
        let sheet_root = sheets_root(&self.opts.base_dir, &district);
        let pdf_root = pdfs_root(&self.opts.base_dir, &district);

        let tabs = loader
            .load(master)
            .with_context(|| format!("load master {}", master.display()))?;
        info!(district, tabs = tabs.len(), "splitting master");

        let mut report = SplitReport {
            district: district.clone(),
            tabs: Vec::with_capacity(tabs.len()),
        };
        for (tab, mut table) in tabs {
            let contact_fixes = clean_contact_column(&mut table).unwrap_or(0);
            let groups = EntityGroups::build(&table);
            let folder = sanitize_component(&tab).to_lowercase();
            let tab_dir = sheet_root.join(&folder);
            std::fs::create_dir_all(&tab_dir)
                .with_context(|| format!("create tab folder {}", tab_dir.display()))?;
            std::fs::create_dir_all(pdf_root.join(&folder))
                .with_context(|| format!("create pdf folder for tab {folder}"))?;

            let label = self.opts.progress_label.clone().unwrap_or_else(|| tab.clone());
            let bar = self
                .opts
                .progress
                .then(|| make_count_progress(groups.len() as u64, &label));

            let mut written = 0;
            let mut failures = 0;
            for (key, group) in groups.iter() {
                let path = tab_dir.join(format!("{}.xlsx", groups.file_stem(key)));
                let sheet = VolunteerSheet::from_group(&key.name, group);
                match write_sheet(&sheet, &path) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        warn!(volunteer = %key.name, error = %format!("{e:#}"), "sheet write failed");
                        failures += 1;
                    }
                }
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
            }
            if let Some(bar) = &bar {
                bar.finish();
            }
            if groups.duplicate_names() > 0 {
                info!(
                    tab,
                    duplicates = groups.duplicate_names(),
                    "duplicate names disambiguated by phone"
                );
            }

            report.tabs.push(TabSplit {
                tab,
                rows: groups.rows_seen,
                skipped: groups.rows_skipped,
                volunteers: groups.len(),
                duplicate_names: groups.duplicate_names(),
                files_written: written,
                write_failures: failures,
                contact_fixes,
            });
        }
        info!("{}", report.summary());
        Ok(report)
    }

    /// Export every tab folder of one district to PDFs using the configured
    /// converter. Failures per tab land in that tab's failure ledger.
    pub fn export_all(&self, district: &str) -> Result<ExportReport> {
        self.export_with(self.default_backend(), district, None)
    }

    /// Export with an explicit backend, optionally restricted to named tabs.
    pub fn export_with(
        &self,
        backend: Arc<dyn Backend>,
        district: &str,
        tabs: Option<&[String]>,
    ) -> Result<ExportReport> {
        self.init();
        let sheet_root = sheets_root(&self.opts.base_dir, district);
        let pdf_root = pdfs_root(&self.opts.base_dir, district);
        if !sheet_root.is_dir() {
            bail!("no sheet folder at {}", sheet_root.display());
        }

        let pool = SessionPool::new(backend.clone(), self.opts.session_cap);
        let mut report = ExportReport {
            district: district.to_string(),
            folders: Vec::new(),
        };
        let result = (|| -> Result<()> {
            for (tag, tab_dir) in tab_folders(&sheet_root) {
                if let Some(wanted) = tabs {
                    if !wanted.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                        continue;
                    }
                }
                let folder = export_folder(
                    &pool,
                    &tab_dir,
                    &pdf_root.join(&tag),
                    &tag,
                    self.opts.workers,
                    self.opts.progress,
                )?;
                report.folders.push(folder);
            }
            Ok(())
        })();
        backend.terminate();
        result?;
        info!("{}", report.summary());
        Ok(report)
    }

    /// Re-run every failure ledger under the pdf folders: repair the source
    /// sheet, re-export with backoff, and prune the ledger.
    pub fn retry_failed(&self) -> Result<RetryReport> {
        self.retry_with(self.default_backend())
    }

    pub fn retry_with(&self, backend: Arc<dyn Backend>) -> Result<RetryReport> {
        self.init();
        let pool = SessionPool::new(backend.clone(), self.opts.session_cap);
        let mut report = RetryReport {
            tags: Vec::new(),
            unreadable_ledgers: Vec::new(),
        };
        let result = (|| -> Result<()> {
            for district in discover_pdf_districts(&self.opts.base_dir) {
                let pdf_root = pdfs_root(&self.opts.base_dir, &district);
                let sheet_root = sheets_root(&self.opts.base_dir, &district);
                for (tag, tab_dir, ledger_path) in discover_ledgers(&pdf_root) {
                    if let Err(e) = FailureLedger::new(&tab_dir, &tag).read() {
                        warn!(
                            ledger = %ledger_path.display(),
                            error = %format!("{e:#}"),
                            "skipping unreadable ledger"
                        );
                        report
                            .unreadable_ledgers
                            .push(ledger_path.display().to_string());
                        continue;
                    }
                    let sheet_dir = sheet_root.join(&tag);
                    let tag_report = retry_tag(
                        &pool,
                        &sheet_dir,
                        &tab_dir,
                        &tag,
                        self.opts.retry_attempts,
                        self.opts.retry_backoff,
                    )?;
                    report.tags.push(tag_report);
                }
            }
            Ok(())
        })();
        backend.terminate();
        result?;
        info!("{}", report.summary());
        Ok(report)
    }

    /// Find corrupted volunteer sheets for one district and rebuild them from
    /// the master workbook.
    pub fn repair_sheets(&self, master: impl AsRef<Path>) -> Result<RepairReport> {
        let master = master.as_ref();
        self.init();
        let district = district_from_master(master);
        if district.is_empty() {
            bail!("cannot derive district from {}", master.display());
        }
        let sheet_root = sheets_root(&self.opts.base_dir, &district);
        let loader = XlsxSource;

        let mut report = RepairReport {
            district: district.clone(),
            corrupted: 0,
            repairs: Vec::new(),
        };
        for (_, tab_dir) in tab_folders(&sheet_root) {
            for path in find_corrupted(&tab_dir) {
                report.corrupted += 1;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match rebuild_from_master(master, &path, &loader) {
                    Ok(true) => {
                        info!(file = %file_name, "rebuilt corrupted sheet");
                        report.repairs.push(SheetRepair {
                            file_name,
                            rebuilt: true,
                            error: None,
                        });
                    }
                    Ok(false) => report.repairs.push(SheetRepair {
                        file_name,
                        rebuilt: false,
                        error: Some("no matching rows in master".to_string()),
                    }),
                    Err(e) => {
                        warn!(file = %file_name, error = %format!("{e:#}"), "rebuild failed");
                        report.repairs.push(SheetRepair {
                            file_name,
                            rebuilt: false,
                            error: Some(format!("{e:#}")),
                        });
                    }
                }
            }
        }
        info!("{}", report.summary());
        Ok(report)
    }

    /// Sweep editor and converter temp litter out of every output folder.
    pub fn cleanup(&self) -> Result<CleanupReport> {
        self.init();
        let mut removed = 0;
        for district in crate::paths::discover_sheet_districts(&self.opts.base_dir) {
            removed += scrub_temp_files(&sheets_root(&self.opts.base_dir, &district))?;
        }
        for district in discover_pdf_districts(&self.opts.base_dir) {
            removed += scrub_temp_files(&pdfs_root(&self.opts.base_dir, &district))?;
        }
        let report = CleanupReport { removed };
        info!("{}", report.summary());
        Ok(report)
    }
}

impl Default for RosterPipeline {
    fn default() -> Self {
        Self::new()
    }
}
