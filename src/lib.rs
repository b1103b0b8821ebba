mod backend;
mod cleanup;
mod concurrency;
mod config;
mod export;
mod field;
mod grouper;
mod ledger;
mod paths;
mod pipeline;
mod progress;
mod render;
mod repair;
mod report;
mod retry;
mod source;
mod util;

pub use crate::config::RosterOptions;
pub use crate::pipeline::RosterPipeline;

pub use crate::field::Field;
pub use crate::grouper::{EntityGroups, EntityKey};
pub use crate::source::{SourceLoader, SourceTable, XlsxSource};

pub use crate::render::{write_sheet, VolunteerSheet, CAPTIONS};

// Expose the backend seam so applications can plug in their own converter.
pub use crate::backend::{
    pages_for_rows, Backend, BackendSession, CommandBackend, PageSetup, SessionPool,
};
pub use crate::export::{ExportOutcome, FolderExport};

pub use crate::ledger::{FailureLedger, FailureRecord};
pub use crate::repair::{repair_phone, repair_workbook, WorkbookRepair, PHONE_SENTINEL};
pub use crate::retry::{FileRetry, RetryState, TagRetry};

pub use crate::report::{
    write_json, CleanupReport, ExportReport, RepairReport, RetryReport, SplitReport,
};

// Expose multiprogress and progress helpers.
pub use crate::progress::{make_count_progress, set_global_multiprogress};

// Expose folder naming so tooling can locate outputs without guessing.
pub use crate::paths::{
    district_from_master, pdfs_root, sanitize_component, sheets_root, ExportJob,
};

// Export robust file ops from util so binaries can import from crate root.
pub use crate::util::{remove_with_backoff, replace_file_atomic_backoff};
