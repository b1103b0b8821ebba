use std::path::{Path, PathBuf};
use std::time::Duration;

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct RosterOptions {
    pub base_dir: PathBuf,            // where excels_*/pdfs_* folders live
    pub workers: usize,               // concurrent exports per folder
    pub session_cap: usize,           // backend sessions kept warm in the pool
    pub parallelism: Option<usize>,   // Some(N) to set rayon threads, None to use default
    pub progress: bool,               // show progress bars
    pub progress_label: Option<String>, // optional label override for progress bars
    pub retry_attempts: usize,        // attempts per file in the retry pass
    pub retry_backoff: Duration,      // pause between attempts on the same file
    pub converter: String,            // headless converter binary
    pub converter_timeout: Duration,  // per-document conversion deadline
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            workers: 4,
            session_cap: 4,
            parallelism: None,
            progress: true,
            progress_label: None,
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            converter: "soffice".to_string(),
            converter_timeout: Duration::from_secs(120),
        }
    }
}

impl RosterOptions {
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self.session_cap = self.session_cap.max(self.workers);
        self
    }
    pub fn with_session_cap(mut self, cap: usize) -> Self {
        self.session_cap = cap.max(1);
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads.max(1));
        self
    }
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }
    pub fn with_progress_label(mut self, label: impl AsRef<str>) -> Self {
        self.progress_label = Some(label.as_ref().to_string());
        self
    }
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
    pub fn with_converter(mut self, program: impl AsRef<str>) -> Self {
        self.converter = program.as_ref().to_string();
        self
    }
    pub fn with_converter_timeout(mut self, timeout: Duration) -> Self {
        self.converter_timeout = timeout;
        self
    }
}
