//! Export backend seam: sessions that turn a volunteer sheet into a
//! fixed-layout PDF, plus the pagination policy applied before export.
//!
//! The pipeline only depends on open/configure/export/close; the concrete
//! [`CommandBackend`] drives an external headless converter process.

use crate::util::{remove_with_backoff, replace_file_atomic_backoff};
use anyhow::{anyhow, bail, Context, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rows that still fit on a single portrait A4 page.
pub const SINGLE_PAGE_ROWS: usize = 45;
/// Row density target per page once a sheet spills over.
pub const ROWS_PER_PAGE: usize = 48;

/// Vertical page budget for a sheet with `rows` total rows (headers included):
/// one page up to the single-page limit, then `max(1, round((rows + 2) / 48))`.
pub fn pages_for_rows(rows: usize) -> u32 {
    if rows <= SINGLE_PAGE_ROWS {
        return 1;
    }
    let pages = ((rows + 2) as f64 / ROWS_PER_PAGE as f64).round() as u32;
    pages.max(1)
}

/// Print layout applied to a sheet before export. Margins are in inches.
#[derive(Clone, Debug, PartialEq)]
pub struct PageSetup {
    pub portrait: bool,
    pub a4: bool,
    pub fit_pages_wide: u16,
    pub fit_pages_tall: u16,
    pub left_margin: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
    pub header_margin: f64,
    pub footer_margin: f64,
    pub center_horizontally: bool,
    /// Header rows repeated at the top of every printed page.
    pub repeat_header_rows: u32,
    pub print_gridlines: bool,
}

impl PageSetup {
    /// The fixed roster policy: portrait A4, one page wide, computed pages
    /// tall, tight side margins with a roomier top, title/caption rows
    /// repeated on every page.
    pub fn for_rows(rows: usize) -> Self {
        Self {
            portrait: true,
            a4: true,
            fit_pages_wide: 1,
            fit_pages_tall: pages_for_rows(rows) as u16,
            left_margin: 0.1,
            right_margin: 0.1,
            top_margin: 0.6,
            bottom_margin: 0.3,
            header_margin: 0.1,
            footer_margin: 0.1,
            center_horizontally: true,
            repeat_header_rows: 2,
            print_gridlines: false,
        }
    }
}

/// One backend conversation. A session holds at most one open document.
pub trait BackendSession: Send {
    fn open(&mut self, doc: &Path) -> Result<()>;
    fn configure(&mut self, setup: &PageSetup) -> Result<()>;
    fn export(&mut self, dest: &Path) -> Result<()>;
    /// Release the document without saving in-place edits. Must be safe to
    /// call at any point, including after a failed export.
    fn close(&mut self);
}

/// Factory for sessions, plus an explicit kill switch for backend processes.
/// Only the orchestrator calls [`Backend::terminate`]; nothing triggers it
/// implicitly.
pub trait Backend: Send + Sync {
    fn session(&self) -> Result<Box<dyn BackendSession>>;
    fn terminate(&self);
}

/// Bounded pool of reusable sessions. A worker checks one session out at a
/// time; returned sessions beyond the cap are dropped instead of pooled, so a
/// large batch cannot accumulate backend resources.
pub struct SessionPool {
    backend: Arc<dyn Backend>,
    idle: Mutex<Vec<Box<dyn BackendSession>>>,
    cap: usize,
}

impl SessionPool {
    pub fn new(backend: Arc<dyn Backend>, cap: usize) -> Self {
        Self {
            backend,
            idle: Mutex::new(Vec::new()),
            cap: cap.max(1),
        }
    }

    /// Run `f` with a session checked out of the pool. Errors here mean the
    /// backend itself is unavailable; per-document failures stay inside `f`'s
    /// return value.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut dyn BackendSession) -> T) -> Result<T> {
        let pooled = self.idle.lock().pop();
        let mut session = match pooled {
            Some(s) => s,
            None => self.backend.session()?,
        };
        let out = f(session.as_mut());
        let mut idle = self.idle.lock();
        if idle.len() < self.cap {
            idle.push(session);
        }
        Ok(out)
    }
}

type ChildSlot = Arc<Mutex<Option<Child>>>;

/// Backend driving an external converter command, one process per export.
/// Any program accepting `--headless --convert-to pdf --outdir <dir> <doc>`
/// works; `soffice` is the default. Child processes are tracked so
/// `terminate` can reach strays even mid-conversion.
pub struct CommandBackend {
    program: String,
    timeout: Duration,
    slots: Mutex<Vec<ChildSlot>>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            slots: Mutex::new(Vec::new()),
        }
    }
}

impl Backend for CommandBackend {
    fn session(&self) -> Result<Box<dyn BackendSession>> {
        let slot: ChildSlot = Arc::new(Mutex::new(None));
        self.slots.lock().push(slot.clone());
        Ok(Box::new(CommandSession {
            program: self.program.clone(),
            timeout: self.timeout,
            slot,
            doc: None,
            setup: None,
        }))
    }

    fn terminate(&self) {
        let slots = self.slots.lock();
        for slot in slots.iter() {
            if let Some(child) = slot.lock().as_mut() {
                tracing::warn!(pid = child.id(), "terminating converter process");
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

struct CommandSession {
    program: String,
    timeout: Duration,
    slot: ChildSlot,
    doc: Option<PathBuf>,
    setup: Option<PageSetup>,
}

impl CommandSession {
    /// Poll the child without holding the slot lock across sleeps, so
    /// `terminate` can always get in. Kills the child on deadline.
    fn wait_with_timeout(&self) -> Result<std::process::ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            {
                let mut slot = self.slot.lock();
                match slot.as_mut() {
                    Some(child) => {
                        if let Some(status) = child.try_wait().context("wait for converter")? {
                            *slot = None;
                            return Ok(status);
                        }
                    }
                    None => bail!("converter process was terminated"),
                }
            }
            if Instant::now() >= deadline {
                if let Some(mut child) = self.slot.lock().take() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                bail!("converter timed out after {:?}", self.timeout);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl BackendSession for CommandSession {
    fn open(&mut self, doc: &Path) -> Result<()> {
        if self.doc.is_some() {
            bail!("session already has a document open");
        }
        if !doc.exists() {
            bail!("document not found: {}", doc.display());
        }
        self.doc = Some(doc.to_path_buf());
        Ok(())
    }

    fn configure(&mut self, setup: &PageSetup) -> Result<()> {
        if self.doc.is_none() {
            bail!("no document open");
        }
        // The converter honors the print settings embedded in the sheet; the
        // renderer wrote the same PageSetup there. Recorded for diagnostics.
        self.setup = Some(setup.clone());
        Ok(())
    }

    fn export(&mut self, dest: &Path) -> Result<()> {
        let doc = self
            .doc
            .clone()
            .ok_or_else(|| anyhow!("no document open"))?;
        let outdir = dest
            .parent()
            .ok_or_else(|| anyhow!("destination has no parent: {}", dest.display()))?;
        // Overwrite contract: any stale artifact at dest goes away first.
        remove_with_backoff(dest, 8, 50)?;

        let child = Command::new(&self.program)
            .arg("--headless")
            .arg("--norestore")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(outdir)
            .arg(&doc)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn converter '{}'", self.program))?;
        *self.slot.lock() = Some(child);

        let status = self.wait_with_timeout()?;
        if !status.success() {
            bail!("converter exited with {status}");
        }

        // The converter names its output after the document stem.
        let stem = doc
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("document has no stem: {}", doc.display()))?;
        let produced = outdir.join(format!("{stem}.pdf"));
        if produced != dest {
            replace_file_atomic_backoff(&produced, dest)?;
        }
        if !dest.exists() {
            bail!("converter produced no artifact for {}", doc.display());
        }
        Ok(())
    }

    fn close(&mut self) {
        // Nothing persists in-place: the converter never writes back into the
        // sheet. Dropping the handle is the whole release.
        self.doc = None;
        self.setup = None;
    }
}
