use calamine::{open_workbook, Data, Reader, Xlsx};
use rosterize::{Backend, BackendSession, PageSetup};
use rust_xlsxwriter::Workbook;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Master column layout used by every test workbook. Columns 2..=5 are the
/// payload copied into volunteer sheets; 7 and 8 identify the volunteer.
pub fn master_headers() -> Vec<String> {
    [
        "S No",
        "District",
        "Mandal",
        "JSP Id",
        "Member Name",
        "Mobile",
        "Status",
        "Volunteer Name",
        "Volunteer No",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// One member row assigned to a volunteer.
pub fn member_row(
    sno: &str,
    mandal: &str,
    jsp_id: &str,
    member: &str,
    mobile: &str,
    volunteer: &str,
    volunteer_no: &str,
) -> Vec<String> {
    vec![
        sno.to_string(),
        "Guntur".to_string(),
        mandal.to_string(),
        jsp_id.to_string(),
        member.to_string(),
        mobile.to_string(),
        String::new(),
        volunteer.to_string(),
        volunteer_no.to_string(),
    ]
}

/// Write a master workbook with the given tabs, each tab a header row plus
/// data rows of strings.
pub fn write_master(path: &Path, tabs: &[(&str, Vec<Vec<String>>)]) {
    let mut workbook = Workbook::new();
    for (name, rows) in tabs {
        let ws = workbook.add_worksheet();
        ws.set_name(*name).unwrap();
        for (ci, header) in master_headers().iter().enumerate() {
            ws.write_string(0, ci as u16, header).unwrap();
        }
        for (ri, row) in rows.iter().enumerate() {
            for (ci, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    ws.write_string(ri as u32 + 1, ci as u16, value).unwrap();
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

/// Read the first worksheet of an xlsx file into strings, empty cells as "".
pub fn read_sheet_rows(path: &Path) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let name = workbook.sheet_names().first().unwrap().clone();
    let range = workbook.worksheet_range(&name).unwrap();
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}

/// Sorted file names of the volunteer sheets in a tab folder, ledger and
/// temp files excluded.
pub fn sheet_names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".xlsx") && !n.starts_with("~$") && !n.starts_with("failed_list_"))
        .collect();
    names.sort();
    names
}

#[derive(Default)]
pub struct MockState {
    /// (sheet path, page setup) per successful configure.
    pub configured: Mutex<Vec<(PathBuf, PageSetup)>>,
    pub exports: AtomicUsize,
    pub terminated: AtomicBool,
    /// dest file name -> attempts so far.
    pub attempts: Mutex<HashMap<String, usize>>,
}

/// In-process backend that writes a stub PDF for every export. File names
/// listed in `failing` error out until they have been attempted
/// `failures_before_success` times (usize::MAX means never succeed).
pub struct MockBackend {
    pub state: Arc<MockState>,
    failing: Vec<String>,
    failures_before_success: usize,
}

impl MockBackend {
    pub fn reliable() -> Self {
        Self::flaky(&[], 0)
    }

    pub fn flaky(failing: &[&str], failures_before_success: usize) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            failures_before_success,
        }
    }
}

struct MockSession {
    state: Arc<MockState>,
    failing: Vec<String>,
    failures_before_success: usize,
    doc: Option<PathBuf>,
}

impl BackendSession for MockSession {
    fn open(&mut self, doc: &Path) -> anyhow::Result<()> {
        self.doc = Some(doc.to_path_buf());
        Ok(())
    }

    fn configure(&mut self, setup: &PageSetup) -> anyhow::Result<()> {
        let doc = self.doc.clone().ok_or_else(|| anyhow::anyhow!("no open document"))?;
        self.state.configured.lock().unwrap().push((doc, setup.clone()));
        Ok(())
    }

    fn export(&mut self, dest: &Path) -> anyhow::Result<()> {
        let name = dest.file_name().unwrap().to_string_lossy().into_owned();
        let mut attempts = self.state.attempts.lock().unwrap();
        let n = attempts.entry(name.clone()).or_insert(0);
        *n += 1;
        let sheet_name = name.replace(".pdf", ".xlsx");
        if self.failing.contains(&sheet_name) && *n <= self.failures_before_success {
            anyhow::bail!("converter rejected {name}");
        }
        drop(attempts);
        std::fs::write(dest, b"%PDF-1.4 stub")?;
        self.state.exports.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) {
        self.doc = None;
    }
}

impl Backend for MockBackend {
    fn session(&self) -> anyhow::Result<Box<dyn BackendSession>> {
        Ok(Box::new(MockSession {
            state: self.state.clone(),
            failing: self.failing.clone(),
            failures_before_success: self.failures_before_success,
            doc: None,
        }))
    }

    fn terminate(&self) {
        self.state.terminated.store(true, Ordering::Relaxed);
    }
}
