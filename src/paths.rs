//! Folder layout and discovery for the district sheet/PDF trees.
//!
//! Layout per district (derived from the master file name):
//!   `excels_<district>/<tab>/<Volunteer>.xlsx`
//!   `pdfs_<district>/<tab>/<Volunteer>.pdf`
//!   `pdfs_<district>/<tab>/failed_list_<tab>.xlsx`

use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SHEETS_PREFIX: &str = "excels_";
pub const PDFS_PREFIX: &str = "pdfs_";
pub const LEDGER_PREFIX: &str = "failed_list_";

/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

/// District name from a master file: the stem, minus a trailing ` D...` tag
/// ("Kurnool D.xlsx" -> "Kurnool") and any `.temp` leftover from older runs.
pub fn district_from_master(master: &Path) -> String {
    let stem = master
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("district");
    let stem = stem.strip_suffix(".temp").unwrap_or(stem);
    match stem.find(" D") {
        Some(idx) => stem[..idx].to_string(),
        None => stem.to_string(),
    }
}

pub fn sheets_root(base: &Path, district: &str) -> PathBuf {
    base.join(format!("{}{}", SHEETS_PREFIX, district.to_lowercase()))
}

pub fn pdfs_root(base: &Path, district: &str) -> PathBuf {
    base.join(format!("{}{}", PDFS_PREFIX, district.to_lowercase()))
}

fn dirs_with_prefix(base: &Path, prefix: &str) -> Vec<String> {
    let mut out = Vec::new();
    for entry in WalkDir::new(base).min_depth(1).max_depth(1).into_iter().flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Some(district) = name.strip_prefix(prefix) {
                out.push(district.to_string());
            }
        }
    }
    out.sort();
    out
}

/// Districts that have a generated sheet tree under `base`.
pub fn discover_sheet_districts(base: &Path) -> Vec<String> {
    dirs_with_prefix(base, SHEETS_PREFIX)
}

/// Districts that have a PDF tree under `base` (retry looks at these).
pub fn discover_pdf_districts(base: &Path) -> Vec<String> {
    dirs_with_prefix(base, PDFS_PREFIX)
}

/// Immediate tab subfolders of a district root, sorted by name.
pub fn tab_folders(root: &Path) -> Vec<(String, PathBuf)> {
    let mut out = Vec::new();
    if !root.exists() {
        return out;
    }
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).into_iter().flatten() {
        if !entry.file_type().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            out.push((name.to_string(), entry.path().to_path_buf()));
        }
    }
    out.sort();
    out
}

/// Exportable volunteer sheets in a tab folder: every `.xlsx` except office
/// temp litter (`~$...`) and the failure ledger itself. Sorted for
/// deterministic batch order.
pub fn sheet_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if !dir.exists() {
        return out;
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = match entry.file_name().to_str() {
            Some(n) => n,
            None => continue,
        };
        if !name.ends_with(".xlsx") || name.starts_with("~$") || name.starts_with(LEDGER_PREFIX) {
            continue;
        }
        out.push(entry.path().to_path_buf());
    }
    out.sort();
    out
}

/// One sheet-to-PDF unit of work.
#[derive(Clone, Debug)]
pub struct ExportJob {
    pub file_name: String,
    pub sheet: PathBuf,
    pub pdf: PathBuf,
}

impl ExportJob {
    /// Job for a known sheet file name (used by the retry pass, which works
    /// from ledger entries rather than folder scans).
    pub fn for_file(sheet_dir: &Path, pdf_dir: &Path, file_name: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        Self {
            file_name: file_name.to_string(),
            sheet: sheet_dir.join(file_name),
            pdf: pdf_dir.join(format!("{stem}.pdf")),
        }
    }
}

/// Plan the jobs for one tab folder: artifact names mirror sheet stems 1:1.
pub fn plan_export_jobs(sheet_dir: &Path, pdf_dir: &Path) -> Vec<ExportJob> {
    sheet_files(sheet_dir)
        .into_iter()
        .filter_map(|sheet| {
            let file_name = sheet.file_name()?.to_str()?.to_string();
            let stem = sheet.file_stem()?.to_str()?.to_string();
            Some(ExportJob {
                file_name,
                pdf: pdf_dir.join(format!("{stem}.pdf")),
                sheet,
            })
        })
        .collect()
}

/// Failure ledgers under a PDF district root: `(tag, tab_dir, ledger_path)`.
pub fn discover_ledgers(pdf_root: &Path) -> Vec<(String, PathBuf, PathBuf)> {
    let re = Regex::new(r"^failed_list_(.+)\.xlsx$").unwrap();
    let mut out = Vec::new();
    if !pdf_root.exists() {
        return out;
    }
    for entry in WalkDir::new(pdf_root).min_depth(2).max_depth(2).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = match entry.file_name().to_str() {
            Some(n) => n,
            None => continue,
        };
        if let Some(caps) = re.captures(name) {
            let tab_dir = entry.path().parent().map(Path::to_path_buf).unwrap_or_default();
            out.push((caps[1].to_string(), tab_dir, entry.path().to_path_buf()));
        }
    }
    out.sort();
    out
}
