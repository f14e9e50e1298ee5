//! Offline scan source backed by a directory of scan JSON files.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::data::ScanSource;
use crate::data::document::{parse_header, parse_scan};
use crate::domain::{Scan, ScanHeader, ScanRef};
use crate::error::AppError;

/// Reads `*.json` scan documents from a directory.
///
/// Files are matched by their start document, not by name, so the names
/// produced by `beamlinex save -d json` (`smi_scan_565.json`) work as well as
/// `<scan_id>.json` or `<uid>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(AppError::usage(format!(
                "{}: scan directory not found.",
                dir.display()
            )));
        }
        Ok(Self { dir })
    }

    fn read_doc(path: &Path) -> Result<Value, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::runtime(format!("Failed to open {}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AppError::runtime(format!("Invalid scan JSON {}: {e}", path.display())))
    }

    /// Start documents of every readable scan file, newest first.
    fn index(&self) -> Result<Vec<(PathBuf, ScanHeader)>, AppError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AppError::runtime(format!("Failed to list {}: {e}", self.dir.display()))
        })?;

        let mut out = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| AppError::runtime(format!("Failed to list {}: {e}", self.dir.display())))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let header = Self::read_doc(&path).and_then(|doc| {
                doc.get("start")
                    .ok_or_else(|| AppError::runtime("no 'start' section"))
                    .and_then(parse_header)
            });
            match header {
                Ok(h) => out.push((path, h)),
                Err(e) => log::debug!("skipping {}: {}", path.display(), e.message()),
            }
        }
        out.sort_by(|a, b| b.1.time.total_cmp(&a.1.time));
        Ok(out)
    }

    fn locate(&self, scan: &ScanRef) -> Result<PathBuf, AppError> {
        let index = self.index()?;
        let found = match scan {
            ScanRef::Id(id) => index.into_iter().find(|(_, h)| h.scan_id == *id),
            ScanRef::Recent(n) => index.into_iter().nth(n.saturating_sub(1) as usize),
            ScanRef::Uid(uid) => index
                .into_iter()
                .find(|(_, h)| h.uid.to_ascii_lowercase().starts_with(uid.as_str())),
        };
        found.map(|(path, _)| path).ok_or_else(|| {
            AppError::usage(format!("Scan {scan} not found in {}.", self.dir.display()))
        })
    }
}

impl ScanSource for JsonDirSource {
    fn fetch(&self, scan: &ScanRef) -> Result<Scan, AppError> {
        let path = self.locate(scan)?;
        log::info!("reading scan {scan} from {}", path.display());
        parse_scan(&Self::read_doc(&path)?)
    }
}
