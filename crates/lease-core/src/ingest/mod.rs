//! Directory inbox of allocation-window batches.
//!
//! Batches are CSV files dropped into `<root>/pending/`. Each one is moved
//! once, to `<root>/imported/` or `<root>/failed/`, by an atomic rename. The
//! store records every imported batch name, so a batch whose move failed is
//! not imported a second time.

use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Timestamp;

use crate::{
    error::{LeaseError, Result},
    models::AllocationWindow,
};

pub mod parse;

pub use parse::parse_windows;

const PENDING_DIR: &str = "pending";
const IMPORTED_DIR: &str = "imported";
const FAILED_DIR: &str = "failed";
const BATCH_EXTENSION: &str = "csv";

/// One pending batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// File name, recorded as the provenance of the plans it yields
    pub name: String,
    pub path: PathBuf,
}

/// Terminal state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Imported,
    Failed,
}

impl BatchOutcome {
    fn dir_name(self) -> &'static str {
        match self {
            BatchOutcome::Imported => IMPORTED_DIR,
            BatchOutcome::Failed => FAILED_DIR,
        }
    }
}

/// Filesystem-backed batch inbox.
#[derive(Debug, Clone)]
pub struct Inbox {
    root: PathBuf,
}

impl Inbox {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.root.join(PENDING_DIR)
    }

    /// Creates the `pending/`, `imported/` and `failed/` directories.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [PENDING_DIR, IMPORTED_DIR, FAILED_DIR] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| LeaseError::file_system(&path, e))?;
        }
        Ok(())
    }

    /// Lists pending batches, oldest name first.
    pub fn pending_batches(&self) -> Result<Vec<Batch>> {
        let pending = self.pending_dir();
        let entries = match fs::read_dir(&pending) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LeaseError::file_system(&pending, e)),
        };

        let mut batches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| LeaseError::file_system(&pending, e))?.path();
            let is_batch = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(BATCH_EXTENSION));
            if !is_batch {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                batches.push(Batch {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
        }

        batches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(batches)
    }

    /// Reads and decodes the windows of a batch.
    pub fn read_windows(&self, batch: &Batch) -> Result<Vec<AllocationWindow>> {
        let file = fs::File::open(&batch.path).map_err(|e| LeaseError::file_system(&batch.path, e))?;
        parse_windows(file, &batch.path)
    }

    /// Moves a committed batch to `imported/`.
    pub fn mark_imported(&self, batch: &Batch) -> Result<PathBuf> {
        self.settle(batch, BatchOutcome::Imported)
    }

    /// Moves a rejected batch to `failed/`.
    pub fn mark_failed(&self, batch: &Batch) -> Result<PathBuf> {
        self.settle(batch, BatchOutcome::Failed)
    }

    /// Moves a batch to its terminal directory and returns the new path.
    ///
    /// A batch re-delivered under a name that was already settled keeps both
    /// files: the newcomer gets a timestamp suffix.
    fn settle(&self, batch: &Batch, outcome: BatchOutcome) -> Result<PathBuf> {
        let dir = self.root.join(outcome.dir_name());
        fs::create_dir_all(&dir).map_err(|e| LeaseError::file_system(&dir, e))?;

        let mut target = dir.join(&batch.name);
        if target.exists() {
            target = dir.join(format!(
                "{}.{}",
                batch.name,
                Timestamp::now().as_millisecond()
            ));
        }

        fs::rename(&batch.path, &target).map_err(|e| LeaseError::file_system(&batch.path, e))?;
        Ok(target)
    }
}
