use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::Error as _;
use tracing::{trace, warn};

use super::{RecordBackend, StoreError};
use crate::ticketing::domain::{ApplicationNo, LoanApplication};

/// Extension of committed application records.
pub const RECORD_EXTENSION: &str = "loan";
const TEMP_EXTENSION: &str = "tmp";

/// One JSON file per application: `<root>/<application_no>.loan`.
///
/// Records are written to a temporary sibling and renamed into place, so a
/// reader never sees a partially written file. New records are hard-linked into
/// place instead, which fails when another writer already owns the name.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl FileBackend {
    /// Use `root` as the record directory, creating it when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| StoreError::io(format!("create {}", root.display()), err))?;
        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, application_no: ApplicationNo) -> PathBuf {
        self.root.join(format!("{application_no}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, application_no: ApplicationNo) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{application_no}.{RECORD_EXTENSION}.{n}.{TEMP_EXTENSION}"
        ))
    }

    fn write_temp(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    /// Encode `application` into a fully synced temp file and return its path.
    fn stage(&self, application: &LoanApplication) -> Result<PathBuf, StoreError> {
        let application_no = application.application_no;
        let bytes = serde_json::to_vec(application).map_err(|source| StoreError::Encode {
            application_no,
            source,
        })?;

        let temp = self.temp_path(application_no);
        if let Err(err) = Self::write_temp(&temp, &bytes) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::io(format!("write {}", temp.display()), err));
        }
        Ok(temp)
    }
}

impl RecordBackend for FileBackend {
    fn get(&self, application_no: ApplicationNo) -> Result<LoanApplication, StoreError> {
        let path = self.record_path(application_no);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(application_no));
            }
            Err(err) => return Err(StoreError::io(format!("read {}", path.display()), err)),
        };

        let application: LoanApplication =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                application_no,
                source,
            })?;

        if application.application_no != application_no {
            return Err(StoreError::Corrupt {
                application_no,
                source: serde_json::Error::custom(format!(
                    "file holds application {}",
                    application.application_no
                )),
            });
        }

        trace!(%application_no, path = %path.display(), "application read");
        Ok(application)
    }

    fn put(&self, application: &LoanApplication) -> Result<(), StoreError> {
        let application_no = application.application_no;
        let temp = self.stage(application)?;
        let target = self.record_path(application_no);

        if let Err(err) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(StoreError::io(format!("commit {}", target.display()), err));
        }

        trace!(%application_no, path = %target.display(), "application written");
        Ok(())
    }

    fn insert(&self, application: &LoanApplication) -> Result<(), StoreError> {
        let application_no = application.application_no;
        let temp = self.stage(application)?;
        let target = self.record_path(application_no);

        let linked = fs::hard_link(&temp, &target);
        let _ = fs::remove_file(&temp);
        match linked {
            Ok(()) => {
                trace!(%application_no, path = %target.display(), "application created");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(application_no))
            }
            Err(err) => Err(StoreError::io(format!("create {}", target.display()), err)),
        }
    }

    fn keys(&self) -> Result<Vec<ApplicationNo>, StoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|err| StoreError::io(format!("list {}", self.root.display()), err))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| StoreError::io(format!("list {}", self.root.display()), err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<ApplicationNo>().ok())
            {
                Some(key) => keys.push(key),
                None => warn!(path = %path.display(), "ignoring unrecognised record file"),
            }
        }
        Ok(keys)
    }
}
