//! Durable keyed storage for loan applications plus identifier allocation.
//!
//! [`ApplicationStore`] owns the allocation sequence and the per-key write locks;
//! the bytes themselves live in a [`RecordBackend`]. Swapping the backend (files,
//! memory) does not change what the ticketing service observes.

mod file;
mod memory;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::domain::{ApplicationNo, LoanApplication};

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Submissions give up after this many ids turn out to be taken already.
const INSERT_ATTEMPTS: usize = 8;

/// Key-value persistence for application records.
///
/// `put` must replace a record atomically: a concurrent `get` on the same key sees
/// either the previous record or the new one in full.
pub trait RecordBackend: Send + Sync {
    fn get(&self, application_no: ApplicationNo) -> Result<LoanApplication, StoreError>;
    fn put(&self, application: &LoanApplication) -> Result<(), StoreError>;
    /// Create a record that must not exist yet. Fails with
    /// [`StoreError::Conflict`] and leaves the stored record untouched when the
    /// key is taken, even by another process sharing the backend.
    fn insert(&self, application: &LoanApplication) -> Result<(), StoreError>;
    /// Every key currently persisted, in no particular order.
    fn keys(&self) -> Result<Vec<ApplicationNo>, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("application {0} not found")]
    NotFound(ApplicationNo),
    #[error("store i/o failed ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not encode application {application_no}: {source}")]
    Encode {
        application_no: ApplicationNo,
        #[source]
        source: serde_json::Error,
    },
    #[error("application {application_no} is unreadable: {source}")]
    Corrupt {
        application_no: ApplicationNo,
        #[source]
        source: serde_json::Error,
    },
    #[error("application {0} already exists")]
    Conflict(ApplicationNo),
    #[error("application number sequence exhausted")]
    Exhausted,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Application records keyed by [`ApplicationNo`] with a monotonic id sequence.
pub struct ApplicationStore<B> {
    backend: B,
    next_id: AtomicU64,
    key_locks: Mutex<HashMap<ApplicationNo, Arc<Mutex<()>>>>,
}

impl<B> ApplicationStore<B>
where
    B: RecordBackend,
{
    /// Open a store over `backend`, seeding the sequence after the highest
    /// persisted key. Fails with [`StoreError::Exhausted`] when that key is
    /// already `u64::MAX`.
    pub fn open(backend: B) -> Result<Self, StoreError> {
        let keys = backend.keys()?;
        let next = seed_after(&keys)?;

        info!(
            existing = keys.len(),
            next_application_no = next,
            "application store opened"
        );

        Ok(Self {
            backend,
            next_id: AtomicU64::new(next),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Hand out the next identifier. Concurrent callers never share a value and
    /// every value exceeds all previously returned ones. Fails with
    /// [`StoreError::Exhausted`] rather than wrapping past `u64::MAX`.
    pub fn allocate_id(&self) -> Result<ApplicationNo, StoreError> {
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
            .map(ApplicationNo)
            .map_err(|_| StoreError::Exhausted)
    }

    /// Persist a brand-new record under a freshly allocated id.
    ///
    /// An id already present in the backend (written by another store instance
    /// over the same records, or out of band) is never overwritten: the sequence
    /// is re-seeded from the backend's keys and allocation retried.
    pub fn insert_new<F>(&self, mut build: F) -> Result<LoanApplication, StoreError>
    where
        F: FnMut(ApplicationNo) -> LoanApplication,
    {
        let mut attempt = 1;
        loop {
            let application_no = self.allocate_id()?;
            let application = build(application_no);

            let inserted = {
                let lock = self.key_lock(application_no);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.backend.insert(&application)
            };

            match inserted {
                Ok(()) => return Ok(application),
                Err(StoreError::Conflict(taken)) if attempt < INSERT_ATTEMPTS => {
                    warn!(%taken, attempt, "application number already taken, re-seeding");
                    self.reseed()?;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Insert or overwrite the record stored under its `application_no`.
    pub fn put(&self, application: &LoanApplication) -> Result<(), StoreError> {
        let lock = self.key_lock(application.application_no);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.backend.put(application)
    }

    pub fn get(&self, application_no: ApplicationNo) -> Result<LoanApplication, StoreError> {
        self.backend.get(application_no)
    }

    /// Read-modify-write one record while holding its key lock, so concurrent
    /// updates to the same application are applied one after another.
    ///
    /// `mutate` returns whether it changed the record; unchanged records are not
    /// written back.
    pub fn update<F>(
        &self,
        application_no: ApplicationNo,
        mutate: F,
    ) -> Result<LoanApplication, StoreError>
    where
        F: FnOnce(&mut LoanApplication) -> bool,
    {
        let lock = self.key_lock(application_no);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut application = self.backend.get(application_no)?;
        if mutate(&mut application) {
            self.backend.put(&application)?;
        } else {
            debug!(%application_no, "update left application unchanged");
        }
        Ok(application)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Move the sequence past every key the backend holds right now.
    fn reseed(&self) -> Result<(), StoreError> {
        let next = seed_after(&self.backend.keys()?)?;
        self.next_id.fetch_max(next, Ordering::SeqCst);
        Ok(())
    }

    fn key_lock(&self, application_no: ApplicationNo) -> Arc<Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(application_no).or_default().clone()
    }
}

fn seed_after(keys: &[ApplicationNo]) -> Result<u64, StoreError> {
    match keys.iter().map(|key| key.get()).max() {
        Some(highest) => highest.checked_add(1).ok_or(StoreError::Exhausted),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(no: u64) -> LoanApplication {
        LoanApplication::pending(ApplicationNo(no), format!("applicant{no}@ducks.com"), 500.0)
    }

    #[test]
    fn empty_store_starts_at_zero() {
        let store = ApplicationStore::open(MemoryBackend::default()).expect("opens");
        assert_eq!(store.allocate_id().expect("id"), ApplicationNo(0));
        assert_eq!(store.allocate_id().expect("id"), ApplicationNo(1));
    }

    #[test]
    fn sequence_resumes_after_highest_existing_key() {
        let backend = MemoryBackend::default();
        backend.put(&application(3)).expect("seed");
        backend.put(&application(9)).expect("seed");

        let store = ApplicationStore::open(backend).expect("opens");
        assert_eq!(store.allocate_id().expect("id"), ApplicationNo(10));
    }

    #[test]
    fn update_skips_write_when_unchanged() {
        let store = ApplicationStore::open(MemoryBackend::default()).expect("opens");
        store.put(&application(0)).expect("put");

        let unchanged = store.update(ApplicationNo(0), |_| false).expect("update");
        assert!(!unchanged.approved);

        let approved = store
            .update(ApplicationNo(0), LoanApplication::approve)
            .expect("update");
        assert!(approved.approved);
        assert!(store.get(ApplicationNo(0)).expect("get").approved);
    }

    #[test]
    fn update_of_missing_key_is_not_found() {
        let store = ApplicationStore::open(MemoryBackend::default()).expect("opens");
        match store.update(ApplicationNo(5), LoanApplication::approve) {
            Err(StoreError::NotFound(no)) => assert_eq!(no, ApplicationNo(5)),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn open_rejects_a_record_at_the_top_of_the_range() {
        let backend = MemoryBackend::default();
        backend.put(&application(u64::MAX)).expect("seed");

        assert!(matches!(
            ApplicationStore::open(backend),
            Err(StoreError::Exhausted)
        ));
    }

    #[test]
    fn allocation_stops_instead_of_wrapping() {
        let backend = MemoryBackend::default();
        backend.put(&application(0)).expect("seed");
        backend.put(&application(u64::MAX - 1)).expect("seed");
        let store = ApplicationStore::open(backend).expect("opens");

        assert!(matches!(store.allocate_id(), Err(StoreError::Exhausted)));
        assert!(matches!(store.allocate_id(), Err(StoreError::Exhausted)));
        assert!(matches!(
            store.insert_new(|no| application(no.get())),
            Err(StoreError::Exhausted)
        ));
        assert_eq!(
            store.get(ApplicationNo(0)).expect("untouched").contact,
            "applicant0@ducks.com"
        );
    }

    #[test]
    fn insert_new_skips_ids_written_behind_its_back() {
        let store = ApplicationStore::open(MemoryBackend::default()).expect("opens");
        for no in 0..3 {
            store.backend().put(&application(no)).expect("out-of-band write");
        }

        let created = store
            .insert_new(|no| LoanApplication::pending(no, "late@ducks.com".to_string(), 10.0))
            .expect("insert");
        assert_eq!(created.application_no, ApplicationNo(3));
        assert_eq!(
            store.get(ApplicationNo(0)).expect("untouched").contact,
            "applicant0@ducks.com"
        );
        assert_eq!(store.allocate_id().expect("id"), ApplicationNo(4));
    }

    #[test]
    fn memory_insert_refuses_an_existing_key() {
        let backend = MemoryBackend::default();
        backend.insert(&application(2)).expect("first insert");

        let mut rival = application(2);
        rival.contact = "rival@ducks.com".to_string();
        match backend.insert(&rival) {
            Err(StoreError::Conflict(no)) => assert_eq!(no, ApplicationNo(2)),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(
            backend.get(ApplicationNo(2)).expect("get").contact,
            "applicant2@ducks.com"
        );
    }
}
