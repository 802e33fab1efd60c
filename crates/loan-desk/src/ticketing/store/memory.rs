use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{RecordBackend, StoreError};
use crate::ticketing::domain::{ApplicationNo, LoanApplication};

/// Process-local backend. Reads share the lock; writes replace whole records.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<ApplicationNo, LoanApplication>>,
}

impl RecordBackend for MemoryBackend {
    fn get(&self, application_no: ApplicationNo) -> Result<LoanApplication, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        records
            .get(&application_no)
            .cloned()
            .ok_or(StoreError::NotFound(application_no))
    }

    fn put(&self, application: &LoanApplication) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        records.insert(application.application_no, application.clone());
        Ok(())
    }

    fn insert(&self, application: &LoanApplication) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        match records.entry(application.application_no) {
            Entry::Vacant(slot) => {
                slot.insert(application.clone());
                Ok(())
            }
            Entry::Occupied(_) => Err(StoreError::Conflict(application.application_no)),
        }
    }

    fn keys(&self) -> Result<Vec<ApplicationNo>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(records.keys().copied().collect())
    }
}
