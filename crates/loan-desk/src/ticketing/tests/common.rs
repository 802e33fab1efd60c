use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::ticketing::domain::{ApplicationNo, LoanApplication};
use crate::ticketing::store::{ApplicationStore, MemoryBackend, RecordBackend, StoreError};
use crate::ticketing::{ticketing_router, TicketingService};

pub(super) const CONTACT: &str = "donald@ducks.com";

pub(super) fn memory_service() -> TicketingService<MemoryBackend> {
    let store = ApplicationStore::open(MemoryBackend::default()).expect("memory store opens");
    TicketingService::new(Arc::new(store))
}

pub(super) fn service_over<B>(backend: B) -> TicketingService<B>
where
    B: RecordBackend + 'static,
{
    let store = ApplicationStore::open(backend).expect("store opens");
    TicketingService::new(Arc::new(store))
}

pub(super) fn router_with_service<B>(service: TicketingService<B>) -> axum::Router
where
    B: RecordBackend + 'static,
{
    ticketing_router(Arc::new(service))
}

/// Backend whose every operation fails, like a store on a dead disk.
pub(super) struct UnavailableBackend;

impl RecordBackend for UnavailableBackend {
    fn get(&self, _application_no: ApplicationNo) -> Result<LoanApplication, StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }

    fn put(&self, _application: &LoanApplication) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }

    fn insert(&self, _application: &LoanApplication) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }

    fn keys(&self) -> Result<Vec<ApplicationNo>, StoreError> {
        Ok(Vec::new())
    }
}

/// Memory backend that counts writes so tests can assert nothing was persisted.
#[derive(Default)]
pub(super) struct CountingBackend {
    inner: MemoryBackend,
    writes: AtomicUsize,
}

impl CountingBackend {
    pub(super) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RecordBackend for CountingBackend {
    fn get(&self, application_no: ApplicationNo) -> Result<LoanApplication, StoreError> {
        self.inner.get(application_no)
    }

    fn put(&self, application: &LoanApplication) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(application)
    }

    fn insert(&self, application: &LoanApplication) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(application)
    }

    fn keys(&self) -> Result<Vec<ApplicationNo>, StoreError> {
        self.inner.keys()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
