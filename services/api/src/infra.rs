use loan_desk::config::{StorageBackend, StorageConfig};
use loan_desk::ticketing::{
    ApplicationNo, ApplicationStore, FileBackend, LoanApplication, MemoryBackend, RecordBackend,
    StoreError, TicketingService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Backend picked at startup from [`StorageConfig`].
pub(crate) enum ConfiguredBackend {
    File(FileBackend),
    Memory(MemoryBackend),
}

impl ConfiguredBackend {
    pub(crate) fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.backend {
            StorageBackend::File => {
                info!(root = %config.root.display(), "using file-backed loan store");
                FileBackend::open(&config.root).map(Self::File)
            }
            StorageBackend::Memory => {
                info!("using in-memory loan store");
                Ok(Self::Memory(MemoryBackend::default()))
            }
        }
    }
}

impl RecordBackend for ConfiguredBackend {
    fn get(&self, application_no: ApplicationNo) -> Result<LoanApplication, StoreError> {
        match self {
            Self::File(backend) => backend.get(application_no),
            Self::Memory(backend) => backend.get(application_no),
        }
    }

    fn put(&self, application: &LoanApplication) -> Result<(), StoreError> {
        match self {
            Self::File(backend) => backend.put(application),
            Self::Memory(backend) => backend.put(application),
        }
    }

    fn insert(&self, application: &LoanApplication) -> Result<(), StoreError> {
        match self {
            Self::File(backend) => backend.insert(application),
            Self::Memory(backend) => backend.insert(application),
        }
    }

    fn keys(&self) -> Result<Vec<ApplicationNo>, StoreError> {
        match self {
            Self::File(backend) => backend.keys(),
            Self::Memory(backend) => backend.keys(),
        }
    }
}

pub(crate) fn build_service(
    config: &StorageConfig,
) -> Result<TicketingService<ConfiguredBackend>, StoreError> {
    let backend = ConfiguredBackend::open(config)?;
    let store = ApplicationStore::open(backend)?;
    Ok(TicketingService::new(Arc::new(store)))
}

pub(crate) fn apply_store_root(config: &mut StorageConfig, root: Option<PathBuf>) {
    if let Some(root) = root {
        config.root = root;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_needs_no_directory() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            root: PathBuf::from("/nonexistent/loan-desk"),
        };
        let service = build_service(&config).expect("memory service");
        let ticket = service
            .submit(Some("donald@ducks.com"), Some("1000"))
            .expect("submit");
        assert!(!service.fetch(&ticket.id.to_string()).expect("fetch").approved);
        assert!(!config.root.exists());
    }

    #[test]
    fn file_backend_creates_root_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = StorageConfig {
            backend: StorageBackend::File,
            root: PathBuf::from("unused"),
        };
        apply_store_root(&mut config, Some(dir.path().join("records")));

        let service = build_service(&config).expect("file service");
        service
            .submit(Some("donald@ducks.com"), Some("1000"))
            .expect("submit");
        assert!(dir.path().join("records").join("0.loan").exists());
    }
}
