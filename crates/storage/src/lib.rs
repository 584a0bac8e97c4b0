#![forbid(unsafe_code)]

pub mod http;
pub mod repository;

pub use http::{HttpBackend, HttpBackendConfig};
pub use repository::{InMemoryBackend, StorageError, SyncReport, TrackerBackend};
