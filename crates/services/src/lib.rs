#![forbid(unsafe_code)]

pub mod course_store;
pub mod error;

pub use tracker_core::Clock;

pub use course_store::{CourseStore, SyncOutcome};
pub use error::StoreError;
pub use storage::SyncReport;
