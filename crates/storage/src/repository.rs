use async_trait::async_trait;
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracker_core::Clock;
use tracker_core::model::{
    Category, Course, CourseDraft, CourseId, CourseWithProgress, ProgressInput, ProgressRecord,
    ProgressSummary, summarize,
};

/// Errors surfaced by backend adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("invalid progress: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("curriculum sync failed: {0}")]
    Sync(String),

    #[error("unexpected response status {0}")]
    HttpStatus(u16),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),
}

/// Outcome of a curriculum refresh as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub new_courses: u32,
    pub updated_courses: u32,
    pub total_processed: u32,
}

/// Contract of the tracker backend (API server plus its persistence).
///
/// The backend is authoritative for stored records, including computed fields
/// such as `completed_at`.
#[async_trait]
pub trait TrackerBackend: Send + Sync {
    /// List catalog courses with their embedded progress, optionally narrowed to
    /// one category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Network` (or another transport error) when the
    /// backend cannot be reached.
    async fn list_courses(
        &self,
        category: Option<Category>,
    ) -> Result<Vec<CourseWithProgress>, StorageError>;

    /// Persist a progress update and return the canonical stored record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown course and
    /// `StorageError::Validation` for out-of-range fields.
    async fn update_progress(
        &self,
        course_id: CourseId,
        input: &ProgressInput,
    ) -> Result<ProgressRecord, StorageError>;

    /// Summary as computed by the backend.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the backend cannot be reached.
    async fn fetch_summary(&self) -> Result<ProgressSummary, StorageError>;

    /// Refresh the catalog from the external curriculum source.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Sync` when the curriculum source is unreachable.
    async fn sync_courses(&self) -> Result<SyncReport, StorageError>;

    /// Categories known to the backend.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the backend cannot be reached.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        Ok(Category::ALL.to_vec())
    }
}

#[derive(Default)]
struct InMemoryState {
    clock: Clock,
    courses: Vec<Course>,
    progress: HashMap<CourseId, ProgressRecord>,
    staged: Option<Vec<CourseDraft>>,
    fail_next_sync: bool,
    fail_next_fetch: bool,
}

impl InMemoryState {
    fn joined(&self, category: Option<Category>) -> Vec<CourseWithProgress> {
        self.courses
            .iter()
            .filter(|c| category.is_none_or(|cat| c.category() == cat))
            .map(|c| CourseWithProgress::new(c.clone(), self.progress.get(&c.id()).cloned()))
            .collect()
    }
}

/// In-memory backend with the server's semantics, for tests and offline use.
///
/// A sync consumes the staged curriculum snapshot: a course keeps its id when
/// the snapshot holds a course with the same title and category, courses
/// missing from the snapshot leave the catalog, and progress is never deleted.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<InMemoryState>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryState {
                clock,
                ..InMemoryState::default()
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, InMemoryState>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Insert catalog courses directly, bypassing sync. Returns their ids in order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if a draft is not a valid course.
    pub fn seed(&self, drafts: Vec<CourseDraft>) -> Result<Vec<CourseId>, StorageError> {
        let mut state = self.lock()?;
        let now = state.clock.now();
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let course = Course::new(CourseId::random(), draft, now, now)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            ids.push(course.id());
            state.courses.push(course);
        }
        Ok(ids)
    }

    /// Stage the snapshot the next sync will deliver.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn stage_snapshot(&self, drafts: Vec<CourseDraft>) -> Result<(), StorageError> {
        self.lock()?.staged = Some(drafts);
        Ok(())
    }

    /// Make the next `sync_courses` call fail as if the source were unreachable.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn fail_next_sync(&self) -> Result<(), StorageError> {
        self.lock()?.fail_next_sync = true;
        Ok(())
    }

    /// Make the next `list_courses` call fail with a network error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn fail_next_fetch(&self) -> Result<(), StorageError> {
        self.lock()?.fail_next_fetch = true;
        Ok(())
    }

    /// Advance a fixed clock.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn advance_clock(&self, delta: Duration) -> Result<(), StorageError> {
        self.lock()?.clock.advance(delta);
        Ok(())
    }
}

#[async_trait]
impl TrackerBackend for InMemoryBackend {
    async fn list_courses(
        &self,
        category: Option<Category>,
    ) -> Result<Vec<CourseWithProgress>, StorageError> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_fetch) {
            return Err(StorageError::Network("backend unreachable".into()));
        }
        Ok(state.joined(category))
    }

    async fn update_progress(
        &self,
        course_id: CourseId,
        input: &ProgressInput,
    ) -> Result<ProgressRecord, StorageError> {
        let mut state = self.lock()?;
        if !state.courses.iter().any(|c| c.id() == course_id) {
            return Err(StorageError::NotFound);
        }
        let now = state.clock.now();

        let record = match state.progress.get_mut(&course_id) {
            Some(existing) => {
                existing
                    .apply(input, now)
                    .map_err(|e| StorageError::Validation(e.to_string()))?;
                existing.clone()
            }
            None => {
                let created = ProgressRecord::create(course_id, input, now)
                    .map_err(|e| StorageError::Validation(e.to_string()))?;
                state.progress.insert(course_id, created.clone());
                created
            }
        };
        Ok(record)
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, StorageError> {
        let state = self.lock()?;
        Ok(summarize(&state.joined(None)))
    }

    async fn sync_courses(&self) -> Result<SyncReport, StorageError> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_sync) {
            return Err(StorageError::Sync("curriculum source unreachable".into()));
        }

        let now = state.clock.now();
        let drafts = match state.staged.take() {
            Some(drafts) => drafts,
            None => state.courses.iter().map(Course::to_draft).collect(),
        };

        let mut report = SyncReport {
            total_processed: u32::try_from(drafts.len()).unwrap_or(u32::MAX),
            ..SyncReport::default()
        };
        let mut seen = HashSet::new();
        let mut next = Vec::with_capacity(drafts.len());

        for draft in drafts {
            if !seen.insert((draft.title.trim().to_owned(), draft.category)) {
                tracing::debug!(title = %draft.title, "skipping duplicate snapshot entry");
                continue;
            }
            let existing = state
                .courses
                .iter()
                .find(|c| c.title() == draft.title.trim() && c.category() == draft.category);
            let (id, created_at, is_new) = match existing {
                Some(c) => (c.id(), c.created_at(), false),
                None => (CourseId::random(), now, true),
            };

            match Course::new(id, draft, created_at, now) {
                Ok(course) => {
                    if is_new {
                        report.new_courses += 1;
                    } else {
                        report.updated_courses += 1;
                    }
                    next.push(course);
                }
                Err(e) => tracing::warn!(error = %e, "dropping invalid snapshot entry"),
            }
        }

        state.courses = next;
        Ok(report)
    }
}
