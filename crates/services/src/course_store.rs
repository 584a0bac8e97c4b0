use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use storage::{SyncReport, TrackerBackend};
use tokio::sync::Mutex;
use tracker_core::model::{
    Category, Course, CourseFilter, CourseId, CourseStatus, CourseWithProgress, ProgressInput,
    ProgressRecord, ProgressSummary, summarize,
};

use crate::error::StoreError;

/// Result of a successful `CourseStore::sync`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    /// The refreshed catalog.
    pub courses: Vec<Course>,
    pub report: SyncReport,
    /// Courses that left the catalog. Their progress is kept as detached records.
    pub removed: Vec<CourseId>,
}

#[derive(Default)]
struct StoreState {
    courses: Vec<Course>,
    progress: HashMap<CourseId, ProgressRecord>,
    summary: ProgressSummary,
    loaded: bool,
    applied_load: u64,
    write_seq: u64,
    written: HashMap<CourseId, u64>,
}

impl StoreState {
    fn joined(&self, course: &Course) -> CourseWithProgress {
        CourseWithProgress::new(course.clone(), self.progress.get(&course.id()).cloned())
    }

    fn snapshot(&self) -> Vec<CourseWithProgress> {
        self.courses.iter().map(|c| self.joined(c)).collect()
    }

    fn contains(&self, id: CourseId) -> bool {
        self.courses.iter().any(|c| c.id() == id)
    }

    /// Swap in a fetched catalog and return the ids that left it.
    ///
    /// For every fetched course the response decides whether a record exists,
    /// unless the course was written after `seen_writes`, in which case the
    /// cached record is newer than the response. Records of courses outside
    /// the new catalog stay as detached progress.
    fn replace_catalog(
        &mut self,
        entries: Vec<CourseWithProgress>,
        seen_writes: u64,
    ) -> Vec<CourseId> {
        let incoming: HashSet<CourseId> = entries.iter().map(|e| e.course.id()).collect();
        let removed = self
            .courses
            .iter()
            .map(Course::id)
            .filter(|id| !incoming.contains(id))
            .collect();

        let mut courses = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = entry.course.id();
            let written_since = self.written.get(&id).is_some_and(|&seq| seq > seen_writes);
            if written_since {
                tracing::debug!(course_id = %id, "keeping record written during fetch");
            } else {
                match entry.progress {
                    Some(record) => {
                        self.progress.insert(id, record);
                    }
                    None => {
                        self.progress.remove(&id);
                    }
                }
            }
            courses.push(entry.course);
        }

        self.courses = courses;
        self.loaded = true;
        self.refresh_summary();
        removed
    }

    fn record_written(&mut self, record: ProgressRecord) {
        self.write_seq += 1;
        self.written.insert(record.course_id(), self.write_seq);
        self.progress.insert(record.course_id(), record);
        self.refresh_summary();
    }

    fn refresh_summary(&mut self) {
        self.summary = summarize(&self.snapshot());
    }
}

/// Client-side cache of the course catalog and the viewer's progress.
///
/// Construct one per session with the backend it should talk to; dropping it
/// ends the session. Mutations (`record_progress`, `sync`) are queued in
/// arrival order, and every applied change recomputes the summary before the
/// call returns.
///
/// Loads and syncs carry tickets: a catalog response is dropped when a later
/// catalog response has already been applied. Records written while a load was
/// in flight take precedence over what that load fetched.
pub struct CourseStore {
    backend: Arc<dyn TrackerBackend>,
    state: RwLock<StoreState>,
    writes: Mutex<()>,
    tickets: AtomicU64,
}

impl CourseStore {
    #[must_use]
    pub fn new(backend: Arc<dyn TrackerBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(StoreState::default()),
            writes: Mutex::new(()),
            tickets: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch the full catalog and return it, narrowed to `category` if given.
    ///
    /// The cache always holds the whole catalog so the summary covers every
    /// course; the category only narrows the returned view.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Network` if the backend cannot be reached (cached
    /// data is kept), or `StoreError::Superseded` if a newer load or sync was
    /// applied while this one was in flight.
    pub async fn load(
        &self,
        category: Option<Category>,
    ) -> Result<Vec<CourseWithProgress>, StoreError> {
        let ticket = self.next_ticket();
        let seen_writes = self.read().write_seq;
        let entries = self.backend.list_courses(None).await.map_err(|e| {
            tracing::warn!(error = %e, "failed to fetch courses");
            StoreError::from_storage(e, None)
        })?;

        let mut state = self.write();
        if state.applied_load > ticket {
            tracing::warn!(ticket, applied = state.applied_load, "discarding stale course list");
            return Err(StoreError::Superseded);
        }
        state.applied_load = ticket;
        let removed = state.replace_catalog(entries, seen_writes);
        tracing::debug!(
            courses = state.courses.len(),
            removed = removed.len(),
            "course list loaded"
        );

        let filter = CourseFilter {
            category,
            ..CourseFilter::default()
        };
        Ok(state
            .snapshot()
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect())
    }

    /// Persist a progress update and cache the backend's canonical record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for out-of-range input (checked before
    /// any request), `StoreError::NotFound` for an id outside the loaded
    /// catalog or unknown to the backend, and `StoreError::Network` for
    /// transport failures.
    pub async fn record_progress(
        &self,
        course_id: CourseId,
        input: ProgressInput,
    ) -> Result<ProgressRecord, StoreError> {
        input.validate()?;
        {
            let state = self.read();
            if state.loaded && !state.contains(course_id) {
                return Err(StoreError::NotFound(course_id));
            }
        }

        let _queued = self.writes.lock().await;
        let record = self
            .backend
            .update_progress(course_id, &input)
            .await
            .map_err(|e| {
                tracing::warn!(%course_id, error = %e, "failed to record progress");
                StoreError::from_storage(e, Some(course_id))
            })?;

        self.write().record_written(record.clone());
        tracing::info!(
            %course_id,
            status = %record.status(),
            percentage = record.completion_percentage(),
            "progress recorded"
        );
        Ok(record)
    }

    /// Refresh the catalog from the curriculum source, then re-fetch it.
    ///
    /// Progress survives for every course whose id is unchanged; records of
    /// courses that disappeared stay available through `detached_progress`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sync` if the refresh fails and `StoreError::Network`
    /// if the follow-up fetch fails. The cached catalog is untouched either way.
    pub async fn sync(&self) -> Result<SyncOutcome, StoreError> {
        let _queued = self.writes.lock().await;

        let report = self.backend.sync_courses().await.map_err(|e| {
            tracing::error!(error = %e, "curriculum sync failed");
            StoreError::sync(e)
        })?;
        let entries = self.backend.list_courses(None).await.map_err(|e| {
            tracing::warn!(error = %e, "failed to fetch courses after sync");
            StoreError::from_storage(e, None)
        })?;

        let mut state = self.write();
        state.applied_load = self.next_ticket();
        let seen_writes = state.write_seq;
        let removed = state.replace_catalog(entries, seen_writes);
        tracing::info!(
            new = report.new_courses,
            updated = report.updated_courses,
            removed = removed.len(),
            "curriculum sync completed"
        );

        Ok(SyncOutcome {
            courses: state.courses.clone(),
            report,
            removed,
        })
    }

    #[must_use]
    pub fn query_by_category(&self, category: Category) -> Vec<Course> {
        self.read()
            .courses
            .iter()
            .filter(|c| c.category() == category)
            .cloned()
            .collect()
    }

    /// Courses whose resolved status equals `status`; a course without a
    /// record counts as `NotStarted`.
    #[must_use]
    pub fn query_by_status(&self, status: CourseStatus) -> Vec<Course> {
        let state = self.read();
        state
            .courses
            .iter()
            .filter(|c| CourseStatus::resolve(state.progress.get(&c.id())) == status)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn filter(&self, filter: &CourseFilter) -> Vec<CourseWithProgress> {
        self.read()
            .snapshot()
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect()
    }

    #[must_use]
    pub fn course(&self, id: CourseId) -> Option<CourseWithProgress> {
        let state = self.read();
        state
            .courses
            .iter()
            .find(|c| c.id() == id)
            .map(|c| state.joined(c))
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CourseWithProgress> {
        self.read().snapshot()
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.read().summary
    }

    /// Records kept for courses that are no longer in the catalog.
    #[must_use]
    pub fn detached_progress(&self) -> Vec<ProgressRecord> {
        let state = self.read();
        state
            .progress
            .values()
            .filter(|r| !state.contains(r.course_id()))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    /// Summary as computed by the backend, for cross-checking the local one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Network` if the backend cannot be reached.
    pub async fn remote_summary(&self) -> Result<ProgressSummary, StoreError> {
        self.backend
            .fetch_summary()
            .await
            .map_err(|e| StoreError::from_storage(e, None))
    }

    /// # Errors
    ///
    /// Returns `StoreError::Network` if the backend cannot be reached.
    pub async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        self.backend
            .list_categories()
            .await
            .map_err(|e| StoreError::from_storage(e, None))
    }
}
