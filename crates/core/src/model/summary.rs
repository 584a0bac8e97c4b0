use crate::model::course::Course;
use crate::model::progress::{CourseStatus, ProgressRecord};

/// A catalog course paired with the viewer's record, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseWithProgress {
    pub course: Course,
    pub progress: Option<ProgressRecord>,
}

impl CourseWithProgress {
    #[must_use]
    pub fn new(course: Course, progress: Option<ProgressRecord>) -> Self {
        Self { course, progress }
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        CourseStatus::resolve(self.progress.as_ref())
    }

    #[must_use]
    pub fn time_spent_hours(&self) -> f64 {
        self.progress
            .as_ref()
            .map_or(0.0, ProgressRecord::time_spent_hours)
    }
}

/// Aggregate statistics derived from the catalog and its records.
///
/// Never stored on its own; always recomputed with [`summarize`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSummary {
    total_courses: u32,
    completed_courses: u32,
    in_progress_courses: u32,
    total_time_spent_hours: f64,
    completion_percentage: u32,
}

impl ProgressSummary {
    /// Rehydrate a summary reported by a backend.
    ///
    /// Counts are clamped so that `completed + in_progress <= total` holds even
    /// for an inconsistent payload.
    #[must_use]
    pub fn from_parts(
        total_courses: u32,
        completed_courses: u32,
        in_progress_courses: u32,
        total_time_spent_hours: f64,
    ) -> Self {
        let completed_courses = completed_courses.min(total_courses);
        let in_progress_courses = in_progress_courses.min(total_courses - completed_courses);
        Self {
            total_courses,
            completed_courses,
            in_progress_courses,
            total_time_spent_hours,
            completion_percentage: percentage(completed_courses, total_courses),
        }
    }

    #[must_use]
    pub fn total_courses(&self) -> u32 {
        self.total_courses
    }

    #[must_use]
    pub fn completed_courses(&self) -> u32 {
        self.completed_courses
    }

    #[must_use]
    pub fn in_progress_courses(&self) -> u32 {
        self.in_progress_courses
    }

    #[must_use]
    pub fn not_started_courses(&self) -> u32 {
        self.total_courses - self.completed_courses - self.in_progress_courses
    }

    #[must_use]
    pub fn total_time_spent_hours(&self) -> f64 {
        self.total_time_spent_hours
    }

    /// Completed share of the catalog, rounded to a whole percent.
    #[must_use]
    pub fn completion_percentage(&self) -> u32 {
        self.completion_percentage
    }
}

/// Compute the summary for a catalog snapshot.
///
/// Pure and total: an empty catalog gives all zeros.
#[must_use]
pub fn summarize<'a, I>(courses: I) -> ProgressSummary
where
    I: IntoIterator<Item = &'a CourseWithProgress>,
{
    let mut total = 0_u32;
    let mut completed = 0_u32;
    let mut in_progress = 0_u32;
    let mut hours = 0.0_f64;

    for entry in courses {
        total = total.saturating_add(1);
        match entry.status() {
            CourseStatus::Completed => completed = completed.saturating_add(1),
            CourseStatus::InProgress => in_progress = in_progress.saturating_add(1),
            CourseStatus::NotStarted => {}
        }
        hours += entry.time_spent_hours();
    }

    ProgressSummary {
        total_courses: total,
        completed_courses: completed,
        in_progress_courses: in_progress,
        total_time_spent_hours: hours,
        completion_percentage: percentage(completed, total),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(completed) / f64::from(total) * 100.0).round() as u32
}
