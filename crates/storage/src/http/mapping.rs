use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracker_core::model::{
    Category, Course, CourseDraft, CourseId, CourseStatus, CourseWithProgress, Difficulty,
    ProgressRecord, ProgressSummary,
};

use crate::repository::{StorageError, SyncReport};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Accepts RFC 3339 timestamps and offset-less ones, which are read as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressDto {
    course_id: CourseId,
    #[serde(default)]
    status: CourseStatus,
    #[serde(default)]
    completion_percentage: i32,
    #[serde(default)]
    time_spent_hours: f64,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
}

impl ProgressDto {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> Result<ProgressRecord, StorageError> {
        let created_at = self.created_at.unwrap_or(now);
        ProgressRecord::from_persisted(
            self.course_id,
            self.status,
            self.completion_percentage,
            self.time_spent_hours,
            self.notes.unwrap_or_default(),
            self.started_at,
            self.completed_at,
            created_at,
            self.updated_at.unwrap_or(created_at),
        )
        .map_err(ser)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseDto {
    id: CourseId,
    title: String,
    #[serde(default)]
    description: String,
    category: Category,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "ossu_url")]
    curriculum_url: Option<String>,
    #[serde(default)]
    duration_weeks: Option<u32>,
    #[serde(default)]
    effort_hours_per_week: Option<String>,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default, alias = "topics_covered")]
    topics: Vec<String>,
    #[serde(default)]
    prerequisites: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    progress: Option<ProgressDto>,
}

impl CourseDto {
    pub(crate) fn into_domain(self, now: DateTime<Utc>) -> Result<CourseWithProgress, StorageError> {
        let created_at = self.created_at.unwrap_or(now);
        let draft = CourseDraft {
            title: self.title,
            description: self.description,
            category: self.category,
            url: self.url,
            curriculum_url: self.curriculum_url,
            duration_weeks: self.duration_weeks,
            effort_hours_per_week: self.effort_hours_per_week,
            difficulty: self.difficulty,
            topics: self.topics,
            prerequisites: self.prerequisites,
        };
        let course = Course::new(
            self.id,
            draft,
            created_at,
            self.updated_at.unwrap_or(created_at),
        )
        .map_err(ser)?;

        let progress = self
            .progress
            .map(|p| p.into_record(now))
            .transpose()?;
        if let Some(p) = &progress {
            if p.course_id() != course.id() {
                return Err(StorageError::Serialization(format!(
                    "progress for {} embedded in course {}",
                    p.course_id(),
                    course.id()
                )));
            }
        }

        Ok(CourseWithProgress::new(course, progress))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryDto {
    total_courses: u32,
    #[serde(default)]
    completed_courses: u32,
    #[serde(default)]
    in_progress_courses: u32,
    #[serde(default)]
    total_time_spent_hours: f64,
}

impl From<SummaryDto> for ProgressSummary {
    fn from(dto: SummaryDto) -> Self {
        ProgressSummary::from_parts(
            dto.total_courses,
            dto.completed_courses,
            dto.in_progress_courses,
            dto.total_time_spent_hours,
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SyncReportDto {
    #[serde(default)]
    new_courses: u32,
    #[serde(default)]
    updated_courses: u32,
    #[serde(default)]
    total_processed: u32,
}

impl From<SyncReportDto> for SyncReport {
    fn from(dto: SyncReportDto) -> Self {
        SyncReport {
            new_courses: dto.new_courses,
            updated_courses: dto.updated_courses,
            total_processed: dto.total_processed,
        }
    }
}

/// Pull the human message out of an error body (`{"detail": "..."}`), falling
/// back to the raw text.
pub(crate) fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::time::fixed_now;

    const COURSE_ID: &str = "6f1c2a3e-9a4b-4d7e-8f10-2b3c4d5e6f70";

    #[test]
    fn course_payload_with_naive_timestamps() {
        let json = format!(
            r#"{{
                "id": "{COURSE_ID}",
                "title": "Introduction to Computer Science and Programming using Python",
                "description": "Learn Python",
                "url": "https://example.org/6.0001",
                "ossu_url": "https://github.com/ossu/computer-science#intro-cs",
                "duration_weeks": 14,
                "effort_hours_per_week": "6-10 hours",
                "prerequisites": ["high school algebra"],
                "category": "intro_cs",
                "difficulty": "beginner",
                "topics_covered": ["python", "recursion"],
                "created_at": "2024-03-01T10:15:30.123456",
                "updated_at": "2024-03-02T10:15:30",
                "progress": {{
                    "id": "ignored",
                    "user_id": "default_user",
                    "course_id": "{COURSE_ID}",
                    "status": "completed",
                    "completion_percentage": 100,
                    "time_spent_hours": 42.5,
                    "notes": "done",
                    "started_at": null,
                    "completed_at": "2024-03-05T08:00:00Z"
                }}
            }}"#
        );

        let dto: CourseDto = serde_json::from_str(&json).unwrap();
        let entry = dto.into_domain(fixed_now()).unwrap();

        assert_eq!(entry.course.category(), Category::IntroCs);
        assert_eq!(entry.course.difficulty(), Difficulty::Beginner);
        assert_eq!(entry.course.topics().len(), 2);
        assert!(entry.course.curriculum_url().is_some());
        assert_eq!(
            entry.course.created_at().to_rfc3339(),
            "2024-03-01T10:15:30.123456+00:00"
        );

        let progress = entry.progress.unwrap();
        assert_eq!(progress.status(), CourseStatus::Completed);
        assert!((progress.time_spent_hours() - 42.5).abs() < f64::EPSILON);
        assert!(progress.completed_at().is_some());
        assert_eq!(progress.created_at(), fixed_now());
    }

    #[test]
    fn minimal_course_payload() {
        let json = format!(r#"{{"id": "{COURSE_ID}", "title": "SICP", "category": "core_programming"}}"#);
        let dto: CourseDto = serde_json::from_str(&json).unwrap();
        let entry = dto.into_domain(fixed_now()).unwrap();
        assert!(entry.progress.is_none());
        assert!(entry.course.url().is_none());
        assert_eq!(entry.course.created_at(), fixed_now());
    }

    #[test]
    fn out_of_range_progress_is_rejected() {
        let json = format!(
            r#"{{"course_id": "{COURSE_ID}", "status": "in_progress", "completion_percentage": 140}}"#
        );
        let dto: ProgressDto = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            dto.into_record(fixed_now()).unwrap_err(),
            StorageError::Serialization(_)
        ));
    }

    #[test]
    fn error_detail_prefers_detail_field() {
        assert_eq!(error_detail(r#"{"detail": "Course not found"}"#), "Course not found");
        assert_eq!(error_detail("  plain text "), "plain text");
    }
}
