use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::CourseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Validation failures for progress input.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("completion percentage must be between 0 and 100, got {0}")]
    PercentageOutOfRange(i32),

    #[error("time spent cannot be negative, got {0}")]
    NegativeTime(f64),

    #[error("time spent must be a finite number")]
    NonFiniteTime,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown course status: {0}")]
pub struct ParseStatusError(pub String);

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Where the viewer stands with a course.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl CourseStatus {
    pub const ALL: [CourseStatus; 3] = [
        CourseStatus::NotStarted,
        CourseStatus::InProgress,
        CourseStatus::Completed,
    ];

    /// Effective status of a course given its (possibly missing) record.
    ///
    /// A course without a record has not been started. Every status read goes
    /// through here.
    #[must_use]
    pub fn resolve(record: Option<&ProgressRecord>) -> Self {
        record.map_or(Self::NotStarted, ProgressRecord::status)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::NotStarted => "not_started",
            CourseStatus::InProgress => "in_progress",
            CourseStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CourseStatus::NotStarted => "Not Started",
            CourseStatus::InProgress => "In Progress",
            CourseStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

/// A partial progress update. Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CourseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ProgressInput {
    /// Seed a full edit form from an existing record, or from defaults when
    /// the course has no record yet.
    #[must_use]
    pub fn from_record(record: Option<&ProgressRecord>) -> Self {
        match record {
            Some(r) => Self {
                status: Some(r.status()),
                completion_percentage: Some(i32::from(r.completion_percentage())),
                time_spent_hours: Some(r.time_spent_hours()),
                notes: Some(r.notes().to_owned()),
            },
            None => Self {
                status: Some(CourseStatus::NotStarted),
                completion_percentage: Some(0),
                time_spent_hours: Some(0.0),
                notes: Some(String::new()),
            },
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: CourseStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_percentage(mut self, percentage: i32) -> Self {
        self.completion_percentage = Some(percentage);
        self
    }

    #[must_use]
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.time_spent_hours = Some(hours);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Add `delta` hours to the time field, never going below zero.
    pub fn adjust_hours(&mut self, delta: f64) {
        let current = self.time_spent_hours.unwrap_or(0.0);
        self.time_spent_hours = Some((current + delta).max(0.0));
    }

    /// True when the input carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.completion_percentage.is_none()
            && self.time_spent_hours.is_none()
            && self.notes.is_none()
    }

    /// Check field ranges.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PercentageOutOfRange` for a percentage outside `0..=100`,
    /// `ProgressError::NonFiniteTime` / `ProgressError::NegativeTime` for bad hours.
    pub fn validate(&self) -> Result<(), ProgressError> {
        if let Some(pct) = self.completion_percentage {
            if !(0..=100).contains(&pct) {
                return Err(ProgressError::PercentageOutOfRange(pct));
            }
        }
        if let Some(hours) = self.time_spent_hours {
            if !hours.is_finite() {
                return Err(ProgressError::NonFiniteTime);
            }
            if hours < 0.0 {
                return Err(ProgressError::NegativeTime(hours));
            }
        }
        Ok(())
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Per-course progress of the single viewer.
///
/// Invariants: `completion_percentage <= 100`, `time_spent_hours` finite and
/// non-negative. `completed_at` is the last time the course moved to
/// `Completed`; it survives a later move back to another status.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    course_id: CourseId,
    status: CourseStatus,
    completion_percentage: u8,
    time_spent_hours: f64,
    notes: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Create the first record for a course from an update.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the input fails validation.
    pub fn create(
        course_id: CourseId,
        input: &ProgressInput,
        now: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        let mut record = Self {
            course_id,
            status: CourseStatus::NotStarted,
            completion_percentage: 0,
            time_spent_hours: 0.0,
            notes: String::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        record.apply(input, now)?;
        Ok(record)
    }

    /// Rehydrate a record from a backend payload.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the persisted values violate the record's ranges.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        course_id: CourseId,
        status: CourseStatus,
        completion_percentage: i32,
        time_spent_hours: f64,
        notes: String,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        let input = ProgressInput {
            status: Some(status),
            completion_percentage: Some(completion_percentage),
            time_spent_hours: Some(time_spent_hours),
            notes: None,
        };
        input.validate()?;

        Ok(Self {
            course_id,
            status,
            completion_percentage: percentage_u8(completion_percentage),
            time_spent_hours,
            notes,
            started_at,
            completed_at,
            created_at,
            updated_at,
        })
    }

    /// Apply a partial update in place.
    ///
    /// Moving to `Completed` forces the percentage to 100 and stamps `completed_at`
    /// on the transition only, so repeating the same update changes nothing but
    /// `updated_at`. Leaving `Completed` keeps `completed_at`. Setting the
    /// percentage never changes the status. The first move to `InProgress`
    /// stamps `started_at`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the input fails validation; the record is left
    /// untouched in that case.
    pub fn apply(&mut self, input: &ProgressInput, now: DateTime<Utc>) -> Result<(), ProgressError> {
        input.validate()?;

        if let Some(pct) = input.completion_percentage {
            self.completion_percentage = percentage_u8(pct);
        }
        if let Some(hours) = input.time_spent_hours {
            self.time_spent_hours = hours;
        }
        if let Some(notes) = &input.notes {
            self.notes.clone_from(notes);
        }

        if let Some(status) = input.status {
            match status {
                CourseStatus::Completed => {
                    if self.status != CourseStatus::Completed || self.completed_at.is_none() {
                        self.completed_at = Some(now);
                    }
                    self.completion_percentage = 100;
                }
                CourseStatus::InProgress => {
                    if self.started_at.is_none() {
                        self.started_at = Some(now);
                    }
                }
                CourseStatus::NotStarted => {}
            }
            self.status = status;
        }

        self.updated_at = now;
        Ok(())
    }

    // Accessors
    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        self.status
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    #[must_use]
    pub fn time_spent_hours(&self) -> f64 {
        self.time_spent_hours
    }

    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Compare the user-editable fields, ignoring timestamps.
    #[must_use]
    pub fn same_fields(&self, other: &Self) -> bool {
        self.course_id == other.course_id
            && self.status == other.status
            && self.completion_percentage == other.completion_percentage
            && (self.time_spent_hours - other.time_spent_hours).abs() < f64::EPSILON
            && self.notes == other.notes
    }
}

// Callers validate first, so the clamp only guards the cast.
fn percentage_u8(pct: i32) -> u8 {
    u8::try_from(pct.clamp(0, 100)).unwrap_or(100)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
