//! Plain-text rendering for the command line.

use std::fmt::Write as _;

use services::SyncOutcome;
use tracker_core::model::{CourseStatus, CourseWithProgress, ProgressSummary};

fn status_marker(status: CourseStatus) -> &'static str {
    match status {
        CourseStatus::NotStarted => "[ ]",
        CourseStatus::InProgress => "[~]",
        CourseStatus::Completed => "[x]",
    }
}

fn hours(value: f64) -> String {
    format!("{value:.1}h")
}

/// One line per course: marker, id, category, title and progress figures.
pub fn course_line(entry: &CourseWithProgress) -> String {
    let course = &entry.course;
    let mut line = format!(
        "{} {} {:<20} {}",
        status_marker(entry.status()),
        course.id(),
        course.category().label(),
        course.title()
    );
    if let Some(record) = &entry.progress {
        let _ = write!(
            line,
            " ({}%, {})",
            record.completion_percentage(),
            hours(record.time_spent_hours())
        );
    }
    line
}

pub fn course_detail(entry: &CourseWithProgress) -> String {
    let course = &entry.course;
    let mut out = String::new();
    let _ = writeln!(out, "{}", course.title());
    let _ = writeln!(out, "  id:          {}", course.id());
    let _ = writeln!(out, "  category:    {}", course.category().label());
    let _ = writeln!(out, "  difficulty:  {}", course.difficulty().as_str());
    if let Some(weeks) = course.duration_weeks() {
        let _ = writeln!(out, "  duration:    {weeks} weeks");
    }
    if let Some(effort) = course.effort_hours_per_week() {
        let _ = writeln!(out, "  effort:      {effort}");
    }
    if let Some(url) = course.url() {
        let _ = writeln!(out, "  url:         {url}");
    }
    if !course.topics().is_empty() {
        let _ = writeln!(out, "  topics:      {}", course.topics().join(", "));
    }
    if !course.prerequisites().is_empty() {
        let _ = writeln!(out, "  requires:    {}", course.prerequisites().join(", "));
    }
    if !course.description().is_empty() {
        let _ = writeln!(out, "\n  {}", course.description());
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  status:      {}", entry.status().label());
    if let Some(record) = &entry.progress {
        let _ = writeln!(out, "  completion:  {}%", record.completion_percentage());
        let _ = writeln!(out, "  time spent:  {}", hours(record.time_spent_hours()));
        if let Some(started) = record.started_at() {
            let _ = writeln!(out, "  started:     {}", started.format("%Y-%m-%d"));
        }
        let completed = record
            .completed_at()
            .filter(|_| record.status() == CourseStatus::Completed);
        if let Some(completed) = completed {
            let _ = writeln!(out, "  completed:   {}", completed.format("%Y-%m-%d"));
        }
        if !record.notes().is_empty() {
            let _ = writeln!(out, "  notes:       {}", record.notes());
        }
    }
    out
}

pub fn summary(summary: &ProgressSummary) -> String {
    format!(
        "{}% complete: {} of {} courses done, {} in progress, {} not started, {} spent",
        summary.completion_percentage(),
        summary.completed_courses(),
        summary.total_courses(),
        summary.in_progress_courses(),
        summary.not_started_courses(),
        hours(summary.total_time_spent_hours())
    )
}

pub fn sync_outcome(outcome: &SyncOutcome) -> String {
    format!(
        "Synced {} courses: {} new, {} updated, {} removed",
        outcome.report.total_processed,
        outcome.report.new_courses,
        outcome.report.updated_courses,
        outcome.removed.len()
    )
}
