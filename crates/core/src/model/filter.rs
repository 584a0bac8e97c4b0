use crate::model::course::{Category, Course};
use crate::model::progress::CourseStatus;
use crate::model::summary::CourseWithProgress;

/// Combined catalog filter: category, resolved status and a free-text term.
///
/// Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub category: Option<Category>,
    pub status: Option<CourseStatus>,
    pub search: Option<String>,
}

impl CourseFilter {
    #[must_use]
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn status(status: CourseStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = Some(term).filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub fn matches(&self, entry: &CourseWithProgress) -> bool {
        if let Some(category) = self.category {
            if entry.course.category() != category {
                return false;
            }
        }
        if let Some(status) = self.status {
            if entry.status() != status {
                return false;
            }
        }
        match self.search.as_deref() {
            Some(term) => matches_term(&entry.course, term),
            None => true,
        }
    }
}

/// Case-insensitive substring match on title or description.
fn matches_term(course: &Course, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    course.title().to_lowercase().contains(&term)
        || course.description().to_lowercase().contains(&term)
}
