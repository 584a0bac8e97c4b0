use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::model::ids::CourseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown category: {0}")]
pub struct ParseCategoryError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown difficulty: {0}")]
pub struct ParseDifficultyError(pub String);

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Curriculum area a course belongs to.
///
/// Exchanged on the wire as the snake_case name (`intro_cs`, `core_math`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Prerequisites,
    IntroCs,
    CoreProgramming,
    CoreMath,
    CsTools,
    CoreSystems,
    CoreTheory,
    CoreSecurity,
    CoreApplications,
    CoreEthics,
    AdvancedProgramming,
    AdvancedSystems,
    AdvancedTheory,
    AdvancedSecurity,
    AdvancedMath,
    FinalProject,
}

impl Category {
    /// Every category, in curriculum order.
    pub const ALL: [Category; 16] = [
        Category::Prerequisites,
        Category::IntroCs,
        Category::CoreProgramming,
        Category::CoreMath,
        Category::CsTools,
        Category::CoreSystems,
        Category::CoreTheory,
        Category::CoreSecurity,
        Category::CoreApplications,
        Category::CoreEthics,
        Category::AdvancedProgramming,
        Category::AdvancedSystems,
        Category::AdvancedTheory,
        Category::AdvancedSecurity,
        Category::AdvancedMath,
        Category::FinalProject,
    ];

    /// Wire name of the category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Prerequisites => "prerequisites",
            Category::IntroCs => "intro_cs",
            Category::CoreProgramming => "core_programming",
            Category::CoreMath => "core_math",
            Category::CsTools => "cs_tools",
            Category::CoreSystems => "core_systems",
            Category::CoreTheory => "core_theory",
            Category::CoreSecurity => "core_security",
            Category::CoreApplications => "core_applications",
            Category::CoreEthics => "core_ethics",
            Category::AdvancedProgramming => "advanced_programming",
            Category::AdvancedSystems => "advanced_systems",
            Category::AdvancedTheory => "advanced_theory",
            Category::AdvancedSecurity => "advanced_security",
            Category::AdvancedMath => "advanced_math",
            Category::FinalProject => "final_project",
        }
    }

    /// Human readable label, e.g. "Core Math".
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Prerequisites => "Prerequisites",
            Category::IntroCs => "Intro CS",
            Category::CoreProgramming => "Core Programming",
            Category::CoreMath => "Core Math",
            Category::CsTools => "CS Tools",
            Category::CoreSystems => "Core Systems",
            Category::CoreTheory => "Core Theory",
            Category::CoreSecurity => "Core Security",
            Category::CoreApplications => "Core Applications",
            Category::CoreEthics => "Core Ethics",
            Category::AdvancedProgramming => "Advanced Programming",
            Category::AdvancedSystems => "Advanced Systems",
            Category::AdvancedTheory => "Advanced Theory",
            Category::AdvancedSecurity => "Advanced Security",
            Category::AdvancedMath => "Advanced Math",
            Category::FinalProject => "Final Project",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ParseDifficultyError(s.to_string())),
        }
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Unvalidated course fields as delivered by a curriculum snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub url: Option<String>,
    pub curriculum_url: Option<String>,
    pub duration_weeks: Option<u32>,
    pub effort_hours_per_week: Option<String>,
    pub difficulty: Difficulty,
    pub topics: Vec<String>,
    pub prerequisites: Vec<String>,
}

impl CourseDraft {
    /// A draft with only the required fields set.
    #[must_use]
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category,
            url: None,
            curriculum_url: None,
            duration_weeks: None,
            effort_hours_per_week: None,
            difficulty: Difficulty::default(),
            topics: Vec::new(),
            prerequisites: Vec::new(),
        }
    }
}

/// Immutable catalog entry describing one curriculum unit.
///
/// Only a sync produces or replaces courses; nothing the viewer does mutates them.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    id: CourseId,
    title: String,
    description: String,
    category: Category,
    url: Option<Url>,
    curriculum_url: Option<Url>,
    duration_weeks: Option<u32>,
    effort_hours_per_week: Option<String>,
    difficulty: Difficulty,
    topics: Vec<String>,
    prerequisites: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Course {
    /// Build a course from a draft.
    ///
    /// Title and description are trimmed, empty or unparseable URLs become `None`,
    /// and blank topics/prerequisites are dropped.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if the title is empty or whitespace-only.
    pub fn new(
        id: CourseId,
        draft: CourseDraft,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        Ok(Self {
            id,
            title: title.to_owned(),
            description: draft.description.trim().to_owned(),
            category: draft.category,
            url: parse_url(draft.url.as_deref()),
            curriculum_url: parse_url(draft.curriculum_url.as_deref()),
            duration_weeks: draft.duration_weeks,
            effort_hours_per_week: draft
                .effort_hours_per_week
                .map(|e| e.trim().to_owned())
                .filter(|e| !e.is_empty()),
            difficulty: draft.difficulty,
            topics: clean_list(draft.topics),
            prerequisites: clean_list(draft.prerequisites),
            created_at,
            updated_at,
        })
    }

    /// Convert back into a draft, e.g. to re-stage a snapshot.
    #[must_use]
    pub fn to_draft(&self) -> CourseDraft {
        CourseDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            url: self.url.as_ref().map(ToString::to_string),
            curriculum_url: self.curriculum_url.as_ref().map(ToString::to_string),
            duration_weeks: self.duration_weeks,
            effort_hours_per_week: self.effort_hours_per_week.clone(),
            difficulty: self.difficulty,
            topics: self.topics.clone(),
            prerequisites: self.prerequisites.clone(),
        }
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Link to the curriculum page section listing this course.
    #[must_use]
    pub fn curriculum_url(&self) -> Option<&Url> {
        self.curriculum_url.as_ref()
    }

    #[must_use]
    pub fn duration_weeks(&self) -> Option<u32> {
        self.duration_weeks
    }

    #[must_use]
    pub fn effort_hours_per_week(&self) -> Option<&str> {
        self.effort_hours_per_week.as_deref()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    #[must_use]
    pub fn prerequisites(&self) -> &[String] {
        &self.prerequisites
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn parse_url(raw: Option<&str>) -> Option<Url> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Url::parse(s).ok())
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft(title: &str) -> CourseDraft {
        CourseDraft {
            description: "  Learn recursion  ".into(),
            url: Some("https://example.org/course".into()),
            curriculum_url: Some(String::new()),
            topics: vec!["recursion".into(), "  ".into()],
            ..CourseDraft::new(title, Category::IntroCs)
        }
    }

    #[test]
    fn course_new_rejects_empty_title() {
        let err = Course::new(CourseId::random(), draft("   "), fixed_now(), fixed_now())
            .unwrap_err();
        assert_eq!(err, CourseError::EmptyTitle);
    }

    #[test]
    fn course_new_normalizes_fields() {
        let course = Course::new(
            CourseId::random(),
            draft("  Systematic Program Design "),
            fixed_now(),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(course.title(), "Systematic Program Design");
        assert_eq!(course.description(), "Learn recursion");
        assert_eq!(
            course.url().map(Url::as_str),
            Some("https://example.org/course")
        );
        assert!(course.curriculum_url().is_none());
        assert_eq!(course.topics(), ["recursion".to_string()]);
        assert_eq!(course.difficulty(), Difficulty::Intermediate);
    }

    #[test]
    fn invalid_url_is_treated_as_absent() {
        let mut d = draft("Math for CS");
        d.url = Some("not a url".into());
        let course = Course::new(CourseId::random(), d, fixed_now(), fixed_now()).unwrap();
        assert!(course.url().is_none());
    }

    #[test]
    fn category_parses_wire_names() {
        assert_eq!("core_math".parse::<Category>().unwrap(), Category::CoreMath);
        assert_eq!(
            "advanced_security".parse::<Category>().unwrap(),
            Category::AdvancedSecurity
        );
        assert!("core math".parse::<Category>().is_err());
    }

    #[test]
    fn category_wire_names_match_serde() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn category_label() {
        assert_eq!(Category::CsTools.label(), "CS Tools");
        assert_eq!(Category::FinalProject.label(), "Final Project");
    }

    #[test]
    fn difficulty_defaults_to_intermediate() {
        assert_eq!(Difficulty::default(), Difficulty::Intermediate);
        assert_eq!("advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
    }
}
