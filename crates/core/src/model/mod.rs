mod course;
mod filter;
mod ids;
mod progress;
mod summary;

pub use ids::{CourseId, ParseIdError};

pub use course::{
    Category, Course, CourseDraft, CourseError, Difficulty, ParseCategoryError,
    ParseDifficultyError,
};
pub use filter::CourseFilter;
pub use progress::{CourseStatus, ParseStatusError, ProgressError, ProgressInput, ProgressRecord};
pub use summary::{CourseWithProgress, ProgressSummary, summarize};
