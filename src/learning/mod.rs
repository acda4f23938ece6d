//! Storage-independent rules: quiz grading and progress arithmetic.

pub mod progress;
pub use progress::{
    KNOWN_STEPS, OVERVIEW_STEP, ProgressCounts, ProgressStatus, TabsCompleted, format_hms, parse_hms,
};

pub mod scoring;
pub use scoring::{QuestionRule, QuestionType, check_answer, score};
