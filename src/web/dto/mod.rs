pub mod formations;
pub mod progress;
pub mod quizzes;
pub mod resources;
