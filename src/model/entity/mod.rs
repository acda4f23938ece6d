mod personne;
pub use personne::{Personne, PersonneCreate};

mod team;
pub use team::Team;

mod domain;
pub use domain::Domain;

mod formation;
pub use formation::{Formation, FormationContent, FormationStatus, FormationWrite};

mod module;
pub use module::{Module, ModuleWrite};

mod resource;
pub use resource::{Resource, ResourceWrite};

mod quiz;
pub use quiz::{
    OptionWrite, Question, QuestionOption, QuestionWithOptions, QuestionWrite, Quiz,
    QuizWithQuestions, QuizWrite,
};

mod user_formation;
pub use user_formation::{ARCHIVED_ATTEMPTS, ResetSummary, UserFormation};

mod user_item;
pub use user_item::{UserModule, UserResource};

mod user_quiz;
pub use user_quiz::{QuizScore, UserQuiz};

mod user_quiz_history;
pub use user_quiz_history::UserQuizHistory;

mod user_answer;
pub use user_answer::{AnswerSubmission, UserAnswer};
