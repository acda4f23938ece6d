use serde::{Deserialize, Serialize};

/// Name of the always-present first tab of a formation.
pub const OVERVIEW_STEP: &str = "overview";

/// Tabs a user can explicitly mark as completed.
pub const KNOWN_STEPS: [&str; 4] = [OVERVIEW_STEP, "modules", "resources", "quiz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    New,
    InProgress,
    Done,
}

impl ProgressStatus {
    pub fn from_progress(progress: i32) -> Self {
        match progress {
            p if p >= 100 => Self::Done,
            p if p > 0 => Self::InProgress,
            _ => Self::New,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl From<&str> for ProgressStatus {
    fn from(value: &str) -> Self {
        match value {
            "in_progress" => Self::InProgress,
            "done" => Self::Done,
            _ => Self::New,
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw completion counters of one user on one formation.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct ProgressCounts {
    pub overview_done: bool,
    pub total_modules: i64,
    pub completed_modules: i64,
    pub total_resources: i64,
    pub completed_resources: i64,
    pub has_quiz: bool,
    pub quiz_completed: bool,
}

impl ProgressCounts {
    pub fn total_items(&self) -> i64 {
        1 + self.total_modules + self.total_resources + i64::from(self.has_quiz)
    }

    pub fn completed_items(&self) -> i64 {
        i64::from(self.overview_done)
            + self.completed_modules
            + self.completed_resources
            + i64::from(self.has_quiz && self.quiz_completed)
    }

    /// Completion percentage, truncated towards zero.
    pub fn progress(&self) -> i32 {
        let total = self.total_items();
        if total <= 0 {
            return 100;
        }

        let pct = (self.completed_items() * 100) / total;
        pct.clamp(0, 100) as i32
    }

    pub fn status(&self) -> ProgressStatus {
        ProgressStatus::from_progress(self.progress())
    }

    /// Per-tab completion. Tabs whose content is absent are reported as `None`.
    pub fn tabs(&self) -> TabsCompleted {
        TabsCompleted {
            overview: self.overview_done,
            modules: (self.total_modules > 0)
                .then_some(self.completed_modules == self.total_modules),
            resources: (self.total_resources > 0)
                .then_some(self.completed_resources == self.total_resources),
            quiz: self.has_quiz.then_some(self.quiz_completed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TabsCompleted {
    pub overview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<bool>,
}

impl TabsCompleted {
    /// Same flags with absent tabs collapsed to `false`, as the detail page expects.
    pub fn filled(self) -> Self {
        Self {
            overview: self.overview,
            modules: Some(self.modules.unwrap_or(false)),
            resources: Some(self.resources.unwrap_or(false)),
            quiz: Some(self.quiz.unwrap_or(false)),
        }
    }
}

/// `HH:MM:SS`, hours are not wrapped at 24.
pub fn format_hms(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses `HH:MM:SS` (hours unbounded) or a bare number of seconds.
/// Values that do not fit in an `i64` of seconds are rejected.
pub fn parse_hms(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parts: Vec<&str> = value.split(':').collect();
    let numbers = parts
        .iter()
        .map(|p| p.parse::<i64>().ok().filter(|n| *n >= 0))
        .collect::<Option<Vec<_>>>()?;

    match numbers.as_slice() {
        [seconds] => Some(*seconds),
        [minutes, seconds] if *seconds < 60 => minutes.checked_mul(60)?.checked_add(*seconds),
        [hours, minutes, seconds] if *minutes < 60 && *seconds < 60 => hours
            .checked_mul(3600)?
            .checked_add(minutes * 60 + seconds),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn formation(modules: i64, resources: i64, quiz: bool) -> ProgressCounts {
        ProgressCounts {
            total_modules: modules,
            total_resources: resources,
            has_quiz: quiz,
            ..Default::default()
        }
    }

    #[test]
    fn empty_formation_counts_the_overview() {
        let counts = formation(0, 0, false);
        assert_eq!(counts.total_items(), 1);
        assert_eq!(counts.progress(), 0);
        assert_eq!(counts.status(), ProgressStatus::New);

        let done = ProgressCounts {
            overview_done: true,
            ..counts
        };
        assert_eq!(done.progress(), 100);
        assert_eq!(done.status(), ProgressStatus::Done);
    }

    #[test]
    fn everything_but_the_quiz_is_eighty_percent() {
        let counts = ProgressCounts {
            overview_done: true,
            completed_modules: 2,
            completed_resources: 1,
            ..formation(2, 1, true)
        };
        assert_eq!(counts.total_items(), 5);
        assert_eq!(counts.completed_items(), 4);
        assert_eq!(counts.progress(), 80);
        assert_eq!(counts.status(), ProgressStatus::InProgress);

        let finished = ProgressCounts {
            quiz_completed: true,
            ..counts
        };
        assert_eq!(finished.progress(), 100);
        assert_eq!(finished.status(), ProgressStatus::Done);
    }

    #[test]
    fn progress_is_truncated_not_rounded() {
        // 2 of 3 -> 66.66
        let counts = ProgressCounts {
            overview_done: true,
            completed_modules: 1,
            ..formation(2, 0, false)
        };
        assert_eq!(counts.progress(), 66);
    }

    #[test]
    fn quiz_completion_is_ignored_without_quiz() {
        let counts = ProgressCounts {
            quiz_completed: true,
            ..formation(1, 0, false)
        };
        assert_eq!(counts.completed_items(), 0);
    }

    #[test]
    fn partial_progress_over_every_kind() {
        // 3 of 9
        let counts = ProgressCounts {
            overview_done: true,
            completed_resources: 2,
            ..formation(3, 4, true)
        };
        assert_eq!(counts.total_items(), 9);
        assert_eq!(counts.progress(), 33);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(ProgressStatus::from_progress(0), ProgressStatus::New);
        assert_eq!(ProgressStatus::from_progress(1), ProgressStatus::InProgress);
        assert_eq!(ProgressStatus::from_progress(99), ProgressStatus::InProgress);
        assert_eq!(ProgressStatus::from_progress(100), ProgressStatus::Done);
    }

    #[test]
    fn tabs_only_report_present_content() {
        let counts = ProgressCounts {
            overview_done: true,
            completed_modules: 1,
            ..formation(1, 0, true)
        };
        let tabs = counts.tabs();
        assert!(tabs.overview);
        assert_eq!(tabs.modules, Some(true));
        assert_eq!(tabs.resources, None);
        assert_eq!(tabs.quiz, Some(false));

        let json = serde_json::to_value(tabs).unwrap();
        assert!(json.get("resources").is_none());

        let filled = tabs.filled();
        assert_eq!(filled.resources, Some(false));
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3725), "01:02:05");
        assert_eq!(format_hms(90_000), "25:00:00");
        assert_eq!(format_hms(-5), "00:00:00");
    }

    #[test]
    fn hms_parsing() {
        assert_eq!(parse_hms("01:02:05"), Some(3725));
        assert_eq!(parse_hms("25:00:00"), Some(90_000));
        assert_eq!(parse_hms("10:30"), Some(630));
        assert_eq!(parse_hms("90"), Some(90));
        assert_eq!(parse_hms("00:61:00"), None);
        assert_eq!(parse_hms("abc"), None);
        assert_eq!(parse_hms(""), None);
        assert_eq!(parse_hms(&format_hms(4000)), Some(4000));
    }

    #[test]
    fn hms_parsing_rejects_overflow() {
        assert_eq!(parse_hms("9999999999999999:00:00"), None);
        assert_eq!(parse_hms("999999999999999999:00"), None);
        assert_eq!(parse_hms("2562047788015215:30:07"), Some(i64::MAX));
    }
}
