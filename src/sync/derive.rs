//! Derived fields recomputed on every upsert.
//!
//! Everything here is a pure function of titles, indices and child sets.
//! Keyword classification is table-driven: each table is an ordered list of
//! `(substring, label)` rules matched case-insensitively, first match wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::date_util::round1;
use crate::source::WorkoutExercise;

static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(week|w)\s*(\d+)").unwrap());
static RE_DAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(day|d|#)\s*(\d+)").unwrap());

/// An ordered keyword rule: if the lowercased title contains `.0`, the label is `.1`.
pub type KeywordRule = (&'static str, &'static str);

pub const DAY_TYPE_RULES: &[KeywordRule] = &[
    ("bench", "Bench"),
    ("squat", "Squat"),
    ("deadlift", "Deadlift"),
    ("ohp", "OHP"),
    ("overhead", "OHP"),
    ("upper", "Upper"),
    ("lower", "Lower"),
    ("push", "Push"),
    ("pull", "Pull"),
    ("leg", "Legs"),
    ("full", "Full Body"),
    ("conditioning", "Conditioning"),
    ("rest", "Rest"),
];
pub const DEFAULT_DAY_TYPE: &str = "Other";

pub const ACCESSORY_RULES: &[KeywordRule] = &[
    ("curl", "Accessory"),
    ("raise", "Accessory"),
    ("extension", "Accessory"),
    ("fly", "Accessory"),
    ("pushdown", "Accessory"),
    ("face pull", "Accessory"),
    ("shrug", "Accessory"),
    ("calf", "Accessory"),
    ("crunch", "Accessory"),
    ("plank", "Accessory"),
    ("ab ", "Accessory"),
];

pub const MUSCLE_GROUP_RULES: &[KeywordRule] = &[
    ("lateral", "Shoulders"),
    ("overhead", "Shoulders"),
    ("shoulder", "Shoulders"),
    ("ohp", "Shoulders"),
    ("face pull", "Shoulders"),
    ("bench", "Chest"),
    ("chest", "Chest"),
    ("fly", "Chest"),
    ("push up", "Chest"),
    ("squat", "Legs"),
    ("leg", "Legs"),
    ("lunge", "Legs"),
    ("calf", "Legs"),
    ("hip thrust", "Legs"),
    ("deadlift", "Back"),
    ("row", "Back"),
    ("pull", "Back"),
    ("lat", "Back"),
    ("chin", "Back"),
    ("curl", "Arms"),
    ("tricep", "Arms"),
    ("extension", "Arms"),
    ("dip", "Arms"),
    ("crunch", "Core"),
    ("plank", "Core"),
    ("ab ", "Core"),
    ("press", "Shoulders"),
];
pub const DEFAULT_MUSCLE_GROUP: &str = "Other";

pub const ROLE_MAIN_LIFT: &str = "Main Lift";
pub const ROLE_VARIATION: &str = "Variation";
pub const ROLE_ACCESSORY: &str = "Accessory";

/// Evaluate a rule table top-to-bottom against `title`.
pub fn classify(title: &str, rules: &[KeywordRule]) -> Option<&'static str> {
    // Pad so trailing-space keywords like "ab " also match at the end.
    let haystack = format!("{} ", title.to_lowercase());
    rules
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, label)| *label)
}

pub fn week_number(title: &str) -> Option<i64> {
    capture_number(&RE_WEEK, title)
}

pub fn day_number(title: &str) -> Option<i64> {
    capture_number(&RE_DAY, title)
}

fn capture_number(re: &Regex, title: &str) -> Option<i64> {
    re.captures(title)
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn day_type(title: &str) -> &'static str {
    classify(title, DAY_TYPE_RULES).unwrap_or(DEFAULT_DAY_TYPE)
}

/// Role of an exercise within a routine, from its 0-based position and title.
pub fn exercise_role(index: i64, title: &str) -> &'static str {
    if index == 0 {
        return ROLE_MAIN_LIFT;
    }
    if let Some(label) = classify(title, ACCESSORY_RULES) {
        return label;
    }
    match index {
        1 | 2 => ROLE_VARIATION,
        _ => ROLE_ACCESSORY,
    }
}

pub fn muscle_group(title: &str) -> &'static str {
    classify(title, MUSCLE_GROUP_RULES).unwrap_or(DEFAULT_MUSCLE_GROUP)
}

/// Folder ("week") ordering: `week * 100 + index`.
pub fn folder_sort_order(week: Option<i64>, index: Option<i64>) -> i64 {
    week.unwrap_or(0) * 100 + index.unwrap_or(0)
}

/// Routine ("day") ordering: `week * 100 + day`.
pub fn routine_sort_order(week: Option<i64>, day: Option<i64>) -> i64 {
    week.unwrap_or(0) * 100 + day.unwrap_or(0)
}

/// 1-based position of an exercise within its routine.
pub fn exercise_order(index: i64) -> i64 {
    index + 1
}

/// Program-wide ordering: `week * 10000 + day * 100 + exercise_order`.
pub fn global_sort_order(week: Option<i64>, day: Option<i64>, exercise_order: i64) -> i64 {
    week.unwrap_or(0) * 10_000 + day.unwrap_or(0) * 100 + exercise_order
}

/// Aggregate statistics over every set of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkoutTotals {
    pub volume: f64,
    pub sets: i64,
    pub reps: i64,
}

/// Recompute totals from the full child set.
///
/// Every set counts toward `sets`. Only sets carrying both weight and reps
/// contribute to `volume` and `reps`.
pub fn workout_totals(exercises: &[WorkoutExercise]) -> WorkoutTotals {
    let mut volume = 0.0;
    let mut sets = 0;
    let mut reps = 0;
    for set in exercises.iter().flat_map(|e| e.sets.iter()) {
        sets += 1;
        if let (Some(w), Some(r)) = (set.weight_kg, set.reps) {
            volume += w * r as f64;
            reps += r;
        }
    }
    WorkoutTotals {
        volume: round1(volume),
        sets,
        reps,
    }
}

/// Brzycki estimate, defined only for `0 < reps < 37`.
pub fn brzycki_one_rep_max(weight: f64, reps: i64) -> Option<f64> {
    if reps > 0 && reps < 37 {
        Some(weight * 36.0 / (37.0 - reps as f64))
    } else {
        None
    }
}
