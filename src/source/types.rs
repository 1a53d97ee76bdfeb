//! Typed payloads returned by the Hevy API.
//!
//! Every attribute the API may omit or send as `null` is an `Option` (or a
//! defaulted collection) so that shape problems surface once, at decode time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetType {
    Warmup,
    Failure,
    Dropset,
    #[default]
    #[serde(other)]
    Normal,
}

impl SetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetType::Warmup => "warmup",
            SetType::Normal => "normal",
            SetType::Failure => "failure",
            SetType::Dropset => "dropset",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "warmup" => SetType::Warmup,
            "failure" => SetType::Failure,
            "dropset" => SetType::Dropset,
            _ => SetType::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub exercises: Vec<WorkoutExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub title: String,
    pub notes: Option<String>,
    pub exercise_template_id: Option<String>,
    pub superset_id: Option<i64>,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    #[serde(default)]
    pub index: i64,
    #[serde(rename = "type", default)]
    pub set_type: SetType,
    pub weight_kg: Option<f64>,
    pub reps: Option<i64>,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub rpe: Option<f64>,
    pub custom_metric: Option<f64>,
}

/// One entry of the `/workouts/events` feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkoutEvent {
    Updated {
        workout: Workout,
    },
    Deleted {
        id: String,
        deleted_at: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTemplate {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub exercise_type: Option<String>,
    pub primary_muscle_group: Option<String>,
    #[serde(default)]
    pub secondary_muscle_groups: Vec<String>,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineFolder {
    pub id: i64,
    pub index: Option<i64>,
    #[serde(default)]
    pub title: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub folder_id: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub exercises: Vec<RoutineExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExercise {
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub title: String,
    pub rest_seconds: Option<i64>,
    pub notes: Option<String>,
    pub exercise_template_id: Option<String>,
    pub superset_id: Option<i64>,
    #[serde(default)]
    pub sets: Vec<RoutineSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineSet {
    #[serde(default)]
    pub index: i64,
    #[serde(rename = "type", default)]
    pub set_type: SetType,
    pub weight_kg: Option<f64>,
    pub reps: Option<i64>,
    pub rep_range: Option<RepRange>,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub custom_metric: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_workout_with_nulls() {
        let w: Workout = serde_json::from_value(json!({
            "id": "w1",
            "title": "Push",
            "description": null,
            "start_time": "2024-01-01T10:00:00Z",
            "end_time": null,
            "exercises": [{
                "index": 0,
                "title": "Bench Press (Barbell)",
                "notes": null,
                "exercise_template_id": "79D0BB3A",
                "superset_id": null,
                "sets": [
                    {"index": 0, "type": "warmup", "weight_kg": 60, "reps": 10},
                    {"index": 1, "type": "normal", "weight_kg": null, "reps": 8, "rpe": 8.5}
                ]
            }]
        }))
        .unwrap();

        assert_eq!(w.end_time, None);
        assert_eq!(w.exercises[0].sets[0].set_type, SetType::Warmup);
        assert_eq!(w.exercises[0].sets[1].weight_kg, None);
        assert_eq!(w.exercises[0].sets[1].rpe, Some(8.5));
    }

    #[test]
    fn test_unknown_set_type_is_normal() {
        let s: WorkoutSet =
            serde_json::from_value(json!({"index": 0, "type": "cluster", "reps": 3})).unwrap();
        assert_eq!(s.set_type, SetType::Normal);
    }

    #[test]
    fn test_event_variants() {
        let events: Vec<WorkoutEvent> = serde_json::from_value(json!([
            {"type": "updated", "workout": {"id": "w1", "title": "A"}},
            {"type": "deleted", "id": "w2", "deleted_at": "2024-01-02T00:00:00Z"},
            {"type": "archived", "id": "w3"}
        ]))
        .unwrap();

        assert!(matches!(&events[0], WorkoutEvent::Updated { workout } if workout.id == "w1"));
        assert!(matches!(&events[1], WorkoutEvent::Deleted { id, .. } if id == "w2"));
        assert_eq!(events[2], WorkoutEvent::Unknown);
    }

    #[test]
    fn test_set_type_round_trip_strings() {
        for t in [SetType::Warmup, SetType::Normal, SetType::Failure, SetType::Dropset] {
            assert_eq!(SetType::parse(t.as_str()), t);
        }
    }
}
