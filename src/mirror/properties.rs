//! Mapping of local rows onto Notion page properties, and the database
//! schemas those properties live in.

use serde_json::{json, Map, Value};

use crate::source::SetType;
use crate::storage::repository::{
    ExerciseProgress, ExerciseRow, FolderRow, RoutineExerciseRow, RoutineRow, RoutineSetRow,
    SetRow, WorkoutRow,
};
use crate::sync::derive;

/// Rich-text property holding each page's natural key.
pub const KEY_PROPERTY: &str = "Hevy ID";
const TITLE_PROPERTY: &str = "Name";
/// Notion rejects rich-text runs longer than this.
const MAX_TEXT_LEN: usize = 2000;

// ── Natural keys ───────────────────────────────────────────────────

pub fn child_key(parent: &str, index: i64) -> String {
    format!("{parent}:{index}")
}

pub fn grandchild_key(parent: &str, index: i64, child_index: i64) -> String {
    format!("{parent}:{index}:{child_index}")
}

// ── Property values ────────────────────────────────────────────────

pub fn title(text: &str) -> Value {
    json!({ "title": [{ "type": "text", "text": { "content": truncate(text) } }] })
}

pub fn rich_text(text: Option<&str>) -> Value {
    match text.filter(|t| !t.is_empty()) {
        Some(t) => json!({ "rich_text": [{ "type": "text", "text": { "content": truncate(t) } }] }),
        None => json!({ "rich_text": [] }),
    }
}

pub fn number(value: Option<f64>) -> Value {
    json!({ "number": value })
}

pub fn integer(value: Option<i64>) -> Value {
    json!({ "number": value })
}

pub fn date(iso: Option<&str>) -> Value {
    match iso {
        Some(start) => json!({ "date": { "start": start } }),
        None => json!({ "date": null }),
    }
}

pub fn select(name: Option<&str>) -> Value {
    match name {
        Some(n) => json!({ "select": { "name": n } }),
        None => json!({ "select": null }),
    }
}

pub fn relation(page_id: Option<&str>) -> Value {
    match page_id {
        Some(id) => json!({ "relation": [{ "id": id }] }),
        None => json!({ "relation": [] }),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

/// Read the natural key back out of a property map.
pub fn key_of(properties: &Value) -> Option<&str> {
    properties
        .get(KEY_PROPERTY)?
        .get("rich_text")?
        .get(0)?
        .get("text")?
        .get("content")?
        .as_str()
}

fn page(name: &str, key: &str, rest: Vec<(&str, Value)>) -> Value {
    let mut map = Map::new();
    map.insert(TITLE_PROPERTY.into(), title(name));
    map.insert(KEY_PROPERTY.into(), rich_text(Some(key)));
    for (k, v) in rest {
        map.insert(k.into(), v);
    }
    Value::Object(map)
}

// ── Workout tree ───────────────────────────────────────────────────

pub fn workout_properties(w: &WorkoutRow) -> Value {
    page(
        &w.title,
        &w.hevy_id,
        vec![
            ("Date", date(w.start_time.as_deref())),
            ("Description", rich_text(w.description.as_deref())),
            ("Duration (min)", integer(w.duration_minutes)),
            ("Total Volume (kg)", number(Some(w.total_volume))),
            ("Total Sets", integer(Some(w.total_sets))),
            ("Total Reps", integer(Some(w.total_reps))),
        ],
    )
}

pub fn exercise_key(e: &ExerciseRow) -> String {
    child_key(&e.workout_hevy_id, e.exercise_index)
}

pub fn exercise_properties(e: &ExerciseRow) -> Value {
    page(
        &e.title,
        &exercise_key(e),
        vec![
            ("Workout", relation(Some(&e.parent_page_id))),
            ("Order", integer(Some(derive::exercise_order(e.exercise_index)))),
            ("Notes", rich_text(e.notes.as_deref())),
            ("Template ID", rich_text(e.exercise_template_id.as_deref())),
            ("Superset", integer(e.superset_id)),
            ("Sets", integer(Some(e.set_count))),
        ],
    )
}

pub fn set_key(s: &SetRow) -> String {
    grandchild_key(&s.workout_hevy_id, s.exercise_index, s.set_index)
}

pub fn set_properties(s: &SetRow) -> Value {
    let volume = match (s.weight_kg, s.reps) {
        (Some(w), Some(r)) => Some(crate::date_util::round1(w * r as f64)),
        _ => None,
    };
    page(
        &format!("{} - Set {}", s.exercise_title, s.set_index + 1),
        &set_key(s),
        vec![
            ("Exercise", relation(Some(&s.parent_page_id))),
            ("Set Number", integer(Some(s.set_index + 1))),
            ("Type", select(Some(&s.set_type))),
            ("Weight (kg)", number(s.weight_kg)),
            ("Reps", integer(s.reps)),
            ("Volume (kg)", number(volume)),
            ("Distance (m)", number(s.distance_meters)),
            ("Duration (s)", number(s.duration_seconds)),
            ("RPE", number(s.rpe)),
        ],
    )
}

// ── Routine tree ───────────────────────────────────────────────────

pub fn folder_key(f: &FolderRow) -> String {
    f.hevy_id.to_string()
}

pub fn folder_properties(f: &FolderRow) -> Value {
    page(
        &f.title,
        &folder_key(f),
        vec![
            ("Week", integer(f.week_number)),
            ("Sort Order", integer(Some(f.sort_order))),
        ],
    )
}

pub fn routine_properties(r: &RoutineRow) -> Value {
    page(
        &r.title,
        &r.hevy_id,
        vec![
            ("Week Folder", relation(r.folder_page_id.as_deref())),
            ("Week", integer(r.week_number)),
            ("Day", integer(r.day_number)),
            ("Day Type", select(Some(&r.day_type))),
            ("Sort Order", integer(Some(r.sort_order))),
            ("Exercises", integer(Some(r.exercise_count))),
        ],
    )
}

pub fn routine_exercise_key(e: &RoutineExerciseRow) -> String {
    child_key(&e.routine_hevy_id, e.exercise_index)
}

pub fn routine_exercise_properties(e: &RoutineExerciseRow) -> Value {
    page(
        &e.title,
        &routine_exercise_key(e),
        vec![
            ("Routine", relation(Some(&e.parent_page_id))),
            ("Order", integer(Some(derive::exercise_order(e.exercise_index)))),
            ("Role", select(Some(&e.exercise_role))),
            ("Muscle Group", select(Some(&e.muscle_group))),
            ("Week", integer(e.week_number)),
            ("Day", integer(e.day_number)),
            ("Global Sort Order", integer(Some(e.global_sort_order))),
            ("Rest (s)", integer(e.rest_seconds)),
            ("Notes", rich_text(e.notes.as_deref())),
            ("Sets", integer(Some(e.set_count))),
        ],
    )
}

pub fn routine_set_key(s: &RoutineSetRow) -> String {
    grandchild_key(&s.routine_hevy_id, s.exercise_index, s.set_index)
}

pub fn routine_set_properties(s: &RoutineSetRow) -> Value {
    let rep_range = match (s.rep_range_start, s.rep_range_end) {
        (Some(a), Some(b)) => Some(format!("{a}-{b}")),
        (Some(a), None) => Some(format!("{a}+")),
        (None, Some(b)) => Some(format!("≤{b}")),
        (None, None) => None,
    };
    page(
        &format!("{} - Set {}", s.exercise_title, s.set_index + 1),
        &routine_set_key(s),
        vec![
            ("Routine Exercise", relation(Some(&s.parent_page_id))),
            ("Set Number", integer(Some(s.set_index + 1))),
            ("Type", select(Some(&s.set_type))),
            ("Target Weight (kg)", number(s.weight_kg)),
            ("Target Reps", integer(s.reps)),
            ("Rep Range", rich_text(rep_range.as_deref())),
            ("Distance (m)", number(s.distance_meters)),
            ("Duration (s)", number(s.duration_seconds)),
        ],
    )
}

// ── Progress ───────────────────────────────────────────────────────

pub fn progress_properties(p: &ExerciseProgress) -> Value {
    page(
        &p.exercise_title,
        &p.template_id,
        vec![
            ("Last Performed", date(p.last_performed_at.as_deref())),
            ("Last Weight (kg)", number(p.last_weight_kg)),
            ("Last Reps", integer(p.last_reps)),
            ("Max Weight (kg)", number(p.max_weight_kg)),
            ("Max Reps", integer(p.max_reps)),
            ("Max Session Volume (kg)", number(Some(p.max_session_volume))),
            ("Estimated 1RM (kg)", number(p.estimated_one_rep_max)),
            ("Suggested Weight (kg)", number(p.suggested_weight_kg)),
            ("Progression", rich_text(p.progression_note.as_deref())),
            ("Sessions", integer(Some(p.total_sessions))),
        ],
    )
}

// ── Database schemas ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Kind<'a> {
    RichText,
    Number,
    Date,
    Select(Vec<&'a str>),
    Relation(&'a str),
}

/// Build a `create database` property schema. The title and key columns
/// are always present.
pub fn schema(columns: &[(&str, Kind<'_>)]) -> Value {
    let mut map = Map::new();
    map.insert(TITLE_PROPERTY.into(), json!({ "title": {} }));
    map.insert(KEY_PROPERTY.into(), json!({ "rich_text": {} }));
    for (name, kind) in columns {
        let definition = match kind {
            Kind::RichText => json!({ "rich_text": {} }),
            Kind::Number => json!({ "number": { "format": "number" } }),
            Kind::Date => json!({ "date": {} }),
            Kind::Select(options) => {
                let options: Vec<Value> = options.iter().map(|o| json!({ "name": o })).collect();
                json!({ "select": { "options": options } })
            }
            Kind::Relation(database_id) => json!({
                "relation": { "database_id": database_id, "single_property": {} }
            }),
        };
        map.insert((*name).into(), definition);
    }
    Value::Object(map)
}

fn set_types() -> Vec<&'static str> {
    [SetType::Warmup, SetType::Normal, SetType::Failure, SetType::Dropset]
        .iter()
        .map(SetType::as_str)
        .collect()
}

fn labels(rules: &[derive::KeywordRule], default: &'static str) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for (_, label) in rules {
        if !out.contains(label) {
            out.push(*label);
        }
    }
    if !out.contains(&default) {
        out.push(default);
    }
    out
}

pub fn workouts_schema() -> Value {
    schema(&[
        ("Date", Kind::Date),
        ("Description", Kind::RichText),
        ("Duration (min)", Kind::Number),
        ("Total Volume (kg)", Kind::Number),
        ("Total Sets", Kind::Number),
        ("Total Reps", Kind::Number),
    ])
}

pub fn exercises_schema(workouts_db: &str) -> Value {
    schema(&[
        ("Workout", Kind::Relation(workouts_db)),
        ("Order", Kind::Number),
        ("Notes", Kind::RichText),
        ("Template ID", Kind::RichText),
        ("Superset", Kind::Number),
        ("Sets", Kind::Number),
    ])
}

pub fn sets_schema(exercises_db: &str) -> Value {
    schema(&[
        ("Exercise", Kind::Relation(exercises_db)),
        ("Set Number", Kind::Number),
        ("Type", Kind::Select(set_types())),
        ("Weight (kg)", Kind::Number),
        ("Reps", Kind::Number),
        ("Volume (kg)", Kind::Number),
        ("Distance (m)", Kind::Number),
        ("Duration (s)", Kind::Number),
        ("RPE", Kind::Number),
    ])
}

pub fn folders_schema() -> Value {
    schema(&[("Week", Kind::Number), ("Sort Order", Kind::Number)])
}

pub fn routines_schema(folders_db: &str) -> Value {
    schema(&[
        ("Week Folder", Kind::Relation(folders_db)),
        ("Week", Kind::Number),
        ("Day", Kind::Number),
        (
            "Day Type",
            Kind::Select(labels(derive::DAY_TYPE_RULES, derive::DEFAULT_DAY_TYPE)),
        ),
        ("Sort Order", Kind::Number),
        ("Exercises", Kind::Number),
    ])
}

pub fn routine_exercises_schema(routines_db: &str) -> Value {
    schema(&[
        ("Routine", Kind::Relation(routines_db)),
        ("Order", Kind::Number),
        (
            "Role",
            Kind::Select(vec![
                derive::ROLE_MAIN_LIFT,
                derive::ROLE_VARIATION,
                derive::ROLE_ACCESSORY,
            ]),
        ),
        (
            "Muscle Group",
            Kind::Select(labels(derive::MUSCLE_GROUP_RULES, derive::DEFAULT_MUSCLE_GROUP)),
        ),
        ("Week", Kind::Number),
        ("Day", Kind::Number),
        ("Global Sort Order", Kind::Number),
        ("Rest (s)", Kind::Number),
        ("Notes", Kind::RichText),
        ("Sets", Kind::Number),
    ])
}

pub fn routine_sets_schema(routine_exercises_db: &str) -> Value {
    schema(&[
        ("Routine Exercise", Kind::Relation(routine_exercises_db)),
        ("Set Number", Kind::Number),
        ("Type", Kind::Select(set_types())),
        ("Target Weight (kg)", Kind::Number),
        ("Target Reps", Kind::Number),
        ("Rep Range", Kind::RichText),
        ("Distance (m)", Kind::Number),
        ("Duration (s)", Kind::Number),
    ])
}

pub fn progress_schema() -> Value {
    schema(&[
        ("Last Performed", Kind::Date),
        ("Last Weight (kg)", Kind::Number),
        ("Last Reps", Kind::Number),
        ("Max Weight (kg)", Kind::Number),
        ("Max Reps", Kind::Number),
        ("Max Session Volume (kg)", Kind::Number),
        ("Estimated 1RM (kg)", Kind::Number),
        ("Suggested Weight (kg)", Kind::Number),
        ("Progression", Kind::RichText),
        ("Sessions", Kind::Number),
    ])
}
