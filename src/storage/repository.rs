use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::source::{
    ExerciseTemplate, Routine, RoutineExercise, RoutineFolder, Workout, WorkoutExercise,
};
use crate::sync::derive;

// ── Sync State ─────────────────────────────────────────────────────

/// The singleton cursor row. Only the reconciler writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub last_synced_at: Option<String>,
    pub last_event_timestamp: Option<String>,
    pub last_error: Option<String>,
    pub sync_in_progress: bool,
}

pub fn get_sync_state(conn: &Connection) -> Result<SyncState, rusqlite::Error> {
    conn.query_row(
        "SELECT last_synced_at, last_event_timestamp, last_error, sync_in_progress
         FROM sync_state WHERE id = 1",
        [],
        |row| {
            Ok(SyncState {
                last_synced_at: row.get(0)?,
                last_event_timestamp: row.get(1)?,
                last_error: row.get(2)?,
                sync_in_progress: row.get(3)?,
            })
        },
    )
    .optional()
    .map(Option::unwrap_or_default)
}

pub fn mark_sync_started(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO sync_state (id, sync_in_progress) VALUES (1, 1)
         ON CONFLICT(id) DO UPDATE SET sync_in_progress = 1",
        [],
    )?;
    Ok(())
}

/// Advance the cursor and clear any recorded error.
pub fn mark_sync_finished(
    conn: &Connection,
    cursor: &str,
    synced_at: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE sync_state SET
            last_event_timestamp = ?1, last_synced_at = ?2,
            last_error = NULL, sync_in_progress = 0
         WHERE id = 1",
        params![cursor, synced_at],
    )?;
    Ok(())
}

/// Record a fatal pass error. The cursor is left where it was.
pub fn mark_sync_failed(conn: &Connection, message: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE sync_state SET last_error = ?1, sync_in_progress = 0 WHERE id = 1",
        params![message],
    )?;
    Ok(())
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Workouts ───────────────────────────────────────────────────────

/// Upsert a workout by Hevy id and replace all of its exercises and sets.
///
/// Runs in one transaction: a failure leaves the previous children intact.
/// A tombstoned workout stays tombstoned. Returns the local row id.
pub fn upsert_workout(conn: &mut Connection, workout: &Workout) -> Result<i64, rusqlite::Error> {
    let tx = conn.transaction()?;
    let id = write_workout(&tx, workout)?;
    tx.commit()?;
    Ok(id)
}

fn write_workout(conn: &Connection, workout: &Workout) -> Result<i64, rusqlite::Error> {
    let totals = derive::workout_totals(&workout.exercises);
    let duration =
        crate::date_util::minutes_between(workout.start_time.as_deref(), workout.end_time.as_deref());

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM workouts WHERE hevy_id = ?1",
            params![workout.id],
            |row| row.get(0),
        )
        .optional()?;

    let id = match existing {
        Some(id) => {
            conn.execute(
                "UPDATE workouts SET
                    title = ?2, description = ?3, start_time = ?4, end_time = ?5,
                    duration_minutes = ?6, total_volume = ?7, total_sets = ?8, total_reps = ?9,
                    created_at = ?10, updated_at = ?11,
                    synced_to_notion = 0, cached_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id,
                    workout.title,
                    workout.description,
                    workout.start_time,
                    workout.end_time,
                    duration,
                    totals.volume,
                    totals.sets,
                    totals.reps,
                    workout.created_at,
                    workout.updated_at,
                ],
            )?;
            conn.execute(
                "DELETE FROM workout_sets WHERE exercise_id IN
                    (SELECT id FROM workout_exercises WHERE workout_id = ?1)",
                params![id],
            )?;
            conn.execute(
                "DELETE FROM workout_exercises WHERE workout_id = ?1",
                params![id],
            )?;
            id
        }
        None => {
            conn.execute(
                "INSERT INTO workouts (
                    hevy_id, title, description, start_time, end_time,
                    duration_minutes, total_volume, total_sets, total_reps,
                    created_at, updated_at, is_deleted, synced_to_notion, cached_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0, datetime('now'))",
                params![
                    workout.id,
                    workout.title,
                    workout.description,
                    workout.start_time,
                    workout.end_time,
                    duration,
                    totals.volume,
                    totals.sets,
                    totals.reps,
                    workout.created_at,
                    workout.updated_at,
                ],
            )?;
            conn.last_insert_rowid()
        }
    };

    insert_workout_children(conn, id, &workout.exercises)?;
    Ok(id)
}

fn insert_workout_children(
    conn: &Connection,
    workout_id: i64,
    exercises: &[WorkoutExercise],
) -> Result<(), rusqlite::Error> {
    let mut exercise_stmt = conn.prepare_cached(
        "INSERT INTO workout_exercises (
            workout_id, exercise_index, title, notes, exercise_template_id, superset_id,
            synced_to_notion
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
    )?;
    let mut set_stmt = conn.prepare_cached(
        "INSERT INTO workout_sets (
            exercise_id, set_index, set_type, weight_kg, reps, distance_meters,
            duration_seconds, rpe, custom_metric, synced_to_notion
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)",
    )?;

    for exercise in exercises {
        exercise_stmt.execute(params![
            workout_id,
            exercise.index,
            exercise.title,
            exercise.notes,
            exercise.exercise_template_id,
            exercise.superset_id,
        ])?;
        let exercise_id = conn.last_insert_rowid();
        for set in &exercise.sets {
            set_stmt.execute(params![
                exercise_id,
                set.index,
                set.set_type.as_str(),
                set.weight_kg,
                set.reps,
                set.distance_meters,
                set.duration_seconds,
                set.rpe,
                set.custom_metric,
            ])?;
        }
    }
    Ok(())
}

/// Tombstone a workout and flag it for mirror archival. Children are left
/// untouched. Returns false when no local row has this Hevy id.
pub fn mark_workout_deleted(
    conn: &Connection,
    hevy_id: &str,
    deleted_at: Option<&str>,
) -> Result<bool, rusqlite::Error> {
    let count = conn.execute(
        "UPDATE workouts SET
            is_deleted = 1, deleted_at = COALESCE(?2, datetime('now')),
            synced_to_notion = 0, cached_at = datetime('now')
         WHERE hevy_id = ?1",
        params![hevy_id, deleted_at],
    )?;
    Ok(count > 0)
}

// ── Exercise Templates ─────────────────────────────────────────────

pub fn upsert_exercise_template(
    conn: &Connection,
    template: &ExerciseTemplate,
) -> Result<(), rusqlite::Error> {
    let secondary = serde_json::to_string(&template.secondary_muscle_groups)
        .unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO exercise_templates (
            template_id, title, exercise_type, primary_muscle_group,
            secondary_muscle_groups, is_custom, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
        ON CONFLICT(template_id) DO UPDATE SET
            title=excluded.title, exercise_type=excluded.exercise_type,
            primary_muscle_group=excluded.primary_muscle_group,
            secondary_muscle_groups=excluded.secondary_muscle_groups,
            is_custom=excluded.is_custom, cached_at=excluded.cached_at",
        params![
            template.id,
            template.title,
            template.exercise_type,
            template.primary_muscle_group,
            secondary,
            template.is_custom as i32,
        ],
    )?;
    Ok(())
}

// ── Routine Folders ────────────────────────────────────────────────

/// Upsert a folder ("week") by Hevy id, recomputing its week number and
/// sort order from the title. Returns the local row id.
pub fn upsert_routine_folder(
    conn: &Connection,
    folder: &RoutineFolder,
) -> Result<i64, rusqlite::Error> {
    let week = derive::week_number(&folder.title);
    let sort_order = derive::folder_sort_order(week, folder.index);
    conn.query_row(
        "INSERT INTO routine_folders (
            hevy_id, folder_index, title, week_number, sort_order,
            created_at, updated_at, synced_to_notion, cached_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, datetime('now'))
        ON CONFLICT(hevy_id) DO UPDATE SET
            folder_index=excluded.folder_index, title=excluded.title,
            week_number=excluded.week_number, sort_order=excluded.sort_order,
            created_at=excluded.created_at, updated_at=excluded.updated_at,
            synced_to_notion=0, cached_at=excluded.cached_at
        RETURNING id",
        params![
            folder.id,
            folder.index,
            folder.title,
            week,
            sort_order,
            folder.created_at,
            folder.updated_at,
        ],
        |row| row.get(0),
    )
}

// ── Routines ───────────────────────────────────────────────────────

/// Upsert a routine ("day") by Hevy id and replace its exercises and sets.
///
/// The week number is inherited from the parent folder, which must be
/// upserted first for the inheritance to take effect.
pub fn upsert_routine(conn: &mut Connection, routine: &Routine) -> Result<i64, rusqlite::Error> {
    let tx = conn.transaction()?;
    let id = write_routine(&tx, routine)?;
    tx.commit()?;
    Ok(id)
}

fn write_routine(conn: &Connection, routine: &Routine) -> Result<i64, rusqlite::Error> {
    let week: Option<i64> = match routine.folder_id {
        Some(folder_id) => conn
            .query_row(
                "SELECT week_number FROM routine_folders WHERE hevy_id = ?1",
                params![folder_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten(),
        None => None,
    };
    let day = derive::day_number(&routine.title);
    let day_type = derive::day_type(&routine.title);
    let sort_order = derive::routine_sort_order(week, day);

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM routines WHERE hevy_id = ?1",
            params![routine.id],
            |row| row.get(0),
        )
        .optional()?;

    let id = match existing {
        Some(id) => {
            conn.execute(
                "UPDATE routines SET
                    folder_hevy_id = ?2, title = ?3, week_number = ?4, day_number = ?5,
                    day_type = ?6, sort_order = ?7, created_at = ?8, updated_at = ?9,
                    synced_to_notion = 0, cached_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id,
                    routine.folder_id,
                    routine.title,
                    week,
                    day,
                    day_type,
                    sort_order,
                    routine.created_at,
                    routine.updated_at,
                ],
            )?;
            conn.execute(
                "DELETE FROM routine_sets WHERE routine_exercise_id IN
                    (SELECT id FROM routine_exercises WHERE routine_id = ?1)",
                params![id],
            )?;
            conn.execute(
                "DELETE FROM routine_exercises WHERE routine_id = ?1",
                params![id],
            )?;
            id
        }
        None => {
            conn.execute(
                "INSERT INTO routines (
                    hevy_id, folder_hevy_id, title, week_number, day_number, day_type,
                    sort_order, created_at, updated_at, synced_to_notion, cached_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, datetime('now'))",
                params![
                    routine.id,
                    routine.folder_id,
                    routine.title,
                    week,
                    day,
                    day_type,
                    sort_order,
                    routine.created_at,
                    routine.updated_at,
                ],
            )?;
            conn.last_insert_rowid()
        }
    };

    insert_routine_children(conn, id, week, day, &routine.exercises)?;
    Ok(id)
}

fn insert_routine_children(
    conn: &Connection,
    routine_id: i64,
    week: Option<i64>,
    day: Option<i64>,
    exercises: &[RoutineExercise],
) -> Result<(), rusqlite::Error> {
    let mut exercise_stmt = conn.prepare_cached(
        "INSERT INTO routine_exercises (
            routine_id, exercise_index, title, notes, exercise_template_id, superset_id,
            rest_seconds, exercise_role, muscle_group, week_number, day_number,
            global_sort_order, synced_to_notion
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0)",
    )?;
    let mut set_stmt = conn.prepare_cached(
        "INSERT INTO routine_sets (
            routine_exercise_id, set_index, set_type, weight_kg, reps,
            rep_range_start, rep_range_end, distance_meters, duration_seconds,
            custom_metric, synced_to_notion
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
    )?;

    for exercise in exercises {
        let order = derive::exercise_order(exercise.index);
        exercise_stmt.execute(params![
            routine_id,
            exercise.index,
            exercise.title,
            exercise.notes,
            exercise.exercise_template_id,
            exercise.superset_id,
            exercise.rest_seconds,
            derive::exercise_role(exercise.index, &exercise.title),
            derive::muscle_group(&exercise.title),
            week,
            day,
            derive::global_sort_order(week, day, order),
        ])?;
        let exercise_id = conn.last_insert_rowid();
        for set in &exercise.sets {
            set_stmt.execute(params![
                exercise_id,
                set.index,
                set.set_type.as_str(),
                set.weight_kg,
                set.reps,
                set.rep_range.and_then(|r| r.start),
                set.rep_range.and_then(|r| r.end),
                set.distance_meters,
                set.duration_seconds,
                set.custom_metric,
            ])?;
        }
    }
    Ok(())
}

// ── Mirror reads ───────────────────────────────────────────────────

/// Tables that carry `notion_page_id` / `synced_to_notion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorTable {
    Workouts,
    WorkoutExercises,
    WorkoutSets,
    RoutineFolders,
    Routines,
    RoutineExercises,
    RoutineSets,
    ExerciseProgress,
}

impl MirrorTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            MirrorTable::Workouts => "workouts",
            MirrorTable::WorkoutExercises => "workout_exercises",
            MirrorTable::WorkoutSets => "workout_sets",
            MirrorTable::RoutineFolders => "routine_folders",
            MirrorTable::Routines => "routines",
            MirrorTable::RoutineExercises => "routine_exercises",
            MirrorTable::RoutineSets => "routine_sets",
            MirrorTable::ExerciseProgress => "exercise_progress",
        }
    }
}

/// Store the mirror page id and clear the needs-sync flag.
pub fn mark_synced(
    conn: &Connection,
    table: MirrorTable,
    rowid: i64,
    page_id: &str,
) -> Result<(), rusqlite::Error> {
    let sql = format!(
        "UPDATE {} SET notion_page_id = ?2, synced_to_notion = 1 WHERE rowid = ?1",
        table.table_name()
    );
    conn.execute(&sql, params![rowid, page_id])?;
    Ok(())
}

/// Clear the needs-sync flag without a page (tombstones never mirrored).
pub fn mark_synced_without_page(
    conn: &Connection,
    table: MirrorTable,
    rowid: i64,
) -> Result<(), rusqlite::Error> {
    let sql = format!(
        "UPDATE {} SET synced_to_notion = 1 WHERE rowid = ?1",
        table.table_name()
    );
    conn.execute(&sql, params![rowid])?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutRow {
    pub id: i64,
    pub hevy_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub total_volume: f64,
    pub total_sets: i64,
    pub total_reps: i64,
    pub is_deleted: bool,
    pub notion_page_id: Option<String>,
    pub synced_to_notion: bool,
}

const WORKOUT_COLUMNS: &str = "id, hevy_id, title, description, start_time, end_time,
    duration_minutes, total_volume, total_sets, total_reps, is_deleted,
    notion_page_id, synced_to_notion";

fn workout_from_row(row: &Row) -> Result<WorkoutRow, rusqlite::Error> {
    Ok(WorkoutRow {
        id: row.get(0)?,
        hevy_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        duration_minutes: row.get(6)?,
        total_volume: row.get(7)?,
        total_sets: row.get(8)?,
        total_reps: row.get(9)?,
        is_deleted: row.get(10)?,
        notion_page_id: row.get(11)?,
        synced_to_notion: row.get(12)?,
    })
}

pub fn get_workout(conn: &Connection, hevy_id: &str) -> Result<Option<WorkoutRow>, rusqlite::Error> {
    let sql = format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE hevy_id = ?1");
    conn.query_row(&sql, params![hevy_id], workout_from_row)
        .optional()
}

pub fn list_unsynced_workouts(conn: &Connection) -> Result<Vec<WorkoutRow>, rusqlite::Error> {
    let sql = format!(
        "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE synced_to_notion = 0
         ORDER BY start_time"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], workout_from_row)?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseRow {
    pub id: i64,
    pub workout_hevy_id: String,
    pub exercise_index: i64,
    pub title: String,
    pub notes: Option<String>,
    pub exercise_template_id: Option<String>,
    pub superset_id: Option<i64>,
    pub set_count: i64,
    pub parent_page_id: String,
    pub notion_page_id: Option<String>,
}

/// Unsynced exercises whose live parent workout already has a mirror page.
/// `workout_id` narrows the query to one workout.
pub fn list_unsynced_exercises(
    conn: &Connection,
    workout_id: Option<i64>,
) -> Result<Vec<ExerciseRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.id, w.hevy_id, e.exercise_index, e.title, e.notes,
                e.exercise_template_id, e.superset_id,
                (SELECT COUNT(*) FROM workout_sets s WHERE s.exercise_id = e.id),
                w.notion_page_id, e.notion_page_id
         FROM workout_exercises e
         JOIN workouts w ON w.id = e.workout_id
         WHERE e.synced_to_notion = 0 AND w.is_deleted = 0
           AND w.notion_page_id IS NOT NULL
           AND (?1 IS NULL OR w.id = ?1)
         ORDER BY w.start_time, e.exercise_index",
    )?;
    let rows = stmt.query_map(params![workout_id], |row| {
        Ok(ExerciseRow {
            id: row.get(0)?,
            workout_hevy_id: row.get(1)?,
            exercise_index: row.get(2)?,
            title: row.get(3)?,
            notes: row.get(4)?,
            exercise_template_id: row.get(5)?,
            superset_id: row.get(6)?,
            set_count: row.get(7)?,
            parent_page_id: row.get(8)?,
            notion_page_id: row.get(9)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetRow {
    pub id: i64,
    pub workout_hevy_id: String,
    pub exercise_index: i64,
    pub exercise_title: String,
    pub set_index: i64,
    pub set_type: String,
    pub weight_kg: Option<f64>,
    pub reps: Option<i64>,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub rpe: Option<f64>,
    pub custom_metric: Option<f64>,
    pub parent_page_id: String,
    pub notion_page_id: Option<String>,
}

/// Unsynced sets whose parent exercise already has a mirror page.
pub fn list_unsynced_sets(
    conn: &Connection,
    workout_id: Option<i64>,
) -> Result<Vec<SetRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT s.id, w.hevy_id, e.exercise_index, e.title, s.set_index, s.set_type,
                s.weight_kg, s.reps, s.distance_meters, s.duration_seconds, s.rpe,
                s.custom_metric, e.notion_page_id, s.notion_page_id
         FROM workout_sets s
         JOIN workout_exercises e ON e.id = s.exercise_id
         JOIN workouts w ON w.id = e.workout_id
         WHERE s.synced_to_notion = 0 AND w.is_deleted = 0
           AND e.notion_page_id IS NOT NULL
           AND (?1 IS NULL OR w.id = ?1)
         ORDER BY w.start_time, e.exercise_index, s.set_index",
    )?;
    let rows = stmt.query_map(params![workout_id], |row| {
        Ok(SetRow {
            id: row.get(0)?,
            workout_hevy_id: row.get(1)?,
            exercise_index: row.get(2)?,
            exercise_title: row.get(3)?,
            set_index: row.get(4)?,
            set_type: row.get(5)?,
            weight_kg: row.get(6)?,
            reps: row.get(7)?,
            distance_meters: row.get(8)?,
            duration_seconds: row.get(9)?,
            rpe: row.get(10)?,
            custom_metric: row.get(11)?,
            parent_page_id: row.get(12)?,
            notion_page_id: row.get(13)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderRow {
    pub id: i64,
    pub hevy_id: i64,
    pub title: String,
    pub folder_index: Option<i64>,
    pub week_number: Option<i64>,
    pub sort_order: i64,
    pub notion_page_id: Option<String>,
}

pub fn list_unsynced_folders(conn: &Connection) -> Result<Vec<FolderRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, hevy_id, title, folder_index, week_number, sort_order, notion_page_id
         FROM routine_folders WHERE synced_to_notion = 0 ORDER BY sort_order",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FolderRow {
            id: row.get(0)?,
            hevy_id: row.get(1)?,
            title: row.get(2)?,
            folder_index: row.get(3)?,
            week_number: row.get(4)?,
            sort_order: row.get(5)?,
            notion_page_id: row.get(6)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineRow {
    pub id: i64,
    pub hevy_id: String,
    pub title: String,
    pub week_number: Option<i64>,
    pub day_number: Option<i64>,
    pub day_type: String,
    pub sort_order: i64,
    pub exercise_count: i64,
    /// Page of the parent folder, when the routine has a mirrored folder.
    pub folder_page_id: Option<String>,
    pub notion_page_id: Option<String>,
}

/// Unsynced routines. Routines in a folder wait until the folder is mirrored
/// so the relation can be set; routines without a folder go straight through.
pub fn list_unsynced_routines(conn: &Connection) -> Result<Vec<RoutineRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.hevy_id, r.title, r.week_number, r.day_number, r.day_type,
                r.sort_order,
                (SELECT COUNT(*) FROM routine_exercises e WHERE e.routine_id = r.id),
                f.notion_page_id, r.notion_page_id
         FROM routines r
         LEFT JOIN routine_folders f ON f.hevy_id = r.folder_hevy_id
         WHERE r.synced_to_notion = 0
           AND (r.folder_hevy_id IS NULL OR f.id IS NULL OR f.notion_page_id IS NOT NULL)
         ORDER BY r.sort_order",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RoutineRow {
            id: row.get(0)?,
            hevy_id: row.get(1)?,
            title: row.get(2)?,
            week_number: row.get(3)?,
            day_number: row.get(4)?,
            day_type: row.get(5)?,
            sort_order: row.get(6)?,
            exercise_count: row.get(7)?,
            folder_page_id: row.get(8)?,
            notion_page_id: row.get(9)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineExerciseRow {
    pub id: i64,
    pub routine_hevy_id: String,
    pub exercise_index: i64,
    pub title: String,
    pub notes: Option<String>,
    pub rest_seconds: Option<i64>,
    pub exercise_role: String,
    pub muscle_group: String,
    pub week_number: Option<i64>,
    pub day_number: Option<i64>,
    pub global_sort_order: i64,
    pub set_count: i64,
    pub parent_page_id: String,
    pub notion_page_id: Option<String>,
}

pub fn list_unsynced_routine_exercises(
    conn: &Connection,
) -> Result<Vec<RoutineExerciseRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.id, r.hevy_id, e.exercise_index, e.title, e.notes, e.rest_seconds,
                e.exercise_role, e.muscle_group, e.week_number, e.day_number,
                e.global_sort_order,
                (SELECT COUNT(*) FROM routine_sets s WHERE s.routine_exercise_id = e.id),
                r.notion_page_id, e.notion_page_id
         FROM routine_exercises e
         JOIN routines r ON r.id = e.routine_id
         WHERE e.synced_to_notion = 0 AND r.notion_page_id IS NOT NULL
         ORDER BY e.global_sort_order",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RoutineExerciseRow {
            id: row.get(0)?,
            routine_hevy_id: row.get(1)?,
            exercise_index: row.get(2)?,
            title: row.get(3)?,
            notes: row.get(4)?,
            rest_seconds: row.get(5)?,
            exercise_role: row.get(6)?,
            muscle_group: row.get(7)?,
            week_number: row.get(8)?,
            day_number: row.get(9)?,
            global_sort_order: row.get(10)?,
            set_count: row.get(11)?,
            parent_page_id: row.get(12)?,
            notion_page_id: row.get(13)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineSetRow {
    pub id: i64,
    pub routine_hevy_id: String,
    pub exercise_index: i64,
    pub exercise_title: String,
    pub set_index: i64,
    pub set_type: String,
    pub weight_kg: Option<f64>,
    pub reps: Option<i64>,
    pub rep_range_start: Option<i64>,
    pub rep_range_end: Option<i64>,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub parent_page_id: String,
    pub notion_page_id: Option<String>,
}

pub fn list_unsynced_routine_sets(
    conn: &Connection,
) -> Result<Vec<RoutineSetRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT s.id, r.hevy_id, e.exercise_index, e.title, s.set_index, s.set_type,
                s.weight_kg, s.reps, s.rep_range_start, s.rep_range_end,
                s.distance_meters, s.duration_seconds, e.notion_page_id, s.notion_page_id
         FROM routine_sets s
         JOIN routine_exercises e ON e.id = s.routine_exercise_id
         JOIN routines r ON r.id = e.routine_id
         WHERE s.synced_to_notion = 0 AND e.notion_page_id IS NOT NULL
         ORDER BY e.global_sort_order, s.set_index",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RoutineSetRow {
            id: row.get(0)?,
            routine_hevy_id: row.get(1)?,
            exercise_index: row.get(2)?,
            exercise_title: row.get(3)?,
            set_index: row.get(4)?,
            set_type: row.get(5)?,
            weight_kg: row.get(6)?,
            reps: row.get(7)?,
            rep_range_start: row.get(8)?,
            rep_range_end: row.get(9)?,
            distance_meters: row.get(10)?,
            duration_seconds: row.get(11)?,
            parent_page_id: row.get(12)?,
            notion_page_id: row.get(13)?,
        })
    })?;
    rows.collect()
}

// ── Exercise Progress ──────────────────────────────────────────────

/// One exercise occurrence in a live workout, used to build progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseHistoryRow {
    pub exercise_id: i64,
    pub template_id: String,
    pub title: String,
    pub workout_start_time: Option<String>,
}

pub fn list_exercise_history(
    conn: &Connection,
) -> Result<Vec<ExerciseHistoryRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.exercise_template_id, COALESCE(t.title, e.title), w.start_time
         FROM workout_exercises e
         JOIN workouts w ON w.id = e.workout_id
         LEFT JOIN exercise_templates t ON t.template_id = e.exercise_template_id
         WHERE e.exercise_template_id IS NOT NULL AND w.is_deleted = 0
         ORDER BY e.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ExerciseHistoryRow {
            exercise_id: row.get(0)?,
            template_id: row.get(1)?,
            title: row.get(2)?,
            workout_start_time: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// A performed set, in set order.
#[derive(Debug, Clone, PartialEq)]
pub struct SetSample {
    pub set_type: String,
    pub weight_kg: Option<f64>,
    pub reps: Option<i64>,
}

pub fn list_exercise_sets(
    conn: &Connection,
    exercise_id: i64,
) -> Result<Vec<SetSample>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT set_type, weight_kg, reps FROM workout_sets
         WHERE exercise_id = ?1 ORDER BY set_index",
    )?;
    let rows = stmt.query_map(params![exercise_id], |row| {
        Ok(SetSample {
            set_type: row.get(0)?,
            weight_kg: row.get(1)?,
            reps: row.get(2)?,
        })
    })?;
    rows.collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExerciseProgress {
    pub template_id: String,
    pub exercise_title: String,
    pub last_performed_at: Option<String>,
    pub last_weight_kg: Option<f64>,
    pub last_reps: Option<i64>,
    pub max_weight_kg: Option<f64>,
    pub max_reps: Option<i64>,
    pub max_session_volume: f64,
    pub estimated_one_rep_max: Option<f64>,
    pub suggested_weight_kg: Option<f64>,
    pub progression_note: Option<String>,
    pub total_sessions: i64,
}

pub fn upsert_exercise_progress(
    conn: &Connection,
    progress: &ExerciseProgress,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO exercise_progress (
            template_id, exercise_title, last_performed_at, last_weight_kg, last_reps,
            max_weight_kg, max_reps, max_session_volume, estimated_one_rep_max,
            suggested_weight_kg, progression_note, total_sessions, synced_to_notion,
            computed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, datetime('now'))
        ON CONFLICT(template_id) DO UPDATE SET
            exercise_title=excluded.exercise_title,
            last_performed_at=excluded.last_performed_at,
            last_weight_kg=excluded.last_weight_kg, last_reps=excluded.last_reps,
            max_weight_kg=excluded.max_weight_kg, max_reps=excluded.max_reps,
            max_session_volume=excluded.max_session_volume,
            estimated_one_rep_max=excluded.estimated_one_rep_max,
            suggested_weight_kg=excluded.suggested_weight_kg,
            progression_note=excluded.progression_note,
            total_sessions=excluded.total_sessions,
            synced_to_notion=0, computed_at=excluded.computed_at",
        params![
            progress.template_id,
            progress.exercise_title,
            progress.last_performed_at,
            progress.last_weight_kg,
            progress.last_reps,
            progress.max_weight_kg,
            progress.max_reps,
            progress.max_session_volume,
            progress.estimated_one_rep_max,
            progress.suggested_weight_kg,
            progress.progression_note,
            progress.total_sessions,
        ],
    )?;
    Ok(())
}

fn progress_from_row(row: &Row) -> Result<ExerciseProgress, rusqlite::Error> {
    Ok(ExerciseProgress {
        template_id: row.get(0)?,
        exercise_title: row.get(1)?,
        last_performed_at: row.get(2)?,
        last_weight_kg: row.get(3)?,
        last_reps: row.get(4)?,
        max_weight_kg: row.get(5)?,
        max_reps: row.get(6)?,
        max_session_volume: row.get(7)?,
        estimated_one_rep_max: row.get(8)?,
        suggested_weight_kg: row.get(9)?,
        progression_note: row.get(10)?,
        total_sessions: row.get(11)?,
    })
}

const PROGRESS_COLUMNS: &str = "template_id, exercise_title, last_performed_at,
    last_weight_kg, last_reps, max_weight_kg, max_reps, max_session_volume,
    estimated_one_rep_max, suggested_weight_kg, progression_note, total_sessions";

pub fn get_exercise_progress(
    conn: &Connection,
    template_id: &str,
) -> Result<Option<ExerciseProgress>, rusqlite::Error> {
    let sql = format!("SELECT {PROGRESS_COLUMNS} FROM exercise_progress WHERE template_id = ?1");
    conn.query_row(&sql, params![template_id], progress_from_row)
        .optional()
}

/// Unsynced progress rows with their rowid and existing page.
pub fn list_unsynced_progress(
    conn: &Connection,
) -> Result<Vec<(i64, ExerciseProgress, Option<String>)>, rusqlite::Error> {
    let sql = format!(
        "SELECT {PROGRESS_COLUMNS}, rowid, notion_page_id FROM exercise_progress
         WHERE synced_to_notion = 0 ORDER BY exercise_title"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get(12)?, progress_from_row(row)?, row.get(13)?))
    })?;
    rows.collect()
}

// ── Status ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCounts {
    pub workouts: i64,
    pub deleted_workouts: i64,
    pub unsynced_workouts: i64,
    pub exercises: i64,
    pub sets: i64,
    pub exercise_templates: i64,
    pub routine_folders: i64,
    pub routines: i64,
    pub routine_exercises: i64,
    pub routine_sets: i64,
    pub exercise_progress: i64,
}

pub fn record_counts(conn: &Connection) -> Result<RecordCounts, rusqlite::Error> {
    let count = |sql: &str| conn.query_row(sql, [], |row| row.get::<_, i64>(0));
    Ok(RecordCounts {
        workouts: count("SELECT COUNT(*) FROM workouts")?,
        deleted_workouts: count("SELECT COUNT(*) FROM workouts WHERE is_deleted = 1")?,
        unsynced_workouts: count("SELECT COUNT(*) FROM workouts WHERE synced_to_notion = 0")?,
        exercises: count("SELECT COUNT(*) FROM workout_exercises")?,
        sets: count("SELECT COUNT(*) FROM workout_sets")?,
        exercise_templates: count("SELECT COUNT(*) FROM exercise_templates")?,
        routine_folders: count("SELECT COUNT(*) FROM routine_folders")?,
        routines: count("SELECT COUNT(*) FROM routines")?,
        routine_exercises: count("SELECT COUNT(*) FROM routine_exercises")?,
        routine_sets: count("SELECT COUNT(*) FROM routine_sets")?,
        exercise_progress: count("SELECT COUNT(*) FROM exercise_progress")?,
    })
}
