use serde_json::Value;

use super::batch::{
    run_batches, BatchPlan, EXERCISE_BATCH, FOLDER_BATCH, PROGRESS_BATCH, ROUTINE_BATCH,
    SET_BATCH, WORKOUT_BATCH,
};
use super::properties as props;
use super::{MirrorApi, MirrorDatabases, MirrorReport, RoutineTree, WorkoutTree};
use crate::error::{Error, Result};
use crate::storage::repository::{self, MirrorTable};
use crate::storage::Database;

#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// One record at a time with a fixed pause, for stricter rate limits.
    pub sequential: bool,
}

/// One local row bound for the mirror.
#[derive(Debug, Clone)]
struct PushItem {
    table: MirrorTable,
    rowid: i64,
    key: String,
    database_id: String,
    properties: Value,
    page_id: Option<String>,
    archive: bool,
}

/// Push every unsynced record, parents before children.
///
/// The workout tree is required. The routine tree and progress database are
/// pushed when their ids are configured. Per-record failures are counted in
/// the report; a rate limit aborts the pass with `Error::RateLimited`.
pub async fn push_unsynced(
    db: &Database,
    mirror: &dyn MirrorApi,
    databases: &MirrorDatabases,
    options: PushOptions,
) -> Result<MirrorReport> {
    let tree = databases.workout_tree()?;
    let mut report = MirrorReport::default();

    push_workout_tree(db, mirror, &tree, options, None, &mut report).await?;
    if let Some(routines) = databases.routine_tree() {
        push_routine_tree(db, mirror, &routines, options, &mut report).await?;
    }
    if let Some(progress_db) = &databases.progress {
        push_progress(db, mirror, progress_db, options, &mut report).await?;
    }

    log::info!(
        "Mirror push: {} synced, {} errors, {} total",
        report.synced,
        report.errors,
        report.total
    );
    Ok(report)
}

/// Push one workout (by Hevy id) and its unsynced children, sequentially.
/// The workout page is written even when it is already marked synced.
pub async fn push_workout(
    db: &Database,
    mirror: &dyn MirrorApi,
    databases: &MirrorDatabases,
    hevy_id: &str,
) -> Result<MirrorReport> {
    let tree = databases.workout_tree()?;
    let row = db
        .reader()
        .call({
            let hevy_id = hevy_id.to_string();
            move |conn| repository::get_workout(conn, &hevy_id)
        })
        .await?
        .ok_or_else(|| Error::NotFound(format!("workout {hevy_id}")))?;

    let mut report = MirrorReport::default();
    push_workout_tree(
        db,
        mirror,
        &tree,
        PushOptions { sequential: true },
        Some(row),
        &mut report,
    )
    .await?;
    Ok(report)
}

/// Create every mirror database under `parent_page_id`, wire the relations
/// and store the ids in `app_config`.
pub async fn setup_databases(
    db: &Database,
    mirror: &dyn MirrorApi,
    parent_page_id: &str,
) -> Result<MirrorDatabases> {
    let workouts = mirror
        .create_database(parent_page_id, "Workouts", props::workouts_schema())
        .await?;
    let exercises = mirror
        .create_database(parent_page_id, "Exercises", props::exercises_schema(&workouts))
        .await?;
    let sets = mirror
        .create_database(parent_page_id, "Sets", props::sets_schema(&exercises))
        .await?;
    let folders = mirror
        .create_database(parent_page_id, "Program Weeks", props::folders_schema())
        .await?;
    let routines = mirror
        .create_database(parent_page_id, "Program Days", props::routines_schema(&folders))
        .await?;
    let routine_exercises = mirror
        .create_database(
            parent_page_id,
            "Program Exercises",
            props::routine_exercises_schema(&routines),
        )
        .await?;
    let routine_sets = mirror
        .create_database(
            parent_page_id,
            "Program Sets",
            props::routine_sets_schema(&routine_exercises),
        )
        .await?;
    let progress = mirror
        .create_database(parent_page_id, "Exercise Progress", props::progress_schema())
        .await?;

    let databases = MirrorDatabases {
        workouts: Some(workouts),
        exercises: Some(exercises),
        sets: Some(sets),
        routine_folders: Some(folders),
        routines: Some(routines),
        routine_exercises: Some(routine_exercises),
        routine_sets: Some(routine_sets),
        progress: Some(progress),
    };
    db.writer()
        .call({
            let databases = databases.clone();
            move |conn| databases.save(conn)
        })
        .await?;
    log::info!("Created mirror databases under {parent_page_id}");
    Ok(databases)
}

// ── Levels ─────────────────────────────────────────────────────────

async fn push_workout_tree(
    db: &Database,
    mirror: &dyn MirrorApi,
    tree: &WorkoutTree,
    options: PushOptions,
    only: Option<repository::WorkoutRow>,
    report: &mut MirrorReport,
) -> Result<()> {
    let only_id = only.as_ref().map(|w| w.id);
    let workouts = match only {
        Some(row) => vec![row],
        None => {
            db.reader()
                .call(|conn| repository::list_unsynced_workouts(conn))
                .await?
        }
    };
    let items = workouts
        .into_iter()
        .map(|w| PushItem {
            table: MirrorTable::Workouts,
            rowid: w.id,
            properties: props::workout_properties(&w),
            key: w.hevy_id,
            database_id: tree.workouts.clone(),
            page_id: w.notion_page_id,
            archive: w.is_deleted,
        })
        .collect();
    push_level(db, mirror, items, plan(options, WORKOUT_BATCH), report).await?;

    let exercises = db
        .reader()
        .call(move |conn| repository::list_unsynced_exercises(conn, only_id))
        .await?;
    let items = exercises
        .into_iter()
        .map(|e| PushItem {
            table: MirrorTable::WorkoutExercises,
            rowid: e.id,
            key: props::exercise_key(&e),
            properties: props::exercise_properties(&e),
            database_id: tree.exercises.clone(),
            page_id: e.notion_page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, EXERCISE_BATCH), report).await?;

    let sets = db
        .reader()
        .call(move |conn| repository::list_unsynced_sets(conn, only_id))
        .await?;
    let items = sets
        .into_iter()
        .map(|s| PushItem {
            table: MirrorTable::WorkoutSets,
            rowid: s.id,
            key: props::set_key(&s),
            properties: props::set_properties(&s),
            database_id: tree.sets.clone(),
            page_id: s.notion_page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, SET_BATCH), report).await
}

async fn push_routine_tree(
    db: &Database,
    mirror: &dyn MirrorApi,
    tree: &RoutineTree,
    options: PushOptions,
    report: &mut MirrorReport,
) -> Result<()> {
    let folders = db
        .reader()
        .call(|conn| repository::list_unsynced_folders(conn))
        .await?;
    let items = folders
        .into_iter()
        .map(|f| PushItem {
            table: MirrorTable::RoutineFolders,
            rowid: f.id,
            key: props::folder_key(&f),
            properties: props::folder_properties(&f),
            database_id: tree.folders.clone(),
            page_id: f.notion_page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, FOLDER_BATCH), report).await?;

    let routines = db
        .reader()
        .call(|conn| repository::list_unsynced_routines(conn))
        .await?;
    let items = routines
        .into_iter()
        .map(|r| PushItem {
            table: MirrorTable::Routines,
            rowid: r.id,
            properties: props::routine_properties(&r),
            key: r.hevy_id,
            database_id: tree.routines.clone(),
            page_id: r.notion_page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, ROUTINE_BATCH), report).await?;

    let exercises = db
        .reader()
        .call(|conn| repository::list_unsynced_routine_exercises(conn))
        .await?;
    let items = exercises
        .into_iter()
        .map(|e| PushItem {
            table: MirrorTable::RoutineExercises,
            rowid: e.id,
            key: props::routine_exercise_key(&e),
            properties: props::routine_exercise_properties(&e),
            database_id: tree.exercises.clone(),
            page_id: e.notion_page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, EXERCISE_BATCH), report).await?;

    let sets = db
        .reader()
        .call(|conn| repository::list_unsynced_routine_sets(conn))
        .await?;
    let items = sets
        .into_iter()
        .map(|s| PushItem {
            table: MirrorTable::RoutineSets,
            rowid: s.id,
            key: props::routine_set_key(&s),
            properties: props::routine_set_properties(&s),
            database_id: tree.sets.clone(),
            page_id: s.notion_page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, SET_BATCH), report).await
}

async fn push_progress(
    db: &Database,
    mirror: &dyn MirrorApi,
    database_id: &str,
    options: PushOptions,
    report: &mut MirrorReport,
) -> Result<()> {
    let rows = db
        .reader()
        .call(|conn| repository::list_unsynced_progress(conn))
        .await?;
    let items = rows
        .into_iter()
        .map(|(rowid, p, page_id)| PushItem {
            table: MirrorTable::ExerciseProgress,
            rowid,
            properties: props::progress_properties(&p),
            key: p.template_id,
            database_id: database_id.to_string(),
            page_id,
            archive: false,
        })
        .collect();
    push_level(db, mirror, items, plan(options, PROGRESS_BATCH), report).await
}

fn plan(options: PushOptions, size: usize) -> BatchPlan {
    BatchPlan::for_mode(options.sequential, size)
}

async fn push_level(
    db: &Database,
    mirror: &dyn MirrorApi,
    items: Vec<PushItem>,
    plan: BatchPlan,
    report: &mut MirrorReport,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let total = items.len() as u64;
    let outcome = run_batches(items, &plan, |item| push_logged(db, mirror, item)).await;
    *report += MirrorReport {
        synced: outcome.succeeded.len() as u64,
        errors: outcome.failed.len() as u64,
        total,
    };
    if outcome.halted {
        log::warn!(
            "Mirror rate limited; stopping pass after {} synced, {} errors",
            report.synced,
            report.errors
        );
        return Err(Error::RateLimited { service: "Notion" });
    }
    Ok(())
}

async fn push_logged(db: &Database, mirror: &dyn MirrorApi, item: PushItem) -> Result<()> {
    let table = item.table;
    let key = item.key.clone();
    push_one(db, mirror, item).await.inspect_err(|e| {
        log::warn!("Mirror push of {} {key} failed: {e}", table.table_name());
    })
}

/// Create-or-adopt a single page, then record its id locally.
///
/// A row without a stored page id is first looked up by natural key so a
/// page left behind by an interrupted pass is patched rather than duplicated.
/// Tombstones archive their page (if one exists) and are never recreated.
async fn push_one(db: &Database, mirror: &dyn MirrorApi, item: PushItem) -> Result<()> {
    let existing = match item.page_id {
        Some(id) => Some(id),
        None => mirror.find_page_by_key(&item.database_id, &item.key).await?,
    };

    let page_id = if item.archive {
        if let Some(id) = &existing {
            mirror.archive_page(id).await?;
        }
        existing
    } else {
        let id = match existing {
            Some(id) => {
                mirror.update_page(&id, item.properties).await?;
                id
            }
            None => {
                mirror
                    .create_page(&item.database_id, item.properties)
                    .await?
            }
        };
        Some(id)
    };

    log::debug!("Mirrored {} {}", item.table.table_name(), item.key);
    let (table, rowid) = (item.table, item.rowid);
    db.writer()
        .call(move |conn| match page_id {
            Some(id) => repository::mark_synced(conn, table, rowid, &id),
            None => repository::mark_synced_without_page(conn, table, rowid),
        })
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mirror::properties::key_of;
    use crate::source::{Routine, RoutineFolder, Workout};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub(crate) struct FakePage {
        pub id: String,
        pub database_id: String,
        pub key: String,
        pub properties: Value,
        pub archived: bool,
    }

    /// In-memory mirror recording every call.
    #[derive(Default)]
    pub(crate) struct FakeMirror {
        pub pages: Mutex<Vec<FakePage>>,
        pub calls: Mutex<Vec<String>>,
        pub fail_keys: Vec<String>,
        pub rate_limit_keys: Vec<String>,
    }

    impl FakeMirror {
        pub(crate) fn seed(&self, database_id: &str, key: &str, id: &str) {
            self.pages.lock().unwrap().push(FakePage {
                id: id.into(),
                database_id: database_id.into(),
                key: key.into(),
                properties: json!({}),
                archived: false,
            });
        }

        pub(crate) fn calls_starting_with(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }

        fn live_pages(&self) -> usize {
            self.pages.lock().unwrap().iter().filter(|p| !p.archived).count()
        }

        fn check(&self, key: &str) -> Result<()> {
            if self.rate_limit_keys.iter().any(|k| k == key) {
                return Err(Error::RateLimited { service: "Notion" });
            }
            if self.fail_keys.iter().any(|k| k == key) {
                return Err(Error::Api {
                    service: "Notion",
                    status: 400,
                    message: "validation_error".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MirrorApi for FakeMirror {
        async fn find_page_by_key(&self, database_id: &str, key: &str) -> Result<Option<String>> {
            self.calls.lock().unwrap().push(format!("find:{key}"));
            Ok(self
                .pages
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.database_id == database_id && p.key == key && !p.archived)
                .map(|p| p.id.clone()))
        }

        async fn create_page(&self, database_id: &str, properties: Value) -> Result<String> {
            let key = key_of(&properties).unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(format!("create:{key}"));
            self.check(&key)?;
            let mut pages = self.pages.lock().unwrap();
            let id = format!("page-{}", pages.len() + 1);
            pages.push(FakePage {
                id: id.clone(),
                database_id: database_id.into(),
                key,
                properties,
                archived: false,
            });
            Ok(id)
        }

        async fn update_page(&self, page_id: &str, properties: Value) -> Result<()> {
            let key = key_of(&properties).unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(format!("update:{page_id}"));
            self.check(&key)?;
            if let Some(p) = self.pages.lock().unwrap().iter_mut().find(|p| p.id == page_id) {
                p.properties = properties;
            }
            Ok(())
        }

        async fn archive_page(&self, page_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("archive:{page_id}"));
            if let Some(p) = self.pages.lock().unwrap().iter_mut().find(|p| p.id == page_id) {
                p.archived = true;
            }
            Ok(())
        }

        async fn create_database(
            &self,
            _parent_page_id: &str,
            title: &str,
            properties: Value,
        ) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("database:{title}:{properties}"));
            Ok(format!("db-{}", title.to_lowercase().replace(' ', "-")))
        }
    }

    pub(crate) fn databases() -> MirrorDatabases {
        MirrorDatabases {
            workouts: Some("db-w".into()),
            exercises: Some("db-e".into()),
            sets: Some("db-s".into()),
            ..Default::default()
        }
    }

    fn workout(id: &str) -> Workout {
        serde_json::from_value(json!({
            "id": id,
            "title": "Push",
            "start_time": "2024-01-01T10:00:00Z",
            "end_time": "2024-01-01T11:00:00Z",
            "exercises": [{
                "index": 0,
                "title": "Bench Press (Barbell)",
                "exercise_template_id": "T-BENCH",
                "sets": [
                    {"index": 0, "type": "warmup", "weight_kg": 60, "reps": 10},
                    {"index": 1, "type": "normal", "weight_kg": 100, "reps": 5}
                ]
            }]
        }))
        .unwrap()
    }

    async fn store(db: &Database, w: Workout) {
        db.writer()
            .call(move |conn| repository::upsert_workout(conn, &w))
            .await
            .unwrap();
    }

    async fn workout_row(db: &Database, id: &str) -> repository::WorkoutRow {
        let id = id.to_string();
        db.reader()
            .call(move |conn| repository::get_workout(conn, &id))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_creates_parents_before_children() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        let mirror = FakeMirror::default();

        let report = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();
        assert_eq!(
            report,
            MirrorReport {
                synced: 4,
                errors: 0,
                total: 4
            }
        );

        let pages = mirror.pages.lock().unwrap().clone();
        let keys: Vec<&str> = pages.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["w-1", "w-1:0", "w-1:0:0", "w-1:0:1"]);
        // Children relate to the page created for their parent.
        assert_eq!(pages[1].properties["Workout"]["relation"][0]["id"], "page-1");
        assert_eq!(pages[2].properties["Exercise"]["relation"][0]["id"], "page-2");

        let row = workout_row(&db, "w-1").await;
        assert_eq!(row.notion_page_id.as_deref(), Some("page-1"));
        assert!(row.synced_to_notion);

        let again = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();
        assert_eq!(again.total, 0);
    }

    #[tokio::test]
    async fn test_push_adopts_existing_page() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        let mirror = FakeMirror::default();
        mirror.seed("db-w", "w-1", "page-left-behind");

        push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();

        assert_eq!(mirror.calls_starting_with("create:w-1:"), 3);
        assert_eq!(
            mirror.calls.lock().unwrap().iter().filter(|c| *c == "create:w-1").count(),
            0
        );
        assert_eq!(mirror.calls_starting_with("update:page-left-behind"), 1);
        let row = workout_row(&db, "w-1").await;
        assert_eq!(row.notion_page_id.as_deref(), Some("page-left-behind"));
    }

    #[tokio::test]
    async fn test_reupsert_patches_child_pages() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        let mirror = FakeMirror::default();
        push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();

        // Cascade replace recreates children locally without page ids.
        store(&db, workout("w-1")).await;
        let report = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();

        assert_eq!(report.synced, 4);
        assert_eq!(mirror.calls_starting_with("create:"), 4);
        assert_eq!(mirror.calls_starting_with("update:"), 4);
        assert_eq!(mirror.live_pages(), 4);
    }

    #[tokio::test]
    async fn test_deleted_workout_is_archived_not_recreated() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        let mirror = FakeMirror::default();
        push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();

        db.writer()
            .call(|conn| repository::mark_workout_deleted(conn, "w-1", None))
            .await
            .unwrap();
        let report = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();

        assert_eq!(report.synced, 1);
        assert_eq!(mirror.calls_starting_with("archive:page-1"), 1);
        assert_eq!(mirror.calls_starting_with("create:"), 4);
        let row = workout_row(&db, "w-1").await;
        assert!(row.is_deleted);
        assert!(row.synced_to_notion);
    }

    #[tokio::test]
    async fn test_deleted_workout_never_mirrored() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        db.writer()
            .call(|conn| repository::mark_workout_deleted(conn, "w-1", None))
            .await
            .unwrap();
        let mirror = FakeMirror::default();

        let report = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();

        // The tombstone is settled; its children are never pushed.
        assert_eq!(report.total, 1);
        assert_eq!(mirror.calls_starting_with("create:"), 0);
        assert_eq!(mirror.calls_starting_with("archive:"), 0);
        let row = workout_row(&db, "w-1").await;
        assert!(row.synced_to_notion);
        assert_eq!(row.notion_page_id, None);
    }

    #[tokio::test]
    async fn test_record_failure_is_counted_and_retried_later() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        store(&db, workout("w-2")).await;
        let mirror = FakeMirror {
            fail_keys: vec!["w-2:0".into()],
            ..Default::default()
        };

        let report = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap();
        // Two workouts, two exercises (one fails), two sets under the good one.
        assert_eq!(
            report,
            MirrorReport {
                synced: 5,
                errors: 1,
                total: 6
            }
        );

        let pending = db
            .reader()
            .call(|conn| repository::list_unsynced_exercises(conn, None))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].workout_hevy_id, "w-2");
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_pass() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        let mirror = FakeMirror {
            rate_limit_keys: vec!["w-1".into()],
            ..Default::default()
        };

        let err = push_unsynced(&db, &mirror, &databases(), PushOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(mirror.calls_starting_with("create:w-1:"), 0);
        assert!(!workout_row(&db, "w-1").await.synced_to_notion);
    }

    #[tokio::test]
    async fn test_missing_databases_is_config_error() {
        let db = Database::open_memory().await.unwrap();
        let mirror = FakeMirror::default();
        let err = push_unsynced(&db, &mirror, &MirrorDatabases::default(), PushOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_push_single_workout() {
        let db = Database::open_memory().await.unwrap();
        store(&db, workout("w-1")).await;
        store(&db, workout("w-2")).await;
        let mirror = FakeMirror::default();

        let report = push_workout(&db, &mirror, &databases(), "w-2").await.unwrap();
        assert_eq!(report.synced, 4);
        assert_eq!(mirror.calls_starting_with("create:w-1"), 0);
        assert!(!workout_row(&db, "w-1").await.synced_to_notion);

        let err = push_workout(&db, &mirror, &databases(), "nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_routine_tree_and_progress_push() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                repository::upsert_routine_folder(
                    conn,
                    &RoutineFolder {
                        id: 7,
                        index: Some(0),
                        title: "Week 1".into(),
                        created_at: None,
                        updated_at: None,
                    },
                )?;
                let routine: Routine = serde_json::from_value(json!({
                    "id": "r-1", "title": "Day 1 - Squat", "folder_id": 7,
                    "exercises": [{
                        "index": 0, "title": "Squat (Barbell)",
                        "sets": [{"index": 0, "type": "normal", "weight_kg": 140, "reps": 5}]
                    }]
                }))
                .unwrap();
                repository::upsert_routine(conn, &routine)?;
                repository::upsert_exercise_progress(
                    conn,
                    &repository::ExerciseProgress {
                        template_id: "T-SQUAT".into(),
                        exercise_title: "Squat (Barbell)".into(),
                        ..Default::default()
                    },
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        let mirror = FakeMirror::default();
        let mut dbs = databases();
        dbs.routine_folders = Some("db-f".into());
        dbs.routines = Some("db-r".into());
        dbs.routine_exercises = Some("db-re".into());
        dbs.routine_sets = Some("db-rs".into());
        dbs.progress = Some("db-p".into());

        let report = push_unsynced(&db, &mirror, &dbs, PushOptions::default())
            .await
            .unwrap();
        assert_eq!(report.synced, 5);

        let pages = mirror.pages.lock().unwrap().clone();
        let routine = pages.iter().find(|p| p.key == "r-1").unwrap();
        assert_eq!(routine.database_id, "db-r");
        assert_eq!(routine.properties["Week Folder"]["relation"][0]["id"], "page-1");
        assert_eq!(routine.properties["Day Type"]["select"]["name"], "Squat");
        assert!(pages.iter().any(|p| p.key == "r-1:0:0" && p.database_id == "db-rs"));
        assert!(pages.iter().any(|p| p.key == "T-SQUAT" && p.database_id == "db-p"));
    }

    #[tokio::test]
    async fn test_setup_creates_and_stores_databases() {
        let db = Database::open_memory().await.unwrap();
        let mirror = FakeMirror::default();

        let dbs = setup_databases(&db, &mirror, "parent").await.unwrap();
        assert_eq!(dbs.workouts.as_deref(), Some("db-workouts"));
        assert!(dbs.routine_tree().is_some());
        assert_eq!(mirror.calls_starting_with("database:"), 8);
        assert_eq!(mirror.calls_starting_with("database:Exercises:"), 1);
        assert!(mirror
            .calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with("database:Sets:") && c.contains("db-exercises")));

        let stored = db
            .reader()
            .call(|conn| MirrorDatabases::load(conn))
            .await
            .unwrap();
        assert_eq!(stored, dbs);
    }
}
