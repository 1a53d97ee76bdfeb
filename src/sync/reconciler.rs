use std::future::Future;

use serde::de::DeserializeOwned;

use crate::date_util::{now_iso, EPOCH_CURSOR};
use crate::error::{Error, Result};
use crate::source::{
    decode_page, Collection, ExerciseTemplate, Page, Routine, RoutineFolder, SourceApi, Workout,
    WorkoutEvent, EVENTS_KEY,
};
use crate::storage::repository;
use crate::storage::Database;
use crate::sync::{
    pause, EventReport, RoutineSyncReport, SyncOptions, SyncProgress, SyncReport,
};

/// Fetch every workout page and upsert each workout with a cascade replace.
///
/// On success the cursor is set to the time the pass started. A page failure
/// aborts the pass; workouts from earlier pages stay committed.
pub async fn sync_full(
    db: &Database,
    source: &dyn SourceApi,
    options: &SyncOptions,
    progress: &dyn SyncProgress,
) -> Result<SyncReport> {
    let started_at = now_iso();
    db.writer()
        .call(|conn| repository::mark_sync_started(conn))
        .await?;

    let result = sync_collection(
        source,
        Collection::Workouts,
        options.page_size,
        options,
        progress,
        |workout: Workout| async move {
            db.writer()
                .call(move |conn| repository::upsert_workout(conn, &workout))
                .await?;
            Ok(())
        },
    )
    .await;

    match result {
        Ok(report) => {
            finish_pass(db, &started_at).await?;
            log::info!("Full sync upserted {} workouts", report.items_synced);
            Ok(report)
        }
        Err(e) => Err(fail_pass(db, e).await),
    }
}

/// Replay the workout event feed since the stored cursor.
///
/// `updated` events upsert the embedded workout; `deleted` events tombstone
/// the local row (ignored when there is none). The cursor then moves to the
/// time this pass started, so events arriving during the pass are seen again
/// next time; replaying them is harmless.
pub async fn sync_incremental(
    db: &Database,
    source: &dyn SourceApi,
    options: &SyncOptions,
    progress: &dyn SyncProgress,
) -> Result<EventReport> {
    let started_at = now_iso();
    let state = db
        .reader()
        .call(|conn| repository::get_sync_state(conn))
        .await?;
    let since = state
        .last_event_timestamp
        .unwrap_or_else(|| EPOCH_CURSOR.to_string());
    db.writer()
        .call(|conn| repository::mark_sync_started(conn))
        .await?;

    log::info!("Incremental sync since {since}");
    match apply_events(db, source, &since, options, progress).await {
        Ok(mut report) => {
            finish_pass(db, &started_at).await?;
            report.cursor = started_at;
            log::info!(
                "Incremental sync: {} updated, {} deleted, {} ignored",
                report.updated,
                report.deleted,
                report.ignored
            );
            Ok(report)
        }
        Err(e) => Err(fail_pass(db, e).await),
    }
}

async fn apply_events(
    db: &Database,
    source: &dyn SourceApi,
    since: &str,
    options: &SyncOptions,
    progress: &dyn SyncProgress,
) -> Result<EventReport> {
    let mut report = EventReport::default();
    let mut page = 1;
    loop {
        let body = source.fetch_events(since, page, options.page_size).await?;
        let events: Page<WorkoutEvent> = decode_page(EVENTS_KEY, body)?;
        report.pages_fetched += 1;
        progress.on_page_fetched("events", page, events.page_count);
        log::debug!(
            "Event page {page}/{}: {} events",
            events.page_count,
            events.items.len()
        );
        let last = events.is_last(page) || events.items.is_empty();

        for event in events.items {
            match event {
                WorkoutEvent::Updated { workout } => {
                    db.writer()
                        .call(move |conn| repository::upsert_workout(conn, &workout))
                        .await?;
                    report.updated += 1;
                }
                WorkoutEvent::Deleted { id, deleted_at } => {
                    let found = db
                        .writer()
                        .call({
                            let id = id.clone();
                            move |conn| {
                                repository::mark_workout_deleted(conn, &id, deleted_at.as_deref())
                            }
                        })
                        .await?;
                    if found {
                        report.deleted += 1;
                    } else {
                        log::warn!("Delete event for unknown workout {id}, ignoring");
                        report.ignored += 1;
                    }
                }
                WorkoutEvent::Unknown => report.ignored += 1,
            }
        }

        if last {
            break;
        }
        page += 1;
        pause(options.page_delay).await;
    }
    Ok(report)
}

/// Refresh the exercise template cache. Does not touch the cursor.
pub async fn sync_templates(
    db: &Database,
    source: &dyn SourceApi,
    options: &SyncOptions,
    progress: &dyn SyncProgress,
) -> Result<SyncReport> {
    sync_collection(
        source,
        Collection::ExerciseTemplates,
        options.template_page_size,
        options,
        progress,
        |template: ExerciseTemplate| async move {
            db.writer()
                .call(move |conn| repository::upsert_exercise_template(conn, &template))
                .await?;
            Ok(())
        },
    )
    .await
}

/// Sync every routine folder, then every routine.
///
/// Folders go first so that each routine can inherit its folder's week.
pub async fn sync_routines(
    db: &Database,
    source: &dyn SourceApi,
    options: &SyncOptions,
    progress: &dyn SyncProgress,
) -> Result<RoutineSyncReport> {
    let folders = sync_collection(
        source,
        Collection::RoutineFolders,
        options.page_size,
        options,
        progress,
        |folder: RoutineFolder| async move {
            db.writer()
                .call(move |conn| repository::upsert_routine_folder(conn, &folder))
                .await?;
            Ok(())
        },
    )
    .await?;

    let routines = sync_collection(
        source,
        Collection::Routines,
        options.page_size,
        options,
        progress,
        |routine: Routine| async move {
            db.writer()
                .call(move |conn| repository::upsert_routine(conn, &routine))
                .await?;
            Ok(())
        },
    )
    .await?;

    log::info!(
        "Routine sync: {} folders, {} routines",
        folders.items_synced,
        routines.items_synced
    );
    Ok(RoutineSyncReport { folders, routines })
}

/// Walk every page of `kind`, handing each decoded item to `store`.
async fn sync_collection<T, F, Fut>(
    source: &dyn SourceApi,
    kind: Collection,
    page_size: u32,
    options: &SyncOptions,
    progress: &dyn SyncProgress,
    mut store: F,
) -> Result<SyncReport>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut report = SyncReport {
        entity_key: kind.path().to_string(),
        ..Default::default()
    };
    let mut page = 1;
    loop {
        let body = source.fetch_collection(kind, page, page_size).await?;
        let decoded: Page<T> = decode_page(kind.items_key(), body)?;
        report.pages_fetched += 1;
        progress.on_page_fetched(&report.entity_key, page, decoded.page_count);
        log::debug!(
            "{} page {page}/{}: {} items",
            report.entity_key,
            decoded.page_count,
            decoded.items.len()
        );
        let last = decoded.is_last(page) || decoded.items.is_empty();

        for item in decoded.items {
            store(item).await?;
            report.items_synced += 1;
        }

        if last {
            break;
        }
        page += 1;
        pause(options.page_delay).await;
    }
    progress.on_entity_complete(&report);
    Ok(report)
}

async fn finish_pass(db: &Database, started_at: &str) -> Result<()> {
    let cursor = started_at.to_string();
    db.writer()
        .call(move |conn| repository::mark_sync_finished(conn, &cursor, &now_iso()))
        .await?;
    Ok(())
}

/// Record `err` in the sync state and hand it back for propagation.
async fn fail_pass(db: &Database, err: Error) -> Error {
    log::error!("Sync pass failed: {err}");
    let message = err.to_string();
    if let Err(e) = db
        .writer()
        .call(move |conn| repository::mark_sync_failed(conn, &message))
        .await
    {
        log::warn!("Could not record sync failure: {e}");
    }
    err
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sync::{NoopProgress, DEFAULT_PAGE_DELAY, DEFAULT_PAGE_SIZE};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory source serving canned pages.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub collections: Vec<(Collection, Vec<Value>)>,
        pub events: Vec<Value>,
        pub rate_limit_on_page: Option<u32>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn serve(&self, pages: &[Value], page: u32) -> Result<Value> {
            if self.rate_limit_on_page == Some(page) {
                return Err(Error::RateLimited { service: "Hevy" });
            }
            Ok(pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_else(|| json!({"page": page, "page_count": pages.len()})))
        }
    }

    #[async_trait]
    impl SourceApi for FakeSource {
        async fn fetch_collection(
            &self,
            kind: Collection,
            page: u32,
            page_size: u32,
        ) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{page}:{page_size}", kind.path()));
            let pages = self
                .collections
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, p)| p.as_slice())
                .unwrap_or(&[]);
            self.serve(pages, page)
        }

        async fn fetch_events(&self, since: &str, page: u32, _page_size: u32) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("events:{page}:{since}"));
            self.serve(&self.events, page)
        }
    }

    pub(crate) fn fast() -> SyncOptions {
        SyncOptions {
            page_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub(crate) fn workout_json(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "start_time": "2024-01-01T10:00:00Z",
            "end_time": "2024-01-01T11:15:00Z",
            "exercises": [{
                "index": 0,
                "title": "Bench Press (Barbell)",
                "exercise_template_id": "T-BENCH",
                "sets": [
                    {"index": 0, "type": "normal", "weight_kg": 100, "reps": 5},
                    {"index": 1, "type": "normal", "weight_kg": null, "reps": 8},
                    {"index": 2, "type": "normal", "weight_kg": 50, "reps": 10}
                ]
            }]
        })
    }

    async fn workout_count(db: &Database) -> (i64, i64) {
        db.reader()
            .call(|conn| {
                let live: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM workouts WHERE is_deleted = 0",
                    [],
                    |r| r.get(0),
                )?;
                let deleted: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM workouts WHERE is_deleted = 1",
                    [],
                    |r| r.get(0),
                )?;
                Ok::<_, rusqlite::Error>((live, deleted))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_full_walks_all_pages() {
        let db = Database::open_memory().await.unwrap();
        let source = FakeSource {
            collections: vec![(
                Collection::Workouts,
                vec![
                    json!({"page": 1, "page_count": 2, "workouts": [workout_json("w-1", "A")]}),
                    json!({"page": 2, "page_count": 2, "workouts": [workout_json("w-2", "B")]}),
                ],
            )],
            ..Default::default()
        };

        let report = sync_full(&db, &source, &fast(), &NoopProgress).await.unwrap();
        assert_eq!(report.items_synced, 2);
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(workout_count(&db).await, (2, 0));
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["workouts:1:10".to_string(), "workouts:2:10".to_string()]
        );

        let state = db
            .reader()
            .call(|conn| repository::get_sync_state(conn))
            .await
            .unwrap();
        assert!(!state.sync_in_progress);
        assert!(state.last_event_timestamp.is_some());
        assert_eq!(state.last_error, None);
    }

    #[tokio::test]
    async fn test_sync_full_rate_limit_keeps_earlier_pages() {
        let db = Database::open_memory().await.unwrap();
        let source = FakeSource {
            collections: vec![(
                Collection::Workouts,
                vec![
                    json!({"page": 1, "page_count": 2, "workouts": [workout_json("w-1", "A")]}),
                    json!({"page": 2, "page_count": 2, "workouts": [workout_json("w-2", "B")]}),
                ],
            )],
            rate_limit_on_page: Some(2),
            ..Default::default()
        };

        let err = sync_full(&db, &source, &fast(), &NoopProgress)
            .await
            .unwrap_err();
        assert!(err.is_rate_limit());
        assert_eq!(workout_count(&db).await, (1, 0));

        let state = db
            .reader()
            .call(|conn| repository::get_sync_state(conn))
            .await
            .unwrap();
        assert!(!state.sync_in_progress);
        assert_eq!(state.last_event_timestamp, None);
        assert!(state.last_error.unwrap().contains("429"));
    }

    #[tokio::test]
    async fn test_sync_incremental_applies_events() {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .call(|conn| {
                repository::upsert_workout(
                    conn,
                    &serde_json::from_value(workout_json("w-old", "Old")).unwrap(),
                )
            })
            .await
            .unwrap();

        let source = FakeSource {
            events: vec![json!({
                "page": 1,
                "page_count": 1,
                "events": [
                    {"type": "updated", "workout": workout_json("w-new", "New")},
                    {"type": "deleted", "id": "w-old", "deleted_at": "2024-02-01T00:00:00Z"},
                    {"type": "deleted", "id": "w-never-seen"}
                ]
            })],
            ..Default::default()
        };

        let report = sync_incremental(&db, &source, &fast(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.ignored, 1);
        assert_eq!(workout_count(&db).await, (1, 1));
        assert_eq!(
            source.calls.lock().unwrap()[0],
            format!("events:1:{EPOCH_CURSOR}")
        );

        // The next pass starts from the persisted cursor.
        let second = sync_incremental(&db, &source, &fast(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(
            source.calls.lock().unwrap()[1],
            format!("events:1:{}", report.cursor)
        );
        // Replaying the same events changes nothing.
        assert_eq!(second.updated, 1);
        assert_eq!(workout_count(&db).await, (1, 1));
    }

    #[tokio::test]
    async fn test_sync_incremental_empty_feed_advances_cursor() {
        let db = Database::open_memory().await.unwrap();
        let source = FakeSource::default();

        let report = sync_incremental(&db, &source, &fast(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(report.pages_fetched, 1);
        let state = db
            .reader()
            .call(|conn| repository::get_sync_state(conn))
            .await
            .unwrap();
        assert_eq!(state.last_event_timestamp, Some(report.cursor));
    }

    #[tokio::test]
    async fn test_sync_routines_folders_first() {
        let db = Database::open_memory().await.unwrap();
        let source = FakeSource {
            collections: vec![
                (
                    Collection::RoutineFolders,
                    vec![json!({
                        "page": 1, "page_count": 1,
                        "routine_folders": [{"id": 5, "index": 0, "title": "Week 3"}]
                    })],
                ),
                (
                    Collection::Routines,
                    vec![json!({
                        "page": 1, "page_count": 1,
                        "routines": [{
                            "id": "r-1", "title": "Day 2 - Squat", "folder_id": 5,
                            "exercises": [{
                                "index": 0, "title": "Squat (Barbell)", "rest_seconds": 180,
                                "sets": [{"index": 0, "type": "normal", "weight_kg": 140,
                                          "reps": 5, "rep_range": {"start": 4, "end": 6}}]
                            }]
                        }]
                    })],
                ),
            ],
            ..Default::default()
        };

        let report = sync_routines(&db, &source, &fast(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(report.folders.items_synced, 1);
        assert_eq!(report.routines.items_synced, 1);
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["routine_folders:1:10".to_string(), "routines:1:10".to_string()]
        );

        let global: i64 = db
            .reader()
            .call(|conn| {
                conn.query_row(
                    "SELECT global_sort_order FROM routine_exercises",
                    [],
                    |r| r.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(global, 30201);
    }

    #[tokio::test]
    async fn test_sync_templates_uses_large_pages() {
        let db = Database::open_memory().await.unwrap();
        let source = FakeSource {
            collections: vec![(
                Collection::ExerciseTemplates,
                vec![json!({
                    "page": 1, "page_count": 1,
                    "exercise_templates": [{
                        "id": "T-BENCH", "title": "Bench Press (Barbell)", "type": "weight_reps",
                        "primary_muscle_group": "chest", "secondary_muscle_groups": ["triceps"],
                        "is_custom": false
                    }]
                })],
            )],
            ..Default::default()
        };

        let report = sync_templates(&db, &source, &fast(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(report.items_synced, 1);
        assert_eq!(source.calls.lock().unwrap()[0], "exercise_templates:1:100");

        // Template sync leaves the workout cursor alone.
        let state = db
            .reader()
            .call(|conn| repository::get_sync_state(conn))
            .await
            .unwrap();
        assert_eq!(state.last_event_timestamp, None);
    }

    #[tokio::test]
    async fn test_paging_stops_without_page_field() {
        let db = Database::open_memory().await.unwrap();
        let source = FakeSource {
            collections: vec![(
                Collection::Workouts,
                vec![
                    json!({"page_count": 2, "workouts": [workout_json("w-1", "A")]}),
                    json!({"page_count": 2, "workouts": [workout_json("w-2", "B")]}),
                ],
            )],
            ..Default::default()
        };

        let report = sync_full(&db, &source, &fast(), &NoopProgress).await.unwrap();
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(source.calls.lock().unwrap().len(), 2);
        assert_eq!(workout_count(&db).await, (2, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_options_pause_between_pages() {
        let source = FakeSource {
            collections: vec![(
                Collection::RoutineFolders,
                (1..=3)
                    .map(|p| {
                        json!({"page": p, "page_count": 3, "routine_folders": [{"id": p, "title": "W"}]})
                    })
                    .collect(),
            )],
            ..Default::default()
        };

        let start = tokio::time::Instant::now();
        let report = sync_collection(
            &source,
            Collection::RoutineFolders,
            DEFAULT_PAGE_SIZE,
            &SyncOptions::default(),
            &NoopProgress,
            |_: Value| async { Ok(()) },
        )
        .await
        .unwrap();

        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.items_synced, 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= DEFAULT_PAGE_DELAY * 2 && elapsed < DEFAULT_PAGE_DELAY * 3);
    }
}
