pub mod config;
pub mod date_util;
pub mod error;
mod http;
pub mod mirror;
pub mod progress;
pub mod server;
pub mod source;
pub mod storage;
pub mod sync;

use std::sync::Arc;

use serde::Serialize;

pub use config::Config;
pub use error::{Error, Result};
pub use mirror::pusher::PushOptions;
pub use mirror::{MirrorApi, MirrorDatabases, MirrorReport, NotionClient};
pub use progress::ProgressReport;
pub use source::{HevyClient, SourceApi};
pub use storage::repository::{RecordCounts, SyncState};
pub use storage::Database;
pub use sync::{
    EventReport, NoopProgress, RoutineSyncReport, SyncOptions, SyncProgress, SyncReport,
};

use storage::repository;
use sync::reconciler;

/// Cursor state plus local record counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(flatten)]
    pub state: SyncState,
    pub counts: RecordCounts,
}

/// Main entry point: a local store fed by one source.
pub struct HevySync {
    db: Database,
    source: Arc<dyn SourceApi>,
    options: SyncOptions,
}

impl HevySync {
    pub fn new(db: Database, source: Arc<dyn SourceApi>) -> Self {
        Self {
            db,
            source,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Sync commands ──────────────────────────────────────────────

    pub async fn sync_full(&self, progress: &dyn SyncProgress) -> Result<SyncReport> {
        reconciler::sync_full(&self.db, self.source.as_ref(), &self.options, progress).await
    }

    pub async fn sync_incremental(&self, progress: &dyn SyncProgress) -> Result<EventReport> {
        reconciler::sync_incremental(&self.db, self.source.as_ref(), &self.options, progress).await
    }

    pub async fn sync_templates(&self, progress: &dyn SyncProgress) -> Result<SyncReport> {
        reconciler::sync_templates(&self.db, self.source.as_ref(), &self.options, progress).await
    }

    pub async fn sync_routines(&self, progress: &dyn SyncProgress) -> Result<RoutineSyncReport> {
        reconciler::sync_routines(&self.db, self.source.as_ref(), &self.options, progress).await
    }

    pub async fn recompute_progress(&self) -> Result<ProgressReport> {
        progress::recompute_all(&self.db).await
    }

    // ── Mirror commands ────────────────────────────────────────────

    /// Database ids stored in `app_config`.
    pub async fn mirror_databases(&self) -> Result<MirrorDatabases> {
        self.db
            .reader()
            .call(|conn| MirrorDatabases::load(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Push unsynced records. Ids in `explicit` take precedence over stored ones.
    pub async fn push(
        &self,
        mirror: &dyn MirrorApi,
        explicit: MirrorDatabases,
        options: PushOptions,
    ) -> Result<MirrorReport> {
        let databases = explicit.or(self.mirror_databases().await?);
        mirror::pusher::push_unsynced(&self.db, mirror, &databases, options).await
    }

    pub async fn push_workout(&self, mirror: &dyn MirrorApi, hevy_id: &str) -> Result<MirrorReport> {
        let databases = self.mirror_databases().await?;
        mirror::pusher::push_workout(&self.db, mirror, &databases, hevy_id).await
    }

    pub async fn setup_mirror(
        &self,
        mirror: &dyn MirrorApi,
        parent_page_id: &str,
    ) -> Result<MirrorDatabases> {
        mirror::pusher::setup_databases(&self.db, mirror, parent_page_id).await
    }

    // ── Status ─────────────────────────────────────────────────────

    pub async fn status(&self) -> Result<Status> {
        self.db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>(Status {
                    state: repository::get_sync_state(conn)?,
                    counts: repository::record_counts(conn)?,
                })
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}
