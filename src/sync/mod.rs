pub mod derive;
pub mod reconciler;

use std::time::Duration;

use serde::Serialize;

/// Default page size for workouts, folders and routines.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Exercise templates allow larger pages.
pub const TEMPLATE_PAGE_SIZE: u32 = 100;
/// Fixed pause between successive source pages.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(300);

/// Options controlling a sync pass.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: u32,
    pub template_page_size: u32,
    pub page_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            template_page_size: TEMPLATE_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// Report returned after a collection pass completes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub entity_key: String,
    pub items_synced: u64,
    pub pages_fetched: u32,
}

/// Report returned after an incremental event pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub updated: u64,
    pub deleted: u64,
    /// Deletes with no local row plus event types we do not handle.
    pub ignored: u64,
    pub pages_fetched: u32,
    /// The cursor persisted at the end of the pass.
    pub cursor: String,
}

/// Folder and routine passes run back to back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutineSyncReport {
    pub folders: SyncReport,
    pub routines: SyncReport,
}

/// Callbacks for reporting sync progress to a UI.
pub trait SyncProgress: Send + Sync {
    fn on_page_fetched(&self, entity_key: &str, page: u32, page_count: u32);
    fn on_entity_complete(&self, report: &SyncReport);
}

/// A progress reporter that does nothing.
pub struct NoopProgress;

impl SyncProgress for NoopProgress {
    fn on_page_fetched(&self, _entity_key: &str, _page: u32, _page_count: u32) {}
    fn on_entity_complete(&self, _report: &SyncReport) {}
}

/// Sleep for `delay` unless it is zero.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
