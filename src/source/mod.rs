pub mod client;
pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

pub use client::HevyClient;
pub use types::*;

/// Paginated collections exposed by the source API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Workouts,
    ExerciseTemplates,
    RoutineFolders,
    Routines,
}

impl Collection {
    /// URL path segment below the API root.
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Workouts => "workouts",
            Collection::ExerciseTemplates => "exercise_templates",
            Collection::RoutineFolders => "routine_folders",
            Collection::Routines => "routines",
        }
    }

    /// Name of the array holding the page's items in the response body.
    pub fn items_key(&self) -> &'static str {
        self.path()
    }
}

/// Items key used by the workout event feed.
pub const EVENTS_KEY: &str = "events";

/// Source of truth for workouts, templates and routines.
///
/// Implementations return the raw page body; decoding into typed items
/// happens once in [`decode_page`] so callers never see untyped JSON.
/// A 429 must surface as `Error::RateLimited`, any other non-2xx as
/// `Error::Api`. Implementations do not retry.
#[async_trait]
pub trait SourceApi: Send + Sync {
    async fn fetch_collection(&self, kind: Collection, page: u32, page_size: u32) -> Result<Value>;

    /// Workout events since `since` (RFC 3339), in feed order.
    async fn fetch_events(&self, since: &str, page: u32, page_size: u32) -> Result<Value>;
}

/// One decoded page of a paginated response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub page: u32,
    pub page_count: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Whether `requested` is the final page. The request counter is used
    /// because some responses omit `page`.
    pub fn is_last(&self, requested: u32) -> bool {
        requested >= self.page_count
    }
}

/// Decode a page body, pulling items from `items_key`.
///
/// A missing items array is treated as an empty page; a missing
/// `page_count` means this is the only page.
pub fn decode_page<T: DeserializeOwned>(items_key: &str, mut body: Value) -> Result<Page<T>> {
    let page = body.get("page").and_then(Value::as_u64).unwrap_or(1) as u32;
    let page_count = body
        .get("page_count")
        .and_then(Value::as_u64)
        .map(|c| c as u32)
        .unwrap_or(page);
    let items = match body.get_mut(items_key).map(Value::take) {
        Some(Value::Null) | None => Vec::new(),
        Some(raw) => serde_json::from_value(raw)?,
    };
    Ok(Page {
        page,
        page_count,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_page() {
        let page: Page<RoutineFolder> = decode_page(
            Collection::RoutineFolders.items_key(),
            json!({
                "page": 1,
                "page_count": 3,
                "routine_folders": [{"id": 7, "index": 0, "title": "Week 1"}]
            }),
        )
        .unwrap();

        assert_eq!(page.page_count, 3);
        assert!(!page.is_last(1));
        assert!(page.is_last(3));
        assert_eq!(page.items[0].id, 7);
    }

    #[test]
    fn test_decode_page_missing_items() {
        let page: Page<Workout> =
            decode_page("workouts", json!({"page": 1, "page_count": 0})).unwrap();
        assert!(page.items.is_empty());
        assert!(page.is_last(1));
    }

    #[test]
    fn test_decode_page_bad_shape() {
        let result: Result<Page<Workout>> =
            decode_page("workouts", json!({"page": 1, "workouts": [{"title": "no id"}]}));
        assert!(result.is_err());
    }
}
