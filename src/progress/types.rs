use serde::Serialize;

use crate::storage::repository::SetSample;

/// One performance of an exercise: the owning workout's start time and the
/// sets logged in that session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub start_time: Option<String>,
    pub sets: Vec<SetSample>,
}

/// Next-session recommendation derived from the last working set.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub weight_kg: f64,
    pub note: &'static str,
}

pub const NOTE_INCREASE: &str = "increase by 2.5%";
pub const NOTE_MAINTAIN: &str = "maintain";
pub const NOTE_MAINTAIN_OR_REDUCE: &str = "maintain or reduce";

/// Summary of a `recompute_all` run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub templates: u64,
    /// Rows whose values changed and now need a mirror push.
    pub changed: u64,
}
