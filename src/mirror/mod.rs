pub mod batch;
pub mod client;
pub mod properties;
pub mod pusher;

use std::ops::AddAssign;

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::storage::repository;

pub use client::NotionClient;

/// Page and database CRUD on the mirror workspace.
///
/// `properties` are already in the mirror's wire shape (see [`properties`]).
/// A 429 must surface as `Error::RateLimited`.
#[async_trait]
pub trait MirrorApi: Send + Sync {
    /// Find a live page in `database_id` whose key property equals `key`.
    async fn find_page_by_key(&self, database_id: &str, key: &str) -> Result<Option<String>>;

    /// Create a page and return its id.
    async fn create_page(&self, database_id: &str, properties: Value) -> Result<String>;

    async fn update_page(&self, page_id: &str, properties: Value) -> Result<()>;

    async fn archive_page(&self, page_id: &str) -> Result<()>;

    /// Create a database under a page and return its id.
    async fn create_database(
        &self,
        parent_page_id: &str,
        title: &str,
        properties: Value,
    ) -> Result<String>;
}

/// Target database ids, one per mirrored record family.
///
/// The workout tree is required for a push; the routine tree and progress
/// database are pushed only when configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorDatabases {
    pub workouts: Option<String>,
    pub exercises: Option<String>,
    pub sets: Option<String>,
    pub routine_folders: Option<String>,
    pub routines: Option<String>,
    pub routine_exercises: Option<String>,
    pub routine_sets: Option<String>,
    pub progress: Option<String>,
}

/// Resolved workout-tree ids.
#[derive(Debug, Clone)]
pub struct WorkoutTree {
    pub workouts: String,
    pub exercises: String,
    pub sets: String,
}

/// Resolved routine-tree ids.
#[derive(Debug, Clone)]
pub struct RoutineTree {
    pub folders: String,
    pub routines: String,
    pub exercises: String,
    pub sets: String,
}

impl MirrorDatabases {
    fn slots(&self) -> [(&'static str, &Option<String>); 8] {
        [
            ("notion.workouts_db", &self.workouts),
            ("notion.exercises_db", &self.exercises),
            ("notion.sets_db", &self.sets),
            ("notion.routine_folders_db", &self.routine_folders),
            ("notion.routines_db", &self.routines),
            ("notion.routine_exercises_db", &self.routine_exercises),
            ("notion.routine_sets_db", &self.routine_sets),
            ("notion.progress_db", &self.progress),
        ]
    }

    fn slots_mut(&mut self) -> [(&'static str, &mut Option<String>); 8] {
        [
            ("notion.workouts_db", &mut self.workouts),
            ("notion.exercises_db", &mut self.exercises),
            ("notion.sets_db", &mut self.sets),
            ("notion.routine_folders_db", &mut self.routine_folders),
            ("notion.routines_db", &mut self.routines),
            ("notion.routine_exercises_db", &mut self.routine_exercises),
            ("notion.routine_sets_db", &mut self.routine_sets),
            ("notion.progress_db", &mut self.progress),
        ]
    }

    /// Read ids stored in `app_config`.
    pub fn load(conn: &Connection) -> std::result::Result<Self, rusqlite::Error> {
        let mut dbs = Self::default();
        for (key, slot) in dbs.slots_mut() {
            *slot = repository::get_config(conn, key)?;
        }
        Ok(dbs)
    }

    /// Persist every id that is set.
    pub fn save(&self, conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
        for (key, slot) in self.slots() {
            if let Some(id) = slot {
                repository::set_config(conn, key, id)?;
            }
        }
        Ok(())
    }

    /// Fill unset ids from `other`.
    pub fn or(mut self, mut other: MirrorDatabases) -> Self {
        for ((_, mine), (_, theirs)) in self.slots_mut().into_iter().zip(other.slots_mut()) {
            if mine.is_none() {
                *mine = theirs.take();
            }
        }
        self
    }

    pub fn workout_tree(&self) -> Result<WorkoutTree> {
        match (&self.workouts, &self.exercises, &self.sets) {
            (Some(w), Some(e), Some(s)) => Ok(WorkoutTree {
                workouts: w.clone(),
                exercises: e.clone(),
                sets: s.clone(),
            }),
            _ => Err(Error::Config(
                "workouts, exercises and sets database ids are required".into(),
            )),
        }
    }

    pub fn routine_tree(&self) -> Option<RoutineTree> {
        Some(RoutineTree {
            folders: self.routine_folders.clone()?,
            routines: self.routines.clone()?,
            exercises: self.routine_exercises.clone()?,
            sets: self.routine_sets.clone()?,
        })
    }
}

/// Outcome of a push. Per-record failures are counted, not raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub synced: u64,
    pub errors: u64,
    pub total: u64,
}

impl AddAssign for MirrorReport {
    fn add_assign(&mut self, rhs: Self) {
        self.synced += rhs.synced;
        self.errors += rhs.errors;
        self.total += rhs.total;
    }
}
