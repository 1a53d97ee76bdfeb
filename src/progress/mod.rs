//! Per-template personal records and next-weight suggestions, rebuilt from
//! the full workout history.

pub mod types;

use std::collections::BTreeMap;

pub use types::*;

use crate::date_util::{round1, round_half};
use crate::error::Result;
use crate::source::SetType;
use crate::storage::repository::{self, ExerciseProgress, SetSample};
use crate::storage::Database;
use crate::sync::derive::brzycki_one_rep_max;

/// Recompute one progress row per exercise template.
///
/// Tombstoned workouts are excluded. Rows whose values did not change keep
/// their mirror state; changed rows are flagged for the next push.
pub async fn recompute_all(db: &Database) -> Result<ProgressReport> {
    let groups = db
        .reader()
        .call(|conn| {
            let history = repository::list_exercise_history(conn)?;
            let mut groups: BTreeMap<String, (String, Vec<Session>)> = BTreeMap::new();
            for row in history {
                let sets = repository::list_exercise_sets(conn, row.exercise_id)?;
                groups
                    .entry(row.template_id)
                    .or_insert_with(|| (row.title, Vec::new()))
                    .1
                    .push(Session {
                        start_time: row.workout_start_time,
                        sets,
                    });
            }
            Ok::<_, rusqlite::Error>(groups)
        })
        .await?;

    let summaries: Vec<ExerciseProgress> = groups
        .into_iter()
        .map(|(template_id, (title, sessions))| summarize(template_id, title, sessions))
        .collect();

    let templates = summaries.len() as u64;
    let changed = db
        .writer()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut changed = 0u64;
            for progress in &summaries {
                let existing = repository::get_exercise_progress(&tx, &progress.template_id)?;
                if existing.as_ref() != Some(progress) {
                    repository::upsert_exercise_progress(&tx, progress)?;
                    changed += 1;
                }
            }
            tx.commit()?;
            Ok::<_, rusqlite::Error>(changed)
        })
        .await?;

    log::info!("Progress recomputed for {templates} templates ({changed} changed)");
    Ok(ProgressReport { templates, changed })
}

/// Fold every session of one template into a progress row.
pub fn summarize(template_id: String, title: String, mut sessions: Vec<Session>) -> ExerciseProgress {
    // Most recent first; sessions without a start time sort last.
    sessions.sort_by(|a, b| {
        let a = a.start_time.as_deref().unwrap_or("");
        let b = b.start_time.as_deref().unwrap_or("");
        b.cmp(a)
    });

    let mut progress = ExerciseProgress {
        template_id,
        exercise_title: title,
        total_sessions: sessions.len() as i64,
        ..Default::default()
    };

    for session in &sessions {
        let mut volume = 0.0;
        for set in &session.sets {
            if let Some(w) = set.weight_kg {
                progress.max_weight_kg = Some(progress.max_weight_kg.map_or(w, |m| m.max(w)));
            }
            if let Some(r) = set.reps {
                progress.max_reps = Some(progress.max_reps.map_or(r, |m| m.max(r)));
            }
            if let (Some(w), Some(r)) = (set.weight_kg, set.reps) {
                volume += w * r as f64;
                if let Some(orm) = brzycki_one_rep_max(w, r) {
                    let orm = round1(orm);
                    progress.estimated_one_rep_max =
                        Some(progress.estimated_one_rep_max.map_or(orm, |m| m.max(orm)));
                }
            }
        }
        progress.max_session_volume = progress.max_session_volume.max(round1(volume));
    }

    if let Some(latest) = sessions.first() {
        progress.last_performed_at = latest.start_time.clone();
        if let Some(set) = last_working_set(&latest.sets) {
            progress.last_weight_kg = set.weight_kg;
            progress.last_reps = set.reps;
            if let (Some(w), Some(r)) = (set.weight_kg, set.reps) {
                let suggestion = suggest(w, r);
                progress.suggested_weight_kg = Some(suggestion.weight_kg);
                progress.progression_note = Some(suggestion.note.to_string());
            }
        }
    }

    progress
}

fn last_working_set(sets: &[SetSample]) -> Option<&SetSample> {
    sets.iter()
        .rev()
        .find(|s| SetType::parse(&s.set_type) != SetType::Warmup)
}

/// Progression rule keyed on the reps of the last working set.
pub fn suggest(weight_kg: f64, reps: i64) -> Suggestion {
    match reps {
        r if r >= 10 => Suggestion {
            weight_kg: round_half(weight_kg * 1.025),
            note: NOTE_INCREASE,
        },
        8 | 9 => Suggestion {
            weight_kg,
            note: NOTE_MAINTAIN,
        },
        _ => Suggestion {
            weight_kg,
            note: NOTE_MAINTAIN_OR_REDUCE,
        },
    }
}
