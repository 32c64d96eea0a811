//! Start/stop time tracking per user.
//!
//! Each user has at most one running entry. Durations are derived from the
//! stored timestamps; running entries count up to the supplied `now`.

use crate::{
    core::permissions::get_user,
    entities::{TimeEntry, time_entry},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Elapsed and billable time booked against one task label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    /// Task label
    pub task: String,
    /// Total tracked time
    pub elapsed: Duration,
    /// Portion of `elapsed` from billable entries
    pub billable: Duration,
    /// Number of entries for the task
    pub entries: usize,
}

/// Time covered by one entry.
///
/// A running entry counts up to `now`; an entry that would end before it
/// starts counts as zero.
#[must_use]
pub fn elapsed(entry: &time_entry::Model, now: DateTime<Utc>) -> Duration {
    let end = entry.ended_at.unwrap_or(now);
    (end - entry.started_at).max(Duration::zero())
}

/// Sum of [`elapsed`] over `entries`.
#[must_use]
pub fn total_elapsed(entries: &[time_entry::Model], now: DateTime<Utc>) -> Duration {
    entries
        .iter()
        .fold(Duration::zero(), |acc, entry| acc + elapsed(entry, now))
}

/// Groups entries by task label, sorted by label.
#[must_use]
pub fn summarize_by_task(entries: &[time_entry::Model], now: DateTime<Utc>) -> Vec<TaskSummary> {
    let mut by_task: BTreeMap<&str, TaskSummary> = BTreeMap::new();
    for entry in entries {
        let duration = elapsed(entry, now);
        let summary = by_task
            .entry(entry.task.as_str())
            .or_insert_with(|| TaskSummary {
                task: entry.task.clone(),
                elapsed: Duration::zero(),
                billable: Duration::zero(),
                entries: 0,
            });
        summary.elapsed += duration;
        if entry.billable {
            summary.billable += duration;
        }
        summary.entries += 1;
    }
    by_task.into_values().collect()
}

/// The user's running entry, if any.
pub async fn running_entry<C>(db: &C, user_id: i64) -> Result<Option<time_entry::Model>>
where
    C: ConnectionTrait,
{
    TimeEntry::find()
        .filter(time_entry::Column::UserId.eq(user_id))
        .filter(time_entry::Column::EndedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

/// All of a user's entries, oldest first.
pub async fn list_entries<C>(db: &C, user_id: i64) -> Result<Vec<time_entry::Model>>
where
    C: ConnectionTrait,
{
    TimeEntry::find()
        .filter(time_entry::Column::UserId.eq(user_id))
        .order_by_asc(time_entry::Column::StartedAt)
        .order_by_asc(time_entry::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Starts a timer for `user_id`.
#[instrument(skip(db, description))]
pub async fn start_timer(
    db: &DatabaseConnection,
    user_id: i64,
    task: &str,
    description: Option<String>,
    billable: bool,
    at: DateTime<Utc>,
) -> Result<time_entry::Model> {
    if task.trim().is_empty() {
        return Err(Error::EmptyField { field: "task" });
    }

    let txn = db.begin().await?;
    get_user(&txn, user_id).await?;
    if let Some(running) = running_entry(&txn, user_id).await? {
        return Err(Error::TimerAlreadyRunning {
            user_id,
            entry_id: running.id,
        });
    }

    let entry = time_entry::ActiveModel {
        user_id: Set(user_id),
        task: Set(task.trim().to_string()),
        description: Set(description),
        started_at: Set(at),
        ended_at: Set(None),
        billable: Set(billable),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(user_id, entry_id = entry.id, task = %entry.task, "Timer started");
    Ok(entry)
}

/// Stops the user's running timer at `at`.
#[instrument(skip(db))]
pub async fn stop_timer(
    db: &DatabaseConnection,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<time_entry::Model> {
    let running = running_entry(db, user_id)
        .await?
        .ok_or(Error::NoRunningTimer { user_id })?;
    if at < running.started_at {
        return Err(Error::InvalidTimeRange {
            entry_id: running.id,
        });
    }

    let mut active: time_entry::ActiveModel = running.into();
    active.ended_at = Set(Some(at));
    let entry = active.update(db).await?;

    info!(
        user_id,
        entry_id = entry.id,
        minutes = elapsed(&entry, at).num_minutes(),
        "Timer stopped"
    );
    Ok(entry)
}
