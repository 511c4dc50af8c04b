//! Eventual consistency simulation
//!
//! With a non-zero window, writes and deletes are staged per object key and
//! only become visible once their `apply_at` has passed. Reads commit due
//! entries for the keys they touch; a background sweep commits the rest.

use super::{BlobState, StoredObject};
use crate::runtime::Runtime;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A pending write (`Some`) or delete (`None`)
pub(crate) struct EventualEntry {
    pub(crate) object: Option<StoredObject>,
    pub(crate) apply_at: DateTime<Utc>,
}

/// Staged changes keyed by object key; the newest change per key wins
#[derive(Default)]
pub(crate) struct Staging {
    entries: HashMap<String, EventualEntry>,
}

impl Staging {
    pub(crate) fn stage(&mut self, key: String, object: Option<StoredObject>, apply_at: DateTime<Utc>) {
        self.entries.insert(key, EventualEntry { object, apply_at });
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Commit the entry for `key` if it is due
    pub(crate) fn settle_key(
        &mut self,
        key: &str,
        now: DateTime<Utc>,
        objects: &mut BTreeMap<String, StoredObject>,
    ) -> bool {
        let due = self.entries.get(key).is_some_and(|entry| entry.apply_at <= now);
        if !due {
            return false;
        }
        if let Some(entry) = self.entries.remove(key) {
            apply(objects, key.to_string(), entry.object);
        }
        true
    }

    /// Commit every due entry; returns how many were applied
    pub(crate) fn settle_all(
        &mut self,
        now: DateTime<Utc>,
        objects: &mut BTreeMap<String, StoredObject>,
    ) -> usize {
        let due: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.apply_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &due {
            if let Some(entry) = self.entries.remove(key) {
                apply(objects, key.clone(), entry.object);
            }
        }
        due.len()
    }
}

fn apply(objects: &mut BTreeMap<String, StoredObject>, key: String, object: Option<StoredObject>) {
    match object {
        Some(object) => {
            objects.insert(key, object);
        }
        None => {
            objects.remove(&key);
        }
    }
}

/// `now + window`, saturating on overflow
pub(crate) fn apply_at(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Spawn the periodic sweep; it stops once the blob state is dropped
pub(crate) fn spawn_sweeper(
    state: Weak<BlobState>,
    rt: Arc<Runtime>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                break;
            };
            let applied = state.settle_all(rt.now()).await;
            if applied > 0 {
                tracing::debug!(applied, "Eventual consistency sweep committed staged changes");
            }
        }
    })
}
