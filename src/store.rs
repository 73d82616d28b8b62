use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::PerformanceSample;

/// Append-only per-user sample history.
///
/// Stored oldest-first so chronological feeds (CSV exports, live appends)
/// land at the tail; readers get most-recent-first.
#[derive(Debug, Default)]
pub struct HistoryStore {
    users: RwLock<HashMap<String, Vec<PerformanceSample>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's sample count after the append.
    pub fn append<I>(&self, user_id: &str, samples: I) -> usize
    where
        I: IntoIterator<Item = PerformanceSample>,
    {
        let mut users = self.users.write();
        let history = users.entry(user_id.to_string()).or_default();
        for sample in samples {
            let in_order = history
                .last()
                .map_or(true, |last| last.timestamp <= sample.timestamp);
            if in_order {
                history.push(sample);
            } else {
                // Late arrival: after every sample at or before its timestamp.
                let position =
                    history.partition_point(|existing| existing.timestamp <= sample.timestamp);
                history.insert(position, sample);
            }
        }
        history.len()
    }

    /// At most `limit` samples, most recent first.
    pub fn recent(&self, user_id: &str, limit: usize) -> Vec<PerformanceSample> {
        self.users
            .read()
            .get(user_id)
            .map(|history| history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.users
            .read()
            .get(user_id)
            .is_some_and(|history| !history.is_empty())
    }

    pub fn sample_count(&self, user_id: &str) -> usize {
        self.users.read().get(user_id).map_or(0, Vec::len)
    }

    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }
}
