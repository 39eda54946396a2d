//! In-memory chart store: immutable snapshots keyed by root id.

use dashmap::DashMap;
use statechart_core::StateChart;
use std::sync::Arc;

/// Registry of validated chart definitions.
///
/// Stored charts are immutable. Re-storing an id swaps the snapshot for
/// future starts; instances already running keep the `Arc` they took at
/// start (copy-on-start, not copy-on-write).
#[derive(Default)]
pub struct ChartStore {
    charts: DashMap<String, Arc<StateChart>>,
}

impl ChartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a chart. Returns the chart id and whether the
    /// store changed; re-submitting an identical definition is an
    /// idempotent no-op.
    pub fn put(&self, chart: StateChart) -> (String, bool) {
        let id = chart.root_id().to_string();
        if let Some(existing) = self.charts.get(&id) {
            if existing.checksum() == chart.checksum() {
                return (id, false);
            }
        }
        self.charts.insert(id.clone(), Arc::new(chart));
        (id, true)
    }

    pub fn get(&self, id: &str) -> Option<Arc<StateChart>> {
        self.charts.get(id).map(|entry| entry.clone())
    }

    /// All stored chart ids, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.charts.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}
