//! Running instance state.

use crate::chart::{NodeHandle, StateChart};
use crate::vars::VariableStore;
use std::sync::Arc;

/// The mutable execution state of one instance: the active leaf and the
/// variable bindings of the nodes on its path.
#[derive(Debug, Clone)]
pub struct MachineState {
    pub leaf: NodeHandle,
    pub vars: VariableStore,
}

/// A running state machine created from a chart snapshot.
///
/// The snapshot reference is taken at start; re-storing the chart under the
/// same id must not affect instances already running against the old one.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Unique instance id.
    pub id: String,

    /// Immutable chart snapshot this instance executes against.
    pub chart: Arc<StateChart>,

    /// Active leaf and variable bindings.
    pub state: MachineState,

    /// Creation timestamp (Unix millis).
    pub created_at: i64,

    /// Last update timestamp (Unix millis).
    pub updated_at: i64,
}

impl Instance {
    /// Creates an instance around an already-started machine state.
    pub fn new(id: impl Into<String>, chart: Arc<StateChart>, state: MachineState) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            chart,
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Id of the active leaf node.
    pub fn current_node(&self) -> &str {
        &self.chart.node(self.state.leaf).id
    }

    /// Records a mutation for bookkeeping.
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_bookkeeping() {
        let chart = Arc::new(
            StateChart::from_json(&json!({
                "id": "R",
                "start-node": "R/A",
                "nodes": [{"id": "R/A"}]
            }))
            .unwrap(),
        );
        let leaf = chart.handle("R/A").unwrap();
        let state = MachineState {
            leaf,
            vars: VariableStore::new(),
        };

        let mut instance = Instance::new("i-1", chart, state);
        assert_eq!(instance.id, "i-1");
        assert_eq!(instance.current_node(), "R/A");
        assert!(instance.created_at > 0);

        instance.touch();
        assert!(instance.updated_at >= instance.created_at);
    }
}
