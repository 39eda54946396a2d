//! The host-facing operations facade.
//!
//! A hosting transport layer embeds [`StateChartService`] and maps these
//! operations onto whatever protocol it speaks. The facade wires the chart
//! store, the instance registry, and the execution engine together; every
//! mutating instance operation runs under that instance's exclusive lock
//! for the whole transition-plus-stabilization sequence.

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::registry::InstanceRegistry;
use crate::store::ChartStore;
use statechart_core::{
    CapabilityInfo, CapabilityRegistry, CoreError, Executor, Instance, StateChart, Value,
};
use std::sync::Arc;
use uuid::Uuid;

/// Result of starting an instance.
#[derive(Debug, Clone)]
pub struct StartResult {
    pub instance_id: String,
    pub enabled: Vec<String>,
}

/// Statechart micro-service core: charts, running instances, and the
/// operations a hosting layer exposes.
pub struct StateChartService {
    store: ChartStore,
    registry: InstanceRegistry,
    capabilities: Arc<dyn CapabilityRegistry>,
    config: ServiceConfig,
}

impl StateChartService {
    pub fn new(capabilities: Arc<dyn CapabilityRegistry>) -> Self {
        Self::with_config(capabilities, ServiceConfig::default())
    }

    pub fn with_config(capabilities: Arc<dyn CapabilityRegistry>, config: ServiceConfig) -> Self {
        Self {
            store: ChartStore::new(),
            registry: InstanceRegistry::new(),
            capabilities,
            config,
        }
    }

    /// Validates a submitted chart definition and stores it. Nothing is
    /// stored on failure. Returns the chart id (the root node id).
    pub fn validate_and_store(
        &self,
        definition: &serde_json::Value,
    ) -> Result<String, ServiceError> {
        let chart = StateChart::from_json(definition)?;

        if self.config.max_chart_nodes > 0 && chart.node_count() > self.config.max_chart_nodes {
            return Err(CoreError::InvalidChart {
                reason: format!(
                    "chart has {} nodes, limit is {}",
                    chart.node_count(),
                    self.config.max_chart_nodes
                ),
            }
            .into());
        }

        let node_count = chart.node_count();
        let (id, changed) = self.store.put(chart);
        if changed {
            tracing::info!("chart stored: {} ({} nodes)", id, node_count);
        }
        Ok(id)
    }

    /// Fetches a stored chart.
    pub fn get_chart(&self, id: &str) -> Result<Arc<StateChart>, ServiceError> {
        self.store
            .get(id)
            .ok_or_else(|| ServiceError::ChartNotFound {
                chart: id.to_string(),
            })
    }

    /// Ids of all stored charts, sorted.
    pub fn list_charts(&self) -> Vec<String> {
        self.store.list()
    }

    /// Starts a new instance of a chart: enters from the root, settles
    /// condition transitions, registers the instance, and reports the
    /// events it now accepts.
    pub fn start(&self, chart_id: &str) -> Result<StartResult, ServiceError> {
        let chart = self.get_chart(chart_id)?;
        let executor = Executor::new(
            &chart,
            self.capabilities.as_ref(),
            self.config.max_stabilization_iterations,
        );

        let state = executor.start()?;
        let enabled = executor.enabled_events(&state)?;

        let instance_id = Uuid::new_v4().to_string();
        let instance = Instance::new(instance_id.clone(), chart.clone(), state);
        tracing::info!(
            "instance {} started from chart {} in node {}",
            instance_id,
            chart_id,
            instance.current_node()
        );
        self.registry.insert(instance);

        Ok(StartResult {
            instance_id,
            enabled,
        })
    }

    /// Delivers an event to an instance and returns the enabled events
    /// afterwards. An event with no matching transition is not an error:
    /// the configuration is left untouched.
    pub fn send_event(&self, instance_id: &str, event: &str) -> Result<Vec<String>, ServiceError> {
        self.registry.with_instance(instance_id, |instance| {
            let chart = instance.chart.clone();
            let executor = Executor::new(
                &chart,
                self.capabilities.as_ref(),
                self.config.max_stabilization_iterations,
            );

            let fired = executor.send_event(&mut instance.state, event)?;
            if fired {
                instance.touch();
                tracing::debug!(
                    "instance {}: event {} -> node {}",
                    instance_id,
                    event,
                    instance.current_node()
                );
            }
            Ok(executor.enabled_events(&instance.state)?)
        })
    }

    /// Assigns a variable in the instance's active scopes and returns the
    /// enabled events after stabilization.
    pub fn set_variable(
        &self,
        instance_id: &str,
        name: &str,
        value: Value,
    ) -> Result<Vec<String>, ServiceError> {
        self.registry.with_instance(instance_id, |instance| {
            let chart = instance.chart.clone();
            let executor = Executor::new(
                &chart,
                self.capabilities.as_ref(),
                self.config.max_stabilization_iterations,
            );

            executor.set_variable(&mut instance.state, name, value)?;
            instance.touch();
            tracing::debug!(
                "instance {}: set {} -> node {}",
                instance_id,
                name,
                instance.current_node()
            );
            Ok(executor.enabled_events(&instance.state)?)
        })
    }

    /// Descriptors of the capabilities registered with this service.
    pub fn list_capabilities(&self) -> Vec<CapabilityInfo> {
        self.capabilities.list()
    }

    /// Id of the active leaf of an instance.
    pub fn current_node(&self, instance_id: &str) -> Result<String, ServiceError> {
        self.registry
            .with_instance(instance_id, |instance| Ok(instance.current_node().to_string()))
    }

    pub fn instance_count(&self) -> usize {
        self.registry.len()
    }
}
