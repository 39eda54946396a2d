//! Transition firing, entry/exit sequencing, and stabilization.
//!
//! The executor owns the statechart semantics end to end: it computes the
//! LCA-bounded exit and entry sequences, invokes capability actions in
//! order, and settles condition transitions after every change. It operates
//! on a [`MachineState`] the caller already holds exclusively; identity,
//! registration, and locking live a layer above.
//!
//! Failures during a sequence are surfaced as-is: scope changes and
//! sub-transitions already applied stay applied. The engine does not
//! attempt transactional recovery across capability calls it does not
//! control.

use crate::capability::CapabilityRegistry;
use crate::chart::{ActionCall, NodeHandle, StateChart};
use crate::error::CoreError;
use crate::instance::MachineState;
use crate::resolve::{self, Match, Trigger};
use crate::value::Value;
use crate::vars::VariableStore;

/// Executes transitions for one chart against borrowed machine state.
pub struct Executor<'a> {
    chart: &'a StateChart,
    capabilities: &'a dyn CapabilityRegistry,
    stabilization_limit: usize,
}

impl<'a> Executor<'a> {
    pub fn new(
        chart: &'a StateChart,
        capabilities: &'a dyn CapabilityRegistry,
        stabilization_limit: usize,
    ) -> Self {
        Self {
            chart,
            capabilities,
            stabilization_limit,
        }
    }

    /// Enters the chart from the root and settles: the start operation.
    ///
    /// Resolves the initial leaf through start-node designations, runs the
    /// entry sequence root-to-leaf (root included), then stabilizes.
    pub fn start(&self) -> Result<MachineState, CoreError> {
        let leaf = self.chart.initial_leaf(self.chart.root())?;
        let mut state = MachineState {
            leaf,
            vars: VariableStore::new(),
        };

        let entry_path = self.chart.path_from_root(leaf);
        self.enter(&mut state, &entry_path)?;
        self.stabilize(&mut state)?;
        Ok(state)
    }

    /// Delivers an external event. Returns whether a transition fired; a
    /// missing match leaves the configuration untouched.
    pub fn send_event(&self, state: &mut MachineState, event: &str) -> Result<bool, CoreError> {
        let path = self.chart.path_from_root(state.leaf);
        let matched = resolve::find_transition(
            self.chart,
            &state.vars,
            self.capabilities,
            &path,
            Trigger::Event(event),
        )?;
        match matched {
            Some(matched) => {
                self.fire(state, matched)?;
                self.stabilize(state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reassigns a variable and settles any condition transitions the new
    /// value enables.
    pub fn set_variable(
        &self,
        state: &mut MachineState,
        name: &str,
        value: Value,
    ) -> Result<(), CoreError> {
        let leaf = state.leaf;
        state.vars.set(self.chart, leaf, name, value)?;
        self.stabilize(state)
    }

    /// Event ids currently accepted by the active configuration.
    pub fn enabled_events(&self, state: &MachineState) -> Result<Vec<String>, CoreError> {
        let path = self.chart.path_from_root(state.leaf);
        resolve::enabled_events(self.chart, &state.vars, self.capabilities, &path)
    }

    /// Fires one matched transition: exit up to the LCA, run the transition
    /// action, resolve the effective target leaf, enter down from the LCA,
    /// move the leaf. Stabilization is the caller's follow-up.
    fn fire(&self, state: &mut MachineState, matched: Match) -> Result<(), CoreError> {
        let transition = &self.chart.node(matched.source).transitions[matched.index];
        let target = transition.to;
        let lca = self.chart.lca(state.leaf, target);
        // Nodes up to and including the LCA stay active.
        let keep = self.chart.node(lca).depth as usize + 1;

        tracing::debug!(
            "firing transition {} -> {}",
            self.chart.node(matched.source).id,
            self.chart.node(target).id
        );

        let exit_path = self.chart.path_from_root(state.leaf);
        for &handle in exit_path[keep..].iter().rev() {
            let exiting = self.chart.node(handle);
            if let Some(action) = &exiting.on_exit {
                self.invoke(action)?;
            }
            state.vars.clear_scope(handle);
        }

        if let Some(action) = &transition.action {
            self.invoke(action)?;
        }

        let effective = self.chart.initial_leaf(target)?;
        let entry_path = self.chart.path_from_root(effective);
        self.enter(state, &entry_path[keep..])?;

        state.leaf = effective;
        Ok(())
    }

    /// Entry sequence: declare each node's scope, then run its on-entry
    /// action, ancestor to leaf.
    fn enter(&self, state: &mut MachineState, nodes: &[NodeHandle]) -> Result<(), CoreError> {
        for &handle in nodes {
            state.vars.declare_scope(self.chart, handle);
            let entering = self.chart.node(handle);
            if let Some(action) = &entering.on_entry {
                self.invoke(action)?;
            }
        }
        Ok(())
    }

    /// Repeatedly fires condition transitions until none applies. Exceeding
    /// the iteration bound is fatal for the request, not silently capped.
    fn stabilize(&self, state: &mut MachineState) -> Result<(), CoreError> {
        let mut iterations = 0;
        loop {
            let path = self.chart.path_from_root(state.leaf);
            let matched = resolve::find_transition(
                self.chart,
                &state.vars,
                self.capabilities,
                &path,
                Trigger::None,
            )?;
            match matched {
                None => return Ok(()),
                Some(matched) => {
                    iterations += 1;
                    if iterations > self.stabilization_limit {
                        return Err(CoreError::StabilizationOverflow {
                            limit: self.stabilization_limit,
                        });
                    }
                    self.fire(state, matched)?;
                }
            }
        }
    }

    fn invoke(&self, call: &ActionCall) -> Result<(), CoreError> {
        self.capabilities
            .invoke_action(&call.name, &call.parameters)
            .map_err(|error| CoreError::ActionFailed {
                name: call.name.clone(),
                reason: error.to_string(),
            })
    }
}
