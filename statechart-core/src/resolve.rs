//! Transition selection over the active configuration.
//!
//! Priority follows classic statechart semantics: nodes are scanned
//! innermost-first along the precomputed root-to-leaf array, and within a
//! node transitions are taken in declaration order. The first enabled
//! transition wins, so nested transitions shadow outer ones.

use crate::capability::CapabilityRegistry;
use crate::chart::{NodeHandle, PredicateArg, PredicateCall, StateChart};
use crate::error::CoreError;
use crate::value::Value;
use crate::vars::VariableStore;

/// What prompted a transition lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger<'a> {
    /// An external event was delivered.
    Event(&'a str),
    /// Re-evaluation after a variable change or a completed transition.
    None,
}

/// A matched transition: the active node declaring it and its position in
/// that node's out-transition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub source: NodeHandle,
    pub index: usize,
}

/// Finds the highest-priority transition enabled by `trigger`, or `None`.
///
/// `active_path` is the root-to-leaf array of the current configuration.
/// No match is a valid terminal result, not an error; predicate failures
/// and out-of-scope variable references propagate.
pub fn find_transition(
    chart: &StateChart,
    vars: &VariableStore,
    capabilities: &dyn CapabilityRegistry,
    active_path: &[NodeHandle],
    trigger: Trigger<'_>,
) -> Result<Option<Match>, CoreError> {
    for &source in active_path.iter().rev() {
        for (index, transition) in chart.node(source).transitions.iter().enumerate() {
            let guard = &transition.guard;
            let enabled = match trigger {
                Trigger::Event(event) => {
                    if guard.event.as_deref() != Some(event) {
                        false
                    } else {
                        match &guard.predicate {
                            Some(call) => {
                                evaluate_predicate(chart, vars, capabilities, source, call)?
                            }
                            None => true,
                        }
                    }
                }
                Trigger::None => {
                    if guard.event.is_some() {
                        false
                    } else {
                        match &guard.predicate {
                            Some(call) => {
                                evaluate_predicate(chart, vars, capabilities, source, call)?
                            }
                            None => false,
                        }
                    }
                }
            };
            if enabled {
                return Ok(Some(Match { source, index }));
            }
        }
    }
    Ok(None)
}

/// Collects the distinct event ids currently accepted: events guarding an
/// out-transition of any active node whose predicate, if present, is true.
/// Innermost-first, declaration order, first occurrence kept.
pub fn enabled_events(
    chart: &StateChart,
    vars: &VariableStore,
    capabilities: &dyn CapabilityRegistry,
    active_path: &[NodeHandle],
) -> Result<Vec<String>, CoreError> {
    let mut events: Vec<String> = Vec::new();
    for &node in active_path.iter().rev() {
        for transition in &chart.node(node).transitions {
            let event = match &transition.guard.event {
                Some(event) => event,
                None => continue,
            };
            if events.iter().any(|seen| seen == event) {
                continue;
            }
            let open = match &transition.guard.predicate {
                Some(call) => evaluate_predicate(chart, vars, capabilities, node, call)?,
                None => true,
            };
            if open {
                events.push(event.clone());
            }
        }
    }
    Ok(events)
}

/// Evaluates a predicate call with arguments resolved against the scopes
/// visible from `source`.
pub(crate) fn evaluate_predicate(
    chart: &StateChart,
    vars: &VariableStore,
    capabilities: &dyn CapabilityRegistry,
    source: NodeHandle,
    call: &PredicateCall,
) -> Result<bool, CoreError> {
    let mut args: Vec<Value> = Vec::with_capacity(call.parameters.len());
    for parameter in &call.parameters {
        match parameter {
            PredicateArg::Variable { variable } => {
                args.push(vars.resolve(chart, source, variable)?.clone());
            }
            PredicateArg::Literal(value) => args.push(value.clone()),
        }
    }
    capabilities
        .evaluate_predicate(&call.name, &args)
        .map_err(|error| CoreError::PredicateFailed {
            name: call.name.clone(),
            reason: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use serde_json::json;

    fn eq_predicate() -> CapabilitySet {
        CapabilitySet::new().with_predicate("eq", "scalar equality", Vec::new(), |args| {
            Ok(args.len() == 2 && args[0] == args[1])
        })
    }

    fn layered_chart() -> StateChart {
        StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/Outer",
            "attributes": [{"name": "n", "type": "integer", "value": 0}],
            "out-transitions": [
                {"guard": {"event": "go"}, "to": "R/Other"}
            ],
            "nodes": [
                {
                    "id": "R/Outer",
                    "start-node": "R/Outer/Leaf",
                    "nodes": [
                        {"id": "R/Outer/Leaf",
                         "out-transitions": [
                            {"guard": {"event": "go"}, "to": "R/Other"},
                            {"guard": {"predicate": {"name": "eq",
                                                     "parameters": [{"variable": "n"}, 1]}},
                             "to": "R/Other"}
                         ]}
                    ]
                },
                {"id": "R/Other"}
            ]
        }))
        .unwrap()
    }

    fn active_setup(chart: &StateChart) -> (Vec<NodeHandle>, VariableStore) {
        let leaf = chart.handle("R/Outer/Leaf").unwrap();
        let path = chart.path_from_root(leaf);
        let mut vars = VariableStore::new();
        for &handle in &path {
            vars.declare_scope(chart, handle);
        }
        (path, vars)
    }

    #[test]
    fn test_innermost_transition_wins() {
        let chart = layered_chart();
        let capabilities = eq_predicate();
        let (path, vars) = active_setup(&chart);

        let matched = find_transition(&chart, &vars, &capabilities, &path, Trigger::Event("go"))
            .unwrap()
            .unwrap();
        assert_eq!(matched.source, chart.handle("R/Outer/Leaf").unwrap());
        assert_eq!(matched.index, 0);
    }

    #[test]
    fn test_no_match_is_ok_none() {
        let chart = layered_chart();
        let capabilities = eq_predicate();
        let (path, vars) = active_setup(&chart);

        let matched =
            find_transition(&chart, &vars, &capabilities, &path, Trigger::Event("nope")).unwrap();
        assert!(matched.is_none());

        // n is 0, so the condition transition is quiet too.
        let matched = find_transition(&chart, &vars, &capabilities, &path, Trigger::None).unwrap();
        assert!(matched.is_none());
    }

    #[test]
    fn test_condition_trigger_sees_variable() {
        let chart = layered_chart();
        let capabilities = eq_predicate();
        let (path, mut vars) = active_setup(&chart);

        let leaf = chart.handle("R/Outer/Leaf").unwrap();
        vars.set(&chart, leaf, "n", Value::from(1i64)).unwrap();

        let matched = find_transition(&chart, &vars, &capabilities, &path, Trigger::None)
            .unwrap()
            .unwrap();
        assert_eq!(matched.source, leaf);
        assert_eq!(matched.index, 1);
    }

    #[test]
    fn test_enabled_events_dedup_and_gating() {
        let chart = layered_chart();
        let capabilities = eq_predicate();
        let (path, vars) = active_setup(&chart);

        // "go" appears on both the leaf and the root; reported once.
        let events = enabled_events(&chart, &vars, &capabilities, &path).unwrap();
        assert_eq!(events, vec!["go".to_string()]);
    }

    #[test]
    fn test_predicate_out_of_scope_variable_errors() {
        let chart = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/A",
            "nodes": [
                {"id": "R/A",
                 "out-transitions": [
                    {"guard": {"predicate": {"name": "eq",
                                             "parameters": [{"variable": "ghost"}, 1]}},
                     "to": "R/A"}
                 ]}
            ]
        }))
        .unwrap();
        let capabilities = eq_predicate();
        let leaf = chart.handle("R/A").unwrap();
        let path = chart.path_from_root(leaf);
        let vars = VariableStore::new();

        let result = find_transition(&chart, &vars, &capabilities, &path, Trigger::None);
        assert!(matches!(result, Err(CoreError::UnknownVariable { .. })));
    }

    #[test]
    fn test_failing_predicate_surfaces() {
        let chart = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/A",
            "nodes": [
                {"id": "R/A",
                 "out-transitions": [
                    {"guard": {"predicate": {"name": "boom", "parameters": []}}, "to": "R/A"}
                 ]}
            ]
        }))
        .unwrap();
        let capabilities = CapabilitySet::new().with_predicate(
            "boom",
            "always fails",
            Vec::new(),
            |_| Err(crate::capability::CapabilityError::Invocation("backend down".to_string())),
        );
        let leaf = chart.handle("R/A").unwrap();
        let path = chart.path_from_root(leaf);
        let vars = VariableStore::new();

        let result = find_transition(&chart, &vars, &capabilities, &path, Trigger::None);
        assert!(matches!(result, Err(CoreError::PredicateFailed { .. })));
    }
}
