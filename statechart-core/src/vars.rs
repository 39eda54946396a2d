//! Per-instance variable bindings with node-scoped visibility.

use crate::chart::{NodeHandle, StateChart};
use crate::error::CoreError;
use crate::value::Value;
use std::collections::HashMap;

/// Variable bindings of one running instance, grouped by declaring node.
///
/// A scope exists only while its node is active: entry instantiates the
/// node's declarations, exit drops them. Lookup walks from the requesting
/// node toward the root and takes the nearest declaration, so a variable
/// declared near the root behaves like a global and one declared deep in
/// the tree is reset on every re-entry of its subtree.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    scopes: HashMap<NodeHandle, HashMap<String, Value>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates the variables declared at `node` to their initial
    /// values, discarding any previous bindings of that scope.
    pub fn declare_scope(&mut self, chart: &StateChart, node: NodeHandle) {
        let declarations = &chart.node(node).variables;
        if declarations.is_empty() {
            return;
        }
        let bindings = declarations
            .iter()
            .map(|declaration| (declaration.name.clone(), declaration.value.clone()))
            .collect();
        self.scopes.insert(node, bindings);
    }

    /// Drops every binding declared at `node`.
    pub fn clear_scope(&mut self, node: NodeHandle) {
        self.scopes.remove(&node);
    }

    /// Looks up `name` from `from`, walking toward the root.
    pub fn resolve(
        &self,
        chart: &StateChart,
        from: NodeHandle,
        name: &str,
    ) -> Result<&Value, CoreError> {
        let mut cursor = Some(from);
        while let Some(node) = cursor {
            if let Some(value) = self.scopes.get(&node).and_then(|scope| scope.get(name)) {
                return Ok(value);
            }
            cursor = chart.node(node).parent;
        }
        Err(CoreError::UnknownVariable {
            name: name.to_string(),
        })
    }

    /// Reassigns an in-scope variable, enforcing its declared type.
    pub fn set(
        &mut self,
        chart: &StateChart,
        from: NodeHandle,
        name: &str,
        value: Value,
    ) -> Result<(), CoreError> {
        let mut cursor = Some(from);
        while let Some(node) = cursor {
            let owns = self
                .scopes
                .get(&node)
                .map_or(false, |scope| scope.contains_key(name));
            if owns {
                let declared = chart
                    .node(node)
                    .variables
                    .iter()
                    .find(|declaration| declaration.name == name)
                    .map(|declaration| declaration.value_type);
                if let Some(expected) = declared {
                    if value.value_type() != expected {
                        return Err(CoreError::TypeMismatch {
                            name: name.to_string(),
                            expected,
                            actual: value.value_type(),
                        });
                    }
                }
                if let Some(scope) = self.scopes.get_mut(&node) {
                    scope.insert(name.to_string(), value);
                }
                return Ok(());
            }
            cursor = chart.node(node).parent;
        }
        Err(CoreError::UnknownVariable {
            name: name.to_string(),
        })
    }
}
