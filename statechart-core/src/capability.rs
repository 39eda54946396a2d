//! The capability seam: named actions and predicates supplied by the host.
//!
//! The engine never sees how capabilities are implemented or registered. It
//! invokes them by name with already-resolved scalar arguments, and a
//! failure aborts the in-progress transition (no rollback).

use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Failure reported by a capability implementation.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("unknown capability: {0}")]
    Unknown(String),

    #[error("{0}")]
    Invocation(String),
}

/// Declares one parameter of a registered capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

/// Descriptor of a registered capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterSpec>,
}

/// Named actions and predicates the engine calls out to. Calls are
/// synchronous and assumed bounded by the host.
pub trait CapabilityRegistry: Send + Sync {
    /// Runs the named action.
    fn invoke_action(&self, name: &str, args: &[Value]) -> Result<(), CapabilityError>;

    /// Evaluates the named predicate.
    fn evaluate_predicate(&self, name: &str, args: &[Value]) -> Result<bool, CapabilityError>;

    /// Descriptors of everything registered, actions first, sorted by name.
    fn list(&self) -> Vec<CapabilityInfo>;
}

type ActionFn = Box<dyn Fn(&[Value]) -> Result<(), CapabilityError> + Send + Sync>;
type PredicateFn = Box<dyn Fn(&[Value]) -> Result<bool, CapabilityError> + Send + Sync>;

/// Closure-backed [`CapabilityRegistry`] for hosts and tests.
#[derive(Default)]
pub struct CapabilitySet {
    actions: HashMap<String, (CapabilityInfo, ActionFn)>,
    predicates: HashMap<String, (CapabilityInfo, PredicateFn)>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under `name`.
    pub fn with_action<F>(
        mut self,
        name: &str,
        description: &str,
        parameters: Vec<ParameterSpec>,
        action: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<(), CapabilityError> + Send + Sync + 'static,
    {
        let info = CapabilityInfo {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        };
        self.actions
            .insert(name.to_string(), (info, Box::new(action)));
        self
    }

    /// Registers a predicate under `name`.
    pub fn with_predicate<F>(
        mut self,
        name: &str,
        description: &str,
        parameters: Vec<ParameterSpec>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<bool, CapabilityError> + Send + Sync + 'static,
    {
        let info = CapabilityInfo {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        };
        self.predicates
            .insert(name.to_string(), (info, Box::new(predicate)));
        self
    }
}

impl CapabilityRegistry for CapabilitySet {
    fn invoke_action(&self, name: &str, args: &[Value]) -> Result<(), CapabilityError> {
        match self.actions.get(name) {
            Some((_, action)) => action(args),
            None => Err(CapabilityError::Unknown(name.to_string())),
        }
    }

    fn evaluate_predicate(&self, name: &str, args: &[Value]) -> Result<bool, CapabilityError> {
        match self.predicates.get(name) {
            Some((_, predicate)) => predicate(args),
            None => Err(CapabilityError::Unknown(name.to_string())),
        }
    }

    fn list(&self) -> Vec<CapabilityInfo> {
        let mut actions: Vec<CapabilityInfo> =
            self.actions.values().map(|(info, _)| info.clone()).collect();
        actions.sort_by(|a, b| a.name.cmp(&b.name));

        let mut predicates: Vec<CapabilityInfo> = self
            .predicates
            .values()
            .map(|(info, _)| info.clone())
            .collect();
        predicates.sort_by(|a, b| a.name.cmp(&b.name));

        actions.extend(predicates);
        actions
    }
}
