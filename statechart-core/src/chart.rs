//! Chart definition types, validation, and arena indexing.
//!
//! Charts are submitted as a single rooted node tree in a JSON DSL. Field
//! names are kebab-case, matching the hosting contract:
//!
//! ```json
//! {
//!   "id": "Order",
//!   "start-node": "Order/New",
//!   "nodes": [
//!     {"id": "Order/New",
//!      "out-transitions": [{"guard": {"event": "submit"}, "to": "Order/Open"}]},
//!     {"id": "Order/Open",
//!      "attributes": [{"name": "n", "type": "integer", "value": 0}],
//!      "out-transitions": [
//!        {"guard": {"predicate": {"name": "eq", "parameters": [{"variable": "n"}, 1]}},
//!         "to": "Order/Done"}]},
//!     {"id": "Order/Done"}
//!   ]
//! }
//! ```
//!
//! A guard may also be a bare event-id string, the contract's short form.
//!
//! Node ids are hierarchical paths: a child's id is its parent's id plus one
//! `/`-separated segment. Validation rejects any tree that violates this,
//! then flattens the tree into an arena indexed by [`NodeHandle`] so that
//! runtime walks never re-parse paths.

use crate::error::CoreError;
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An action invocation: capability name plus literal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
}

/// A predicate argument: a variable reference resolved by scoped lookup, or
/// a literal scalar. Unlike action parameters, predicate parameters may name
/// variables; the asymmetry comes from the hosting contract and is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateArg {
    Variable { variable: String },
    Literal(Value),
}

/// A predicate invocation: capability name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<PredicateArg>,
}

/// A variable declaration scoped to the node carrying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub value: Value,
}

/// Guard as transmitted. The long form carries an optional event and an
/// optional predicate (at least one required); the short form is a bare
/// event-id string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuardRaw {
    Event(String),
    Full {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        predicate: Option<PredicateCall>,
    },
}

/// A transition as transmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRaw {
    pub guard: GuardRaw,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionCall>,
}

/// A node as transmitted: one point in the chart hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeRaw {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_entry: Option<ActionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_exit: Option<ActionCall>,

    /// Default child entered when this node is the target of a transition.
    /// Required whenever `nodes` is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub out_transitions: Vec<TransitionRaw>,

    /// Variable declarations scoped to this node and its descendants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<VariableDeclaration>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeRaw>,
}

/// Index of a node in the chart arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A validated guard: event match, predicate, or both.
#[derive(Debug, Clone)]
pub struct Guard {
    pub event: Option<String>,
    pub predicate: Option<PredicateCall>,
}

/// A validated transition; the target is resolved to a handle.
#[derive(Debug, Clone)]
pub struct Transition {
    pub guard: Guard,
    pub to: NodeHandle,
    pub action: Option<ActionCall>,
}

/// A node in the validated arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub description: Option<String>,
    pub on_entry: Option<ActionCall>,
    pub on_exit: Option<ActionCall>,
    pub start_node: Option<NodeHandle>,
    pub transitions: Vec<Transition>,
    pub variables: Vec<VariableDeclaration>,
    pub parent: Option<NodeHandle>,
    pub children: Vec<NodeHandle>,
    pub depth: u32,
}

impl Node {
    /// A leaf has no children; only leaves can be the active node of an
    /// instance.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Validated, immutable, arena-indexed chart definition.
///
/// Nodes live in a pre-order `Vec` (the root at index 0); the path index is
/// built once here so runtime lookups never parse id strings again.
#[derive(Debug, Clone)]
pub struct StateChart {
    nodes: Vec<Node>,
    index: HashMap<String, NodeHandle>,
    checksum: String,
    raw: NodeRaw,
}

impl StateChart {
    /// Parses and validates a chart definition from JSON.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, CoreError> {
        let raw: NodeRaw = serde_json::from_value(json.clone())?;
        Self::from_raw(raw)
    }

    /// Validates a raw node tree and builds the arena. Fails fast with the
    /// first violation found; nothing is partially accepted.
    pub fn from_raw(raw: NodeRaw) -> Result<Self, CoreError> {
        let mut nodes = Vec::new();
        let mut index = HashMap::new();

        flatten(&raw, None, 0, &mut nodes, &mut index)?;

        // Raw nodes in arena order, for the resolution pass.
        let mut flat_raw = Vec::with_capacity(nodes.len());
        collect(&raw, &mut flat_raw);

        for position in 0..nodes.len() {
            let raw_node = flat_raw[position];

            let start_node = resolve_start_node(&nodes, &index, position, raw_node)?;
            nodes[position].start_node = start_node;

            let transitions = resolve_transitions(&nodes[position].id, &index, raw_node)?;
            nodes[position].transitions = transitions;
        }

        let json_bytes = serde_json::to_vec(&raw)?;
        let checksum = format!("{:08x}", crc32c::crc32c(&json_bytes));

        Ok(Self {
            nodes,
            index,
            checksum,
            raw,
        })
    }

    /// Handle of the root node.
    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    /// Id of the root node; doubles as the chart id.
    pub fn root_id(&self) -> &str {
        &self.nodes[0].id
    }

    /// Resolves a node id to its handle.
    pub fn handle(&self, id: &str) -> Option<NodeHandle> {
        self.index.get(id).copied()
    }

    pub fn node(&self, handle: NodeHandle) -> &Node {
        &self.nodes[handle.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Checksum of the raw definition, for idempotent re-submission checks.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// The definition as submitted.
    pub fn raw(&self) -> &NodeRaw {
        &self.raw
    }

    /// The definition as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.raw).unwrap()
    }

    /// Nodes from the root down to `handle`, inclusive.
    pub fn path_from_root(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut path = Vec::with_capacity(self.node(handle).depth as usize + 1);
        let mut cursor = Some(handle);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.node(node).parent;
        }
        path.reverse();
        path
    }

    /// Lowest common ancestor of two nodes.
    pub fn lca(&self, a: NodeHandle, b: NodeHandle) -> NodeHandle {
        let (mut a, mut b) = (a, b);
        while self.node(a).depth > self.node(b).depth {
            a = self.hoist(a);
        }
        while self.node(b).depth > self.node(a).depth {
            b = self.hoist(b);
        }
        while a != b {
            a = self.hoist(a);
            b = self.hoist(b);
        }
        a
    }

    /// Follows start-node designations from `from` until a leaf is reached.
    pub fn initial_leaf(&self, from: NodeHandle) -> Result<NodeHandle, CoreError> {
        let mut cursor = from;
        let mut steps = 0;
        while !self.node(cursor).is_leaf() {
            match self.node(cursor).start_node {
                Some(next) => cursor = next,
                None => {
                    return Err(CoreError::UnresolvableTarget {
                        node: self.node(cursor).id.clone(),
                    })
                }
            }
            steps += 1;
            if steps > self.nodes.len() {
                return Err(CoreError::UnresolvableTarget {
                    node: self.node(from).id.clone(),
                });
            }
        }
        Ok(cursor)
    }

    fn hoist(&self, handle: NodeHandle) -> NodeHandle {
        self.node(handle).parent.unwrap_or(handle)
    }
}

/// One segment of a node path: a word-start character followed by word
/// characters, `.` or `-`.
fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

fn is_valid_node_id(id: &str) -> bool {
    !id.is_empty() && id.split('/').all(is_valid_segment)
}

fn invalid(reason: String) -> CoreError {
    CoreError::InvalidChart { reason }
}

/// First pass: validate ids and attributes, assign handles in pre-order,
/// and wire parent/children/depth. Transitions and start-nodes may point
/// forward, so they resolve in a second pass.
fn flatten(
    raw: &NodeRaw,
    parent: Option<NodeHandle>,
    depth: u32,
    nodes: &mut Vec<Node>,
    index: &mut HashMap<String, NodeHandle>,
) -> Result<NodeHandle, CoreError> {
    if !is_valid_node_id(&raw.id) {
        return Err(invalid(format!("invalid node id '{}'", raw.id)));
    }

    if let Some(parent_handle) = parent {
        let parent_id = &nodes[parent_handle.index()].id;
        if !is_child_id(parent_id, &raw.id) {
            return Err(invalid(format!(
                "node id '{}' does not extend parent id '{}' by one segment",
                raw.id, parent_id
            )));
        }
    }

    for (position, declaration) in raw.attributes.iter().enumerate() {
        if raw.attributes[..position]
            .iter()
            .any(|other| other.name == declaration.name)
        {
            return Err(invalid(format!(
                "duplicate variable '{}' at node '{}'",
                declaration.name, raw.id
            )));
        }
        if declaration.value.value_type() != declaration.value_type {
            return Err(invalid(format!(
                "variable '{}' at node '{}' declares type {} but its value is {}",
                declaration.name,
                raw.id,
                declaration.value_type,
                declaration.value.value_type()
            )));
        }
    }

    let handle = NodeHandle(nodes.len() as u32);
    if index.insert(raw.id.clone(), handle).is_some() {
        return Err(invalid(format!("duplicate node id '{}'", raw.id)));
    }

    nodes.push(Node {
        id: raw.id.clone(),
        description: raw.description.clone(),
        on_entry: raw.on_entry.clone(),
        on_exit: raw.on_exit.clone(),
        start_node: None,
        transitions: Vec::new(),
        variables: raw.attributes.clone(),
        parent,
        children: Vec::new(),
        depth,
    });

    for child in &raw.nodes {
        let child_handle = flatten(child, Some(handle), depth + 1, nodes, index)?;
        nodes[handle.index()].children.push(child_handle);
    }

    Ok(handle)
}

/// Raw nodes in the same pre-order as the arena.
fn collect<'a>(raw: &'a NodeRaw, out: &mut Vec<&'a NodeRaw>) {
    out.push(raw);
    for child in &raw.nodes {
        collect(child, out);
    }
}

fn is_child_id(parent_id: &str, child_id: &str) -> bool {
    match child_id.strip_prefix(parent_id) {
        Some(rest) => match rest.strip_prefix('/') {
            Some(segment) => !segment.contains('/') && is_valid_segment(segment),
            None => false,
        },
        None => false,
    }
}

fn resolve_start_node(
    nodes: &[Node],
    index: &HashMap<String, NodeHandle>,
    position: usize,
    raw_node: &NodeRaw,
) -> Result<Option<NodeHandle>, CoreError> {
    let node = &nodes[position];
    match &raw_node.start_node {
        Some(start_id) => {
            let target = index
                .get(start_id)
                .copied()
                .filter(|candidate| node.children.contains(candidate))
                .ok_or_else(|| {
                    invalid(format!(
                        "start-node '{}' of '{}' is not one of its children",
                        start_id, node.id
                    ))
                })?;
            Ok(Some(target))
        }
        None => {
            if node.children.is_empty() {
                Ok(None)
            } else {
                Err(invalid(format!(
                    "composite node '{}' has children but no start-node",
                    node.id
                )))
            }
        }
    }
}

fn resolve_transitions(
    source_id: &str,
    index: &HashMap<String, NodeHandle>,
    raw_node: &NodeRaw,
) -> Result<Vec<Transition>, CoreError> {
    let mut transitions = Vec::with_capacity(raw_node.out_transitions.len());
    for raw_transition in &raw_node.out_transitions {
        let guard = match &raw_transition.guard {
            GuardRaw::Event(event) => Guard {
                event: Some(event.clone()),
                predicate: None,
            },
            GuardRaw::Full { event, predicate } => {
                if event.is_none() && predicate.is_none() {
                    return Err(invalid(format!(
                        "transition at '{}' has a guard with neither event nor predicate",
                        source_id
                    )));
                }
                Guard {
                    event: event.clone(),
                    predicate: predicate.clone(),
                }
            }
        };

        let to = index.get(&raw_transition.to).copied().ok_or_else(|| {
            invalid(format!(
                "transition at '{}' targets unknown node '{}'",
                source_id, raw_transition.to
            ))
        })?;

        transitions.push(Transition {
            guard,
            to,
            action: raw_transition.action.clone(),
        });
    }
    Ok(transitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_chart() -> serde_json::Value {
        json!({
            "id": "Order",
            "description": "order lifecycle",
            "start-node": "Order/New",
            "nodes": [
                {
                    "id": "Order/New",
                    "out-transitions": [
                        {"guard": {"event": "submit"}, "to": "Order/Open"}
                    ]
                },
                {
                    "id": "Order/Open",
                    "start-node": "Order/Open/Review",
                    "attributes": [{"name": "n", "type": "integer", "value": 0}],
                    "nodes": [
                        {"id": "Order/Open/Review"},
                        {"id": "Order/Open/Hold"}
                    ],
                    "out-transitions": [
                        {"guard": {"predicate": {"name": "eq", "parameters": [{"variable": "n"}, 1]}},
                         "to": "Order/Done"}
                    ]
                },
                {"id": "Order/Done"}
            ]
        })
    }

    #[test]
    fn test_parse_and_index() {
        let chart = StateChart::from_json(&sample_chart()).unwrap();

        assert_eq!(chart.root_id(), "Order");
        assert_eq!(chart.node_count(), 6);

        let open = chart.handle("Order/Open").unwrap();
        assert_eq!(chart.node(open).children.len(), 2);
        assert_eq!(chart.node(open).depth, 1);
        assert!(!chart.node(open).is_leaf());

        let review = chart.handle("Order/Open/Review").unwrap();
        assert_eq!(chart.node(review).parent, Some(open));
        assert!(chart.node(review).is_leaf());
    }

    #[test]
    fn test_guard_short_form() {
        let chart = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/A",
            "nodes": [
                {"id": "R/A", "out-transitions": [{"guard": "go", "to": "R/B"}]},
                {"id": "R/B"}
            ]
        }))
        .unwrap();

        let a = chart.handle("R/A").unwrap();
        let guard = &chart.node(a).transitions[0].guard;
        assert_eq!(guard.event.as_deref(), Some("go"));
        assert!(guard.predicate.is_none());
    }

    #[test]
    fn test_path_and_lca() {
        let chart = StateChart::from_json(&sample_chart()).unwrap();
        let review = chart.handle("Order/Open/Review").unwrap();
        let hold = chart.handle("Order/Open/Hold").unwrap();
        let new = chart.handle("Order/New").unwrap();
        let open = chart.handle("Order/Open").unwrap();

        let path: Vec<&str> = chart
            .path_from_root(review)
            .iter()
            .map(|&h| chart.node(h).id.as_str())
            .collect();
        assert_eq!(path, vec!["Order", "Order/Open", "Order/Open/Review"]);

        assert_eq!(chart.lca(review, hold), open);
        assert_eq!(chart.lca(review, new), chart.root());
        assert_eq!(chart.lca(review, review), review);
        assert_eq!(chart.lca(review, open), open);
    }

    #[test]
    fn test_initial_leaf() {
        let chart = StateChart::from_json(&sample_chart()).unwrap();
        let open = chart.handle("Order/Open").unwrap();
        let review = chart.handle("Order/Open/Review").unwrap();

        assert_eq!(chart.initial_leaf(chart.root()).unwrap(), chart.handle("Order/New").unwrap());
        assert_eq!(chart.initial_leaf(open).unwrap(), review);
        assert_eq!(chart.initial_leaf(review).unwrap(), review);
    }

    #[test]
    fn test_missing_start_node_rejected() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "nodes": [{"id": "R/A"}]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_start_node_must_be_child() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/A/Deep",
            "nodes": [
                {"id": "R/A", "start-node": "R/A/Deep", "nodes": [{"id": "R/A/Deep"}]}
            ]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_inconsistent_child_id_rejected() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "Other/A",
            "nodes": [{"id": "Other/A"}]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_unknown_transition_target_rejected() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/A",
            "nodes": [
                {"id": "R/A", "out-transitions": [{"guard": "go", "to": "R/Missing"}]}
            ]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_empty_guard_rejected() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "start-node": "R/A",
            "nodes": [
                {"id": "R/A", "out-transitions": [{"guard": {}, "to": "R/A"}]}
            ]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "attributes": [
                {"name": "n", "type": "integer", "value": 0},
                {"name": "n", "type": "string", "value": "x"}
            ]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_variable_type_mismatch_rejected() {
        let result = StateChart::from_json(&json!({
            "id": "R",
            "attributes": [{"name": "n", "type": "integer", "value": "zero"}]
        }));
        assert!(matches!(result, Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_invalid_id_syntax_rejected() {
        for id in ["", "/leading", "Order//Gap", "Order/bad segment"] {
            let result = StateChart::from_json(&json!({"id": id}));
            assert!(
                matches!(result, Err(CoreError::InvalidChart { .. })),
                "id '{}' should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_checksum_detects_changes() {
        let a = StateChart::from_json(&sample_chart()).unwrap();
        let b = StateChart::from_json(&sample_chart()).unwrap();
        assert_eq!(a.checksum(), b.checksum());

        let mut changed = sample_chart();
        changed["description"] = json!("different");
        let c = StateChart::from_json(&changed).unwrap();
        assert_ne!(a.checksum(), c.checksum());
    }
}
