//! # statechart-core
//!
//! Hierarchical statechart execution engine.
//!
//! This crate provides:
//! - Chart definition parsing, validation, and arena indexing
//! - Node-scoped variable bindings with lexical-style visibility
//! - Transition resolution with innermost-first priority
//! - Entry/exit sequencing, transition firing, and condition-transition
//!   stabilization
//! - The capability seam through which hosts supply actions and predicates

pub mod capability;
pub mod chart;
pub mod error;
pub mod exec;
pub mod instance;
pub mod resolve;
pub mod value;
pub mod vars;

pub use capability::{
    CapabilityError, CapabilityInfo, CapabilityRegistry, CapabilitySet, ParameterSpec,
};
pub use chart::{NodeHandle, NodeRaw, StateChart};
pub use error::CoreError;
pub use exec::Executor;
pub use instance::{Instance, MachineState};
pub use resolve::Trigger;
pub use value::{Value, ValueType};
pub use vars::VariableStore;
