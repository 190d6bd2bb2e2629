//! Deterministic goal-oriented action planning.
//!
//! - [`worldstate`]: bit-packed boolean world states and the atom table.
//! - [`planner`]: A* search over authored actions.
//! - [`definition`]: authored action/type data plus the callables bound to it.
//! - [`GoapEntityState`]: per-entity planning state driven by the executor protocol.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod planner;
pub mod state;
pub mod worldstate;

pub use config::GoapConfig;
pub use context::{GoapCommands, GoapContext};
pub use definition::{
    ActionSpec, Bindings, Definition, DefinitionData, DefinitionOverrides, EntityTypeSpec,
    WatchSpec,
};
pub use error::{GoapError, Result};
pub use executor::{ReplanReason, TickOutcome, DEFAULT_BINDING};
pub use handlers::{
    task_fn, AbortReason, ActionHandlers, ActionTask, HandlerError, HandlerResult,
    ScriptedAction, TaskState,
};
pub use planner::{ActionPlanner, Plan, PlanOutcome, PlannerAction, PlannerConfig, MAX_ACTIONS};
pub use state::{ActionPhase, ActionRecord, GoapEntityState, GoapSnapshot};
pub use worldstate::{AtomRegistry, WorldState, MAX_ATOMS};
