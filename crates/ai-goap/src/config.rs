use serde::{Deserialize, Serialize};

use crate::planner::PlannerConfig;
use crate::worldstate::MAX_ATOMS;

/// Per-entity executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoapConfig {
    /// Atom slots available to each entity; clamped to [`MAX_ATOMS`].
    pub safe_atom_cap: usize,
    /// Let handlers write atoms that no action or state declared.
    pub auto_register_atoms: bool,
    /// Failed attempts an action may retry before the plan is dropped.
    pub max_retries: u32,
    /// Events kept in each entity's trace ring.
    pub trace_capacity: usize,
    pub planner: PlannerConfig,
}

impl GoapConfig {
    pub fn atom_cap(&self) -> usize {
        self.safe_atom_cap.min(MAX_ATOMS)
    }
}

impl Default for GoapConfig {
    fn default() -> Self {
        Self {
            safe_atom_cap: MAX_ATOMS,
            auto_register_atoms: false,
            max_retries: 3,
            trace_capacity: ai_tools::DEFAULT_TRACE_CAPACITY,
            planner: PlannerConfig::default(),
        }
    }
}
