use core::fmt::Write as _;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use ai_core::{Blackboard, WorldMut};
use ai_tools::{TraceBuffer, TraceEvent};
use serde::Serialize;

use crate::config::GoapConfig;
use crate::definition::{ActionSpec, Definition, EntityTypeSpec};
use crate::error::{GoapError, Result};
use crate::handlers::{ActionHandlers, ActionTask};
use crate::planner::{ActionPlanner, Plan, PlanOutcome};
use crate::worldstate::{AtomRegistry, WorldState};

/// Lifecycle of one queued action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionPhase {
    Created,
    Running,
    /// Running, with an update task parked mid-way.
    Suspended,
    Succeeded,
    Failed,
    Aborted,
}

/// One step of the running plan.
pub struct ActionRecord<W: WorldMut + 'static> {
    pub(crate) name: String,
    /// Position of this action in the plan it was queued from.
    pub(crate) plan_index: usize,
    pub(crate) handlers: Rc<dyn ActionHandlers<W>>,
    pub(crate) task: Option<Box<dyn ActionTask<W>>>,
    pub(crate) post: WorldState,
    pub(crate) watch_mask: u64,
    pub(crate) phase: ActionPhase,
}

impl<W: WorldMut + 'static> ActionRecord<W> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan_index(&self) -> usize {
        self.plan_index
    }

    pub fn post(&self) -> WorldState {
        self.post
    }

    pub fn watch_mask(&self) -> u64 {
        self.watch_mask
    }

    pub fn phase(&self) -> ActionPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, ActionPhase::Running | ActionPhase::Suspended)
    }
}

/// Serializable view of an entity's planning state for debug tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoapSnapshot {
    pub entity_type: String,
    pub current: BTreeMap<String, bool>,
    pub goal: BTreeMap<String, bool>,
    pub plan: Vec<String>,
    pub plan_cost: i32,
    pub current_action_index: usize,
    pub current_action: Option<String>,
    pub current_action_phase: Option<ActionPhase>,
    pub retries: u32,
    pub max_retries: u32,
    pub dirty: bool,
    pub actionset_version: u32,
    pub atom_schema_version: u32,
    pub blackboard_keys: Vec<String>,
    pub trace_len: usize,
}

/// Planning and execution state of one GOAP-driven entity.
pub struct GoapEntityState<W: WorldMut + 'static> {
    pub(crate) entity_type: String,
    pub(crate) definition: Definition<W>,
    pub(crate) planner: ActionPlanner,
    pub(crate) current_state: WorldState,
    pub(crate) cached_current_state: WorldState,
    pub(crate) plan_start_state: WorldState,
    pub(crate) goal: WorldState,
    pub(crate) plan: Plan,
    pub(crate) current_action_index: usize,
    pub(crate) retries: u32,
    pub(crate) max_retries: u32,
    pub(crate) dirty: bool,
    pub(crate) queue: VecDeque<ActionRecord<W>>,
    pub(crate) blackboard: Blackboard,
    pub(crate) trace: TraceBuffer,
    pub(crate) actionset_version: u32,
    pub(crate) atom_schema_version: u32,
}

impl<W: WorldMut + 'static> GoapEntityState<W> {
    /// An empty, dirty state. Nothing is loaded until [`GoapEntityState::load_definition`].
    pub fn new(entity_type: impl Into<String>, definition: Definition<W>, config: &GoapConfig) -> Self {
        let atoms =
            AtomRegistry::new(config.atom_cap()).with_auto_register(config.auto_register_atoms);
        let planner = ActionPlanner::new(atoms).with_config(config.planner);
        let max_retries = definition.data.max_retries.unwrap_or(config.max_retries);
        let cap = config.planner.max_plan_len;

        Self {
            entity_type: entity_type.into(),
            definition,
            planner,
            current_state: WorldState::EMPTY,
            cached_current_state: WorldState::EMPTY,
            plan_start_state: WorldState::EMPTY,
            goal: WorldState::EMPTY,
            plan: Plan::not_found(cap),
            current_action_index: 0,
            retries: 0,
            max_retries,
            dirty: true,
            queue: VecDeque::new(),
            blackboard: Blackboard::new(),
            trace: TraceBuffer::new(config.trace_capacity),
            actionset_version: 0,
            atom_schema_version: 0,
        }
    }

    /// Loads the definition's action set and this entity type's initial state and goal.
    pub fn load_definition(&mut self) -> Result<()> {
        let type_spec = self
            .definition
            .entity_type(&self.entity_type)
            .cloned()
            .ok_or_else(|| GoapError::UnknownType(self.entity_type.clone()))?;
        let actions = self.definition.data.actions.clone();

        self.load_actions(&actions)?;
        self.load_worldstate(&type_spec)
    }

    /// Replaces the action set atomically.
    ///
    /// On success existing states are re-encoded into the new atom table, the queue is dropped
    /// and the entity is dirty. On failure nothing changes except the dirty flag.
    pub fn load_actions(&mut self, specs: &[ActionSpec]) -> Result<()> {
        match self.build_planner(specs) {
            Ok((planner, [current, cached, plan_start, goal])) => {
                self.planner = planner;
                self.definition.data.actions = specs.to_vec();
                self.current_state = current;
                self.cached_current_state = cached;
                self.plan_start_state = plan_start;
                self.goal = goal;
                self.queue.clear();
                self.plan = Plan::not_found(self.planner.config().max_plan_len);
                self.current_action_index = 0;
                self.retries = 0;
                self.dirty = true;
                self.actionset_version += 1;
                tracing::debug!(
                    entity_type = %self.entity_type,
                    actions = specs.len(),
                    atoms = self.planner.atoms().len(),
                    version = self.actionset_version,
                    "action set loaded"
                );
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                tracing::error!(entity_type = %self.entity_type, error = %err, "action set rejected");
                Err(err)
            }
        }
    }

    fn build_planner(&self, specs: &[ActionSpec]) -> Result<(ActionPlanner, [WorldState; 4])> {
        let old_atoms = self.planner.atoms();
        let atoms = AtomRegistry::new(old_atoms.cap()).with_auto_register(old_atoms.auto_register());
        let mut planner = ActionPlanner::new(atoms).with_config(self.planner.config());

        planner.add_specs(specs)?;

        let mut remapped = [WorldState::EMPTY; 4];
        let states = [
            self.current_state,
            self.cached_current_state,
            self.plan_start_state,
            self.goal,
        ];
        for (slot, state) in remapped.iter_mut().zip(states) {
            *slot = state.remap(old_atoms, planner.atoms_mut())?;
        }

        Ok((planner, remapped))
    }

    /// Replaces the current state and goal from an entity type's tables, atomically.
    pub fn load_worldstate(&mut self, spec: &EntityTypeSpec) -> Result<()> {
        let mut atoms = self.planner.atoms().clone();
        let mut encode = || -> Result<(WorldState, WorldState)> {
            let initial = atoms.encode_registering(spec.initial.iter().map(|(k, v)| (k, *v)))?;
            let goal = atoms.encode_registering(spec.goal.iter().map(|(k, v)| (k, *v)))?;
            Ok((initial, goal))
        };
        let loaded = encode();

        match loaded {
            Ok((initial, goal)) => {
                self.planner.replace_atoms(atoms);
                self.current_state = initial;
                self.cached_current_state = initial;
                self.plan_start_state = initial;
                self.goal = goal;
                self.atom_schema_version += 1;
                tracing::debug!(
                    entity_type = %self.entity_type,
                    state = %self.planner.atoms().describe(&initial),
                    goal = %self.planner.atoms().describe(&goal),
                    "world state loaded"
                );
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                tracing::error!(entity_type = %self.entity_type, error = %err, "world state rejected");
                Err(err)
            }
        }
    }

    /// Recomputes the dirty flag from the current plan.
    pub fn check_and_set_dirty(&mut self) {
        self.dirty = self.plan.is_empty()
            || self.plan.cost < 0
            || self.plan.len() == self.planner.config().max_plan_len;
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn definition(&self) -> &Definition<W> {
        &self.definition
    }

    pub fn planner(&self) -> &ActionPlanner {
        &self.planner
    }

    pub fn atoms(&self) -> &AtomRegistry {
        self.planner.atoms()
    }

    pub fn current_state(&self) -> WorldState {
        self.current_state
    }

    pub fn cached_current_state(&self) -> WorldState {
        self.cached_current_state
    }

    pub fn plan_start_state(&self) -> WorldState {
        self.plan_start_state
    }

    pub fn goal(&self) -> WorldState {
        self.goal
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn plan_outcome(&self) -> PlanOutcome {
        self.plan.outcome()
    }

    pub fn current_action_index(&self) -> usize {
        self.current_action_index
    }

    pub fn current_action(&self) -> Option<&ActionRecord<W>> {
        self.queue.front()
    }

    pub fn queue(&self) -> impl Iterator<Item = &ActionRecord<W>> {
        self.queue.iter()
    }

    pub fn has_plan(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn actionset_version(&self) -> u32 {
        self.actionset_version
    }

    pub fn atom_schema_version(&self) -> u32 {
        self.atom_schema_version
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    pub fn push_trace(&mut self, event: TraceEvent) {
        self.trace.push(event);
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Writes one atom of the current state (registration follows the atom table's policy).
    pub fn set_worldstate(&mut self, atom: &str, value: bool) -> Result<()> {
        self.planner
            .atoms_mut()
            .set(&mut self.current_state, atom, value)
    }

    /// Writes one atom if it is already known; returns whether it was written.
    pub fn patch_worldstate(&mut self, atom: &str, value: bool) -> bool {
        match self.planner.atoms().index_of(atom) {
            Some(idx) => {
                self.current_state.set_bit(idx, value);
                true
            }
            None => false,
        }
    }

    pub fn get_worldstate(&self, atom: &str) -> Result<Option<bool>> {
        self.planner.atoms().get(&self.current_state, atom)
    }

    /// Replaces the goal. Takes effect at the next replan.
    pub fn set_goal<I, S>(&mut self, goal: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        self.goal = self.planner.atoms_mut().encode(goal)?;
        Ok(())
    }

    /// Merges atoms into the goal. Takes effect at the next replan.
    pub fn patch_goal<I, S>(&mut self, goal: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let patch = self.planner.atoms_mut().encode(goal)?;
        self.goal = self.goal.apply(&patch);
        Ok(())
    }

    /// Encodes name/value pairs against this entity's atom table.
    pub fn encode<I, S>(&mut self, pairs: I) -> Result<WorldState>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        self.planner.atoms_mut().encode(pairs)
    }

    pub fn describe_worldstate(&self) -> String {
        self.planner.atoms().describe(&self.current_state)
    }

    pub fn describe_goal(&self) -> String {
        self.planner.atoms().describe(&self.goal)
    }

    /// `plan cost = N` followed by one `i: name  expected-state` line per step.
    pub fn describe_plan(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "plan cost = {}", self.plan.cost);
        for (i, (name, state)) in self.plan.actions.iter().zip(&self.plan.states).enumerate() {
            let marker = if i == self.current_action_index && self.has_plan() {
                '>'
            } else {
                ' '
            };
            let _ = writeln!(
                out,
                "{marker}{i}: {name:<20}{}",
                self.planner.atoms().describe(state)
            );
        }
        out
    }

    pub fn snapshot(&self) -> GoapSnapshot {
        let atoms = self.planner.atoms();
        GoapSnapshot {
            entity_type: self.entity_type.clone(),
            current: atoms.to_map(&self.current_state),
            goal: atoms.to_map(&self.goal),
            plan: self.plan.actions.clone(),
            plan_cost: self.plan.cost,
            current_action_index: self.current_action_index,
            current_action: self.queue.front().map(|a| a.name.clone()),
            current_action_phase: self.queue.front().map(|a| a.phase),
            retries: self.retries,
            max_retries: self.max_retries,
            dirty: self.dirty,
            actionset_version: self.actionset_version,
            atom_schema_version: self.atom_schema_version,
            blackboard_keys: self.blackboard.keys().map(str::to_string).collect(),
            trace_len: self.trace.len(),
        }
    }

    /// Drops the queue, planner tables and handler references.
    pub fn teardown(&mut self) {
        self.queue.clear();
        self.planner.clear();
        self.blackboard.clear();
        self.plan = Plan::not_found(self.planner.config().max_plan_len);
        self.dirty = true;
    }
}
