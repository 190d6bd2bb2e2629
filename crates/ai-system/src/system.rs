use std::collections::BTreeMap;

use ai_core::{sense, Blackboard, EntityId, RangeQuery, Sensed, TickContext, Vec2, WorldMut};
use ai_goap::{
    ActionSpec, Definition, DefinitionOverrides, GoapCommands, GoapEntityState, GoapError,
    GoapSnapshot, PlanOutcome, Result, TickOutcome, DEFAULT_BINDING,
};
use ai_tools::{TraceEvent, TraceKind};

use crate::config::AiConfig;
use crate::scheduler::TickScheduler;

/// How an entity was initialised, so a reset can rebuild it.
#[derive(Debug, Clone)]
struct SpawnRecord {
    entity_type: String,
    overrides: Option<DefinitionOverrides>,
}

/// Owns the GOAP state of every entity in a simulation and ticks them in entity order.
pub struct AiSystem<W: WorldMut + 'static> {
    // Dropped before `prototypes`: entity states hold handler handles shared with them.
    entities: BTreeMap<W::Entity, GoapEntityState<W>>,
    spawns: BTreeMap<W::Entity, SpawnRecord>,
    prototypes: BTreeMap<String, Definition<W>>,
    config: AiConfig,
    scheduler: TickScheduler,
    commands: GoapCommands<W::Entity>,
    paused: bool,
}

impl<W: WorldMut + 'static> AiSystem<W> {
    pub fn new(config: AiConfig) -> Self {
        let scheduler = TickScheduler::new(config.ai_tick_rate_seconds);
        Self {
            entities: BTreeMap::new(),
            spawns: BTreeMap::new(),
            prototypes: BTreeMap::new(),
            config,
            scheduler,
            commands: GoapCommands::new(),
            paused: false,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn set_tick_rate(&mut self, seconds: f32) {
        self.config.ai_tick_rate_seconds = seconds;
        self.scheduler.set_interval(seconds);
    }

    /// Registers `definition` as the prototype of every entity type it declares.
    pub fn register_definition(&mut self, definition: Definition<W>) {
        let types: Vec<String> = definition.data.entity_types.keys().cloned().collect();
        for entity_type in types {
            self.register_prototype(entity_type, definition.clone());
        }
    }

    /// Registers (or replaces) the prototype for one entity type.
    pub fn register_prototype(&mut self, entity_type: impl Into<String>, definition: Definition<W>) {
        let entity_type = entity_type.into();
        tracing::debug!(
            entity_type = %entity_type,
            actions = definition.data.actions.len(),
            "prototype registered"
        );
        self.prototypes.insert(entity_type, definition);
    }

    pub fn prototype(&self, entity_type: &str) -> Option<&Definition<W>> {
        self.prototypes.get(entity_type)
    }

    pub fn prototype_types(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    /// Creates (or recreates) the GOAP state of `entity` from the prototype of `entity_type`.
    ///
    /// A definition that fails to load still leaves a dirty state attached, so debug queries
    /// can show what went wrong.
    pub fn init(
        &mut self,
        world: &mut W,
        entity: W::Entity,
        entity_type: &str,
        overrides: Option<DefinitionOverrides>,
    ) -> Result<Option<PlanOutcome>> {
        let Some(prototype) = self.prototypes.get(entity_type) else {
            tracing::error!(entity = entity.stable_id(), entity_type, "unknown entity type");
            return Err(GoapError::UnknownType(entity_type.to_string()));
        };
        let mut definition = match &overrides {
            Some(overrides) => prototype.with_overrides(overrides),
            None => prototype.clone(),
        };
        self.apply_default_blackboard_init(entity_type, &mut definition);

        if let Some(mut previous) = self.entities.remove(&entity) {
            previous.teardown();
        }
        self.spawns.insert(
            entity,
            SpawnRecord {
                entity_type: entity_type.to_string(),
                overrides,
            },
        );

        let tick = self.scheduler.last();
        let mut state = GoapEntityState::new(entity_type, definition, &self.config.goap);
        if let Err(err) = state.load_definition() {
            tracing::error!(entity = entity.stable_id(), entity_type, error = %err, "GOAP init failed");
            let event = TraceEvent::new(TraceKind::PlanFailed, entity.stable_id(), "init failed")
                .at(tick.tick, tick.time_seconds)
                .with_extra("error", &err);
            state.push_trace(event);
            self.entities.insert(entity, state);
            return Err(err);
        }

        let outcome = state.initialize(entity, world, &tick, &mut self.commands);
        tracing::info!(
            entity = entity.stable_id(),
            entity_type,
            atoms = state.atoms().len(),
            actions = state.planner().actions().len(),
            "GOAP entity initialised"
        );
        self.entities.insert(entity, state);
        self.apply_interrupts(world, &tick);
        Ok(outcome)
    }

    fn apply_default_blackboard_init(&self, entity_type: &str, definition: &mut Definition<W>) {
        let default_key = self.config.default_blackboard_init.as_str();
        let inits = &mut definition.bindings.blackboard_init;
        if default_key == DEFAULT_BINDING || inits.contains_key(entity_type) {
            return;
        }
        if let Some(init) = inits.get(default_key).cloned() {
            inits.insert(entity_type.to_string(), init);
        }
    }

    /// Drops the GOAP state of `entity`. Returns whether it had one.
    pub fn destroy(&mut self, entity: W::Entity) -> bool {
        self.spawns.remove(&entity);
        match self.entities.remove(&entity) {
            Some(mut state) => {
                state.teardown();
                tracing::debug!(entity = entity.stable_id(), "GOAP state destroyed");
                true
            }
            None => false,
        }
    }

    /// Destroys every entity state, then the prototype table.
    pub fn shutdown(&mut self) {
        let count = self.entities.len();
        for (_, mut state) in std::mem::take(&mut self.entities) {
            state.teardown();
        }
        self.spawns.clear();
        self.prototypes.clear();
        self.commands = GoapCommands::new();
        tracing::info!(entities = count, "AI system shut down");
    }

    pub fn contains(&self, entity: W::Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// GOAP entities in tick order.
    pub fn entities(&self) -> impl Iterator<Item = W::Entity> + '_ {
        self.entities.keys().copied()
    }

    pub fn entity_state(&self, entity: W::Entity) -> Option<&GoapEntityState<W>> {
        self.entities.get(&entity)
    }

    /// Feeds frame time to the scheduler and, when a tick is due, ticks every entity.
    ///
    /// A latched reset is applied first. Entities the world reports as invalid are destroyed
    /// instead of ticked. Returns the dispatched tick, if any.
    pub fn update_all(&mut self, world: &mut W, dt_seconds: f32) -> Option<TickContext> {
        if self.paused {
            return None;
        }
        let tick = self.scheduler.advance(dt_seconds)?;

        if self.commands.take_reset() {
            self.reset_all(world);
        }

        let entities: Vec<W::Entity> = self.entities.keys().copied().collect();
        for entity in entities {
            if !world.is_valid(entity) {
                self.destroy(entity);
                continue;
            }
            if let Some(state) = self.entities.get_mut(&entity) {
                state.tick(entity, world, &tick, &mut self.commands);
            }
            self.apply_interrupts(world, &tick);
        }
        Some(tick)
    }

    /// Runs the executor once for `entity`, outside the scheduler.
    pub fn tick_entity(
        &mut self,
        world: &mut W,
        entity: W::Entity,
        dt_seconds: f32,
    ) -> Result<TickOutcome> {
        let last = self.scheduler.last();
        let tick = TickContext::new(last.tick, dt_seconds, last.time_seconds);
        let state = self
            .entities
            .get_mut(&entity)
            .ok_or(GoapError::UnknownEntity(entity.stable_id()))?;
        let outcome = state.tick(entity, world, &tick, &mut self.commands);
        self.apply_interrupts(world, &tick);
        Ok(outcome)
    }

    fn apply_interrupts(&mut self, world: &mut W, tick: &TickContext) {
        for entity in self.commands.take_interrupts() {
            match self.entities.get_mut(&entity) {
                Some(state) => {
                    state.interrupt(entity, world, tick, &mut self.commands);
                }
                None => {
                    tracing::warn!(entity = entity.stable_id(), "interrupt for entity without GOAP state");
                }
            }
        }
    }

    fn reset_all(&mut self, world: &mut W) {
        let spawns: Vec<(W::Entity, SpawnRecord)> = self
            .spawns
            .iter()
            .map(|(entity, spawn)| (*entity, spawn.clone()))
            .collect();
        tracing::info!(entities = spawns.len(), "resetting all GOAP entities");

        for (entity, spawn) in spawns {
            if let Err(err) = self.init(world, entity, &spawn.entity_type, spawn.overrides) {
                tracing::warn!(entity = entity.stable_id(), error = %err, "re-init failed during reset");
            }
        }
    }

    fn state(&self, entity: W::Entity) -> Result<&GoapEntityState<W>> {
        self.entities
            .get(&entity)
            .ok_or(GoapError::UnknownEntity(entity.stable_id()))
    }

    fn state_mut(&mut self, entity: W::Entity) -> Result<&mut GoapEntityState<W>> {
        self.entities
            .get_mut(&entity)
            .ok_or(GoapError::UnknownEntity(entity.stable_id()))
    }

    // World state and goal

    pub fn set_worldstate(&mut self, entity: W::Entity, atom: &str, value: bool) -> Result<()> {
        self.state_mut(entity)?.set_worldstate(atom, value)
    }

    /// Writes `atom` only if it is already known; other atoms are untouched.
    pub fn patch_worldstate(&mut self, entity: W::Entity, atom: &str, value: bool) -> Result<bool> {
        Ok(self.state_mut(entity)?.patch_worldstate(atom, value))
    }

    pub fn get_worldstate(&self, entity: W::Entity, atom: &str) -> Result<Option<bool>> {
        self.state(entity)?.get_worldstate(atom)
    }

    pub fn set_goal<I, S>(&mut self, entity: W::Entity, goal: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        self.state_mut(entity)?.set_goal(goal)
    }

    pub fn patch_goal<I, S>(&mut self, entity: W::Entity, goal: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        self.state_mut(entity)?.patch_goal(goal)
    }

    pub fn blackboard(&self, entity: W::Entity) -> Result<&Blackboard> {
        Ok(self.state(entity)?.blackboard())
    }

    pub fn blackboard_mut(&mut self, entity: W::Entity) -> Result<&mut Blackboard> {
        Ok(self.state_mut(entity)?.blackboard_mut())
    }

    // Sensing

    pub fn position(&self, world: &W, entity: W::Entity) -> Option<Vec2> {
        sense::position(world, entity)
    }

    pub fn distance(&self, world: &W, a: W::Entity, b: W::Entity) -> Option<f32> {
        sense::distance(world, a, b)
    }

    pub fn nearest(&self, world: &W, entity: W::Entity, radius: f32) -> Option<Sensed<W::Entity>> {
        sense::nearest(world, entity, radius)
    }

    pub fn nearest_matching<F>(
        &self,
        world: &W,
        entity: W::Entity,
        radius: f32,
        filter: F,
    ) -> Option<Sensed<W::Entity>>
    where
        F: FnMut(W::Entity) -> bool,
    {
        sense::nearest_matching(world, entity, radius, filter)
    }

    pub fn all_in_range(
        &self,
        world: &W,
        entity: W::Entity,
        radius: f32,
        query: &RangeQuery,
    ) -> Vec<Sensed<W::Entity>> {
        sense::all_in_range(world, entity, radius, query)
    }

    // Commands

    /// Aborts the running action, drops the plan and selects a fresh goal right away.
    pub fn force_interrupt(&mut self, world: &mut W, entity: W::Entity) -> Result<Option<PlanOutcome>> {
        let tick = self.scheduler.last();
        let state = self
            .entities
            .get_mut(&entity)
            .ok_or(GoapError::UnknownEntity(entity.stable_id()))?;
        let outcome = state.interrupt(entity, world, &tick, &mut self.commands);
        self.apply_interrupts(world, &tick);
        Ok(outcome)
    }

    /// Replaces (or with `merge`, patches) the goal and replans immediately.
    pub fn replan_to_goal<I, S>(
        &mut self,
        world: &mut W,
        entity: W::Entity,
        goal: I,
        merge: bool,
    ) -> Result<PlanOutcome>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let tick = self.scheduler.last();
        let state = self
            .entities
            .get_mut(&entity)
            .ok_or(GoapError::UnknownEntity(entity.stable_id()))?;
        let goal = state.encode(goal)?;
        let outcome = state.replan_to_goal(entity, world, &tick, &mut self.commands, goal, merge);
        self.apply_interrupts(world, &tick);
        Ok(outcome)
    }

    /// Swaps the action set of a live entity. The entity replans on its next tick.
    pub fn reload_actions(&mut self, entity: W::Entity, actions: &[ActionSpec]) -> Result<()> {
        let tick = self.scheduler.last();
        let state = self.state_mut(entity)?;
        if let Err(err) = state.load_actions(actions) {
            let event = TraceEvent::new(TraceKind::PlanFailed, entity.stable_id(), "reload failed")
                .at(tick.tick, tick.time_seconds)
                .with_extra("error", &err);
            state.push_trace(event);
            return Err(err);
        }
        Ok(())
    }

    pub fn pause_ai_system(&mut self) {
        if !self.paused {
            tracing::info!("AI system paused");
        }
        self.paused = true;
    }

    pub fn resume_ai_system(&mut self) {
        if self.paused {
            tracing::info!("AI system resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Re-initialises every GOAP entity at the start of the next scheduled tick.
    pub fn request_reset(&mut self) {
        tracing::debug!("AI system reset requested");
        self.commands.request_reset();
    }

    pub fn reset_requested(&self) -> bool {
        self.commands.reset_requested()
    }

    // Debug queries

    /// Current state and goal, one `state:` and one `goal:` line.
    pub fn dump_worldstate(&self, entity: W::Entity) -> Result<String> {
        let state = self.state(entity)?;
        Ok(format!(
            "state: {}\ngoal: {}",
            state.describe_worldstate(),
            state.describe_goal()
        ))
    }

    pub fn dump_plan(&self, entity: W::Entity) -> Result<String> {
        Ok(self.state(entity)?.describe_plan())
    }

    /// Registered atom names in bit order.
    pub fn get_all_atoms(&self, entity: W::Entity) -> Result<Vec<String>> {
        Ok(self.state(entity)?.atoms().names().to_vec())
    }

    pub fn has_plan(&self, entity: W::Entity) -> Result<bool> {
        Ok(self.state(entity)?.has_plan())
    }

    pub fn dump_blackboard(&self, entity: W::Entity) -> Result<String> {
        Ok(self.state(entity)?.blackboard().dump())
    }

    /// The newest `n` trace events, oldest first.
    pub fn get_trace_events(&self, entity: W::Entity, n: usize) -> Result<Vec<TraceEvent>> {
        Ok(self.state(entity)?.trace().recent(n))
    }

    pub fn get_goap_state(&self, entity: W::Entity) -> Result<GoapSnapshot> {
        Ok(self.state(entity)?.snapshot())
    }

    pub fn clear_trace(&mut self, entity: W::Entity) -> Result<()> {
        self.state_mut(entity)?.clear_trace();
        Ok(())
    }

    /// Records a goal choice made outside a goal selector.
    pub fn report_goal_selection(&mut self, entity: W::Entity, goal: &str, reason: &str) -> Result<()> {
        let tick = self.scheduler.last();
        let event = TraceEvent::new(TraceKind::GoalSelected, entity.stable_id(), goal)
            .at(tick.tick, tick.time_seconds)
            .with_extra("reason", reason);
        self.state_mut(entity)?.push_trace(event);
        Ok(())
    }
}

impl<W: WorldMut + 'static> Default for AiSystem<W> {
    fn default() -> Self {
        Self::new(AiConfig::default())
    }
}
