use ai_core::sense::{self, RangeQuery, Sensed};
use ai_core::{Blackboard, EntityId, TickContext, Vec2, WorldMut};
use ai_tools::{TraceBuffer, TraceEvent, TraceKind};

use crate::error::Result;
use crate::planner::ActionPlanner;
use crate::worldstate::{AtomRegistry, WorldState};

/// Requests that outlive the handler call that made them.
///
/// Interrupts are applied by the owner of the entity table once the current entity's tick has
/// returned; a reset is latched and applied before the next scheduled tick.
#[derive(Debug)]
pub struct GoapCommands<E> {
    reset_requested: bool,
    interrupts: Vec<E>,
}

impl<E: EntityId> GoapCommands<E> {
    pub fn new() -> Self {
        Self {
            reset_requested: false,
            interrupts: Vec::new(),
        }
    }

    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Clears the latch, returning whether it was set.
    pub fn take_reset(&mut self) -> bool {
        core::mem::take(&mut self.reset_requested)
    }

    pub fn request_interrupt(&mut self, entity: E) {
        if !self.interrupts.contains(&entity) {
            self.interrupts.push(entity);
        }
    }

    pub fn take_interrupts(&mut self) -> Vec<E> {
        core::mem::take(&mut self.interrupts)
    }
}

impl<E: EntityId> Default for GoapCommands<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an authored handler may touch while it runs for one entity.
pub struct GoapContext<'a, W: WorldMut + 'static> {
    pub(crate) entity: W::Entity,
    pub(crate) entity_type: &'a str,
    pub(crate) tick: TickContext,
    pub(crate) world: &'a mut W,
    pub(crate) planner: &'a mut ActionPlanner,
    pub(crate) current: &'a mut WorldState,
    pub(crate) goal: &'a mut WorldState,
    pub(crate) blackboard: &'a mut Blackboard,
    pub(crate) trace: &'a mut TraceBuffer,
    pub(crate) commands: &'a mut GoapCommands<W::Entity>,
    pub(crate) goal_reported: bool,
}

impl<'a, W: WorldMut + 'static> GoapContext<'a, W> {
    pub fn entity(&self) -> W::Entity {
        self.entity
    }

    pub fn entity_type(&self) -> &str {
        self.entity_type
    }

    pub fn tick(&self) -> &TickContext {
        &self.tick
    }

    pub fn dt(&self) -> f32 {
        self.tick.dt_seconds
    }

    pub fn world(&self) -> &W {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut *self.world
    }

    pub fn blackboard(&self) -> &Blackboard {
        &*self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut *self.blackboard
    }

    pub fn atoms(&self) -> &AtomRegistry {
        self.planner.atoms()
    }

    pub fn worldstate(&self) -> WorldState {
        *self.current
    }

    pub fn goal(&self) -> WorldState {
        *self.goal
    }

    /// Writes one atom of the current world state.
    pub fn set_worldstate(&mut self, atom: &str, value: bool) -> Result<()> {
        self.planner.atoms_mut().set(&mut *self.current, atom, value)
    }

    /// Writes one atom if it is already known; returns whether it was written.
    pub fn patch_worldstate(&mut self, atom: &str, value: bool) -> bool {
        match self.planner.atoms().index_of(atom) {
            Some(idx) => {
                self.current.set_bit(idx, value);
                true
            }
            None => false,
        }
    }

    /// `Ok(None)` when the atom is known but unspecified.
    pub fn get_worldstate(&self, atom: &str) -> Result<Option<bool>> {
        self.planner.atoms().get(&*self.current, atom)
    }

    /// Replaces the goal with exactly the given atoms.
    pub fn set_goal<I, S>(&mut self, goal: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        *self.goal = self.planner.atoms_mut().encode(goal)?;
        Ok(())
    }

    /// Merges the given atoms into the goal, keeping the others.
    pub fn patch_goal<I, S>(&mut self, goal: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let patch = self.planner.atoms_mut().encode(goal)?;
        *self.goal = self.goal.apply(&patch);
        Ok(())
    }

    pub fn clear_goal(&mut self) {
        self.goal.clear();
    }

    pub fn describe_worldstate(&self) -> String {
        self.planner.atoms().describe(&*self.current)
    }

    /// Records which goal was chosen and why.
    pub fn report_goal_selection(&mut self, goal: &str, reason: &str) {
        self.goal_reported = true;
        let event = TraceEvent::new(TraceKind::GoalSelected, self.entity.stable_id(), goal)
            .at(self.tick.tick, self.tick.time_seconds)
            .with_extra("reason", reason);
        self.trace.push(event);
    }

    pub fn trace(&mut self, kind: TraceKind, message: impl Into<String>) {
        let event = TraceEvent::new(kind, self.entity.stable_id(), message)
            .at(self.tick.tick, self.tick.time_seconds);
        self.trace.push(event);
    }

    pub fn request_reset(&mut self) {
        self.commands.request_reset();
    }

    pub fn request_interrupt(&mut self, entity: W::Entity) {
        self.commands.request_interrupt(entity);
    }

    pub fn position(&self) -> Option<Vec2> {
        sense::position(&*self.world, self.entity)
    }

    pub fn distance_to(&self, other: W::Entity) -> Option<f32> {
        sense::distance(&*self.world, self.entity, other)
    }

    pub fn nearest(&self, radius: f32) -> Option<Sensed<W::Entity>> {
        sense::nearest(&*self.world, self.entity, radius)
    }

    pub fn nearest_matching<F>(&self, radius: f32, filter: F) -> Option<Sensed<W::Entity>>
    where
        F: FnMut(W::Entity) -> bool,
    {
        sense::nearest_matching(&*self.world, self.entity, radius, filter)
    }

    pub fn all_in_range(&self, radius: f32, query: &RangeQuery) -> Vec<Sensed<W::Entity>> {
        sense::all_in_range(&*self.world, self.entity, radius, query)
    }
}
