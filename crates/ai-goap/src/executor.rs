//! The per-tick executor protocol.
//!
//! Each tick: run the front action, refresh world-state atoms through the updaters, replan when
//! a watched atom changed or the queue ran dry, then snapshot the state for the next tick's
//! change detection.

use std::rc::Rc;

use ai_core::{ActionStatus, EntityId, TickContext, WorldMut};
use ai_tools::{TraceEvent, TraceKind};

use crate::context::{GoapCommands, GoapContext};
use crate::handlers::{AbortReason, TaskState};
use crate::planner::PlanOutcome;
use crate::state::{ActionPhase, ActionRecord, GoapEntityState};
use crate::worldstate::WorldState;

/// Binding key used when an entity type has no goal selector or blackboard init of its own.
pub const DEFAULT_BINDING: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanReason {
    /// The queue was empty.
    QueueEmpty,
    RetriesExhausted,
    /// A watched atom of the running action changed.
    WorldStateChanged,
}

impl ReplanReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplanReason::QueueEmpty => "queue_empty",
            ReplanReason::RetriesExhausted => "retries_exhausted",
            ReplanReason::WorldStateChanged => "worldstate_changed",
        }
    }
}

/// What one executor tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    ActionSucceeded,
    ActionRetried,
    Replanned(ReplanReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunResult {
    NeedsPlan,
    Running,
    Succeeded,
    Retrying,
    RetriesExhausted,
}

struct Env<'w, W: WorldMut + 'static> {
    entity: W::Entity,
    world: &'w mut W,
    tick: TickContext,
    commands: &'w mut GoapCommands<W::Entity>,
    /// Set once the blackboard has been seeded during this call.
    blackboard_seeded: bool,
}

impl<'w, W: WorldMut + 'static> Env<'w, W> {
    fn new(
        entity: W::Entity,
        world: &'w mut W,
        tick: &TickContext,
        commands: &'w mut GoapCommands<W::Entity>,
    ) -> Self {
        Self {
            entity,
            world,
            tick: *tick,
            commands,
            blackboard_seeded: false,
        }
    }

    fn event(&self, kind: TraceKind, message: impl Into<String>) -> TraceEvent {
        TraceEvent::new(kind, self.entity.stable_id(), message)
            .at(self.tick.tick, self.tick.time_seconds)
    }
}

impl<W: WorldMut + 'static> GoapEntityState<W> {
    /// Seeds the blackboard, selects a goal and builds the first plan.
    pub fn initialize(
        &mut self,
        entity: W::Entity,
        world: &mut W,
        tick: &TickContext,
        commands: &mut GoapCommands<W::Entity>,
    ) -> Option<PlanOutcome> {
        let mut env = Env::new(entity, world, tick, commands);
        self.reset_blackboard_in(&mut env);
        self.select_goal_in(&mut env)
    }

    pub fn tick(
        &mut self,
        entity: W::Entity,
        world: &mut W,
        tick: &TickContext,
        commands: &mut GoapCommands<W::Entity>,
    ) -> TickOutcome {
        let span = tracing::debug_span!("goap_tick", entity = entity.stable_id(), tick = tick.tick);
        let _guard = span.enter();
        let mut env = Env::new(entity, world, tick, commands);

        // Writes made by other code since the last snapshot count as external changes.
        let external = self.current_state.changed_bits(&self.cached_current_state);

        let run = self.run_action_queue(&mut env);
        let state_after_action = self.current_state;
        self.run_worldstate_updaters(&mut env);

        // Changes made by the action itself (handlers, postconditions) never trigger a replan.
        let changed = external | state_after_action.changed_bits(&self.current_state);
        if changed != 0 {
            let names = self.planner.atoms().describe_bits(changed).join(",");
            tracing::debug!(changed = %names, "world state changed");
            let event = env
                .event(TraceKind::WorldStateChange, names)
                .with_extra("state", self.describe_worldstate());
            self.trace.push(event);
        }

        let watched = self
            .queue
            .front()
            .map_or(0, |front| front.watch_mask & changed);

        let outcome = if watched != 0 {
            let names = self.planner.atoms().describe_bits(watched).join(",");
            tracing::info!(atoms = %names, "watched atoms changed, replanning");
            self.abort_front(&mut env, AbortReason::WorldStateChanged);
            self.queue.clear();
            self.dirty = true;
            let event = env
                .event(TraceKind::Replan, "watched atoms changed")
                .with_extra("reason", ReplanReason::WorldStateChanged.as_str())
                .with_extra("atoms", names);
            self.trace.push(event);
            self.select_goal_in(&mut env);
            TickOutcome::Replanned(ReplanReason::WorldStateChanged)
        } else {
            match run {
                RunResult::NeedsPlan => {
                    self.select_goal_in(&mut env);
                    TickOutcome::Replanned(ReplanReason::QueueEmpty)
                }
                RunResult::RetriesExhausted => {
                    self.select_goal_in(&mut env);
                    TickOutcome::Replanned(ReplanReason::RetriesExhausted)
                }
                RunResult::Running => TickOutcome::Running,
                RunResult::Succeeded => TickOutcome::ActionSucceeded,
                RunResult::Retrying => TickOutcome::ActionRetried,
            }
        };

        self.cached_current_state = self.current_state;
        outcome
    }

    /// Plans from the current state to the current goal and starts the first action.
    pub fn replan(
        &mut self,
        entity: W::Entity,
        world: &mut W,
        tick: &TickContext,
        commands: &mut GoapCommands<W::Entity>,
    ) -> PlanOutcome {
        let mut env = Env::new(entity, world, tick, commands);
        self.abort_front(&mut env, AbortReason::Replan);
        self.replan_in(&mut env)
    }

    /// Replaces (or, with `merge`, patches) the goal and replans immediately.
    pub fn replan_to_goal(
        &mut self,
        entity: W::Entity,
        world: &mut W,
        tick: &TickContext,
        commands: &mut GoapCommands<W::Entity>,
        goal: WorldState,
        merge: bool,
    ) -> PlanOutcome {
        let mut env = Env::new(entity, world, tick, commands);
        self.goal = if merge { self.goal.apply(&goal) } else { goal };

        let event = env
            .event(TraceKind::Replan, "explicit goal")
            .with_extra("reason", "explicit_goal")
            .with_extra("goal", self.describe_goal());
        self.trace.push(event);

        self.abort_front(&mut env, AbortReason::Replan);
        self.queue.clear();
        self.dirty = true;
        self.replan_in(&mut env)
    }

    /// Aborts the running action, drops the plan, re-seeds the blackboard and selects a new goal.
    pub fn interrupt(
        &mut self,
        entity: W::Entity,
        world: &mut W,
        tick: &TickContext,
        commands: &mut GoapCommands<W::Entity>,
    ) -> Option<PlanOutcome> {
        let mut env = Env::new(entity, world, tick, commands);
        let action = self
            .queue
            .front()
            .map_or_else(|| "-".to_string(), |front| front.name.clone());
        tracing::info!(action = %action, "interrupt");
        let event = env
            .event(TraceKind::Interrupt, "interrupt")
            .with_extra("action", action);
        self.trace.push(event);

        self.abort_front(&mut env, AbortReason::Interrupt);
        self.queue.clear();
        self.dirty = true;
        self.reset_blackboard_in(&mut env);
        self.select_goal_in(&mut env)
    }

    fn context<'a>(&'a mut self, env: &'a mut Env<'_, W>) -> GoapContext<'a, W> {
        GoapContext {
            entity: env.entity,
            entity_type: &self.entity_type,
            tick: env.tick,
            world: &mut *env.world,
            planner: &mut self.planner,
            current: &mut self.current_state,
            goal: &mut self.goal,
            blackboard: &mut self.blackboard,
            trace: &mut self.trace,
            commands: &mut *env.commands,
            goal_reported: false,
        }
    }

    fn run_action_queue(&mut self, env: &mut Env<'_, W>) -> RunResult {
        let Some(front) = self.queue.front_mut() else {
            return RunResult::NeedsPlan;
        };

        if !front.is_running() {
            return if self.start_front(env) {
                RunResult::Running
            } else {
                self.fail_front(env)
            };
        }

        let handlers = Rc::clone(&front.handlers);
        let name = front.name.clone();
        let mut task = front.task.take().unwrap_or_else(|| handlers.update());

        let polled = {
            let mut ctx = self.context(env);
            task.resume(&mut ctx)
        };

        match polled {
            Ok(TaskState::Yielded) => {
                if let Some(front) = self.queue.front_mut() {
                    front.task = Some(task);
                    front.phase = ActionPhase::Suspended;
                }
                RunResult::Running
            }
            Ok(TaskState::Returned(ActionStatus::Running)) => {
                if let Some(front) = self.queue.front_mut() {
                    front.phase = ActionPhase::Running;
                }
                RunResult::Running
            }
            Ok(TaskState::Returned(ActionStatus::Success)) => self.complete_front(env),
            Ok(TaskState::Returned(ActionStatus::Failure)) => {
                tracing::debug!(action = %name, "action failed");
                let event = env
                    .event(TraceKind::ActionResult, name)
                    .with_extra("status", ActionStatus::Failure);
                self.trace.push(event);
                self.fail_front(env)
            }
            Err(err) => {
                tracing::warn!(action = %name, error = %err, "action update failed");
                let event = env
                    .event(TraceKind::ActionResult, name)
                    .with_extra("status", "ERROR")
                    .with_extra("error", &err);
                self.trace.push(event);
                self.fail_front(env)
            }
        }
    }

    fn start_front(&mut self, env: &mut Env<'_, W>) -> bool {
        let Some(front) = self.queue.front_mut() else {
            return false;
        };
        front.task = None;
        front.phase = ActionPhase::Created;
        let handlers = Rc::clone(&front.handlers);
        let name = front.name.clone();
        self.current_action_index = front.plan_index;

        let attempt = self.retries + 1;
        let event = env
            .event(TraceKind::ActionStart, name.clone())
            .with_extra("attempt", attempt);
        self.trace.push(event);

        let started = {
            let mut ctx = self.context(env);
            handlers.start(&mut ctx)
        };

        match started {
            Ok(()) => {
                if let Some(front) = self.queue.front_mut() {
                    front.phase = ActionPhase::Running;
                }
                tracing::debug!(action = %name, attempt, "action started");
                true
            }
            Err(err) => {
                if let Some(front) = self.queue.front_mut() {
                    front.phase = ActionPhase::Failed;
                }
                tracing::warn!(action = %name, error = %err, "action start failed");
                let event = env
                    .event(TraceKind::ActionResult, name)
                    .with_extra("status", ActionStatus::Failure)
                    .with_extra("error", &err);
                self.trace.push(event);
                false
            }
        }
    }

    fn complete_front(&mut self, env: &mut Env<'_, W>) -> RunResult {
        let Some(front) = self.queue.front_mut() else {
            return RunResult::NeedsPlan;
        };
        front.phase = ActionPhase::Succeeded;
        front.task = None;
        let handlers = Rc::clone(&front.handlers);
        let name = front.name.clone();
        let post = front.post;

        let finished = {
            let mut ctx = self.context(env);
            handlers.finish(&mut ctx)
        };

        self.current_state = self.current_state.apply(&post);
        tracing::debug!(action = %name, state = %self.describe_worldstate(), "action succeeded");

        let mut event = env
            .event(TraceKind::ActionResult, name.clone())
            .with_extra("status", ActionStatus::Success);
        if let Err(err) = finished {
            tracing::warn!(action = %name, error = %err, "action finish failed");
            event = event.with_extra("error", &err);
        }
        self.trace.push(event);

        self.queue.pop_front();
        self.retries = 0;
        self.current_action_index = self
            .queue
            .front()
            .map_or(self.plan.len(), |next| next.plan_index);

        if !self.queue.is_empty() && !self.start_front(env) {
            return self.fail_front(env);
        }
        RunResult::Succeeded
    }

    /// Retries the front action, or drops the plan once its retries are used up.
    fn fail_front(&mut self, env: &mut Env<'_, W>) -> RunResult {
        loop {
            let Some(front) = self.queue.front_mut() else {
                return RunResult::NeedsPlan;
            };
            front.task = None;

            if self.retries >= self.max_retries {
                front.phase = ActionPhase::Failed;
                let name = front.name.clone();
                tracing::info!(action = %name, retries = self.retries, "retries exhausted, dropping plan");
                let event = env
                    .event(TraceKind::Replan, format!("{name} failed"))
                    .with_extra("reason", ReplanReason::RetriesExhausted.as_str())
                    .with_extra("retries", self.retries);
                self.trace.push(event);
                self.queue.clear();
                self.dirty = true;
                return RunResult::RetriesExhausted;
            }

            self.retries += 1;
            tracing::debug!(
                action = %front.name,
                retry = self.retries,
                max_retries = self.max_retries,
                "retrying action"
            );
            if self.start_front(env) {
                return RunResult::Retrying;
            }
        }
    }

    fn abort_front(&mut self, env: &mut Env<'_, W>, reason: AbortReason) {
        let Some(front) = self.queue.front_mut() else {
            return;
        };
        if !front.is_running() {
            return;
        }
        front.phase = ActionPhase::Aborted;
        front.task = None;
        let handlers = Rc::clone(&front.handlers);
        let name = front.name.clone();

        let aborted = {
            let mut ctx = self.context(env);
            handlers.abort(&mut ctx, reason)
        };

        tracing::debug!(action = %name, reason = %reason, "action aborted");
        let mut event = env
            .event(TraceKind::ActionResult, name.clone())
            .with_extra("status", "ABORTED")
            .with_extra("reason", reason);
        if let Err(err) = aborted {
            tracing::warn!(action = %name, error = %err, "action abort failed");
            event = event.with_extra("error", &err);
        }
        self.trace.push(event);
    }

    fn run_worldstate_updaters(&mut self, env: &mut Env<'_, W>) {
        let updaters: Vec<_> = self
            .definition
            .bindings
            .worldstate_updaters
            .iter()
            .map(|(name, f)| (name.clone(), Rc::clone(f)))
            .collect();

        for (name, updater) in updaters {
            let result = {
                let mut ctx = self.context(env);
                updater(&mut ctx)
            };
            if let Err(err) = result {
                tracing::warn!(updater = %name, error = %err, "world state updater failed");
                let event = env
                    .event(TraceKind::WorldStateChange, format!("updater {name} failed"))
                    .with_extra("error", &err);
                self.trace.push(event);
            }
        }
    }

    fn reset_blackboard_in(&mut self, env: &mut Env<'_, W>) {
        self.blackboard.clear();
        env.blackboard_seeded = true;

        let bindings = &self.definition.bindings.blackboard_init;
        let Some(init) = bindings
            .get(&self.entity_type)
            .or_else(|| bindings.get(DEFAULT_BINDING))
            .cloned()
        else {
            return;
        };

        let result = {
            let mut ctx = self.context(env);
            init(&mut ctx)
        };
        if let Err(err) = result {
            tracing::warn!(entity_type = %self.entity_type, error = %err, "blackboard init failed");
        }
    }

    fn select_goal_in(&mut self, env: &mut Env<'_, W>) -> Option<PlanOutcome> {
        let selectors = &self.definition.bindings.goal_selectors;
        let selector = selectors
            .get(&self.entity_type)
            .or_else(|| selectors.get(DEFAULT_BINDING))
            .cloned();

        if let Some(selector) = selector {
            let (result, reported) = {
                let mut ctx = self.context(env);
                let result = selector(&mut ctx);
                (result, ctx.goal_reported)
            };

            if let Err(err) = result {
                tracing::error!(entity_type = %self.entity_type, error = %err, "goal selection failed");
                let event = env
                    .event(TraceKind::GoalSelected, "goal selection failed")
                    .with_extra("error", &err);
                self.trace.push(event);
                return None;
            }

            if !reported {
                let event = env.event(TraceKind::GoalSelected, self.describe_goal());
                self.trace.push(event);
            }
        }

        Some(self.replan_in(env))
    }

    fn replan_in(&mut self, env: &mut Env<'_, W>) -> PlanOutcome {
        self.queue.clear();
        self.plan = self.planner.plan(&self.current_state, &self.goal);
        self.current_action_index = 0;
        self.retries = 0;
        self.check_and_set_dirty();

        match self.plan.outcome() {
            PlanOutcome::AtGoal => {
                tracing::debug!(goal = %self.describe_goal(), "already at goal");
            }
            PlanOutcome::Found => self.begin_plan(env),
            outcome @ (PlanOutcome::NotFound | PlanOutcome::Truncated) => {
                self.handle_no_plan(env, outcome);
            }
        }

        self.plan.outcome()
    }

    fn begin_plan(&mut self, env: &mut Env<'_, W>) {
        if !env.blackboard_seeded {
            self.reset_blackboard_in(env);
        }
        self.fill_action_queue(env);

        let steps = self.plan.actions.join(" -> ");
        tracing::info!(cost = self.plan.cost, plan = %steps, "plan found");
        let event = env
            .event(TraceKind::PlanFound, steps)
            .with_extra("cost", self.plan.cost)
            .with_extra("size", self.plan.len())
            .with_extra("goal", self.describe_goal());
        self.trace.push(event);

        match self.queue.front() {
            Some(_) => {
                if !self.start_front(env) {
                    self.fail_front(env);
                }
            }
            None => self.current_action_index = self.plan.len(),
        }

        self.plan_start_state = self.current_state;
        self.cached_current_state = self.current_state;
    }

    fn fill_action_queue(&mut self, env: &Env<'_, W>) {
        let atoms = self.planner.atoms();
        for (plan_index, name) in self.plan.actions.iter().enumerate() {
            let Some(handlers) = self.definition.bindings.actions.get(name).cloned() else {
                tracing::error!(action = %name, plan_index, "planned action has no handlers, skipping");
                let event = env
                    .event(TraceKind::ActionResult, name.clone())
                    .with_extra("status", "SKIPPED")
                    .with_extra("reason", "no_handlers")
                    .with_extra("plan_index", plan_index);
                self.trace.push(event);
                continue;
            };
            let watch_mask = self
                .definition
                .data
                .action(name)
                .map_or(0, |spec| spec.watch_mask(atoms));
            let post = self
                .planner
                .action(name)
                .map_or(WorldState::EMPTY, |action| action.post);

            self.queue.push_back(ActionRecord {
                name: name.clone(),
                plan_index,
                handlers,
                task: None,
                post,
                watch_mask,
                phase: ActionPhase::Created,
            });
        }
    }

    fn handle_no_plan(&mut self, env: &mut Env<'_, W>, outcome: PlanOutcome) {
        let reason = match outcome {
            PlanOutcome::Truncated => "depth_cap",
            _ => "no_plan",
        };
        tracing::info!(
            goal = %self.describe_goal(),
            state = %self.describe_worldstate(),
            reason,
            "no plan"
        );
        let event = env
            .event(TraceKind::PlanFailed, self.describe_goal())
            .with_extra("reason", reason)
            .with_extra("state", self.describe_worldstate());
        self.trace.push(event);

        let Some(handler) = self.definition.bindings.no_plan.clone() else {
            self.goal.clear();
            return;
        };

        let result = {
            let mut ctx = self.context(env);
            handler(&mut ctx)
        };

        match result {
            Ok(true) => {
                self.plan = self.planner.plan(&self.current_state, &self.goal);
                self.check_and_set_dirty();
                match self.plan.outcome() {
                    PlanOutcome::Found => self.begin_plan(env),
                    PlanOutcome::AtGoal => {}
                    PlanOutcome::NotFound | PlanOutcome::Truncated => {
                        let event = env
                            .event(TraceKind::PlanFailed, self.describe_goal())
                            .with_extra("reason", "fallback_failed");
                        self.trace.push(event);
                        self.goal.clear();
                    }
                }
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(error = %err, "no-plan handler failed");
                self.goal.clear();
            }
        }
    }
}
