//! Authored behaviour bound to actions and entity types.
//!
//! Every callable returns `Result<_, HandlerError>`; the executor logs and traces errors and
//! keeps the simulation running.

use core::fmt;
use std::rc::Rc;

use ai_core::{ActionStatus, WorldMut};
use thiserror::Error;

use crate::context::GoapContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<crate::GoapError> for HandlerError {
    fn from(err: crate::GoapError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<ai_core::BlackboardError> for HandlerError {
    fn from(err: ai_core::BlackboardError) -> Self {
        Self::new(err.to_string())
    }
}

pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Why a running action is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// A watched atom changed outside the action.
    WorldStateChanged,
    Interrupt,
    /// An explicit goal replaced the current plan.
    Replan,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::WorldStateChanged => "worldstate_changed",
            AbortReason::Interrupt => "interrupt",
            AbortReason::Replan => "replan",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a cooperative update task reported this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Suspended; resume on the next tick from where it left off.
    Yielded,
    Returned(ActionStatus),
}

/// A resumable per-action update.
///
/// A task is created when its action starts and resumed once per tick. Returning
/// `Returned(Running)` ends the task; the next tick starts a fresh one from the action's
/// handlers.
pub trait ActionTask<W: WorldMut + 'static> {
    fn resume(&mut self, ctx: &mut GoapContext<'_, W>) -> HandlerResult<TaskState>;
}

struct FnTask<F>(F);

impl<W, F> ActionTask<W> for FnTask<F>
where
    W: WorldMut + 'static,
    F: FnMut(&mut GoapContext<'_, W>) -> HandlerResult<TaskState>,
{
    fn resume(&mut self, ctx: &mut GoapContext<'_, W>) -> HandlerResult<TaskState> {
        (self.0)(ctx)
    }
}

/// Wraps a closure as a boxed [`ActionTask`]; captured state survives between resumes.
pub fn task_fn<W, F>(f: F) -> Box<dyn ActionTask<W>>
where
    W: WorldMut + 'static,
    F: FnMut(&mut GoapContext<'_, W>) -> HandlerResult<TaskState> + 'static,
{
    Box::new(FnTask(f))
}

/// Lifecycle callbacks of one authored action.
pub trait ActionHandlers<W: WorldMut + 'static> {
    fn start(&self, _ctx: &mut GoapContext<'_, W>) -> HandlerResult {
        Ok(())
    }

    /// Creates the cooperative update task for one run of the action.
    fn update(&self) -> Box<dyn ActionTask<W>>;

    fn finish(&self, _ctx: &mut GoapContext<'_, W>) -> HandlerResult {
        Ok(())
    }

    fn abort(&self, _ctx: &mut GoapContext<'_, W>, _reason: AbortReason) -> HandlerResult {
        Ok(())
    }
}

pub type HookFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>) -> HandlerResult>;
pub type StepFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>) -> HandlerResult<ActionStatus>>;
pub type AbortFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>, AbortReason) -> HandlerResult>;
pub type TaskFactory<W> = Rc<dyn Fn() -> Box<dyn ActionTask<W>>>;

enum UpdateHandler<W: WorldMut + 'static> {
    Step(StepFn<W>),
    Task(TaskFactory<W>),
}

/// [`ActionHandlers`] assembled from closures.
pub struct ScriptedAction<W: WorldMut + 'static> {
    start: Option<HookFn<W>>,
    update: UpdateHandler<W>,
    finish: Option<HookFn<W>>,
    abort: Option<AbortFn<W>>,
}

impl<W: WorldMut + 'static> ScriptedAction<W> {
    /// An action whose update is a plain function called once per tick.
    pub fn new<F>(update: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult<ActionStatus> + 'static,
    {
        Self {
            start: None,
            update: UpdateHandler::Step(Rc::new(update)),
            finish: None,
            abort: None,
        }
    }

    /// An action whose update is a resumable task built fresh for every run.
    pub fn cooperative<F>(make_task: F) -> Self
    where
        F: Fn() -> Box<dyn ActionTask<W>> + 'static,
    {
        Self {
            start: None,
            update: UpdateHandler::Task(Rc::new(make_task)),
            finish: None,
            abort: None,
        }
    }

    pub fn on_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult + 'static,
    {
        self.start = Some(Rc::new(f));
        self
    }

    pub fn on_finish<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult + 'static,
    {
        self.finish = Some(Rc::new(f));
        self
    }

    pub fn on_abort<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>, AbortReason) -> HandlerResult + 'static,
    {
        self.abort = Some(Rc::new(f));
        self
    }

    pub fn into_handlers(self) -> Rc<dyn ActionHandlers<W>> {
        Rc::new(self)
    }
}

struct StepTask<W: WorldMut + 'static>(StepFn<W>);

impl<W: WorldMut + 'static> ActionTask<W> for StepTask<W> {
    fn resume(&mut self, ctx: &mut GoapContext<'_, W>) -> HandlerResult<TaskState> {
        (self.0)(ctx).map(TaskState::Returned)
    }
}

impl<W: WorldMut + 'static> ActionHandlers<W> for ScriptedAction<W> {
    fn start(&self, ctx: &mut GoapContext<'_, W>) -> HandlerResult {
        match &self.start {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn update(&self) -> Box<dyn ActionTask<W>> {
        match &self.update {
            UpdateHandler::Step(f) => Box::new(StepTask(Rc::clone(f))),
            UpdateHandler::Task(make) => make(),
        }
    }

    fn finish(&self, ctx: &mut GoapContext<'_, W>) -> HandlerResult {
        match &self.finish {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn abort(&self, ctx: &mut GoapContext<'_, W>, reason: AbortReason) -> HandlerResult {
        match &self.abort {
            Some(f) => f(ctx, reason),
            None => Ok(()),
        }
    }
}

/// Chooses the entity's goal through [`GoapContext::set_goal`] / [`GoapContext::patch_goal`].
pub type GoalSelectorFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>) -> HandlerResult>;

/// Refreshes world-state atoms from the world once per tick.
pub type WorldStateUpdaterFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>) -> HandlerResult>;

/// Seeds the blackboard after it has been cleared.
pub type BlackboardInitFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>) -> HandlerResult>;

/// Called when planning fails. Returning `Ok(true)` asks for one more planning attempt with
/// whatever goal the handler left in place.
pub type NoPlanFn<W> = Rc<dyn Fn(&mut GoapContext<'_, W>) -> HandlerResult<bool>>;
