//! Authored content: the serializable action/type tables and the Rust callables bound to them.

use std::collections::BTreeMap;
use std::rc::Rc;

use ai_core::WorldMut;
use serde::{Deserialize, Serialize};

use crate::context::GoapContext;
use crate::handlers::{
    ActionHandlers, BlackboardInitFn, GoalSelectorFn, HandlerResult, NoPlanFn,
    WorldStateUpdaterFn,
};
use crate::worldstate::AtomRegistry;

fn default_cost() -> u32 {
    1
}

/// Which atom changes should interrupt a running action, beyond its own preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchSpec {
    /// `"*"` watches every registered atom. Any other string adds nothing.
    Pattern(String),
    Atoms(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    #[serde(default = "default_cost")]
    pub cost: u32,
    #[serde(default, alias = "preconditions")]
    pub pre: BTreeMap<String, bool>,
    #[serde(default, alias = "postconditions")]
    pub post: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchSpec>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cost: default_cost(),
            pre: BTreeMap::new(),
            post: BTreeMap::new(),
            watch: None,
        }
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_pre(mut self, atom: impl Into<String>, value: bool) -> Self {
        self.pre.insert(atom.into(), value);
        self
    }

    pub fn with_post(mut self, atom: impl Into<String>, value: bool) -> Self {
        self.post.insert(atom.into(), value);
        self
    }

    pub fn watching<I, S>(mut self, atoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watch = Some(WatchSpec::Atoms(atoms.into_iter().map(Into::into).collect()));
        self
    }

    pub fn watching_all(mut self) -> Self {
        self.watch = Some(WatchSpec::Pattern("*".to_string()));
        self
    }

    /// Precondition atoms plus watched atoms; `"*"` selects every registered atom.
    pub fn watch_mask(&self, atoms: &AtomRegistry) -> u64 {
        let pre = atoms.mask_from_names(self.pre.keys());
        match &self.watch {
            Some(WatchSpec::Pattern(p)) if p == "*" => atoms.all_mask(),
            Some(WatchSpec::Atoms(names)) => pre | atoms.mask_from_names(names),
            _ => pre,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeSpec {
    #[serde(default, alias = "initial_state")]
    pub initial: BTreeMap<String, bool>,
    #[serde(default, alias = "goal_state", alias = "goal_template")]
    pub goal: BTreeMap<String, bool>,
}

impl EntityTypeSpec {
    pub fn with_initial(mut self, atom: impl Into<String>, value: bool) -> Self {
        self.initial.insert(atom.into(), value);
        self
    }

    pub fn with_goal(mut self, atom: impl Into<String>, value: bool) -> Self {
        self.goal.insert(atom.into(), value);
        self
    }
}

/// The data half of a definition, as loaded from JSON or YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionData {
    /// In authored order; the planner registers actions in this order.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
    #[serde(default, alias = "types")]
    pub entity_types: BTreeMap<String, EntityTypeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl DefinitionData {
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Top-level sections present in `overrides` replace the corresponding sections here.
    pub fn with_overrides(&self, overrides: &DefinitionOverrides) -> DefinitionData {
        DefinitionData {
            actions: overrides
                .actions
                .clone()
                .unwrap_or_else(|| self.actions.clone()),
            entity_types: overrides
                .entity_types
                .clone()
                .unwrap_or_else(|| self.entity_types.clone()),
            max_retries: overrides.max_retries.or(self.max_retries),
        }
    }
}

/// Per-entity replacements for sections of a [`DefinitionData`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionOverrides {
    #[serde(default)]
    pub actions: Option<Vec<ActionSpec>>,
    #[serde(default, alias = "types")]
    pub entity_types: Option<BTreeMap<String, EntityTypeSpec>>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Callables bound to a definition. Handles are shared, so cloning is cheap.
pub struct Bindings<W: WorldMut + 'static> {
    pub actions: BTreeMap<String, Rc<dyn ActionHandlers<W>>>,
    /// Keyed by entity type; `"default"` is the fallback.
    pub goal_selectors: BTreeMap<String, GoalSelectorFn<W>>,
    /// Run every tick in the order they were bound.
    pub worldstate_updaters: Vec<(String, WorldStateUpdaterFn<W>)>,
    /// Keyed by entity type; `"default"` is the fallback.
    pub blackboard_init: BTreeMap<String, BlackboardInitFn<W>>,
    pub no_plan: Option<NoPlanFn<W>>,
}

impl<W: WorldMut + 'static> Clone for Bindings<W> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            goal_selectors: self.goal_selectors.clone(),
            worldstate_updaters: self.worldstate_updaters.clone(),
            blackboard_init: self.blackboard_init.clone(),
            no_plan: self.no_plan.clone(),
        }
    }
}

impl<W: WorldMut + 'static> Default for Bindings<W> {
    fn default() -> Self {
        Self {
            actions: BTreeMap::new(),
            goal_selectors: BTreeMap::new(),
            worldstate_updaters: Vec::new(),
            blackboard_init: BTreeMap::new(),
            no_plan: None,
        }
    }
}

/// A complete prototype: authored data plus bound behaviour.
pub struct Definition<W: WorldMut + 'static> {
    pub data: DefinitionData,
    pub bindings: Bindings<W>,
}

impl<W: WorldMut + 'static> Clone for Definition<W> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            bindings: self.bindings.clone(),
        }
    }
}

impl<W: WorldMut + 'static> Definition<W> {
    pub fn new(data: DefinitionData) -> Self {
        Self {
            data,
            bindings: Bindings::default(),
        }
    }

    pub fn with_action<H>(mut self, name: impl Into<String>, handlers: H) -> Self
    where
        H: ActionHandlers<W> + 'static,
    {
        self.bindings.actions.insert(name.into(), Rc::new(handlers));
        self
    }

    pub fn with_action_handlers(
        mut self,
        name: impl Into<String>,
        handlers: Rc<dyn ActionHandlers<W>>,
    ) -> Self {
        self.bindings.actions.insert(name.into(), handlers);
        self
    }

    pub fn with_goal_selector<F>(mut self, entity_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult + 'static,
    {
        self.bindings
            .goal_selectors
            .insert(entity_type.into(), Rc::new(f));
        self
    }

    /// Binds a world-state updater. Rebinding a name keeps its original position.
    pub fn with_updater<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult + 'static,
    {
        let name = name.into();
        let updater: WorldStateUpdaterFn<W> = Rc::new(f);
        let updaters = &mut self.bindings.worldstate_updaters;
        match updaters.iter_mut().find(|(bound, _)| *bound == name) {
            Some(slot) => slot.1 = updater,
            None => updaters.push((name, updater)),
        }
        self
    }

    pub fn with_blackboard_init<F>(mut self, entity_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult + 'static,
    {
        self.bindings
            .blackboard_init
            .insert(entity_type.into(), Rc::new(f));
        self
    }

    pub fn with_no_plan<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut GoapContext<'_, W>) -> HandlerResult<bool> + 'static,
    {
        self.bindings.no_plan = Some(Rc::new(f));
        self
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeSpec> {
        self.data.entity_types.get(name)
    }

    pub fn with_overrides(&self, overrides: &DefinitionOverrides) -> Definition<W> {
        Definition {
            data: self.data.with_overrides(overrides),
            bindings: self.bindings.clone(),
        }
    }
}
