use core::cmp::Ordering;
use core::fmt::Write as _;
use std::collections::{BTreeMap, BinaryHeap};

use serde::{Deserialize, Serialize};

use crate::definition::ActionSpec;
use crate::error::{GoapError, Result};
use crate::worldstate::{AtomRegistry, WorldState, MAX_ATOMS};

/// Action slots per planner, and the default plan length cap.
pub const MAX_ACTIONS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerAction {
    pub name: String,
    pub cost: u32,
    pub pre: WorldState,
    pub post: WorldState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Longest plan the search will build. A plan of exactly this length means the search was
    /// cut off.
    pub max_plan_len: usize,
    /// Nodes popped from the open set before the search gives up.
    pub max_expansions: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_plan_len: MAX_ACTIONS,
            max_expansions: 4096,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// The start state already satisfies the goal.
    AtGoal,
    Found,
    NotFound,
    /// The search reached the plan length cap.
    Truncated,
}

/// Result of a planning query.
///
/// `cost` is `-1` when no plan exists within the cap; `states[i]` is the state expected after
/// `actions[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<String>,
    pub states: Vec<WorldState>,
    pub cost: i32,
    cap: usize,
}

impl Plan {
    pub fn not_found(cap: usize) -> Self {
        Self {
            actions: Vec::new(),
            states: Vec::new(),
            cost: -1,
            cap,
        }
    }

    pub fn at_goal(cap: usize) -> Self {
        Self {
            actions: Vec::new(),
            states: Vec::new(),
            cost: 0,
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn outcome(&self) -> PlanOutcome {
        if self.cost < 0 {
            PlanOutcome::NotFound
        } else if self.actions.is_empty() {
            PlanOutcome::AtGoal
        } else if self.actions.len() >= self.cap {
            PlanOutcome::Truncated
        } else {
            PlanOutcome::Found
        }
    }

    /// Requires a usable plan; an empty plan at goal is usable.
    pub fn into_result(self) -> Result<Plan> {
        match self.outcome() {
            PlanOutcome::NotFound => Err(GoapError::PlanNotFound),
            PlanOutcome::Truncated => Err(GoapError::PlanTruncated { cap: self.cap }),
            PlanOutcome::AtGoal | PlanOutcome::Found => Ok(self),
        }
    }
}

/// A* planner over bit-packed world states.
///
/// Actions are searched in registration order, which also breaks ties between equal-cost
/// candidates, so identical inputs always produce identical plans.
#[derive(Debug, Clone)]
pub struct ActionPlanner {
    atoms: AtomRegistry,
    actions: Vec<PlannerAction>,
    config: PlannerConfig,
}

impl ActionPlanner {
    pub fn new(atoms: AtomRegistry) -> Self {
        Self {
            atoms,
            actions: Vec::new(),
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> PlannerConfig {
        self.config
    }

    pub fn atoms(&self) -> &AtomRegistry {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut AtomRegistry {
        &mut self.atoms
    }

    /// Replaces the atom table. Existing action conditions keep their bit indices, so `atoms`
    /// must extend the current table.
    pub fn replace_atoms(&mut self, atoms: AtomRegistry) {
        self.atoms = atoms;
    }

    pub fn actions(&self) -> &[PlannerAction] {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&PlannerAction> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Removes every action and atom.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.atoms.clear();
    }

    pub fn set_cost(&mut self, action: &str, cost: u32) -> Result<()> {
        let idx = self.action_slot(action)?;
        self.actions[idx].cost = cost;
        Ok(())
    }

    pub fn set_pre(&mut self, action: &str, atom: &str, value: bool) -> Result<()> {
        let idx = self.action_slot(action)?;
        let bit = self.atoms.register(atom)?;
        self.actions[idx].pre.set_bit(bit, value);
        Ok(())
    }

    pub fn set_pst(&mut self, action: &str, atom: &str, value: bool) -> Result<()> {
        let idx = self.action_slot(action)?;
        let bit = self.atoms.register(atom)?;
        self.actions[idx].post.set_bit(bit, value);
        Ok(())
    }

    /// Registers authored actions in order: cost, then preconditions, then postconditions.
    pub fn add_specs(&mut self, specs: &[ActionSpec]) -> Result<()> {
        for spec in specs {
            self.set_cost(&spec.name, spec.cost)?;
            for (atom, value) in &spec.pre {
                self.set_pre(&spec.name, atom, *value)?;
            }
            for (atom, value) in &spec.post {
                self.set_pst(&spec.name, atom, *value)?;
            }
        }
        Ok(())
    }

    /// Every action applicable in `state` with the state it leads to, in registration order.
    pub fn possible_transitions(&self, state: &WorldState) -> Vec<(usize, WorldState)> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, action)| state.matches(&action.pre))
            .map(|(idx, action)| (idx, state.apply(&action.post)))
            .collect()
    }

    pub fn plan(&self, start: &WorldState, goal: &WorldState) -> Plan {
        self.plan_with_cap(start, goal, self.config.max_plan_len)
    }

    pub fn plan_with_cap(&self, start: &WorldState, goal: &WorldState, cap: usize) -> Plan {
        if start.matches(goal) {
            return Plan::at_goal(cap);
        }
        if cap == 0 {
            return Plan::not_found(cap);
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct OpenNode {
            f: u32,
            h: u32,
            tie: u64,
            node: usize,
        }

        impl OpenNode {
            fn key(&self) -> (u32, u32, u64) {
                (self.f, self.h, self.tie)
            }
        }

        impl Ord for OpenNode {
            fn cmp(&self, other: &Self) -> Ordering {
                // Reverse ordering to make BinaryHeap behave like a min-heap.
                other.key().cmp(&self.key())
            }
        }

        impl PartialOrd for OpenNode {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        struct SearchNode {
            state: WorldState,
            g: u32,
            depth: usize,
            parent: Option<(usize, usize)>,
        }

        let mut nodes: Vec<SearchNode> = vec![SearchNode {
            state: *start,
            g: 0,
            depth: 0,
            parent: None,
        }];
        let mut g_score: BTreeMap<WorldState, u32> = BTreeMap::new();
        g_score.insert(*start, 0);

        let mut open = BinaryHeap::<OpenNode>::new();
        let mut tie: u64 = 0;
        let h0 = start.distance_to(goal);
        open.push(OpenNode {
            f: h0,
            h: h0,
            tie,
            node: 0,
        });
        tie += 1;

        let mut expansions: usize = 0;

        while let Some(entry) = open.pop() {
            let node = &nodes[entry.node];
            let best_g = g_score.get(&node.state).copied().unwrap_or(u32::MAX);
            if node.g != best_g {
                continue; // stale heap entry
            }

            expansions += 1;
            if expansions > self.config.max_expansions {
                tracing::warn!(
                    expansions = self.config.max_expansions,
                    open = open.len(),
                    "plan search hit its expansion budget"
                );
                break;
            }

            if node.state.matches(goal) {
                let cost = node.g;
                let mut actions = Vec::new();
                let mut states = Vec::new();
                let mut current = entry.node;
                while let Some((parent, action_idx)) = nodes[current].parent {
                    actions.push(self.actions[action_idx].name.clone());
                    states.push(nodes[current].state);
                    current = parent;
                }
                actions.reverse();
                states.reverse();

                return Plan {
                    actions,
                    states,
                    cost: i32::try_from(cost).unwrap_or(i32::MAX),
                    cap,
                };
            }

            if node.depth >= cap {
                continue;
            }

            let (state, g, depth) = (node.state, node.g, node.depth);
            for (action_idx, action) in self.actions.iter().enumerate() {
                if !state.matches(&action.pre) {
                    continue;
                }
                let next = state.apply(&action.post);
                if next == state {
                    continue;
                }

                let next_g = g.saturating_add(action.cost);
                let prev_best = g_score.get(&next).copied().unwrap_or(u32::MAX);
                if next_g >= prev_best {
                    continue;
                }
                g_score.insert(next, next_g);

                let h = next.distance_to(goal);
                nodes.push(SearchNode {
                    state: next,
                    g: next_g,
                    depth: depth + 1,
                    parent: Some((entry.node, action_idx)),
                });
                open.push(OpenNode {
                    f: next_g.saturating_add(h),
                    h,
                    tie,
                    node: nodes.len() - 1,
                });
                tie += 1;
            }
        }

        Plan::not_found(cap)
    }

    /// One block per action: `name:` then `  atom==0/1` for preconditions and `  atom:=0/1`
    /// for postconditions.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for action in &self.actions {
            let _ = writeln!(out, "{}:", action.name);
            for (idx, name) in self.atoms.names().iter().enumerate() {
                if let Some(v) = action.pre.get_bit(idx) {
                    let _ = writeln!(out, "  {}=={}", name, u8::from(v));
                }
            }
            for (idx, name) in self.atoms.names().iter().enumerate() {
                if let Some(v) = action.post.get_bit(idx) {
                    let _ = writeln!(out, "  {}:={}", name, u8::from(v));
                }
            }
        }
        out
    }

    fn action_slot(&mut self, name: &str) -> Result<usize> {
        if let Some(idx) = self.actions.iter().position(|a| a.name == name) {
            return Ok(idx);
        }
        if self.actions.len() >= MAX_ACTIONS {
            return Err(GoapError::ActionCapExceeded {
                action: name.to_string(),
                cap: MAX_ACTIONS,
            });
        }
        self.actions.push(PlannerAction {
            name: name.to_string(),
            cost: 1,
            pre: WorldState::EMPTY,
            post: WorldState::EMPTY,
        });
        Ok(self.actions.len() - 1)
    }
}

impl Default for ActionPlanner {
    fn default() -> Self {
        Self::new(AtomRegistry::new(MAX_ATOMS))
    }
}
