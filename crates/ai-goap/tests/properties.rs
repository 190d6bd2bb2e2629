use ai_goap::{ActionPlanner, AtomRegistry, PlanOutcome, WorldState};
use proptest::prelude::*;

const ATOMS: usize = 5;

type Conditions = Vec<Option<bool>>;

fn conditions() -> impl Strategy<Value = Conditions> {
    prop::collection::vec(prop::option::of(any::<bool>()), ATOMS)
}

fn actions() -> impl Strategy<Value = Vec<(Conditions, Conditions)>> {
    prop::collection::vec((conditions(), conditions()), 1..8)
}

fn atom(i: usize) -> String {
    format!("atom_{i}")
}

fn build(actions: &[(Conditions, Conditions)]) -> ActionPlanner {
    let mut planner = ActionPlanner::default();
    for i in 0..ATOMS {
        planner.atoms_mut().register(&atom(i)).unwrap();
    }
    for (idx, (pre, post)) in actions.iter().enumerate() {
        let name = format!("action_{idx}");
        planner.set_cost(&name, 1).unwrap();
        for (i, value) in pre.iter().enumerate() {
            if let Some(v) = value {
                planner.set_pre(&name, &atom(i), *v).unwrap();
            }
        }
        for (i, value) in post.iter().enumerate() {
            if let Some(v) = value {
                planner.set_pst(&name, &atom(i), *v).unwrap();
            }
        }
    }
    planner
}

fn encode(conditions: &[Option<bool>]) -> WorldState {
    let mut ws = WorldState::EMPTY;
    for (i, value) in conditions.iter().enumerate() {
        if let Some(v) = value {
            ws.set_bit(i, *v);
        }
    }
    ws
}

proptest! {
    #[test]
    fn set_then_get_returns_the_written_value(writes in prop::collection::vec((0usize..20, any::<bool>()), 0..30)) {
        let mut atoms = AtomRegistry::default();
        for i in 0..20 {
            atoms.register(&atom(i)).unwrap();
        }

        let mut ws = WorldState::EMPTY;
        let mut expected = [None; 20];
        for (i, value) in writes {
            atoms.set(&mut ws, &atom(i), value).unwrap();
            expected[i] = Some(value);
        }

        for (i, value) in expected.iter().enumerate() {
            prop_assert_eq!(atoms.get(&ws, &atom(i)).unwrap(), *value);
        }
    }

    #[test]
    fn every_state_matches_the_empty_expectation(values in any::<u64>(), dontcare in any::<u64>()) {
        let ws = WorldState { values, dontcare };
        prop_assert!(ws.matches(&WorldState::EMPTY));
        prop_assert!(ws.matches(&ws));
    }

    #[test]
    fn found_plans_are_executable_and_reach_the_goal(
        actions in actions(),
        start in prop::collection::vec(any::<bool>(), ATOMS),
        goal in conditions(),
    ) {
        let planner = build(&actions);
        let start = encode(&start.into_iter().map(Some).collect::<Vec<_>>());
        let goal = encode(&goal);

        let plan = planner.plan(&start, &goal);
        match plan.outcome() {
            PlanOutcome::AtGoal => prop_assert!(start.matches(&goal)),
            PlanOutcome::Found => {
                let mut state = start;
                for (name, expected) in plan.actions.iter().zip(&plan.states) {
                    let action = planner.action(name).unwrap();
                    prop_assert!(state.matches(&action.pre));
                    state = state.apply(&action.post);
                    prop_assert_eq!(state, *expected);
                }
                prop_assert!(state.matches(&goal));
                prop_assert_eq!(plan.cost as usize, plan.len());
            }
            PlanOutcome::NotFound | PlanOutcome::Truncated => {
                prop_assert!(!start.matches(&goal));
            }
        }
    }

    #[test]
    fn heuristic_never_overestimates_single_effect_unit_cost_plans(
        effects in prop::collection::vec((conditions(), 0usize..ATOMS, any::<bool>()), 1..8),
        start in prop::collection::vec(any::<bool>(), ATOMS),
        goal in conditions(),
    ) {
        let actions: Vec<(Conditions, Conditions)> = effects
            .into_iter()
            .map(|(pre, atom, value)| {
                let mut post = vec![None; ATOMS];
                post[atom] = Some(value);
                (pre, post)
            })
            .collect();
        let planner = build(&actions);
        let start = encode(&start.into_iter().map(Some).collect::<Vec<_>>());
        let goal = encode(&goal);

        let plan = planner.plan(&start, &goal);
        if plan.cost >= 0 {
            prop_assert!(plan.cost as u32 >= start.distance_to(&goal));
        }
    }

    #[test]
    fn planning_is_deterministic(
        actions in actions(),
        start in conditions(),
        goal in conditions(),
    ) {
        let planner = build(&actions);
        let start = encode(&start);
        let goal = encode(&goal);

        prop_assert_eq!(planner.plan(&start, &goal), build(&actions).plan(&start, &goal));
    }

    #[test]
    fn apply_is_idempotent(values in any::<u64>(), dontcare in any::<u64>(), post_values in any::<u64>(), post_dontcare in any::<u64>()) {
        let ws = WorldState { values, dontcare };
        let post = WorldState { values: post_values, dontcare: post_dontcare };
        let once = ws.apply(&post);
        prop_assert_eq!(once.apply(&post), once);
        prop_assert!(once.matches(&post));
    }
}
