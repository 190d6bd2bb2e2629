use std::collections::{BTreeMap, BTreeSet};

use ai_core::{ActionStatus, Vec2, WorldMut, WorldView};
use ai_goap::{
    ActionSpec, Definition, DefinitionData, DefinitionOverrides, EntityTypeSpec, GoapConfig,
    GoapError, PlanOutcome, ScriptedAction, TickOutcome,
};
use ai_system::{AiConfig, AiSystem};
use ai_tools::TraceKind;

#[derive(Default)]
struct Arena {
    alive: BTreeSet<u64>,
    positions: BTreeMap<u64, Vec2>,
    log: Vec<String>,
}

impl Arena {
    fn spawn(&mut self, entity: u64, x: f32, y: f32) {
        self.alive.insert(entity);
        self.positions.insert(entity, Vec2::new(x, y));
    }
}

impl WorldView for Arena {
    type Entity = u64;

    fn is_valid(&self, entity: u64) -> bool {
        self.alive.contains(&entity)
    }

    fn position(&self, entity: u64) -> Option<Vec2> {
        self.positions.get(&entity).copied()
    }

    fn positioned_entities(&self) -> Vec<(u64, Vec2)> {
        self.positions.iter().map(|(e, p)| (*e, *p)).collect()
    }
}

impl WorldMut for Arena {}

fn logged(name: &'static str, status: ActionStatus) -> ScriptedAction<Arena> {
    ScriptedAction::<Arena>::new(move |_ctx| Ok(status))
        .on_start(move |ctx| {
            let entity = ctx.entity();
            ctx.world_mut().log.push(format!("{entity}:start:{name}"));
            Ok(())
        })
        .on_abort(move |ctx, reason| {
            let entity = ctx.entity();
            ctx.world_mut().log.push(format!("{entity}:abort:{name}:{reason}"));
            Ok(())
        })
}

fn kobold_data() -> DefinitionData {
    DefinitionData {
        actions: vec![
            ActionSpec::new("get_food").with_post("has_food", true),
            ActionSpec::new("eat")
                .with_pre("has_food", true)
                .with_post("hungry", false)
                .with_post("has_food", false),
        ],
        entity_types: [(
            "kobold".to_string(),
            EntityTypeSpec::default()
                .with_initial("hungry", true)
                .with_initial("has_food", false)
                .with_goal("hungry", false),
        )]
        .into_iter()
        .collect(),
        max_retries: None,
    }
}

fn kobold_definition() -> Definition<Arena> {
    Definition::new(kobold_data())
        .with_action("get_food", logged("get_food", ActionStatus::Success))
        .with_action("eat", logged("eat", ActionStatus::Success))
        .with_blackboard_init("default", |ctx| {
            ctx.blackboard_mut().set("patience", 3i64);
            Ok(())
        })
}

fn system() -> AiSystem<Arena> {
    let mut system = AiSystem::new(AiConfig::default());
    system.register_definition(kobold_definition());
    system
}

fn count(log: &[String], line: &str) -> usize {
    log.iter().filter(|l| *l == line).count()
}

#[test]
fn init_builds_the_first_plan() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();

    let outcome = system.init(&mut world, 1, "kobold", None).unwrap();

    assert_eq!(outcome, Some(PlanOutcome::Found));
    assert!(system.has_plan(1).unwrap());
    assert_eq!(system.blackboard(1).unwrap().get::<i64>("patience"), Ok(3));
    assert_eq!(world.log, vec!["1:start:get_food"]);

    let snapshot = system.get_goap_state(1).unwrap();
    assert_eq!(snapshot.entity_type, "kobold");
    assert_eq!(snapshot.plan, vec!["get_food", "eat"]);
    assert_eq!(snapshot.current_action.as_deref(), Some("get_food"));
    assert_eq!(snapshot.actionset_version, 1);
    assert_eq!(snapshot.atom_schema_version, 1);
}

#[test]
fn unknown_types_are_rejected_without_attaching_state() {
    let mut world = Arena::default();
    let mut system = system();

    assert_eq!(
        system.init(&mut world, 1, "dragon", None),
        Err(GoapError::UnknownType("dragon".to_string()))
    );
    assert!(!system.contains(1));
    assert_eq!(
        system.dump_plan(1),
        Err(GoapError::UnknownEntity(1))
    );
}

#[test]
fn atom_cap_failure_leaves_a_dirty_entity_without_actions() {
    let mut world = Arena::default();
    let config = AiConfig {
        goap: GoapConfig {
            safe_atom_cap: 1,
            ..GoapConfig::default()
        },
        ..AiConfig::default()
    };
    let mut system = AiSystem::new(config);
    system.register_definition(kobold_definition());

    let err = system.init(&mut world, 1, "kobold", None).unwrap_err();

    assert!(matches!(err, GoapError::AtomCapExceeded { cap: 1, .. }));
    let snapshot = system.get_goap_state(1).unwrap();
    assert!(snapshot.dirty);
    assert_eq!(snapshot.actionset_version, 0);
    assert_eq!(snapshot.atom_schema_version, 0);
    let events = system.get_trace_events(1, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, TraceKind::PlanFailed);
    assert!(world.log.is_empty());
}

#[test]
fn ticks_dispatch_only_after_the_configured_interval() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();

    assert_eq!(system.update_all(&mut world, 0.2), None);
    assert_eq!(system.get_worldstate(1, "has_food"), Ok(Some(false)));

    let tick = system.update_all(&mut world, 0.3).unwrap();
    assert_eq!(tick.tick, 1);
    assert!((tick.dt_seconds - 0.5).abs() < 1e-6);
    assert_eq!(system.get_worldstate(1, "has_food"), Ok(Some(true)));

    system.update_all(&mut world, 0.5);
    assert_eq!(system.get_worldstate(1, "hungry"), Ok(Some(false)));
    assert!(!system.has_plan(1).unwrap());
    assert_eq!(
        system.dump_worldstate(1).unwrap(),
        "state: has_food,hungry\ngoal: hungry"
    );
}

#[test]
fn pause_freezes_every_entity_until_resumed() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();

    system.pause_ai_system();
    assert!(system.is_paused());
    assert_eq!(system.update_all(&mut world, 5.0), None);
    assert_eq!(system.get_worldstate(1, "has_food"), Ok(Some(false)));
    assert_eq!(system.scheduler().accumulated(), 0.0);

    system.resume_ai_system();
    assert!(system.update_all(&mut world, 0.5).is_some());
    assert_eq!(system.get_worldstate(1, "has_food"), Ok(Some(true)));
}

#[test]
fn reset_requests_reinitialise_entities_before_the_next_tick() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = AiSystem::new(AiConfig::default());
    system.register_definition(
        Definition::new(kobold_data())
            .with_action("get_food", logged("get_food", ActionStatus::Success))
            .with_action(
                "eat",
                ScriptedAction::<Arena>::new(|ctx| {
                    ctx.request_reset();
                    Ok(ActionStatus::Success)
                }),
            ),
    );
    system.init(&mut world, 1, "kobold", None).unwrap();

    system.update_all(&mut world, 0.5);
    system.update_all(&mut world, 0.5);
    assert!(system.reset_requested());
    assert_eq!(system.get_worldstate(1, "hungry"), Ok(Some(false)));

    // The reset runs first, then the fresh state is ticked once.
    system.update_all(&mut world, 0.5);
    assert!(!system.reset_requested());
    assert_eq!(count(&world.log, "1:start:get_food"), 2);
    assert_eq!(system.get_worldstate(1, "hungry"), Ok(Some(true)));
    assert_eq!(system.get_worldstate(1, "has_food"), Ok(Some(true)));
}

#[test]
fn overrides_survive_a_reset() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    let overrides = DefinitionOverrides {
        entity_types: Some(
            [(
                "kobold".to_string(),
                EntityTypeSpec::default()
                    .with_initial("hungry", true)
                    .with_initial("has_food", true)
                    .with_goal("hungry", false),
            )]
            .into_iter()
            .collect(),
        ),
        ..DefinitionOverrides::default()
    };

    system.init(&mut world, 1, "kobold", Some(overrides)).unwrap();
    assert_eq!(system.get_goap_state(1).unwrap().plan, vec!["eat"]);

    system.request_reset();
    system.update_all(&mut world, 0.5);
    assert_eq!(count(&world.log, "1:start:eat"), 2);
    assert_eq!(count(&world.log, "1:start:get_food"), 0);
}

#[test]
fn invalid_entities_are_destroyed_instead_of_ticked() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    world.spawn(2, 1.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();
    system.init(&mut world, 2, "kobold", None).unwrap();

    world.alive.remove(&2);
    system.update_all(&mut world, 0.5);

    assert_eq!(system.entities().collect::<Vec<_>>(), vec![1]);
    assert_eq!(system.get_worldstate(2, "hungry"), Err(GoapError::UnknownEntity(2)));

    // Reset does not resurrect destroyed entities.
    system.request_reset();
    system.update_all(&mut world, 0.5);
    assert_eq!(system.len(), 1);
}

#[test]
fn interrupts_requested_by_handlers_apply_after_the_requesting_tick() {
    let data = DefinitionData {
        actions: vec![
            ActionSpec::new("patrol").with_post("patrolled", true),
            ActionSpec::new("alarm").with_post("alarmed", true),
        ],
        entity_types: [
            (
                "sentry".to_string(),
                EntityTypeSpec::default()
                    .with_initial("alarmed", false)
                    .with_goal("alarmed", true),
            ),
            (
                "walker".to_string(),
                EntityTypeSpec::default()
                    .with_initial("patrolled", false)
                    .with_goal("patrolled", true),
            ),
        ]
        .into_iter()
        .collect(),
        max_retries: None,
    };
    let definition = Definition::new(data)
        .with_action("patrol", logged("patrol", ActionStatus::Running))
        .with_action(
            "alarm",
            ScriptedAction::<Arena>::new(|ctx| {
                let neighbour = ctx.entity() + 1;
                ctx.request_interrupt(neighbour);
                Ok(ActionStatus::Success)
            }),
        );

    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    world.spawn(2, 1.0, 0.0);
    let mut system = AiSystem::new(AiConfig::default());
    system.register_definition(definition);
    system.init(&mut world, 1, "sentry", None).unwrap();
    system.init(&mut world, 2, "walker", None).unwrap();

    system.update_all(&mut world, 0.5);

    assert_eq!(
        world.log,
        vec!["2:start:patrol", "2:abort:patrol:interrupt", "2:start:patrol"]
    );
    let interrupts = system
        .get_trace_events(2, 32)
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == TraceKind::Interrupt)
        .count();
    assert_eq!(interrupts, 1);
}

#[test]
fn force_interrupt_and_explicit_goals_replan_immediately() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();
    system.blackboard_mut(1).unwrap().set("patience", 0i64);

    assert_eq!(
        system.force_interrupt(&mut world, 1),
        Ok(Some(PlanOutcome::Found))
    );
    assert_eq!(system.blackboard(1).unwrap().get::<i64>("patience"), Ok(3));

    let outcome = system
        .replan_to_goal(&mut world, 1, [("has_food", true)], false)
        .unwrap();
    assert_eq!(outcome, PlanOutcome::Found);
    assert_eq!(system.get_goap_state(1).unwrap().plan, vec!["get_food"]);

    assert_eq!(
        system.replan_to_goal(&mut world, 1, [("wings", true)], true),
        Err(GoapError::UnknownAtom("wings".to_string()))
    );
}

#[test]
fn debug_queries_describe_the_entity() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();

    assert_eq!(system.get_all_atoms(1).unwrap(), vec!["has_food", "hungry"]);
    assert_eq!(system.dump_blackboard(1).unwrap(), "patience = int:3\n");

    let plan = system.dump_plan(1).unwrap();
    let lines: Vec<&str> = plan.lines().collect();
    assert_eq!(lines[0], "plan cost = 2");
    assert!(lines[1].starts_with(">0: get_food"));
    assert!(lines[2].starts_with(" 1: eat"));

    system
        .report_goal_selection(1, "eat", "hungry for too long")
        .unwrap();
    let last = system.get_trace_events(1, 1).unwrap();
    assert_eq!(last[0].kind, TraceKind::GoalSelected);
    assert_eq!(last[0].message, "eat");
    assert_eq!(last[0].extra["reason"], "hungry for too long");

    system.clear_trace(1).unwrap();
    assert!(system.get_trace_events(1, 10).unwrap().is_empty());
}

#[test]
fn worldstate_and_goal_writes_go_through_the_atom_table() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();

    system.set_worldstate(1, "has_food", true).unwrap();
    assert_eq!(system.patch_worldstate(1, "hungry", false), Ok(true));
    assert_eq!(system.patch_worldstate(1, "sleepy", true), Ok(false));
    assert_eq!(
        system.set_worldstate(1, "sleepy", true),
        Err(GoapError::UnknownAtom("sleepy".to_string()))
    );

    system.set_goal(1, [("has_food", false)]).unwrap();
    system.patch_goal(1, [("hungry", false)]).unwrap();
    assert_eq!(
        system.dump_worldstate(1).unwrap(),
        "state: HAS_FOOD,hungry\ngoal: has_food,hungry"
    );
}

#[test]
fn reloading_actions_replans_on_the_next_tick() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();

    system
        .reload_actions(
            1,
            &[ActionSpec::new("eat").with_post("hungry", false)],
        )
        .unwrap();
    assert!(!system.has_plan(1).unwrap());
    assert_eq!(system.get_goap_state(1).unwrap().actionset_version, 2);

    assert_eq!(
        system.tick_entity(&mut world, 1, 0.5),
        Ok(TickOutcome::Replanned(ai_goap::ReplanReason::QueueEmpty))
    );
    assert_eq!(system.get_goap_state(1).unwrap().plan, vec!["eat"]);
}

#[test]
fn rejected_reload_is_traced_and_keeps_the_old_action_set() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let config = AiConfig {
        goap: GoapConfig {
            safe_atom_cap: 2,
            ..GoapConfig::default()
        },
        ..AiConfig::default()
    };
    let mut system = AiSystem::new(config);
    system.register_definition(kobold_definition());
    system.init(&mut world, 1, "kobold", None).unwrap();

    let err = system
        .reload_actions(
            1,
            &[ActionSpec::new("arm").with_post("armed", true)],
        )
        .unwrap_err();

    assert!(matches!(err, GoapError::AtomCapExceeded { cap: 2, .. }));
    let snapshot = system.get_goap_state(1).unwrap();
    assert!(snapshot.dirty);
    assert_eq!(snapshot.actionset_version, 1);
    let last = system.get_trace_events(1, 1).unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].kind, TraceKind::PlanFailed);
    assert_eq!(last[0].message, "reload failed");
    assert!(last[0].extra.contains_key("error"));
}

#[test]
fn configured_blackboard_init_applies_to_types_without_their_own() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let config = AiConfig {
        default_blackboard_init: "village".to_string(),
        ..AiConfig::default()
    };
    let mut system = AiSystem::new(config);
    system.register_definition(
        kobold_definition().with_blackboard_init("village", |ctx| {
            ctx.blackboard_mut().set("home", "village".to_string());
            Ok(())
        }),
    );
    system.init(&mut world, 1, "kobold", None).unwrap();

    let blackboard = system.blackboard(1).unwrap();
    assert_eq!(blackboard.get::<String>("home"), Ok("village".to_string()));
    assert!(!blackboard.contains("patience"));
}

#[test]
fn sensing_helpers_read_world_positions() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    world.spawn(2, 3.0, 4.0);
    world.spawn(3, 1.0, 0.0);
    let system = system();

    assert_eq!(system.position(&world, 2), Some(Vec2::new(3.0, 4.0)));
    assert_eq!(system.distance(&world, 1, 2), Some(5.0));
    let nearest = system.nearest(&world, 1, 10.0).unwrap();
    assert_eq!(nearest.entity, 3);
    let far = system.nearest_matching(&world, 1, 10.0, |e| e != 3).unwrap();
    assert_eq!(far.entity, 2);
}

#[test]
fn shutdown_drops_entities_and_prototypes() {
    let mut world = Arena::default();
    world.spawn(1, 0.0, 0.0);
    let mut system = system();
    system.init(&mut world, 1, "kobold", None).unwrap();

    system.shutdown();

    assert!(system.is_empty());
    assert_eq!(system.prototype_types().count(), 0);
    assert_eq!(
        system.init(&mut world, 1, "kobold", None),
        Err(GoapError::UnknownType("kobold".to_string()))
    );
}
