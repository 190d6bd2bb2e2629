//! GOAP tooling CLI.
//!
//! - `goap describe` - list the authored actions as the planner sees them
//! - `goap plan` - plan from an entity type's initial state and print every step
//! - `goap simulate` - run entities through a headless world and print their traces

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use ai_core::{ActionStatus, WorldMut, WorldView};
use ai_goap::{
    task_fn, ActionPlanner, AtomRegistry, Definition, DefinitionData, GoapContext,
    GoapEntityState, PlanOutcome, ScriptedAction, TaskState,
};
use ai_system::{load_definition_data, AiConfig, AiSystem};

#[derive(Parser)]
#[command(name = "goap")]
#[command(about = "Inspect GOAP definitions and run headless simulations", version)]
struct Cli {
    /// AI configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every action with its preconditions and postconditions
    Describe {
        /// Definition file (JSON or YAML)
        #[arg(long)]
        defs: PathBuf,
    },

    /// Plan from an entity type's initial state to its goal
    Plan {
        #[arg(long)]
        defs: PathBuf,

        /// Entity type to plan for
        #[arg(long = "type")]
        entity_type: String,

        /// Replace the type's goal, e.g. `--goal hungry=false` (repeatable)
        #[arg(long = "goal", value_parser = parse_atom)]
        goal: Vec<(String, bool)>,
    },

    /// Run entities of one type through a headless world
    Simulate {
        #[arg(long)]
        defs: PathBuf,

        #[arg(long = "type")]
        entity_type: String,

        /// AI ticks to run
        #[arg(long, default_value_t = 20)]
        ticks: u32,

        /// Ticks every action stays RUNNING before it succeeds
        #[arg(long, default_value_t = 1)]
        action_ticks: u32,

        /// Number of entities to spawn
        #[arg(long, default_value_t = 1)]
        count: u64,

        /// Print trace events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn parse_atom(raw: &str) -> std::result::Result<(String, bool), String> {
    let (atom, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected atom=bool, got '{raw}'"))?;
    let value = match value.trim() {
        "true" | "1" => true,
        "false" | "0" => false,
        other => return Err(format!("'{other}' is not a boolean")),
    };
    Ok((atom.trim().to_string(), value))
}

/// A world with no spatial data; entities live until the run ends.
struct HeadlessWorld;

impl WorldView for HeadlessWorld {
    type Entity = u64;
}

impl WorldMut for HeadlessWorld {}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let logs = fmt().with_env_filter(filter).with_target(false);
    if cli.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    let config = match &cli.config {
        Some(path) => AiConfig::load(path)?,
        None => AiConfig::default(),
    };

    match cli.command {
        Commands::Describe { defs } => describe(&defs, &config),
        Commands::Plan {
            defs,
            entity_type,
            goal,
        } => plan(&defs, &config, &entity_type, &goal),
        Commands::Simulate {
            defs,
            entity_type,
            ticks,
            action_ticks,
            count,
            json,
        } => simulate(&defs, config, &entity_type, ticks, action_ticks, count, json),
    }
}

fn describe(defs: &Path, config: &AiConfig) -> Result<()> {
    let data = load_definition_data(defs)?;
    let mut planner = ActionPlanner::new(AtomRegistry::new(config.goap.atom_cap()))
        .with_config(config.goap.planner);
    planner
        .add_specs(&data.actions)
        .with_context(|| format!("Invalid action set in {}", defs.display()))?;

    println!(
        "{} actions, {} atoms: {}",
        planner.actions().len(),
        planner.atoms().len(),
        planner.atoms().names().join(", ")
    );
    print!("{}", planner.describe());
    Ok(())
}

fn plan(defs: &Path, config: &AiConfig, entity_type: &str, goal: &[(String, bool)]) -> Result<()> {
    let data = load_definition_data(defs)?;
    let mut state: GoapEntityState<HeadlessWorld> =
        GoapEntityState::new(entity_type, Definition::new(data), &config.goap);
    state
        .load_definition()
        .with_context(|| format!("Cannot load '{entity_type}' from {}", defs.display()))?;
    if !goal.is_empty() {
        state.set_goal(goal.iter().map(|(atom, value)| (atom.as_str(), *value)))?;
    }

    tracing::info!(
        entity_type,
        state = %state.describe_worldstate(),
        goal = %state.describe_goal(),
        "planning"
    );
    let plan = state.planner().plan(&state.current_state(), &state.goal());

    match plan.outcome() {
        PlanOutcome::AtGoal => println!("already at goal"),
        PlanOutcome::NotFound => bail!("no plan reaches {}", state.describe_goal()),
        PlanOutcome::Truncated => bail!("plan search hit the cap of {} actions", plan.cap()),
        PlanOutcome::Found => {
            println!("plan cost = {}", plan.cost);
            for (i, (name, expected)) in plan.actions.iter().zip(&plan.states).enumerate() {
                println!("{i}: {name:<20}{}", state.atoms().describe(expected));
            }
        }
    }
    Ok(())
}

/// Every authored action reports RUNNING for `ticks` resumes, then SUCCESS.
fn timed_action(name: String, ticks: u32) -> ScriptedAction<HeadlessWorld> {
    ScriptedAction::cooperative(move || {
        let mut remaining = ticks;
        task_fn(move |_ctx: &mut GoapContext<'_, HeadlessWorld>| {
            if remaining == 0 {
                return Ok(TaskState::Returned(ActionStatus::Success));
            }
            remaining -= 1;
            Ok(TaskState::Yielded)
        })
    })
    .on_start(move |ctx| {
        tracing::debug!(entity = ctx.entity(), action = %name, "action started");
        Ok(())
    })
}

fn headless_definition(data: DefinitionData, action_ticks: u32) -> Definition<HeadlessWorld> {
    let names: Vec<String> = data.actions.iter().map(|a| a.name.clone()).collect();
    names.into_iter().fold(Definition::new(data), |definition, name| {
        let handlers = timed_action(name.clone(), action_ticks);
        definition.with_action(name, handlers)
    })
}

fn simulate(
    defs: &Path,
    config: AiConfig,
    entity_type: &str,
    ticks: u32,
    action_ticks: u32,
    count: u64,
    json: bool,
) -> Result<()> {
    let data = load_definition_data(defs)?;
    if !data.entity_types.contains_key(entity_type) {
        bail!("{} has no entity type '{entity_type}'", defs.display());
    }

    let dt = config.ai_tick_rate_seconds;
    let mut world = HeadlessWorld;
    let mut system = AiSystem::new(config);
    system.register_definition(headless_definition(data, action_ticks));

    for entity in 1..=count {
        system
            .init(&mut world, entity, entity_type, None)
            .with_context(|| format!("Cannot initialise entity #{entity}"))?;
    }

    tracing::info!(entities = count, ticks, "simulating");
    for _ in 0..ticks {
        system.update_all(&mut world, dt);
    }

    for entity in 1..=count {
        println!("== entity #{entity}");
        for event in system.get_trace_events(entity, usize::MAX)? {
            if json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                println!("{event}");
            }
        }
        println!("{}", system.dump_worldstate(entity)?);
        print!("{}", system.dump_plan(entity)?);
    }

    system.shutdown();
    Ok(())
}
