use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use kinetic_flow::adk::agent::{AgentInput, EchoAgent, FnAgent};
use kinetic_flow::adk::cancel::CancelContext;
use kinetic_flow::kinetic::workflow::loader::WorkflowLoader;
use kinetic_flow::kinetic::workflow::node::{
    Condition, ConditionConfig, Loop, LoopConfig, Node, Parallel, ParallelConfig, Router,
    RouterConfig, Step,
};
use kinetic_flow::kinetic::workflow::storage::{MemoryStorage, StorageStats, WorkflowStorage};
use kinetic_flow::kinetic::workflow::{
    ExecutionContext, RunOptions, Workflow, WorkflowConfig, WorkflowSettings,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the condition/loop/parallel/router showcase
    Demo {
        /// Input to the workflow
        #[arg(short, long, default_value = "tech: my printer is on fire")]
        input: String,
    },
    /// Run a history-enabled workflow over several inputs in one session
    History {
        /// Session id shared by all runs
        #[arg(short, long)]
        session: String,

        /// Number of past runs injected into each step
        #[arg(short, long)]
        runs: Option<usize>,

        /// YAML workflow settings
        #[arg(short, long)]
        config: Option<String>,

        /// Inputs, one run each
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Demo { input } => run_demo(&input).await,
        Commands::History {
            session,
            runs,
            config,
            inputs,
        } => run_history(&session, runs, config.as_deref(), &inputs).await,
    }
}

fn echo_step(id: &str, prefix: &str) -> Arc<dyn Node> {
    Arc::new(Step::from_agent(
        id,
        Arc::new(EchoAgent::new(id).with_prefix(prefix)),
    ))
}

fn demo_workflow() -> Result<Workflow> {
    let triage = Condition::new(ConditionConfig {
        id: "triage".to_string(),
        condition: Some(Arc::new(|exec: &ExecutionContext| {
            exec.current_input().contains("urgent")
        })),
        true_node: Some(echo_step("escalate", "[urgent] ")),
        false_node: Some(echo_step("queue", "[normal] ")),
        ..Default::default()
    })?;

    let polish = Loop::new(LoopConfig {
        id: "polish".to_string(),
        body: Some(echo_step("refine", "~")),
        condition: Some(Arc::new(|_: &ExecutionContext, iteration: usize| iteration < 2)),
        max_iteration: 5,
        ..Default::default()
    })?;

    let fanout = Parallel::new(ParallelConfig {
        id: "fanout".to_string(),
        nodes: vec![
            echo_step("summary", "summary: "),
            echo_step("sentiment", "sentiment: "),
        ],
        ..Default::default()
    })?;

    let route_key = |exec: &ExecutionContext| {
        exec.input
            .split(':')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let dispatch = Router::new(RouterConfig {
        id: "dispatch".to_string(),
        router: Some(Arc::new(route_key)),
        routes: HashMap::from([
            ("tech".to_string(), Some(echo_step("tech-desk", "tech desk <- "))),
            ("billing".to_string(), Some(echo_step("billing-desk", "billing desk <- "))),
            ("spam".to_string(), None),
        ]),
        ..Default::default()
    })?;

    Ok(Workflow::new(WorkflowConfig {
        name: "showcase".to_string(),
        steps: vec![
            Arc::new(triage),
            Arc::new(polish),
            Arc::new(fanout),
            Arc::new(dispatch),
        ],
        ..Default::default()
    }))
}

async fn run_demo(input: &str) -> Result<()> {
    let workflow = demo_workflow()?;
    println!("Running workflow: {}", workflow.name());

    let exec = workflow
        .run(&CancelContext::new(), input, "", RunOptions::new())
        .await?;

    let mut keys: Vec<&String> = exec.data.keys().collect();
    keys.sort();
    for key in keys {
        println!("  {} = {}", key, exec.data[key]);
    }
    println!("Response: {}", exec.output);
    Ok(())
}

async fn run_history(
    session_id: &str,
    runs: Option<usize>,
    config: Option<&str>,
    inputs: &[String],
) -> Result<()> {
    let mut settings = match config {
        Some(path) => WorkflowLoader::new()
            .load_settings(path)
            .with_context(|| format!("loading {}", path))?,
        None => WorkflowSettings {
            name: "history-demo".to_string(),
            add_history_to_steps: true,
            ..Default::default()
        },
    };
    settings.enable_history = true;
    if let Some(runs) = runs {
        settings.num_history_runs = runs;
    }
    if inputs.iter().any(|input| input.trim().is_empty()) {
        bail!("inputs must not be empty");
    }

    let storage = Arc::new(MemoryStorage::new(settings.storage.max_sessions));
    let responder = FnAgent::new("responder", |input: AgentInput| {
        let seen = input
            .history_context
            .as_deref()
            .map(|history| history.matches("[run-").count())
            .unwrap_or(0);
        Ok(format!("You said '{}' ({} earlier runs in view)", input.content, seen))
    });

    let mut workflow_config =
        WorkflowConfig::from_settings(&settings, vec![Arc::new(Step::from_agent("respond", Arc::new(responder)))]);
    workflow_config.history_store = Some(storage.clone() as Arc<dyn WorkflowStorage>);
    let workflow = Workflow::new(workflow_config);

    let ctx = CancelContext::new();
    for input in inputs {
        let exec = workflow
            .run(&ctx, input, session_id, RunOptions::new())
            .await?;
        println!("> {}", input);
        println!("< {}", exec.output);
    }

    let session = storage.get_session(&ctx, session_id).await?;
    let stats = storage.get_workflow_stats(&ctx, workflow.id()).await?;
    println!();
    println!("Session {} ({} runs)", session.session_id(), session.count_runs());
    println!("  completed:  {}", stats.completed_runs);
    println!("  successful: {}", stats.successful_runs);
    println!("  failed:     {}", stats.failed_runs);
    println!("  avg time:   {:?}", stats.average_duration);
    Ok(())
}
