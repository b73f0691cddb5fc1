use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dom_pilot::page::Page;
use dom_pilot::{
    Agent, AgentEvent, Brain, BrowserSession, Config, ConsoleOperator, Executor, RunOutcome,
    SafetyGate, SearchHeuristic,
};

#[derive(Parser, Debug)]
#[command(name = "agent", about = "Drive a Chrome tab towards a goal with an LLM")]
struct Cli {
    /// What the agent should achieve. Read from stdin when omitted.
    goal: Option<String>,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page to open before the first step
    #[arg(long)]
    start_url: Option<String>,

    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    #[arg(long)]
    max_steps: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if cli.headless {
        config.browser.headless = true;
    }
    if let Some(url) = cli.start_url {
        config.browser.start_url = url;
    }
    if let Some(max) = cli.max_steps {
        config.agent.max_steps = max;
    }

    let goal = match cli.goal {
        Some(goal) => goal,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let goal = goal.trim().to_string();
    if goal.is_empty() {
        bail!("no goal given");
    }

    // Needs the runtime handle, so it is built here and moved into the worker.
    let brain = Brain::new(&config.llm)?;

    tokio::task::spawn_blocking(move || run(config, brain, &goal))
        .await
        .map_err(|e| anyhow::anyhow!("agent loop panicked: {}", e))?
}

fn run(config: Config, brain: Brain, goal: &str) -> Result<()> {
    let session = BrowserSession::launch(&config.browser, config.user_data_dir())?;
    let page = session.page();
    let timings = config.timings();

    info!(url = %config.browser.start_url, "opening start page");
    page.goto(&config.browser.start_url, timings.navigation)?;

    let executor = Executor::new(&page, timings)
        .with_gate(SafetyGate::extended(config.safety.extra_terms.iter()))
        .with_search_heuristic(SearchHeuristic::from_config(&config.search));
    let mut agent =
        Agent::new(executor, brain, ConsoleOperator::stdio()).with_limits(&config.agent);

    let outcome = agent.run(goal, &mut print_event);

    if let Err(e) = page.close() {
        warn!("failed to close tab: {:#}", e);
    }

    match outcome? {
        RunOutcome::Completed { steps, .. } => info!(steps, "finished"),
        RunOutcome::StepLimit { steps } => warn!(steps, "stopped at step limit"),
    }
    Ok(())
}

fn print_event(event: AgentEvent) {
    match event {
        AgentEvent::Thinking { step } => info!(step, "asking for next action"),
        AgentEvent::Step { number, description } => println!("[{number}] → {description}"),
        AgentEvent::StepError { message } => println!("    ! {message}"),
        AgentEvent::Observation { text } => {
            for line in text.lines() {
                println!("    {line}");
            }
        }
        AgentEvent::InputRequired { question } => println!("? {question}"),
        AgentEvent::TaskComplete { summary } => match summary {
            Some(summary) => println!("✓ Done: {summary}"),
            None => println!("✓ Done"),
        },
        AgentEvent::TaskError { message } => println!("✗ {message}"),
    }
}
