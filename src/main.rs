use anyhow::{Context, Result};
use std::sync::Arc;
use tabwalk::cli::{Args, ConfigDiscovery, ExecutionMode, RunConfig};
use tabwalk::{AgentRun, Simulation, env};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(env::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match mode {
        ExecutionMode::Run(config) => run_simulation(config).await,
        ExecutionMode::ShowConfig { config_override } => {
            let config = ConfigDiscovery::load(config_override.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
        ExecutionMode::ShowDiscovery => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::init_user_config()?;
            println!("Configuration file: {:?}", path);
            Ok(())
        }
    }
}

async fn run_simulation(run: RunConfig) -> Result<()> {
    let mut config = ConfigDiscovery::load(run.config_override.as_deref())?;
    if run.seed.is_some() {
        config.seed = run.seed;
    }

    let simulation = Arc::new(Simulation::new(config)?);
    info!(
        "Running {} agent(s) for {} steps each",
        run.agents, run.steps
    );

    let mut handles = Vec::with_capacity(run.agents);
    for agent in 0..run.agents {
        let simulation = Arc::clone(&simulation);
        let (steps, trace) = (run.steps, run.trace);
        handles.push(tokio::task::spawn_blocking(move || {
            if trace {
                simulation.run_agent_traced(agent, steps)
            } else {
                simulation.run_agent(agent, steps)
            }
        }));
    }

    let mut failed = 0;
    for handle in handles {
        match handle.await.context("Agent thread panicked")? {
            Ok(agent_run) => print_run(&agent_run, &run)?,
            Err(e) => {
                error!("Agent failed: {:#}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} agents failed", failed, run.agents);
    }
    Ok(())
}

fn print_run(agent_run: &AgentRun, run: &RunConfig) -> Result<()> {
    if run.trace {
        for report in &agent_run.reports {
            println!("{}", serde_json::to_string(report)?);
        }
    }

    if run.json {
        println!("{}", serde_json::to_string(agent_run)?);
        return Ok(());
    }

    println!(
        "Agent {} (seed {}): {} steps",
        agent_run.agent, agent_run.seed, agent_run.steps
    );
    for (name, summary) in &agent_run.tasks {
        println!(
            "  {:<16} completed {:>5}  aborted {:>5}  estimate {:>8.2}",
            name, summary.completed, summary.aborted, summary.final_estimate
        );
    }
    Ok(())
}
