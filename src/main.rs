mod cli;

use ilrt::{config, runner};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use il_component::StateId;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "ilrt=trace,il_component=trace,il_core=debug".to_string()
        } else {
            "ilrt=info,il_component=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            graph,
            json,
            events,
        } => run_graph(&graph, json, events),
        Commands::Validate { graph } => validate_graph(&graph),
        Commands::States => print_states(),
        Commands::Version => {
            println!("ilrt {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_graph(path: &Path, json: bool, show_events: bool) -> Result<()> {
    let config = config::load_config(path)?;
    let report = runner::run(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Steps executed: {}", report.steps_executed);
        if show_events {
            println!("\nEvents: {}", report.events.len());
            for event in &report.events {
                let name = report
                    .components
                    .iter()
                    .find(|c| c.uuid == event.component)
                    .map_or("?", |c| c.name.as_str());
                println!("  {} {:?}", name, event.payload);
            }
        }
        println!("\nFinal states:");
        for component in &report.components {
            println!("  {:<32} {}", component.name, component.state);
        }
    }

    if let Some(reason) = &report.aborted {
        anyhow::bail!("Script aborted: {}", reason);
    }
    Ok(())
}

fn validate_graph(path: &Path) -> Result<()> {
    println!("Validating graph: {:?}", path);
    let config = config::load_config(path)?;
    println!("✓ Graph is valid");
    println!("  Components: {}", config.components.len());
    for component in &config.components {
        println!(
            "    {} ({} ports, processor: {})",
            component.name,
            component.ports.len(),
            component.processor
        );
    }
    println!("  Tunnels: {}", config.tunnels.len());
    for tunnel in &config.tunnels {
        println!("    {} -> {}", tunnel.from, tunnel.to);
    }
    println!("  Script steps: {}", config.script.len());
    Ok(())
}

fn print_states() -> Result<()> {
    println!("{:<28} {:<18} Accepts", "State", "Reports");
    for id in StateId::ALL {
        let targets: Vec<String> = id
            .info()
            .transitions
            .iter()
            .map(ToString::to_string)
            .collect();
        let targets = if targets.is_empty() {
            "-".to_string()
        } else {
            targets.join(", ")
        };
        println!("{:<28} {:<18} {}", id.to_string(), id.reported().to_string(), targets);
    }
    Ok(())
}
