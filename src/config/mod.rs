mod types;

pub use types::*;

use anyhow::{Context, Result};
use il_core::PortDirection;
use std::collections::HashSet;
use std::path::Path;

/// Load a graph description from a TOML file
pub fn load_config(path: &Path) -> Result<GraphConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid graph file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate a graph description held in memory
pub fn parse_config(content: &str) -> Result<GraphConfig> {
    let config: GraphConfig = toml::from_str(content).context("Failed to parse graph TOML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate a graph description
fn validate_config(config: &GraphConfig) -> Result<()> {
    if config.components.is_empty() {
        anyhow::bail!("Graph declares no components");
    }

    // Component tables and names
    let mut names = HashSet::new();
    for component in &config.components {
        component
            .validate()
            .with_context(|| format!("Component '{}' is invalid", component.name))?;
        if !names.insert(component.name.as_str()) {
            anyhow::bail!("Duplicate component name '{}'", component.name);
        }
    }

    // Tunnels
    let mut used = HashSet::new();
    for tunnel in &config.tunnels {
        let from = endpoint(config, &tunnel.from, PortDirection::Output)?;
        let to = endpoint(config, &tunnel.to, PortDirection::Input)?;
        if from.component == to.component {
            anyhow::bail!("Tunnel {} -> {} loops back into one component", from, to);
        }
        for end in [&from, &to] {
            if !used.insert(end.to_string()) {
                anyhow::bail!("Port {} is tunneled more than once", end);
            }
        }
    }

    // Script
    for (i, step) in config.script.iter().enumerate() {
        let Some(component) = config.component(&step.component) else {
            anyhow::bail!(
                "Script step {} targets unknown component '{}'",
                i + 1,
                step.component
            );
        };
        step.to_command()
            .map_err(|e| anyhow::anyhow!("Script step {}: {}", i + 1, e))?;
        if let Some(port) = step.port {
            if !component.ports.iter().any(|p| p.index == port) {
                tracing::warn!(
                    "Script step {} addresses port {} which '{}' does not declare",
                    i + 1,
                    port,
                    step.component
                );
            }
        }
    }

    Ok(())
}

fn endpoint(config: &GraphConfig, raw: &str, direction: PortDirection) -> Result<Endpoint> {
    let endpoint: Endpoint = raw.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let component = config
        .component(&endpoint.component)
        .with_context(|| format!("Tunnel endpoint {} names an unknown component", endpoint))?;
    let port = component
        .ports
        .iter()
        .find(|p| p.index == endpoint.port)
        .with_context(|| format!("Tunnel endpoint {} names an unknown port", endpoint))?;
    if port.direction != direction {
        anyhow::bail!(
            "Tunnel endpoint {} is an {} port, expected {}",
            endpoint,
            port.direction,
            direction
        );
    }
    Ok(endpoint)
}
