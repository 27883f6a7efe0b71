//! Integration tests for graph configuration loading and validation.

use il_core::{ErrorCode, IlState, PortDirection};
use ilrt::config::{load_config, parse_config, Endpoint, StepKind};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

const TWO_STAGE: &str = r#"
[[components]]
name = "OMX.ilrt.src"
processor = false
[[components.ports]]
index = 0
direction = "output"
buffer_size = 1024

[[components]]
name = "OMX.ilrt.dst"
[[components.ports]]
index = 0
direction = "input"
supplier = "input"

[[tunnels]]
from = "OMX.ilrt.src:0"
to = "OMX.ilrt.dst:0"

[[script]]
component = "OMX.ilrt.dst"
command = "state_set"
target = "wait_for_resources"

[[script]]
component = "OMX.ilrt.src"
command = "port_disable"

[[script]]
component = "OMX.ilrt.src"
command = "mark_buffer"
port = 0
mark = 99
expect = "IncorrectStateOperation"
"#;

fn err_chain(config: &str) -> String {
    format!("{:#}", parse_config(config).unwrap_err())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn parses_components_tunnels_and_script() {
    let config = parse_config(TWO_STAGE).unwrap();
    assert_eq!(config.components.len(), 2);
    assert!(!config.components[0].processor);
    assert_eq!(config.components[0].ports[0].buffer_size, 1024);
    assert_eq!(config.components[1].ports[0].direction, PortDirection::Input);

    assert_eq!(config.tunnels.len(), 1);
    let from: Endpoint = config.tunnels[0].from.parse().unwrap();
    assert_eq!(from.component, "OMX.ilrt.src");
    assert_eq!(from.port, 0);

    assert_eq!(config.script.len(), 3);
    assert_eq!(config.script[0].target, Some(IlState::WaitForResources));
    assert_eq!(config.script[1].command, StepKind::PortDisable);
    assert_eq!(config.script[1].port, None);
    assert_eq!(
        config.script[2].expect,
        Some(ErrorCode::IncorrectStateOperation)
    );
}

#[test]
fn load_config_reads_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.toml");
    fs::write(&path, TWO_STAGE).unwrap();
    let config = load_config(&path).unwrap();
    assert_eq!(config.components.len(), 2);
}

#[test]
fn demo_graph_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/decode_pipeline.toml");
    let config = load_config(&path).unwrap();
    assert_eq!(config.components.len(), 3);
    assert_eq!(config.tunnels.len(), 2);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn empty_graph_is_rejected() {
    assert!(err_chain("").contains("no components"));
}

#[test]
fn duplicate_names_are_rejected() {
    let config = r#"
[[components]]
name = "OMX.ilrt.same"
[[components]]
name = "OMX.ilrt.same"
"#;
    assert!(err_chain(config).contains("Duplicate component name"));
}

#[test]
fn invalid_port_table_is_rejected() {
    let config = r#"
[[components]]
name = "OMX.ilrt.bad"
[[components.ports]]
index = 0
direction = "input"
buffer_count_min = 4
buffer_count_actual = 2
"#;
    assert!(err_chain(config).contains("is invalid"));
}

#[test]
fn tunnel_endpoints_must_exist() {
    let config = TWO_STAGE.replace("OMX.ilrt.dst:0", "OMX.ilrt.dst:3");
    assert!(err_chain(&config).contains("unknown port"));

    let config = TWO_STAGE.replace("to = \"OMX.ilrt.dst:0\"", "to = \"OMX.ilrt.nowhere:0\"");
    assert!(err_chain(&config).contains("unknown component"));

    let config = TWO_STAGE.replace("OMX.ilrt.dst:0", "OMX.ilrt.dst");
    assert!(err_chain(&config).contains("component:port"));
}

#[test]
fn a_port_is_tunneled_at_most_once() {
    let config = format!(
        "{TWO_STAGE}\n[[tunnels]]\nfrom = \"OMX.ilrt.src:0\"\nto = \"OMX.ilrt.dst:0\"\n"
    );
    assert!(err_chain(&config).contains("tunneled more than once"));
}

#[test]
fn script_must_target_known_components() {
    let config = TWO_STAGE.replace(
        "component = \"OMX.ilrt.dst\"\ncommand = \"state_set\"",
        "component = \"OMX.ilrt.ghost\"\ncommand = \"state_set\"",
    );
    assert!(err_chain(&config).contains("unknown component 'OMX.ilrt.ghost'"));
}

#[test]
fn incomplete_steps_are_rejected() {
    let config = TWO_STAGE.replace("target = \"wait_for_resources\"\n", "");
    assert!(err_chain(&config).contains("state_set needs a target"));

    let config = TWO_STAGE.replace("mark = 99\n", "");
    assert!(err_chain(&config).contains("mark_buffer needs a port and a mark"));
}
