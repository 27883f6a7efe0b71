//! Scripted graph runs.
//!
//! The runner instantiates every component of a [`GraphConfig`], wires the
//! tunnels and feeds the script through a [`Manager`]. Between steps it plays
//! the IL client: it supplies buffers to every non-tunneled port that
//! advertises ACCEPT_USE_BUFFER and frees them again when the component
//! deallocates. A step failing with an unexpected error aborts the run.

use il_component::{Cmd, Graph, Holder, ManagedFsm, Manager, Operations, StateId};
use il_core::{
    BufferId, ComponentUuid, Error, Event, EventBus, IlState, PortStatus, Result as IlResult,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::config::{Endpoint, GraphConfig, Step};

/// Capacity of the event channel the runner listens on.
const EVENT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub name: String,
    pub uuid: ComponentUuid,
    pub state: IlState,
}

/// Outcome of one scripted run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub steps_executed: usize,
    pub aborted: Option<String>,
    pub components: Vec<ComponentReport>,
    pub events: Vec<Event>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn state_of(&self, name: &str) -> Option<IlState> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.state)
    }
}

// ---------------------------------------------------------------------------
// Script state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Running,
    Finished,
    Aborted,
}

pub enum ScriptEvent {
    Step(Step),
    Finish,
    Abort(Error),
}

pub struct ScriptFsm {
    state: ScriptState,
    executed: usize,
}

impl ScriptFsm {
    fn new() -> Self {
        Self {
            state: ScriptState::Running,
            executed: 0,
        }
    }

    pub fn state(&self) -> ScriptState {
        self.state
    }
}

impl ManagedFsm<GraphOps> for ScriptFsm {
    type Event = ScriptEvent;

    fn process_event(&mut self, ops: &mut GraphOps, event: ScriptEvent) {
        match (self.state, event) {
            (ScriptState::Running, ScriptEvent::Step(step)) => {
                self.executed += 1;
                ops.run_step(self.executed, &step);
            }
            (ScriptState::Running, ScriptEvent::Finish) => {
                tracing::debug!("script finished after {} steps", self.executed);
                self.state = ScriptState::Finished;
            }
            (_, ScriptEvent::Abort(err)) => {
                tracing::error!("script aborted at step {}: {}", self.executed, err);
                ops.aborted = Some(err.to_string());
                self.state = ScriptState::Aborted;
            }
            (state, _) => tracing::debug!("script event ignored in {:?}", state),
        }
    }

    fn is_terminated(&self) -> bool {
        self.state != ScriptState::Running
    }

    fn fatal_event(error: Error) -> ScriptEvent {
        ScriptEvent::Abort(error)
    }
}

// ---------------------------------------------------------------------------
// Graph operations
// ---------------------------------------------------------------------------

/// The side-effecting half of a run: the graph, the client-side buffer
/// bookkeeping and the collected events.
pub struct GraphOps {
    graph: Graph,
    names: Vec<(String, ComponentUuid)>,
    by_name: HashMap<String, ComponentUuid>,
    events: broadcast::Receiver<Event>,
    log: Vec<Event>,
    pending: Option<Error>,
    aborted: Option<String>,
    final_states: Vec<ComponentReport>,
}

impl GraphOps {
    /// Instantiate every component and connect the tunnels.
    pub fn build(config: &GraphConfig) -> IlResult<Self> {
        let bus = Arc::new(EventBus::new(EVENT_CAPACITY));
        let events = bus.subscribe();
        let mut graph = Graph::new(bus);

        let mut names = Vec::new();
        let mut by_name = HashMap::new();
        for component in &config.components {
            let uuid = graph.add(component.clone())?;
            names.push((component.name.clone(), uuid));
            by_name.insert(component.name.clone(), uuid);
        }

        let mut ops = Self {
            graph,
            names,
            by_name,
            events,
            log: Vec::new(),
            pending: None,
            aborted: None,
            final_states: Vec::new(),
        };
        for tunnel in &config.tunnels {
            let from = ops.endpoint(&tunnel.from)?;
            let to = ops.endpoint(&tunnel.to)?;
            ops.graph.connect(from.0, from.1, to.0, to.1)?;
        }
        Ok(ops)
    }

    fn endpoint(&self, raw: &str) -> IlResult<(ComponentUuid, u32)> {
        let endpoint: Endpoint = raw.parse().map_err(Error::bad_parameter)?;
        Ok((self.resolve(&endpoint.component)?, endpoint.port))
    }

    fn resolve(&self, name: &str) -> IlResult<ComponentUuid> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::bad_parameter(format!("unknown component '{name}'")))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn run_step(&mut self, number: usize, step: &Step) {
        let outcome = self.execute(step);
        match (&outcome, step.expect) {
            (Ok(()), None) => tracing::info!("step {}: {}", number, step),
            (Err(err), Some(code)) if err.code() == code => {
                tracing::info!("step {}: {} failed as expected ({})", number, step, code);
            }
            (Err(err), _) => {
                tracing::warn!("step {}: {} failed: {}", number, step, err);
                self.pending = Some(err.clone());
            }
            (Ok(()), Some(code)) => {
                self.pending = Some(Error::Internal(format!(
                    "step {number}: {step} succeeded, expected {code}"
                )));
            }
        }
        self.drain_events();
    }

    fn execute(&mut self, step: &Step) -> IlResult<()> {
        let id = self.resolve(&step.component)?;
        let command = step.to_command().map_err(Error::bad_parameter)?;
        self.graph.send_command(id, command)?;
        self.serve_clients()
    }

    /// Act as the IL client for every non-tunneled port until no port asks
    /// for anything more.
    fn serve_clients(&mut self) -> IlResult<()> {
        loop {
            let work = self.client_work();
            if work.is_empty() {
                return Ok(());
            }
            for item in work {
                match item {
                    ClientWork::Use { id, port, size } => {
                        let header = self.graph.use_buffer(id, port, size)?;
                        tracing::debug!("client supplied buffer {} on port {}", header.id, port);
                    }
                    ClientWork::Free { id, port, buffer } => {
                        self.graph.free_buffer(id, port, buffer)?;
                        tracing::debug!("client freed buffer {} on port {}", buffer, port);
                    }
                }
            }
        }
    }

    fn client_work(&self) -> Vec<ClientWork> {
        let mut work = Vec::new();
        for component in self.graph.components() {
            if component.get_state() == IlState::Invalid {
                continue;
            }
            let id = component.uuid();
            let deallocating = component.state_id() == StateId::IdleToLoaded;
            for port in component.ports().iter().filter(|p| !p.is_tunneled()) {
                let status = port.status();
                if deallocating || status.contains(PortStatus::BEING_DISABLED) {
                    work.extend(port.buffer_ids(Holder::Peer).into_iter().map(|buffer| {
                        ClientWork::Free {
                            id,
                            port: port.index(),
                            buffer,
                        }
                    }));
                } else if status.contains(PortStatus::ACCEPT_USE_BUFFER) {
                    let missing =
                        (port.buffer_count_actual() as usize).saturating_sub(port.buffer_count());
                    work.extend((0..missing).map(|_| ClientWork::Use {
                        id,
                        port: port.index(),
                        size: port.buffer_size(),
                    }));
                }
            }
        }
        work
    }

    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    tracing::debug!("event from {}: {:?}", event.component, event.payload);
                    self.log.push(event);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("event listener lagged, {} events skipped", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    fn snapshot(&self) -> Vec<ComponentReport> {
        self.names
            .iter()
            .filter_map(|(name, uuid)| {
                self.graph.get_state(*uuid).ok().map(|state| ComponentReport {
                    name: name.clone(),
                    uuid: *uuid,
                    state,
                })
            })
            .collect()
    }
}

impl Operations for GraphOps {
    fn internal_error(&mut self) -> Option<Error> {
        self.pending.take()
    }

    fn deinit(&mut self) {
        self.drain_events();
        self.final_states = self.snapshot();
        for (name, uuid) in &self.names {
            if let Err(e) = self.graph.remove(*uuid) {
                tracing::warn!("failed to remove component '{}': {}", name, e);
            }
        }
    }
}

enum ClientWork {
    Use {
        id: ComponentUuid,
        port: u32,
        size: u32,
    },
    Free {
        id: ComponentUuid,
        port: u32,
        buffer: BufferId,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the graph described by `config` and run its script to the end.
pub fn run(config: &GraphConfig) -> anyhow::Result<RunReport> {
    let ops = GraphOps::build(config)?;
    let mut manager = Manager::new("script", ScriptFsm::new(), ops);
    tracing::info!(
        "running {} steps over {} components",
        config.script.len(),
        config.components.len()
    );

    for step in &config.script {
        if manager.dispatch(Cmd::new(ScriptEvent::Step(step.clone())))? {
            break;
        }
    }
    if !manager.is_terminated() {
        manager.dispatch(Cmd::new(ScriptEvent::Finish))?;
    }

    let (fsm, ops) = manager.into_parts();
    Ok(RunReport {
        steps_executed: fsm.executed,
        aborted: ops.aborted,
        components: ops.final_states,
        events: ops.log,
    })
}
