//! Tunneled components driven through a [`Graph`]: barrier coordination in
//! both request orders, buffer return on the way down, per-port enable and
//! disable, and mark propagation.

mod common;

use assert_matches::assert_matches;
use common::*;
use il_component::{BufferHeader, Graph, Holder, StateId};
use il_core::{
    BufferId, BufferSupplier, Command, CommandKind, ComponentConfig, ComponentUuid, Error, EventPayload, IlState,
    Mark, PortConfig, PortDirection, PortSelector, PortStatus,
};

fn pipeline() -> (Graph, ComponentUuid, ComponentUuid) {
    init_tracing();
    let mut g = Graph::new(bus());
    let a = g.add(source()).unwrap();
    let b = g.add(sink()).unwrap();
    g.connect(a, 0, b, 0).unwrap();
    (g, a, b)
}

fn set_state(g: &mut Graph, id: ComponentUuid, target: IlState) {
    g.send_command(id, state_set(target)).unwrap();
}

fn held_ids(g: &Graph, id: ComponentUuid, holder: Holder) -> Vec<BufferId> {
    g.component(id)
        .unwrap()
        .port(0)
        .unwrap()
        .buffer_ids(holder)
}

#[test]
fn supplier_first_waits_for_the_neighbour_to_accept() {
    let (mut g, a, b) = pipeline();

    set_state(&mut g, a, IlState::Idle);
    assert_eq!(g.component(a).unwrap().state_id(), StateId::LoadedToIdle);
    assert_eq!(g.component(a).unwrap().port(0).unwrap().buffer_count(), 0);

    set_state(&mut g, b, IlState::Idle);
    assert_eq!(g.get_state(a).unwrap(), IlState::Idle);
    assert_eq!(g.get_state(b).unwrap(), IlState::Idle);

    let a_port = g.component(a).unwrap().port(0).unwrap();
    let b_port = g.component(b).unwrap().port(0).unwrap();
    assert_eq!(a_port.buffers_held_by_component(), 2);
    assert_eq!(b_port.buffers_held_by_peer(), 2);
    assert!(!b_port.status().contains(PortStatus::ACCEPT_USE_BUFFER));
    assert!(!a_port.peer_status().contains(PortStatus::ACCEPT_USE_BUFFER));
}

#[test]
fn non_supplier_first_lets_the_supplier_allocate_at_once() {
    let (mut g, a, b) = pipeline();

    set_state(&mut g, b, IlState::Idle);
    assert_eq!(g.component(b).unwrap().state_id(), StateId::LoadedToIdle);
    assert!(g
        .component(a)
        .unwrap()
        .port(0)
        .unwrap()
        .peer_status()
        .contains(PortStatus::ACCEPT_USE_BUFFER));

    set_state(&mut g, a, IlState::Idle);
    assert_eq!(g.get_state(a).unwrap(), IlState::Idle);
    assert_eq!(g.get_state(b).unwrap(), IlState::Idle);
    assert!(g.component(b).unwrap().port(0).unwrap().is_populated());
}

#[test]
fn supplier_waits_for_every_neighbour() {
    init_tracing();
    let mut g = Graph::new(bus());
    let tee = g
        .add(
            ComponentConfig {
                name: "OMX.test.tee".into(),
                ..ComponentConfig::default()
            }
            .with_port(PortConfig::new(0, PortDirection::Output).buffers(1, 64))
            .with_port(PortConfig::new(1, PortDirection::Output).buffers(1, 64)),
        )
        .unwrap();
    let left = g.add(sink()).unwrap();
    let right = g.add(sink()).unwrap();
    g.connect(tee, 0, left, 0).unwrap();
    g.connect(tee, 1, right, 0).unwrap();

    set_state(&mut g, tee, IlState::Idle);
    set_state(&mut g, left, IlState::Idle);
    assert_eq!(g.component(tee).unwrap().state_id(), StateId::LoadedToIdle);
    assert_eq!(g.component(left).unwrap().state_id(), StateId::LoadedToIdle);

    set_state(&mut g, right, IlState::Idle);
    for id in [tee, left, right] {
        assert_eq!(g.get_state(id).unwrap(), IlState::Idle);
    }
}

#[test]
fn buffers_circulate_while_executing() {
    let (mut g, a, b) = pipeline();
    for target in [IlState::Idle, IlState::Executing] {
        set_state(&mut g, a, target);
        set_state(&mut g, b, target);
    }
    assert_eq!(g.get_state(a).unwrap(), IlState::Executing);

    let id = held_ids(&g, a, Holder::Component)[0];
    g.buffer_done(a, 0, id).unwrap();

    // The sink consumed it and the source got it back for refilling.
    assert_eq!(
        g.component(a).unwrap().port(0).unwrap().holder(id),
        Some(Holder::Component)
    );
    assert_eq!(
        g.component(b).unwrap().port(0).unwrap().holder(id),
        Some(Holder::Peer)
    );
}

#[test]
fn executing_to_idle_waits_for_supplied_buffers() {
    init_tracing();
    let mut g = Graph::new(bus());
    let a = g
        .add(source().with_port(PortConfig::new(1, PortDirection::Output).disabled()))
        .unwrap();
    let b = g
        .add_with_processor(sink(), Box::new(HoldingProcessor))
        .unwrap();
    g.connect(a, 0, b, 0).unwrap();
    for target in [IlState::Idle, IlState::Executing] {
        set_state(&mut g, a, target);
        set_state(&mut g, b, target);
    }
    for id in held_ids(&g, a, Holder::Component) {
        g.buffer_done(a, 0, id).unwrap();
    }
    assert_eq!(
        g.component(b).unwrap().port(0).unwrap().buffers_held_by_component(),
        2
    );

    set_state(&mut g, a, IlState::Idle);
    assert_eq!(g.component(a).unwrap().state_id(), StateId::ExecutingToIdle);
    let a_port = g.component(a).unwrap().port(0).unwrap();
    assert!(a_port.status().contains(PortStatus::AWAIT_BUFFERS_RETURN));
    for port in [0, 1, 7] {
        assert_matches!(
            g.use_buffer(a, port, 128),
            Err(Error::NotImplemented { .. }),
            "port {port}"
        );
    }

    set_state(&mut g, b, IlState::Idle);
    assert_eq!(g.get_state(a).unwrap(), IlState::Idle);
    assert_eq!(g.get_state(b).unwrap(), IlState::Idle);
    let a_port = g.component(a).unwrap().port(0).unwrap();
    assert!(!a_port.status().contains(PortStatus::AWAIT_BUFFERS_RETURN));
    assert_eq!(a_port.buffers_held_by_component(), 2);
    assert_matches!(
        g.use_buffer(a, 0, 128),
        Err(Error::IncorrectStateOperation { .. })
    );
}

#[test]
fn input_supplier_keeps_returned_buffers_on_the_way_down() {
    init_tracing();
    let mut g = Graph::new(bus());
    let a = g.add(source()).unwrap();
    let mut supplying_sink = sink();
    supplying_sink.ports[0].supplier = BufferSupplier::Input;
    let b = g.add(supplying_sink).unwrap();
    g.connect(a, 0, b, 0).unwrap();
    assert!(g.component(b).unwrap().port(0).unwrap().is_supplier());

    for target in [IlState::Idle, IlState::Executing] {
        set_state(&mut g, a, target);
        set_state(&mut g, b, target);
    }
    for id in held_ids(&g, b, Holder::Component) {
        g.buffer_done(b, 0, id).unwrap();
    }
    assert_eq!(held_ids(&g, a, Holder::Component).len(), 2);

    set_state(&mut g, b, IlState::Idle);
    assert_eq!(g.component(b).unwrap().state_id(), StateId::ExecutingToIdle);
    assert!(g
        .component(b)
        .unwrap()
        .port(0)
        .unwrap()
        .status()
        .contains(PortStatus::AWAIT_BUFFERS_RETURN));

    set_state(&mut g, a, IlState::Idle);
    assert_eq!(g.get_state(a).unwrap(), IlState::Idle);
    assert_eq!(g.get_state(b).unwrap(), IlState::Idle);
    let b_port = g.component(b).unwrap().port(0).unwrap();
    assert_eq!(b_port.buffers_held_by_component(), 2);
    assert_eq!(b_port.buffers_held_by_peer(), 0);
    assert!(!b_port.status().contains(PortStatus::AWAIT_BUFFERS_RETURN));
}

#[test]
fn idle_to_loaded_releases_supplied_buffers() {
    let (mut g, a, b) = pipeline();
    set_state(&mut g, a, IlState::Idle);
    set_state(&mut g, b, IlState::Idle);

    set_state(&mut g, a, IlState::Loaded);
    assert_eq!(g.get_state(a).unwrap(), IlState::Loaded);
    assert!(!g.component(b).unwrap().port(0).unwrap().has_buffers());

    set_state(&mut g, b, IlState::Loaded);
    assert_eq!(g.get_state(b).unwrap(), IlState::Loaded);
}

#[test]
fn client_buffer_calls_on_tunneled_ports_are_rejected() {
    let (mut g, a, b) = pipeline();
    set_state(&mut g, b, IlState::Idle);
    assert_matches!(g.use_buffer(b, 0, 128), Err(Error::BadParameter(_)));
    let stray = BufferHeader::external(0, 128);
    assert_matches!(g.free_buffer(a, 0, stray.id), Err(Error::BadParameter(_)));
}

#[test]
fn tunneled_port_disable_and_enable_in_idle() {
    let (mut g, a, b) = pipeline();
    set_state(&mut g, a, IlState::Idle);
    set_state(&mut g, b, IlState::Idle);
    let disable = Command::PortDisable {
        port: PortSelector::Port(0),
    };
    let enable = Command::PortEnable {
        port: PortSelector::Port(0),
    };

    g.send_command(b, disable.clone()).unwrap();
    assert!(g.component(b).unwrap().port(0).unwrap().is_enabled());
    g.send_command(a, disable).unwrap();
    for id in [a, b] {
        let port = g.component(id).unwrap().port(0).unwrap();
        assert!(!port.is_enabled());
        assert!(!port.has_buffers());
    }

    g.send_command(b, enable.clone()).unwrap();
    assert!(!g.component(b).unwrap().port(0).unwrap().is_enabled());
    g.send_command(a, enable).unwrap();
    for id in [a, b] {
        let port = g.component(id).unwrap().port(0).unwrap();
        assert!(port.is_enabled());
        assert!(port.is_populated());
        assert_eq!(port.status(), PortStatus::NONE);
        let done: Vec<CommandKind> = g
            .bus()
            .history_for(id)
            .into_iter()
            .filter_map(|e| match e {
                EventPayload::CmdComplete {
                    command,
                    port: Some(0),
                    ..
                } => Some(command),
                _ => None,
            })
            .collect();
        assert_eq!(done, vec![CommandKind::PortDisable, CommandKind::PortEnable]);
    }
}

#[test]
fn mark_is_reported_by_the_receiving_component() {
    let (mut g, a, b) = pipeline();
    for target in [IlState::Idle, IlState::Executing] {
        set_state(&mut g, a, target);
        set_state(&mut g, b, target);
    }
    g.send_command(
        a,
        Command::MarkBuffer {
            port: 0,
            mark: Mark { data: 42 },
        },
    )
    .unwrap();
    let id = held_ids(&g, a, Holder::Component)[0];
    g.buffer_done(a, 0, id).unwrap();

    assert!(g
        .bus()
        .history_for(b)
        .contains(&EventPayload::MarkReached { port: 0, mark: 42 }));
    assert!(!g
        .bus()
        .history_for(a)
        .iter()
        .any(|e| matches!(e, EventPayload::MarkReached { .. })));
}

#[test]
fn tunnel_setup_requires_loaded_or_a_disabled_port() {
    init_tracing();
    let mut g = Graph::new(bus());
    let a = g.add(disabled_ports()).unwrap();
    let b = g.add(sink()).unwrap();
    set_state(&mut g, a, IlState::Idle);
    assert_eq!(g.get_state(a).unwrap(), IlState::Idle);

    // Port 1 of `a` is disabled, so it may be tunneled outside Loaded.
    g.connect(a, 1, b, 0).unwrap();
    g.disconnect(a, 1).unwrap();

    g.send_command(
        a,
        Command::PortEnable {
            port: PortSelector::Port(1),
        },
    )
    .unwrap();
    let header = g.use_buffer(a, 1, 8192).unwrap();
    g.use_buffer(a, 1, 8192).unwrap();
    assert!(g.component(a).unwrap().port(1).unwrap().is_enabled());
    assert_matches!(g.connect(a, 1, b, 0), Err(Error::IncorrectStateOperation { .. }));
    assert!(!g.component(b).unwrap().port(0).unwrap().is_tunneled());
    assert_eq!(header.port, 1);
}
