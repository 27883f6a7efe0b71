//! Identity, parameter and extension calls against a live component.

mod common;

use assert_matches::assert_matches;
use common::*;
use il_component::{Component, ExtensionResolver, ParamDelegate};
use il_core::{
    BufferSupplier, BufferSupplierParam, ComponentConfig, Error, ExtensionConfig, IlState, Index,
    ParamStruct, ParamValue, PortConfig, PortDirection, PriorityMgmt, Result,
    SuspensionPolicyParam, Version, MAX_NAME_LEN,
};

fn suspension(policy: u32) -> ParamStruct {
    ParamStruct::new(ParamValue::SuspensionPolicy(SuspensionPolicyParam { policy }))
}

fn stored_suspension(c: &Component) -> u32 {
    let mut param = suspension(0);
    c.get_parameter(Index::ParamSuspensionPolicy, &mut param)
        .unwrap();
    match param.value {
        ParamValue::SuspensionPolicy(p) => p.policy,
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn component_version_is_bounded_and_terminated() {
    let name = "OMX.test.".to_string() + &"x".repeat(200);
    let c = Component::new(
        ComponentConfig {
            name,
            ..ComponentConfig::default()
        },
        bus(),
    )
    .unwrap();

    let mut big = [0xAAu8; 512];
    let version = c.get_component_version(&mut big, true).unwrap();
    assert_eq!(version.name_len, MAX_NAME_LEN - 1);
    assert_eq!(big[MAX_NAME_LEN - 1], 0);
    assert_eq!(version.spec, Version::SPEC);
    assert_eq!(version.uuid, Some(c.uuid()));

    let mut small = [0xAAu8; 8];
    let version = c.get_component_version(&mut small, false).unwrap();
    assert_eq!(version.name_len, 7);
    assert_eq!(&small[..7], b"OMX.tes");
    assert_eq!(small[7], 0);
    assert_eq!(version.uuid, None);

    assert_matches!(
        c.get_component_version(&mut [], false),
        Err(Error::BadParameter(_))
    );
}

#[test]
fn suspension_policy_above_max_is_rejected_and_not_stored() {
    let (mut c, _) = manual(disabled_ports());
    c.set_parameter(Index::ParamSuspensionPolicy, &suspension(1))
        .unwrap();
    assert_eq!(stored_suspension(&c), 1);

    assert_matches!(
        c.set_parameter(Index::ParamSuspensionPolicy, &suspension(2)),
        Err(Error::BadParameter(_))
    );
    assert_eq!(stored_suspension(&c), 1);
}

#[test]
fn malformed_structs_are_rejected_before_any_copy() {
    let (mut c, _) = manual(disabled_ports());
    let mut wrong_size = suspension(0);
    wrong_size.header.size += 4;
    assert_matches!(
        c.set_parameter(Index::ParamSuspensionPolicy, &wrong_size),
        Err(Error::BadParameter(_))
    );

    let mut wrong_version = suspension(0);
    wrong_version.header.version = Version::new(2, 0, 0, 0);
    assert_matches!(
        c.get_parameter(Index::ParamSuspensionPolicy, &mut wrong_version),
        Err(Error::VersionMismatch { .. })
    );

    let mut wrong_shape = ParamStruct::new(ParamValue::PriorityMgmt(PriorityMgmt::default()));
    assert_matches!(
        c.get_parameter(Index::ParamSuspensionPolicy, &mut wrong_shape),
        Err(Error::BadParameter(_))
    );

    assert_matches!(
        c.set_parameter(Index::Unknown(0x0100_0042), &suspension(0)),
        Err(Error::UnsupportedIndex(0x0100_0042))
    );
}

#[test]
fn component_wide_parameters_lock_once_idle() {
    let (mut c, _) = manual(disabled_ports());
    reach(&mut c, IlState::Idle);
    assert_matches!(
        c.set_parameter(Index::ParamSuspensionPolicy, &suspension(1)),
        Err(Error::IncorrectStateOperation { .. })
    );
    // Reads stay legal in every live state.
    assert_eq!(stored_suspension(&c), 0);
}

#[test]
fn port_parameters_stay_open_on_disabled_ports() {
    let (mut c, _) = manual(
        ComponentConfig::default()
            .with_port(PortConfig::new(0, PortDirection::Input).disabled())
            .with_port(PortConfig::new(1, PortDirection::Output).buffers(1, 64)),
    );
    c.send_command(state_set(IlState::Idle)).unwrap();
    c.use_buffer(1, 64).unwrap();
    c.servant_complete(il_component::Servant::Processor, IlState::Idle)
        .unwrap();
    assert_eq!(c.get_state(), IlState::Idle);

    let supplier = |port_index| {
        ParamStruct::new(ParamValue::BufferSupplier(BufferSupplierParam {
            port_index,
            supplier: BufferSupplier::Output,
        }))
    };
    c.set_parameter(Index::ParamCompBufferSupplier, &supplier(0))
        .unwrap();
    assert_matches!(
        c.set_parameter(Index::ParamCompBufferSupplier, &supplier(1)),
        Err(Error::IncorrectStateOperation { .. })
    );
    assert_matches!(
        c.set_parameter(Index::ParamCompBufferSupplier, &supplier(7)),
        Err(Error::BadPortIndex(7))
    );
    assert_eq!(
        c.port(0).unwrap().supplier_preference(),
        BufferSupplier::Output
    );
}

#[test]
fn port_definition_reflects_population() {
    let (mut c, _) = manual(
        ComponentConfig::default()
            .with_port(PortConfig::new(0, PortDirection::Input).buffers(1, 64)),
    );
    let read = |c: &Component| {
        let mut param = ParamStruct::new(ParamValue::PortDefinition(
            c.port(0).unwrap().definition(),
        ));
        c.get_parameter(Index::ParamPortDefinition, &mut param)
            .unwrap();
        match param.value {
            ParamValue::PortDefinition(def) => def,
            other => panic!("unexpected payload {other:?}"),
        }
    };
    assert!(!read(&c).populated);
    c.send_command(state_set(IlState::Idle)).unwrap();
    c.use_buffer(0, 64).unwrap();
    let def = read(&c);
    assert!(def.populated);
    assert!(def.enabled);
    assert_eq!(def.buffer_size, 64);
}

struct Vendor;

impl ExtensionResolver for Vendor {
    fn resolve(&self, name: &str) -> Option<Index> {
        (name == "OMX.vendor.index.gain").then_some(Index::Vendor(0x7F00_0010))
    }
}

#[derive(Default)]
struct GainDelegate {
    gain: Option<ParamValue>,
}

impl ParamDelegate for GainDelegate {
    fn get_parameter(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        match &self.gain {
            Some(value) => param.fill(value.clone()),
            None => Err(Error::UnsupportedIndex(index.as_raw())),
        }
    }

    fn set_parameter(&mut self, _index: Index, param: &ParamStruct) -> Result<()> {
        self.gain = Some(param.value.clone());
        Ok(())
    }
}

#[test]
fn extensions_resolve_through_config_then_collaborator() {
    let mut config = disabled_ports();
    config.extensions.push(ExtensionConfig {
        name: "OMX.test.index.latency".into(),
        index: 0x7F00_0001,
    });
    let (mut c, _) = manual(config);

    assert_eq!(
        c.get_extension_index("OMX.test.index.latency").unwrap(),
        Index::Vendor(0x7F00_0001)
    );
    assert_matches!(
        c.get_extension_index("OMX.vendor.index.gain"),
        Err(Error::UnsupportedExtension(_))
    );

    c.set_extension_resolver(Box::new(Vendor));
    c.set_param_delegate(Box::new(GainDelegate::default()));
    let index = c.get_extension_index("OMX.vendor.index.gain").unwrap();
    let gain = ParamStruct::new(ParamValue::Opaque(bytes::Bytes::from_static(&[3, 0, 0, 0])));
    c.set_parameter(index, &gain).unwrap();

    let mut read = ParamStruct::new(ParamValue::Opaque(bytes::Bytes::from_static(&[0; 4])));
    c.get_parameter(index, &mut read).unwrap();
    assert_eq!(read.value, gain.value);
}
