//! Component-wide identity and parameters.
//!
//! The config port answers for everything that is not scoped to a single
//! data port: the component name, version and uuid, resource concealment,
//! suspension policy, priority management and vendor extension names.

use il_core::{
    ComponentConfig, ComponentUuid, Error, Index, ParamStruct, ParamValue, PriorityMgmt,
    ResourceConcealment, Result, SuspensionPolicy, SuspensionPolicyParam, Version,
    MAX_NAME_LEN,
};
use std::collections::HashMap;
use tracing::debug;

/// Result of `GetComponentVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentVersion {
    /// Name bytes copied, terminator excluded.
    pub name_len: usize,
    pub component: Version,
    pub spec: Version,
    pub uuid: Option<ComponentUuid>,
}

#[derive(Debug, Clone)]
pub struct ConfigPort {
    name: String,
    version: Version,
    uuid: ComponentUuid,
    concealment: ResourceConcealment,
    suspension: SuspensionPolicy,
    priority: PriorityMgmt,
    config_priority: PriorityMgmt,
    extensions: HashMap<String, u32>,
}

impl ConfigPort {
    pub fn new(config: &ComponentConfig) -> Self {
        Self {
            name: truncate_name(&config.name),
            version: config.version,
            uuid: ComponentUuid::new(),
            concealment: ResourceConcealment::default(),
            suspension: SuspensionPolicy::Disabled,
            priority: PriorityMgmt::default(),
            config_priority: PriorityMgmt::default(),
            extensions: config
                .extensions
                .iter()
                .map(|ext| (ext.name.clone(), ext.index))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> ComponentUuid {
        self.uuid
    }

    pub fn suspension(&self) -> SuspensionPolicy {
        self.suspension
    }

    /// Copy the name into `name_buf`, bounded by the buffer and by
    /// [`MAX_NAME_LEN`], always zero-terminated.
    pub fn component_version(
        &self,
        name_buf: &mut [u8],
        want_uuid: bool,
    ) -> Result<ComponentVersion> {
        if name_buf.is_empty() {
            return Err(Error::bad_parameter("name buffer is empty"));
        }
        let limit = name_buf.len().min(MAX_NAME_LEN) - 1;
        let bytes = self.name.as_bytes();
        let name_len = bytes.len().min(limit);
        name_buf[..name_len].copy_from_slice(&bytes[..name_len]);
        name_buf[name_len] = 0;

        Ok(ComponentVersion {
            name_len,
            component: self.version,
            spec: Version::SPEC,
            uuid: want_uuid.then_some(self.uuid),
        })
    }

    pub fn get_parameter(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        let value = match index {
            Index::ParamPriorityMgmt => ParamValue::PriorityMgmt(self.priority),
            Index::ParamSuspensionPolicy => ParamValue::SuspensionPolicy(SuspensionPolicyParam {
                policy: self.suspension as u32,
            }),
            Index::ParamDisableResourceConcealment => {
                ParamValue::ResourceConcealment(self.concealment)
            }
            other => return Err(Error::UnsupportedIndex(other.as_raw())),
        };
        param.fill(value)
    }

    pub fn set_parameter(&mut self, index: Index, param: &ParamStruct) -> Result<()> {
        match (index, &param.value) {
            (Index::ParamPriorityMgmt, ParamValue::PriorityMgmt(p)) => {
                self.priority = *p;
            }
            (Index::ParamSuspensionPolicy, ParamValue::SuspensionPolicy(p)) => {
                self.suspension = SuspensionPolicy::from_raw(p.policy).ok_or_else(|| {
                    Error::bad_parameter(format!(
                        "suspension policy {} exceeds maximum {}",
                        p.policy,
                        SuspensionPolicy::MAX
                    ))
                })?;
            }
            (Index::ParamDisableResourceConcealment, ParamValue::ResourceConcealment(c)) => {
                self.concealment = *c;
            }
            (
                Index::ParamPriorityMgmt
                | Index::ParamSuspensionPolicy
                | Index::ParamDisableResourceConcealment,
                value,
            ) => return Err(shape_mismatch(index, value)),
            (other, _) => return Err(Error::UnsupportedIndex(other.as_raw())),
        }
        debug!(component = %self.name, %index, "parameter set");
        Ok(())
    }

    pub fn get_config(&self, index: Index, param: &mut ParamStruct) -> Result<()> {
        match index {
            Index::ConfigPriorityMgmt => param.fill(ParamValue::PriorityMgmt(self.config_priority)),
            other => Err(Error::UnsupportedIndex(other.as_raw())),
        }
    }

    pub fn set_config(&mut self, index: Index, param: &ParamStruct) -> Result<()> {
        match (index, &param.value) {
            (Index::ConfigPriorityMgmt, ParamValue::PriorityMgmt(p)) => {
                self.config_priority = *p;
                Ok(())
            }
            (Index::ConfigPriorityMgmt, value) => Err(shape_mismatch(index, value)),
            (other, _) => Err(Error::UnsupportedIndex(other.as_raw())),
        }
    }

    /// Declared vendor extension, if any.
    pub fn extension_index(&self, name: &str) -> Option<Index> {
        self.extensions.get(name).map(|raw| Index::from_raw(*raw))
    }
}

fn shape_mismatch(index: Index, value: &ParamValue) -> Error {
    Error::bad_parameter(format!("{index} does not take a {} struct", value.type_name()))
}

/// Longest prefix of `name` that fits [`MAX_NAME_LEN`] with its terminator.
fn truncate_name(name: &str) -> String {
    let mut end = name.len().min(MAX_NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn port_named(name: &str) -> ConfigPort {
        ConfigPort::new(&ComponentConfig {
            name: name.into(),
            ..ComponentConfig::default()
        })
    }

    #[test]
    fn version_copies_and_terminates() {
        let port = port_named("OMX.test.renderer");
        let mut buf = [0xAAu8; 64];
        let v = port.component_version(&mut buf, true).unwrap();
        assert_eq!(v.name_len, 17);
        assert_eq!(&buf[..17], b"OMX.test.renderer");
        assert_eq!(buf[17], 0);
        assert_eq!(v.spec, Version::SPEC);
        assert_eq!(v.uuid, Some(port.uuid()));
    }

    #[test]
    fn version_never_overflows_small_buffer() {
        let port = port_named("OMX.a.very.long.component.name");
        let mut buf = [0xAAu8; 8];
        let v = port.component_version(&mut buf, false).unwrap();
        assert_eq!(v.name_len, 7);
        assert_eq!(&buf[..7], b"OMX.a.v");
        assert_eq!(buf[7], 0);
        assert_eq!(v.uuid, None);

        let mut one = [0xAAu8; 1];
        assert_eq!(port.component_version(&mut one, false).unwrap().name_len, 0);
        assert_eq!(one[0], 0);

        assert_matches!(
            port.component_version(&mut [], false),
            Err(Error::BadParameter(_))
        );
    }

    #[test]
    fn long_names_are_capped() {
        let long = "x".repeat(300);
        let port = port_named(&long);
        assert_eq!(port.name().len(), MAX_NAME_LEN - 1);

        let mut buf = [0xAAu8; 512];
        let v = port.component_version(&mut buf, false).unwrap();
        assert_eq!(v.name_len, MAX_NAME_LEN - 1);
        assert_eq!(buf[MAX_NAME_LEN - 1], 0);
        assert_eq!(buf[MAX_NAME_LEN], 0xAA);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let name = format!("{}é", "a".repeat(126));
        assert_eq!(truncate_name(&name), "a".repeat(126));
    }

    #[test]
    fn suspension_policy_above_max_is_rejected() {
        let mut port = port_named("OMX.test");
        let ok = ParamStruct::new(ParamValue::SuspensionPolicy(SuspensionPolicyParam {
            policy: 1,
        }));
        port.set_parameter(Index::ParamSuspensionPolicy, &ok).unwrap();
        assert_eq!(port.suspension(), SuspensionPolicy::Enabled);

        let bad = ParamStruct::new(ParamValue::SuspensionPolicy(SuspensionPolicyParam {
            policy: SuspensionPolicy::MAX + 1,
        }));
        assert_matches!(
            port.set_parameter(Index::ParamSuspensionPolicy, &bad),
            Err(Error::BadParameter(_))
        );
        assert_eq!(port.suspension(), SuspensionPolicy::Enabled);
    }

    #[test]
    fn priority_config_and_param_are_independent() {
        let mut port = port_named("OMX.test");
        let value = ParamStruct::new(ParamValue::PriorityMgmt(PriorityMgmt {
            group_priority: 2,
            group_id: 5,
        }));
        port.set_config(Index::ConfigPriorityMgmt, &value).unwrap();

        let mut out = ParamStruct::new(ParamValue::PriorityMgmt(PriorityMgmt::default()));
        port.get_parameter(Index::ParamPriorityMgmt, &mut out).unwrap();
        assert_eq!(out.value, ParamValue::PriorityMgmt(PriorityMgmt::default()));
        port.get_config(Index::ConfigPriorityMgmt, &mut out).unwrap();
        assert_eq!(out, value);
    }

    #[test]
    fn unknown_index_is_unsupported() {
        let port = port_named("OMX.test");
        let mut out = ParamStruct::new(ParamValue::PriorityMgmt(PriorityMgmt::default()));
        assert_matches!(
            port.get_parameter(Index::Unknown(0x0300_0000), &mut out),
            Err(Error::UnsupportedIndex(0x0300_0000))
        );
    }
}
