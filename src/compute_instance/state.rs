// This file is part of the terraform-provider-huaweicloud project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueNumber, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::tags::{self, Tags};
use crate::timeouts::{Timeouts, TIMEOUTS_BLOCK};
use crate::utils::{
    computed, non_empty, validate_ip, validate_length, validate_not_empty, validate_one_of,
    WithNormalize, WithSchema, WithValidate, EPS_ATTRIBUTE, ID_ATTRIBUTE, REGION_ATTRIBUTE,
    TAGS_ATTRIBUTE,
};

use super::api::{Interface, Server, Volume};

pub const POWER_ACTIONS: &[&str] = &["ON", "OFF", "REBOOT", "FORCE-OFF", "FORCE-REBOOT"];
pub const DEFAULT_SYSTEM_DISK_TYPE: &str = "GPSSD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NetworkState<'a> {
    pub uuid: ValueString<'a>,
    pub fixed_ip_v4: ValueString<'a>,
    pub mac: ValueString<'a>,
    pub port: ValueString<'a>,
}

impl<'a> NetworkState<'a> {
    fn attach(&mut self, interface: &Interface) {
        self.fixed_ip_v4 = non_empty(interface.ipv4().map(str::to_string));
        self.mac = non_empty(Some(interface.mac_addr.clone()));
        self.port = non_empty(Some(interface.port_id.clone()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ComputeInstanceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub image_id: ValueString<'a>,
    pub flavor_id: ValueString<'a>,
    pub security_group_ids: ValueSet<ValueString<'a>>,
    pub availability_zone: ValueString<'a>,
    pub network: ValueList<Value<NetworkState<'a>>>,
    pub admin_pass: ValueString<'a>,
    pub key_pair: ValueString<'a>,
    pub user_data: ValueString<'a>,
    pub system_disk_type: ValueString<'a>,
    pub system_disk_size: ValueNumber,
    pub system_disk_id: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub power_action: ValueString<'a>,
    pub stop_before_destroy: ValueBool,
    pub delete_disks_on_termination: ValueBool,
    pub status: ValueString<'a>,
    pub access_ip_v4: ValueString<'a>,
    pub tags: Tags<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> ComputeInstanceState<'a> {
    /// Copy the attributes reported by the API
    ///
    /// Configured networks are matched with the interfaces of the same network, in order.
    /// Without configured networks (import), every interface becomes a network.
    pub fn refresh(
        &mut self,
        server: Server,
        interfaces: Vec<Interface>,
        system_disk: Option<Volume>,
        region: &str,
        tags: Tags<'a>,
    ) {
        let mut unmatched = interfaces;
        let mut networks: Vec<Value<NetworkState<'a>>> = self
            .network
            .as_ref_option()
            .map(|networks| networks.iter().cloned().collect())
            .unwrap_or_default();

        if networks.is_empty() {
            networks = unmatched
                .drain(..)
                .map(|interface| {
                    let mut network = NetworkState {
                        uuid: ValueString::from(interface.net_id.clone()),
                        ..Default::default()
                    };
                    network.attach(&interface);
                    Value::Value(network)
                })
                .collect();
        } else {
            for network in networks.iter_mut().flatten() {
                let uuid = network.uuid.as_deref_option().unwrap_or_default();
                if let Some(pos) = unmatched.iter().position(|i| i.net_id == uuid) {
                    let interface = unmatched.remove(pos);
                    network.attach(&interface);
                }
            }
        }

        self.access_ip_v4 = networks
            .first()
            .and_then(|network| network.as_ref_option())
            .map_or(Value::Null, |network| network.fixed_ip_v4.clone());
        self.network = Value::Value(networks);

        self.id = ValueString::from(server.id);
        self.region = ValueString::from(region.to_string());
        self.name = ValueString::from(server.name);
        self.image_id = non_empty(Some(server.image.id));
        self.flavor_id = ValueString::from(server.flavor.id);
        self.availability_zone = non_empty(Some(server.availability_zone));
        self.key_pair = non_empty(Some(server.key_name));
        self.enterprise_project_id = non_empty(Some(server.enterprise_project_id));
        self.security_group_ids = Value::Value(
            server
                .security_groups
                .into_iter()
                .map(|group| ValueString::from(group.id))
                .collect::<BTreeSet<_>>(),
        );
        self.status = ValueString::from(server.status);
        match system_disk {
            Some(volume) => {
                self.system_disk_id = ValueString::from(volume.id);
                self.system_disk_type = ValueString::from(volume.volume_type);
                self.system_disk_size = Value::Value(volume.size);
            }
            None => {
                self.system_disk_id = Value::Null;
                self.system_disk_type = Value::Null;
                self.system_disk_size = Value::Null;
            }
        }
        self.tags = tags::keep_empty(&self.tags, tags);
    }

    /// User data as sent to the API: base64, encoded here when not already
    pub fn encoded_user_data(&self) -> Option<String> {
        let data = self.user_data.as_deref_option()?;
        if STANDARD.decode(data).is_ok() {
            Some(data.to_string())
        } else {
            Some(STANDARD.encode(data))
        }
    }

    pub fn network_ids(&self) -> Vec<&str> {
        self.network
            .iter()
            .flatten()
            .filter_map(|network| network.as_ref_option())
            .filter_map(|network| network.uuid.as_deref_option())
            .collect()
    }

    pub fn security_group_ids(&self) -> BTreeSet<&str> {
        self.security_group_ids
            .iter()
            .flatten()
            .filter_map(|id| id.as_deref_option())
            .collect()
    }

    /// Networks are attached at creation: a different network or fixed IP requires a new server
    pub fn networks_changed(&self, prior: &Self) -> bool {
        let configured = |state: &Self| -> Vec<(String, Option<String>)> {
            state
                .network
                .iter()
                .flatten()
                .filter_map(|network| network.as_ref_option())
                .map(|network| {
                    (
                        network.uuid.as_deref_option().unwrap_or_default().to_string(),
                        network.fixed_ip_v4.as_deref_option().map(str::to_string),
                    )
                })
                .collect()
        };
        let prior = configured(prior);
        let planned = configured(self);
        prior.len() != planned.len()
            || prior.iter().zip(&planned).any(|((prior_uuid, prior_ip), (uuid, ip))| {
                prior_uuid != uuid || (ip.is_some() && prior_ip != ip)
            })
    }
}

fn attribute(
    attr_type: AttributeType,
    description: &str,
    constraint: AttributeConstraint,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

fn string(description: &str, constraint: AttributeConstraint) -> Attribute {
    attribute(AttributeType::String, description, constraint)
}

impl<'a> WithSchema for ComputeInstanceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID_ATTRIBUTE.clone(),
                    "region" => REGION_ATTRIBUTE.clone(),
                    "name" => string("Name of the instance", Required),
                    "image_id" => string("Image the instance boots from", Required),
                    "flavor_id" => string("Flavor of the instance, changing it resizes the instance", Required),
                    "security_group_ids" => attribute(
                        AttributeType::Set(AttributeType::String.into()),
                        "Security groups of the instance",
                        OptionalComputed,
                    ),
                    "availability_zone" => string("Availability zone of the instance", OptionalComputed),
                    "admin_pass" => Attribute {
                        sensitive: true,
                        ..string("Administrator password of the instance", Optional)
                    },
                    "key_pair" => string("SSH key pair to inject into the instance", Optional),
                    "user_data" => string("User data, base64 encoded when given in clear", Optional),
                    "system_disk_type" => string("Volume type of the system disk", OptionalComputed),
                    "system_disk_size" => attribute(AttributeType::Number, "Size of the system disk in GB", OptionalComputed),
                    "system_disk_id" => string("Volume of the system disk", Computed),
                    "enterprise_project_id" => EPS_ATTRIBUTE.clone(),
                    "power_action" => string(
                        "Power action to apply: `ON`, `OFF`, `REBOOT`, `FORCE-OFF` or `FORCE-REBOOT`",
                        Optional,
                    ),
                    "stop_before_destroy" => attribute(
                        AttributeType::Bool,
                        "Force stop the instance before deleting it",
                        Optional,
                    ),
                    "delete_disks_on_termination" => attribute(
                        AttributeType::Bool,
                        "Delete the data disks along with the instance",
                        Optional,
                    ),
                    "status" => string("Status of the instance", Computed),
                    "access_ip_v4" => string("Fixed IPv4 address of the first network", Computed),
                    "tags" => TAGS_ATTRIBUTE.clone(),
                },
                blocks: map! {
                    "network" => NestedBlock::List(Block {
                        attributes: map! {
                            "uuid" => string("Subnet the interface is attached to", Required),
                            "fixed_ip_v4" => string("Fixed IPv4 address of the interface", OptionalComputed),
                            "mac" => string("MAC address of the interface", Computed),
                            "port" => string("Port of the interface", Computed),
                        },
                        description: Description::plain("Network interfaces of the instance"),
                        ..Default::default()
                    }),
                    "timeouts" => TIMEOUTS_BLOCK.clone(),
                },
                description: Description::plain("Elastic Cloud Server"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ComputeInstanceState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_not_empty(diags, &self.name, attr_path.clone().attribute("name"));
        validate_length(diags, &self.name, 64, attr_path.clone().attribute("name"));
        validate_one_of(
            diags,
            &self.power_action,
            POWER_ACTIONS,
            attr_path.clone().attribute("power_action"),
        );
        if let Value::Value(size) = self.system_disk_size {
            if size <= 0 {
                diags.error_short(
                    "The system disk size must be positive",
                    attr_path.clone().attribute("system_disk_size"),
                );
            }
        }

        match &self.network {
            Value::Value(networks) if networks.is_empty() => {
                diags.error_short(
                    "At least one network is required",
                    attr_path.clone().attribute("network"),
                );
            }
            Value::Value(networks) => {
                for (i, network) in networks.iter().enumerate() {
                    if let Value::Value(network) = network {
                        let path = attr_path.clone().attribute("network").index(i as i64);
                        validate_not_empty(diags, &network.uuid, path.clone().attribute("uuid"));
                        validate_ip(diags, &network.fixed_ip_v4, path.attribute("fixed_ip_v4"));
                    }
                }
            }
            Value::Null => {
                diags.error_short(
                    "At least one network is required",
                    attr_path.clone().attribute("network"),
                );
            }
            Value::Unknown => (),
        }

        self.timeouts
            .validate(diags, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for ComputeInstanceState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        computed(&mut self.id);
        computed(&mut self.region);
        computed(&mut self.security_group_ids);
        computed(&mut self.availability_zone);
        computed(&mut self.system_disk_type);
        computed(&mut self.system_disk_size);
        computed(&mut self.system_disk_id);
        computed(&mut self.enterprise_project_id);
        computed(&mut self.status);
        computed(&mut self.access_ip_v4);
        if let Value::Value(networks) = &mut self.network {
            for network in networks.iter_mut().flatten() {
                computed(&mut network.fixed_ip_v4);
                computed(&mut network.mac);
                computed(&mut network.port);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::api::{FixedIp, IdRef};
    use super::*;

    fn network(uuid: &str) -> Value<NetworkState<'static>> {
        Value::Value(NetworkState {
            uuid: ValueString::from(uuid.to_string()),
            ..Default::default()
        })
    }

    fn interface(net_id: &str, ip: &str) -> Interface {
        Interface {
            port_id: format!("port-{net_id}"),
            net_id: net_id.to_string(),
            mac_addr: "fa:16:3e:00:00:01".to_string(),
            fixed_ips: vec![FixedIp {
                subnet_id: String::new(),
                ip_address: ip.to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        let state = ComputeInstanceState {
            name: "web".into(),
            network: Value::Value(vec![network("n1")]),
            power_action: "FORCE-OFF".into(),
            ..Default::default()
        };
        state.validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        let state = ComputeInstanceState {
            network: Value::Value(vec![]),
            power_action: "SHUTDOWN".into(),
            system_disk_size: Value::Value(0),
            ..state
        };
        state.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 3);
    }

    #[test]
    fn user_data_encoding() {
        let state = ComputeInstanceState {
            user_data: "#!/bin/sh\necho hello".into(),
            ..Default::default()
        };
        assert_eq!(
            state.encoded_user_data().as_deref(),
            Some("IyEvYmluL3NoCmVjaG8gaGVsbG8=")
        );

        let state = ComputeInstanceState {
            user_data: "IyEvYmluL3NoCmVjaG8gaGVsbG8=".into(),
            ..Default::default()
        };
        assert_eq!(
            state.encoded_user_data().as_deref(),
            Some("IyEvYmluL3NoCmVjaG8gaGVsbG8=")
        );
        assert_eq!(ComputeInstanceState::default().encoded_user_data(), None);
    }

    #[test]
    fn refresh_matches_networks() {
        let mut state = ComputeInstanceState {
            network: Value::Value(vec![network("n2"), network("n1")]),
            user_data: "data".into(),
            ..Default::default()
        };
        let server = Server {
            id: "s1".to_string(),
            name: "web".to_string(),
            status: "ACTIVE".to_string(),
            flavor: IdRef {
                id: "s6.small.1".to_string(),
            },
            security_groups: vec![IdRef {
                id: "sg1".to_string(),
            }],
            ..Default::default()
        };
        let interfaces = vec![interface("n1", "192.168.0.10"), interface("n2", "10.0.0.5")];
        let volume = Volume {
            id: "v1".to_string(),
            size: 40,
            volume_type: "SSD".to_string(),
        };
        state.refresh(server, interfaces, Some(volume), "cn-north-4", Value::Null);

        assert_eq!(state.access_ip_v4, ValueString::from("10.0.0.5"));
        assert_eq!(state.network_ids(), ["n2", "n1"]);
        assert_eq!(state.system_disk_size, Value::Value(40));
        assert_eq!(state.user_data, ValueString::from("data"));
        assert_eq!(state.security_group_ids(), BTreeSet::from(["sg1"]));
        assert!(state.key_pair.is_null());
    }

    #[test]
    fn refresh_imports_interfaces() {
        let mut state = ComputeInstanceState::default();
        state.refresh(
            Server::default(),
            vec![interface("n1", "192.168.0.10")],
            None,
            "cn-north-4",
            Value::Null,
        );
        assert_eq!(state.network_ids(), ["n1"]);
        assert_eq!(state.access_ip_v4, ValueString::from("192.168.0.10"));
    }

    #[test]
    fn network_replacement() {
        let prior = ComputeInstanceState {
            network: Value::Value(vec![Value::Value(NetworkState {
                uuid: "n1".into(),
                fixed_ip_v4: "192.168.0.10".into(),
                ..Default::default()
            })]),
            ..Default::default()
        };
        let mut planned = prior.clone();
        assert!(!planned.networks_changed(&prior));

        planned.network = Value::Value(vec![network("n1")]);
        assert!(!planned.networks_changed(&prior));

        planned.network = Value::Value(vec![network("n2")]);
        assert!(planned.networks_changed(&prior));
    }

    #[test]
    fn plan_marks_computed() {
        let mut diags = Diagnostics::default();
        let mut state = ComputeInstanceState {
            network: Value::Value(vec![network("n1")]),
            ..Default::default()
        };
        state.normalize(&mut diags);
        assert!(state.system_disk_size.is_unknown());
        let network = state.network.as_ref_option().and_then(|n| n[0].as_ref_option()).cloned();
        assert!(network.is_some_and(|n| n.mac.is_unknown() && n.fixed_ip_v4.is_unknown()));
    }
}
