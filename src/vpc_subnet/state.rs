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

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::tags::{self, Tags};
use crate::timeouts::{Timeouts, TIMEOUTS_BLOCK};
use crate::utils::{
    computed, keep_empty, non_empty, validate_ip, validate_length, WithNormalize, WithSchema, WithValidate,
    ID_ATTRIBUTE, REGION_ATTRIBUTE, TAGS_ATTRIBUTE,
};
use crate::vpc::{cidr_contains, validate_cidr};

use super::api::{ExtraDhcpOpt, Subnet, OPT_ADDRESS_TIME, OPT_DOMAIN_NAME, OPT_NTP};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubnetState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub cidr: ValueString<'a>,
    pub gateway_ip: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub availability_zone: ValueString<'a>,
    pub description: ValueString<'a>,
    pub ipv6_enable: ValueBool,
    pub dhcp_enable: ValueBool,
    pub primary_dns: ValueString<'a>,
    pub secondary_dns: ValueString<'a>,
    pub dns_list: ValueList<ValueString<'a>>,
    pub ntp_server_address: ValueString<'a>,
    pub dhcp_lease_time: ValueString<'a>,
    pub dhcp_domain_name: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub ipv4_subnet_id: ValueString<'a>,
    pub ipv6_subnet_id: ValueString<'a>,
    pub ipv6_cidr: ValueString<'a>,
    pub ipv6_gateway: ValueString<'a>,
    pub status: ValueString<'a>,
    pub tags: Tags<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

fn string_attribute(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

fn bool_attribute(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::Bool,
        description: Description::plain(description),
        constraint: AttributeConstraint::OptionalComputed,
        ..Default::default()
    }
}

impl<'a> SubnetState<'a> {
    /// Copy the attributes reported by the API
    pub fn refresh(&mut self, subnet: Subnet, region: &str, tags: Tags<'a>) {
        self.ntp_server_address = keep_empty(
            &self.ntp_server_address,
            subnet.dhcp_opt(OPT_NTP).map(str::to_string),
        );
        self.dhcp_lease_time = non_empty(subnet.dhcp_opt(OPT_ADDRESS_TIME).map(str::to_string));
        self.dhcp_domain_name = keep_empty(
            &self.dhcp_domain_name,
            subnet.dhcp_opt(OPT_DOMAIN_NAME).map(str::to_string),
        );

        self.id = ValueString::from(subnet.id);
        self.region = ValueString::from(region.to_string());
        self.name = ValueString::from(subnet.name);
        self.description = keep_empty(&self.description, Some(subnet.description));
        self.cidr = ValueString::from(subnet.cidr);
        self.gateway_ip = ValueString::from(subnet.gateway_ip);
        self.vpc_id = ValueString::from(subnet.vpc_id);
        self.availability_zone = non_empty(Some(subnet.availability_zone));
        self.ipv6_enable = Value::Value(subnet.ipv6_enable);
        self.dhcp_enable = Value::Value(subnet.dhcp_enable);
        self.primary_dns = keep_empty(&self.primary_dns, Some(subnet.primary_dns));
        self.secondary_dns = keep_empty(&self.secondary_dns, Some(subnet.secondary_dns));
        self.dns_list = Value::Value(subnet.dns_list.into_iter().map(ValueString::from).collect());
        self.subnet_id = non_empty(Some(subnet.neutron_subnet_id.clone()));
        self.ipv4_subnet_id = non_empty(Some(subnet.neutron_subnet_id));
        self.ipv6_subnet_id = non_empty(Some(subnet.neutron_subnet_id_v6));
        self.ipv6_cidr = non_empty(Some(subnet.cidr_v6));
        self.ipv6_gateway = non_empty(Some(subnet.gateway_ip_v6));
        self.status = ValueString::from(subnet.status);
        self.tags = tags::keep_empty(&self.tags, tags);
    }

    /// Configured DNS list, `None` when unset
    pub fn dns_list(&self) -> Option<Vec<String>> {
        self.dns_list.as_ref_option().map(|list| {
            list.iter()
                .filter_map(|dns| dns.as_deref_option())
                .map(str::to_string)
                .collect()
        })
    }

    /// Extra DHCP options; on update, unset ntp and domain name options are sent empty to clear them
    pub fn dhcp_opts(&self, update: bool) -> Vec<ExtraDhcpOpt> {
        let mut opts = Vec::new();
        let mut push = |name: &str, value: &ValueString, clear: bool| {
            match value.as_deref_option().filter(|v| !v.is_empty()) {
                Some(value) => opts.push(ExtraDhcpOpt {
                    opt_name: name.to_string(),
                    opt_value: Some(value.to_string()),
                }),
                None if clear => opts.push(ExtraDhcpOpt {
                    opt_name: name.to_string(),
                    opt_value: None,
                }),
                None => (),
            }
        };
        push(OPT_ADDRESS_TIME, &self.dhcp_lease_time, false);
        push(OPT_NTP, &self.ntp_server_address, update);
        push(OPT_DOMAIN_NAME, &self.dhcp_domain_name, update);
        opts
    }
}

impl<'a> WithSchema for SubnetState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID_ATTRIBUTE.clone(),
                    "region" => REGION_ATTRIBUTE.clone(),
                    "name" => string_attribute("Name of the subnet", Required),
                    "cidr" => string_attribute("IPv4 CIDR block of the subnet", Required),
                    "gateway_ip" => string_attribute("Gateway of the subnet", Required),
                    "vpc_id" => string_attribute("VPC of the subnet", Required),
                    "availability_zone" => string_attribute("Availability zone of the subnet", OptionalComputed),
                    "description" => string_attribute("Supplementary information about the subnet", Optional),
                    "ipv6_enable" => bool_attribute("Whether an IPv6 subnet is created, it cannot be disabled afterwards"),
                    "dhcp_enable" => bool_attribute("Whether DHCP is enabled, defaults to true"),
                    "primary_dns" => string_attribute("Primary DNS server address", OptionalComputed),
                    "secondary_dns" => string_attribute("Secondary DNS server address, requires `primary_dns`", OptionalComputed),
                    "dns_list" => Attribute {
                        attr_type: AttributeType::List(AttributeType::String.into()),
                        description: Description::plain("DNS server addresses of the subnet"),
                        constraint: OptionalComputed,
                        ..Default::default()
                    },
                    "ntp_server_address" => string_attribute("NTP server addresses, comma separated", Optional),
                    "dhcp_lease_time" => string_attribute("DHCP lease time, such as `24h` or `-1` for unlimited", OptionalComputed),
                    "dhcp_domain_name" => string_attribute("Domain name given by DHCP", Optional),
                    "subnet_id" => string_attribute("ID of the IPv4 subnet (deprecated, use `ipv4_subnet_id`)", Computed),
                    "ipv4_subnet_id" => string_attribute("ID of the IPv4 subnet", Computed),
                    "ipv6_subnet_id" => string_attribute("ID of the IPv6 subnet", Computed),
                    "ipv6_cidr" => string_attribute("IPv6 CIDR block of the subnet", Computed),
                    "ipv6_gateway" => string_attribute("IPv6 gateway of the subnet", Computed),
                    "status" => string_attribute("Status of the subnet", Computed),
                    "tags" => TAGS_ATTRIBUTE.clone(),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS_BLOCK.clone(),
                },
                description: Description::plain("Subnet of a VPC"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for SubnetState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_length(diags, &self.name, 64, attr_path.clone().attribute("name"));
        validate_length(
            diags,
            &self.description,
            255,
            attr_path.clone().attribute("description"),
        );
        validate_cidr(diags, &self.cidr, attr_path.clone().attribute("cidr"));
        validate_ip(diags, &self.gateway_ip, attr_path.clone().attribute("gateway_ip"));
        validate_ip(diags, &self.primary_dns, attr_path.clone().attribute("primary_dns"));
        validate_ip(
            diags,
            &self.secondary_dns,
            attr_path.clone().attribute("secondary_dns"),
        );
        for (i, dns) in self.dns_list.iter().flatten().enumerate() {
            validate_ip(
                diags,
                dns,
                attr_path.clone().attribute("dns_list").index(i as i64),
            );
        }

        if let (Value::Value(cidr), Value::Value(gateway)) = (&self.cidr, &self.gateway_ip) {
            if let Ok(gateway) = gateway.parse::<Ipv4Addr>() {
                if !cidr_contains(cidr, gateway) {
                    diags.error(
                        "Invalid gateway",
                        format!("gateway {gateway} is not in the subnet {cidr}"),
                        attr_path.clone().attribute("gateway_ip"),
                    );
                }
            }
        }

        if self.secondary_dns.is_value() && self.primary_dns.is_null() {
            diags.error(
                "Missing primary DNS",
                "`secondary_dns` requires `primary_dns`",
                attr_path.clone().attribute("secondary_dns"),
            );
        }

        self.timeouts
            .validate(diags, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for SubnetState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.dhcp_enable.is_null() {
            self.dhcp_enable = Value::Value(true);
        }
        if self.ipv6_enable.is_null() {
            self.ipv6_enable = Value::Value(false);
        }
        for value in [
            &mut self.id,
            &mut self.region,
            &mut self.availability_zone,
            &mut self.primary_dns,
            &mut self.secondary_dns,
            &mut self.dhcp_lease_time,
            &mut self.subnet_id,
            &mut self.ipv4_subnet_id,
            &mut self.status,
        ] {
            computed(value);
        }
        computed(&mut self.dns_list);
        if self.ipv6_enable == Value::Value(true) {
            computed(&mut self.ipv6_subnet_id);
            computed(&mut self.ipv6_cidr);
            computed(&mut self.ipv6_gateway);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet<'a>() -> SubnetState<'a> {
        SubnetState {
            name: "demo".into(),
            cidr: "192.168.0.0/24".into(),
            gateway_ip: "192.168.0.1".into(),
            vpc_id: "v1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        subnet().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        let state = SubnetState {
            gateway_ip: "192.168.1.1".into(),
            secondary_dns: "100.125.1.250".into(),
            dns_list: Value::Value(vec!["8.8.8.8".into(), "dns".into()]),
            ..subnet()
        };
        state.validate(&mut diags, AttributePath::default());
        // gateway outside the cidr, secondary without primary, invalid dns
        assert_eq!(diags.errors.len(), 3);
    }

    #[test]
    fn dhcp_options() {
        let state = SubnetState {
            dhcp_lease_time: "24h".into(),
            ntp_server_address: "10.0.0.1".into(),
            ..subnet()
        };
        let create = state.dhcp_opts(false);
        assert_eq!(create.len(), 2);

        let update = state.dhcp_opts(true);
        assert_eq!(update.len(), 3);
        assert_eq!(update[2].opt_name, OPT_DOMAIN_NAME);
        assert_eq!(update[2].opt_value, None);
    }

    #[test]
    fn defaults_on_plan() {
        let mut state = subnet();
        state.normalize(&mut Diagnostics::default());
        assert_eq!(state.dhcp_enable, Value::Value(true));
        assert_eq!(state.ipv6_enable, Value::Value(false));
        assert!(state.dns_list.is_unknown());
        assert!(state.ipv6_cidr.is_null());

        let mut state = SubnetState {
            ipv6_enable: Value::Value(true),
            ..subnet()
        };
        state.normalize(&mut Diagnostics::default());
        assert!(state.ipv6_cidr.is_unknown());
    }

    #[test]
    fn refresh_reads_dhcp_options() {
        let mut state = subnet();
        state.refresh(
            Subnet {
                id: "s1".to_string(),
                neutron_subnet_id: "n1".to_string(),
                extra_dhcp_opts: vec![ExtraDhcpOpt {
                    opt_name: OPT_NTP.to_string(),
                    opt_value: Some("10.0.0.1".to_string()),
                }],
                ..Default::default()
            },
            "cn-north-4",
            Value::Null,
        );
        assert_eq!(state.ntp_server_address, ValueString::from("10.0.0.1"));
        assert_eq!(state.ipv4_subnet_id, ValueString::from("n1"));
        assert_eq!(state.subnet_id, ValueString::from("n1"));
        assert!(state.dhcp_domain_name.is_null());
    }
}
