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

use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::secgroup::api::{port_range, SecurityGroupRule};
use crate::timeouts::{Timeouts, TIMEOUTS_BLOCK};
use crate::utils::{
    computed, keep_empty, non_empty, validate_length, validate_one_of, WithNormalize, WithSchema,
    WithValidate, ID_ATTRIBUTE, REGION_ATTRIBUTE,
};

pub const DEFAULT_ACTION: &str = "allow";
pub const DEFAULT_PRIORITY: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SecGroupRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub security_group_id: ValueString<'a>,
    pub direction: ValueString<'a>,
    pub ethertype: ValueString<'a>,
    pub protocol: ValueString<'a>,
    pub ports: ValueString<'a>,
    pub port_range_min: ValueNumber,
    pub port_range_max: ValueNumber,
    pub remote_ip_prefix: ValueString<'a>,
    pub remote_group_id: ValueString<'a>,
    pub remote_address_group_id: ValueString<'a>,
    pub description: ValueString<'a>,
    pub action: ValueString<'a>,
    pub priority: ValueNumber,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> SecGroupRuleState<'a> {
    pub fn refresh(&mut self, rule: SecurityGroupRule, region: &str) -> Result<(), String> {
        let range = match rule.multiport.as_str() {
            "" => None,
            ports => port_range(ports)?,
        };
        self.id = ValueString::from(rule.id);
        self.region = ValueString::from(region.to_string());
        self.security_group_id = ValueString::from(rule.security_group_id);
        self.direction = ValueString::from(rule.direction);
        self.ethertype = ValueString::from(rule.ethertype);
        self.protocol = non_empty(Some(rule.protocol));
        self.ports = non_empty(Some(rule.multiport));
        self.port_range_min = range.map_or(Value::Null, |(min, _)| Value::Value(min));
        self.port_range_max = range.map_or(Value::Null, |(_, max)| Value::Value(max));
        self.remote_ip_prefix = non_empty(Some(rule.remote_ip_prefix));
        self.remote_group_id = non_empty(Some(rule.remote_group_id));
        self.remote_address_group_id = non_empty(Some(rule.remote_address_group_id));
        self.description = keep_empty(&self.description, Some(rule.description));
        self.action = non_empty(Some(rule.action));
        self.priority = Value::Value(rule.priority);
        Ok(())
    }

    /// Port specification sent to the API, from `ports` or the port range
    pub fn multiport(&self) -> Option<String> {
        if let Some(ports) = self.ports.as_deref_option().filter(|p| !p.is_empty()) {
            return Some(ports.to_string());
        }
        match (self.port_range_min.as_option(), self.port_range_max.as_option()) {
            (Some(min), Some(max)) if min != max => Some(format!("{min}-{max}")),
            (Some(port), _) | (None, Some(port)) => Some(port.to_string()),
            (None, None) => None,
        }
    }

    /// Attributes that cannot be changed without replacing the rule
    pub fn changed_attributes(&self, other: &Self) -> Vec<AttributePath> {
        let strings = [
            ("region", &self.region, &other.region),
            ("security_group_id", &self.security_group_id, &other.security_group_id),
            ("direction", &self.direction, &other.direction),
            ("ethertype", &self.ethertype, &other.ethertype),
            ("protocol", &self.protocol, &other.protocol),
            ("ports", &self.ports, &other.ports),
            ("remote_ip_prefix", &self.remote_ip_prefix, &other.remote_ip_prefix),
            ("remote_group_id", &self.remote_group_id, &other.remote_group_id),
            (
                "remote_address_group_id",
                &self.remote_address_group_id,
                &other.remote_address_group_id,
            ),
            ("description", &self.description, &other.description),
            ("action", &self.action, &other.action),
        ];
        let numbers = [
            ("port_range_min", &self.port_range_min, &other.port_range_min),
            ("port_range_max", &self.port_range_max, &other.port_range_max),
            ("priority", &self.priority, &other.priority),
        ];

        let mut changed: Vec<AttributePath> = strings
            .into_iter()
            .filter(|(_, a, b)| a != b)
            .map(|(name, _, _)| AttributePath::new(name))
            .collect();
        changed.extend(
            numbers
                .into_iter()
                .filter(|(_, a, b)| a != b)
                .map(|(name, _, _)| AttributePath::new(name)),
        );
        changed
    }
}

fn string_attribute(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

fn number_attribute(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::Number,
        description: Description::plain(description),
        constraint: AttributeConstraint::OptionalComputed,
        ..Default::default()
    }
}

impl<'a> WithSchema for SecGroupRuleState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Optional, OptionalComputed, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID_ATTRIBUTE.clone(),
                    "region" => REGION_ATTRIBUTE.clone(),
                    "security_group_id" => string_attribute("Security group the rule belongs to", Required),
                    "direction" => string_attribute("Direction of the traffic: `ingress` or `egress`", Required),
                    "ethertype" => string_attribute("IP version: `IPv4` or `IPv6`", Required),
                    "protocol" => string_attribute("Protocol, such as `tcp`, `udp` or `icmp`", OptionalComputed),
                    "ports" => string_attribute("Ports, such as `80`, `80-90` or `22,80`", OptionalComputed),
                    "port_range_min" => number_attribute("Lower bound of the port range"),
                    "port_range_max" => number_attribute("Upper bound of the port range"),
                    "remote_ip_prefix" => string_attribute("Remote CIDR block", OptionalComputed),
                    "remote_group_id" => string_attribute("Remote security group", Optional),
                    "remote_address_group_id" => string_attribute("Remote IP address group", Optional),
                    "description" => string_attribute("Description of the rule", Optional),
                    "action" => string_attribute("`allow` (default) or `deny`", OptionalComputed),
                    "priority" => number_attribute("Priority from 1 (highest, default) to 100"),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS_BLOCK.clone(),
                },
                description: Description::plain("Rule of a security group, every change replaces the rule"),
                ..Default::default()
            },
        }
    }
}

fn validate_ports(diags: &mut Diagnostics, ports: &str, attr_path: AttributePath) {
    for part in ports.split(',') {
        match port_range(part.trim()) {
            Ok(Some((min, max))) if min <= max && (1..=65535).contains(&min) && max <= 65535 => (),
            Ok(_) => diags.error(
                "Invalid port range",
                format!("`{part}` is not a valid port range"),
                attr_path.clone(),
            ),
            Err(err) => diags.error("Invalid ports", err, attr_path.clone()),
        }
    }
}

impl<'a> WithValidate for SecGroupRuleState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_one_of(
            diags,
            &self.direction,
            &["ingress", "egress"],
            attr_path.clone().attribute("direction"),
        );
        validate_one_of(
            diags,
            &self.ethertype,
            &["IPv4", "IPv6"],
            attr_path.clone().attribute("ethertype"),
        );
        validate_one_of(
            diags,
            &self.action,
            &["allow", "deny"],
            attr_path.clone().attribute("action"),
        );
        validate_length(
            diags,
            &self.description,
            255,
            attr_path.clone().attribute("description"),
        );

        if let Value::Value(priority) = self.priority {
            if !(1..=100).contains(&priority) {
                diags.error(
                    "Invalid priority",
                    format!("priority {priority} must be between 1 and 100"),
                    attr_path.clone().attribute("priority"),
                );
            }
        }

        let remotes = [
            &self.remote_ip_prefix,
            &self.remote_group_id,
            &self.remote_address_group_id,
        ]
        .into_iter()
        .filter(|remote| remote.is_value())
        .count();
        if remotes > 1 {
            diags.root_error(
                "Conflicting remotes",
                "only one of `remote_ip_prefix`, `remote_group_id` and `remote_address_group_id` can be set",
            );
        }

        if let Value::Value(ports) = &self.ports {
            validate_ports(diags, ports, attr_path.clone().attribute("ports"));
            if self.port_range_min.is_value() || self.port_range_max.is_value() {
                diags.error(
                    "Conflicting port specifications",
                    "`ports` conflicts with `port_range_min` and `port_range_max`",
                    attr_path.clone().attribute("ports"),
                );
            }
        }

        if let (Value::Value(min), Value::Value(max)) = (self.port_range_min, self.port_range_max) {
            if min > max {
                diags.error(
                    "Invalid port range",
                    format!("port_range_min ({min}) must not exceed port_range_max ({max})"),
                    attr_path.clone().attribute("port_range_min"),
                );
            }
        }

        self.timeouts
            .validate(diags, attr_path.attribute("timeouts"));
    }
}

impl<'a> SecGroupRuleState<'a> {
    pub fn apply_defaults(&mut self) {
        if self.action.is_null() {
            self.action = ValueString::from(DEFAULT_ACTION);
        }
        if self.priority.is_null() {
            self.priority = Value::Value(DEFAULT_PRIORITY);
        }
    }
}

impl<'a> WithNormalize for SecGroupRuleState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.apply_defaults();
        computed(&mut self.id);
        computed(&mut self.region);
        computed(&mut self.protocol);
        computed(&mut self.ports);
        computed(&mut self.port_range_min);
        computed(&mut self.port_range_max);
        computed(&mut self.remote_ip_prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule<'a>() -> SecGroupRuleState<'a> {
        SecGroupRuleState {
            security_group_id: "sg1".into(),
            direction: "ingress".into(),
            ethertype: "IPv4".into(),
            protocol: "tcp".into(),
            ..Default::default()
        }
    }

    #[test]
    fn multiport() {
        assert_eq!(rule().multiport(), None);
        let state = SecGroupRuleState {
            port_range_min: Value::Value(80),
            port_range_max: Value::Value(90),
            ..rule()
        };
        assert_eq!(state.multiport().as_deref(), Some("80-90"));
        let state = SecGroupRuleState {
            port_range_min: Value::Value(22),
            port_range_max: Value::Value(22),
            ..rule()
        };
        assert_eq!(state.multiport().as_deref(), Some("22"));
        let state = SecGroupRuleState {
            ports: "22,443".into(),
            ..rule()
        };
        assert_eq!(state.multiport().as_deref(), Some("22,443"));
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        rule().validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        SecGroupRuleState {
            ports: "22,80-90".into(),
            ..rule()
        }
        .validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        SecGroupRuleState {
            direction: "inbound".into(),
            remote_ip_prefix: "0.0.0.0/0".into(),
            remote_group_id: "sg2".into(),
            ports: "80".into(),
            port_range_min: Value::Value(80),
            priority: Value::Value(101),
            ..rule()
        }
        .validate(&mut diags, AttributePath::default());
        // direction, remotes, ports conflict, priority
        assert_eq!(diags.errors.len(), 4);
    }

    #[test]
    fn invalid_ranges() {
        let mut diags = Diagnostics::default();
        SecGroupRuleState {
            port_range_min: Value::Value(90),
            port_range_max: Value::Value(80),
            ..rule()
        }
        .validate(&mut diags, AttributePath::default());
        SecGroupRuleState {
            ports: "90-80,x".into(),
            ..rule()
        }
        .validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 3);
    }

    #[test]
    fn defaults_and_replacement() {
        let mut planned = rule();
        planned.normalize(&mut Diagnostics::default());
        assert_eq!(planned.action, ValueString::from("allow"));
        assert_eq!(planned.priority, Value::Value(1));

        let mut prior = planned.clone();
        prior.priority = Value::Value(2);
        prior.description = "old".into();
        assert_eq!(
            planned.changed_attributes(&prior),
            [AttributePath::new("description"), AttributePath::new("priority")]
        );
    }
}
