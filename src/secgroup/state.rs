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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::tags::{self, Tags};
use crate::timeouts::{Timeouts, TIMEOUTS_BLOCK};
use crate::utils::{
    computed, keep_empty, non_empty, validate_length, validate_not_empty, WithNormalize, WithSchema,
    WithValidate, EPS_ATTRIBUTE, ID_ATTRIBUTE, REGION_ATTRIBUTE, TAGS_ATTRIBUTE,
};

use super::api::{port_range, SecurityGroup, SecurityGroupRule};

/// Rule of a security group, as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
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
}

impl<'a> RuleState<'a> {
    pub fn from_api(rule: SecurityGroupRule) -> Result<Self, String> {
        let range = match rule.multiport.as_str() {
            "" => None,
            ports => port_range(ports)?,
        };
        Ok(Self {
            id: ValueString::from(rule.id),
            direction: ValueString::from(rule.direction),
            ethertype: ValueString::from(rule.ethertype),
            protocol: non_empty(Some(rule.protocol)),
            ports: non_empty(Some(rule.multiport)),
            port_range_min: range.map_or(Value::Null, |(min, _)| Value::Value(min)),
            port_range_max: range.map_or(Value::Null, |(_, max)| Value::Value(max)),
            remote_ip_prefix: non_empty(Some(rule.remote_ip_prefix)),
            remote_group_id: non_empty(Some(rule.remote_group_id)),
            remote_address_group_id: non_empty(Some(rule.remote_address_group_id)),
            description: non_empty(Some(rule.description)),
            action: non_empty(Some(rule.action)),
            priority: Value::Value(rule.priority),
        })
    }

    fn object_type() -> AttributeType {
        let mut fields: HashMap<String, AttributeType> = [
            "id",
            "direction",
            "ethertype",
            "protocol",
            "ports",
            "remote_ip_prefix",
            "remote_group_id",
            "remote_address_group_id",
            "description",
            "action",
        ]
        .into_iter()
        .map(|name| (name.to_string(), AttributeType::String))
        .collect();
        for name in ["port_range_min", "port_range_max", "priority"] {
            fields.insert(name.to_string(), AttributeType::Number);
        }
        AttributeType::Object(fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SecGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub delete_default_rules: ValueBool,
    pub rules: ValueList<Value<RuleState<'a>>>,
    pub created_at: ValueString<'a>,
    pub updated_at: ValueString<'a>,
    pub tags: Tags<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> SecGroupState<'a> {
    pub fn refresh(
        &mut self,
        group: SecurityGroup,
        region: &str,
        tags: Tags<'a>,
    ) -> Result<(), String> {
        let rules = group
            .security_group_rules
            .into_iter()
            .map(|rule| RuleState::from_api(rule).map(Value::Value))
            .collect::<Result<Vec<_>, _>>()?;

        self.id = ValueString::from(group.id);
        self.region = ValueString::from(region.to_string());
        self.name = ValueString::from(group.name);
        self.description = keep_empty(&self.description, Some(group.description));
        self.enterprise_project_id = non_empty(Some(group.enterprise_project_id));
        self.rules = Value::Value(rules);
        self.created_at = non_empty(Some(group.created_at));
        self.updated_at = non_empty(Some(group.updated_at));
        self.tags = tags::keep_empty(&self.tags, tags);
        Ok(())
    }
}

fn computed_string(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    }
}

impl<'a> WithSchema for SecGroupState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID_ATTRIBUTE.clone(),
                    "region" => REGION_ATTRIBUTE.clone(),
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the security group"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the security group"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "enterprise_project_id" => EPS_ATTRIBUTE.clone(),
                    "delete_default_rules" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Delete the rules created with the security group"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "rules" => Attribute {
                        attr_type: AttributeType::List(RuleState::object_type().into()),
                        description: Description::plain("Rules of the security group"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "created_at" => computed_string("Creation time"),
                    "updated_at" => computed_string("Last update time"),
                    "tags" => TAGS_ATTRIBUTE.clone(),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS_BLOCK.clone(),
                },
                description: Description::plain("Security group"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for SecGroupState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_not_empty(diags, &self.name, attr_path.clone().attribute("name"));
        validate_length(diags, &self.name, 64, attr_path.clone().attribute("name"));
        validate_length(
            diags,
            &self.description,
            255,
            attr_path.clone().attribute("description"),
        );
        self.timeouts
            .validate(diags, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for SecGroupState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        computed(&mut self.id);
        computed(&mut self.region);
        computed(&mut self.enterprise_project_id);
        computed(&mut self.rules);
        computed(&mut self.created_at);
        computed(&mut self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_from_api() {
        let rule = RuleState::from_api(SecurityGroupRule {
            id: "r1".to_string(),
            direction: "ingress".to_string(),
            ethertype: "IPv4".to_string(),
            protocol: "tcp".to_string(),
            multiport: "8000-8080".to_string(),
            priority: 1,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(rule.port_range_min, Value::Value(8000));
        assert_eq!(rule.port_range_max, Value::Value(8080));
        assert!(rule.remote_group_id.is_null());

        let rule = RuleState::from_api(SecurityGroupRule {
            multiport: "22,80".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(rule.ports, ValueString::from("22,80"));
        assert!(rule.port_range_min.is_null());

        assert!(RuleState::from_api(SecurityGroupRule {
            multiport: "ssh".to_string(),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn malformed_ports_fail_refresh() {
        let mut state = SecGroupState::default();
        let group = SecurityGroup {
            id: "sg1".to_string(),
            security_group_rules: vec![SecurityGroupRule {
                multiport: "1-x".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(state.refresh(group, "cn-north-4", Value::Null).is_err());
        assert!(state.id.is_null());
    }

    #[test]
    fn rule_object_type() {
        let AttributeType::Object(fields) = RuleState::object_type() else {
            panic!("rules must be objects");
        };
        assert_eq!(fields.len(), 13);
        assert_eq!(fields["priority"], AttributeType::Number);
    }
}
