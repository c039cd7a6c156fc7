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
use tf_provider::value::{self, Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::tags::{self, Tags};
use crate::timeouts::{Timeouts, TIMEOUTS_BLOCK};
use crate::utils::{
    computed, keep_empty, non_empty, validate_length, WithNormalize, WithSchema, WithValidate, EPS_ATTRIBUTE,
    ID_ATTRIBUTE, REGION_ATTRIBUTE, TAGS_ATTRIBUTE,
};

use super::api::Vpc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VpcState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub cidr: ValueString<'a>,
    pub description: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub status: ValueString<'a>,
    pub tags: Tags<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> VpcState<'a> {
    /// Copy the attributes reported by the API
    pub fn refresh(&mut self, vpc: Vpc, region: &str, tags: Tags<'a>) {
        self.id = ValueString::from(vpc.id);
        self.region = ValueString::from(region.to_string());
        self.name = ValueString::from(vpc.name);
        self.cidr = ValueString::from(vpc.cidr);
        self.description = keep_empty(&self.description, Some(vpc.description));
        self.enterprise_project_id = non_empty(Some(vpc.enterprise_project_id));
        self.status = ValueString::from(vpc.status);
        self.tags = tags::keep_empty(&self.tags, tags);
    }
}

pub(super) fn cidr_attribute(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

impl<'a> WithSchema for VpcState<'a> {
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
                        description: Description::plain("Name of the VPC"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "cidr" => cidr_attribute(
                        "Range of available subnets in the VPC",
                        AttributeConstraint::Required,
                    ),
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Supplementary information about the VPC"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "enterprise_project_id" => EPS_ATTRIBUTE.clone(),
                    "status" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Status of the VPC"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tags" => TAGS_ATTRIBUTE.clone(),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS_BLOCK.clone(),
                },
                description: Description::plain("Virtual Private Cloud"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for VpcState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_length(diags, &self.name, 64, attr_path.clone().attribute("name"));
        validate_length(
            diags,
            &self.description,
            255,
            attr_path.clone().attribute("description"),
        );
        validate_cidr(diags, &self.cidr, attr_path.clone().attribute("cidr"));
        self.timeouts
            .validate(diags, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for VpcState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        computed(&mut self.id);
        computed(&mut self.region);
        computed(&mut self.enterprise_project_id);
        computed(&mut self.status);
    }
}

/// Parse an IPv4 CIDR block, returning the network address and the prefix length
pub(crate) fn parse_cidr(cidr: &str) -> Option<(Ipv4Addr, u8)> {
    let (address, prefix) = cidr.split_once('/')?;
    let address: Ipv4Addr = address.parse().ok()?;
    let prefix: u8 = prefix.parse().ok()?;
    (prefix <= 32).then_some((address, prefix))
}

/// Whether `ip` belongs to the CIDR block `cidr`
pub(crate) fn cidr_contains(cidr: &str, ip: Ipv4Addr) -> bool {
    let Some((network, prefix)) = parse_cidr(cidr) else {
        return false;
    };
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    u32::from(network) & mask == u32::from(ip) & mask
}

pub(crate) fn validate_cidr(diags: &mut Diagnostics, value: &ValueString, attr_path: AttributePath) {
    if let Value::Value(cidr) = value {
        if parse_cidr(cidr).is_none() {
            diags.error(
                "Invalid CIDR",
                format!("`{cidr}` is not a valid IPv4 CIDR block"),
                attr_path,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_blocks() {
        assert_eq!(
            parse_cidr("192.168.0.0/16"),
            Some((Ipv4Addr::new(192, 168, 0, 0), 16))
        );
        assert_eq!(parse_cidr("192.168.0.0/33"), None);
        assert_eq!(parse_cidr("192.168.0.0"), None);
        assert_eq!(parse_cidr("fe80::/64"), None);

        assert!(cidr_contains("192.168.0.0/24", Ipv4Addr::new(192, 168, 0, 1)));
        assert!(!cidr_contains("192.168.0.0/24", Ipv4Addr::new(192, 168, 1, 1)));
        assert!(cidr_contains("0.0.0.0/0", Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        let state = VpcState {
            name: "demo".into(),
            cidr: "10.0.0.0/8".into(),
            ..Default::default()
        };
        state.validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        let state = VpcState {
            name: "x".repeat(65).into(),
            cidr: "10.0.0.0".into(),
            ..Default::default()
        };
        state.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn refresh_from_api() {
        let mut state = VpcState {
            timeouts: Value::Value(Timeouts::default()),
            ..Default::default()
        };
        state.refresh(
            Vpc {
                id: "v1".to_string(),
                name: "demo".to_string(),
                cidr: "10.0.0.0/8".to_string(),
                status: "OK".to_string(),
                enterprise_project_id: "0".to_string(),
                ..Default::default()
            },
            "cn-north-4",
            Value::Null,
        );
        assert_eq!(state.id, ValueString::from("v1"));
        assert_eq!(state.region, ValueString::from("cn-north-4"));
        assert_eq!(state.description, ValueString::Null);
        assert!(state.timeouts.is_value());
    }

    #[test]
    fn refresh_keeps_configured_empty_values() {
        let mut state = VpcState {
            description: "".into(),
            tags: Value::Value(Default::default()),
            ..Default::default()
        };
        let vpc = Vpc {
            id: "v1".to_string(),
            ..Default::default()
        };
        state.refresh(vpc.clone(), "cn-north-4", Value::Null);
        assert_eq!(state.description, ValueString::from(""));
        assert_eq!(state.tags, Value::Value(Default::default()));

        state.refresh(
            Vpc {
                description: "edge".to_string(),
                ..vpc
            },
            "cn-north-4",
            Value::Null,
        );
        assert_eq!(state.description, ValueString::from("edge"));
    }

    #[test]
    fn normalize_plan() {
        let mut state = VpcState {
            name: "demo".into(),
            region: "cn-north-4".into(),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        assert!(state.id.is_unknown());
        assert!(state.status.is_unknown());
        assert_eq!(state.region, ValueString::from("cn-north-4"));
    }
}
