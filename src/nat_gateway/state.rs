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
use tf_provider::value::{self, Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::timeouts::{Timeouts, TIMEOUTS_BLOCK};
use crate::utils::{
    computed, keep_empty, non_empty, validate_length, validate_one_of, WithNormalize, WithSchema,
    WithValidate, EPS_ATTRIBUTE, ID_ATTRIBUTE, REGION_ATTRIBUTE,
};

use super::api::NatGateway;

pub const SPECS: &[&str] = &["1", "2", "3", "4"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NatGatewayState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub spec: ValueString<'a>,
    pub vpc_id: ValueString<'a>,
    pub subnet_id: ValueString<'a>,
    pub description: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub status: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> NatGatewayState<'a> {
    pub fn refresh(&mut self, gateway: NatGateway, region: &str) {
        self.id = ValueString::from(gateway.id);
        self.region = ValueString::from(region.to_string());
        self.name = ValueString::from(gateway.name);
        self.spec = ValueString::from(gateway.spec);
        self.vpc_id = ValueString::from(gateway.vpc_id);
        self.subnet_id = ValueString::from(gateway.subnet_id);
        self.description = keep_empty(&self.description, Some(gateway.description));
        self.enterprise_project_id = non_empty(Some(gateway.enterprise_project_id));
        self.status = ValueString::from(gateway.status);
    }
}

fn attribute(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

impl<'a> WithSchema for NatGatewayState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID_ATTRIBUTE.clone(),
                    "region" => REGION_ATTRIBUTE.clone(),
                    "name" => attribute("Name of the NAT gateway", Required),
                    "spec" => attribute("Size of the NAT gateway, from `1` (small) to `4` (extra-large)", Required),
                    "vpc_id" => attribute("VPC of the NAT gateway", Required),
                    "subnet_id" => attribute("Subnet the NAT gateway is attached to", Required),
                    "description" => attribute("Description of the NAT gateway", Optional),
                    "enterprise_project_id" => EPS_ATTRIBUTE.clone(),
                    "status" => attribute("Status of the NAT gateway", Computed),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS_BLOCK.clone(),
                },
                description: Description::plain("Public NAT gateway"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for NatGatewayState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_length(diags, &self.name, 64, attr_path.clone().attribute("name"));
        validate_length(
            diags,
            &self.description,
            255,
            attr_path.clone().attribute("description"),
        );
        validate_one_of(diags, &self.spec, SPECS, attr_path.clone().attribute("spec"));
        self.timeouts
            .validate(diags, attr_path.attribute("timeouts"));
    }
}

impl<'a> WithNormalize for NatGatewayState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        computed(&mut self.id);
        computed(&mut self.region);
        computed(&mut self.enterprise_project_id);
        computed(&mut self.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_values() {
        let mut diags = Diagnostics::default();
        let state = NatGatewayState {
            name: "nat".into(),
            spec: "2".into(),
            ..Default::default()
        };
        state.validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());

        let state = NatGatewayState {
            spec: "5".into(),
            ..state
        };
        state.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn refresh() {
        let mut state = NatGatewayState::default();
        state.refresh(
            NatGateway {
                id: "n1".to_string(),
                spec: "1".to_string(),
                vpc_id: "v1".to_string(),
                status: "ACTIVE".to_string(),
                ..Default::default()
            },
            "cn-north-4",
        );
        assert_eq!(state.vpc_id, ValueString::from("v1"));
        assert_eq!(state.region, ValueString::from("cn-north-4"));
        assert!(state.description.is_null());
    }
}
