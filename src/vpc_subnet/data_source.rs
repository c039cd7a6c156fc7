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

use async_trait::async_trait;
use tf_provider::schema::{AttributeConstraint, Description, Schema};
use tf_provider::value::{ValueEmpty, ValueString};
use tf_provider::{DataSource, Diagnostics};
use tracing::debug;

use crate::config::ConfigHandle;
use crate::tags::{get_tags, network_tags_url};
use crate::utils::{root_error, service_client, single_match, WithSchema};

use super::api::{self, Subnet};
use super::state::SubnetState;

/// Attributes usable as filters, the others are only computed
const FILTERS: &[&str] = &[
    "id",
    "region",
    "name",
    "cidr",
    "vpc_id",
    "gateway_ip",
    "availability_zone",
    "status",
];

fn matches(subnet: &Subnet, filter: &SubnetState) -> bool {
    [
        (&filter.id, &subnet.id),
        (&filter.name, &subnet.name),
        (&filter.cidr, &subnet.cidr),
        (&filter.gateway_ip, &subnet.gateway_ip),
        (&filter.availability_zone, &subnet.availability_zone),
        (&filter.status, &subnet.status),
    ]
    .into_iter()
    .all(|(expected, actual)| match expected.as_deref_option() {
        Some(expected) if !expected.is_empty() => expected == actual,
        _ => true,
    })
}

fn select(diags: &mut Diagnostics, subnets: Vec<Subnet>, filter: &SubnetState) -> Option<Subnet> {
    let found = subnets
        .into_iter()
        .filter(|subnet| matches(subnet, filter))
        .collect();
    single_match(diags, found, "subnet")
}

#[derive(Debug, Clone)]
pub struct SubnetDataSource {
    config: ConfigHandle,
}

impl SubnetDataSource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DataSource for SubnetDataSource {
    type State<'a> = SubnetState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        let mut schema = SubnetState::schema();
        for (name, attribute) in schema.block.attributes.iter_mut() {
            attribute.constraint = if FILTERS.contains(&name.as_str()) {
                AttributeConstraint::OptionalComputed
            } else {
                AttributeConstraint::Computed
            };
        }
        schema.block.description = Description::plain("Look up a single subnet");
        Some(schema)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let (_, client) = service_client(diags, &self.config, "vpc", &config.region).await?;

        let vpc_id = config.vpc_id.as_deref_option().filter(|id| !id.is_empty());
        let subnets = match api::list(&client, vpc_id).await {
            Ok(subnets) => subnets,
            Err(err) => {
                root_error(diags, "Error retrieving subnets", err);
                return None;
            }
        };
        debug!(count = subnets.len(), "listed subnets");

        let subnet = select(diags, subnets, &config)?;

        let (_, tags_client) =
            service_client(diags, &self.config, "networkv2", &config.region).await?;
        let tags = match get_tags(&tags_client, &network_tags_url(&tags_client, "subnets", &subnet.id)).await {
            Ok(tags) => tags,
            Err(err) => {
                root_error(diags, "Error fetching tags of the subnet", err);
                return None;
            }
        };

        let mut state = SubnetState {
            id: ValueString::from(subnet.id.clone()),
            ..Default::default()
        };
        state.refresh(subnet, &client.region, tags);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters() {
        let subnet = Subnet {
            id: "s1".to_string(),
            name: "demo".to_string(),
            cidr: "192.168.0.0/24".to_string(),
            gateway_ip: "192.168.0.1".to_string(),
            status: "ACTIVE".to_string(),
            ..Default::default()
        };
        assert!(matches(&subnet, &SubnetState::default()));
        assert!(matches(
            &subnet,
            &SubnetState {
                gateway_ip: "192.168.0.1".into(),
                ..Default::default()
            }
        ));
        assert!(!matches(
            &subnet,
            &SubnetState {
                name: "demo".into(),
                status: "DOWN".into(),
                ..Default::default()
            }
        ));
    }

    #[test]
    fn selection() {
        let subnet = |id: &str, zone: &str| Subnet {
            id: id.to_string(),
            name: "demo".to_string(),
            availability_zone: zone.to_string(),
            ..Default::default()
        };
        let subnets = || vec![subnet("s1", "cn-north-4a"), subnet("s2", "cn-north-4b")];

        let mut diags = Diagnostics::default();
        let filter = SubnetState {
            availability_zone: "cn-north-4b".into(),
            ..Default::default()
        };
        assert_eq!(select(&mut diags, subnets(), &filter).unwrap().id, "s2");
        assert!(diags.errors.is_empty());

        let filter = SubnetState {
            name: "demo".into(),
            ..Default::default()
        };
        assert!(select(&mut diags, subnets(), &filter).is_none());
        assert_eq!(diags.errors[0].summary, "Multiple subnets found");

        let mut diags = Diagnostics::default();
        let filter = SubnetState {
            id: "s3".into(),
            ..Default::default()
        };
        assert!(select(&mut diags, subnets(), &filter).is_none());
        assert_eq!(diags.errors[0].summary, "No subnet found");
    }

    #[test]
    fn filter_schema() {
        let source = SubnetDataSource::new(ConfigHandle::default());
        let schema = source.schema(&mut Diagnostics::default()).unwrap();
        let attributes = &schema.block.attributes;
        assert_eq!(attributes["vpc_id"].constraint, AttributeConstraint::OptionalComputed);
        assert_eq!(attributes["dns_list"].constraint, AttributeConstraint::Computed);
    }
}
