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
use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{DataSource, Diagnostics};
use tracing::debug;

use crate::config::ConfigHandle;
use crate::tags::{get_tags, network_tags_url, Tags};
use crate::utils::{non_empty, root_error, service_client, single_match, REGION_ATTRIBUTE};

use super::api::{self, ListOpts, Vpc};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VpcDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub region: ValueString<'a>,
    pub name: ValueString<'a>,
    pub cidr: ValueString<'a>,
    pub status: ValueString<'a>,
    pub enterprise_project_id: ValueString<'a>,
    pub description: ValueString<'a>,
    pub tags: Tags<'a>,
}

fn filter_attribute(description: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::OptionalComputed,
        ..Default::default()
    }
}

/// Client side filters, every set filter must match
fn matches(vpc: &Vpc, filter: &VpcDataSourceState) -> bool {
    [
        (&filter.id, &vpc.id),
        (&filter.name, &vpc.name),
        (&filter.cidr, &vpc.cidr),
        (&filter.status, &vpc.status),
    ]
    .into_iter()
    .all(|(expected, actual)| match expected.as_deref_option() {
        Some(expected) if !expected.is_empty() => expected == actual,
        _ => true,
    })
}

/// The VPC matching the filters of the data source configuration
fn select(diags: &mut Diagnostics, vpcs: Vec<Vpc>, filter: &VpcDataSourceState) -> Option<Vpc> {
    let found = vpcs.into_iter().filter(|vpc| matches(vpc, filter)).collect();
    single_match(diags, found, "VPC")
}

#[derive(Debug, Clone)]
pub struct VpcDataSource {
    config: ConfigHandle,
}

impl VpcDataSource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DataSource for VpcDataSource {
    type State<'a> = VpcDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => filter_attribute("ID of the VPC"),
                    "region" => REGION_ATTRIBUTE.clone(),
                    "name" => filter_attribute("Name of the VPC"),
                    "cidr" => filter_attribute("CIDR block of the VPC"),
                    "status" => filter_attribute("Status of the VPC"),
                    "enterprise_project_id" => filter_attribute("Enterprise project of the VPC"),
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the VPC"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tags" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Tags of the VPC"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Look up a single VPC"),
                ..Default::default()
            },
        })
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let (_, client) = service_client(diags, &self.config, "vpc", &config.region).await?;

        let opts = ListOpts {
            id: config.id.as_deref_option().filter(|id| !id.is_empty()),
            enterprise_project_id: config
                .enterprise_project_id
                .as_deref_option()
                .filter(|eps| !eps.is_empty()),
        };
        let vpcs = match api::list(&client, &opts).await {
            Ok(vpcs) => vpcs,
            Err(err) => {
                root_error(diags, "Error retrieving VPCs", err);
                return None;
            }
        };
        debug!(count = vpcs.len(), "listed VPCs");

        let vpc = select(diags, vpcs, &config)?;

        let (_, tags_client) =
            service_client(diags, &self.config, "networkv2", &config.region).await?;
        let tags = match get_tags(&tags_client, &network_tags_url(&tags_client, "vpcs", &vpc.id)).await {
            Ok(tags) => tags,
            Err(err) => {
                root_error(diags, "Error fetching tags of the VPC", err);
                return None;
            }
        };

        Some(VpcDataSourceState {
            id: ValueString::from(vpc.id),
            region: ValueString::from(client.region.clone()),
            name: ValueString::from(vpc.name),
            cidr: ValueString::from(vpc.cidr),
            status: ValueString::from(vpc.status),
            enterprise_project_id: non_empty(Some(vpc.enterprise_project_id)),
            description: non_empty(Some(vpc.description)),
            tags: match tags {
                Value::Value(tags) => Value::Value(tags),
                _ => Value::Value(Default::default()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters() {
        let vpc = Vpc {
            id: "v1".to_string(),
            name: "demo".to_string(),
            cidr: "10.0.0.0/8".to_string(),
            status: "OK".to_string(),
            ..Default::default()
        };
        assert!(matches(&vpc, &VpcDataSourceState::default()));
        assert!(matches(
            &vpc,
            &VpcDataSourceState {
                name: "demo".into(),
                status: Value::Unknown,
                ..Default::default()
            }
        ));
        assert!(!matches(
            &vpc,
            &VpcDataSourceState {
                name: "demo".into(),
                cidr: "192.168.0.0/16".into(),
                ..Default::default()
            }
        ));
        assert!(!matches(
            &vpc,
            &VpcDataSourceState {
                id: "v2".into(),
                ..Default::default()
            }
        ));
    }

    #[test]
    fn selection() {
        let vpc = |id: &str, name: &str| Vpc {
            id: id.to_string(),
            name: name.to_string(),
            status: "OK".to_string(),
            ..Default::default()
        };
        let vpcs = || vec![vpc("v1", "front"), vpc("v2", "back"), vpc("v3", "back")];

        let mut diags = Diagnostics::default();
        let filter = VpcDataSourceState {
            name: "front".into(),
            ..Default::default()
        };
        assert_eq!(select(&mut diags, vpcs(), &filter).unwrap().id, "v1");
        assert!(diags.errors.is_empty());

        let filter = VpcDataSourceState {
            id: "v3".into(),
            ..Default::default()
        };
        assert_eq!(select(&mut diags, vpcs(), &filter).unwrap().id, "v3");

        let filter = VpcDataSourceState {
            name: "back".into(),
            ..Default::default()
        };
        assert!(select(&mut diags, vpcs(), &filter).is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "Multiple VPCs found");

        let mut diags = Diagnostics::default();
        let filter = VpcDataSourceState {
            cidr: "172.16.0.0/12".into(),
            ..Default::default()
        };
        assert!(select(&mut diags, vpcs(), &filter).is_none());
        assert_eq!(diags.errors[0].summary, "No VPC found");
    }
}
