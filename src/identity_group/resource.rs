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

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::client::ServiceClient;
use crate::config::{Config, ConfigHandle};
use crate::utils::{
    check_deleted, computed, keep_empty, root_error, service_client, validate_length,
    validate_not_empty, ID_ATTRIBUTE,
};

use super::api::{self, CreateOpts, Group, UpdateOpts};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub domain_id: ValueString<'a>,
}

impl<'a> GroupState<'a> {
    fn refresh(&mut self, group: Group) {
        self.id = ValueString::from(group.id);
        self.name = ValueString::from(group.name);
        self.description = keep_empty(&self.description, Some(group.description));
        self.domain_id = ValueString::from(group.domain_id);
    }
}

/// User group of the account, managed through the global identity service
#[derive(Debug, Clone)]
pub struct IdentityGroupResource {
    config: ConfigHandle,
}

impl IdentityGroupResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn client(
        &self,
        diags: &mut Diagnostics,
    ) -> Option<(Arc<Config>, ServiceClient)> {
        service_client(diags, &self.config, "identity", &Value::Null).await
    }

    async fn read_group<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: GroupState<'a>,
    ) -> Option<GroupState<'a>> {
        let (_, client) = self.client(diags).await?;
        let group = check_deleted(
            diags,
            api::get(&client, state.id.as_str()).await,
            "Error retrieving identity group",
        )?;
        state.refresh(group);
        Some(state)
    }
}

#[async_trait]
impl Resource for IdentityGroupResource {
    type State<'a> = GroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => ID_ATTRIBUTE.clone(),
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the group"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the group"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "domain_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Account the group belongs to"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("IAM user group"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        validate_not_empty(diags, &config.name, AttributePath::new("name"));
        validate_length(diags, &config.name, 64, AttributePath::new("name"));
        validate_length(diags, &config.description, 255, AttributePath::new("description"));

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = self.read_group(diags, state).await?;
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = ValueString::Unknown;
        computed(&mut state.domain_id);

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        Some((proposed_state, prior_private_state, Vec::new()))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (config, client) = self.client(diags).await?;
        let domain_id = match config.domain_id().await {
            Ok(domain_id) => domain_id,
            Err(err) => {
                root_error(diags, "Error resolving the domain of the account", err);
                return None;
            }
        };

        let opts = CreateOpts {
            name: planned_state.name.as_str(),
            domain_id: &domain_id,
            description: planned_state.description.as_deref_option(),
        };
        let group = match api::create(&client, &opts).await {
            Ok(group) => group,
            Err(err) => {
                root_error(diags, "Error creating identity group", err);
                return None;
            }
        };
        info!(id = group.id.as_str(), "identity group created");

        let mut state = planned_state;
        state.refresh(group);
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (_, client) = self.client(diags).await?;

        let opts = UpdateOpts {
            name: (prior_state.name != planned_state.name).then(|| planned_state.name.as_str()),
            description: (prior_state.description != planned_state.description)
                .then(|| planned_state.description.as_deref_option().unwrap_or_default()),
        };
        let group = match api::update(&client, prior_state.id.as_str(), &opts).await {
            Ok(group) => group,
            Err(err) => {
                root_error(diags, "Error updating identity group", err);
                return None;
            }
        };

        let mut state = planned_state;
        state.refresh(group);
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let (_, client) = self.client(diags).await?;
        match api::delete(&client, state.id.as_str()).await {
            Ok(()) => {
                info!(id = state.id.as_str(), "identity group deleted");
                Some(())
            }
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                root_error(diags, "Error deleting identity group", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = GroupState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_group(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent identity group");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validation() {
        let resource = IdentityGroupResource::new(ConfigHandle::default());
        let mut diags = Diagnostics::default();
        let state = GroupState {
            name: "admins".into(),
            ..Default::default()
        };
        assert_eq!(resource.validate(&mut diags, state).await, Some(()));

        let state = GroupState {
            name: " ".into(),
            ..Default::default()
        };
        assert_eq!(resource.validate(&mut diags, state).await, None);
    }

    #[tokio::test]
    async fn requires_configured_provider() {
        let resource = IdentityGroupResource::new(ConfigHandle::default());
        let mut diags = Diagnostics::default();
        let state = GroupState {
            id: "g1".into(),
            ..Default::default()
        };
        assert!(resource.read_group(&mut diags, state).await.is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn refresh() {
        let mut state = GroupState::default();
        state.refresh(Group {
            id: "g1".to_string(),
            name: "admins".to_string(),
            description: String::new(),
            domain_id: "d1".to_string(),
        });
        assert_eq!(state.domain_id, ValueString::from("d1"));
        assert!(state.description.is_null());
    }
}
