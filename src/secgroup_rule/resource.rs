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
use tf_provider::schema::Schema;
use tf_provider::value::{ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::config::ConfigHandle;
use crate::secgroup::api::{self, CreateRuleOpts};
use crate::utils::{
    check_deleted, root_error, service_client, WithNormalize, WithSchema, WithValidate,
};

use super::state::{SecGroupRuleState, DEFAULT_ACTION, DEFAULT_PRIORITY};

#[derive(Debug, Clone)]
pub struct SecGroupRuleResource {
    config: ConfigHandle,
}

impl SecGroupRuleResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn read_rule<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: SecGroupRuleState<'a>,
    ) -> Option<SecGroupRuleState<'a>> {
        let (_, client) = service_client(diags, &self.config, "vpcv3", &state.region).await?;
        let rule = check_deleted(
            diags,
            api::get_rule(&client, state.id.as_str()).await,
            "Error retrieving security group rule",
        )?;
        if let Err(err) = state.refresh(rule, &client.region) {
            diags.root_error("Invalid security group rule", err);
            return None;
        }
        Some(state)
    }
}

#[async_trait]
impl Resource for SecGroupRuleResource {
    type State<'a> = SecGroupRuleState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecGroupRuleState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default());

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
        let state = self.read_rule(diags, state).await?;
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = ValueString::Unknown;
        state.normalize(diags);

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.apply_defaults();
        let trigger_replace = state.changed_attributes(&prior_state);

        Some((state, prior_private_state, trigger_replace))
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
        let (_, client) =
            service_client(diags, &self.config, "vpcv3", &planned_state.region).await?;

        let opts = CreateRuleOpts {
            security_group_id: planned_state.security_group_id.as_str(),
            direction: planned_state.direction.as_str(),
            ethertype: planned_state.ethertype.as_str(),
            description: planned_state.description.as_deref_option(),
            protocol: planned_state.protocol.as_deref_option(),
            multiport: planned_state.multiport(),
            remote_ip_prefix: planned_state.remote_ip_prefix.as_deref_option(),
            remote_group_id: planned_state.remote_group_id.as_deref_option(),
            remote_address_group_id: planned_state.remote_address_group_id.as_deref_option(),
            action: planned_state
                .action
                .as_deref_option()
                .unwrap_or(DEFAULT_ACTION),
            priority: planned_state.priority.as_option().unwrap_or(DEFAULT_PRIORITY),
        };
        let rule = match api::create_rule(&client, &opts).await {
            Ok(rule) => rule,
            Err(err) => {
                root_error(diags, "Error creating security group rule", err);
                return None;
            }
        };
        info!(
            id = rule.id.as_str(),
            security_group = rule.security_group_id.as_str(),
            "security group rule created"
        );

        let mut state = planned_state;
        if let Err(err) = state.refresh(rule, &client.region) {
            diags.root_error("Invalid security group rule", err);
            return None;
        }
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
        // Only the timeouts can change in place
        let mut state = planned_state;
        state.id = prior_state.id.clone();
        let state = self.read_rule(diags, state).await?;
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let (_, client) = service_client(diags, &self.config, "vpcv3", &state.region).await?;
        match api::delete_rule(&client, state.id.as_str()).await {
            Ok(()) => {
                info!(id = state.id.as_str(), "security group rule deleted");
                Some(())
            }
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                root_error(diags, "Error deleting security group rule", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = SecGroupRuleState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_rule(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent security group rule");
                }
                None
            }
        }
    }
}
