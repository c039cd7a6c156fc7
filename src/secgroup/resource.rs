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

use std::time::Duration;

use async_trait::async_trait;
use tf_provider::schema::Schema;
use tf_provider::value::{ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::{debug, info};

use crate::client::{ApiError, ServiceClient};
use crate::config::ConfigHandle;
use crate::tags::{get_tags, network_tags_url, update_tags, Tags};
use crate::timeouts::{delete_timeout, DefaultTimeouts};
use crate::utils::{
    check_deleted, force_new, root_error, service_client, WithNormalize, WithSchema, WithValidate,
};
use crate::wait::{StateChangeConf, WaitError};

use super::api::{self, CreateOpts, UpdateOpts};
use super::state::SecGroupState;

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(10, 10, 10);

#[derive(Debug, Clone)]
pub struct SecGroupResource {
    config: ConfigHandle,
}

impl SecGroupResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn read_group<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: SecGroupState<'a>,
    ) -> Option<SecGroupState<'a>> {
        let (_, client) = service_client(diags, &self.config, "vpcv3", &state.region).await?;
        let id = state.id.as_str().to_string();
        let group = check_deleted(
            diags,
            api::get(&client, &id).await,
            "Error retrieving security group",
        )?;

        let (_, tags_client) =
            service_client(diags, &self.config, "networkv2", &state.region).await?;
        let url = network_tags_url(&tags_client, "security-groups", &id);
        let tags = match get_tags(&tags_client, &url).await {
            Ok(tags) => tags,
            Err(err) => {
                root_error(diags, "Error fetching tags of the security group", err);
                return None;
            }
        };

        if let Err(err) = state.refresh(group, &client.region, tags) {
            diags.root_error("Invalid security group rule", err);
            return None;
        }
        Some(state)
    }

    async fn set_tags(
        &self,
        diags: &mut Diagnostics,
        region: &ValueString<'_>,
        id: &str,
        old: &Tags<'_>,
        new: &Tags<'_>,
    ) -> Option<()> {
        let (_, client) = service_client(diags, &self.config, "networkv2", region).await?;
        let url = network_tags_url(&client, "security-groups", id);
        match update_tags(&client, &url, old, new).await {
            Ok(()) => Some(()),
            Err(err) => {
                root_error(diags, "Error updating tags of the security group", err);
                None
            }
        }
    }
}

/// State of a security group after a deletion attempt
fn deletion_state(result: Result<(), ApiError>) -> Result<&'static str, WaitError> {
    match result {
        Ok(()) => Ok("ACTIVE"),
        Err(err) => match err.status() {
            Some(404) => Ok("DELETED"),
            // Still used by a port or a rule of another group
            Some(409) => Ok("ACTIVE"),
            _ => Err(WaitError::from(err)),
        },
    }
}

async fn wait_for_deleted(
    client: &ServiceClient,
    id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["ACTIVE"], &["DELETED"], timeout)
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state(move || async move {
            let result = match api::get(client, id).await {
                Ok(_) => api::delete(client, id).await,
                Err(err) => Err(err),
            };
            let state = deletion_state(result)?;
            debug!(id, state, "deleting security group");
            Ok::<_, WaitError>(Some(((), state.to_string())))
        })
        .await?;
    Ok(())
}

#[async_trait]
impl Resource for SecGroupResource {
    type State<'a> = SecGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SecGroupState::schema())
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
        let state = self.read_group(diags, state).await?;
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
        if prior_state.name != state.name || prior_state.description != state.description {
            state.updated_at = ValueString::Unknown;
        }

        let mut trigger_replace = Vec::new();
        force_new(&mut trigger_replace, "region", &prior_state.region, &state.region);
        force_new(
            &mut trigger_replace,
            "enterprise_project_id",
            &prior_state.enterprise_project_id,
            &state.enterprise_project_id,
        );
        force_new(
            &mut trigger_replace,
            "delete_default_rules",
            &prior_state.delete_default_rules,
            &state.delete_default_rules,
        );

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
        let (config, client) =
            service_client(diags, &self.config, "vpcv3", &planned_state.region).await?;

        let opts = CreateOpts {
            name: planned_state.name.as_str(),
            enterprise_project_id: config.enterprise_project_of(&planned_state.enterprise_project_id),
        };
        let group = match api::create(&client, &opts).await {
            Ok(group) => group,
            Err(err) => {
                root_error(diags, "Error creating security group", err);
                return None;
            }
        };
        info!(id = group.id.as_str(), "security group created");

        // The creation request does not take a description
        if let Some(description) = planned_state.description.as_deref_option() {
            let opts = UpdateOpts {
                name: planned_state.name.as_str(),
                description,
            };
            if let Err(err) = api::update(&client, &group.id, &opts).await {
                root_error(diags, "Error setting the description of the security group", err);
                return None;
            }
        }

        if planned_state.delete_default_rules.unwrap_or_default() {
            for rule in &group.security_group_rules {
                debug!(rule = rule.id.as_str(), "deleting default rule");
                if let Err(err) = api::delete_rule(&client, &rule.id).await {
                    root_error(diags, "Error deleting a default security group rule", err);
                    return None;
                }
            }
        }

        if planned_state.tags.as_ref_option().is_some_and(|t| !t.is_empty()) {
            self.set_tags(
                diags,
                &planned_state.region,
                &group.id,
                &Tags::Null,
                &planned_state.tags,
            )
            .await?;
        }

        let mut state = planned_state;
        state.id = ValueString::from(group.id);
        let state = self.read_group(diags, state).await?;
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
        let (_, client) =
            service_client(diags, &self.config, "vpcv3", &planned_state.region).await?;
        let id = prior_state.id.as_str();

        if prior_state.name != planned_state.name
            || prior_state.description != planned_state.description
        {
            let opts = UpdateOpts {
                name: planned_state.name.as_str(),
                description: planned_state.description.as_deref_option().unwrap_or_default(),
            };
            if let Err(err) = api::update(&client, id, &opts).await {
                root_error(diags, "Error updating security group", err);
                return None;
            }
        }

        if prior_state.tags != planned_state.tags {
            self.set_tags(
                diags,
                &planned_state.region,
                id,
                &prior_state.tags,
                &planned_state.tags,
            )
            .await?;
        }

        let mut state = planned_state;
        state.id = prior_state.id.clone();
        let state = self.read_group(diags, state).await?;
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
        let timeout = delete_timeout(&state.timeouts, &TIMEOUTS);
        match wait_for_deleted(&client, state.id.as_str(), timeout).await {
            Ok(()) => {
                info!(id = state.id.as_str(), "security group deleted");
                Some(())
            }
            Err(err) => {
                root_error(diags, "Error deleting security group", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = SecGroupState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_group(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent security group");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete_status(status: u16) -> Result<&'static str, WaitError> {
        deletion_state(Err(ApiError::from_response(
            status,
            "DELETE",
            "https://vpc/v1/p1/security-groups/g1",
            "",
        )))
    }

    #[test]
    fn deletion_states() {
        assert_eq!(deletion_state(Ok(())).unwrap(), "ACTIVE");
        assert_eq!(delete_status(404).unwrap(), "DELETED");
        assert_eq!(delete_status(409).unwrap(), "ACTIVE");
        assert!(matches!(delete_status(403), Err(WaitError::Api(_))));
        assert!(matches!(delete_status(500), Err(WaitError::Api(_))));
    }
}
