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
use crate::timeouts::{create_timeout, delete_timeout, DefaultTimeouts};
use crate::utils::{
    check_deleted, force_new, root_error, service_client, WithNormalize, WithSchema, WithValidate,
};
use crate::wait::{StateChangeConf, WaitError};

use super::api::{self, CreateOpts, UpdateOpts};
use super::state::VpcState;

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(10, 10, 10);

#[derive(Debug, Clone)]
pub struct VpcResource {
    config: ConfigHandle,
}

impl VpcResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    /// Read the VPC and its tags, `None` when it does not exist anymore
    async fn read_vpc<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: VpcState<'a>,
    ) -> Option<VpcState<'a>> {
        let (_, client) = service_client(diags, &self.config, "vpc", &state.region).await?;
        let id = state.id.as_str().to_string();
        let vpc = check_deleted(diags, api::get(&client, &id).await, "Error retrieving VPC")?;

        let tags = read_tags(diags, &self.config, &state.region, &id).await?;
        state.refresh(vpc, &client.region, tags);
        Some(state)
    }
}

async fn read_tags<'a>(
    diags: &mut Diagnostics,
    config: &ConfigHandle,
    region: &ValueString<'_>,
    id: &str,
) -> Option<Tags<'a>> {
    let (_, client) = service_client(diags, config, "networkv2", region).await?;
    match get_tags(&client, &network_tags_url(&client, "vpcs", id)).await {
        Ok(tags) => Some(tags),
        Err(err) => {
            root_error(diags, "Error fetching tags of the VPC", err);
            None
        }
    }
}

async fn wait_for_active(
    client: &ServiceClient,
    id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["CREATING"], &["OK"], timeout)
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state(move || async move {
            let vpc = api::get(client, id).await?;
            let status = vpc.status.clone();
            Ok::<_, WaitError>(Some((vpc, status)))
        })
        .await?;
    Ok(())
}

/// State of a VPC after a deletion attempt
fn deletion_state(result: Result<(), ApiError>) -> Result<&'static str, WaitError> {
    match result {
        Ok(()) => Ok("ACTIVE"),
        Err(err) => match err.status() {
            Some(404) => Ok("DELETED"),
            // Subnets of the VPC are still being removed
            Some(409 | 500) => Ok("ACTIVE"),
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
            let state = deletion_state(api::delete(client, id).await)?;
            debug!(id, state, "deleting VPC");
            Ok(Some(((), state.to_string())))
        })
        .await?;
    Ok(())
}

#[async_trait]
impl Resource for VpcResource {
    type State<'a> = VpcState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VpcState::schema())
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
        let state = self.read_vpc(diags, state).await?;
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
        state.status = ValueString::Unknown;
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
        let state = proposed_state;
        let mut trigger_replace = Vec::new();
        force_new(&mut trigger_replace, "region", &prior_state.region, &state.region);
        force_new(
            &mut trigger_replace,
            "enterprise_project_id",
            &prior_state.enterprise_project_id,
            &state.enterprise_project_id,
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
            service_client(diags, &self.config, "vpc", &planned_state.region).await?;

        let opts = CreateOpts {
            name: planned_state.name.as_str(),
            cidr: planned_state.cidr.as_str(),
            description: planned_state.description.as_deref_option(),
            enterprise_project_id: config.enterprise_project_of(&planned_state.enterprise_project_id),
        };
        let vpc = match api::create(&client, &opts).await {
            Ok(vpc) => vpc,
            Err(err) => {
                root_error(diags, "Error creating VPC", err);
                return None;
            }
        };
        info!(id = vpc.id.as_str(), "VPC created");

        let timeout = create_timeout(&planned_state.timeouts, &TIMEOUTS);
        if let Err(err) = wait_for_active(&client, &vpc.id, timeout).await {
            root_error(diags, "Error waiting for the VPC to become available", err);
            return None;
        }

        if let Some(tags) = planned_state.tags.as_ref_option().filter(|t| !t.is_empty()) {
            let (_, tags_client) =
                service_client(diags, &self.config, "networkv2", &planned_state.region).await?;
            let url = network_tags_url(&tags_client, "vpcs", &vpc.id);
            let tags = Tags::Value(tags.clone());
            if let Err(err) = update_tags(&tags_client, &url, &Tags::Null, &tags).await {
                root_error(diags, "Error setting tags of the VPC", err);
                return None;
            }
        }

        let mut state = planned_state;
        state.id = ValueString::from(vpc.id);
        let state = self.read_vpc(diags, state).await?;
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
            service_client(diags, &self.config, "vpc", &planned_state.region).await?;
        let id = prior_state.id.as_str();

        if prior_state.name != planned_state.name
            || prior_state.cidr != planned_state.cidr
            || prior_state.description != planned_state.description
        {
            let opts = UpdateOpts {
                name: planned_state.name.as_str(),
                cidr: planned_state.cidr.as_str(),
                description: planned_state.description.as_deref_option().unwrap_or_default(),
            };
            if let Err(err) = api::update(&client, id, &opts).await {
                root_error(diags, "Error updating VPC", err);
                return None;
            }
        }

        if prior_state.tags != planned_state.tags {
            let (_, tags_client) =
                service_client(diags, &self.config, "networkv2", &planned_state.region).await?;
            let url = network_tags_url(&tags_client, "vpcs", id);
            if let Err(err) =
                update_tags(&tags_client, &url, &prior_state.tags, &planned_state.tags).await
            {
                root_error(diags, "Error updating tags of the VPC", err);
                return None;
            }
        }

        let mut state = planned_state;
        state.id = prior_state.id.clone();
        let state = self.read_vpc(diags, state).await?;
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let (_, client) = service_client(diags, &self.config, "vpc", &state.region).await?;
        let timeout = delete_timeout(&state.timeouts, &TIMEOUTS);
        match wait_for_deleted(&client, state.id.as_str(), timeout).await {
            Ok(()) => {
                info!(id = state.id.as_str(), "VPC deleted");
                Some(())
            }
            Err(err) => {
                root_error(diags, "Error deleting VPC", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = VpcState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_vpc(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent VPC");
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
            "https://vpc/v1/p1/vpcs/v1",
            "",
        )))
    }

    #[test]
    fn deletion_states() {
        assert_eq!(deletion_state(Ok(())).unwrap(), "ACTIVE");
        assert_eq!(delete_status(404).unwrap(), "DELETED");
        assert_eq!(delete_status(409).unwrap(), "ACTIVE");
        assert_eq!(delete_status(500).unwrap(), "ACTIVE");
        assert!(matches!(delete_status(400), Err(WaitError::Api(_))));
        assert!(matches!(delete_status(403), Err(WaitError::Api(_))));
        assert!(matches!(delete_status(503), Err(WaitError::Api(_))));
    }
}
