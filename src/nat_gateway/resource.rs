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
use tracing::info;

use crate::client::ServiceClient;
use crate::config::ConfigHandle;
use crate::timeouts::{create_timeout, delete_timeout, update_timeout, DefaultTimeouts};
use crate::utils::{
    check_deleted, force_new, root_error, service_client, WithNormalize, WithSchema, WithValidate,
};
use crate::wait::{StateChangeConf, WaitError};

use super::api::{self, CreateOpts, UpdateOpts};
use super::state::NatGatewayState;

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(10, 10, 10);

#[derive(Debug, Clone)]
pub struct NatGatewayResource {
    config: ConfigHandle,
}

impl NatGatewayResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn read_gateway<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: NatGatewayState<'a>,
    ) -> Option<NatGatewayState<'a>> {
        let (_, client) = service_client(diags, &self.config, "nat", &state.region).await?;
        let gateway = check_deleted(
            diags,
            api::get(&client, state.id.as_str()).await,
            "Error retrieving NAT gateway",
        )?;
        state.refresh(gateway, &client.region);
        Some(state)
    }
}

async fn wait_for_active(
    client: &ServiceClient,
    id: &str,
    pending: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(&[pending], &["ACTIVE"], timeout)
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .wait_for_state(move || async move {
            let gateway = api::get(client, id).await?;
            let status = gateway.status.clone();
            Ok::<_, WaitError>(Some((gateway, status)))
        })
        .await?;
    Ok(())
}

async fn wait_for_deleted(
    client: &ServiceClient,
    id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["ACTIVE"], &["DELETED"], timeout)
        .delay(Duration::from_secs(5))
        .min_timeout(Duration::from_secs(3))
        .continuous_target_occurence(2)
        .wait_for_state(move || async move {
            let state = match api::get(client, id).await {
                Ok(_) => "ACTIVE",
                Err(err) if err.is_not_found() => "DELETED",
                Err(err) => return Err(WaitError::from(err)),
            };
            Ok::<_, WaitError>(Some(((), state.to_string())))
        })
        .await?;
    Ok(())
}

#[async_trait]
impl Resource for NatGatewayResource {
    type State<'a> = NatGatewayState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NatGatewayState::schema())
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
        let state = self.read_gateway(diags, state).await?;
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
        force_new(&mut trigger_replace, "vpc_id", &prior_state.vpc_id, &state.vpc_id);
        force_new(
            &mut trigger_replace,
            "subnet_id",
            &prior_state.subnet_id,
            &state.subnet_id,
        );
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
            service_client(diags, &self.config, "nat", &planned_state.region).await?;

        let opts = CreateOpts {
            name: planned_state.name.as_str(),
            spec: planned_state.spec.as_str(),
            vpc_id: planned_state.vpc_id.as_str(),
            subnet_id: planned_state.subnet_id.as_str(),
            description: planned_state.description.as_deref_option(),
            enterprise_project_id: config.enterprise_project_of(&planned_state.enterprise_project_id),
        };
        let gateway = match api::create(&client, &opts).await {
            Ok(gateway) => gateway,
            Err(err) => {
                root_error(diags, "Error creating NAT gateway", err);
                return None;
            }
        };
        info!(id = gateway.id.as_str(), "NAT gateway created");

        let timeout = create_timeout(&planned_state.timeouts, &TIMEOUTS);
        if let Err(err) = wait_for_active(&client, &gateway.id, "PENDING_CREATE", timeout).await {
            root_error(diags, "Error waiting for the NAT gateway to become active", err);
            return None;
        }

        let mut state = planned_state;
        state.id = ValueString::from(gateway.id);
        let state = self.read_gateway(diags, state).await?;
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
            service_client(diags, &self.config, "nat", &planned_state.region).await?;
        let id = prior_state.id.as_str();

        if prior_state.name != planned_state.name
            || prior_state.spec != planned_state.spec
            || prior_state.description != planned_state.description
        {
            let opts = UpdateOpts {
                name: planned_state.name.as_str(),
                spec: planned_state.spec.as_str(),
                description: planned_state.description.as_deref_option().unwrap_or_default(),
            };
            if let Err(err) = api::update(&client, id, &opts).await {
                root_error(diags, "Error updating NAT gateway", err);
                return None;
            }

            let timeout = update_timeout(&planned_state.timeouts, &TIMEOUTS);
            if let Err(err) = wait_for_active(&client, id, "PENDING_UPDATE", timeout).await {
                root_error(diags, "Error waiting for the NAT gateway to become active", err);
                return None;
            }
        }

        let mut state = planned_state;
        state.id = prior_state.id.clone();
        let state = self.read_gateway(diags, state).await?;
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let (_, client) = service_client(diags, &self.config, "nat", &state.region).await?;
        let id = state.id.as_str();
        match api::delete(&client, id).await {
            Ok(()) => (),
            Err(err) if err.is_not_found() => return Some(()),
            Err(err) => {
                root_error(diags, "Error deleting NAT gateway", err);
                return None;
            }
        }

        let timeout = delete_timeout(&state.timeouts, &TIMEOUTS);
        match wait_for_deleted(&client, id, timeout).await {
            Ok(()) => {
                info!(id, "NAT gateway deleted");
                Some(())
            }
            Err(err) => {
                root_error(diags, "Error waiting for the NAT gateway to be deleted", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = NatGatewayState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_gateway(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent NAT gateway");
                }
                None
            }
        }
    }
}
