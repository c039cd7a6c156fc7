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
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::{debug, info};

use crate::client::{ApiError, ServiceClient};
use crate::config::ConfigHandle;
use crate::tags::{get_tags, network_tags_url, update_tags, Tags};
use crate::timeouts::{create_timeout, delete_timeout, update_timeout, DefaultTimeouts};
use crate::utils::{
    check_deleted, computed, force_new, root_error, service_client, WithNormalize, WithSchema,
    WithValidate,
};
use crate::wait::{StateChangeConf, WaitError};

use super::api::{self, CreateOpts, UpdateOpts};
use super::dns::subnet_dns_list;
use super::state::SubnetState;

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(5, 10, 10);

#[derive(Debug, Clone)]
pub struct SubnetResource {
    config: ConfigHandle,
}

impl SubnetResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    async fn read_subnet<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: SubnetState<'a>,
    ) -> Option<SubnetState<'a>> {
        let (_, client) = service_client(diags, &self.config, "vpc", &state.region).await?;
        let id = state.id.as_str().to_string();
        let subnet = check_deleted(diags, api::get(&client, &id).await, "Error retrieving subnet")?;

        let (_, tags_client) =
            service_client(diags, &self.config, "networkv2", &state.region).await?;
        let tags = match get_tags(&tags_client, &network_tags_url(&tags_client, "subnets", &id)).await
        {
            Ok(tags) => tags,
            Err(err) => {
                root_error(diags, "Error fetching tags of the subnet", err);
                return None;
            }
        };
        state.refresh(subnet, &client.region, tags);
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
        let url = network_tags_url(&client, "subnets", id);
        match update_tags(&client, &url, old, new).await {
            Ok(()) => Some(()),
            Err(err) => {
                root_error(diags, "Error updating tags of the subnet", err);
                None
            }
        }
    }
}

async fn wait_for_active(
    client: &ServiceClient,
    id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["UNKNOWN"], &["ACTIVE"], timeout)
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5))
        .wait_for_state(move || async move {
            let subnet = api::get(client, id).await?;
            if matches!(subnet.status.as_str(), "DOWN" | "ERROR") {
                return Err(WaitError::Failed(format!(
                    "subnet {id} is in status {}",
                    subnet.status
                )));
            }
            let status = subnet.status.clone();
            Ok::<_, WaitError>(Some((subnet, status)))
        })
        .await?;
    Ok(())
}

/// State of a subnet after a deletion attempt
fn deletion_state(result: Result<(), ApiError>) -> Result<&'static str, WaitError> {
    match result {
        Ok(()) => Ok("ACTIVE"),
        Err(err) => match err.status() {
            Some(400 | 404) => Ok("DELETED"),
            // Ports of the subnet are still being released
            Some(403 | 409 | 500) => {
                debug!(code = err.code(), "subnet is still in use");
                Ok("ACTIVE")
            }
            _ => Err(WaitError::from(err)),
        },
    }
}

async fn wait_for_deleted(
    client: &ServiceClient,
    vpc_id: &str,
    id: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["ACTIVE"], &["DELETED"], timeout)
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5))
        .wait_for_state(move || async move {
            let result = match api::get(client, id).await {
                Ok(_) => api::delete(client, vpc_id, id).await,
                Err(err) => Err(err),
            };
            let state = deletion_state(result)?;
            debug!(id, state, "deleting subnet");
            Ok::<_, WaitError>(Some(((), state.to_string())))
        })
        .await?;
    Ok(())
}

#[async_trait]
impl Resource for SubnetResource {
    type State<'a> = SubnetState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SubnetState::schema())
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
        let state = self.read_subnet(diags, state).await?;
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
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;

        if prior_state.ipv6_enable == Value::Value(true)
            && state.ipv6_enable == Value::Value(false)
        {
            diags.error(
                "IPv6 cannot be disabled",
                "the IPv6 subnet can not be disabled after it has been enabled",
                AttributePath::new("ipv6_enable"),
            );
            return None;
        }
        if state.ipv6_enable == Value::Value(true) && prior_state.ipv6_enable != state.ipv6_enable {
            computed(&mut state.ipv6_subnet_id);
            computed(&mut state.ipv6_cidr);
            computed(&mut state.ipv6_gateway);
        }

        let mut trigger_replace = Vec::new();
        force_new(&mut trigger_replace, "region", &prior_state.region, &state.region);
        force_new(&mut trigger_replace, "cidr", &prior_state.cidr, &state.cidr);
        force_new(
            &mut trigger_replace,
            "gateway_ip",
            &prior_state.gateway_ip,
            &state.gateway_ip,
        );
        force_new(&mut trigger_replace, "vpc_id", &prior_state.vpc_id, &state.vpc_id);
        force_new(
            &mut trigger_replace,
            "availability_zone",
            &prior_state.availability_zone,
            &state.availability_zone,
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
        let (_, client) =
            service_client(diags, &self.config, "vpc", &planned_state.region).await?;

        let primary_dns = planned_state.primary_dns.as_deref_option();
        let opts = CreateOpts {
            name: planned_state.name.as_str(),
            cidr: planned_state.cidr.as_str(),
            gateway_ip: planned_state.gateway_ip.as_str(),
            vpc_id: planned_state.vpc_id.as_str(),
            description: planned_state.description.as_deref_option(),
            availability_zone: planned_state.availability_zone.as_deref_option(),
            ipv6_enable: planned_state.ipv6_enable.unwrap_or_default(),
            dhcp_enable: planned_state.dhcp_enable.as_option().unwrap_or(true),
            primary_dns,
            secondary_dns: planned_state.secondary_dns.as_deref_option(),
            dns_list: subnet_dns_list(
                planned_state.dns_list(),
                primary_dns.is_some(),
                &client.region,
            ),
            extra_dhcp_opts: planned_state.dhcp_opts(false),
        };
        let subnet = match api::create(&client, &opts).await {
            Ok(subnet) => subnet,
            Err(err) => {
                root_error(diags, "Error creating subnet", err);
                return None;
            }
        };
        info!(id = subnet.id.as_str(), "subnet created");

        let timeout = create_timeout(&planned_state.timeouts, &TIMEOUTS);
        if let Err(err) = wait_for_active(&client, &subnet.id, timeout).await {
            root_error(diags, "Error waiting for the subnet to become active", err);
            return None;
        }

        if planned_state.tags.as_ref_option().is_some_and(|t| !t.is_empty()) {
            self.set_tags(
                diags,
                &planned_state.region,
                &subnet.id,
                &Tags::Null,
                &planned_state.tags,
            )
            .await?;
        }

        let mut state = planned_state;
        state.id = ValueString::from(subnet.id);
        let state = self.read_subnet(diags, state).await?;
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

        let dhcp_changed = prior_state.ntp_server_address != planned_state.ntp_server_address
            || prior_state.dhcp_lease_time != planned_state.dhcp_lease_time
            || prior_state.dhcp_domain_name != planned_state.dhcp_domain_name;
        let dns_changed = prior_state.primary_dns != planned_state.primary_dns
            || prior_state.secondary_dns != planned_state.secondary_dns;

        if prior_state.name != planned_state.name
            || prior_state.description != planned_state.description
            || prior_state.dhcp_enable != planned_state.dhcp_enable
            || prior_state.ipv6_enable != planned_state.ipv6_enable
            || prior_state.dns_list != planned_state.dns_list
            || dns_changed
            || dhcp_changed
        {
            let opts = UpdateOpts {
                name: planned_state.name.as_str(),
                dhcp_enable: planned_state.dhcp_enable.as_option().unwrap_or(true),
                description: (prior_state.description != planned_state.description)
                    .then(|| planned_state.description.as_deref_option().unwrap_or_default()),
                ipv6_enable: (prior_state.ipv6_enable != planned_state.ipv6_enable)
                    .then(|| planned_state.ipv6_enable.unwrap_or_default()),
                primary_dns: dns_changed
                    .then(|| planned_state.primary_dns.as_deref_option())
                    .flatten(),
                secondary_dns: dns_changed
                    .then(|| planned_state.secondary_dns.as_deref_option())
                    .flatten(),
                dns_list: (prior_state.dns_list != planned_state.dns_list)
                    .then(|| planned_state.dns_list())
                    .flatten(),
                extra_dhcp_opts: dhcp_changed.then(|| planned_state.dhcp_opts(true)),
            };
            if let Err(err) = api::update(&client, planned_state.vpc_id.as_str(), id, &opts).await {
                root_error(diags, "Error updating subnet", err);
                return None;
            }

            let timeout = update_timeout(&planned_state.timeouts, &TIMEOUTS);
            if let Err(err) = wait_for_active(&client, id, timeout).await {
                root_error(diags, "Error waiting for the subnet to become active", err);
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
        let state = self.read_subnet(diags, state).await?;
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
        match wait_for_deleted(&client, state.vpc_id.as_str(), state.id.as_str(), timeout).await {
            Ok(()) => {
                info!(id = state.id.as_str(), "subnet deleted");
                Some(())
            }
            Err(err) => {
                root_error(diags, "Error deleting subnet", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = SubnetState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_subnet(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent subnet");
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
            "https://vpc/v1/p1/vpcs/v1/subnets/s1",
            r#"{"error_code":"VPC.0502","error_msg":"subnet in use"}"#,
        )))
    }

    #[test]
    fn deletion_states() {
        assert_eq!(deletion_state(Ok(())).unwrap(), "ACTIVE");
        assert_eq!(delete_status(400).unwrap(), "DELETED");
        assert_eq!(delete_status(404).unwrap(), "DELETED");
        assert_eq!(delete_status(403).unwrap(), "ACTIVE");
        assert_eq!(delete_status(409).unwrap(), "ACTIVE");
        assert_eq!(delete_status(500).unwrap(), "ACTIVE");
        assert!(matches!(delete_status(401), Err(WaitError::Api(_))));
        assert!(matches!(delete_status(502), Err(WaitError::Api(_))));
    }
}
