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

use crate::client::ServiceClient;
use crate::config::ConfigHandle;
use crate::tags::{self, get_tags, update_tags};
use crate::timeouts::{create_timeout, delete_timeout, update_timeout, DefaultTimeouts};
use crate::utils::{
    check_deleted, force_new, root_error, service_client, WithNormalize, WithSchema, WithValidate,
};
use crate::vpc_subnet::api as subnet_api;
use crate::wait::{StateChangeConf, WaitError};

use super::api::{self, CreateOpts, ExtendParam, Nic, PowerAction, RootVolume, SecurityGroupRef};
use super::state::{ComputeInstanceState, DEFAULT_SYSTEM_DISK_TYPE};

const TIMEOUTS: DefaultTimeouts = DefaultTimeouts::minutes(30, 30, 30);

const POWER_STATES: &[&str] = &["ACTIVE", "SHUTOFF", "REBOOT", "HARD_REBOOT"];

#[derive(Debug, Clone)]
pub struct ComputeInstanceResource {
    config: ConfigHandle,
}

impl ComputeInstanceResource {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }

    /// Read the instance with its interfaces, system disk and tags
    ///
    /// `None` when the instance does not exist anymore, or is being deleted.
    async fn read_instance<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: ComputeInstanceState<'a>,
    ) -> Option<ComputeInstanceState<'a>> {
        let (_, client) = service_client(diags, &self.config, "ecs", &state.region).await?;
        let id = state.id.as_str().to_string();
        let server = check_deleted(
            diags,
            api::get(&client, &id).await,
            "Error retrieving compute instance",
        )?;
        if matches!(server.status.as_str(), "DELETED" | "SOFT_DELETED") {
            info!(id, status = server.status.as_str(), "compute instance is deleted");
            return None;
        }

        let tags_url = api::tags_url(&client, &id);
        let (interfaces, tags) =
            match futures::try_join!(api::interfaces(&client, &id), get_tags(&client, &tags_url)) {
                Ok(result) => result,
                Err(err) => {
                    root_error(diags, "Error fetching the interfaces and tags of the instance", err);
                    return None;
                }
            };

        let system_disk = match server.system_disk() {
            Some(volume_id) => {
                let (_, evs) = service_client(diags, &self.config, "evs", &state.region).await?;
                match api::get_volume(&evs, volume_id).await {
                    Ok(volume) => Some(volume),
                    Err(err) => {
                        root_error(diags, "Error fetching the system disk of the instance", err);
                        return None;
                    }
                }
            }
            None => None,
        };

        state.refresh(server, interfaces, system_disk, &client.region, tags);
        Some(state)
    }

    /// VPC of the subnet of the first network
    async fn vpc_id(
        &self,
        diags: &mut Diagnostics,
        state: &ComputeInstanceState<'_>,
    ) -> Option<String> {
        let Some(subnet_id) = state.network_ids().first().copied() else {
            diags.error_short("At least one network is required", AttributePath::new("network"));
            return None;
        };
        let (_, client) = service_client(diags, &self.config, "vpc", &state.region).await?;
        match subnet_api::get(&client, subnet_id).await {
            Ok(subnet) => Some(subnet.vpc_id),
            Err(err) => {
                root_error(diags, "Error fetching the subnet of the first network", err);
                None
            }
        }
    }

    async fn update_security_groups(
        &self,
        diags: &mut Diagnostics,
        prior_state: &ComputeInstanceState<'_>,
        planned_state: &ComputeInstanceState<'_>,
    ) -> Option<()> {
        if !planned_state.security_group_ids.is_value()
            || prior_state.security_group_ids == planned_state.security_group_ids
        {
            return Some(());
        }
        let (_, client) =
            service_client(diags, &self.config, "ecsv21", &planned_state.region).await?;
        let id = prior_state.id.as_str();
        let prior = prior_state.security_group_ids();
        let planned = planned_state.security_group_ids();

        for group in prior.difference(&planned) {
            match api::remove_security_group(&client, id, group).await {
                Ok(()) => debug!(id, group, "security group removed from the instance"),
                Err(err) if err.is_not_found() => (),
                Err(err) => {
                    root_error(diags, "Error removing a security group from the instance", err);
                    return None;
                }
            }
        }
        for group in planned.difference(&prior) {
            if let Err(err) = api::add_security_group(&client, id, group).await {
                root_error(diags, "Error adding a security group to the instance", err);
                return None;
            }
            debug!(id, group, "security group added to the instance");
        }
        Some(())
    }
}

/// Wait for the server to leave the `pending` statuses; a server in `ERROR` fails with its fault
async fn wait_for_status(
    client: &ServiceClient,
    id: &str,
    pending: &[&str],
    target: &[&str],
    timeout: Duration,
) -> Result<(), WaitError> {
    StateChangeConf::new(pending, target, timeout)
        .delay(Duration::from_secs(5))
        .poll_interval(Duration::from_secs(5))
        .wait_for_state(move || async move {
            let server = match api::get(client, id).await {
                Ok(server) => server,
                Err(err) if err.is_not_found() => return Ok(Some(((), "DELETED".to_string()))),
                Err(err) => return Err(WaitError::from(err)),
            };
            if server.status == "ERROR" {
                return Err(WaitError::Failed(format!(
                    "instance {id} is in error state: {}",
                    server.fault.message
                )));
            }
            Ok::<_, WaitError>(Some(((), server.status)))
        })
        .await?;
    Ok(())
}

/// Apply a power action and wait for the instance to reach the resulting status
/// Whether an instance in `status` must be powered off before its deletion
fn needs_stop(status: &str) -> bool {
    status != PowerAction::Stop { hard: true }.target_status()
}

async fn power_action(
    client: &ServiceClient,
    id: &str,
    action: &str,
    timeout: Duration,
) -> Result<(), WaitError> {
    let action = PowerAction::parse(action)
        .ok_or_else(|| WaitError::Failed(format!("unsupported power action {action}")))?;
    let job = api::power(client, id, action).await?;
    api::wait_for_job(client, &job.job_id, timeout).await?;

    let target = action.target_status();
    let pending: Vec<&str> = POWER_STATES
        .iter()
        .copied()
        .filter(|status| *status != target)
        .collect();
    wait_for_status(client, id, &pending, &[target], timeout).await?;
    info!(id, ?action, "power action applied to the instance");
    Ok(())
}

#[async_trait]
impl Resource for ComputeInstanceResource {
    type State<'a> = ComputeInstanceState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ComputeInstanceState::schema())
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
        let state = self.read_instance(diags, state).await?;
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

        if state.flavor_id != prior_state.flavor_id
            || state.power_action != prior_state.power_action
        {
            state.status = ValueString::Unknown;
        }

        let mut trigger_replace = Vec::new();
        force_new(&mut trigger_replace, "region", &prior_state.region, &state.region);
        force_new(&mut trigger_replace, "image_id", &prior_state.image_id, &state.image_id);
        force_new(
            &mut trigger_replace,
            "availability_zone",
            &prior_state.availability_zone,
            &state.availability_zone,
        );
        force_new(&mut trigger_replace, "key_pair", &prior_state.key_pair, &state.key_pair);
        force_new(&mut trigger_replace, "user_data", &prior_state.user_data, &state.user_data);
        force_new(
            &mut trigger_replace,
            "system_disk_type",
            &prior_state.system_disk_type,
            &state.system_disk_type,
        );
        force_new(
            &mut trigger_replace,
            "system_disk_size",
            &prior_state.system_disk_size,
            &state.system_disk_size,
        );
        force_new(
            &mut trigger_replace,
            "enterprise_project_id",
            &prior_state.enterprise_project_id,
            &state.enterprise_project_id,
        );
        if state.networks_changed(&prior_state) {
            trigger_replace.push(AttributePath::new("network"));
        }

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
        let vpc_id = self.vpc_id(diags, &planned_state).await?;
        let (config, client) =
            service_client(diags, &self.config, "ecs", &planned_state.region).await?;
        let timeout = create_timeout(&planned_state.timeouts, &TIMEOUTS);

        let fixed_ips = planned_state
            .network
            .iter()
            .flatten()
            .filter_map(|network| network.as_ref_option())
            .map(|network| network.fixed_ip_v4.as_deref_option());
        let nics = planned_state
            .network_ids()
            .into_iter()
            .zip(fixed_ips)
            .map(|(subnet_id, ip_address)| Nic {
                subnet_id,
                ip_address,
            })
            .collect();

        let security_group_ids = planned_state.security_group_ids();
        let opts = CreateOpts {
            name: planned_state.name.as_str(),
            image_ref: planned_state.image_id.as_str(),
            flavor_ref: planned_state.flavor_id.as_str(),
            vpcid: &vpc_id,
            nics,
            security_groups: security_group_ids
                .iter()
                .map(|id| SecurityGroupRef { id })
                .collect(),
            availability_zone: planned_state.availability_zone.as_deref_option(),
            root_volume: RootVolume {
                volumetype: planned_state
                    .system_disk_type
                    .as_deref_option()
                    .unwrap_or(DEFAULT_SYSTEM_DISK_TYPE),
                size: planned_state.system_disk_size.as_option(),
            },
            admin_pass: planned_state.admin_pass.as_deref_option(),
            key_name: planned_state.key_pair.as_deref_option(),
            user_data: planned_state.encoded_user_data(),
            extend_param: ExtendParam {
                enterprise_project_id: config
                    .enterprise_project_of(&planned_state.enterprise_project_id),
            },
            server_tags: tags::expand(&planned_state.tags),
        };

        let response = match api::create(&client, &opts).await {
            Ok(response) => response,
            Err(err) => {
                root_error(diags, "Error creating compute instance", err);
                return None;
            }
        };
        let job = match api::wait_for_job(&client, &response.job_id, timeout).await {
            Ok(job) => job,
            Err(err) => {
                root_error(diags, "Error waiting for the instance creation job", err);
                return None;
            }
        };
        let Some(id) = job
            .server_id()
            .or(response.server_ids.first().map(String::as_str))
            .map(str::to_string)
        else {
            diags.root_error_short("The creation job did not report the ID of the instance");
            return None;
        };
        info!(id, "compute instance created");

        if let Err(err) = wait_for_status(&client, &id, &["BUILD"], &["ACTIVE"], timeout).await {
            root_error(diags, "Error waiting for the instance to become active", err);
            return None;
        }

        if let Some(action @ ("OFF" | "FORCE-OFF")) = planned_state.power_action.as_deref_option() {
            if let Err(err) = power_action(&client, &id, action, timeout).await {
                root_error(diags, "Error stopping the instance", err);
                return None;
            }
        }

        let mut state = planned_state;
        state.id = ValueString::from(id);
        let state = self.read_instance(diags, state).await?;
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
            service_client(diags, &self.config, "ecs", &planned_state.region).await?;
        let id = prior_state.id.as_str();
        let timeout = update_timeout(&planned_state.timeouts, &TIMEOUTS);

        if prior_state.name != planned_state.name {
            if let Err(err) = api::update_name(&client, id, planned_state.name.as_str()).await {
                root_error(diags, "Error updating the name of the instance", err);
                return None;
            }
        }

        self.update_security_groups(diags, &prior_state, &planned_state)
            .await?;

        if prior_state.admin_pass != planned_state.admin_pass {
            if let Some(password) = planned_state.admin_pass.as_deref_option() {
                if let Err(err) = api::reset_password(&client, id, password).await {
                    root_error(diags, "Error changing the administrator password", err);
                    return None;
                }
            }
        }

        if prior_state.flavor_id != planned_state.flavor_id {
            let result = match api::resize(&client, id, planned_state.flavor_id.as_str()).await {
                Ok(job) => api::wait_for_job(&client, &job.job_id, timeout).await.map(|_| ()),
                Err(err) => Err(WaitError::from(err)),
            };
            if let Err(err) = result {
                root_error(diags, "Error resizing the instance", err);
                return None;
            }
            info!(id, flavor = planned_state.flavor_id.as_str(), "compute instance resized");
        }

        if prior_state.tags != planned_state.tags {
            let url = api::tags_url(&client, id);
            if let Err(err) = update_tags(&client, &url, &prior_state.tags, &planned_state.tags).await
            {
                root_error(diags, "Error updating tags of the instance", err);
                return None;
            }
        }

        if prior_state.power_action != planned_state.power_action {
            if let Some(action) = planned_state.power_action.as_deref_option() {
                if let Err(err) = power_action(&client, id, action, timeout).await {
                    root_error(diags, "Error applying the power action", err);
                    return None;
                }
            }
        }

        let mut state = planned_state;
        state.id = prior_state.id.clone();
        let state = self.read_instance(diags, state).await?;
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let (_, client) = service_client(diags, &self.config, "ecs", &state.region).await?;
        let id = state.id.as_str();
        let timeout = delete_timeout(&state.timeouts, &TIMEOUTS);

        if state.stop_before_destroy == Value::Value(true) {
            match api::get(&client, id).await {
                Ok(server) if !needs_stop(&server.status) => {
                    debug!(id, status = server.status.as_str(), "instance is already stopped");
                }
                Ok(_) => {
                    if let Err(err) = power_action(&client, id, "FORCE-OFF", timeout).await {
                        root_error(diags, "Error stopping the instance before deleting it", err);
                        return None;
                    }
                }
                Err(err) if err.is_not_found() => return Some(()),
                Err(err) => {
                    root_error(diags, "Error retrieving the instance before deleting it", err);
                    return None;
                }
            }
        }

        let delete_volume = state.delete_disks_on_termination.unwrap_or_default();
        let job = match api::delete(&client, id, delete_volume).await {
            Ok(job) => job,
            Err(err) if err.is_not_found() => return Some(()),
            Err(err) => {
                root_error(diags, "Error deleting compute instance", err);
                return None;
            }
        };
        if let Err(err) = api::wait_for_job(&client, &job.job_id, timeout).await {
            root_error(diags, "Error waiting for the instance deletion job", err);
            return None;
        }

        match wait_for_status(
            &client,
            id,
            &["ACTIVE", "SHUTOFF"],
            &["DELETED", "SOFT_DELETED"],
            timeout,
        )
        .await
        {
            Ok(()) => {
                info!(id, "compute instance deleted");
                Some(())
            }
            Err(err) => {
                root_error(diags, "Error waiting for the instance to be deleted", err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = ComputeInstanceState {
            id: ValueString::from(id),
            ..Default::default()
        };
        match self.read_instance(diags, state).await {
            Some(state) => Some((state, Default::default())),
            None => {
                if diags.errors.is_empty() {
                    diags.root_error_short("Cannot import non-existent compute instance");
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tf_provider::value::ValueList;

    use super::super::state::NetworkState;
    use super::*;

    #[test]
    fn stop_before_destroy() {
        assert!(needs_stop("ACTIVE"));
        assert!(needs_stop("REBOOT"));
        assert!(!needs_stop("SHUTOFF"));
    }

    fn instance(flavor: &str, network: &str) -> ComputeInstanceState<'static> {
        ComputeInstanceState {
            id: "s1".into(),
            name: "web".into(),
            image_id: "i1".into(),
            flavor_id: ValueString::from(flavor.to_string()),
            network: ValueList::Value(vec![Value::Value(NetworkState {
                uuid: ValueString::from(network.to_string()),
                fixed_ip_v4: "192.168.0.10".into(),
                mac: "fa:16:3e:00:00:01".into(),
                port: "p1".into(),
            })]),
            status: "ACTIVE".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn resize_in_place() {
        let resource = ComputeInstanceResource::new(ConfigHandle::default());
        let mut diags = Diagnostics::default();
        let prior = instance("s6.small.1", "n1");
        let proposed = instance("s6.large.2", "n1");
        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(replace.is_empty());
        assert!(state.status.is_unknown());
    }

    #[tokio::test]
    async fn network_change_replaces() {
        let resource = ComputeInstanceResource::new(ConfigHandle::default());
        let mut diags = Diagnostics::default();
        let prior = instance("s6.small.1", "n1");
        let mut proposed = instance("s6.small.1", "n2");
        proposed.image_id = "i2".into();
        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            replace,
            [AttributePath::new("image_id"), AttributePath::new("network")]
        );
        assert_eq!(state.status, ValueString::from("ACTIVE"));
    }

    #[tokio::test]
    async fn requires_configured_provider() {
        let resource = ComputeInstanceResource::new(ConfigHandle::default());
        let mut diags = Diagnostics::default();
        assert!(resource
            .read_instance(&mut diags, instance("s6.small.1", "n1"))
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
