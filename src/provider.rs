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

use std::collections::HashMap;

use async_trait::async_trait;
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, Diagnostics, DynamicDataSource, DynamicResource, Provider};
use tracing::info;

use crate::compute_instance::ComputeInstanceResource;
use crate::config::{Config, ConfigHandle, ProviderConfig, Settings};
use crate::identity_group::IdentityGroupResource;
use crate::nat_gateway::NatGatewayResource;
use crate::secgroup::SecGroupResource;
use crate::secgroup_rule::SecGroupRuleResource;
use crate::utils::{error_detail, WithSchema, WithValidate};
use crate::vpc::{VpcDataSource, VpcResource};
use crate::vpc_subnet::{SubnetDataSource, SubnetResource};

#[derive(Debug, Default, Clone)]
pub struct HuaweiCloudProvider {
    config: ConfigHandle,
}

#[async_trait]
impl Provider for HuaweiCloudProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags, Default::default());

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let settings = Settings::resolve(&config, |key| std::env::var(key).ok())
            .and_then(|mut settings| {
                settings.apply_shared_config()?;
                Ok(settings)
            });
        let settings = match settings {
            Ok(settings) => settings,
            Err(err) => {
                diags.root_error("Invalid provider configuration", error_detail(err));
                return None;
            }
        };

        match Config::build(settings).await {
            Ok(config) => {
                info!(
                    terraform_version,
                    region = config.region.as_str(),
                    "provider configured"
                );
                self.config.set(config).await;
                Some(())
            }
            Err(err) => {
                diags.root_error("Error configuring the HuaweiCloud provider", error_detail(err));
                None
            }
        }
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let config = &self.config;
        Some(map! {
            "vpc" => VpcResource::new(config.clone()),
            "vpc_subnet" => SubnetResource::new(config.clone()),
            "networking_secgroup" => SecGroupResource::new(config.clone()),
            "networking_secgroup_rule" => SecGroupRuleResource::new(config.clone()),
            "nat_gateway" => NatGatewayResource::new(config.clone()),
            "identity_group" => IdentityGroupResource::new(config.clone()),
            "compute_instance" => ComputeInstanceResource::new(config.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let config = &self.config;
        Some(map! {
            "vpc" => VpcDataSource::new(config.clone()),
            "vpc_subnet" => SubnetDataSource::new(config.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_types() {
        let provider = HuaweiCloudProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        let mut names: Vec<_> = resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "compute_instance",
                "identity_group",
                "nat_gateway",
                "networking_secgroup",
                "networking_secgroup_rule",
                "vpc",
                "vpc_subnet",
            ]
        );
        assert_eq!(provider.get_data_sources(&mut diags).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn configure_without_credentials() {
        let provider = HuaweiCloudProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            region: "cn-north-4".into(),
            shared_config_file: "/nonexistent/huaweicloud/config.json".into(),
            ..Default::default()
        };
        assert_eq!(
            provider
                .configure(&mut diags, "1.9.0".to_string(), config)
                .await,
            None
        );
        assert_eq!(diags.errors.len(), 1);
    }
}
