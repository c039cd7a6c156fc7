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

use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueMap, ValueNumber, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::{WithSchema, WithValidate};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub region: ValueString<'a>,
    pub access_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
    pub security_token: ValueString<'a>,
    pub project_id: ValueString<'a>,
    pub domain_id: ValueString<'a>,
    pub domain_name: ValueString<'a>,
    pub user_name: ValueString<'a>,
    pub password: ValueString<'a>,
    pub token: ValueString<'a>,
    pub auth_url: ValueString<'a>,
    pub cloud: ValueString<'a>,
    pub regional: ValueBool,
    pub endpoints: ValueMap<'a, ValueString<'a>>,
    pub insecure: ValueBool,
    pub max_retries: ValueNumber,
    pub enterprise_project_id: ValueString<'a>,
    pub shared_config_file: ValueString<'a>,
    pub profile: ValueString<'a>,
}

fn string_attribute(description: &str, sensitive: bool) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive,
        ..Default::default()
    }
}

impl<'a> WithSchema for ProviderConfig<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "region" => string_attribute("The region of the HuaweiCloud to use", false),
                    "access_key" => string_attribute("The access key of the HuaweiCloud to use", false),
                    "secret_key" => string_attribute("The secret key of the HuaweiCloud to use", true),
                    "security_token" => string_attribute(
                        "The security token to authenticate with a temporary security credential",
                        true,
                    ),
                    "project_id" => string_attribute("The ID of the project to login with", false),
                    "domain_id" => string_attribute("The ID of the Domain to scope to", false),
                    "domain_name" => string_attribute("The name of the Domain to scope to", false),
                    "user_name" => string_attribute("Username to login with", false),
                    "password" => string_attribute("Password to login with", true),
                    "token" => string_attribute("Authentication token to use as an alternative to username/password", true),
                    "auth_url" => string_attribute("The Identity authentication URL", false),
                    "cloud" => string_attribute("The endpoint of cloud provider, defaults to myhuaweicloud.com", false),
                    "regional" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Whether the service endpoints are regional"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "endpoints" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("The custom endpoints used to override the default endpoint URL"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "insecure" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Trust self-signed certificates"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "max_retries" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("How many times HTTP connection should be retried until giving up"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "enterprise_project_id" => string_attribute("Enterprise project ID used by default for the resources", false),
                    "shared_config_file" => string_attribute("The path to the shared config file. If not set, the default is ~/.hcloud/config.json", false),
                    "profile" => string_attribute("The profile name as set in the shared config file", false),
                },
                description: Description::plain("HuaweiCloud"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithValidate for ProviderConfig<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        // Credentials may come from the environment, they are checked by `configure`
        if let (Value::Value(_), Value::Null) = (&self.security_token, &self.access_key) {
            diags.error(
                "Missing access key",
                "`security_token` requires `access_key`",
                attr_path.clone().attribute("security_token"),
            );
        }

        if let Value::Value(max_retries) = self.max_retries {
            if max_retries < 0 {
                diags.error(
                    "Invalid max_retries",
                    "max_retries should be a positive value",
                    attr_path.clone().attribute("max_retries"),
                );
            }
        }

        for (service, endpoint) in self.endpoints.iter().flatten() {
            if let Value::Value(endpoint) = endpoint {
                if endpoint.trim().is_empty() {
                    diags.error(
                        "Invalid endpoint",
                        format!("the value of customizing endpoint {service} can not be empty"),
                        attr_path.clone().attribute("endpoints").key(service.to_string()),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn schema_is_consistent() {
        let schema = ProviderConfig::schema();
        assert!(schema.block.attributes["secret_key"].sensitive);
        assert!(schema.block.attributes["password"].sensitive);
        assert!(!schema.block.attributes["region"].sensitive);
        assert_eq!(schema.block.attributes.len(), 19);
    }

    #[test]
    fn security_token_requires_access_key() {
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            security_token: "STS".into(),
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            access_key: "AK".into(),
            secret_key: "SK".into(),
            security_token: "STS".into(),
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());
    }

    #[test]
    fn unknown_values_are_skipped() {
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            access_key: Value::Unknown,
            security_token: "STS".into(),
            max_retries: Value::Unknown,
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert!(diags.errors.is_empty());
    }

    #[test]
    fn bad_values() {
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            max_retries: Value::Value(-1),
            endpoints: Value::Value(BTreeMap::from([("vpc".into(), " ".into())])),
            ..Default::default()
        };
        config.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 2);
    }
}
