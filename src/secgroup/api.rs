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

//! Security group and security group rule v3 API

use serde::{Deserialize, Serialize};

use crate::client::{nullable, ApiError, ServiceClient};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecurityGroupRule {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub security_group_id: String,
    pub direction: String,
    #[serde(deserialize_with = "nullable")]
    pub protocol: String,
    pub ethertype: String,
    #[serde(deserialize_with = "nullable")]
    pub multiport: String,
    #[serde(deserialize_with = "nullable")]
    pub action: String,
    pub priority: i64,
    #[serde(deserialize_with = "nullable")]
    pub remote_group_id: String,
    #[serde(deserialize_with = "nullable")]
    pub remote_ip_prefix: String,
    #[serde(deserialize_with = "nullable")]
    pub remote_address_group_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    #[serde(deserialize_with = "nullable")]
    pub enterprise_project_id: String,
    #[serde(deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(deserialize_with = "nullable")]
    pub updated_at: String,
    #[serde(deserialize_with = "nullable")]
    pub security_group_rules: Vec<SecurityGroupRule>,
}

#[derive(Debug, Deserialize)]
struct SecurityGroupResponse {
    security_group: SecurityGroup,
}

#[derive(Debug, Deserialize)]
struct RuleResponse {
    security_group_rule: SecurityGroupRule,
}

#[derive(Debug, Serialize)]
struct SecurityGroupRequest<T> {
    security_group: T,
}

#[derive(Debug, Serialize)]
struct RuleRequest<T> {
    security_group_rule: T,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateOpts<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateOpts<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateRuleOpts<'a> {
    pub security_group_id: &'a str,
    pub direction: &'a str,
    pub ethertype: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address_group_id: Option<&'a str>,
    pub action: &'a str,
    pub priority: i64,
}

fn group_url(client: &ServiceClient, id: &str) -> String {
    client.url(&format!("vpc/security-groups/{id}"))
}

fn rule_url(client: &ServiceClient, id: &str) -> String {
    client.url(&format!("vpc/security-group-rules/{id}"))
}

pub async fn create(
    client: &ServiceClient,
    opts: &CreateOpts<'_>,
) -> Result<SecurityGroup, ApiError> {
    let response: SecurityGroupResponse = client
        .post(
            &client.url("vpc/security-groups"),
            &SecurityGroupRequest {
                security_group: opts,
            },
        )
        .await?;
    Ok(response.security_group)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<SecurityGroup, ApiError> {
    let response: SecurityGroupResponse = client.get(&group_url(client, id)).await?;
    Ok(response.security_group)
}

pub async fn update(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateOpts<'_>,
) -> Result<(), ApiError> {
    let _: serde_json::Value = client
        .put(
            &group_url(client, id),
            &SecurityGroupRequest {
                security_group: opts,
            },
        )
        .await?;
    Ok(())
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<(), ApiError> {
    client.delete(&group_url(client, id)).await
}

pub async fn create_rule(
    client: &ServiceClient,
    opts: &CreateRuleOpts<'_>,
) -> Result<SecurityGroupRule, ApiError> {
    let response: RuleResponse = client
        .post(
            &client.url("vpc/security-group-rules"),
            &RuleRequest {
                security_group_rule: opts,
            },
        )
        .await?;
    Ok(response.security_group_rule)
}

pub async fn get_rule(client: &ServiceClient, id: &str) -> Result<SecurityGroupRule, ApiError> {
    let response: RuleResponse = client.get(&rule_url(client, id)).await?;
    Ok(response.security_group_rule)
}

pub async fn delete_rule(client: &ServiceClient, id: &str) -> Result<(), ApiError> {
    client.delete(&rule_url(client, id)).await
}

/// Bounds of a `N` or `N-M` port range; lists (`N,M`) have no bounds
pub fn port_range(ports: &str) -> Result<Option<(i64, i64)>, String> {
    if ports.contains(',') {
        return Ok(None);
    }
    let invalid = || format!("the format of the ports `{ports}` is invalid");
    let parse = |s: &str| -> Result<i64, String> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse().map_err(|_| invalid())
    };
    match ports.split_once('-') {
        Some((min, max)) => Ok(Some((parse(min)?, parse(max)?))),
        None => {
            let port = parse(ports)?;
            Ok(Some((port, port)))
        }
    }
}
