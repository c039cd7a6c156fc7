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

//! Identity v3 groups API

use serde::{Deserialize, Serialize};

use crate::client::{nullable, ApiError, ServiceClient};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub domain_id: String,
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    group: Group,
}

#[derive(Debug, Serialize)]
struct GroupRequest<T> {
    group: T,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateOpts<'a> {
    pub name: &'a str,
    pub domain_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateOpts<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

pub async fn create(client: &ServiceClient, opts: &CreateOpts<'_>) -> Result<Group, ApiError> {
    let response: GroupResponse = client
        .post(&client.url("groups"), &GroupRequest { group: opts })
        .await?;
    Ok(response.group)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<Group, ApiError> {
    let response: GroupResponse = client.get(&client.url(&format!("groups/{id}"))).await?;
    Ok(response.group)
}

pub async fn update(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateOpts<'_>,
) -> Result<Group, ApiError> {
    let response: GroupResponse = client
        .patch(
            &client.url(&format!("groups/{id}")),
            &GroupRequest { group: opts },
        )
        .await?;
    Ok(response.group)
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<(), ApiError> {
    client.delete(&client.url(&format!("groups/{id}"))).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn partial_update() {
        let opts = UpdateOpts {
            description: Some(""),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(GroupRequest { group: &opts }).unwrap(),
            json!({"group": {"description": ""}})
        );
    }
}
