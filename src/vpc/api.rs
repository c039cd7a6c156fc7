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

//! VPC v1 API

use serde::{Deserialize, Serialize};

use crate::client::{nullable, ApiError, ServiceClient};

pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Vpc {
    pub id: String,
    pub name: String,
    pub cidr: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub enterprise_project_id: String,
}

#[derive(Debug, Deserialize)]
struct VpcResponse {
    vpc: Vpc,
}

#[derive(Debug, Deserialize)]
struct VpcList {
    #[serde(default)]
    vpcs: Vec<Vpc>,
}

#[derive(Debug, Serialize)]
struct VpcRequest<T> {
    vpc: T,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateOpts<'a> {
    pub name: &'a str,
    pub cidr: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<&'a str>,
}

/// `description` is always sent so that it can be cleared
#[derive(Debug, Default, Serialize)]
pub struct UpdateOpts<'a> {
    pub name: &'a str,
    pub cidr: &'a str,
    pub description: &'a str,
}

/// Server side filters of the VPC list
#[derive(Debug, Default, Clone)]
pub struct ListOpts<'a> {
    pub id: Option<&'a str>,
    pub enterprise_project_id: Option<&'a str>,
}

impl ListOpts<'_> {
    fn query(&self, marker: Option<&str>) -> String {
        let mut query = format!("limit={PAGE_SIZE}");
        for (key, value) in [
            ("id", self.id),
            ("enterprise_project_id", self.enterprise_project_id),
            ("marker", marker),
        ] {
            if let Some(value) = value {
                query.push_str(&format!("&{key}={}", urlencoding::encode(value)));
            }
        }
        query
    }
}

pub async fn create(client: &ServiceClient, opts: &CreateOpts<'_>) -> Result<Vpc, ApiError> {
    let response: VpcResponse = client
        .post(&client.url("vpcs"), &VpcRequest { vpc: opts })
        .await?;
    Ok(response.vpc)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<Vpc, ApiError> {
    let response: VpcResponse = client.get(&client.url(&format!("vpcs/{id}"))).await?;
    Ok(response.vpc)
}

pub async fn update(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateOpts<'_>,
) -> Result<Vpc, ApiError> {
    let response: VpcResponse = client
        .put(&client.url(&format!("vpcs/{id}")), &VpcRequest { vpc: opts })
        .await?;
    Ok(response.vpc)
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<(), ApiError> {
    client.delete(&client.url(&format!("vpcs/{id}"))).await
}

/// Every VPC matching the server side filters, following the `marker` pagination
pub async fn list(client: &ServiceClient, opts: &ListOpts<'_>) -> Result<Vec<Vpc>, ApiError> {
    let mut vpcs = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let url = client.url(&format!("vpcs?{}", opts.query(marker.as_deref())));
        let page: VpcList = client.get(&url).await?;
        let count = page.vpcs.len();
        marker = page.vpcs.last().map(|vpc| vpc.id.clone());
        vpcs.extend(page.vpcs);
        if count < PAGE_SIZE || marker.is_none() {
            return Ok(vpcs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query() {
        let opts = ListOpts {
            enterprise_project_id: Some("0"),
            ..Default::default()
        };
        assert_eq!(opts.query(None), "limit=100&enterprise_project_id=0");
        assert_eq!(
            opts.query(Some("a b")),
            "limit=100&enterprise_project_id=0&marker=a%20b"
        );
    }

    #[test]
    fn create_body() {
        let opts = CreateOpts {
            name: "demo",
            cidr: "192.168.0.0/16",
            ..Default::default()
        };
        let body = serde_json::to_value(VpcRequest { vpc: &opts }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"vpc": {"name": "demo", "cidr": "192.168.0.0/16"}})
        );
    }

    #[test]
    fn decode_vpc() {
        let response: VpcResponse = serde_json::from_str(
            r#"{"vpc":{"id":"v1","name":"demo","cidr":"10.0.0.0/8","status":"OK","routes":[]}}"#,
        )
        .unwrap();
        assert_eq!(response.vpc.status, "OK");
        assert_eq!(response.vpc.description, "");
    }
}
