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

//! NAT gateway v2 API

use serde::{Deserialize, Serialize};

use crate::client::{nullable, ApiError, ServiceClient};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NatGateway {
    pub id: String,
    pub name: String,
    pub spec: String,
    #[serde(rename = "router_id")]
    pub vpc_id: String,
    #[serde(rename = "internal_network_id")]
    pub subnet_id: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub enterprise_project_id: String,
}

#[derive(Debug, Deserialize)]
struct NatGatewayResponse {
    nat_gateway: NatGateway,
}

#[derive(Debug, Serialize)]
struct NatGatewayRequest<T> {
    nat_gateway: T,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateOpts<'a> {
    pub name: &'a str,
    pub spec: &'a str,
    #[serde(rename = "router_id")]
    pub vpc_id: &'a str,
    #[serde(rename = "internal_network_id")]
    pub subnet_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct UpdateOpts<'a> {
    pub name: &'a str,
    pub spec: &'a str,
    pub description: &'a str,
}

fn gateway_url(client: &ServiceClient, id: &str) -> String {
    client.url(&format!("nat_gateways/{id}"))
}

pub async fn create(client: &ServiceClient, opts: &CreateOpts<'_>) -> Result<NatGateway, ApiError> {
    let response: NatGatewayResponse = client
        .post(
            &client.url("nat_gateways"),
            &NatGatewayRequest { nat_gateway: opts },
        )
        .await?;
    Ok(response.nat_gateway)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<NatGateway, ApiError> {
    let response: NatGatewayResponse = client.get(&gateway_url(client, id)).await?;
    Ok(response.nat_gateway)
}

pub async fn update(
    client: &ServiceClient,
    id: &str,
    opts: &UpdateOpts<'_>,
) -> Result<NatGateway, ApiError> {
    let response: NatGatewayResponse = client
        .put(
            &gateway_url(client, id),
            &NatGatewayRequest { nat_gateway: opts },
        )
        .await?;
    Ok(response.nat_gateway)
}

pub async fn delete(client: &ServiceClient, id: &str) -> Result<(), ApiError> {
    client.delete(&gateway_url(client, id)).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_names() {
        let opts = CreateOpts {
            name: "nat",
            spec: "1",
            vpc_id: "v1",
            subnet_id: "s1",
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(NatGatewayRequest { nat_gateway: &opts }).unwrap(),
            json!({"nat_gateway": {
                "name": "nat",
                "spec": "1",
                "router_id": "v1",
                "internal_network_id": "s1"
            }})
        );

        let response: NatGatewayResponse = serde_json::from_value(json!({
            "nat_gateway": {
                "id": "n1",
                "name": "nat",
                "spec": "2",
                "router_id": "v1",
                "internal_network_id": "s1",
                "description": null,
                "status": "PENDING_CREATE",
                "admin_state_up": true
            }
        }))
        .unwrap();
        assert_eq!(response.nat_gateway.vpc_id, "v1");
        assert_eq!(response.nat_gateway.subnet_id, "s1");
        assert_eq!(response.nat_gateway.description, "");
    }
}
