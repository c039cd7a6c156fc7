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

//! Subnet v1 API

use serde::{Deserialize, Serialize};

use crate::client::{nullable, ApiError, ServiceClient};

pub const PAGE_SIZE: usize = 100;

pub const OPT_ADDRESS_TIME: &str = "addresstime";
pub const OPT_NTP: &str = "ntp";
pub const OPT_DOMAIN_NAME: &str = "domainname";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraDhcpOpt {
    pub opt_name: String,
    /// `null` clears the option
    #[serde(default)]
    pub opt_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub cidr: String,
    pub gateway_ip: String,
    pub vpc_id: String,
    #[serde(deserialize_with = "nullable")]
    pub availability_zone: String,
    pub status: String,
    pub ipv6_enable: bool,
    pub dhcp_enable: bool,
    #[serde(deserialize_with = "nullable")]
    pub primary_dns: String,
    #[serde(deserialize_with = "nullable")]
    pub secondary_dns: String,
    #[serde(rename = "dnsList", deserialize_with = "nullable")]
    pub dns_list: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub neutron_subnet_id: String,
    #[serde(deserialize_with = "nullable")]
    pub neutron_subnet_id_v6: String,
    #[serde(deserialize_with = "nullable")]
    pub cidr_v6: String,
    #[serde(deserialize_with = "nullable")]
    pub gateway_ip_v6: String,
    #[serde(deserialize_with = "nullable")]
    pub extra_dhcp_opts: Vec<ExtraDhcpOpt>,
}

impl Subnet {
    /// Value of an extra DHCP option
    pub fn dhcp_opt(&self, name: &str) -> Option<&str> {
        self.extra_dhcp_opts
            .iter()
            .find(|opt| opt.opt_name == name)
            .and_then(|opt| opt.opt_value.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct SubnetResponse {
    subnet: Subnet,
}

#[derive(Debug, Deserialize)]
struct SubnetList {
    #[serde(default)]
    subnets: Vec<Subnet>,
}

#[derive(Debug, Serialize)]
struct SubnetRequest<T> {
    subnet: T,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateOpts<'a> {
    pub name: &'a str,
    pub cidr: &'a str,
    pub gateway_ip: &'a str,
    pub vpc_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<&'a str>,
    pub ipv6_enable: bool,
    pub dhcp_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dns: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dns: Option<&'a str>,
    #[serde(rename = "dnsList", skip_serializing_if = "Option::is_none")]
    pub dns_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_dhcp_opts: Vec<ExtraDhcpOpt>,
}

/// `name` and `dhcp_enable` are always sent, the other fields only when they changed
#[derive(Debug, Default, Serialize)]
pub struct UpdateOpts<'a> {
    pub name: &'a str,
    pub dhcp_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_dns: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_dns: Option<&'a str>,
    #[serde(rename = "dnsList", skip_serializing_if = "Option::is_none")]
    pub dns_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_dhcp_opts: Option<Vec<ExtraDhcpOpt>>,
}

pub async fn create(client: &ServiceClient, opts: &CreateOpts<'_>) -> Result<Subnet, ApiError> {
    let response: SubnetResponse = client
        .post(&client.url("subnets"), &SubnetRequest { subnet: opts })
        .await?;
    Ok(response.subnet)
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<Subnet, ApiError> {
    let response: SubnetResponse = client.get(&client.url(&format!("subnets/{id}"))).await?;
    Ok(response.subnet)
}

pub async fn update(
    client: &ServiceClient,
    vpc_id: &str,
    id: &str,
    opts: &UpdateOpts<'_>,
) -> Result<(), ApiError> {
    let url = client.url(&format!("vpcs/{vpc_id}/subnets/{id}"));
    let _: serde_json::Value = client.put(&url, &SubnetRequest { subnet: opts }).await?;
    Ok(())
}

pub async fn delete(client: &ServiceClient, vpc_id: &str, id: &str) -> Result<(), ApiError> {
    client
        .delete(&client.url(&format!("vpcs/{vpc_id}/subnets/{id}")))
        .await
}

/// Every subnet, optionally restricted to a VPC, following the `marker` pagination
pub async fn list(client: &ServiceClient, vpc_id: Option<&str>) -> Result<Vec<Subnet>, ApiError> {
    let mut subnets = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let mut query = format!("limit={PAGE_SIZE}");
        if let Some(vpc_id) = vpc_id {
            query.push_str(&format!("&vpc_id={}", urlencoding::encode(vpc_id)));
        }
        if let Some(marker) = &marker {
            query.push_str(&format!("&marker={}", urlencoding::encode(marker)));
        }

        let page: SubnetList = client.get(&client.url(&format!("subnets?{query}"))).await?;
        let count = page.subnets.len();
        marker = page.subnets.last().map(|subnet| subnet.id.clone());
        subnets.extend(page.subnets);
        if count < PAGE_SIZE || marker.is_none() {
            return Ok(subnets);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_subnet() {
        let response: SubnetResponse = serde_json::from_value(json!({
            "subnet": {
                "id": "s1",
                "name": "demo",
                "cidr": "192.168.0.0/24",
                "gateway_ip": "192.168.0.1",
                "vpc_id": "v1",
                "status": "ACTIVE",
                "dhcp_enable": true,
                "primary_dns": null,
                "dnsList": ["100.125.1.250"],
                "neutron_subnet_id": "n1",
                "extra_dhcp_opts": [
                    {"opt_name": "addresstime", "opt_value": "24h"},
                    {"opt_name": "ntp", "opt_value": null}
                ]
            }
        }))
        .unwrap();
        let subnet = response.subnet;
        assert_eq!(subnet.primary_dns, "");
        assert_eq!(subnet.dns_list, ["100.125.1.250"]);
        assert_eq!(subnet.dhcp_opt(OPT_ADDRESS_TIME), Some("24h"));
        assert_eq!(subnet.dhcp_opt(OPT_NTP), None);
        assert_eq!(subnet.dhcp_opt(OPT_DOMAIN_NAME), None);
    }

    #[test]
    fn update_body_clears_options() {
        let opts = UpdateOpts {
            name: "demo",
            dhcp_enable: true,
            extra_dhcp_opts: Some(vec![ExtraDhcpOpt {
                opt_name: OPT_NTP.to_string(),
                opt_value: None,
            }]),
            ..Default::default()
        };
        let body = serde_json::to_value(SubnetRequest { subnet: &opts }).unwrap();
        assert_eq!(
            body,
            json!({"subnet": {
                "name": "demo",
                "dhcp_enable": true,
                "extra_dhcp_opts": [{"opt_name": "ntp", "opt_value": null}]
            }})
        );
    }
}
