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

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_EUROPE_CLOUD: &str = "myhuaweicloud.eu";
pub const EUROPE_REGION_PREFIX: &str = "eu-west-1";

/// How to reach a service, and how its resource URLs are built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceCatalog {
    /// Host prefix of the endpoint
    pub name: &'static str,
    /// Version segment of the resource base
    pub version: &'static str,
    /// The resource base does not embed the project id
    pub without_project_id: bool,
    /// The service is not regional
    pub global: bool,
    /// Requests are scoped to the account (domain) instead of a project
    pub admin: bool,
}

const fn regional(name: &'static str, version: &'static str) -> ServiceCatalog {
    ServiceCatalog {
        name,
        version,
        without_project_id: false,
        global: false,
        admin: false,
    }
}

lazy_static! {
    pub static ref SERVICE_CATALOG: HashMap<&'static str, ServiceCatalog> = HashMap::from([
        ("vpc", regional("vpc", "v1")),
        (
            "networkv2",
            ServiceCatalog {
                without_project_id: true,
                ..regional("vpc", "v2.0")
            }
        ),
        ("vpcv3", regional("vpc", "v3")),
        ("nat", regional("nat", "v2")),
        ("ecs", regional("ecs", "v1")),
        ("ecsv21", regional("ecs", "v2.1")),
        ("evs", regional("evs", "v2")),
        (
            "iam",
            ServiceCatalog {
                without_project_id: true,
                global: true,
                admin: true,
                ..regional("iam", "v3.0")
            }
        ),
        (
            "identity",
            ServiceCatalog {
                without_project_id: true,
                global: true,
                admin: true,
                ..regional("iam", "v3")
            }
        ),
    ]);
}

/// A custom endpoint for a service also applies to the catalog entries derived from it
fn derived_services(service: &str) -> &'static [&'static str] {
    match service {
        "vpc" => &["networkv2", "vpcv3"],
        "iam" => &["identity"],
        "ecs" => &["ecsv21"],
        _ => &[],
    }
}

pub fn catalog(service: &str) -> Result<&'static ServiceCatalog> {
    SERVICE_CATALOG
        .get(service)
        .ok_or_else(|| anyhow!("service type {service} is invalid or not supported"))
}

pub fn is_europe_region(region: &str) -> bool {
    region.starts_with(EUROPE_REGION_PREFIX)
}

/// Cloud domain used to build endpoints
pub fn cloud_domain(cloud: Option<&str>, region: &str) -> String {
    match cloud {
        Some(cloud) if !cloud.is_empty() => cloud.to_string(),
        _ if is_europe_region(region) => DEFAULT_EUROPE_CLOUD.to_string(),
        _ => DEFAULT_CLOUD.to_string(),
    }
}

/// Normalize a user supplied endpoint: scheme prefix and trailing slash
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(anyhow!("endpoint can not be empty"));
    }

    let mut endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }
    Ok(endpoint)
}

/// Normalize the `endpoints` provider attribute and propagate it to derived services
pub fn custom_endpoints<'a, I>(endpoints: I) -> Result<HashMap<String, String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut result = HashMap::new();
    let mut derived = Vec::new();
    for (service, endpoint) in endpoints {
        let endpoint = normalize_endpoint(endpoint)
            .map_err(|err| anyhow!("the value of customizing endpoint {service}: {err}"))?;
        derived.extend(
            derived_services(service)
                .iter()
                .map(|s| (s.to_string(), endpoint.clone())),
        );
        result.insert(service.to_string(), endpoint);
    }
    // Explicit entries win over derived ones
    for (service, endpoint) in derived {
        result.entry(service).or_insert(endpoint);
    }
    Ok(result)
}

/// Endpoint of a service in a region
pub fn service_endpoint(
    catalog: &ServiceCatalog,
    custom: Option<&str>,
    region: &str,
    cloud: &str,
    force_regional: bool,
) -> String {
    if let Some(endpoint) = custom {
        return endpoint.to_string();
    }
    if catalog.global && !force_regional && !is_europe_region(region) {
        format!("https://{}.{cloud}/", catalog.name)
    } else {
        format!("https://{}.{region}.{cloud}/", catalog.name)
    }
}

/// Base of every resource URL for a service
pub fn resource_base(catalog: &ServiceCatalog, endpoint: &str, project_id: Option<&str>) -> String {
    let mut base = endpoint.to_string();
    if !catalog.version.is_empty() {
        base.push_str(catalog.version);
        base.push('/');
    }
    if let (false, Some(project_id)) = (catalog.without_project_id, project_id) {
        base.push_str(project_id);
        base.push('/');
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        assert_eq!(cloud_domain(None, "cn-north-4"), "myhuaweicloud.com");
        assert_eq!(cloud_domain(Some(""), "eu-west-101"), "myhuaweicloud.eu");
        assert_eq!(
            cloud_domain(Some("myhuaweicloud.com"), "eu-west-101"),
            "myhuaweicloud.com"
        );
        assert_eq!(
            cloud_domain(Some("example.cloud"), "eu-west-101"),
            "example.cloud"
        );
    }

    #[test]
    fn normalize() {
        assert_eq!(
            normalize_endpoint(" vpc.example.com ").unwrap(),
            "https://vpc.example.com/"
        );
        assert_eq!(
            normalize_endpoint("http://127.0.0.1:8080/").unwrap(),
            "http://127.0.0.1:8080/"
        );
        assert!(normalize_endpoint("  ").is_err());
    }

    #[test]
    fn derived_endpoints() {
        let endpoints = custom_endpoints([("vpc", "vpc.local"), ("vpcv3", "https://v3.local")])
            .unwrap();
        assert_eq!(endpoints["vpc"], "https://vpc.local/");
        assert_eq!(endpoints["networkv2"], "https://vpc.local/");
        assert_eq!(endpoints["vpcv3"], "https://v3.local/");

        let endpoints = custom_endpoints([("iam", "iam.local")]).unwrap();
        assert_eq!(endpoints["identity"], "https://iam.local/");

        assert!(custom_endpoints([("ecs", "")]).is_err());
    }

    #[test]
    fn regional_endpoints() {
        let vpc = catalog("vpc").unwrap();
        let endpoint = service_endpoint(vpc, None, "cn-north-4", DEFAULT_CLOUD, false);
        assert_eq!(endpoint, "https://vpc.cn-north-4.myhuaweicloud.com/");
        assert_eq!(
            resource_base(vpc, &endpoint, Some("p1")),
            "https://vpc.cn-north-4.myhuaweicloud.com/v1/p1/"
        );

        let v2 = catalog("networkv2").unwrap();
        assert_eq!(
            resource_base(v2, &endpoint, Some("p1")),
            "https://vpc.cn-north-4.myhuaweicloud.com/v2.0/"
        );
    }

    #[test]
    fn global_endpoints() {
        let iam = catalog("identity").unwrap();
        assert_eq!(
            service_endpoint(iam, None, "cn-north-4", DEFAULT_CLOUD, false),
            "https://iam.myhuaweicloud.com/"
        );
        assert_eq!(
            service_endpoint(iam, None, "cn-north-4", DEFAULT_CLOUD, true),
            "https://iam.cn-north-4.myhuaweicloud.com/"
        );
        assert_eq!(
            service_endpoint(iam, None, "eu-west-101", DEFAULT_EUROPE_CLOUD, false),
            "https://iam.eu-west-101.myhuaweicloud.eu/"
        );
        assert_eq!(
            service_endpoint(iam, Some("https://iam.local/"), "cn-north-4", DEFAULT_CLOUD, false),
            "https://iam.local/"
        );
    }

    #[test]
    fn unknown_service() {
        assert!(catalog("nope").is_err());
    }
}
