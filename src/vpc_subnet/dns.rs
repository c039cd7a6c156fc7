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

/// Used when the region has no known private DNS servers
pub const PUBLIC_DNS: &[&str] = &["8.8.8.8", "114.114.114.114"];

/// Private DNS servers of a region
///
/// The table is static: a region missing from it gets [`PUBLIC_DNS`] in new subnets,
/// the nameservers of the DNS service are never queried.
pub fn private_dns(region: &str) -> Option<&'static [&'static str]> {
    let servers: &'static [&'static str] = match region {
        "cn-north-1" => &["100.125.1.250", "100.125.21.250"],
        "cn-north-4" => &["100.125.1.250", "100.125.129.250"],
        "cn-north-9" => &["100.125.1.250", "100.125.107.250"],
        "cn-east-2" => &["100.125.17.29", "100.125.135.29"],
        "cn-east-3" => &["100.125.1.250", "100.125.64.250"],
        "cn-south-1" => &["100.125.1.250", "100.125.136.29"],
        "cn-south-4" => &["100.125.0.167"],
        "cn-southwest-2" => &["100.125.1.250", "100.125.129.250"],
        "ap-southeast-1" => &["100.125.1.250", "100.125.3.250"],
        "ap-southeast-2" => &["100.125.1.250", "100.125.1.251"],
        "ap-southeast-3" => &["100.125.1.250", "100.125.128.250"],
        "af-south-1" => &["100.125.1.250", "100.125.1.14"],
        "tr-west-1" => &["100.125.2.250", "100.125.2.251"],
        "sa-brazil-1" | "na-mexico-1" => &["100.125.1.22", "100.125.1.90"],
        "la-north-2" => &["100.125.1.250", "100.125.1.242"],
        "la-south-2" | "sa-chile-1" => &["100.125.1.250", "100.125.0.250"],
        _ => return None,
    };
    Some(servers)
}

/// DNS list of a new subnet
///
/// An explicit list wins; when only `primary_dns` is set the API picks the list,
/// otherwise the private servers of the region or the public ones are used.
pub fn subnet_dns_list(
    dns_list: Option<Vec<String>>,
    has_primary_dns: bool,
    region: &str,
) -> Option<Vec<String>> {
    if let Some(dns_list) = dns_list.filter(|list| !list.is_empty()) {
        return Some(dns_list);
    }
    if has_primary_dns {
        return None;
    }
    let servers = private_dns(region).unwrap_or(PUBLIC_DNS);
    Some(servers.iter().map(|s| s.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dns_resolution_order() {
        assert_eq!(
            subnet_dns_list(Some(vec!["1.1.1.1".to_string()]), true, "cn-north-4"),
            Some(vec!["1.1.1.1".to_string()])
        );
        assert_eq!(subnet_dns_list(None, true, "cn-north-4"), None);
        assert_eq!(
            subnet_dns_list(Some(Vec::new()), false, "cn-north-4"),
            Some(vec!["100.125.1.250".to_string(), "100.125.129.250".to_string()])
        );
        assert_eq!(
            subnet_dns_list(None, false, "xx-unknown-1"),
            Some(vec!["8.8.8.8".to_string(), "114.114.114.114".to_string()])
        );
    }

    #[test]
    fn shared_entries() {
        assert_eq!(private_dns("sa-chile-1"), private_dns("la-south-2"));
        assert_eq!(private_dns("cn-south-4"), Some(&["100.125.0.167"][..]));
    }
}
