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

//! Elastic Cloud Server v1 API, with the job API its asynchronous operations report to

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{nullable, ApiError, ServiceClient};
use crate::tags::Tag;
use crate::wait::{Refreshed, StateChangeConf, WaitError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AttachedVolume {
    pub id: String,
    #[serde(rename = "bootIndex", deserialize_with = "nullable")]
    pub boot_index: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Fault {
    pub code: i64,
    #[serde(deserialize_with = "nullable")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: String,
    pub flavor: IdRef,
    pub image: IdRef,
    #[serde(deserialize_with = "nullable")]
    pub key_name: String,
    #[serde(rename = "OS-EXT-AZ:availability_zone")]
    pub availability_zone: String,
    #[serde(deserialize_with = "nullable")]
    pub enterprise_project_id: String,
    #[serde(deserialize_with = "nullable")]
    pub security_groups: Vec<IdRef>,
    #[serde(
        rename = "os-extended-volumes:volumes_attached",
        deserialize_with = "nullable"
    )]
    pub volumes_attached: Vec<AttachedVolume>,
    #[serde(deserialize_with = "nullable")]
    pub fault: Fault,
}

impl Server {
    /// Volume the server boots from
    pub fn system_disk(&self) -> Option<&str> {
        self.volumes_attached
            .iter()
            .find(|volume| volume.boot_index == "0")
            .map(|volume| volume.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FixedIp {
    pub subnet_id: String,
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Interface {
    pub port_id: String,
    pub net_id: String,
    pub mac_addr: String,
    pub port_state: String,
    #[serde(deserialize_with = "nullable")]
    pub fixed_ips: Vec<FixedIp>,
}

impl Interface {
    pub fn ipv4(&self) -> Option<&str> {
        self.fixed_ips
            .iter()
            .map(|ip| ip.ip_address.as_str())
            .find(|ip| ip.parse::<std::net::Ipv4Addr>().is_ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Volume {
    pub id: String,
    pub size: i64,
    pub volume_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SubJobEntities {
    server_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SubJob {
    entities: SubJobEntities,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct JobEntities {
    #[serde(deserialize_with = "nullable")]
    sub_jobs: Vec<SubJob>,
    server_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Job {
    pub job_id: String,
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub fail_reason: String,
    #[serde(deserialize_with = "nullable")]
    pub error_code: String,
    entities: JobEntities,
}

impl Job {
    /// Server the job operated on
    pub fn server_id(&self) -> Option<&str> {
        self.entities
            .sub_jobs
            .iter()
            .map(|job| job.entities.server_id.as_str())
            .chain(std::iter::once(self.entities.server_id.as_str()))
            .find(|id| !id.is_empty())
    }
}

/// Response of the operations that start a job
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobResponse {
    pub job_id: String,
    #[serde(rename = "serverIds", deserialize_with = "nullable")]
    pub server_ids: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct Nic<'a> {
    pub subnet_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct SecurityGroupRef<'a> {
    pub id: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct RootVolume<'a> {
    pub volumetype: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
pub struct ExtendParam<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_project_id: Option<&'a str>,
}

#[derive(Debug, Default, Serialize)]
pub struct CreateOpts<'a> {
    pub name: &'a str,
    #[serde(rename = "imageRef")]
    pub image_ref: &'a str,
    #[serde(rename = "flavorRef")]
    pub flavor_ref: &'a str,
    pub vpcid: &'a str,
    pub nics: Vec<Nic<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<SecurityGroupRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<&'a str>,
    pub root_volume: RootVolume<'a>,
    #[serde(rename = "adminPass", skip_serializing_if = "Option::is_none")]
    pub admin_pass: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(rename = "extendparam")]
    pub extend_param: ExtendParam<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub server_tags: Vec<Tag>,
}

/// Operation of `cloudservers/action`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop { hard: bool },
    Reboot { hard: bool },
}

impl PowerAction {
    /// Parse the `power_action` attribute: `ON`, `OFF`, `REBOOT`, optionally prefixed with `FORCE-`
    pub fn parse(action: &str) -> Option<Self> {
        let (hard, action) = match action.strip_prefix("FORCE-") {
            Some(action) => (true, action),
            None => (false, action),
        };
        match (action, hard) {
            ("ON", false) => Some(Self::Start),
            ("OFF", hard) => Some(Self::Stop { hard }),
            ("REBOOT", hard) => Some(Self::Reboot { hard }),
            _ => None,
        }
    }

    /// Server status once the action completed
    pub fn target_status(self) -> &'static str {
        match self {
            Self::Stop { .. } => "SHUTOFF",
            Self::Start | Self::Reboot { .. } => "ACTIVE",
        }
    }

    fn body(self, id: &str) -> serde_json::Value {
        let servers = json!([{ "id": id }]);
        let kind = |hard: bool| if hard { "HARD" } else { "SOFT" };
        match self {
            Self::Start => json!({ "os-start": { "servers": servers } }),
            Self::Stop { hard } => json!({ "os-stop": { "type": kind(hard), "servers": servers } }),
            Self::Reboot { hard } => json!({ "reboot": { "type": kind(hard), "servers": servers } }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ServerRequest<T> {
    server: T,
}

fn server_url(client: &ServiceClient, id: &str) -> String {
    client.url(&format!("cloudservers/{id}"))
}

pub async fn create(client: &ServiceClient, opts: &CreateOpts<'_>) -> Result<JobResponse, ApiError> {
    client
        .post(&client.url("cloudservers"), &ServerRequest { server: opts })
        .await
}

pub async fn get(client: &ServiceClient, id: &str) -> Result<Server, ApiError> {
    #[derive(Deserialize)]
    struct Response {
        server: Server,
    }
    let response: Response = client.get(&server_url(client, id)).await?;
    Ok(response.server)
}

pub async fn interfaces(client: &ServiceClient, id: &str) -> Result<Vec<Interface>, ApiError> {
    #[derive(Deserialize)]
    struct Response {
        #[serde(rename = "interfaceAttachments", default, deserialize_with = "nullable")]
        interfaces: Vec<Interface>,
    }
    let url = client.url(&format!("cloudservers/{id}/os-interface"));
    let response: Response = client.get(&url).await?;
    Ok(response.interfaces)
}

pub async fn update_name(client: &ServiceClient, id: &str, name: &str) -> Result<(), ApiError> {
    let body = ServerRequest {
        server: json!({ "name": name }),
    };
    client.send(Method::PUT, &server_url(client, id), Some(&body)).await
}

pub async fn reset_password(client: &ServiceClient, id: &str, password: &str) -> Result<(), ApiError> {
    let body = json!({ "reset-password": { "new_password": password } });
    let url = client.url(&format!("cloudservers/{id}/os-reset-password"));
    client.send(Method::PUT, &url, Some(&body)).await
}

pub async fn resize(client: &ServiceClient, id: &str, flavor_id: &str) -> Result<JobResponse, ApiError> {
    let body = json!({ "resize": { "flavorRef": flavor_id, "mode": "withStopServer" } });
    client
        .post(&client.url(&format!("cloudservers/{id}/resize")), &body)
        .await
}

pub async fn power(client: &ServiceClient, id: &str, action: PowerAction) -> Result<JobResponse, ApiError> {
    client
        .post(&client.url("cloudservers/action"), &action.body(id))
        .await
}

pub async fn delete(
    client: &ServiceClient,
    id: &str,
    delete_volume: bool,
) -> Result<JobResponse, ApiError> {
    let body = json!({
        "servers": [{ "id": id }],
        "delete_volume": delete_volume,
        "delete_publicip": false,
    });
    client
        .post(&client.url("cloudservers/delete"), &body)
        .await
}

pub fn tags_url(client: &ServiceClient, id: &str) -> String {
    client.url(&format!("cloudservers/{id}/tags"))
}

/// Add a security group through the compute v2.1 API
pub async fn add_security_group(client: &ServiceClient, id: &str, group: &str) -> Result<(), ApiError> {
    let body = json!({ "addSecurityGroup": { "name": group } });
    let url = client.url(&format!("servers/{id}/action"));
    client.send(Method::POST, &url, Some(&body)).await
}

/// Remove a security group through the compute v2.1 API
pub async fn remove_security_group(
    client: &ServiceClient,
    id: &str,
    group: &str,
) -> Result<(), ApiError> {
    let body = json!({ "removeSecurityGroup": { "name": group } });
    let url = client.url(&format!("servers/{id}/action"));
    client.send(Method::POST, &url, Some(&body)).await
}

/// Volume from the EVS v2 API
pub async fn get_volume(client: &ServiceClient, id: &str) -> Result<Volume, ApiError> {
    #[derive(Deserialize)]
    struct Response {
        volume: Volume,
    }
    let response: Response = client
        .get(&client.url(&format!("cloudvolumes/{id}")))
        .await?;
    Ok(response.volume)
}

pub async fn get_job(client: &ServiceClient, job_id: &str) -> Result<Job, ApiError> {
    client.get(&client.url(&format!("jobs/{job_id}"))).await
}

/// State of a job for the poller, a failed job is an error carrying its failure reason
fn job_state(job: Job) -> Result<Refreshed<Job>, WaitError> {
    if job.status == "FAIL" {
        return Err(WaitError::Failed(format!(
            "job {} failed: {} ({})",
            job.job_id, job.fail_reason, job.error_code
        )));
    }
    let status = job.status.clone();
    Ok(Some((job, status)))
}

/// Wait for a job to succeed
pub async fn wait_for_job(
    client: &ServiceClient,
    job_id: &str,
    timeout: Duration,
) -> Result<Job, WaitError> {
    let job = StateChangeConf::new(&["INIT", "RUNNING"], &["SUCCESS"], timeout)
        .delay(Duration::from_secs(10))
        .min_timeout(Duration::from_secs(5))
        .wait_for_state(move || async move { job_state(get_job(client, job_id).await?) })
        .await?;
    job.ok_or(WaitError::NotFound { retries: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_actions() {
        assert_eq!(PowerAction::parse("ON"), Some(PowerAction::Start));
        assert_eq!(
            PowerAction::parse("FORCE-OFF"),
            Some(PowerAction::Stop { hard: true })
        );
        assert_eq!(
            PowerAction::parse("REBOOT"),
            Some(PowerAction::Reboot { hard: false })
        );
        assert_eq!(PowerAction::parse("FORCE-ON"), None);
        assert_eq!(PowerAction::parse("off"), None);

        assert_eq!(
            PowerAction::Stop { hard: true }.body("s1"),
            json!({"os-stop": {"type": "HARD", "servers": [{"id": "s1"}]}})
        );
        assert_eq!(
            PowerAction::Start.body("s1"),
            json!({"os-start": {"servers": [{"id": "s1"}]}})
        );
        assert_eq!(PowerAction::Reboot { hard: false }.target_status(), "ACTIVE");
    }

    #[test]
    fn job_server_id() {
        let job: Job = serde_json::from_value(json!({
            "job_id": "j1",
            "status": "SUCCESS",
            "fail_reason": null,
            "entities": {"sub_jobs": [{"status": "SUCCESS", "entities": {"server_id": "s1"}}]}
        }))
        .unwrap();
        assert_eq!(job.server_id(), Some("s1"));

        let job: Job = serde_json::from_value(json!({
            "job_id": "j2",
            "status": "SUCCESS",
            "entities": {"server_id": "s2"}
        }))
        .unwrap();
        assert_eq!(job.server_id(), Some("s2"));

        let job: Job = serde_json::from_value(json!({"status": "RUNNING"})).unwrap();
        assert_eq!(job.server_id(), None);
    }

    #[test]
    fn failed_job() {
        let job: Job = serde_json::from_value(json!({
            "job_id": "j3",
            "status": "FAIL",
            "fail_reason": "Insufficient capacity",
            "error_code": "Ecs.0000"
        }))
        .unwrap();
        let err = job_state(job).unwrap_err();
        assert!(matches!(err, WaitError::Failed(_)));
        assert_eq!(
            err.to_string(),
            "job j3 failed: Insufficient capacity (Ecs.0000)"
        );

        let job: Job = serde_json::from_value(json!({"job_id": "j4", "status": "RUNNING"})).unwrap();
        let (job, state) = job_state(job).unwrap().unwrap();
        assert_eq!(job.job_id, "j4");
        assert_eq!(state, "RUNNING");
    }

    #[test]
    fn server_fields() {
        let server: Server = serde_json::from_value(json!({
            "id": "s1",
            "name": "web",
            "status": "ACTIVE",
            "flavor": {"id": "s6.small.1", "name": "s6.small.1"},
            "image": {"id": "i1"},
            "key_name": null,
            "OS-EXT-AZ:availability_zone": "cn-north-4a",
            "security_groups": [{"id": "sg1", "name": "default"}],
            "os-extended-volumes:volumes_attached": [
                {"id": "v2", "bootIndex": null},
                {"id": "v1", "bootIndex": "0"}
            ]
        }))
        .unwrap();
        assert_eq!(server.flavor.id, "s6.small.1");
        assert_eq!(server.availability_zone, "cn-north-4a");
        assert_eq!(server.key_name, "");
        assert_eq!(server.system_disk(), Some("v1"));
    }

    #[test]
    fn create_body() {
        let opts = CreateOpts {
            name: "web",
            image_ref: "i1",
            flavor_ref: "f1",
            vpcid: "v1",
            nics: vec![Nic {
                subnet_id: "n1",
                ip_address: None,
            }],
            root_volume: RootVolume {
                volumetype: "GPSSD",
                size: Some(40),
            },
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&opts).unwrap(),
            json!({
                "name": "web",
                "imageRef": "i1",
                "flavorRef": "f1",
                "vpcid": "v1",
                "nics": [{"subnet_id": "n1"}],
                "root_volume": {"volumetype": "GPSSD", "size": 40},
                "extendparam": {}
            })
        );
    }

    #[test]
    fn interface_addresses() {
        let interface: Interface = serde_json::from_value(json!({
            "port_id": "p1",
            "net_id": "n1",
            "mac_addr": "fa:16:3e:00:00:01",
            "fixed_ips": [
                {"subnet_id": "x", "ip_address": "2001:db8::1"},
                {"subnet_id": "y", "ip_address": "192.168.0.10"}
            ]
        }))
        .unwrap();
        assert_eq!(interface.ipv4(), Some("192.168.0.10"));
    }
}
