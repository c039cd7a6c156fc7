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
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tf_provider::value::{Value, ValueString};
use tf_provider::Diagnostics;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::client::{
    password_token, Credentials, DomainRef, ProjectRef, Scope, ServiceClient, Signer,
};

pub mod endpoints;
pub mod shared;
mod state;

pub use state::ProviderConfig;

use endpoints::{catalog, cloud_domain, custom_endpoints, resource_base, service_endpoint};
use shared::SharedConfig;

pub const DEFAULT_MAX_RETRIES: i64 = 5;

/// How the provider authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Token(String),
    AkSk {
        access_key: String,
        secret_key: String,
        security_token: Option<String>,
    },
    Password {
        user_name: String,
        password: String,
    },
}

/// Provider configuration after environment and shared config resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub project_id: Option<String>,
    pub domain_id: Option<String>,
    pub domain_name: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub auth_url: Option<String>,
    pub cloud: Option<String>,
    pub regional: bool,
    pub endpoints: HashMap<String, String>,
    pub insecure: bool,
    pub max_retries: i64,
    pub enterprise_project_id: Option<String>,
    pub shared_config_file: Option<String>,
    pub profile: Option<String>,
}

impl Settings {
    /// Read the provider block, falling back to the environment for unset attributes
    pub fn resolve<F>(config: &ProviderConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |value: &ValueString, keys: &[&str]| -> Option<String> {
            match value {
                Value::Value(value) if !value.is_empty() => Some(value.to_string()),
                _ => keys
                    .iter()
                    .find_map(|key| env(key).filter(|value| !value.is_empty())),
            }
        };
        let flag = |value: &Value<bool>, keys: &[&str]| -> bool {
            match value {
                Value::Value(value) => *value,
                _ => keys
                    .iter()
                    .find_map(|key| env(key))
                    .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true"))
                    .unwrap_or(false),
            }
        };

        let max_retries = match config.max_retries {
            Value::Value(max_retries) => max_retries,
            _ => match env("HW_MAX_RETRIES") {
                Some(value) => value
                    .parse()
                    .with_context(|| format!("invalid HW_MAX_RETRIES: {value}"))?,
                None => DEFAULT_MAX_RETRIES,
            },
        };
        if max_retries < 0 {
            return Err(anyhow!("max_retries should be a positive value"));
        }

        let endpoints = custom_endpoints(
            config
                .endpoints
                .iter()
                .flatten()
                .filter_map(|(service, endpoint)| {
                    endpoint
                        .as_deref_option()
                        .map(|endpoint| (&**service, endpoint))
                }),
        )?;

        Ok(Settings {
            region: lookup(&config.region, &["HW_REGION_NAME", "OS_REGION_NAME"]),
            access_key: lookup(&config.access_key, &["HW_ACCESS_KEY", "OS_ACCESS_KEY"]),
            secret_key: lookup(&config.secret_key, &["HW_SECRET_KEY", "OS_SECRET_KEY"]),
            security_token: lookup(&config.security_token, &["HW_SECURITY_TOKEN"]),
            project_id: lookup(&config.project_id, &["HW_PROJECT_ID", "OS_PROJECT_ID"]),
            domain_id: lookup(&config.domain_id, &["HW_DOMAIN_ID", "OS_DOMAIN_ID"]),
            domain_name: lookup(&config.domain_name, &["HW_DOMAIN_NAME", "OS_DOMAIN_NAME"]),
            user_name: lookup(&config.user_name, &["HW_USER_NAME", "OS_USERNAME"]),
            password: lookup(&config.password, &["HW_USER_PASSWORD", "OS_PASSWORD"]),
            token: lookup(&config.token, &["HW_AUTH_TOKEN", "OS_AUTH_TOKEN"]),
            auth_url: lookup(&config.auth_url, &["HW_AUTH_URL", "OS_AUTH_URL"]),
            cloud: lookup(&config.cloud, &["HW_CLOUD"]),
            regional: flag(&config.regional, &[]),
            endpoints,
            insecure: flag(&config.insecure, &["HW_INSECURE", "OS_INSECURE"]),
            max_retries,
            enterprise_project_id: lookup(
                &config.enterprise_project_id,
                &["HW_ENTERPRISE_PROJECT_ID"],
            ),
            shared_config_file: lookup(&config.shared_config_file, &["HW_SHARED_CONFIG_FILE"]),
            profile: lookup(&config.profile, &["HW_PROFILE"]),
        })
    }

    /// Load credentials from the shared config file when a file or a profile is configured
    pub fn apply_shared_config(&mut self) -> Result<()> {
        if self.shared_config_file.is_none() && self.profile.is_none() {
            return Ok(());
        }

        let path = match &self.shared_config_file {
            Some(path) => shared::expand_home(path)?,
            None => shared::default_path()?,
        };
        let profile = SharedConfig::load(&path)?.profile(self.profile.as_deref())?;
        info!(path = %path.display(), "using credentials of the shared config file");

        self.access_key = Some(profile.access_key);
        self.secret_key = Some(profile.secret_key);
        self.security_token = profile.security_token;
        if profile.region.is_some() {
            self.region = profile.region;
        }
        if profile.domain_id.is_some() {
            self.domain_id = profile.domain_id;
        }
        if profile.project_id.is_some() {
            self.project_id = profile.project_id;
        }
        Ok(())
    }

    pub fn auth_method(&self) -> Result<AuthMethod> {
        if let Some(token) = &self.token {
            return Ok(AuthMethod::Token(token.clone()));
        }
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                return Ok(AuthMethod::AkSk {
                    access_key: access_key.clone(),
                    secret_key: secret_key.clone(),
                    security_token: self.security_token.clone(),
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(anyhow!(
                    "access_key and secret_key must be both set or both unset"
                ))
            }
            (None, None) => (),
        }
        if self.security_token.is_some() {
            return Err(anyhow!("security_token requires access_key and secret_key"));
        }
        match (&self.user_name, &self.password) {
            (Some(user_name), Some(password)) => Ok(AuthMethod::Password {
                user_name: user_name.clone(),
                password: password.clone(),
            }),
            (None, Some(_)) => Err(anyhow!("user_name must be set to use password authentication")),
            _ => Err(anyhow!(
                "Must config token or aksk or username password to be authorized"
            )),
        }
    }

    pub fn region(&self) -> Result<&str> {
        self.region
            .as_deref()
            .ok_or_else(|| anyhow!("region should be provided"))
    }

    /// Identity endpoint used for password authentication and project lookups
    pub fn identity_endpoint(&self) -> Result<String> {
        if let Some(auth_url) = &self.auth_url {
            return Ok(auth_url.trim_end_matches('/').to_string());
        }
        let region = self.region()?;
        let cloud = cloud_domain(self.cloud.as_deref(), region);
        Ok(format!("https://iam.{region}.{cloud}/v3"))
    }
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct Domain {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DomainList {
    domains: Vec<Domain>,
}

/// Shared configuration of the provider, available once the provider is configured
#[derive(Debug)]
pub struct Config {
    pub region: String,
    pub cloud: String,
    pub regional: bool,
    pub enterprise_project_id: Option<String>,
    pub domain_name: Option<String>,
    endpoints: HashMap<String, String>,
    identity_endpoint: String,
    credentials: Arc<Credentials>,
    http: reqwest::Client,
    max_retries: u32,
    projects: Mutex<HashMap<String, String>>,
    domain_id: Mutex<Option<String>>,
}

impl Config {
    pub async fn build(settings: Settings) -> Result<Self> {
        let region = settings.region()?.to_string();
        let cloud = cloud_domain(settings.cloud.as_deref(), &region);
        let identity_endpoint = settings.identity_endpoint()?;

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.insecure)
            .user_agent(concat!(
                "terraform-provider-huaweicloud/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("cannot build the HTTP client")?;

        let credentials = match settings.auth_method()? {
            AuthMethod::Token(token) => Credentials::Token(token),
            AuthMethod::AkSk {
                access_key,
                secret_key,
                security_token,
            } => Credentials::AkSk {
                signer: Signer::new(access_key, secret_key),
                security_token,
            },
            AuthMethod::Password {
                user_name,
                password,
            } => {
                let domain = match (&settings.domain_id, &settings.domain_name) {
                    (Some(id), _) => DomainRef::Id(id),
                    (None, Some(name)) => DomainRef::Name(name),
                    (None, None) => {
                        return Err(anyhow!(
                            "domain_name or domain_id is required for password authentication"
                        ))
                    }
                };
                let project = match &settings.project_id {
                    Some(id) => ProjectRef::Id(id),
                    None => ProjectRef::Name(&region),
                };
                let token = password_token(
                    &http,
                    &identity_endpoint,
                    &user_name,
                    &password,
                    domain,
                    project,
                )
                .await
                .context("password authentication failed")?;
                Credentials::Token(token)
            }
        };

        let mut projects = HashMap::new();
        if let Some(project_id) = &settings.project_id {
            projects.insert(region.clone(), project_id.clone());
        }

        Ok(Config {
            region,
            cloud,
            regional: settings.regional,
            enterprise_project_id: settings.enterprise_project_id,
            domain_name: settings.domain_name,
            endpoints: settings.endpoints,
            identity_endpoint,
            credentials: Arc::new(credentials),
            http,
            max_retries: u32::try_from(settings.max_retries).unwrap_or(u32::MAX),
            projects: Mutex::new(projects),
            domain_id: Mutex::new(settings.domain_id),
        })
    }

    /// Region of a resource, defaulting to the provider region
    pub fn region_of<'a>(&'a self, region: &'a ValueString<'_>) -> &'a str {
        match region.as_deref_option() {
            Some(region) if !region.is_empty() => region,
            _ => &self.region,
        }
    }

    /// Enterprise project of a resource, defaulting to the provider one
    pub fn enterprise_project_of<'a>(&'a self, eps: &'a ValueString<'_>) -> Option<&'a str> {
        match eps.as_deref_option() {
            Some(eps) if !eps.is_empty() => Some(eps),
            _ => self.enterprise_project_id.as_deref(),
        }
    }

    fn endpoint(&self, service: &str, region: &str) -> Result<(String, &'static endpoints::ServiceCatalog)> {
        let catalog = catalog(service)?;
        let endpoint = service_endpoint(
            catalog,
            self.endpoints.get(service).map(String::as_str),
            region,
            &self.cloud,
            self.regional,
        );
        Ok((endpoint, catalog))
    }

    /// Client for a service in a region
    pub async fn client(&self, service: &str, region: &str) -> Result<ServiceClient> {
        if region != self.region && !self.credentials.is_aksk() {
            return Err(anyhow!(
                "resources in region {region} can only be managed with AK/SK authentication"
            ));
        }

        let (endpoint, catalog) = self.endpoint(service, region)?;
        let (scope, base) = if catalog.admin {
            let domain_id = self.domain_id().await?;
            let base = resource_base(catalog, &endpoint, None);
            (Scope::Domain(domain_id), base)
        } else {
            let project_id = self.project_id(region).await?;
            let base = resource_base(catalog, &endpoint, Some(&project_id));
            (Scope::Project(project_id), base)
        };

        debug!(service, region, base = base.as_str(), "new service client");
        Ok(ServiceClient::new(
            self.http.clone(),
            self.credentials.clone(),
            scope,
            self.max_retries,
            endpoint,
            base,
            region.to_string(),
        ))
    }

    /// Client of the IAM endpoint used for authentication, without any scope
    fn identity_client(&self, region: &str) -> ServiceClient {
        let base = format!("{}/", self.identity_endpoint);
        ServiceClient::new(
            self.http.clone(),
            self.credentials.clone(),
            Scope::None,
            self.max_retries,
            base.clone(),
            base,
            region.to_string(),
        )
    }

    fn projects_url(&self, region: &str) -> String {
        format!(
            "{}/projects?name={}",
            self.identity_endpoint,
            urlencoding::encode(region)
        )
    }

    /// Project id of a region, looked up once through IAM
    pub async fn project_id(&self, region: &str) -> Result<String> {
        let mut projects = self.projects.lock().await;
        if let Some(project_id) = projects.get(region) {
            return Ok(project_id.clone());
        }

        let list: ProjectList = self
            .identity_client(region)
            .get(&self.projects_url(region))
            .await
            .with_context(|| format!("failed to get the project of region {region}"))?;
        let project = list
            .projects
            .into_iter()
            .find(|project| project.name == region)
            .ok_or_else(|| anyhow!("no project found for region {region}"))?;

        info!(region, project_id = project.id.as_str(), "resolved project");
        projects.insert(region.to_string(), project.id.clone());
        Ok(project.id)
    }

    /// Id of the account, looked up once through IAM
    pub async fn domain_id(&self) -> Result<String> {
        let mut domain_id = self.domain_id.lock().await;
        if let Some(domain_id) = domain_id.as_ref() {
            return Ok(domain_id.clone());
        }

        let client = self.identity_client(&self.region);
        let url = client.url("auth/domains");
        let list: DomainList = client
            .get(&url)
            .await
            .context("failed to get the domain id, consider setting domain_id")?;
        let domain = list
            .domains
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no domain found for the credentials"))?;
        if let Some(name) = &self.domain_name {
            if name != &domain.name {
                return Err(anyhow!(
                    "domain_name {name} does not match the domain of the credentials ({})",
                    domain.name
                ));
            }
        }

        info!(domain_id = domain.id.as_str(), "resolved domain");
        *domain_id = Some(domain.id.clone());
        Ok(domain.id)
    }
}

/// Handle shared by the provider and its resources, filled by `configure`
#[derive(Debug, Default, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Option<Arc<Config>>>>,
}

impl ConfigHandle {
    pub async fn set(&self, config: Config) {
        *self.inner.write().await = Some(Arc::new(config));
    }

    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Config>> {
        let config = self.inner.read().await.clone();
        if config.is_none() {
            diags.root_error(
                "Provider is not configured",
                "The HuaweiCloud provider must be configured before managing resources",
            );
        }
        config
    }
}
