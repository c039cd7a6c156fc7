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

//! Profiles of the `hcloud` CLI (`~/.hcloud/config.json`)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    pub mode: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub security_token: String,
    pub region: String,
    pub project_id: String,
    pub domain_id: String,
    pub sso_auth: SsoAuth,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SsoAuth {
    pub sts_token: StsToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StsToken {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub security_token: String,
}

/// Credentials and defaults extracted from a profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSettings {
    pub access_key: String,
    pub secret_key: String,
    pub security_token: Option<String>,
    pub region: Option<String>,
    pub project_id: Option<String>,
    pub domain_id: Option<String>,
}

/// Location of the shared config file when none is configured
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot find the home directory"))?;
    Ok(home.join(".hcloud").join("config.json"))
}

/// Expand a leading `~` in a path
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot find the home directory"))?;
            Ok(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Ok(PathBuf::from(path)),
    }
}

impl SharedConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!(
                "The specified shared config file {} does not exist",
                path.display()
            ));
        }
        let data = std::fs::read(path)
            .with_context(|| format!("Err reading from shared config file {}", path.display()))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Invalid shared config file {}", path.display()))
    }

    /// Settings of the named profile, or of the current one when no name is given
    pub fn profile(&self, name: Option<&str>) -> Result<ProfileSettings> {
        let name = name
            .filter(|n| !n.is_empty())
            .unwrap_or(self.current.as_str());
        let profile = self
            .profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow!("Error finding profile {name} from shared config file"))?;

        let (access_key, secret_key, security_token) = if profile.mode == "SSO" {
            let sts = &profile.sso_auth.sts_token;
            if sts == &StsToken::default() {
                return Err(anyhow!(
                    "Error finding ssoAuth.stsToken config when auth mode is SSO"
                ));
            }
            (&sts.access_key_id, &sts.secret_access_key, &sts.security_token)
        } else {
            (
                &profile.access_key_id,
                &profile.secret_access_key,
                &profile.security_token,
            )
        };

        let optional = |s: &String| (!s.is_empty()).then(|| s.clone());
        Ok(ProfileSettings {
            access_key: access_key.clone(),
            secret_key: secret_key.clone(),
            security_token: optional(security_token),
            region: optional(&profile.region),
            project_id: optional(&profile.project_id),
            domain_id: optional(&profile.domain_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"{
        "current": "dev",
        "profiles": [
            {
                "name": "dev",
                "mode": "AKSK",
                "accessKeyId": "AK1",
                "secretAccessKey": "SK1",
                "region": "cn-north-4",
                "projectId": "p-dev"
            },
            {
                "name": "sso",
                "mode": "SSO",
                "accessKeyId": "ignored",
                "ssoAuth": {
                    "stsToken": {
                        "accessKeyId": "AK2",
                        "secretAccessKey": "SK2",
                        "securityToken": "TOKEN"
                    }
                },
                "domainId": "d-1"
            },
            { "name": "broken", "mode": "SSO" }
        ]
    }"#;

    fn write_config() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        file
    }

    #[test]
    fn current_profile() {
        let file = write_config();
        let config = SharedConfig::load(file.path()).unwrap();
        let settings = config.profile(None).unwrap();
        assert_eq!(settings.access_key, "AK1");
        assert_eq!(settings.secret_key, "SK1");
        assert_eq!(settings.security_token, None);
        assert_eq!(settings.region.as_deref(), Some("cn-north-4"));
        assert_eq!(settings.project_id.as_deref(), Some("p-dev"));
        assert_eq!(settings.domain_id, None);
    }

    #[test]
    fn sso_profile() {
        let file = write_config();
        let config = SharedConfig::load(file.path()).unwrap();
        let settings = config.profile(Some("sso")).unwrap();
        assert_eq!(settings.access_key, "AK2");
        assert_eq!(settings.secret_key, "SK2");
        assert_eq!(settings.security_token.as_deref(), Some("TOKEN"));
        assert_eq!(settings.domain_id.as_deref(), Some("d-1"));

        assert!(config.profile(Some("broken")).is_err());
        assert!(config.profile(Some("missing")).is_err());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SharedConfig::load(&dir.path().join("config.json")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn home_expansion() {
        assert_eq!(
            expand_home("/etc/hcloud.json").unwrap(),
            PathBuf::from("/etc/hcloud.json")
        );
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home("~/.hcloud/config.json").unwrap(),
                home.join(".hcloud/config.json")
            );
        }
    }
}
