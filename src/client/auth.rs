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

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Request;
use serde_json::json;
use time::OffsetDateTime;
use tracing::debug;

use super::error::ApiError;
use super::signer::Signer;

pub const HEADER_SECURITY_TOKEN: &str = "x-security-token";
pub const HEADER_AUTH_TOKEN: &str = "x-auth-token";
pub const HEADER_SUBJECT_TOKEN: &str = "x-subject-token";

/// How requests are authenticated
#[derive(Clone)]
pub enum Credentials {
    /// Requests are signed with an access key pair, optionally temporary
    AkSk {
        signer: Signer,
        security_token: Option<String>,
    },
    /// Requests carry an IAM token
    Token(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AkSk {
                signer,
                security_token,
            } => f
                .debug_struct("AkSk")
                .field("signer", signer)
                .field("temporary", &security_token.is_some())
                .finish(),
            Credentials::Token(_) => f.write_str("Token(..)"),
        }
    }
}

impl Credentials {
    pub fn is_aksk(&self) -> bool {
        matches!(self, Credentials::AkSk { .. })
    }

    /// Authenticate the request; must be the last change made to the request
    pub fn apply(&self, request: &mut Request) -> Result<(), ApiError> {
        match self {
            Credentials::AkSk {
                signer,
                security_token,
            } => {
                if let Some(token) = security_token {
                    request.headers_mut().insert(
                        HeaderName::from_static(HEADER_SECURITY_TOKEN),
                        sensitive_header(token)?,
                    );
                }
                signer.sign(request, OffsetDateTime::now_utc())
            }
            Credentials::Token(token) => {
                request.headers_mut().insert(
                    HeaderName::from_static(HEADER_AUTH_TOKEN),
                    sensitive_header(token)?,
                );
                Ok(())
            }
        }
    }
}

fn sensitive_header(value: &str) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|err| ApiError::Invalid(format!("invalid credential: {err}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Account used for password authentication
#[derive(Debug, Clone, Copy)]
pub enum DomainRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

/// Project used as the scope of a password token
#[derive(Debug, Clone, Copy)]
pub enum ProjectRef<'a> {
    Id(&'a str),
    Name(&'a str),
}

pub fn password_auth_body(
    user_name: &str,
    password: &str,
    domain: DomainRef<'_>,
    project: ProjectRef<'_>,
) -> serde_json::Value {
    let domain = match domain {
        DomainRef::Id(id) => json!({ "id": id }),
        DomainRef::Name(name) => json!({ "name": name }),
    };
    let project = match project {
        ProjectRef::Id(id) => json!({ "id": id }),
        ProjectRef::Name(name) => json!({ "name": name }),
    };
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": user_name,
                        "password": password,
                        "domain": domain,
                    }
                }
            },
            "scope": { "project": project }
        }
    })
}

/// Exchange a user name and a password for an IAM token
pub async fn password_token(
    http: &reqwest::Client,
    identity_endpoint: &str,
    user_name: &str,
    password: &str,
    domain: DomainRef<'_>,
    project: ProjectRef<'_>,
) -> Result<String, ApiError> {
    let url = format!("{}/auth/tokens", identity_endpoint.trim_end_matches('/'));
    debug!(url = url.as_str(), user = user_name, "requesting IAM token");

    let body = password_auth_body(user_name, password, domain, project);
    let response = http
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .send()
        .await?;

    let status = response.status();
    let token = response
        .headers()
        .get(HEADER_SUBJECT_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::from_response(
            status.as_u16(),
            "POST",
            &url,
            &body,
        ));
    }
    token.ok_or_else(|| ApiError::Invalid(format!("no {HEADER_SUBJECT_TOKEN} header in response of {url}")))
}

#[cfg(test)]
mod tests {
    use reqwest::{Method, Url};

    use super::*;

    #[test]
    fn token_header() {
        let mut request = Request::new(
            Method::GET,
            Url::parse("https://iam.myhuaweicloud.com/v3/groups").unwrap(),
        );
        Credentials::Token("tok".to_string())
            .apply(&mut request)
            .unwrap();
        assert_eq!(request.headers()["x-auth-token"], "tok");
        assert!(request.headers()["x-auth-token"].is_sensitive());
        assert!(request.headers().get("authorization").is_none());
    }

    #[test]
    fn temporary_aksk() {
        let mut request = Request::new(
            Method::GET,
            Url::parse("https://vpc.cn-north-4.myhuaweicloud.com/v1/p/vpcs").unwrap(),
        );
        let credentials = Credentials::AkSk {
            signer: Signer::new("AK", "SK"),
            security_token: Some("sts".to_string()),
        };
        credentials.apply(&mut request).unwrap();
        let authorization = request.headers()["authorization"].to_str().unwrap();
        assert!(authorization.starts_with("SDK-HMAC-SHA256 Access=AK, "));
        assert!(authorization.contains("x-security-token"));
        assert_eq!(request.headers()["x-security-token"], "sts");
    }

    #[test]
    fn debug_hides_secrets() {
        let token = Credentials::Token("secret-token".to_string());
        assert!(!format!("{token:?}").contains("secret-token"));
    }

    #[test]
    fn password_body() {
        let body = password_auth_body(
            "alice",
            "pwd",
            DomainRef::Name("acme"),
            ProjectRef::Name("cn-north-4"),
        );
        assert_eq!(
            body["auth"]["identity"]["password"]["user"]["domain"]["name"],
            "acme"
        );
        assert_eq!(body["auth"]["scope"]["project"]["name"], "cn-north-4");
        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
    }
}
