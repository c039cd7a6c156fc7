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

use std::fmt::Display;

use serde_json::Value as Json;
use thiserror::Error;

/// Error returned by a HuaweiCloud endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub status: u16,
    pub method: String,
    pub url: String,
    pub code: Option<String>,
    pub message: String,
}

impl Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} returned {}", self.method, self.url, self.status)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(HttpError),
    #[error("authentication failed: {0}")]
    Unauthorized(HttpError),
    #[error("forbidden: {0}")]
    Forbidden(HttpError),
    #[error("resource not found: {0}")]
    NotFound(HttpError),
    #[error("conflict: {0}")]
    Conflict(HttpError),
    #[error("too many requests: {0}")]
    TooManyRequests(HttpError),
    #[error("server error: {0}")]
    Server(HttpError),
    #[error("unexpected response: {0}")]
    Unexpected(HttpError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

impl ApiError {
    /// Build the error matching the status code of a failed response
    pub fn from_response(status: u16, method: &str, url: &str, body: &str) -> Self {
        let (code, message) = extract_error(body);
        let err = HttpError {
            status,
            method: method.to_string(),
            url: url.to_string(),
            code,
            message,
        };
        match status {
            400 => ApiError::BadRequest(err),
            401 => ApiError::Unauthorized(err),
            403 => ApiError::Forbidden(err),
            404 => ApiError::NotFound(err),
            409 => ApiError::Conflict(err),
            429 => ApiError::TooManyRequests(err),
            500..=599 => ApiError::Server(err),
            _ => ApiError::Unexpected(err),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(err)
            | ApiError::Unauthorized(err)
            | ApiError::Forbidden(err)
            | ApiError::NotFound(err)
            | ApiError::Conflict(err)
            | ApiError::TooManyRequests(err)
            | ApiError::Server(err)
            | ApiError::Unexpected(err) => Some(err.status),
            ApiError::Transport(err) => err.status().map(|status| status.as_u16()),
            ApiError::Decode { .. } | ApiError::Invalid(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Error code reported by the service, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::BadRequest(err)
            | ApiError::Unauthorized(err)
            | ApiError::Forbidden(err)
            | ApiError::NotFound(err)
            | ApiError::Conflict(err)
            | ApiError::TooManyRequests(err)
            | ApiError::Server(err)
            | ApiError::Unexpected(err) => err.code.as_deref(),
            _ => None,
        }
    }
}

/// Extract the error code and message from the various error layouts used by the services
fn extract_error(body: &str) -> (Option<String>, String) {
    let Ok(json) = serde_json::from_str::<Json>(body) else {
        return (None, body.trim().to_string());
    };

    let as_string = |json: Option<&Json>| json.and_then(Json::as_str).map(str::to_string);

    if let Some(message) = as_string(json.get("error_msg")) {
        return (as_string(json.get("error_code")), message);
    }
    for key in ["error", "NeutronError", "badRequest", "itemNotFound", "forbidden"] {
        if let Some(inner) = json.get(key) {
            if let Some(message) = as_string(inner.get("message")) {
                let code = as_string(inner.get("code"))
                    .or_else(|| as_string(inner.get("type")))
                    .or_else(|| inner.get("code").map(|code| code.to_string()));
                return (code, message);
            }
        }
    }
    if let Some(message) = as_string(json.get("message")) {
        return (as_string(json.get("code")), message);
    }

    (None, body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(ApiError::from_response(404, "GET", "https://x/", "").is_not_found());
        assert!(matches!(
            ApiError::from_response(409, "DELETE", "https://x/", ""),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from_response(503, "GET", "https://x/", ""),
            ApiError::Server(_)
        ));
        assert!(matches!(
            ApiError::from_response(418, "GET", "https://x/", ""),
            ApiError::Unexpected(_)
        ));
        assert_eq!(
            ApiError::from_response(429, "GET", "https://x/", "").status(),
            Some(429)
        );
    }

    #[test]
    fn error_layouts() {
        let err = ApiError::from_response(
            400,
            "POST",
            "https://vpc/",
            r#"{"error_code":"VPC.0001","error_msg":"invalid cidr"}"#,
        );
        assert_eq!(err.code(), Some("VPC.0001"));
        assert!(err.to_string().contains("invalid cidr"));

        let err = ApiError::from_response(
            409,
            "DELETE",
            "https://vpc/",
            r#"{"NeutronError":{"type":"InUse","message":"port in use"}}"#,
        );
        assert_eq!(err.code(), Some("InUse"));

        let err = ApiError::from_response(
            400,
            "POST",
            "https://iam/",
            r#"{"error":{"code":"IAM.0011","message":"bad group"}}"#,
        );
        assert_eq!(err.code(), Some("IAM.0011"));

        let err = ApiError::from_response(500, "GET", "https://ecs/", "boom\n");
        assert_eq!(err.code(), None);
        assert_eq!(err.to_string(), "server error: GET https://ecs/ returned 500: boom");
    }
}
