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

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

mod auth;
mod error;
mod signer;

pub use auth::{password_token, Credentials, DomainRef, ProjectRef};
pub use error::{ApiError, HttpError};
pub use signer::Signer;

pub const HEADER_PROJECT_ID: &str = "x-project-id";
pub const HEADER_DOMAIN_ID: &str = "x-domain-id";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Header identifying the scope of a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    None,
    Project(String),
    Domain(String),
}

/// Client for one service in one region
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    credentials: Arc<Credentials>,
    scope: Scope,
    max_retries: u32,
    pub endpoint: String,
    pub resource_base: String,
    pub region: String,
}

impl ServiceClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<Credentials>,
        scope: Scope,
        max_retries: u32,
        endpoint: String,
        resource_base: String,
        region: String,
    ) -> Self {
        Self {
            http,
            credentials,
            scope,
            max_retries,
            endpoint,
            resource_base,
            region,
        }
    }

    /// Full URL of a resource path, relative to the resource base
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.resource_base, path.trim_start_matches('/'))
    }

    /// Project id the client is bound to
    pub fn project_id(&self) -> Option<&str> {
        match &self.scope {
            Scope::Project(project_id) => Some(project_id),
            _ => None,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let body = self.execute(Method::GET, url, None).await?;
        decode(url, &body)
    }

    pub async fn post<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.execute(Method::POST, url, Some(encode(body)?)).await?;
        decode(url, &body)
    }

    pub async fn put<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.execute(Method::PUT, url, Some(encode(body)?)).await?;
        decode(url, &body)
    }

    pub async fn patch<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.execute(Method::PATCH, url, Some(encode(body)?)).await?;
        decode(url, &body)
    }

    /// Send a request whose response body is irrelevant
    pub async fn send<B>(&self, method: Method, url: &str, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = body.map(encode).transpose()?;
        self.execute(method, url, body).await?;
        Ok(())
    }

    pub async fn delete(&self, url: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        let mut attempt = 0;
        loop {
            let mut request = self
                .http
                .request(method.clone(), url)
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .build()?;
            if let Some(body) = &body {
                *request.body_mut() = Some(body.clone().into());
            }
            match &self.scope {
                Scope::Project(id) if self.credentials.is_aksk() => {
                    request
                        .headers_mut()
                        .insert(HeaderName::from_static(HEADER_PROJECT_ID), header(id)?);
                }
                Scope::Domain(id) if self.credentials.is_aksk() => {
                    request
                        .headers_mut()
                        .insert(HeaderName::from_static(HEADER_DOMAIN_ID), header(id)?);
                }
                _ => (),
            }
            self.credentials.apply(&mut request)?;

            debug!(method = method.as_str(), url, attempt, "sending request");
            let response = self.http.execute(request).await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let backoff = backoff(attempt);
                warn!(
                    method = method.as_str(),
                    url,
                    "request throttled, retrying in {backoff:?}"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let bytes = response.bytes().await?;
            debug!(
                method = method.as_str(),
                url,
                status = status.as_u16(),
                "received response"
            );
            if !status.is_success() {
                return Err(ApiError::from_response(
                    status.as_u16(),
                    method.as_str(),
                    url,
                    &String::from_utf8_lossy(&bytes),
                ));
            }
            return Ok(bytes.to_vec());
        }
    }
}

/// Delay before retrying a throttled request
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(5)).min(MAX_BACKOFF)
}

fn header(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|err| ApiError::Invalid(format!("invalid header value: {err}")))
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(body).map_err(|err| ApiError::Invalid(format!("cannot encode body: {err}")))
}

/// Field deserializer mapping an explicit `null` to the default value
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a JSON body; an empty body decodes as `null`
fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        &b"null"[..]
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    #[derive(Debug, Deserialize)]
    struct Vpc {
        id: String,
    }

    /// Serve canned responses, one per connection, and return the request heads received
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut stream).await);
                let response = format!(
                    "HTTP/1.1 {status} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            requests
        });
        (base, handle)
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = stream.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            let Some(end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buffer[..end]).to_lowercase();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim() == "content-length")
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= end + 4 + length {
                return head;
            }
        }
        String::from_utf8_lossy(&buffer).to_lowercase()
    }

    fn client(base: &str, max_retries: u32) -> ServiceClient {
        ServiceClient::new(
            reqwest::Client::builder().no_proxy().build().unwrap(),
            Arc::new(Credentials::Token("t0k".to_string())),
            Scope::None,
            max_retries,
            base.to_string(),
            base.to_string(),
            "cn-north-4".to_string(),
        )
    }

    const THROTTLED: &str = r#"{"error_code":"APIGW.0308","error_msg":"request throttled"}"#;

    #[tokio::test]
    async fn throttled_requests_are_retried() {
        let (base, server) = serve(vec![(429, THROTTLED), (200, r#"{"id":"v1"}"#)]).await;
        let client = client(&base, 1);

        let vpc: Vpc = client.get(&client.url("vpcs/v1")).await.unwrap();
        assert_eq!(vpc.id, "v1");

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.starts_with("get /vpcs/v1 "), "{request}");
            assert!(request.contains("x-auth-token: t0k"), "{request}");
        }
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let (base, server) = serve(vec![(429, THROTTLED), (429, THROTTLED)]).await;
        let client = client(&base, 1);

        let err = client.get::<Vpc>(&client.url("vpcs/v1")).await.unwrap_err();
        assert!(matches!(err, ApiError::TooManyRequests(_)), "{err:?}");
        assert_eq!(err.code(), Some("APIGW.0308"));
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn error_statuses() {
        let (base, server) = serve(vec![
            (404, r#"{"error_code":"VPC.0202","error_msg":"vpc not found"}"#),
            (409, r#"{"NeutronError":{"type":"InUse","message":"subnet in use"}}"#),
            (204, ""),
        ])
        .await;
        let client = client(&base, 3);
        let url = client.url("vpcs/v1");

        let err = client.get::<Vpc>(&url).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("VPC.0202"));

        let err = client.delete(&url).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)), "{err:?}");
        assert_eq!(err.code(), Some("InUse"));

        client.delete(&url).await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("get "));
        assert!(requests[1].starts_with("delete "));
    }

    #[tokio::test]
    async fn empty_success_bodies() {
        let (base, server) = serve(vec![(200, ""), (202, "")]).await;
        let client = client(&base, 0);

        let vpc: Option<Vpc> = client.get(&client.url("vpcs/v1")).await.unwrap();
        assert!(vpc.is_none());

        let body = serde_json::json!({"vpc": {"name": "net"}});
        let created: Option<Vpc> = client.post(&client.url("vpcs"), &body).await.unwrap();
        assert!(created.is_none());

        let requests = server.await.unwrap();
        assert!(requests[1].starts_with("post /vpcs "));
        assert!(requests[1].contains("content-type: application/json"));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(0), Duration::from_secs(1));
        assert_eq!(backoff(3), Duration::from_secs(8));
        assert_eq!(backoff(5), Duration::from_secs(30));
        assert_eq!(backoff(40), Duration::from_secs(30));
    }

    #[test]
    fn decode_bodies() {
        let vpc: Vpc = decode("u", br#"{"id":"v1"}"#).unwrap();
        assert_eq!(vpc.id, "v1");

        let empty: Option<Vpc> = decode("u", b"  ").unwrap();
        assert!(empty.is_none());
        decode::<()>("u", b"").unwrap();

        assert!(matches!(
            decode::<Vpc>("u", b"{"),
            Err(ApiError::Decode { .. })
        ));
    }

    #[test]
    fn null_fields() {
        #[derive(Deserialize)]
        struct Subnet {
            #[serde(default, deserialize_with = "nullable")]
            description: String,
            #[serde(default, deserialize_with = "nullable")]
            dns_list: Vec<String>,
        }
        let subnet: Subnet = decode("u", br#"{"description":null}"#).unwrap();
        assert_eq!(subnet.description, "");
        assert!(subnet.dns_list.is_empty());
    }

    #[test]
    fn urls() {
        let client = ServiceClient::new(
            reqwest::Client::new(),
            Arc::new(Credentials::Token("t".to_string())),
            Scope::Project("p1".to_string()),
            0,
            "https://vpc.cn-north-4.myhuaweicloud.com/".to_string(),
            "https://vpc.cn-north-4.myhuaweicloud.com/v1/p1/".to_string(),
            "cn-north-4".to_string(),
        );
        assert_eq!(
            client.url("/vpcs/abc"),
            "https://vpc.cn-north-4.myhuaweicloud.com/v1/p1/vpcs/abc"
        );
        assert_eq!(client.project_id(), Some("p1"));
    }
}
