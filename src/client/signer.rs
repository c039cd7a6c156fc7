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

//! AK/SK request signing (`SDK-HMAC-SHA256`)

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, HOST};
use reqwest::{Request, Url};
use sha2::{Digest, Sha256};
use time::{macros::format_description, OffsetDateTime};

use super::error::ApiError;

pub const SIGN_ALGORITHM: &str = "SDK-HMAC-SHA256";
pub const HEADER_SDK_DATE: &str = "x-sdk-date";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new<A: Into<String>, S: Into<String>>(access_key: A, secret_key: S) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Sign the request in place: sets `X-Sdk-Date`, `Host` and `Authorization`
    pub fn sign(&self, request: &mut Request, now: OffsetDateTime) -> Result<(), ApiError> {
        let date = format_sdk_date(now)?;
        let host = host_header(request.url())?;

        let headers = request.headers_mut();
        headers.insert(HeaderName::from_static(HEADER_SDK_DATE), header_value(&date)?);
        headers.insert(HOST, header_value(&host)?);

        let mut canonical_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in request.headers() {
            canonical_headers
                .entry(name.as_str().to_lowercase())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .unwrap_or_default();

        let (canonical, signed_headers) = canonical_request(
            request.method().as_str(),
            request.url(),
            &canonical_headers,
            body,
        );
        let signature = self.signature(&string_to_sign(&canonical, &date))?;

        let authorization = format!(
            "{SIGN_ALGORITHM} Access={}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        );
        request
            .headers_mut()
            .insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }

    fn signature(&self, string_to_sign: &str) -> Result<String, ApiError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|err| ApiError::Invalid(format!("invalid secret key: {err}")))?;
        mac.update(string_to_sign.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

pub fn format_sdk_date(now: OffsetDateTime) -> Result<String, ApiError> {
    now.to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[year][month][day]T[hour][minute][second]Z"
        ))
        .map_err(|err| ApiError::Invalid(format!("cannot format request date: {err}")))
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|err| ApiError::Invalid(format!("invalid header value: {err}")))
}

fn host_header(url: &Url) -> Result<String, ApiError> {
    let host = url
        .host_str()
        .ok_or_else(|| ApiError::Invalid(format!("URL without host: {url}")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Build the canonical request and the list of signed headers
pub fn canonical_request(
    method: &str,
    url: &Url,
    headers: &BTreeMap<String, Vec<String>>,
    body: &[u8],
) -> (String, String) {
    let mut header_lines = String::new();
    for (name, values) in headers {
        let mut values = values.iter().map(|v| v.trim()).collect::<Vec<_>>();
        values.sort_unstable();
        for value in values {
            header_lines.push_str(name);
            header_lines.push(':');
            header_lines.push_str(value);
            header_lines.push('\n');
        }
    }
    let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method.to_uppercase(),
        canonical_uri(url),
        canonical_query(url),
        header_lines,
        signed_headers,
        hex::encode(Sha256::digest(body)),
    );
    (canonical, signed_headers)
}

pub fn string_to_sign(canonical_request: &str, date: &str) -> String {
    format!(
        "{SIGN_ALGORITHM}\n{date}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

fn canonical_uri(url: &Url) -> String {
    let mut path = url
        .path()
        .split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            urlencoding::encode(&decoded).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/");
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

fn canonical_query(url: &Url) -> String {
    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        query
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    let mut pairs = Vec::new();
    for (key, mut values) in query {
        values.sort_unstable();
        let key = urlencoding::encode(&key);
        for value in values {
            pairs.push(format!("{key}={}", urlencoding::encode(&value)));
        }
    }
    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use reqwest::header::CONTENT_TYPE;
    use reqwest::{Body, Method};
    use time::macros::datetime;

    use super::*;

    fn vpc_request() -> Request {
        let url = Url::parse(
            "https://vpc.cn-north-4.myhuaweicloud.com/v1/0123456789abcdef/vpcs?marker=a%20b&limit=10",
        )
        .unwrap();
        let mut request = Request::new(Method::POST, url);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.headers_mut().insert(
            "x-project-id",
            HeaderValue::from_static("0123456789abcdef"),
        );
        *request.body_mut() = Some(Body::from(r#"{"vpc":{"name":"demo"}}"#));
        request
    }

    #[test]
    fn sdk_date() {
        assert_eq!(
            format_sdk_date(datetime!(2024-01-02 03:04:05 UTC)).unwrap(),
            "20240102T030405Z"
        );
        assert_eq!(
            format_sdk_date(datetime!(2024-01-02 05:04:05 +02:00)).unwrap(),
            "20240102T030405Z"
        );
    }

    #[test]
    fn canonical_form() {
        let url = Url::parse("https://iam.myhuaweicloud.com/v3/auth/domains").unwrap();
        let headers = BTreeMap::from([
            ("host".to_string(), vec!["iam.myhuaweicloud.com".to_string()]),
            ("x-sdk-date".to_string(), vec![" 20240102T030405Z ".to_string()]),
        ]);
        let (canonical, signed) = canonical_request("get", &url, &headers, b"");
        assert_eq!(signed, "host;x-sdk-date");
        assert_eq!(
            canonical,
            "GET\n/v3/auth/domains/\n\nhost:iam.myhuaweicloud.com\nx-sdk-date:20240102T030405Z\n\nhost;x-sdk-date\ne3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn query_is_sorted_and_escaped() {
        let url = Url::parse("https://x/a%20b?z=1&a=c+d&a=b").unwrap();
        assert_eq!(canonical_uri(&url), "/a%20b/");
        assert_eq!(canonical_query(&url), "a=b&a=c%20d&z=1");
    }

    #[test]
    fn sign_request() {
        let mut request = vpc_request();
        Signer::new("AK", "secret")
            .sign(&mut request, datetime!(2024-01-02 03:04:05 UTC))
            .unwrap();

        let headers = request.headers();
        assert_eq!(headers["x-sdk-date"], "20240102T030405Z");
        assert_eq!(headers["host"], "vpc.cn-north-4.myhuaweicloud.com");
        assert_eq!(
            headers["authorization"],
            "SDK-HMAC-SHA256 Access=AK, SignedHeaders=content-type;host;x-project-id;x-sdk-date, \
             Signature=f9a1b46fdab47d565c19fd77c3c7cccd54d8bf6f29e20b1dc447767cbbfa8254"
        );
    }

    #[test]
    fn debug_hides_secret() {
        let signer = Signer::new("AK", "very-secret");
        assert!(!format!("{signer:?}").contains("very-secret"));
    }
}
