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

use std::borrow::Cow;
use std::fmt::Display;
use std::net::IpAddr;
use std::sync::Arc;

use lazy_static::lazy_static;
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Description, Schema};
use tf_provider::value::{Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};
use tracing::info;

use crate::client::{ApiError, ServiceClient};
use crate::config::{Config, ConfigHandle};

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

lazy_static! {
    pub(crate) static ref ID_ATTRIBUTE: Attribute = Attribute {
        attr_type: AttributeType::String,
        description: Description::plain("Resource ID"),
        constraint: AttributeConstraint::Computed,
        ..Default::default()
    };
    pub(crate) static ref REGION_ATTRIBUTE: Attribute = Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(
            "Region of the resource, defaults to the region of the provider"
        ),
        constraint: AttributeConstraint::OptionalComputed,
        ..Default::default()
    };
    pub(crate) static ref TAGS_ATTRIBUTE: Attribute = Attribute {
        attr_type: AttributeType::Map(AttributeType::String.into()),
        description: Description::plain("Key/value pairs to associate with the resource"),
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    };
    pub(crate) static ref EPS_ATTRIBUTE: Attribute = Attribute {
        attr_type: AttributeType::String,
        description: Description::plain("Enterprise project of the resource"),
        constraint: AttributeConstraint::OptionalComputed,
        ..Default::default()
    };
}

/// Null for missing or empty strings
pub(crate) fn non_empty<'a, S: Into<Cow<'a, str>>>(value: Option<S>) -> ValueString<'a> {
    match value.map(Into::into) {
        Some(value) if !value.is_empty() => Value::Value(value),
        _ => Value::Null,
    }
}

/// Value read back from the API, keeping a configured empty string the API reports as missing
pub(crate) fn keep_empty<'a>(prior: &ValueString<'a>, value: Option<String>) -> ValueString<'a> {
    match non_empty(value) {
        Value::Null if prior.as_deref_option() == Some("") => prior.clone(),
        value => value,
    }
}

/// Mark a computed attribute as unknown when it has no value yet
pub(crate) fn computed<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}

/// Require a replacement when an attribute that cannot be updated in place changes
pub(crate) fn force_new<T: PartialEq>(
    replace: &mut Vec<AttributePath>,
    name: &'static str,
    prior: &T,
    proposed: &T,
) {
    if prior != proposed {
        replace.push(AttributePath::new(name));
    }
}

pub(crate) fn error_detail(err: impl Display) -> String {
    format!("{err:#}")
}

/// Report an API error on the root of the resource
pub(crate) fn root_error<E: Display>(diags: &mut Diagnostics, summary: &'static str, err: E) {
    diags.root_error(summary, error_detail(err));
}

/// Unwrap the result of a GET on a resource: `None` when the resource is gone or on error
pub(crate) fn check_deleted<T>(
    diags: &mut Diagnostics,
    result: Result<T, ApiError>,
    summary: &'static str,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) if err.is_not_found() => {
            info!("{summary}: resource is gone, removing it from the state");
            None
        }
        Err(err) => {
            root_error(diags, summary, err);
            None
        }
    }
}

/// Only result of a data source query; zero or several results are reported as errors
pub(crate) fn single_match<T>(diags: &mut Diagnostics, mut found: Vec<T>, kind: &str) -> Option<T> {
    match found.len() {
        0 => {
            diags.root_error(
                format!("No {kind} found"),
                "Your query returned no results. Please change your search criteria and try again.",
            );
            None
        }
        1 => found.pop(),
        count => {
            diags.root_error(
                format!("Multiple {kind}s found"),
                format!("Your query returned {count} results. Please change your search criteria and try again."),
            );
            None
        }
    }
}

/// Configured provider and a client for `service` in the resource region
pub(crate) async fn service_client(
    diags: &mut Diagnostics,
    handle: &ConfigHandle,
    service: &str,
    region: &ValueString<'_>,
) -> Option<(Arc<Config>, ServiceClient)> {
    let config = handle.get(diags).await?;
    let region = config.region_of(region).to_string();
    match config.client(service, &region).await {
        Ok(client) => Some((config, client)),
        Err(err) => {
            diags.root_error(
                format!("Error creating HuaweiCloud {service} client"),
                error_detail(err),
            );
            None
        }
    }
}

pub(crate) fn validate_ip(diags: &mut Diagnostics, value: &ValueString, attr_path: AttributePath) {
    if let Value::Value(ip) = value {
        if ip.parse::<IpAddr>().is_err() {
            diags.error(
                "Invalid IP address",
                format!("`{ip}` is not a valid IP address"),
                attr_path,
            );
        }
    }
}

pub(crate) fn validate_not_empty(
    diags: &mut Diagnostics,
    value: &ValueString,
    attr_path: AttributePath,
) {
    if let Value::Value(s) = value {
        if s.trim().is_empty() {
            diags.error_short("Attribute must not be empty", attr_path);
        }
    }
}

pub(crate) fn validate_one_of(
    diags: &mut Diagnostics,
    value: &ValueString,
    allowed: &[&str],
    attr_path: AttributePath,
) {
    if let Value::Value(s) = value {
        if !allowed.contains(&s.as_ref()) {
            diags.error(
                "Invalid value",
                format!("`{s}` must be one of: {}", allowed.join(", ")),
                attr_path,
            );
        }
    }
}

pub(crate) fn validate_length(
    diags: &mut Diagnostics,
    value: &ValueString,
    max: usize,
    attr_path: AttributePath,
) {
    if let Value::Value(s) = value {
        if s.chars().count() > max {
            diags.error(
                "Value too long",
                format!("must be at most {max} characters"),
                attr_path,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_strings() {
        assert_eq!(non_empty(Some("")), ValueString::Null);
        assert_eq!(non_empty(None::<String>), ValueString::Null);
        assert_eq!(non_empty(Some("x".to_string())), ValueString::from("x"));
    }

    #[test]
    fn configured_empty_strings() {
        let configured = ValueString::from("");
        assert_eq!(keep_empty(&configured, Some(String::new())), ValueString::from(""));
        assert_eq!(keep_empty(&configured, None), ValueString::from(""));
        assert_eq!(keep_empty(&configured, Some("d".to_string())), ValueString::from("d"));
        assert_eq!(keep_empty(&ValueString::Null, Some(String::new())), ValueString::Null);
        assert_eq!(keep_empty(&"old".into(), Some(String::new())), ValueString::Null);
    }

    #[test]
    fn single_results() {
        let mut diags = Diagnostics::default();
        assert_eq!(single_match(&mut diags, vec!["v1"], "VPC"), Some("v1"));
        assert!(diags.errors.is_empty());

        assert_eq!(single_match(&mut diags, Vec::<&str>::new(), "VPC"), None);
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "No VPC found");

        let mut diags = Diagnostics::default();
        assert_eq!(single_match(&mut diags, vec!["s1", "s2"], "subnet"), None);
        assert_eq!(diags.errors[0].summary, "Multiple subnets found");
        assert!(diags.errors[0].detail.contains("returned 2 results"));
    }

    #[test]
    fn computed_values() {
        let mut value = ValueString::Null;
        computed(&mut value);
        assert!(value.is_unknown());

        let mut value = ValueString::from("v");
        computed(&mut value);
        assert_eq!(value, ValueString::from("v"));
    }

    #[test]
    fn replacements() {
        let mut replace = Vec::new();
        force_new(&mut replace, "cidr", &ValueString::from("10.0.0.0/16"), &ValueString::from("10.0.0.0/16"));
        assert!(replace.is_empty());
        force_new(&mut replace, "cidr", &ValueString::from("10.0.0.0/16"), &ValueString::Unknown);
        assert_eq!(replace, [AttributePath::new("cidr")]);
    }

    #[test]
    fn validators() {
        let mut diags = Diagnostics::default();
        validate_ip(&mut diags, &ValueString::from("192.168.0.1"), AttributePath::new("ip"));
        validate_one_of(&mut diags, &ValueString::from("a"), &["a", "b"], AttributePath::new("x"));
        validate_ip(&mut diags, &ValueString::Unknown, AttributePath::new("ip"));
        assert!(diags.errors.is_empty());

        validate_ip(&mut diags, &ValueString::from("192.168.0"), AttributePath::new("ip"));
        validate_one_of(&mut diags, &ValueString::from("c"), &["a", "b"], AttributePath::new("x"));
        validate_not_empty(&mut diags, &ValueString::from("  "), AttributePath::new("n"));
        validate_length(&mut diags, &ValueString::from("abc"), 2, AttributePath::new("n"));
        assert_eq!(diags.errors.len(), 4);
    }
}
