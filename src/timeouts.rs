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

//! `timeouts` block shared by every resource

use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tf_provider::map;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::WithValidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Timeouts<'a> {
    #[serde(borrow = "'a")]
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

/// Default durations of each operation of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTimeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl DefaultTimeouts {
    pub const fn minutes(create: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }
}

lazy_static! {
    pub static ref TIMEOUTS_BLOCK: NestedBlock = NestedBlock::Optional(Block {
        attributes: map! {
            "create" => timeout_attribute("create"),
            "update" => timeout_attribute("update"),
            "delete" => timeout_attribute("delete"),
        },
        description: Description::plain("Override the default timeouts of the operations"),
        ..Default::default()
    });
}

fn timeout_attribute(operation: &str) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(format!(
            "Maximum duration of the {operation} operation (eg: `10m`, `1h30m`)"
        )),
        constraint: AttributeConstraint::Optional,
        ..Default::default()
    }
}

fn resolve(value: &ValueString, default: Duration) -> Duration {
    value
        .as_deref_option()
        .and_then(|s| parse_duration(s).ok())
        .unwrap_or(default)
}

pub fn create_timeout(timeouts: &Value<Timeouts>, defaults: &DefaultTimeouts) -> Duration {
    timeouts
        .as_ref_option()
        .map_or(defaults.create, |t| resolve(&t.create, defaults.create))
}

pub fn update_timeout(timeouts: &Value<Timeouts>, defaults: &DefaultTimeouts) -> Duration {
    timeouts
        .as_ref_option()
        .map_or(defaults.update, |t| resolve(&t.update, defaults.update))
}

pub fn delete_timeout(timeouts: &Value<Timeouts>, defaults: &DefaultTimeouts) -> Duration {
    timeouts
        .as_ref_option()
        .map_or(defaults.delete, |t| resolve(&t.delete, defaults.delete))
}

impl<'a> WithValidate for Value<Timeouts<'a>> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let Value::Value(timeouts) = self else {
            return;
        };
        for (name, value) in [
            ("create", &timeouts.create),
            ("update", &timeouts.update),
            ("delete", &timeouts.delete),
        ] {
            if let Value::Value(s) = value {
                if let Err(err) = parse_duration(s) {
                    diags.error(
                        "Invalid duration",
                        err,
                        attr_path.clone().index(0).attribute(name),
                    );
                }
            }
        }
    }
}

/// Parse durations like `30s`, `10m`, `1h30m` or `1.5h`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration `{input}`"))?;
        if number_len == 0 {
            return Err(format!("invalid duration `{input}`"));
        }
        let number: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid duration `{input}`"))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let factor = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => return Err(format!("unknown unit `{unit}` in duration `{input}`")),
        };
        rest = &rest[unit_len..];
        total += number * factor;
    }

    Ok(Duration::from_secs_f64(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn defaults() {
        let defaults = DefaultTimeouts::minutes(10, 5, 20);
        let timeouts = Value::Value(Timeouts {
            create: ValueString::from("1m"),
            update: ValueString::Null,
            delete: ValueString::from("bogus"),
        });
        assert_eq!(create_timeout(&timeouts, &defaults), Duration::from_secs(60));
        assert_eq!(update_timeout(&timeouts, &defaults), Duration::from_secs(300));
        assert_eq!(delete_timeout(&timeouts, &defaults), Duration::from_secs(1200));
        assert_eq!(
            create_timeout(&Value::Null, &defaults),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        let timeouts = Value::Value(Timeouts {
            create: ValueString::from("2x"),
            ..Default::default()
        });
        timeouts.validate(&mut diags, AttributePath::new("timeouts"));
        assert_eq!(diags.errors.len(), 1);
    }
}
