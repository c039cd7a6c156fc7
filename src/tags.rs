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

//! Resource tags through the `tags` and `tags/action` endpoints

use std::borrow::Cow;
use std::collections::BTreeMap;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tf_provider::value::{Value, ValueMap, ValueString};
use tracing::debug;

use crate::client::{ApiError, ServiceClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
struct TagAction<'a> {
    action: &'static str,
    tags: &'a [Tag],
}

pub type Tags<'a> = ValueMap<'a, ValueString<'a>>;

/// URL of the tags of a VPC service resource (`vpcs`, `subnets`, `security-groups`...)
pub fn network_tags_url(client: &ServiceClient, resource_type: &str, id: &str) -> String {
    let project_id = client.project_id().unwrap_or_default();
    client.url(&format!("{project_id}/{resource_type}/{id}/tags"))
}

/// Tags of a resource, as a map
pub async fn get_tags<'a>(client: &ServiceClient, url: &str) -> Result<Tags<'a>, ApiError> {
    let list: Option<TagList> = client.get(url).await?;
    Ok(to_map(list.map(|list| list.tags).unwrap_or_default()))
}

/// Replace the tags of a resource: removed keys are deleted, then the new set is created
pub async fn update_tags(
    client: &ServiceClient,
    url: &str,
    old: &Tags<'_>,
    new: &Tags<'_>,
) -> Result<(), ApiError> {
    let (removed, created) = diff(old, new);
    let action_url = format!("{url}/action");

    if !removed.is_empty() {
        debug!(url, count = removed.len(), "deleting tags");
        let body = TagAction {
            action: "delete",
            tags: &removed,
        };
        client.send(Method::POST, &action_url, Some(&body)).await?;
    }
    if !created.is_empty() {
        debug!(url, count = created.len(), "creating tags");
        let body = TagAction {
            action: "create",
            tags: &created,
        };
        client.send(Method::POST, &action_url, Some(&body)).await?;
    }
    Ok(())
}

/// Tags to send to the API
pub fn expand(tags: &Tags<'_>) -> Vec<Tag> {
    tags.iter()
        .flatten()
        .map(|(key, value)| Tag {
            key: key.to_string(),
            value: value.as_deref_option().unwrap_or_default().to_string(),
        })
        .collect()
}

/// An empty tag list reads as null
pub fn to_map<'a>(tags: Vec<Tag>) -> Tags<'a> {
    if tags.is_empty() {
        return Value::Null;
    }
    Value::Value(
        tags.into_iter()
            .map(|tag| (Cow::Owned(tag.key), ValueString::from(tag.value)))
            .collect::<BTreeMap<_, _>>(),
    )
}

/// Tags read back from the API, keeping a configured empty map the API reports as no tags
pub fn keep_empty<'a>(prior: &Tags<'a>, tags: Tags<'a>) -> Tags<'a> {
    match (prior, tags) {
        (Value::Value(prior), Value::Null) if prior.is_empty() => Value::Value(BTreeMap::new()),
        (_, tags) => tags,
    }
}

/// Tags to delete and tags to create to go from `old` to `new`
fn diff(old: &Tags<'_>, new: &Tags<'_>) -> (Vec<Tag>, Vec<Tag>) {
    let old = expand(old);
    let new = expand(new);

    // A changed value is deleted then recreated
    let removed = old
        .iter()
        .filter(|tag| !new.contains(tag))
        .cloned()
        .collect();
    (removed, new)
}
