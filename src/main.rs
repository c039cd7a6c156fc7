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

use std::env;
use std::fs::File;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tf_provider::serve;
use tracing_subscriber::EnvFilter;

use provider::HuaweiCloudProvider;

mod client;
mod compute_instance;
mod config;
mod identity_group;
mod nat_gateway;
mod provider;
mod secgroup;
mod secgroup_rule;
mod tags;
mod timeouts;
mod utils;
mod vpc;
mod vpc_subnet;
mod wait;

/// Log to `HW_LOG_FILE`, filtered by `TF_LOG_PROVIDER_HUAWEICLOUD` or `RUST_LOG`
///
/// The plugin server installs its own subscriber when `PLUGIN_LOG_FILE` is set.
fn init_logging() -> Result<()> {
    if env::var_os("PLUGIN_LOG_FILE").is_some() {
        return Ok(());
    }
    let Ok(path) = env::var("HW_LOG_FILE") else {
        return Ok(());
    };
    let log_file = File::create(&path).with_context(|| format!("cannot create log file {path}"))?;
    let filter = EnvFilter::try_from_env("TF_LOG_PROVIDER_HUAWEICLOUD")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init()
        .map_err(|err| anyhow!("cannot install the log subscriber: {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    serve("huaweicloud", HuaweiCloudProvider::default()).await
}
