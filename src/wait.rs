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

//! Polling of asynchronous cloud operations

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::client::ApiError;

const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum WaitError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Failed(String),
    #[error("couldn't find resource ({retries} retries)")]
    NotFound { retries: u32 },
    #[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },
    #[error(
        "timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})",
        .expected.join(", ")
    )]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },
}

/// Result of a refresh: `None` when the resource could not be found,
/// otherwise the resource and its current state
pub type Refreshed<T> = Option<(T, String)>;

/// Poll a refresh function until it reports one of the target states
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub delay: Duration,
    pub timeout: Duration,
    pub min_timeout: Duration,
    pub poll_interval: Duration,
    pub not_found_checks: u32,
    pub continuous_target_occurence: u32,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            timeout,
            min_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            not_found_checks: 20,
            continuous_target_occurence: 1,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn continuous_target_occurence(mut self, occurences: u32) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    /// Wait for the target state
    ///
    /// Returns the last refreshed value, or `None` when the target was the absence of the resource.
    pub async fn wait_for_state<T, F, Fut>(&self, refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refreshed<T>, WaitError>>,
    {
        let mut last_state = String::new();
        let result = tokio::time::timeout(self.timeout, self.poll(refresh, &mut last_state)).await;
        match result {
            Ok(result) => result,
            Err(_) => Err(WaitError::Timeout {
                last_state,
                expected: self.target.clone(),
                timeout: self.timeout,
            }),
        }
    }

    async fn poll<T, F, Fut>(
        &self,
        mut refresh: F,
        last_state: &mut String,
    ) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Refreshed<T>, WaitError>>,
    {
        tokio::time::sleep(self.delay).await;

        let mut wait = Duration::ZERO;
        let mut not_found_ticks = 0;
        let mut target_occurence = 0;

        loop {
            if !wait.is_zero() {
                trace!("waiting {wait:?} before next try");
                tokio::time::sleep(wait).await;
            } else {
                wait = INITIAL_WAIT;
            }

            match refresh().await? {
                None if self.target.is_empty() => {
                    target_occurence += 1;
                    if target_occurence >= self.continuous_target_occurence {
                        return Ok(None);
                    }
                }
                None => {
                    not_found_ticks += 1;
                    if not_found_ticks > self.not_found_checks {
                        return Err(WaitError::NotFound {
                            retries: not_found_ticks,
                        });
                    }
                }
                Some((value, state)) => {
                    debug!(state = state.as_str(), "refreshed resource state");
                    not_found_ticks = 0;

                    if self.target.contains(&state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(Some(value));
                        }
                    } else if self.pending.contains(&state) {
                        target_occurence = 0;
                    } else if !self.pending.is_empty() {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    *last_state = state;
                }
            }

            // Back off, except when waiting for the target state to reoccur
            if target_occurence == 0 {
                wait *= 2;
            }
            if !self.poll_interval.is_zero() && self.poll_interval < MAX_POLL_INTERVAL {
                wait = self.poll_interval;
            } else if wait < self.min_timeout {
                wait = self.min_timeout;
            } else if wait > MAX_WAIT {
                wait = MAX_WAIT;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    fn sequence(states: &[&str]) -> Mutex<Vec<Option<String>>> {
        Mutex::new(
            states
                .iter()
                .rev()
                .map(|s| (!s.is_empty()).then(|| s.to_string()))
                .collect(),
        )
    }

    async fn next(states: &Mutex<Vec<Option<String>>>) -> Result<Refreshed<u32>, WaitError> {
        let mut states = states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop().unwrap()
        } else {
            states[0].clone()
        };
        Ok(state.map(|s| (7, s)))
    }

    #[tokio::test(start_paused = true)]
    async fn reaches_target() {
        let states = sequence(&["CREATING", "CREATING", "OK"]);
        let conf = StateChangeConf::new(&["CREATING"], &["OK"], Duration::from_secs(60));
        let value = conf.wait_for_state(|| next(&states)).await.unwrap();
        assert_eq!(value, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn absence_reoccurs_after_min_timeout() {
        let states = sequence(&[""]);
        let conf = StateChangeConf::new(&["ACTIVE"], &[], Duration::from_secs(60))
            .min_timeout(Duration::from_secs(3))
            .continuous_target_occurence(2);
        let start = Instant::now();
        let value = conf.wait_for_state(|| next(&states)).await.unwrap();
        assert_eq!(value, None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state() {
        let states = sequence(&["BUILD", "ERROR"]);
        let conf = StateChangeConf::new(&["BUILD"], &["ACTIVE"], Duration::from_secs(60));
        let err = conf.wait_for_state(|| next(&states)).await.unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { ref state, .. } if state == "ERROR"));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_state_without_pending_keeps_waiting() {
        let states = sequence(&["WHATEVER", "ACTIVE"]);
        let conf = StateChangeConf::new(&[], &["ACTIVE"], Duration::from_secs(60));
        assert_eq!(
            conf.wait_for_state(|| next(&states)).await.unwrap(),
            Some(7)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_last_state() {
        let states = sequence(&["PENDING"]);
        let conf = StateChangeConf::new(&["PENDING"], &["ACTIVE"], Duration::from_secs(30));
        let start = Instant::now();
        let err = conf.wait_for_state(|| next(&states)).await.unwrap_err();
        assert!(start.elapsed() >= Duration::from_secs(30));
        match err {
            WaitError::Timeout {
                last_state,
                expected,
                ..
            } => {
                assert_eq!(last_state, "PENDING");
                assert_eq!(expected, vec!["ACTIVE".to_string()]);
            }
            err => panic!("unexpected error: {err}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn absence_as_target() {
        let states = sequence(&["ACTIVE", "ACTIVE", ""]);
        let conf = StateChangeConf::new(&["ACTIVE"], &[], Duration::from_secs(60));
        assert_eq!(conf.wait_for_state(|| next(&states)).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_limit() {
        let calls = AtomicU32::new(0);
        let conf = StateChangeConf::new(&["BUILD"], &["ACTIVE"], Duration::from_secs(3600));
        let err = conf
            .wait_for_state(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<Refreshed<()>, WaitError>(None)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::NotFound { retries: 21 }));
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_occurences() {
        let states = sequence(&["OK", "PENDING", "OK", "OK"]);
        let calls = AtomicU32::new(0);
        let conf = StateChangeConf::new(&["PENDING"], &["OK"], Duration::from_secs(60))
            .continuous_target_occurence(2);
        conf.wait_for_state(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            next(&states)
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_interval_and_delay() {
        let states = sequence(&["BUILD", "BUILD", "ACTIVE"]);
        let conf = StateChangeConf::new(&["BUILD"], &["ACTIVE"], Duration::from_secs(600))
            .delay(Duration::from_secs(5))
            .poll_interval(Duration::from_secs(5));
        let start = Instant::now();
        conf.wait_for_state(|| next(&states)).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_error_aborts() {
        let conf = StateChangeConf::new(&["BUILD"], &["ACTIVE"], Duration::from_secs(60));
        let err = conf
            .wait_for_state(|| async {
                Err::<Refreshed<()>, _>(WaitError::Failed("job failed".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "job failed");
    }
}
