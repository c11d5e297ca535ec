//! Validator-set convergence poller
//!
//! After a validator change is requested, the local node only learns about it
//! once the change is committed. The poller waits a grace period, then queries
//! the validator set once per interval until this node's address shows up.
//! A run of consecutive query failures longer than the failure budget ends the
//! wait with the last RPC error; an optional deadline and a cancellation
//! signal bound it independently.

use boot_core::BootConfig;
use boot_rpc::ConsensusRpc;
use boot_state_store::{StateStore, StateStoreError};
use std::future::pending;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::keys;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Wait before the first query
    pub grace: Duration,
    /// Wait before every query
    pub interval: Duration,
    /// Consecutive failures tolerated; one more returns the error
    pub failure_budget: u32,
    /// Overall bound, measured from the start of the wait
    pub deadline: Option<Duration>,
    /// Whether a successful query clears the failure count
    pub reset_on_success: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            failure_budget: 10,
            deadline: None,
            reset_on_success: true,
        }
    }
}

impl From<&BootConfig> for PollerConfig {
    fn from(config: &BootConfig) -> Self {
        Self {
            grace: config.poll_grace,
            interval: config.poll_interval,
            failure_budget: config.poll_failure_budget,
            deadline: config.poll_deadline,
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("no validator address to wait for; was the validator key generated?")]
    EmptyTarget,

    #[error("{source:#}")]
    Rpc {
        failures: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("validator {address} not in the validator set after {waited:?}")]
    Timeout { address: String, waited: Duration },

    #[error("wait for validator change cancelled")]
    Cancelled,

    #[error("failed to record validator stage: {0}")]
    Store(#[from] StateStoreError),
}

enum Wake<T> {
    Ready(T),
    Deadline,
    Cancelled,
}

/// Wait until `target` is part of the validator set reported by `rpc`.
///
/// Returns immediately, without any query, when the store already records
/// convergence. On success the store is updated so later runs short-circuit.
pub async fn wait_for_validator(
    store: &dyn StateStore,
    target: &str,
    rpc: &dyn ConsensusRpc,
    config: &PollerConfig,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), PollError> {
    if store.get(keys::VALIDATOR_STAGE) == keys::STAGE_OK {
        debug!("Validator stage already recorded, skipping wait");
        return Ok(());
    }

    let target = target.trim();
    if target.is_empty() {
        return Err(PollError::EmptyTarget);
    }

    let started = Instant::now();
    let deadline = config.deadline.map(|d| started + d);
    let timeout = || PollError::Timeout {
        address: target.to_string(),
        waited: started.elapsed(),
    };

    info!(address = target, grace = ?config.grace, "Waiting for validator change");
    match race(sleep(config.grace), deadline, cancel).await {
        Wake::Ready(()) => {}
        Wake::Deadline => return Err(timeout()),
        Wake::Cancelled => return Err(PollError::Cancelled),
    }

    let mut failures = 0u32;
    loop {
        match race(sleep(config.interval), deadline, cancel).await {
            Wake::Ready(()) => {}
            Wake::Deadline => return Err(timeout()),
            Wake::Cancelled => return Err(PollError::Cancelled),
        }

        let result = match race(rpc.validators(), deadline, cancel).await {
            Wake::Ready(result) => result,
            Wake::Deadline => return Err(timeout()),
            Wake::Cancelled => return Err(PollError::Cancelled),
        };

        match result {
            Err(source) => {
                failures += 1;
                warn!(failures, budget = config.failure_budget, "Validator set query failed: {:#}", source);
                if failures > config.failure_budget {
                    return Err(PollError::Rpc { failures, source });
                }
            }
            Ok(validators) => {
                if config.reset_on_success {
                    failures = 0;
                }
                if validators
                    .iter()
                    .any(|v| v.address.eq_ignore_ascii_case(target))
                {
                    store.set(keys::VALIDATOR_STAGE, keys::STAGE_OK)?;
                    info!(address = target, waited = ?started.elapsed(), "Node joined the validator set");
                    return Ok(());
                }
                debug!(validators = validators.len(), "Node not in validator set yet");
            }
        }
    }
}

async fn race<F: std::future::Future>(
    work: F,
    deadline: Option<Instant>,
    cancel: &mut watch::Receiver<bool>,
) -> Wake<F::Output> {
    let expired = async {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancelled(cancel) => Wake::Cancelled,
        _ = expired => Wake::Deadline,
        out = work => Wake::Ready(out),
    }
}

/// Resolves once `true` is sent. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use boot_rpc::{PubKey, ValidatorInfo};
    use boot_state_store::MemoryStore;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const ADDR: &str = "0A1B2C3D4E5F60718293A4B5C6D7E8F901234567";

    /// Scripted validator-set answers; the last one repeats.
    struct ScriptedRpc {
        answers: Mutex<VecDeque<anyhow::Result<Vec<ValidatorInfo>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedRpc {
        fn new(answers: Vec<anyhow::Result<Vec<ValidatorInfo>>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConsensusRpc for ScriptedRpc {
        async fn genesis(&self) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }

        async fn validators(&self) -> anyhow::Result<Vec<ValidatorInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                return answers.pop_front().unwrap();
            }
            match answers.front().unwrap() {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(anyhow!("{}", e)),
            }
        }
    }

    fn validator(address: &str) -> ValidatorInfo {
        ValidatorInfo {
            address: address.to_string(),
            pub_key: PubKey {
                key_type: "tendermint/PubKeyEd25519".to_string(),
                value: "AAAA".to_string(),
            },
            voting_power: "1".to_string(),
        }
    }

    fn no_cancel() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    #[tokio::test(start_paused = true)]
    async fn test_converged_stage_skips_rpc() {
        let store = MemoryStore::with_entries([(keys::VALIDATOR_STAGE, "ok")]);
        let rpc = ScriptedRpc::new(vec![Err(anyhow!("unreachable"))]);
        let start = Instant::now();

        wait_for_validator(&store, ADDR, &rpc, &PollerConfig::default(), &mut no_cancel())
            .await
            .unwrap();

        assert_eq!(rpc.calls(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_on_first_poll_takes_grace_plus_interval() {
        let store = MemoryStore::new();
        let rpc = ScriptedRpc::new(vec![Ok(vec![validator("ffff"), validator(&ADDR.to_lowercase())])]);
        let start = Instant::now();

        wait_for_validator(&store, ADDR, &rpc, &PollerConfig::default(), &mut no_cancel())
            .await
            .unwrap();

        assert_eq!(rpc.calls(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
        assert_eq!(store.get(keys::VALIDATOR_STAGE), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleven_consecutive_failures_return_rpc_error() {
        let store = MemoryStore::new();
        let rpc = ScriptedRpc::new(vec![Err(anyhow!("connection refused"))]);

        let err = wait_for_validator(&store, ADDR, &rpc, &PollerConfig::default(), &mut no_cancel())
            .await
            .unwrap_err();

        assert_eq!(rpc.calls(), 11);
        assert!(matches!(err, PollError::Rpc { failures: 11, .. }));
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(store.get(keys::VALIDATOR_STAGE), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let store = MemoryStore::new();
        let mut answers: Vec<anyhow::Result<Vec<ValidatorInfo>>> = Vec::new();
        answers.extend((0..10).map(|_| Err(anyhow!("timeout"))));
        answers.push(Ok(vec![]));
        answers.extend((0..10).map(|_| Err(anyhow!("timeout"))));
        answers.push(Ok(vec![validator(ADDR)]));
        let rpc = ScriptedRpc::new(answers);

        wait_for_validator(&store, ADDR, &rpc, &PollerConfig::default(), &mut no_cancel())
            .await
            .unwrap();
        assert_eq!(rpc.calls(), 22);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_reset_failures_accumulate() {
        let store = MemoryStore::new();
        let mut answers: Vec<anyhow::Result<Vec<ValidatorInfo>>> = Vec::new();
        answers.extend((0..6).map(|_| Err(anyhow!("timeout"))));
        answers.push(Ok(vec![]));
        answers.push(Err(anyhow!("timeout")));
        let rpc = ScriptedRpc::new(answers);
        let config = PollerConfig {
            reset_on_success: false,
            ..PollerConfig::default()
        };

        let err = wait_for_validator(&store, ADDR, &rpc, &config, &mut no_cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Rpc { failures: 11, .. }));
        assert_eq!(rpc.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_the_wait() {
        let store = MemoryStore::new();
        let rpc = ScriptedRpc::new(vec![Ok(vec![validator("ffff")])]);
        let config = PollerConfig {
            deadline: Some(Duration::from_secs(30)),
            ..PollerConfig::default()
        };
        let start = Instant::now();

        let err = wait_for_validator(&store, ADDR, &rpc, &config, &mut no_cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let store = MemoryStore::new();
        let rpc = ScriptedRpc::new(vec![Ok(vec![])]);
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            sleep(Duration::from_millis(7500)).await;
            let _ = tx.send(true);
        });

        let err = wait_for_validator(&store, ADDR, &rpc, &PollerConfig::default(), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::Cancelled));
        assert_eq!(rpc.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_target() {
        let store = MemoryStore::new();
        let rpc = ScriptedRpc::new(vec![Ok(vec![])]);
        let err = wait_for_validator(&store, " ", &rpc, &PollerConfig::default(), &mut no_cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::EmptyTarget));
        assert_eq!(rpc.calls(), 0);
    }
}
