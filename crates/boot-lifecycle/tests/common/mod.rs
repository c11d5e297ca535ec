//! Fake collaborators and a sandboxed harness for lifecycle tests

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use boot_core::BootConfig;
use boot_lifecycle::{Collaborators, Dispatcher, InitArgs};
use boot_plugins::{ArtifactFetcher, Ed25519KeyGenerator, HostAccess, ServiceManager, TemplateRenderer};
use boot_rpc::{AppAdmin, ConsensusRpc, PubKey, RpcConnector, ValidatorInfo};
use boot_state_store::FileStore;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const BINARY: &[u8] = b"#!/bin/sh\nexit 0\n";

#[derive(Default)]
pub struct FakeServices {
    calls: Mutex<Vec<String>>,
    fail_stop: AtomicBool,
}

impl FakeServices {
    /// Make every `stop` fail, as for a unit that is not installed yet.
    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ServiceManager for FakeServices {
    async fn start(&self, unit: &str) -> Result<()> {
        self.record(format!("start {}", unit));
        Ok(())
    }

    async fn stop(&self, unit: &str) -> Result<()> {
        self.record(format!("stop {}", unit));
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(anyhow!("Failed to stop service {}: Unit {}.service not loaded.", unit, unit));
        }
        Ok(())
    }

    async fn restart(&self, unit: &str) -> Result<()> {
        self.record(format!("restart {}", unit));
        Ok(())
    }

    async fn daemon_reload(&self) -> Result<()> {
        self.record("daemon-reload".to_string());
        Ok(())
    }

    async fn active_status(&self, _unit: &str) -> Result<String> {
        Ok("active".to_string())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if url.is_empty() {
            return Err(boot_core::Error::invalid_argument("empty download URL").into());
        }
        self.urls.lock().unwrap().push(url.to_string());
        std::fs::write(dest, BINARY)?;
        Ok(BINARY.len() as u64)
    }
}

#[derive(Default)]
pub struct FakeHost {
    chowns: Mutex<Vec<PathBuf>>,
}

impl FakeHost {
    pub fn chowns(&self) -> Vec<PathBuf> {
        self.chowns.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostAccess for FakeHost {
    async fn check_user_group(&self, _user: &str, _group: &str) -> Result<()> {
        Ok(())
    }

    async fn chown(&self, path: &Path, _user: &str, _group: &str, _recursive: bool) -> Result<()> {
        self.chowns.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Consensus node whose validator set contains this node once its staged
/// validator key exists and `joined` is set.
pub struct FakeConsensus {
    key_file: PathBuf,
    joined: Mutex<bool>,
    validator_calls: Mutex<u32>,
}

impl FakeConsensus {
    pub fn set_joined(&self, joined: bool) {
        *self.joined.lock().unwrap() = joined;
    }

    pub fn validator_calls(&self) -> u32 {
        *self.validator_calls.lock().unwrap()
    }
}

#[async_trait]
impl ConsensusRpc for FakeConsensus {
    async fn genesis(&self) -> Result<Value> {
        Ok(json!({ "chain_id": "glitter-test", "validators": [] }))
    }

    async fn validators(&self) -> Result<Vec<ValidatorInfo>> {
        *self.validator_calls.lock().unwrap() += 1;
        let mut set = vec![ValidatorInfo {
            address: "B5D1B5E1B0C1A0F3E2D7C9A3B3D1F0E4C2A1B0D9".to_string(),
            pub_key: PubKey {
                key_type: "tendermint/PubKeyEd25519".to_string(),
                value: "AAAA".to_string(),
            },
            voting_power: "10".to_string(),
        }];

        if *self.joined.lock().unwrap() {
            let raw: Value = serde_json::from_slice(&std::fs::read(&self.key_file)?)?;
            let address = raw["address"]
                .as_str()
                .ok_or_else(|| anyhow!("key file has no address"))?;
            set.push(ValidatorInfo {
                address: address.to_string(),
                pub_key: serde_json::from_value(raw["pub_key"].clone())?,
                voting_power: "1".to_string(),
            });
        }
        Ok(set)
    }
}

/// Admin endpoint that records requests and marks the node as joined.
pub struct FakeAdmin {
    consensus: Arc<FakeConsensus>,
    requests: Mutex<Vec<(PubKey, i64)>>,
}

impl FakeAdmin {
    pub fn requests(&self) -> Vec<(PubKey, i64)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppAdmin for FakeAdmin {
    async fn update_validator(&self, pub_key: &PubKey, power: i64) -> Result<String> {
        self.requests.lock().unwrap().push((pub_key.clone(), power));
        self.consensus.set_joined(true);
        Ok("{\"code\":0}".to_string())
    }
}

pub struct FakeConnector {
    consensus: Arc<FakeConsensus>,
    admin: Arc<FakeAdmin>,
    urls: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl RpcConnector for FakeConnector {
    fn consensus(&self, url: &str) -> Result<Arc<dyn ConsensusRpc>> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.consensus.clone() as Arc<dyn ConsensusRpc>)
    }

    fn admin(&self, url: &str) -> Result<Arc<dyn AppAdmin>> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.admin.clone() as Arc<dyn AppAdmin>)
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub config: BootConfig,
    pub services: Arc<FakeServices>,
    pub fetcher: Arc<FakeFetcher>,
    pub host: Arc<FakeHost>,
    pub consensus: Arc<FakeConsensus>,
    pub admin: Arc<FakeAdmin>,
    pub connector: Arc<FakeConnector>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = BootConfig::sandboxed(dir.path());

        let consensus = Arc::new(FakeConsensus {
            key_file: config.staged("priv_validator_key.json"),
            joined: Mutex::new(false),
            validator_calls: Mutex::new(0),
        });
        let admin = Arc::new(FakeAdmin {
            consensus: consensus.clone(),
            requests: Mutex::new(Vec::new()),
        });
        let connector = Arc::new(FakeConnector {
            consensus: consensus.clone(),
            admin: admin.clone(),
            urls: Mutex::new(Vec::new()),
        });

        Self {
            dir,
            config,
            services: Arc::new(FakeServices::default()),
            fetcher: Arc::new(FakeFetcher::default()),
            host: Arc::new(FakeHost::default()),
            consensus,
            admin,
            connector,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            services: self.services.clone(),
            fetcher: self.fetcher.clone(),
            keygen: Arc::new(Ed25519KeyGenerator),
            host: self.host.clone(),
            rpc: self.connector.clone(),
            templates: TemplateRenderer::new(),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.config.clone(), self.collaborators())
    }

    pub fn store(&self) -> FileStore {
        FileStore::open(&self.config.store_path, false).unwrap()
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

pub fn init_args() -> InitArgs {
    InitArgs {
        seeds: " 3a9f0c1e@10.0.0.1:26656 , 77bd21aa@10.0.0.2:26656".to_string(),
        moniker: "node-1".to_string(),
        index_mode: "kv".to_string(),
        app_binary_url: Some("http://dl.test/glitter".to_string()),
        engine_binary_url: Some("http://dl.test/tendermint".to_string()),
    }
}
