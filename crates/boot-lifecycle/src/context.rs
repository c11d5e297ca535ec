//! Pipeline context - per-operation state shared by the lifecycle steps

use anyhow::{anyhow, Result};
use boot_core::{BootConfig, NodeAddr, NodeMode};
use boot_plugins::{
    ArtifactFetcher, Ed25519KeyGenerator, HostAccess, HttpFetcher, KeyGenerator, ServiceManager,
    SystemHost, SystemctlManager, TemplateRenderer,
};
use boot_rpc::{AppAdmin, ConsensusRpc, HttpConnector, RpcConnector};
use boot_state_store::StateStore;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Host-facing services used by the steps
#[derive(Clone)]
pub struct Collaborators {
    pub services: Arc<dyn ServiceManager>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub keygen: Arc<dyn KeyGenerator>,
    pub host: Arc<dyn HostAccess>,
    pub rpc: Arc<dyn RpcConnector>,
    pub templates: TemplateRenderer,
}

impl Collaborators {
    /// Real implementations: systemctl, HTTP, OS randomness, getent/chown.
    pub fn system() -> Result<Self> {
        Ok(Self {
            services: Arc::new(SystemctlManager::new()),
            fetcher: Arc::new(HttpFetcher::new()?),
            keygen: Arc::new(Ed25519KeyGenerator),
            host: Arc::new(SystemHost),
            rpc: Arc::new(HttpConnector),
            templates: TemplateRenderer::new(),
        })
    }
}

/// Operator input for `init` and `setup`
#[derive(Debug, Clone, Default)]
pub struct InitArgs {
    /// Comma separated `id@host:port` list
    pub seeds: String,
    pub moniker: String,
    /// `es` or `kv`
    pub index_mode: String,
    pub app_binary_url: Option<String>,
    pub engine_binary_url: Option<String>,
}

/// State of one lifecycle operation, owned by its pipeline
pub struct PipelineContext {
    pub config: Arc<BootConfig>,
    pub collaborators: Collaborators,
    pub cancel: watch::Receiver<bool>,

    pub work_dir: PathBuf,
    pub mode: Option<NodeMode>,

    pub seeds_raw: String,
    pub seeds: Vec<NodeAddr>,
    pub moniker: String,
    pub index_mode: String,
    pub engine_binary_url: String,
    pub app_binary_url: String,

    /// Consensus RPC of the first seed
    pub cluster_rpc_url: String,
    /// Application API of the first seed
    pub cluster_app_url: String,
    pub local_rpc_url: String,

    pub cluster_rpc: Option<Arc<dyn ConsensusRpc>>,
    pub cluster_admin: Option<Arc<dyn AppAdmin>>,
    pub local_rpc: Option<Arc<dyn ConsensusRpc>>,

    pub store: Option<Arc<dyn StateStore>>,

    pub node_id: String,
    pub validator_address: String,
    /// Base64 validator public key
    pub validator_pub_key: String,

    /// Rendered `show-node-info` report
    pub report: Option<String>,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("work_dir", &self.work_dir)
            .field("mode", &self.mode)
            .field("seeds", &self.seeds)
            .field("moniker", &self.moniker)
            .field("index_mode", &self.index_mode)
            .field("cluster_rpc_url", &self.cluster_rpc_url)
            .field("cluster_app_url", &self.cluster_app_url)
            .field("local_rpc_url", &self.local_rpc_url)
            .field("node_id", &self.node_id)
            .field("validator_address", &self.validator_address)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    pub fn new(
        config: Arc<BootConfig>,
        collaborators: Collaborators,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            local_rpc_url: config.local_rpc_url.clone(),
            config,
            collaborators,
            cancel,
            mode: None,
            seeds_raw: String::new(),
            seeds: Vec::new(),
            moniker: String::new(),
            index_mode: String::new(),
            engine_binary_url: String::new(),
            app_binary_url: String::new(),
            cluster_rpc_url: String::new(),
            cluster_app_url: String::new(),
            cluster_rpc: None,
            cluster_admin: None,
            local_rpc: None,
            store: None,
            node_id: String::new(),
            validator_address: String::new(),
            validator_pub_key: String::new(),
            report: None,
        }
    }

    /// Copy operator input into the context.
    pub fn apply_args(&mut self, args: &InitArgs) {
        self.seeds_raw = args.seeds.clone();
        self.moniker = args.moniker.clone();
        self.index_mode = args.index_mode.clone();
        self.engine_binary_url = args
            .engine_binary_url
            .clone()
            .unwrap_or_else(|| self.config.engine_binary_url.clone());
        self.app_binary_url = args
            .app_binary_url
            .clone()
            .unwrap_or_else(|| self.config.app_binary_url.clone());
    }

    pub fn store(&self) -> Result<&Arc<dyn StateStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| anyhow!("state store is not open"))
    }

    pub fn cluster_rpc(&self) -> Result<&Arc<dyn ConsensusRpc>> {
        self.cluster_rpc
            .as_ref()
            .ok_or_else(|| anyhow!("no consensus RPC client for the seed cluster"))
    }

    pub fn cluster_admin(&self) -> Result<&Arc<dyn AppAdmin>> {
        self.cluster_admin
            .as_ref()
            .ok_or_else(|| anyhow!("no admin client for the seed cluster"))
    }

    pub fn local_rpc(&self) -> Result<&Arc<dyn ConsensusRpc>> {
        self.local_rpc
            .as_ref()
            .ok_or_else(|| anyhow!("no consensus RPC client for the local node"))
    }

    /// File inside the working directory
    pub fn staged(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}
