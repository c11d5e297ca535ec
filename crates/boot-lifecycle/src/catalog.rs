//! Operation catalog - the concrete steps the lifecycle pipelines are built from
//!
//! Steps only read and write the [`PipelineContext`] and call collaborators.
//! Every path comes from the context's [`BootConfig`](boot_core::BootConfig).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use boot_core::{parse_seeds, Error as CoreError, IndexMode, NodeMode};
use boot_plugins::fs::{copy_file, make_dirs, remove_tree, set_mode};
use boot_plugins::{FileCopy, Template, TemplateParams, PUB_KEY_TYPE};
use boot_rpc::PubKey;
use boot_state_store::{FileStore, StateStore, StateStoreError};
use boot_workflows::Step;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::{InitArgs, PipelineContext};
use crate::keys;
use crate::poller::{wait_for_validator, PollerConfig};

pub const GENESIS_FILE: &str = "genesis.json";
pub const APP_CONFIG_FILE: &str = "glitter.config.toml";
pub const NODE_KEY_FILE: &str = "node_key.json";
pub const VALIDATOR_KEY_FILE: &str = "priv_validator_key.json";
pub const VALIDATOR_STATE_FILE: &str = "priv_validator_state.json";

/// Power requested for this node when joining the validator set
pub const VALIDATOR_POWER: i64 = 1;

/// Which of the two managed processes a step targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Consensus engine
    Engine,
    /// Application
    App,
}

impl Unit {
    pub fn name(self, ctx: &PipelineContext) -> &str {
        match self {
            Unit::Engine => &ctx.config.engine_service,
            Unit::App => &ctx.config.app_service,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        })
    }
}

/// Validate input, open the store and derive endpoints for `init`.
pub struct Prepare(pub InitArgs);

#[async_trait]
impl Step<PipelineContext> for Prepare {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        ctx.apply_args(&self.0);

        let (user, group) = (ctx.config.user.clone(), ctx.config.group.clone());
        ctx.collaborators
            .host
            .check_user_group(&user, &group)
            .await
            .map_err(|e| anyhow!("failed to get {} user/group: {:#}", user, e))?;

        let store = FileStore::open(&ctx.config.store_path, true)?;
        if store.get(keys::INIT_DONE) == keys::TRUE {
            return Err(CoreError::precondition(format!(
                "node has already been set up; remove {} and rerun the command to reset it",
                ctx.work_dir.display()
            ))
            .into());
        }
        ctx.store = Some(Arc::new(store));

        ctx.seeds = parse_seeds(&ctx.seeds_raw)?;
        let seed = &ctx.seeds[0];
        ctx.cluster_rpc_url = seed.http_url(ctx.config.engine_rpc_port);
        ctx.cluster_app_url = seed.http_url(ctx.config.app_api_port);
        info!(
            cluster_rpc = %ctx.cluster_rpc_url,
            cluster_app = %ctx.cluster_app_url,
            "Using seed {}", seed
        );

        make_dirs(&ctx.work_dir)?;

        let rpc = Arc::clone(&ctx.collaborators.rpc);
        ctx.cluster_rpc = Some(rpc.consensus(&ctx.cluster_rpc_url)?);
        ctx.cluster_admin = Some(rpc.admin(&ctx.cluster_app_url)?);
        ctx.local_rpc = Some(rpc.consensus(&ctx.local_rpc_url)?);
        Ok(())
    }
}

/// Download one of the two node binaries into the working directory.
pub struct DownloadBinary(pub Unit);

#[async_trait]
impl Step<PipelineContext> for DownloadBinary {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let url = match self.0 {
            Unit::Engine => &ctx.engine_binary_url,
            Unit::App => &ctx.app_binary_url,
        };
        let dest = ctx.staged(self.0.name(ctx));
        let bytes = ctx.collaborators.fetcher.download(url, &dest).await?;
        info!(bytes, "Downloaded {}", dest.display());
        Ok(())
    }
}

/// Fetch the genesis document from the seed cluster.
pub struct DownloadGenesis;

#[async_trait]
impl Step<PipelineContext> for DownloadGenesis {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let genesis = ctx.cluster_rpc()?.genesis().await?;
        let dest = ctx.staged(GENESIS_FILE);
        boot_plugins::fs::write_file(&dest, &serde_json::to_vec_pretty(&genesis)?, 0o644)?;
        info!("Saved genesis to {}", dest.display());
        Ok(())
    }
}

pub fn render_app_config(ctx: &mut PipelineContext) -> Result<()> {
    let mode = IndexMode::from_str(&ctx.index_mode)?;
    let params = template_params([
        ("index_mode", json!(mode.as_str())),
        ("api_port", json!(ctx.config.app_api_port)),
        ("app_home", json!(ctx.config.app_home().display().to_string())),
    ]);
    ctx.collaborators
        .templates
        .render_to_file(Template::AppConfig, &params, &ctx.staged(APP_CONFIG_FILE))
}

/// One engine config per operating mode; `start` picks between them.
pub fn render_engine_configs(ctx: &mut PipelineContext) -> Result<()> {
    let seeds = ctx
        .seeds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    for mode in [NodeMode::Full, NodeMode::Validator] {
        let params = template_params([
            ("moniker", json!(ctx.moniker)),
            ("seeds", json!(seeds)),
            ("mode", json!(mode.as_str())),
        ]);
        ctx.collaborators.templates.render_to_file(
            Template::EngineConfig,
            &params,
            &ctx.staged(mode.engine_config_file()),
        )?;
    }
    Ok(())
}

pub fn render_units(ctx: &mut PipelineContext) -> Result<()> {
    let config = &ctx.config;
    let params = template_params([
        ("user", json!(config.user)),
        ("group", json!(config.group)),
        ("engine_bin", json!(path_str(config.bin_dir.join(&config.engine_service)))),
        ("app_bin", json!(path_str(config.bin_dir.join(&config.app_service)))),
        ("engine_home", json!(path_str(config.engine_home()))),
        ("app_home", json!(path_str(config.app_home()))),
    ]);

    for (template, unit) in [(Template::EngineUnit, Unit::Engine), (Template::AppUnit, Unit::App)] {
        let dest = ctx.staged(&format!("{}.service", unit.name(ctx)));
        ctx.collaborators.templates.render_to_file(template, &params, &dest)?;
    }
    Ok(())
}

/// Generate the node key unless one is already staged.
pub fn generate_node_key(ctx: &mut PipelineContext) -> Result<()> {
    let path = ctx.staged(NODE_KEY_FILE);
    let keygen = Arc::clone(&ctx.collaborators.keygen);

    let key = if path.exists() {
        println!("[WARN] Skip generating node key: {} already exists", path.display());
        warn!("Node key {} already exists, keeping it", path.display());
        keygen.load_node_key(&path)?
    } else {
        keygen.generate_node_key(&path)?
    };

    ctx.store()?.set(keys::NODE_ID, &key.node_id)?;
    ctx.node_id = key.node_id;
    Ok(())
}

/// Generate the validator key and signing state unless already staged.
pub fn generate_validator_key(ctx: &mut PipelineContext) -> Result<()> {
    let key_path = ctx.staged(VALIDATOR_KEY_FILE);
    let state_path = ctx.staged(VALIDATOR_STATE_FILE);
    let keygen = Arc::clone(&ctx.collaborators.keygen);

    let key = if key_path.exists() {
        println!(
            "[WARN] Skip generating validator key: {} already exists",
            key_path.display()
        );
        warn!("Validator key {} already exists, keeping it", key_path.display());
        keygen.load_validator_key(&key_path)?
    } else {
        keygen.generate_validator_key(&key_path, &state_path)?
    };

    let store = ctx.store()?;
    store.set(keys::PUB_KEY, &key.pub_key)?;
    store.set(keys::PUB_KEY_ADDRESS, &key.address)?;
    ctx.validator_pub_key = key.pub_key;
    ctx.validator_address = key.address;
    Ok(())
}

/// Staged artifacts and where they are installed. The engine starts in
/// full-node mode.
pub fn install_plan(ctx: &PipelineContext) -> Vec<FileCopy> {
    let config = &ctx.config;
    let engine_config = config.engine_home().join("config");
    let engine_data = config.engine_home().join("data");
    let unit_file = |name: &str| format!("{}.service", name);

    vec![
        FileCopy::new(ctx.staged(NodeMode::Full.engine_config_file()), config.engine_active_config()),
        FileCopy::new(ctx.staged(GENESIS_FILE), engine_config.join(GENESIS_FILE)),
        FileCopy::new(ctx.staged(NODE_KEY_FILE), engine_config.join(NODE_KEY_FILE)),
        FileCopy::new(ctx.staged(VALIDATOR_KEY_FILE), engine_config.join(VALIDATOR_KEY_FILE)),
        FileCopy::new(ctx.staged(VALIDATOR_STATE_FILE), engine_data.join(VALIDATOR_STATE_FILE)),
        FileCopy::new(ctx.staged(APP_CONFIG_FILE), config.app_home().join("config.toml")),
        FileCopy::new(
            ctx.staged(&unit_file(&config.app_service)),
            config.systemd_dir.join(unit_file(&config.app_service)),
        ),
        FileCopy::new(
            ctx.staged(&unit_file(&config.engine_service)),
            config.systemd_dir.join(unit_file(&config.engine_service)),
        ),
        FileCopy::new(ctx.staged(&config.app_service), config.bin_dir.join(&config.app_service)),
        FileCopy::new(
            ctx.staged(&config.engine_service),
            config.bin_dir.join(&config.engine_service),
        ),
    ]
}

/// Stop the node, wipe previous installs and install the staged artifacts.
pub struct ResetAndCopy;

#[async_trait]
impl Step<PipelineContext> for ResetAndCopy {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let config = Arc::clone(&ctx.config);
        let services = Arc::clone(&ctx.collaborators.services);

        for unit in [&config.engine_service, &config.app_service] {
            if let Err(e) = services.stop(unit).await {
                warn!("Ignoring failure to stop {}: {:#}", unit, e);
            }
        }

        let mut wipe: Vec<PathBuf> = vec![config.engine_home(), config.app_home()];
        wipe.extend(config.scratch_dirs.iter().cloned());
        for dir in &wipe {
            remove_tree(dir)?;
        }
        make_dirs(&config.engine_home().join("config"))?;
        make_dirs(&config.engine_home().join("data"))?;
        make_dirs(&config.app_home())?;

        for copy in install_plan(ctx) {
            copy_file(&copy)?;
        }

        let binaries = [
            config.bin_dir.join(&config.app_service),
            config.bin_dir.join(&config.engine_service),
        ];
        for bin in &binaries {
            set_mode(bin, 0o755)?;
        }

        let host = Arc::clone(&ctx.collaborators.host);
        host.chown(&config.install_dir, &config.user, &config.group, true)
            .await?;
        for bin in &binaries {
            host.chown(bin, &config.user, &config.group, false).await?;
        }

        services.daemon_reload().await
    }
}

pub fn save_config(ctx: &mut PipelineContext) -> Result<()> {
    let store = ctx.store()?;
    store.set(keys::SEEDS, &ctx.seeds_raw)?;
    store.set(keys::MONIKER, &ctx.moniker)?;
    store.set(keys::INIT_DONE, keys::TRUE)?;
    Ok(())
}

/// Open the existing store and require a completed `init`.
///
/// `action` completes the message "Please init node first before ...".
pub struct CheckInitialized {
    pub action: Option<&'static str>,
}

impl CheckInitialized {
    fn not_initialized(&self) -> anyhow::Error {
        let msg = match self.action {
            Some(action) => format!("Please init node first before {}", action),
            None => "Please init node first".to_string(),
        };
        CoreError::precondition(msg).into()
    }
}

#[async_trait]
impl Step<PipelineContext> for CheckInitialized {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let store = match FileStore::open(&ctx.config.store_path, false) {
            Ok(store) => store,
            Err(StateStoreError::NotFound(_)) => return Err(self.not_initialized()),
            Err(e) => return Err(e.into()),
        };
        if store.get(keys::INIT_DONE) != keys::TRUE {
            return Err(self.not_initialized());
        }

        ctx.moniker = store.get(keys::MONIKER);
        ctx.seeds_raw = store.get(keys::SEEDS);
        ctx.node_id = store.get(keys::NODE_ID);
        ctx.validator_pub_key = store.get(keys::PUB_KEY);
        ctx.validator_address = store.get(keys::PUB_KEY_ADDRESS);
        ctx.store = Some(Arc::new(store));
        Ok(())
    }
}

pub fn connect_local(ctx: &mut PipelineContext) -> Result<()> {
    ctx.local_rpc = Some(ctx.collaborators.rpc.consensus(&ctx.local_rpc_url)?);
    Ok(())
}

/// Install the staged engine config of `mode` into the active slot.
pub struct SwitchMode(pub NodeMode);

#[async_trait]
impl Step<PipelineContext> for SwitchMode {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let copy = FileCopy::new(
            ctx.staged(self.0.engine_config_file()),
            ctx.config.engine_active_config(),
        );
        copy_file(&copy)?;
        ctx.mode = Some(self.0);
        info!(mode = %self.0, "Activated engine config");
        Ok(())
    }
}

pub struct Service(pub ServiceAction, pub Unit);

#[async_trait]
impl Step<PipelineContext> for Service {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let unit = self.1.name(ctx).to_string();
        let services = &ctx.collaborators.services;
        match self.0 {
            ServiceAction::Start => services.start(&unit).await,
            ServiceAction::Stop => services.stop(&unit).await,
            ServiceAction::Restart => services.restart(&unit).await,
        }
    }
}

/// Ask the seed cluster to add this node's validator key.
pub struct RequestValidatorChange;

#[async_trait]
impl Step<PipelineContext> for RequestValidatorChange {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        if ctx.validator_pub_key.is_empty() {
            return Err(anyhow!("no validator public key; was the validator key generated?"));
        }
        let pub_key = PubKey {
            key_type: PUB_KEY_TYPE.to_string(),
            value: ctx.validator_pub_key.clone(),
        };
        let response = ctx
            .cluster_admin()?
            .update_validator(&pub_key, VALIDATOR_POWER)
            .await?;
        println!("{}", response.trim_end());
        Ok(())
    }
}

/// Block until the local node reports this validator in its set.
pub struct WaitForValidator;

#[async_trait]
impl Step<PipelineContext> for WaitForValidator {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let store = Arc::clone(ctx.store()?);
        let rpc = Arc::clone(ctx.local_rpc()?);
        let mut target = store.get(keys::PUB_KEY_ADDRESS);
        if target.is_empty() {
            target = ctx.validator_address.clone();
        }
        let poller = PollerConfig::from(ctx.config.as_ref());

        wait_for_validator(store.as_ref(), &target, rpc.as_ref(), &poller, &mut ctx.cancel).await?;
        Ok(())
    }
}

/// Render the `show-node-info` report.
pub struct NodeInfo;

#[async_trait]
impl Step<PipelineContext> for NodeInfo {
    async fn run(&self, ctx: &mut PipelineContext) -> Result<()> {
        let entries = ctx.store()?.snapshot();
        let entry = |key: &str| entries.get(key).cloned().unwrap_or_default();
        let config = Arc::clone(&ctx.config);
        let services = Arc::clone(&ctx.collaborators.services);

        let mut statuses = Vec::new();
        for unit in [&config.engine_service, &config.app_service] {
            let status = services.active_status(unit).await.unwrap_or_else(|e| {
                warn!("Failed to query {}: {:#}", unit, e);
                "unknown".to_string()
            });
            statuses.push(status);
        }

        let engine_status = format!("{} Status", capitalize(&config.engine_service));
        let app_status = format!("{} Status", capitalize(&config.app_service));
        let sections: [&[(&str, String)]; 4] = [
            &[
                ("NodeID", entry(keys::NODE_ID)),
                ("Moniker", entry(keys::MONIKER)),
            ],
            &[
                ("PubKey", entry(keys::PUB_KEY)),
                ("Address", entry(keys::PUB_KEY_ADDRESS)),
            ],
            &[
                (engine_status.as_str(), statuses[0].clone()),
                (app_status.as_str(), statuses[1].clone()),
            ],
            &[
                ("PrivateKeyFile", path_str(config.staged(VALIDATOR_KEY_FILE))),
                ("GlitterBootDir", path_str(config.work_dir.clone())),
                ("GlitterDir", path_str(config.app_home())),
            ],
        ];

        let mut report = String::new();
        for section in sections {
            report.push('\n');
            for (label, value) in section {
                report.push_str(&format!("{:<20}{}\n", format!("{}:", label), value));
            }
        }
        println!("{}", report);
        ctx.report = Some(report);
        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn template_params<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> TemplateParams {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn path_str(path: PathBuf) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("tendermint"), "Tendermint");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_service_action_display() {
        assert_eq!(ServiceAction::Restart.to_string(), "restart");
    }
}
