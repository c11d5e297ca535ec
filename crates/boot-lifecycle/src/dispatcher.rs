//! Lifecycle dispatcher - maps an operation to its pipeline and reports the outcome

use boot_core::{BootConfig, NodeMode};
use boot_workflows::{Pipeline, PipelineError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::catalog::{
    connect_local, generate_node_key, generate_validator_key, render_app_config,
    render_engine_configs, render_units, save_config, CheckInitialized, DownloadBinary,
    DownloadGenesis, NodeInfo, Prepare, RequestValidatorChange, ResetAndCopy, Service,
    ServiceAction, SwitchMode, Unit, WaitForValidator,
};
use crate::context::{Collaborators, InitArgs, PipelineContext};

/// A lifecycle operation requested by the operator
#[derive(Debug, Clone)]
pub enum Operation {
    /// Download, render, generate keys and install; services are not started
    Init(InitArgs),
    /// `Init`, then start the node; in validator mode also join the validator set
    Setup { args: InitArgs, mode: NodeMode },
    StartFullNode,
    StartValidator,
    Stop,
    ShowInfo,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Init(_) => "init",
            Operation::Setup { mode: NodeMode::Full, .. } => "fullnode-setup",
            Operation::Setup { mode: NodeMode::Validator, .. } => "validator-setup",
            Operation::StartFullNode => "start-fullnode",
            Operation::StartValidator => "start-validator",
            Operation::Stop => "stop",
            Operation::ShowInfo => "show-node-info",
        }
    }

    fn success_message(&self) -> Option<&'static str> {
        match self {
            Operation::Init(_) => Some("Init node successfully"),
            Operation::Setup { mode: NodeMode::Full, .. } => Some("Setup fullnode successfully"),
            Operation::Setup { mode: NodeMode::Validator, .. } => {
                Some("Setup validator successfully")
            }
            Operation::StartFullNode => Some("Start fullnode successfully"),
            Operation::StartValidator => Some("Start validator successfully"),
            Operation::Stop => Some("Stop node successfully"),
            Operation::ShowInfo => None,
        }
    }

    fn failure_hint(&self) -> Option<&'static str> {
        match self {
            Operation::ShowInfo => Some("Did you initialize the node?"),
            _ => None,
        }
    }
}

pub struct Dispatcher {
    config: Arc<BootConfig>,
    collaborators: Collaborators,
    cancel: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(config: BootConfig, collaborators: Collaborators) -> Self {
        // The sender is dropped right away, so this receiver never cancels.
        let (_, cancel) = watch::channel(false);
        Self {
            config: Arc::new(config),
            collaborators,
            cancel,
        }
    }

    /// Abort long waits once `true` is sent on `cancel`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Run `op` and print its outcome.
    pub async fn execute(&self, op: Operation) -> Result<(), PipelineError> {
        match self.run(&op).await {
            Ok(_) => {
                if let Some(msg) = op.success_message() {
                    println!("{}", msg);
                }
                Ok(())
            }
            Err(err) => {
                println!("{}", err);
                if let Some(hint) = op.failure_hint() {
                    println!("{}", hint);
                }
                Err(err)
            }
        }
    }

    /// Run the pipeline of `op`, returning its final context.
    pub async fn run(&self, op: &Operation) -> Result<PipelineContext, PipelineError> {
        info!(operation = op.name(), "Running lifecycle operation");
        let ctx = PipelineContext::new(
            Arc::clone(&self.config),
            self.collaborators.clone(),
            self.cancel.clone(),
        );
        let mut p = Pipeline::new(op.name(), ctx);

        match op {
            Operation::Init(args) => {
                init_steps(&mut p, args).await;
            }
            Operation::Setup { args, mode } => {
                init_steps(&mut p, args).await;
                p.append("Start tendermint", Service(ServiceAction::Start, Unit::Engine))
                    .await
                    .append("Start glitter", Service(ServiceAction::Start, Unit::App))
                    .await;
                if *mode == NodeMode::Validator {
                    p.append("Make validator change", RequestValidatorChange)
                        .await
                        .append("Waiting to receive a validator change event...", WaitForValidator)
                        .await
                        .append("Switch to validator mode", SwitchMode(NodeMode::Validator))
                        .await
                        .append("Restart tendermint", Service(ServiceAction::Restart, Unit::Engine))
                        .await;
                }
            }
            Operation::StartFullNode => {
                p.append(
                    "Check",
                    CheckInitialized {
                        action: Some("start the fullnode"),
                    },
                )
                .await
                .append("Switch to fullnode mode", SwitchMode(NodeMode::Full))
                .await
                .append("Restart tendermint", Service(ServiceAction::Restart, Unit::Engine))
                .await
                .append("Restart glitter", Service(ServiceAction::Restart, Unit::App))
                .await;
            }
            Operation::StartValidator => {
                p.append(
                    "Prepare",
                    CheckInitialized {
                        action: Some("start the validator"),
                    },
                )
                .await
                .append_fn("Connect local node", connect_local)
                .await
                .append("Waiting to receive a validator change event...", WaitForValidator)
                .await
                .append("Switch to validator mode", SwitchMode(NodeMode::Validator))
                .await
                .append("Restart tendermint", Service(ServiceAction::Restart, Unit::Engine))
                .await
                .append("Restart glitter", Service(ServiceAction::Restart, Unit::App))
                .await;
            }
            Operation::Stop => {
                p.append("Check", CheckInitialized { action: Some("stop") })
                    .await
                    .append("Stop tendermint", Service(ServiceAction::Stop, Unit::Engine))
                    .await
                    .append("Stop glitter", Service(ServiceAction::Stop, Unit::App))
                    .await;
            }
            Operation::ShowInfo => {
                p.append("Check", CheckInitialized { action: None })
                    .await
                    .append("Node Info", NodeInfo)
                    .await;
            }
        }

        p.result()
    }
}

async fn init_steps(p: &mut Pipeline<PipelineContext>, args: &InitArgs) {
    p.append("Prepare", Prepare(args.clone()))
        .await
        .append("Download tendermint", DownloadBinary(Unit::Engine))
        .await
        .append("Download glitter", DownloadBinary(Unit::App))
        .await
        .append("Download genesis file", DownloadGenesis)
        .await
        .append_fn("Render glitter config", render_app_config)
        .await
        .append_fn("Render tendermint config", render_engine_configs)
        .await
        .append_fn("Render systemctl config", render_units)
        .await
        .append_fn("Generate nodekey files", generate_node_key)
        .await
        .append_fn("Generate validator key files", generate_validator_key)
        .await
        .append("Reset and copy files", ResetAndCopy)
        .await
        .append_fn("Save config", save_config)
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_show_info_has_failure_hint() {
        assert_eq!(
            Operation::ShowInfo.failure_hint(),
            Some("Did you initialize the node?")
        );
        for op in [
            Operation::Init(InitArgs::default()),
            Operation::StartFullNode,
            Operation::StartValidator,
            Operation::Stop,
        ] {
            assert_eq!(op.failure_hint(), None, "{}", op.name());
        }
    }

    #[test]
    fn test_success_messages() {
        let setup = Operation::Setup {
            args: InitArgs::default(),
            mode: NodeMode::Validator,
        };
        assert_eq!(setup.name(), "validator-setup");
        assert_eq!(setup.success_message(), Some("Setup validator successfully"));
        assert_eq!(
            Operation::Init(InitArgs::default()).success_message(),
            Some("Init node successfully")
        );
        assert_eq!(Operation::ShowInfo.success_message(), None);
    }
}
