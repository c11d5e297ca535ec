//! Command line surface

use boot_core::NodeMode;
use boot_lifecycle::{InitArgs, Operation};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "glitter-boot")]
#[command(about = "Glitter bootstrap tool", version)]
pub struct Cli {
    /// Log level for glitter-boot crates (overrides RUST_LOG for them)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download binaries, render configs, generate keys and install the node
    Init(NodeArgs),

    /// Start the node as a full node or a validator
    Start {
        #[arg(value_enum)]
        target: StartTarget,
    },

    /// Stop tendermint and glitter
    Stop,

    /// Print node identity and service status
    #[command(name = "show-node-info", alias = "show_node_info")]
    ShowNodeInfo,

    /// Full node manager
    Fullnode {
        #[command(subcommand)]
        command: SetupCommand,
    },

    /// Validator manager
    Validator {
        #[command(subcommand)]
        command: SetupCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SetupCommand {
    /// Init the node and run it
    Setup(NodeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTarget {
    Fullnode,
    Validator,
}

#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Seeds split by ',' e.g. 2e73e0491df978d11f3d928a36b635a4e94ef927@192.167.10.2:26656
    #[arg(long)]
    pub seeds: String,

    /// Moniker for node
    #[arg(long)]
    pub moniker: String,

    /// Index mode, 'es' or 'kv'
    #[arg(long, default_value = "es")]
    pub indexer: String,

    /// Glitter binary URL
    #[arg(long = "glitter_bin_url", alias = "glitter-bin-url")]
    pub glitter_bin_url: Option<String>,

    /// Tendermint binary URL
    #[arg(long = "tendermint_bin_url", alias = "tendermint-bin-url")]
    pub tendermint_bin_url: Option<String>,
}

impl From<NodeArgs> for InitArgs {
    fn from(args: NodeArgs) -> Self {
        InitArgs {
            seeds: args.seeds,
            moniker: args.moniker,
            index_mode: args.indexer,
            app_binary_url: args.glitter_bin_url,
            engine_binary_url: args.tendermint_bin_url,
        }
    }
}

impl Command {
    pub fn into_operation(self) -> Operation {
        match self {
            Command::Init(args) => Operation::Init(args.into()),
            Command::Start {
                target: StartTarget::Fullnode,
            } => Operation::StartFullNode,
            Command::Start {
                target: StartTarget::Validator,
            } => Operation::StartValidator,
            Command::Stop => Operation::Stop,
            Command::ShowNodeInfo => Operation::ShowInfo,
            Command::Fullnode {
                command: SetupCommand::Setup(args),
            } => Operation::Setup {
                args: args.into(),
                mode: NodeMode::Full,
            },
            Command::Validator {
                command: SetupCommand::Setup(args),
            } => Operation::Setup {
                args: args.into(),
                mode: NodeMode::Validator,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Operation {
        Cli::try_parse_from(args).unwrap().command.into_operation()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_init_flags() {
        let op = parse(&[
            "glitter-boot",
            "init",
            "--seeds",
            "abc@10.0.0.1:26656",
            "--moniker",
            "node-1",
            "--tendermint_bin_url",
            "http://dl/tm",
        ]);
        match op {
            Operation::Init(args) => {
                assert_eq!(args.seeds, "abc@10.0.0.1:26656");
                assert_eq!(args.index_mode, "es");
                assert_eq!(args.engine_binary_url.as_deref(), Some("http://dl/tm"));
                assert_eq!(args.app_binary_url, None);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_init_requires_seeds_and_moniker() {
        assert!(Cli::try_parse_from(["glitter-boot", "init", "--moniker", "m"]).is_err());
        assert!(Cli::try_parse_from(["glitter-boot", "init", "--seeds", "a@b:1"]).is_err());
    }

    #[test]
    fn test_start_targets() {
        assert!(matches!(
            parse(&["glitter-boot", "start", "fullnode"]),
            Operation::StartFullNode
        ));
        assert!(matches!(
            parse(&["glitter-boot", "start", "validator"]),
            Operation::StartValidator
        ));
        assert!(Cli::try_parse_from(["glitter-boot", "start", "archive"]).is_err());
    }

    #[test]
    fn test_show_node_info_alias() {
        assert!(matches!(
            parse(&["glitter-boot", "show_node_info"]),
            Operation::ShowInfo
        ));
        assert!(matches!(
            parse(&["glitter-boot", "--log-level", "debug", "show-node-info"]),
            Operation::ShowInfo
        ));
    }

    #[test]
    fn test_validator_setup() {
        let op = parse(&[
            "glitter-boot",
            "validator",
            "setup",
            "--seeds",
            "abc@10.0.0.1:26656",
            "--moniker",
            "node-1",
            "--indexer",
            "kv",
        ]);
        assert!(matches!(
            op,
            Operation::Setup {
                mode: NodeMode::Validator,
                ..
            }
        ));
    }
}
