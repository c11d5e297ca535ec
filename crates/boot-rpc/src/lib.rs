//! boot-rpc: clients for the node's remote collaborators
//!
//! - `consensus`: Tendermint JSON-RPC (genesis, validator set)
//! - `admin`: application admin API (validator change requests)
//! - `connector`: builds clients from endpoint URLs

pub mod admin;
pub mod connector;
pub mod consensus;
pub mod jsonrpc;

pub use admin::{AppAdmin, GlitterAdminClient};
pub use connector::{HttpConnector, RpcConnector};
pub use consensus::{ConsensusRpc, PubKey, TendermintClient, ValidatorInfo};
