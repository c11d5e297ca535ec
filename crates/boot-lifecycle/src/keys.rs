//! State store key vocabulary

pub const SEEDS: &str = "seeds";
pub const MONIKER: &str = "moniker";
pub const NODE_ID: &str = "node_id";
/// Base64 validator public key
pub const PUB_KEY: &str = "pub_key";
/// Upper-case hex validator address
pub const PUB_KEY_ADDRESS: &str = "pub_key_address";
/// `"true"` once init completed
pub const INIT_DONE: &str = "init_done";
/// `"ok"` once the node was seen in the validator set
pub const VALIDATOR_STAGE: &str = "validator_stage";

pub const TRUE: &str = "true";
pub const STAGE_OK: &str = "ok";
