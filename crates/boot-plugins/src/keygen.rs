//! Node and validator key material
//!
//! Keys are Ed25519 and written in the JSON layout the consensus engine
//! loads: `node_key.json`, `priv_validator_key.json` and
//! `priv_validator_state.json`.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use crate::fs::write_file;

pub const PUB_KEY_TYPE: &str = "tendermint/PubKeyEd25519";
pub const PRIV_KEY_TYPE: &str = "tendermint/PrivKeyEd25519";

const ADDRESS_LEN: usize = 20;
const KEY_FILE_MODE: u32 = 0o600;

#[derive(Debug, Serialize, Deserialize)]
struct TypedKey {
    #[serde(rename = "type")]
    key_type: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeKeyFile {
    priv_key: TypedKey,
}

#[derive(Debug, Serialize, Deserialize)]
struct ValidatorKeyFile {
    address: String,
    pub_key: TypedKey,
    priv_key: TypedKey,
}

#[derive(Debug, Serialize)]
struct ValidatorStateFile {
    height: String,
    round: i32,
    step: i8,
}

/// Identity derived from a node key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKeyInfo {
    /// Lower-case hex node id used in peer addresses
    pub node_id: String,
}

/// Identity derived from a validator key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorKeyInfo {
    /// Upper-case hex address as reported in the validator set
    pub address: String,
    /// Base64 of the raw 32-byte public key
    pub pub_key: String,
}

/// Produces and reads node identity files
pub trait KeyGenerator: Send + Sync {
    fn generate_node_key(&self, path: &Path) -> Result<NodeKeyInfo>;
    fn load_node_key(&self, path: &Path) -> Result<NodeKeyInfo>;
    fn generate_validator_key(&self, key_path: &Path, state_path: &Path) -> Result<ValidatorKeyInfo>;
    fn load_validator_key(&self, key_path: &Path) -> Result<ValidatorKeyInfo>;
}

/// Ed25519 keys from the OS random source
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519KeyGenerator;

impl KeyGenerator for Ed25519KeyGenerator {
    fn generate_node_key(&self, path: &Path) -> Result<NodeKeyInfo> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let file = NodeKeyFile {
            priv_key: private_key(&signing_key),
        };
        write_file(path, &serde_json::to_vec(&file)?, KEY_FILE_MODE)?;

        let node_id = hex::encode(address_bytes(&signing_key.verifying_key()));
        info!(node_id = %node_id, "Generated node key {}", path.display());
        Ok(NodeKeyInfo { node_id })
    }

    fn load_node_key(&self, path: &Path) -> Result<NodeKeyInfo> {
        let file: NodeKeyFile = read_json(path)?;
        let signing_key = decode_private_key(&file.priv_key)
            .with_context(|| format!("Invalid node key {}", path.display()))?;
        Ok(NodeKeyInfo {
            node_id: hex::encode(address_bytes(&signing_key.verifying_key())),
        })
    }

    fn generate_validator_key(&self, key_path: &Path, state_path: &Path) -> Result<ValidatorKeyInfo> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let info = validator_info(&signing_key.verifying_key());

        let key_file = ValidatorKeyFile {
            address: info.address.clone(),
            pub_key: TypedKey {
                key_type: PUB_KEY_TYPE.to_string(),
                value: info.pub_key.clone(),
            },
            priv_key: private_key(&signing_key),
        };
        write_file(key_path, &serde_json::to_vec(&key_file)?, KEY_FILE_MODE)?;

        let state = ValidatorStateFile {
            height: "0".to_string(),
            round: 0,
            step: 0,
        };
        write_file(state_path, &serde_json::to_vec(&state)?, KEY_FILE_MODE)?;

        info!(address = %info.address, "Generated validator key {}", key_path.display());
        Ok(info)
    }

    fn load_validator_key(&self, key_path: &Path) -> Result<ValidatorKeyInfo> {
        let file: ValidatorKeyFile = read_json(key_path)?;
        let signing_key = decode_private_key(&file.priv_key)
            .with_context(|| format!("Invalid validator key {}", key_path.display()))?;
        Ok(validator_info(&signing_key.verifying_key()))
    }
}

fn validator_info(verifying_key: &VerifyingKey) -> ValidatorKeyInfo {
    ValidatorKeyInfo {
        address: hex::encode_upper(address_bytes(verifying_key)),
        pub_key: BASE64.encode(verifying_key.to_bytes()),
    }
}

/// First 20 bytes of SHA-256 over the raw public key
fn address_bytes(verifying_key: &VerifyingKey) -> [u8; ADDRESS_LEN] {
    let digest = Sha256::digest(verifying_key.to_bytes());
    let mut out = [0u8; ADDRESS_LEN];
    out.copy_from_slice(&digest[..ADDRESS_LEN]);
    out
}

/// Private key as seed followed by public key, 64 bytes
fn private_key(signing_key: &SigningKey) -> TypedKey {
    TypedKey {
        key_type: PRIV_KEY_TYPE.to_string(),
        value: BASE64.encode(signing_key.to_keypair_bytes()),
    }
}

fn decode_private_key(key: &TypedKey) -> Result<SigningKey> {
    if key.key_type != PRIV_KEY_TYPE {
        return Err(anyhow!("unsupported key type `{}`", key.key_type));
    }
    let raw = BASE64.decode(&key.value).context("private key is not base64")?;
    let bytes: [u8; 64] = raw
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("private key must be 64 bytes, got {}", raw.len()))?;
    SigningKey::from_keypair_bytes(&bytes).map_err(|e| anyhow!("corrupt private key: {}", e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("Failed to parse {}", path.display()))
}
