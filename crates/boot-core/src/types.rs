//! Common types used across glitter-boot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A peer locator of the form `identifier@host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddr {
    /// Node identifier (hex digest of the peer's node key)
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl NodeAddr {
    /// `host:port`, with IPv6 hosts bracketed.
    pub fn host_port(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// `http://host:<port>` on this node's host.
    pub fn http_url(&self, port: u16) -> String {
        format!("http://{}", join_host_port(&self.host, port))
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.host_port())
    }
}

impl FromStr for NodeAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            Error::invalid_argument(format!("invalid node address `{}`: {}", s, reason))
        };

        let (id, host_port) = s.split_once('@').ok_or_else(|| invalid("missing `@`"))?;
        if id.is_empty() {
            return Err(invalid("empty node id"));
        }
        if host_port.contains('@') {
            return Err(invalid("more than one `@`"));
        }

        let (host, port) = split_host_port(host_port).ok_or_else(|| invalid("expected host:port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number in 0-65535"))?;

        Ok(Self {
            id: id.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

fn split_host_port(s: &str) -> Option<(&str, &str)> {
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        (host, tail.strip_prefix(':')?)
    } else {
        let (host, port) = s.rsplit_once(':')?;
        if host.contains(':') {
            return None;
        }
        (host, port)
    };

    if host.is_empty() || port.is_empty() {
        return None;
    }
    Some((host, port))
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Parse a comma separated seed list. Entries are trimmed and blank entries
/// dropped; at least one seed is required.
pub fn parse_seeds(raw: &str) -> Result<Vec<NodeAddr>> {
    let seeds = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(NodeAddr::from_str)
        .collect::<Result<Vec<_>>>()?;

    if seeds.is_empty() {
        return Err(Error::invalid_argument(
            "invalid argument seeds: at least provide one seed",
        ));
    }
    Ok(seeds)
}

/// Operating mode of the consensus engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    /// Follows the chain without signing
    Full,
    /// Participates in consensus
    Validator,
}

impl NodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Full => "full",
            NodeMode::Validator => "validator",
        }
    }

    /// Staged engine config file name for this mode
    pub fn engine_config_file(&self) -> &'static str {
        match self {
            NodeMode::Full => "tendermint-full.config.toml",
            NodeMode::Validator => "tendermint-validator.config.toml",
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction indexer backend of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Elasticsearch
    Es,
    /// Embedded key-value
    Kv,
}

impl IndexMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexMode::Es => "es",
            IndexMode::Kv => "kv",
        }
    }
}

impl FromStr for IndexMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "es" => Ok(IndexMode::Es),
            "kv" => Ok(IndexMode::Kv),
            other => Err(Error::invalid_argument(format!(
                "invalid glitter index mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_addr() {
        let addr: NodeAddr = "abc@1.2.3.4:26656".parse().unwrap();
        assert_eq!(addr.id, "abc");
        assert_eq!(addr.host, "1.2.3.4");
        assert_eq!(addr.port, 26656);
        assert_eq!(addr.to_string(), "abc@1.2.3.4:26656");
    }

    #[test]
    fn test_parse_node_addr_ipv6() {
        let addr: NodeAddr = "abc@[::1]:26656".parse().unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.http_url(26657), "http://[::1]:26657");
    }

    #[test]
    fn test_parse_node_addr_rejects_malformed() {
        for bad in [
            "1.2.3.4:26656",
            "@1.2.3.4:26656",
            "abc@1.2.3.4",
            "abc@1.2.3.4:port",
            "abc@:26656",
            "abc@1.2.3.4:99999",
            "a@b@1.2.3.4:26656",
        ] {
            let err = bad.parse::<NodeAddr>().unwrap_err();
            assert!(err.is_validation(), "{} should be a validation error", bad);
        }
    }

    #[test]
    fn test_parse_seeds_trims_entries() {
        let seeds = parse_seeds(" a@1.1.1.1:26656 , b@2.2.2.2:26656,, c@3.3.3.3:1 ").unwrap();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[1].id, "b");
        assert_eq!(seeds[2].port, 1);
    }

    #[test]
    fn test_parse_seeds_requires_one() {
        let err = parse_seeds(" , ").unwrap_err();
        assert!(err.to_string().contains("at least provide one seed"));
    }

    #[test]
    fn test_index_mode() {
        assert_eq!("kv".parse::<IndexMode>().unwrap(), IndexMode::Kv);
        let err = "sql".parse::<IndexMode>().unwrap_err();
        assert!(err.to_string().contains("invalid glitter index mode: sql"));
    }
}
