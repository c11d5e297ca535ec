use anyhow::Result;
use std::sync::Arc;

use crate::admin::{AppAdmin, GlitterAdminClient};
use crate::consensus::{ConsensusRpc, TendermintClient};

/// Builds RPC clients from endpoint URLs
pub trait RpcConnector: Send + Sync {
    fn consensus(&self, url: &str) -> Result<Arc<dyn ConsensusRpc>>;
    fn admin(&self, url: &str) -> Result<Arc<dyn AppAdmin>>;
}

/// Connector producing the HTTP clients
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl RpcConnector for HttpConnector {
    fn consensus(&self, url: &str) -> Result<Arc<dyn ConsensusRpc>> {
        Ok(Arc::new(TendermintClient::new(url)?))
    }

    fn admin(&self, url: &str) -> Result<Arc<dyn AppAdmin>> {
        Ok(Arc::new(GlitterAdminClient::new(url)?))
    }
}
