//! Systemd service management
//!
//! Drives units through `systemctl`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::info;

/// Service manager operations used by the lifecycle pipelines
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn start(&self, unit: &str) -> Result<()>;
    async fn stop(&self, unit: &str) -> Result<()>;
    async fn restart(&self, unit: &str) -> Result<()>;
    async fn daemon_reload(&self) -> Result<()>;
    /// Active state as reported by the service manager (`active`, `inactive`, ...)
    async fn active_status(&self, unit: &str) -> Result<String>;
}

/// `systemctl` backed service manager
#[derive(Debug, Clone)]
pub struct SystemctlManager {
    program: String,
}

impl Default for SystemctlManager {
    fn default() -> Self {
        Self {
            program: "systemctl".to_string(),
        }
    }
}

impl SystemctlManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different executable, e.g. a wrapper script
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn manage_service(&self, action: &str, name: Option<&str>) -> Result<()> {
        let target = name.unwrap_or("");
        info!("Systemd: {} {}", action, target);

        let mut command = tokio::process::Command::new(&self.program);
        command.arg(action);
        if let Some(name) = name {
            command.arg(name);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {} {}", self.program, action))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "Failed to {} service {}: {}",
                action,
                target,
                stderr.trim()
            ));
        }

        info!("Systemd: {} {} complete", action, target);
        Ok(())
    }
}

#[async_trait]
impl ServiceManager for SystemctlManager {
    async fn start(&self, unit: &str) -> Result<()> {
        self.manage_service("start", Some(unit)).await
    }

    async fn stop(&self, unit: &str) -> Result<()> {
        self.manage_service("stop", Some(unit)).await
    }

    async fn restart(&self, unit: &str) -> Result<()> {
        self.manage_service("restart", Some(unit)).await
    }

    async fn daemon_reload(&self) -> Result<()> {
        self.manage_service("daemon-reload", None).await
    }

    async fn active_status(&self, unit: &str) -> Result<String> {
        // `is-active` exits non-zero for inactive units but still prints the state.
        let output = tokio::process::Command::new(&self.program)
            .arg("is-active")
            .arg(unit)
            .output()
            .await
            .with_context(|| format!("Failed to run {} is-active", self.program))?;

        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if state.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Failed to get status for service {}: {}", unit, stderr.trim()));
        }
        Ok(state)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_action_reports_error() {
        let manager = SystemctlManager::with_program("false");
        let err = manager.restart("tendermint").await.unwrap_err();
        assert!(err.to_string().contains("Failed to restart service tendermint"));
    }

    #[tokio::test]
    async fn test_successful_action() {
        let manager = SystemctlManager::with_program("true");
        manager.daemon_reload().await.unwrap();
        manager.stop("glitter").await.unwrap();
    }

    #[tokio::test]
    async fn test_active_status_reads_stdout() {
        // `echo is-active glitter` prints the arguments back.
        let manager = SystemctlManager::with_program("echo");
        assert_eq!(manager.active_status("glitter").await.unwrap(), "is-active glitter");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let manager = SystemctlManager::with_program("/nonexistent/systemctl");
        assert!(manager.start("glitter").await.is_err());
    }
}
