//! Host account lookups and ownership changes

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

#[async_trait]
pub trait HostAccess: Send + Sync {
    /// Fail unless both the user and the group exist on this host.
    async fn check_user_group(&self, user: &str, group: &str) -> Result<()>;
    async fn chown(&self, path: &Path, user: &str, group: &str, recursive: bool) -> Result<()>;
}

/// Uses `getent` and `chown` from the host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    async fn getent(database: &str, name: &str) -> Result<()> {
        let output = tokio::process::Command::new("getent")
            .arg(database)
            .arg(name)
            .output()
            .await
            .context("Failed to run getent")?;

        if !output.status.success() {
            return Err(anyhow!("unknown {} `{}`", database_label(database), name));
        }
        debug!("Found {} {}", database_label(database), name);
        Ok(())
    }
}

fn database_label(database: &str) -> &str {
    match database {
        "passwd" => "user",
        other => other,
    }
}

#[async_trait]
impl HostAccess for SystemHost {
    async fn check_user_group(&self, user: &str, group: &str) -> Result<()> {
        Self::getent("passwd", user).await?;
        Self::getent("group", group).await
    }

    async fn chown(&self, path: &Path, user: &str, group: &str, recursive: bool) -> Result<()> {
        let mut command = tokio::process::Command::new("chown");
        if recursive {
            command.arg("-R");
        }
        command.arg(format!("{}:{}", user, group)).arg(path);

        let output = command.output().await.context("Failed to run chown")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "Failed to chown {}:{} {}: {}",
                user,
                group,
                path.display(),
                stderr.trim()
            ));
        }

        info!("Changed owner of {} to {}:{}", path.display(), user, group);
        Ok(())
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_user_and_group_exist() {
        SystemHost.check_user_group("root", "root").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let err = SystemHost
            .check_user_group("no-such-user-glitter-boot", "root")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown user `no-such-user-glitter-boot`");
    }
}
