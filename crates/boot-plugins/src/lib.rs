//! Host collaborators for glitter-boot
//!
//! Each module wraps one external capability behind a narrow contract so the
//! lifecycle steps stay thin and tests can substitute fakes:
//!
//! - `systemd`: service start/stop/restart, daemon-reload, active status
//! - `download`: fetch release binaries over HTTP
//! - `template`: render embedded config and unit templates
//! - `keygen`: Ed25519 node and validator key material
//! - `host`: user/group lookup and ownership changes
//! - `fs`: copy, remove, mkdir and chmod helpers

pub mod download;
pub mod fs;
pub mod host;
pub mod keygen;
pub mod systemd;
pub mod template;

pub use download::{ArtifactFetcher, HttpFetcher};
pub use fs::FileCopy;
pub use host::{HostAccess, SystemHost};
pub use keygen::{Ed25519KeyGenerator, KeyGenerator, NodeKeyInfo, ValidatorKeyInfo, PUB_KEY_TYPE};
pub use systemd::{ServiceManager, SystemctlManager};
pub use template::{Template, TemplateParams, TemplateRenderer};
