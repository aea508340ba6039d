use super::{ContainerStatus, Credentials, DeploymentConfig};
use anyhow::Result;
use std::fmt::Debug;
use std::path::Path;

/// Whether the container an operation targeted existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Found,
    Missing,
}

/// Trait for container runtime operations
pub trait ContainerRuntime: Send + Sync + Debug {
    /// List every container known to the runtime, running or not
    fn list_containers(&self) -> Result<Vec<ContainerStatus>>;

    /// Stop a container. Returns `Presence::Missing` when it does not exist.
    fn stop_container(&self, name: &str) -> Result<Presence>;

    /// Remove a container
    fn remove_container(&self, name: &str) -> Result<Presence>;

    /// Pull an image with the given registry credentials
    fn pull_image(&self, image: &str, credentials: &Credentials) -> Result<()>;

    /// Remove dangling images left behind by previous deploys
    fn prune_images(&self) -> Result<()>;

    /// Bring up every service of a compose definition, detached
    fn compose_up(
        &self,
        compose_file: &Path,
        project: Option<&str>,
        env: &DeploymentConfig,
        image: &str,
    ) -> Result<()>;

    /// Last `lines` lines of a container's logs
    fn logs_tail(&self, name: &str, lines: usize) -> Result<String>;
}

/// Trait for registry credential exchange
pub trait RegistryClient: Send + Sync + Debug {
    /// Exchange account and region for pull credentials
    fn login(&self, account_id: &str, region: &str) -> Result<Credentials>;
}
