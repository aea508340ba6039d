mod health;
mod lifecycle;
mod pipeline;
mod registry_service;

pub use health::HealthValidator;
pub use lifecycle::ContainerLifecycleManager;
pub use pipeline::{DeployRun, Pipeline};
pub use registry_service::RegistryAuthenticator;
