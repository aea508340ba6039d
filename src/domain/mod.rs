pub mod config;
mod container;
mod health;
pub mod traits;
mod wait;

pub use config::{Credentials, DeploymentConfig, ImageReference};
pub use container::{
    ContainerSet, ContainerState, ContainerStatus, SetPhase, StopOutcome, StopSummary,
    render_status_table,
};
pub use health::{HealthOutcome, HealthReport, ServiceHealth};
pub use traits::{ContainerRuntime, Presence, RegistryClient};
pub use wait::{MIN_INTERVAL, WaitPolicy};
