pub mod cli;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

// Make test_support available for integration tests
pub mod test_support;

pub use domain::{
    ContainerRuntime, ContainerSet, ContainerState, Credentials, DeploymentConfig, HealthReport,
    ImageReference, RegistryClient, StopOutcome, WaitPolicy,
};
pub use error::DeployError;
pub use infra::{DockerAdapter, EcrRegistry};
pub use services::{
    ContainerLifecycleManager, DeployRun, HealthValidator, Pipeline, RegistryAuthenticator,
};
