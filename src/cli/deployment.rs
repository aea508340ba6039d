use crate::domain::{ContainerRuntime, RegistryClient};
use crate::infra::config::{DeploySettings, load_settings};
use crate::infra::{CommandRunner, DockerAdapter, EcrRegistry};
use crate::services::{ContainerLifecycleManager, HealthValidator, Pipeline, RegistryAuthenticator};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A pipeline built from the settings of one deploy directory.
pub struct Deployment {
    pipeline: Pipeline,
}

impl Deployment {
    pub fn new(deploy_dir: &Path) -> Result<Self> {
        let settings = load_settings(deploy_dir)?;
        let runner = CommandRunner::new(settings.transcript.clone());
        let runtime = Arc::new(DockerAdapter::new(
            settings.runtime_binary.clone(),
            runner.clone(),
        ));
        let registry = Arc::new(EcrRegistry::new(settings.aws_binary.clone(), runner));

        Self::from_settings(settings, runtime, registry)
    }

    /// Same as `new`, with the runtime and registry supplied by the caller.
    pub fn with_runtime(
        deploy_dir: &Path,
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<dyn RegistryClient>,
    ) -> Result<Self> {
        Self::from_settings(load_settings(deploy_dir)?, runtime, registry)
    }

    fn from_settings(
        settings: DeploySettings,
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<dyn RegistryClient>,
    ) -> Result<Self> {
        let services = settings
            .service_names()
            .context("não foi possível determinar os serviços do deploy")?;

        let project = settings.compose_project();

        debug!(
            "Deploy em {:?}: compose {:?} (projeto {:?}), serviços {}",
            settings.deploy_dir,
            settings.compose_file,
            project,
            services.join(", ")
        );

        let lifecycle = ContainerLifecycleManager::new(
            runtime.clone(),
            settings.compose_file.clone(),
            project.clone(),
            settings.wait.grace,
        );
        let validator =
            HealthValidator::new(runtime, settings.log_tail_lines).with_project(project);

        let pipeline = Pipeline::new(
            RegistryAuthenticator::new(registry),
            lifecycle,
            validator,
            services,
            settings.wait.clone(),
        )?;

        Ok(Self { pipeline })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
