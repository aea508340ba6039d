use crate::domain::{
    ContainerSet, Credentials, DeploymentConfig, HealthReport, ImageReference, SetPhase,
    StopSummary, WaitPolicy,
};
use crate::error::Result;
use crate::services::{ContainerLifecycleManager, HealthValidator, RegistryAuthenticator};
use std::time::Duration;
use tracing::{debug, error, info};

/// Everything a successful `deploy` produced.
#[derive(Debug)]
pub struct DeployRun {
    pub image: ImageReference,
    pub stop: StopSummary,
    pub report: HealthReport,
    pub set: ContainerSet,
}

/// Sequences login → stop → start → validate. Each stage can also be run
/// on its own, as separate CI steps do.
pub struct Pipeline {
    authenticator: RegistryAuthenticator,
    lifecycle: ContainerLifecycleManager,
    validator: HealthValidator,
    declared: ContainerSet,
    wait: WaitPolicy,
}

impl Pipeline {
    pub fn new(
        authenticator: RegistryAuthenticator,
        lifecycle: ContainerLifecycleManager,
        validator: HealthValidator,
        services: Vec<String>,
        wait: WaitPolicy,
    ) -> Result<Self> {
        Ok(Self {
            authenticator,
            lifecycle,
            validator,
            declared: ContainerSet::declare(services)?,
            wait,
        })
    }

    pub fn services(&self) -> &[String] {
        self.declared.services()
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }

    pub fn login(&self, config: &DeploymentConfig) -> Result<Credentials> {
        self.authenticator.authenticate(config)
    }

    pub fn stop(&self) -> StopSummary {
        self.lifecycle.stop(self.services())
    }

    /// Authenticates, pulls and starts the new set.
    pub fn start(&self, config: &DeploymentConfig) -> Result<ImageReference> {
        let credentials = self.login(config)?;
        self.lifecycle
            .start_new(&credentials, config, self.services())
    }

    /// Fails with `ServiceNotRunning` when any declared service is missing.
    pub fn validate(&self, policy: &WaitPolicy) -> Result<HealthReport> {
        self.validator
            .validate(self.services(), policy)?
            .into_result()
    }

    /// Full run. Every key the later stages need is checked and credentials
    /// are obtained before anything on the host is touched; the first fatal
    /// error stops the run.
    pub fn deploy(&self, config: &DeploymentConfig) -> Result<DeployRun> {
        let mut set = self.declared.clone();
        info!(" Deploy de {} serviço(s): {}", set.services().len(), set.services().join(", "));

        let credentials = self.login(config)?;
        let target = config.image_reference()?;
        debug!("Imagem alvo: {}", target);

        let stop = self.lifecycle.stop(set.services());
        for (name, err) in stop.ignored() {
            info!("  {} ignorado na parada: {}", name, err);
        }

        set.advance(SetPhase::Pulling)?;
        let image = match self.lifecycle.start_new(&credentials, config, set.services()) {
            Ok(image) => image,
            Err(e) => {
                set.advance(SetPhase::Failed)?;
                error!(" Deploy interrompido: {}", e);
                return Err(e);
            }
        };
        set.advance(SetPhase::Running)?;

        // start_new already waited out the grace period.
        let policy = WaitPolicy {
            grace: Duration::ZERO,
            ..self.wait.clone()
        };
        let report = match self.validate(&policy) {
            Ok(report) => report,
            Err(e) => {
                set.advance(SetPhase::Failed)?;
                error!(" Deploy falhou na validação: {}", e);
                return Err(e);
            }
        };
        set.advance(SetPhase::Validated)?;

        info!(" Deploy de {} concluído", image);
        Ok(DeployRun {
            image,
            stop,
            report,
            set,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContainerState;
    use crate::domain::config::{ACCOUNT_ID, REGION, REPOSITORY};
    use crate::error::DeployError;
    use crate::test_support::{MockRegistry, MockRuntime};
    use std::sync::Arc;

    fn create_pipeline(services: &[&str]) -> (Pipeline, Arc<MockRuntime>, Arc<MockRegistry>) {
        let runtime = Arc::new(MockRuntime::new());
        let registry = Arc::new(MockRegistry::new());
        let wait = WaitPolicy {
            grace: Duration::ZERO,
            timeout: Duration::from_millis(30),
            initial_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(10),
            multiplier: 2.0,
        };

        let pipeline = Pipeline::new(
            RegistryAuthenticator::new(registry.clone()),
            ContainerLifecycleManager::new(
                runtime.clone(),
                "/opt/aegis/docker-compose.yml",
                Some("aegis".to_string()),
                Duration::ZERO,
            ),
            HealthValidator::new(runtime.clone(), 50),
            services.iter().map(|s| s.to_string()).collect(),
            wait,
        )
        .unwrap();

        (pipeline, runtime, registry)
    }

    fn config() -> DeploymentConfig {
        DeploymentConfig::from_pairs([
            (ACCOUNT_ID, "111"),
            (REGION, "us-east-1"),
            (REPOSITORY, "aegis"),
        ])
    }

    #[test]
    fn test_deploy_happy_path() {
        let (pipeline, runtime, _) = create_pipeline(&["backend", "proxy"]);
        runtime.add_container("backend", ContainerState::Running);
        runtime.add_container("proxy", ContainerState::Running);
        runtime.declare_compose_services(&["backend", "proxy"]);

        let run = pipeline.deploy(&config()).unwrap();

        assert_eq!(run.set.phase(), SetPhase::Validated);
        assert!(run.report.is_healthy());
        assert_eq!(run.stop.stopped().count(), 2);
        assert_eq!(
            runtime.pulled_images(),
            vec!["111.dkr.ecr.us-east-1.amazonaws.com/aegis:latest"]
        );
    }

    #[test]
    fn test_deploy_auth_failure_touches_nothing() {
        let (pipeline, runtime, registry) = create_pipeline(&["backend"]);
        runtime.add_container("backend", ContainerState::Running);
        registry.set_fail(true);

        let err = pipeline.deploy(&config()).unwrap_err();

        assert!(matches!(err, DeployError::AuthFailure(_)));
        assert!(runtime.get_commands().is_empty());
        assert_eq!(runtime.get_state("backend"), Some(ContainerState::Running));
    }

    #[test]
    fn test_deploy_config_error_touches_nothing() {
        let (pipeline, runtime, registry) = create_pipeline(&["backend"]);
        runtime.add_container("backend", ContainerState::Running);
        let config = DeploymentConfig::from_pairs([(ACCOUNT_ID, "111"), (REGION, "us-east-1")]);

        let err = pipeline.deploy(&config).unwrap_err();

        assert!(matches!(err, DeployError::ConfigInvalid(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(runtime.get_commands().is_empty());
        assert_eq!(registry.get_commands(), vec!["login:111:us-east-1"]);
        assert_eq!(runtime.running_names(), vec!["backend"]);
    }

    #[test]
    fn test_deploy_missing_region_is_auth_failure() {
        let (pipeline, runtime, registry) = create_pipeline(&["backend"]);
        runtime.add_container("backend", ContainerState::Running);
        let config = DeploymentConfig::from_pairs([(ACCOUNT_ID, "111"), (REPOSITORY, "aegis")]);

        let err = pipeline.deploy(&config).unwrap_err();

        assert!(matches!(err, DeployError::AuthFailure(_)));
        assert!(registry.get_commands().is_empty());
        assert!(runtime.get_commands().is_empty());
    }

    #[test]
    fn test_deploy_pull_failure_leaves_nothing_running() {
        let (pipeline, runtime, _) = create_pipeline(&["backend", "proxy"]);
        runtime.add_container("backend", ContainerState::Running);
        runtime.declare_compose_services(&["backend", "proxy"]);
        runtime.set_fail_on("pull");

        let err = pipeline.deploy(&config()).unwrap_err();

        assert!(matches!(err, DeployError::PullFailure { .. }));
        assert!(runtime.running_names().is_empty());
    }

    #[test]
    fn test_deploy_reports_missing_service() {
        let (pipeline, runtime, _) = create_pipeline(&["backend", "proxy"]);
        runtime.declare_compose_services(&["backend", "proxy"]);
        runtime.set_crashing("backend");
        runtime.set_logs("backend", "thread 'main' panicked");

        let err = pipeline.deploy(&config()).unwrap_err();

        match err {
            DeployError::ServiceNotRunning { missing, report } => {
                assert_eq!(missing, vec!["backend".to_string()]);
                assert!(report.to_string().contains("thread 'main' panicked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stop_twice_is_idempotent() {
        let (pipeline, runtime, _) = create_pipeline(&["backend", "proxy"]);
        runtime.add_container("backend", ContainerState::Running);

        let first = pipeline.stop();
        let second = pipeline.stop();

        assert_eq!(first.stopped().collect::<Vec<_>>(), vec!["backend"]);
        assert_eq!(second.stopped().count(), 0);
        assert_eq!(second.ignored().count(), 0);
    }

    #[test]
    fn test_rejects_duplicate_service_names() {
        let runtime = Arc::new(MockRuntime::new());
        let registry = Arc::new(MockRegistry::new());

        let result = Pipeline::new(
            RegistryAuthenticator::new(registry),
            ContainerLifecycleManager::new(runtime.clone(), "compose.yml", None, Duration::ZERO),
            HealthValidator::new(runtime, 10),
            vec!["backend".to_string(), "backend".to_string()],
            WaitPolicy::default(),
        );

        assert!(result.is_err());
    }
}
