use crate::domain::{
    ContainerRuntime, ContainerStatus, Credentials, DeploymentConfig, ImageReference, Presence,
    StopOutcome, StopSummary,
};
use crate::error::{DeployError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stops the previous container set and brings up the new one.
pub struct ContainerLifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    compose_file: PathBuf,
    project: Option<String>,
    grace: Duration,
}

impl ContainerLifecycleManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        compose_file: impl Into<PathBuf>,
        project: Option<String>,
        grace: Duration,
    ) -> Self {
        Self {
            runtime,
            compose_file: compose_file.into(),
            project,
            grace,
        }
    }

    /// Stops and removes every container of the named services, whether it
    /// carries the service name or a compose-generated one. Individual
    /// failures are recorded as ignored and never abort the stage, so running
    /// it twice (or against an empty host) is harmless.
    pub fn stop(&self, services: &[String]) -> StopSummary {
        let mut summary = StopSummary::default();
        if services.is_empty() {
            return summary;
        }

        info!(" Encerrando containers anteriores...");
        let listing = self.listing();

        for name in services {
            let outcome = self.stop_service(name, &self.targets(name, listing.as_deref()));
            match &outcome {
                StopOutcome::Stopped => debug!("Serviço {} parado e removido", name),
                StopOutcome::AlreadyAbsent => debug!("Serviço {} não tem containers", name),
                StopOutcome::Ignored(e) => warn!("  Ignorando falha: {}", e),
            }
            summary.record(name, outcome);
        }

        info!(" Containers anteriores encerrados");
        summary
    }

    /// `None` when the runtime cannot be listed; callers then fall back to
    /// addressing containers by service name.
    fn listing(&self) -> Option<Vec<ContainerStatus>> {
        match self.runtime.list_containers() {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("  Falha ao listar containers, usando nomes dos serviços: {:#}", e);
                None
            }
        }
    }

    fn targets(&self, service: &str, listing: Option<&[ContainerStatus]>) -> Vec<String> {
        match listing {
            Some(rows) => rows
                .iter()
                .filter(|r| r.belongs_to(service, self.project.as_deref()))
                .map(|r| r.name.clone())
                .collect(),
            None => vec![service.to_string()],
        }
    }

    fn stop_service(&self, service: &str, containers: &[String]) -> StopOutcome {
        let mut stopped = false;
        let mut failure = None;

        for container in containers {
            match self.stop_one(service, container) {
                StopOutcome::Stopped => stopped = true,
                StopOutcome::AlreadyAbsent => {}
                ignored @ StopOutcome::Ignored(_) => {
                    failure.get_or_insert(ignored);
                }
            }
        }

        match failure {
            Some(ignored) => ignored,
            None if stopped => StopOutcome::Stopped,
            None => StopOutcome::AlreadyAbsent,
        }
    }

    fn stop_one(&self, service: &str, container: &str) -> StopOutcome {
        let stop_error = match self.runtime.stop_container(container) {
            Ok(Presence::Missing) => return StopOutcome::AlreadyAbsent,
            Ok(Presence::Found) => None,
            Err(e) => Some(e),
        };

        // rm -f also covers a container whose stop timed out.
        match (self.runtime.remove_container(container), stop_error) {
            (Ok(_), None) => StopOutcome::Stopped,
            (Ok(Presence::Found), Some(e)) => {
                debug!("stop de {} falhou ({:#}), mas rm -f removeu", container, e);
                StopOutcome::Stopped
            }
            (Ok(Presence::Missing), Some(_)) => StopOutcome::AlreadyAbsent,
            (Err(e), _) => StopOutcome::Ignored(DeployError::StopFailure {
                service: service.to_string(),
                reason: format!("{container}: {e:#}"),
            }),
        }
    }

    /// Pulls the configured image and starts the declared set from the
    /// compose definition. A failed pull aborts before anything is started.
    pub fn start_new(
        &self,
        credentials: &Credentials,
        config: &DeploymentConfig,
        services: &[String],
    ) -> Result<ImageReference> {
        let image = config.image_reference()?;
        let image_str = image.to_string();

        info!(" Baixando {}...", image_str);
        self.runtime
            .pull_image(&image_str, credentials)
            .map_err(|e| DeployError::PullFailure {
                image: image_str.clone(),
                reason: format!("{e:#}"),
            })?;

        self.remove_leftovers(services);

        info!(" Subindo {} serviço(s)...", services.len());
        self.runtime
            .compose_up(
                &self.compose_file,
                self.project.as_deref(),
                config,
                &image_str,
            )
            .map_err(|e| DeployError::Runtime(format!("{e:#}")))?;

        if !self.grace.is_zero() {
            info!("ﱮ Aguardando {:?} para os serviços iniciarem...", self.grace);
            thread::sleep(self.grace);
        }

        Ok(image)
    }

    fn remove_leftovers(&self, services: &[String]) {
        let listing = self.listing();
        for name in services {
            for container in self.targets(name, listing.as_deref()) {
                match self.runtime.remove_container(&container) {
                    Ok(Presence::Found) => debug!("Container remanescente {} removido", container),
                    Ok(Presence::Missing) => {}
                    Err(e) => warn!("  Falha ao remover {}: {:#}", container, e),
                }
            }
        }

        match self.runtime.prune_images() {
            Ok(_) => debug!("Imagens órfãs removidas"),
            Err(e) => warn!("Falha ao remover imagens: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContainerState;
    use crate::domain::config::{ACCOUNT_ID, REGION, REPOSITORY};
    use crate::test_support::MockRuntime;

    fn create_manager() -> (ContainerLifecycleManager, Arc<MockRuntime>) {
        let mock = Arc::new(MockRuntime::new());
        let manager = ContainerLifecycleManager::new(
            mock.clone(),
            "/opt/aegis/docker-compose.yml",
            None,
            Duration::ZERO,
        );
        (manager, mock)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn config() -> DeploymentConfig {
        DeploymentConfig::from_pairs([
            (ACCOUNT_ID, "111"),
            (REGION, "us-east-1"),
            (REPOSITORY, "aegis"),
        ])
    }

    fn creds() -> Credentials {
        Credentials::new("111.dkr.ecr.us-east-1.amazonaws.com", "AWS", "token".into())
    }

    #[test]
    fn test_stop_stops_and_removes_each_container() {
        let (manager, mock) = create_manager();
        mock.add_container("backend", ContainerState::Running);
        mock.add_container("proxy", ContainerState::Running);

        let summary = manager.stop(&names(&["backend", "proxy"]));

        assert_eq!(summary.stopped().count(), 2);
        assert!(!mock.container_exists("backend"));
        assert!(!mock.container_exists("proxy"));

        let commands = mock.get_commands();
        assert!(commands.contains(&"stop:backend".to_string()));
        assert!(commands.contains(&"remove:backend".to_string()));
    }

    #[test]
    fn test_stop_on_empty_host_is_a_no_op() {
        let (manager, mock) = create_manager();

        let summary = manager.stop(&names(&["backend", "proxy", "cert-renewal"]));

        assert_eq!(summary.ignored().count(), 0);
        assert!(matches!(
            summary.outcome("backend"),
            Some(StopOutcome::AlreadyAbsent)
        ));
        assert!(!mock.get_commands().iter().any(|c| c.starts_with("remove:")));
    }

    #[test]
    fn test_stop_finds_compose_generated_names() {
        let (manager, mock) = create_manager();
        mock.add_container("aegis-backend-1", ContainerState::Running);
        mock.add_container("aegis-backend-2", ContainerState::Stopped);

        let summary = manager.stop(&names(&["backend"]));

        assert!(matches!(summary.outcome("backend"), Some(StopOutcome::Stopped)));
        assert!(mock.running_names().is_empty());
        assert!(!mock.container_exists("aegis-backend-1"));
        assert!(!mock.container_exists("aegis-backend-2"));
        assert!(mock.get_commands().contains(&"stop:aegis-backend-1".to_string()));
    }

    #[test]
    fn test_stop_leaves_other_projects_alone() {
        let mock = Arc::new(MockRuntime::new());
        let manager = ContainerLifecycleManager::new(
            mock.clone(),
            "/opt/aegis/docker-compose.yml",
            Some("aegis".to_string()),
            Duration::ZERO,
        );
        mock.add_container("aegis-backend-1", ContainerState::Running);
        mock.add_container("staging-backend-1", ContainerState::Running);

        manager.stop(&names(&["backend"]));

        assert_eq!(mock.running_names(), vec!["staging-backend-1"]);
    }

    #[test]
    fn test_stop_uses_service_names_when_listing_fails() {
        let (manager, mock) = create_manager();
        mock.add_container("backend", ContainerState::Running);
        mock.set_fail_on("list");

        let summary = manager.stop(&names(&["backend"]));

        assert!(matches!(summary.outcome("backend"), Some(StopOutcome::Stopped)));
        assert!(!mock.container_exists("backend"));
    }

    #[test]
    fn test_stop_with_empty_list() {
        let (manager, mock) = create_manager();
        let summary = manager.stop(&[]);
        assert!(summary.outcomes.is_empty());
        assert!(mock.get_commands().is_empty());
    }

    #[test]
    fn test_stop_continues_on_failure() {
        let (manager, mock) = create_manager();
        mock.add_container("backend", ContainerState::Running);
        mock.add_container("proxy", ContainerState::Running);
        mock.set_fail_on("remove");

        let summary = manager.stop(&names(&["backend", "proxy"]));

        let ignored: Vec<_> = summary.ignored().map(|(n, _)| n).collect();
        assert_eq!(ignored, vec!["backend", "proxy"]);
        assert!(summary.ignored().all(|(_, e)| e.is_ignorable()));
    }

    #[test]
    fn test_stop_falls_back_to_forced_removal() {
        let (manager, mock) = create_manager();
        mock.add_container("backend", ContainerState::Running);
        mock.set_fail_on("stop");

        let summary = manager.stop(&names(&["backend"]));

        assert!(matches!(summary.outcome("backend"), Some(StopOutcome::Stopped)));
        assert!(!mock.container_exists("backend"));
    }

    #[test]
    fn test_start_new_pulls_then_starts() {
        let (manager, mock) = create_manager();
        mock.declare_compose_services(&["backend", "proxy"]);

        let image = manager
            .start_new(&creds(), &config(), &names(&["backend", "proxy"]))
            .unwrap();

        assert_eq!(
            image.to_string(),
            "111.dkr.ecr.us-east-1.amazonaws.com/aegis:latest"
        );

        let commands = mock.get_commands();
        let pull = commands
            .iter()
            .position(|c| c == "pull:111.dkr.ecr.us-east-1.amazonaws.com/aegis:latest")
            .unwrap();
        let up = commands.iter().position(|c| c.starts_with("compose_up:")).unwrap();
        assert!(pull < up);
        assert!(commands.contains(&"prune:images".to_string()));

        assert_eq!(mock.get_state("backend"), Some(ContainerState::Running));
        assert_eq!(mock.get_state("proxy"), Some(ContainerState::Running));
    }

    #[test]
    fn test_start_new_pull_failure_starts_nothing() {
        let (manager, mock) = create_manager();
        mock.declare_compose_services(&["backend", "proxy"]);
        mock.set_fail_on("pull");

        let err = manager
            .start_new(&creds(), &config(), &names(&["backend", "proxy"]))
            .unwrap_err();

        assert!(matches!(err, DeployError::PullFailure { .. }));
        assert!(!mock.get_commands().iter().any(|c| c.starts_with("compose_up:")));
        assert!(mock.running_names().is_empty());
    }

    #[test]
    fn test_start_new_removes_compose_named_leftovers() {
        let (manager, mock) = create_manager();
        mock.add_container("aegis-backend-1", ContainerState::Stopped);
        mock.declare_compose_services(&["backend"]);

        manager
            .start_new(&creds(), &config(), &names(&["backend"]))
            .unwrap();

        assert!(!mock.container_exists("aegis-backend-1"));
        assert_eq!(mock.get_state("backend"), Some(ContainerState::Running));
    }

    #[test]
    fn test_start_new_tolerates_cleanup_failures() {
        let (manager, mock) = create_manager();
        mock.declare_compose_services(&["backend"]);
        mock.set_fail_on("prune_images");

        let result = manager.start_new(&creds(), &config(), &names(&["backend"]));

        assert!(result.is_ok());
        assert_eq!(mock.get_state("backend"), Some(ContainerState::Running));
    }

    #[test]
    fn test_start_new_requires_repository() {
        let (manager, mock) = create_manager();
        let config = DeploymentConfig::from_pairs([(ACCOUNT_ID, "111"), (REGION, "us-east-1")]);

        let err = manager
            .start_new(&creds(), &config, &names(&["backend"]))
            .unwrap_err();

        assert!(matches!(err, DeployError::ConfigInvalid(_)));
        assert!(mock.get_commands().is_empty());
    }

    #[test]
    fn test_start_new_passes_image_to_compose() {
        let (manager, mock) = create_manager();
        mock.declare_compose_services(&["backend"]);

        manager
            .start_new(&creds(), &config(), &names(&["backend"]))
            .unwrap();

        assert_eq!(
            mock.last_compose_image().as_deref(),
            Some("111.dkr.ecr.us-east-1.amazonaws.com/aegis:latest")
        );
    }
}
