use crate::error::{DeployError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    NotCreated,
}

/// One row of the runtime's container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// Free-form status column, e.g. "Up 3 minutes" or "Exited (1)".
    pub status: String,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    /// True when this container belongs to `service`: either the explicit
    /// `container_name`, or compose's generated `<project>-<service>-<n>`.
    /// With a `project`, generated names from other projects do not count.
    pub fn belongs_to(&self, service: &str, project: Option<&str>) -> bool {
        if self.name == service {
            return true;
        }

        let Some(base) = self
            .name
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .strip_suffix(['-', '_'])
        else {
            return false;
        };

        let Some(prefix) = base
            .strip_suffix(service)
            .and_then(|p| p.strip_suffix(['-', '_']))
        else {
            return false;
        };

        match project {
            Some(project) => prefix == project,
            None => !prefix.is_empty(),
        }
    }
}

/// Renders the listing the way `docker ps -a` does, for failure dumps.
pub fn render_status_table(rows: &[ContainerStatus]) -> String {
    let name_width = rows
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    let image_width = rows
        .iter()
        .map(|r| r.image.len())
        .max()
        .unwrap_or(0)
        .max("IMAGE".len());

    let mut out = format!(
        "{:<name_width$}  {:<image_width$}  STATUS\n",
        "NAME", "IMAGE"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<name_width$}  {:<image_width$}  {}\n",
            row.name, row.image, row.status
        ));
    }
    out
}

/// Lifecycle of the container set within a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPhase {
    Stopped,
    Pulling,
    Running,
    Validated,
    Failed,
}

impl fmt::Display for SetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Pulling => "pulling",
            Self::Running => "running",
            Self::Validated => "validated",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The fixed group of services deployed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSet {
    services: Vec<String>,
    phase: SetPhase,
}

impl ContainerSet {
    /// Declares the set. Duplicate and blank names are rejected.
    pub fn declare<I, S>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in services {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(DeployError::ConfigInvalid(
                    "nome de serviço vazio".to_string(),
                ));
            }
            if names.contains(&name) {
                return Err(DeployError::ConfigInvalid(format!(
                    "serviço '{name}' declarado mais de uma vez"
                )));
            }
            names.push(name);
        }

        Ok(Self {
            services: names,
            phase: SetPhase::Stopped,
        })
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }

    pub fn phase(&self) -> SetPhase {
        self.phase
    }

    /// Moves to `next`, refusing anything outside
    /// stopped → pulling → running → validated|failed.
    pub fn advance(&mut self, next: SetPhase) -> Result<()> {
        let allowed = matches!(
            (self.phase, next),
            (SetPhase::Stopped, SetPhase::Pulling)
                | (SetPhase::Pulling, SetPhase::Running)
                | (SetPhase::Pulling, SetPhase::Failed)
                | (SetPhase::Running, SetPhase::Validated)
                | (SetPhase::Running, SetPhase::Failed)
        );

        if !allowed {
            return Err(DeployError::Runtime(format!(
                "transição inválida do conjunto de containers: {} -> {}",
                self.phase, next
            )));
        }

        self.phase = next;
        Ok(())
    }
}

/// What happened to one service during the stop stage.
#[derive(Debug)]
pub enum StopOutcome {
    Stopped,
    AlreadyAbsent,
    /// A tolerated failure; always a `DeployError::StopFailure`.
    Ignored(DeployError),
}

#[derive(Debug, Default)]
pub struct StopSummary {
    pub outcomes: Vec<(String, StopOutcome)>,
}

impl StopSummary {
    pub fn record(&mut self, service: &str, outcome: StopOutcome) {
        self.outcomes.push((service.to_string(), outcome));
    }

    pub fn stopped(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StopOutcome::Stopped))
            .map(|(name, _)| name.as_str())
    }

    pub fn ignored(&self) -> impl Iterator<Item = (&str, &DeployError)> {
        self.outcomes.iter().filter_map(|(name, o)| match o {
            StopOutcome::Ignored(err) => Some((name.as_str(), err)),
            _ => None,
        })
    }

    pub fn outcome(&self, service: &str) -> Option<&StopOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, o)| o)
    }
}
