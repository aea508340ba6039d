use crate::domain::{
    ContainerRuntime, ContainerStatus, HealthOutcome, HealthReport, ServiceHealth, WaitPolicy,
    render_status_table,
};
use crate::error::{DeployError, Result};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Confirms the declared services are running once the grace period is over.
pub struct HealthValidator {
    runtime: Arc<dyn ContainerRuntime>,
    log_tail_lines: usize,
    project: Option<String>,
}

impl HealthValidator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, log_tail_lines: usize) -> Self {
        Self {
            runtime,
            log_tail_lines,
            project: None,
        }
    }

    /// Only count compose-generated containers of this project.
    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    /// Waits `policy.grace`, then polls the container listing with backoff
    /// until every service is running or `policy.timeout` runs out.
    ///
    /// Always returns a report when the runtime could be listed at least
    /// once; an unhealthy report carries the status table and the log tail
    /// of each missing service. Use [`HealthReport::into_result`] to turn it
    /// into `ServiceNotRunning`.
    pub fn validate(&self, services: &[String], policy: &WaitPolicy) -> Result<HealthReport> {
        if !policy.grace.is_zero() {
            info!("ﱮ Aguardando {:?} antes de verificar os serviços...", policy.grace);
            thread::sleep(policy.grace);
        }

        info!(" Verificando serviços: {}", services.join(", "));

        let started = Instant::now();
        let mut polls = 0u32;
        let mut last_rows: Option<Vec<ContainerStatus>> = None;
        let mut last_error = None;

        loop {
            polls += 1;
            match self.runtime.list_containers() {
                Ok(rows) => {
                    let missing = missing_services(services, &rows, self.project.as_deref());
                    if missing.is_empty() {
                        info!(" Todos os serviços estão rodando");
                        return Ok(healthy_report(services, polls));
                    }
                    debug!("Ainda ausentes (tentativa {}): {}", polls, missing.join(", "));
                    last_rows = Some(rows);
                }
                Err(e) => {
                    warn!("Falha ao listar containers: {:#}", e);
                    last_error = Some(e);
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= policy.timeout {
                break;
            }

            let delay = policy.interval(polls - 1).min(policy.timeout - elapsed);
            thread::sleep(delay);
        }

        let Some(rows) = last_rows else {
            let reason = last_error
                .map(|e| format!("{e:#}"))
                .unwrap_or_else(|| "listagem indisponível".to_string());
            return Err(DeployError::Runtime(reason));
        };

        Ok(self.unhealthy_report(services, &rows, polls))
    }

    fn unhealthy_report(
        &self,
        services: &[String],
        rows: &[ContainerStatus],
        polls: u32,
    ) -> HealthReport {
        let missing = missing_services(services, rows, self.project.as_deref());

        let services = services
            .iter()
            .map(|name| {
                let running = !missing.contains(name);
                let log_tail = (!running).then(|| self.log_tail(name));
                ServiceHealth {
                    name: name.clone(),
                    running,
                    log_tail,
                }
            })
            .collect();

        warn!("  Serviços fora do ar: {}", missing.join(", "));

        HealthReport {
            services,
            outcome: HealthOutcome::Unhealthy {
                status_table: render_status_table(rows),
            },
            polls,
        }
    }

    fn log_tail(&self, name: &str) -> String {
        match self.runtime.logs_tail(name, self.log_tail_lines) {
            Ok(tail) => tail,
            Err(e) => format!("(logs indisponíveis: {e:#})"),
        }
    }
}

fn missing_services(
    services: &[String],
    rows: &[ContainerStatus],
    project: Option<&str>,
) -> Vec<String> {
    services
        .iter()
        .filter(|name| {
            !rows
                .iter()
                .any(|r| r.is_running() && r.belongs_to(name, project))
        })
        .cloned()
        .collect()
}

fn healthy_report(services: &[String], polls: u32) -> HealthReport {
    HealthReport {
        services: services
            .iter()
            .map(|name| ServiceHealth {
                name: name.clone(),
                running: true,
                log_tail: None,
            })
            .collect(),
        outcome: HealthOutcome::Healthy,
        polls,
    }
}
