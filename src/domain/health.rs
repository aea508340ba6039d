use crate::error::{DeployError, Result};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealth {
    pub name: String,
    pub running: bool,
    /// Last log lines, only captured for services that are not running.
    pub log_tail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    Healthy,
    Unhealthy {
        /// Full container listing at the time of the last poll.
        status_table: String,
    },
}

/// Result of one validation pass. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub services: Vec<ServiceHealth>,
    pub outcome: HealthOutcome,
    /// Number of times the runtime listing was sampled.
    pub polls: u32,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.outcome == HealthOutcome::Healthy
    }

    pub fn missing(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|s| !s.running)
            .map(|s| s.name.clone())
            .collect()
    }

    /// 0 when healthy, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_healthy() { 0 } else { 1 }
    }

    /// Turns an unhealthy report into `ServiceNotRunning`, keeping the
    /// diagnostics attached to the error.
    pub fn into_result(self) -> Result<Self> {
        if self.is_healthy() {
            return Ok(self);
        }

        Err(DeployError::ServiceNotRunning {
            missing: self.missing(),
            report: Box::new(self),
        })
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for svc in &self.services {
            let mark = if svc.running { "rodando" } else { "AUSENTE" };
            writeln!(f, "- {:<16} | {}", svc.name, mark)?;
        }

        if let HealthOutcome::Unhealthy { status_table } = &self.outcome {
            writeln!(f)?;
            writeln!(f, "=== Status dos containers ===")?;
            write!(f, "{status_table}")?;

            for svc in self.services.iter().filter(|s| !s.running) {
                writeln!(f)?;
                writeln!(f, "=== Logs de {} ===", svc.name)?;
                match &svc.log_tail {
                    Some(tail) if !tail.trim().is_empty() => writeln!(f, "{}", tail.trim_end())?,
                    _ => writeln!(f, "(sem logs)")?,
                }
            }
        }

        Ok(())
    }
}
