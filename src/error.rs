//! Error types for the deployment pipeline.

use crate::domain::HealthReport;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("arquivo de configuração não encontrado em {0:?}")]
    ConfigMissing(PathBuf),

    #[error("configuração inválida: {0}")]
    ConfigInvalid(String),

    #[error("falha na autenticação com o registry: {0}")]
    AuthFailure(String),

    #[error("falha ao baixar a imagem {image}: {reason}")]
    PullFailure { image: String, reason: String },

    #[error("falha ao parar {service}: {reason}")]
    StopFailure { service: String, reason: String },

    #[error("serviços fora do ar: {}", .missing.join(", "))]
    ServiceNotRunning {
        missing: Vec<String>,
        /// Diagnostics captured by the failed validation pass.
        report: Box<HealthReport>,
    },

    #[error("erro no runtime de containers: {0}")]
    Runtime(String),
}

impl DeployError {
    /// Process exit code reported to the CI system.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ServiceNotRunning { .. } => 1,
            Self::ConfigMissing(_) | Self::ConfigInvalid(_) => 2,
            Self::AuthFailure(_) => 3,
            Self::PullFailure { .. } => 4,
            Self::StopFailure { .. } | Self::Runtime(_) => 5,
        }
    }

    /// Only stop failures may be swallowed by a stage.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::StopFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
