use crate::domain::{Credentials, DeploymentConfig, RegistryClient};
use crate::error::{DeployError, Result};
use std::sync::Arc;
use tracing::info;

/// Exchanges the configured account/region for registry pull credentials.
/// One attempt only: a failure aborts the run before any container changes.
pub struct RegistryAuthenticator {
    client: Arc<dyn RegistryClient>,
}

impl RegistryAuthenticator {
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self { client }
    }

    pub fn authenticate(&self, config: &DeploymentConfig) -> Result<Credentials> {
        let account_id = config.account_id().map_err(into_auth_failure)?;
        let region = config.region().map_err(into_auth_failure)?;

        info!(" Autenticando no registry da conta {account_id} ({region})...");

        let credentials = self
            .client
            .login(account_id, region)
            .map_err(|e| DeployError::AuthFailure(format!("{e:#}")))?;

        info!(" Credenciais obtidas para {}", credentials.registry);
        Ok(credentials)
    }
}

fn into_auth_failure(err: DeployError) -> DeployError {
    match err {
        DeployError::ConfigInvalid(msg) => DeployError::AuthFailure(msg),
        other => other,
    }
}
