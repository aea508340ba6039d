use crate::domain::config::registry_host;
use crate::domain::{Credentials, RegistryClient};
use crate::infra::command::CommandRunner;
use anyhow::{Result, bail};
use std::process::Command;

/// ECR always issues tokens for this fixed user name.
pub const ECR_USERNAME: &str = "AWS";

/// Exchanges account/region for an ECR token through the `aws` CLI, which
/// picks up the host's instance profile or configured credentials.
#[derive(Debug, Clone)]
pub struct EcrRegistry {
    aws_binary: String,
    runner: CommandRunner,
}

impl EcrRegistry {
    pub fn new(aws_binary: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            aws_binary: aws_binary.into(),
            runner,
        }
    }
}

impl RegistryClient for EcrRegistry {
    fn login(&self, account_id: &str, region: &str) -> Result<Credentials> {
        let mut cmd = Command::new(&self.aws_binary);
        cmd.args(["ecr", "get-login-password", "--region", region]);

        let out = self.runner.run_redacted(&mut cmd, "obtendo token do ECR")?;
        if !out.success() {
            bail!("aws ecr get-login-password falhou: {}", out.reason());
        }

        let token = out.stdout.trim().to_string();
        if token.is_empty() {
            bail!("aws ecr get-login-password retornou token vazio");
        }

        Ok(Credentials::new(
            registry_host(account_id, region),
            ECR_USERNAME,
            token,
        ))
    }
}
