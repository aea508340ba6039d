pub mod deployment;

use crate::error::DeployError;
use crate::infra::config;
use anyhow::Result;
use clap::{Parser, Subcommand};
pub use deployment::Deployment;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "aegis-deploy",
    version,
    about = "Deploy do conjunto de containers do Aegis em um host único"
)]
pub struct Cli {
    /// Diretório fixo de deploy (default: /opt/aegis)
    #[arg(long, env = "AEGIS_DEPLOY_DIR", default_value_os_t = config::default_deploy_dir())]
    pub deploy_dir: PathBuf,

    /// Arquivo .env com a configuração (default: <deploy-dir>/.env)
    #[arg(long, env = "AEGIS_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Autentica no registry e sai
    Login,
    /// Para e remove o conjunto de containers anterior
    Stop,
    /// Autentica, baixa a imagem e sobe o novo conjunto
    Start,
    /// Verifica se todos os serviços obrigatórios estão rodando
    Validate {
        /// Segundos de espera antes da primeira verificação
        #[arg(long)]
        grace: Option<u64>,
        /// Segundos máximos de espera pelos serviços
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Executa login, stop, start e validate em sequência
    Deploy,
    /// Mostra a referência completa da imagem
    Image,
}

impl Cli {
    pub fn env_file(&self) -> PathBuf {
        match &self.env_file {
            Some(path) => config::expand_path(path),
            None => config::env_file_path(&config::expand_path(&self.deploy_dir)),
        }
    }
}

/// Runs one command. Typed `DeployError`s are preserved inside the
/// `anyhow::Error` so the caller can map them to exit codes.
pub fn run(cli: Cli) -> Result<()> {
    let env_file = cli.env_file();

    match cli.command {
        Commands::Image => {
            let config = config::load(&env_file)?;
            println!("{}", config.image_reference()?);
            Ok(())
        }
        Commands::Login => {
            let config = config::load(&env_file)?;
            let deployment = Deployment::new(&cli.deploy_dir)?;
            let credentials = deployment.pipeline().login(&config)?;
            println!(" Autenticado em {}", credentials.registry);
            Ok(())
        }
        Commands::Stop => {
            let deployment = Deployment::new(&cli.deploy_dir)?;
            let summary = deployment.pipeline().stop();
            for (name, err) in summary.ignored() {
                println!("  {}: {}", name, err);
            }
            println!(
                " {} container(s) encerrado(s)",
                summary.stopped().count()
            );
            Ok(())
        }
        Commands::Start => {
            let config = config::load(&env_file)?;
            let deployment = Deployment::new(&cli.deploy_dir)?;
            let image = deployment.pipeline().start(&config)?;
            println!(" Serviços iniciados com {}", image);
            Ok(())
        }
        Commands::Validate { grace, timeout } => {
            let deployment = Deployment::new(&cli.deploy_dir)?;
            let mut policy = deployment.pipeline().wait_policy().clone();
            if let Some(secs) = grace {
                policy.grace = Duration::from_secs(secs);
            }
            if let Some(secs) = timeout {
                policy.timeout = Duration::from_secs(secs);
            }

            let report = deployment
                .pipeline()
                .validate(&policy)
                .inspect_err(print_diagnostics)?;
            print!("{}", report);
            Ok(())
        }
        Commands::Deploy => {
            let config = config::load(&env_file)?;
            let deployment = Deployment::new(&cli.deploy_dir)?;
            let run = deployment
                .pipeline()
                .deploy(&config)
                .inspect_err(print_diagnostics)?;
            print!("{}", run.report);
            println!(" Deploy concluído: {} ({})", run.image, run.set.phase());
            Ok(())
        }
    }
}

fn print_diagnostics(err: &DeployError) {
    if let DeployError::ServiceNotRunning { report, .. } = err {
        print!("{}", report);
    }
}

/// Exit code for an error returned by [`run`]: the typed code when the
/// failure came from a stage, 5 for anything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DeployError>()
        .map(DeployError::exit_code)
        .unwrap_or(5)
}
