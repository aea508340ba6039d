use crate::domain::{DeploymentConfig, WaitPolicy};
use crate::error::DeployError;
use crate::infra::compose_file;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_DEPLOY_DIR: &str = "/opt/aegis";
pub const ENV_FILE_NAME: &str = ".env";
pub const SETTINGS_FILE_NAME: &str = "deploy.toml";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

pub fn default_deploy_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DEPLOY_DIR)
}

pub fn env_file_path(deploy_dir: &Path) -> PathBuf {
    deploy_dir.join(ENV_FILE_NAME)
}

/// Expands a leading `~` so operators can point at home-relative files.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path.to_string_lossy().as_ref()).into_owned())
}

/// Reads the deployment `.env` file.
pub fn load(path: &Path) -> Result<DeploymentConfig, DeployError> {
    let path = expand_path(path);
    if !path.exists() {
        return Err(DeployError::ConfigMissing(path));
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| DeployError::ConfigInvalid(format!("lendo {:?}: {e}", path)))?;
    let pairs = parse_env(&content)?;

    let config = DeploymentConfig::from_pairs(pairs);
    info!(" {} chave(s) carregada(s) de {:?}", config.len(), path);
    debug!("Chaves: {:?}", config.keys().collect::<Vec<_>>());

    let absent = config.absent_keys();
    if !absent.is_empty() {
        warn!("  Chaves ausentes em {:?}: {}", path, absent.join(", "));
    }

    Ok(config)
}

/// Parses dotenv syntax: `KEY=VALUE`, `#` comments, optional `export `
/// prefix and optional quotes. Later duplicates win.
pub fn parse_env(content: &str) -> Result<Vec<(String, String)>, DeployError> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let Some((key, value)) = line.split_once('=') else {
            return Err(DeployError::ConfigInvalid(format!(
                "linha {line_no}: esperado CHAVE=VALOR"
            )));
        };

        let key = key.trim();
        if !is_valid_key(key) {
            return Err(DeployError::ConfigInvalid(format!(
                "linha {line_no}: chave inválida '{key}'"
            )));
        }

        let value = unquote(value.trim());
        pairs.retain(|(k, _)| k != key);
        pairs.push((key.to_string(), value));
    }

    Ok(pairs)
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }

    // Inline comments only count on unquoted values.
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ComposeSection {
    pub file: Option<PathBuf>,
    pub project: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ServicesSection {
    pub required: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
pub struct HealthSection {
    pub grace_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub poll_initial_ms: Option<u64>,
    pub poll_max_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub log_tail_lines: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RuntimeSection {
    pub binary: Option<String>,
    pub aws_binary: Option<String>,
    pub transcript: Option<PathBuf>,
}

/// Raw contents of `deploy.toml`.
#[derive(Deserialize, Debug, Default)]
pub struct SettingsFile {
    #[serde(default)]
    pub compose: ComposeSection,
    #[serde(default)]
    pub services: ServicesSection,
    #[serde(default)]
    pub health: HealthSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// Pipeline parameters with every default resolved.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub deploy_dir: PathBuf,
    pub compose_file: PathBuf,
    pub project_name: Option<String>,
    pub required_services: Option<Vec<String>>,
    pub wait: WaitPolicy,
    pub log_tail_lines: usize,
    pub runtime_binary: String,
    pub aws_binary: String,
    pub transcript: Option<PathBuf>,
}

impl DeploySettings {
    pub fn defaults(deploy_dir: &Path) -> Self {
        Self::from_file(deploy_dir, SettingsFile::default())
    }

    fn from_file(deploy_dir: &Path, file: SettingsFile) -> Self {
        let defaults = WaitPolicy::default();
        let health = file.health;

        let compose_file = file
            .compose
            .file
            .map(|p| resolve(deploy_dir, &p))
            .unwrap_or_else(|| deploy_dir.join(DEFAULT_COMPOSE_FILE));

        let wait = WaitPolicy {
            grace: health
                .grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace),
            timeout: health
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            initial_interval: health
                .poll_initial_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_interval),
            max_interval: health
                .poll_max_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_interval),
            multiplier: health.backoff_multiplier.unwrap_or(defaults.multiplier),
        };

        Self {
            deploy_dir: deploy_dir.to_path_buf(),
            compose_file,
            project_name: file.compose.project,
            required_services: file.services.required,
            wait,
            log_tail_lines: health.log_tail_lines.unwrap_or(100),
            runtime_binary: file.runtime.binary.unwrap_or_else(|| "docker".to_string()),
            aws_binary: file.runtime.aws_binary.unwrap_or_else(|| "aws".to_string()),
            transcript: file.runtime.transcript.map(|p| resolve(deploy_dir, &p)),
        }
    }

    /// The declared service set: `[services] required` when present,
    /// otherwise every service of the compose definition.
    pub fn service_names(&self) -> Result<Vec<String>> {
        if let Some(required) = &self.required_services {
            if required.is_empty() {
                return Err(DeployError::ConfigInvalid(
                    "[services] required está vazio".to_string(),
                )
                .into());
            }
            return Ok(required.clone());
        }

        compose_file::declared_services(&self.compose_file)
            .with_context(|| format!("lendo serviços de {:?}", self.compose_file))
    }

    /// `[compose] project` when set, otherwise the name compose derives
    /// for the compose file.
    pub fn compose_project(&self) -> Option<String> {
        self.project_name
            .clone()
            .or_else(|| compose_file::project_name(&self.compose_file))
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_path(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Loads `deploy.toml` from the deploy directory; missing file means defaults.
pub fn load_settings(deploy_dir: &Path) -> Result<DeploySettings> {
    let deploy_dir = expand_path(deploy_dir);
    let path = deploy_dir.join(SETTINGS_FILE_NAME);

    if !path.exists() {
        debug!("{:?} não encontrado, usando padrões", path);
        return Ok(DeploySettings::defaults(&deploy_dir));
    }

    let content = fs::read_to_string(&path).with_context(|| format!("lendo {:?}", path))?;
    let file: SettingsFile =
        toml::from_str(&content).with_context(|| format!("parse de {:?}", path))?;

    Ok(DeploySettings::from_file(&deploy_dir, file))
}
