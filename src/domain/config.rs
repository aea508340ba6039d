use crate::error::{DeployError, Result};
use secrecy::SecretString;
use std::collections::BTreeMap;
use std::fmt;

pub const ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
pub const REGION: &str = "AWS_REGION";
pub const REPOSITORY: &str = "ECR_REPOSITORY";
pub const IMAGE_TAG: &str = "IMAGE_TAG";
pub const DB_HOST: &str = "DB_HOST";
pub const S3_BUCKET: &str = "S3_BUCKET";
pub const JWT_SECRET: &str = "JWT_SECRET";
pub const SMTP_HOST: &str = "SMTP_HOST";
pub const SMTP_PORT: &str = "SMTP_PORT";
pub const SMTP_USER: &str = "SMTP_USER";
pub const SMTP_PASSWORD: &str = "SMTP_PASSWORD";
pub const MAIL_FROM: &str = "MAIL_FROM";

/// Environment variable carrying the composed image reference into compose.
pub const IMAGE_URI: &str = "IMAGE_URI";

pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Every key the deploy host is expected to provide.
pub const CANONICAL_KEYS: &[&str] = &[
    ACCOUNT_ID,
    REGION,
    REPOSITORY,
    IMAGE_TAG,
    DB_HOST,
    S3_BUCKET,
    JWT_SECRET,
    SMTP_HOST,
    SMTP_PORT,
    SMTP_USER,
    SMTP_PASSWORD,
    MAIL_FROM,
];

/// Names used by older deploy scripts for canonical keys.
const LEGACY_ALIASES: &[(&str, &str)] = &[
    ("AWS_DEFAULT_REGION", REGION),
    ("REGION", REGION),
    ("ACCOUNT_ID", ACCOUNT_ID),
    ("AWS_ACCOUNT", ACCOUNT_ID),
    ("ECR_REPO", REPOSITORY),
    ("REPOSITORY_NAME", REPOSITORY),
];

/// Key/value configuration for one deploy run. Read-only once built.
#[derive(Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    values: BTreeMap<String, String>,
}

impl DeploymentConfig {
    /// Builds the config and fills in defaults for optional keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let tag_missing = values.get(IMAGE_TAG).is_none_or(|t| t.trim().is_empty());
        if tag_missing {
            values.insert(IMAGE_TAG.to_string(), DEFAULT_IMAGE_TAG.to_string());
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Looks up a key a stage cannot run without.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(DeployError::ConfigInvalid(format!("{key} está vazio"))),
            None => Err(DeployError::ConfigInvalid(self.missing_message(key))),
        }
    }

    fn missing_message(&self, key: &str) -> String {
        let alias = LEGACY_ALIASES
            .iter()
            .find(|(alias, canonical)| *canonical == key && self.contains(alias))
            .map(|(alias, _)| *alias);

        match alias {
            Some(alias) => format!("{key} ausente (encontrado {alias}; renomeie para {key})"),
            None => format!("{key} ausente"),
        }
    }

    pub fn account_id(&self) -> Result<&str> {
        self.require(ACCOUNT_ID)
    }

    pub fn region(&self) -> Result<&str> {
        self.require(REGION)
    }

    pub fn repository(&self) -> Result<&str> {
        self.require(REPOSITORY)
    }

    pub fn image_tag(&self) -> &str {
        self.get(IMAGE_TAG).unwrap_or(DEFAULT_IMAGE_TAG)
    }

    pub fn image_reference(&self) -> Result<ImageReference> {
        Ok(ImageReference::ecr(
            self.account_id()?,
            self.region()?,
            self.repository()?,
            self.image_tag(),
        ))
    }

    /// Canonical keys the file does not provide.
    pub fn absent_keys(&self) -> Vec<&'static str> {
        CANONICAL_KEYS
            .iter()
            .copied()
            .filter(|key| !self.contains(key))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Pairs handed to child processes, values untouched.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// Values may hold secrets, so only keys are printed.
impl fmt::Debug for DeploymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentConfig")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fully qualified image reference inside a private ECR registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn ecr(account_id: &str, region: &str, repository: &str, tag: &str) -> Self {
        Self {
            registry: registry_host(account_id, region),
            repository: repository.to_string(),
            tag: tag.to_string(),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

pub fn registry_host(account_id: &str, region: &str) -> String {
    format!("{account_id}.dkr.ecr.{region}.amazonaws.com")
}

/// Pull credentials for one registry.
#[derive(Debug)]
pub struct Credentials {
    pub registry: String,
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(registry: impl Into<String>, username: impl Into<String>, password: String) -> Self {
        Self {
            registry: registry.into(),
            username: username.into(),
            password: SecretString::from(password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn sample() -> DeploymentConfig {
        DeploymentConfig::from_pairs([
            (ACCOUNT_ID, "111"),
            (REGION, "us-east-1"),
            (REPOSITORY, "aegis"),
        ])
    }

    #[test]
    fn composes_ecr_reference() {
        let config = DeploymentConfig::from_pairs([
            (ACCOUNT_ID, "111"),
            (REGION, "us-east-1"),
            (REPOSITORY, "aegis"),
            (IMAGE_TAG, "latest"),
        ]);

        assert_eq!(
            config.image_reference().unwrap().to_string(),
            "111.dkr.ecr.us-east-1.amazonaws.com/aegis:latest"
        );
    }

    #[test]
    fn image_tag_defaults_to_latest() {
        let config = sample();
        assert_eq!(config.image_tag(), "latest");
        assert_eq!(config.get(IMAGE_TAG), Some("latest"));
    }

    #[test]
    fn blank_image_tag_falls_back_to_default() {
        let config = DeploymentConfig::from_pairs([(IMAGE_TAG, "  ")]);
        assert_eq!(config.image_tag(), "latest");
    }

    #[test]
    fn explicit_tag_is_kept() {
        let config = DeploymentConfig::from_pairs([(IMAGE_TAG, "v1.4.2")]);
        assert_eq!(config.image_tag(), "v1.4.2");
    }

    #[test]
    fn require_reports_missing_key() {
        let config = DeploymentConfig::from_pairs([(ACCOUNT_ID, "111")]);
        let err = config.region().unwrap_err();
        assert!(matches!(err, DeployError::ConfigInvalid(ref msg) if msg.contains("AWS_REGION")));
    }

    #[test]
    fn require_points_at_legacy_alias() {
        let config = DeploymentConfig::from_pairs([("AWS_DEFAULT_REGION", "eu-west-1")]);
        let err = config.region().unwrap_err().to_string();
        assert!(err.contains("AWS_DEFAULT_REGION"));
    }

    #[test]
    fn empty_value_is_rejected() {
        let config = DeploymentConfig::from_pairs([(REPOSITORY, "")]);
        assert!(config.repository().is_err());
    }

    #[test]
    fn absent_keys_lists_unprovided_canonical_keys() {
        let config = DeploymentConfig::from_pairs([(ACCOUNT_ID, "111"), (REGION, "us-east-1")]);
        let absent = config.absent_keys();

        assert!(absent.contains(&REPOSITORY));
        assert!(absent.contains(&JWT_SECRET));
        assert!(!absent.contains(&REGION));
        assert!(!absent.contains(&IMAGE_TAG));
    }

    #[test]
    fn debug_output_hides_values() {
        let config = DeploymentConfig::from_pairs([(JWT_SECRET, "super-secret-value")]);
        let rendered = format!("{config:?}");
        assert!(rendered.contains(JWT_SECRET));
        assert!(!rendered.contains("super-secret-value"));
    }

    #[test]
    fn credentials_do_not_leak_password() {
        let creds = Credentials::new("reg", "AWS", "hunter2".to_string());
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert_eq!(creds.password.expose_secret(), "hunter2");
    }
}
