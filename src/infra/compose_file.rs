use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Default)]
struct ComposeFile {
    name: Option<String>,
    #[serde(default)]
    services: serde_yml::Mapping,
}

#[derive(Deserialize, Debug, Default)]
struct ComposeService {
    container_name: Option<String>,
}

/// Container names declared by a compose file, in declaration order.
/// A service's `container_name` wins over its key.
pub fn declared_services(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).with_context(|| format!("lendo {:?}", path))?;
    parse_services(&content).with_context(|| format!("parse de {:?}", path))
}

fn parse_services(content: &str) -> Result<Vec<String>> {
    let file: ComposeFile = serde_yml::from_str(content)?;

    let mut names = Vec::with_capacity(file.services.len());
    for (key, value) in file.services {
        let Some(key) = key.as_str() else {
            bail!("nome de serviço não é texto: {:?}", key);
        };

        let service: ComposeService = if value.is_null() {
            ComposeService::default()
        } else {
            serde_yml::from_value(value)
                .with_context(|| format!("serviço '{key}' malformado"))?
        };

        names.push(service.container_name.unwrap_or_else(|| key.to_string()));
    }

    if names.is_empty() {
        bail!("nenhum serviço declarado");
    }

    Ok(names)
}

/// Project name compose will use for this file: the top-level `name:` key,
/// else the directory holding the file. Normalized the way compose does.
pub fn project_name(path: &Path) -> Option<String> {
    let declared = fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_yml::from_str::<ComposeFile>(&content).ok())
        .and_then(|file| file.name);

    let raw = declared.or_else(|| {
        path.parent()
            .and_then(Path::file_name)
            .map(|dir| dir.to_string_lossy().into_owned())
    })?;

    let normalized = normalize_project(&raw);
    (!normalized.is_empty()).then_some(normalized)
}

fn normalize_project(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .trim_start_matches(['-', '_'])
        .to_string()
}
