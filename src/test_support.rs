use crate::domain::{
    ContainerRuntime, ContainerState, ContainerStatus, Credentials, DeploymentConfig, Presence,
    RegistryClient,
};
use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct MockContainer {
    pub name: String,
    pub image: String,
    pub state: ContainerState,
}

/// In-memory container runtime. Every call is recorded as `"verb:arg"`.
#[derive(Debug)]
pub struct MockRuntime {
    containers: RwLock<Vec<MockContainer>>,
    commands: RwLock<Vec<String>>,
    fail_on: RwLock<Option<String>>,
    compose_services: RwLock<Vec<String>>,
    crashing: RwLock<HashSet<String>>,
    slow_start: RwLock<HashMap<String, u32>>,
    logs: RwLock<HashMap<String, String>>,
    pulled: RwLock<Vec<String>>,
    last_compose_image: RwLock<Option<String>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
            fail_on: RwLock::new(None),
            compose_services: RwLock::new(Vec::new()),
            crashing: RwLock::new(HashSet::new()),
            slow_start: RwLock::new(HashMap::new()),
            logs: RwLock::new(HashMap::new()),
            pulled: RwLock::new(Vec::new()),
            last_compose_image: RwLock::new(None),
        }
    }

    pub fn add_container(&self, name: &str, state: ContainerState) {
        let mut containers = self.containers.write().unwrap();
        containers.retain(|c| c.name != name);
        containers.push(MockContainer {
            name: name.to_string(),
            image: "previous:latest".to_string(),
            state,
        });
    }

    /// Services `compose_up` will create.
    pub fn declare_compose_services(&self, names: &[&str]) {
        *self.compose_services.write().unwrap() = names.iter().map(|s| s.to_string()).collect();
    }

    /// The service is created by `compose_up` but exits immediately.
    pub fn set_crashing(&self, name: &str) {
        self.crashing.write().unwrap().insert(name.to_string());
    }

    /// The service only shows as running after `polls` listings.
    pub fn set_running_after_polls(&self, name: &str, polls: u32) {
        self.slow_start
            .write()
            .unwrap()
            .insert(name.to_string(), polls);
    }

    pub fn set_logs(&self, name: &str, logs: &str) {
        self.logs
            .write()
            .unwrap()
            .insert(name.to_string(), logs.to_string());
    }

    pub fn set_fail_on(&self, operation: &str) {
        *self.fail_on.write().unwrap() = Some(operation.to_string());
    }

    pub fn clear_fail_on(&self) {
        *self.fail_on.write().unwrap() = None;
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }

    pub fn container_exists(&self, name: &str) -> bool {
        self.containers.read().unwrap().iter().any(|c| c.name == name)
    }

    pub fn get_state(&self, name: &str) -> Option<ContainerState> {
        self.containers
            .read()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.state.clone())
    }

    pub fn running_names(&self) -> Vec<String> {
        self.containers
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.state == ContainerState::Running)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.pulled.read().unwrap().clone()
    }

    pub fn last_compose_image(&self) -> Option<String> {
        self.last_compose_image.read().unwrap().clone()
    }

    fn record_command(&self, cmd: &str) {
        self.commands.write().unwrap().push(cmd.to_string());
    }

    fn check_fail(&self, operation: &str) -> Result<()> {
        if let Some(ref fail_on) = *self.fail_on.read().unwrap() {
            if fail_on == operation {
                bail!("Mock failure on: {}", operation);
            }
        }
        Ok(())
    }

    fn advance_slow_starts(&self) {
        let mut slow = self.slow_start.write().unwrap();
        let mut containers = self.containers.write().unwrap();

        for (name, remaining) in slow.iter_mut() {
            if *remaining == 0 {
                continue;
            }
            *remaining -= 1;
            if *remaining == 0 {
                if let Some(c) = containers.iter_mut().find(|c| &c.name == name) {
                    c.state = ContainerState::Running;
                }
            }
        }
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerRuntime for MockRuntime {
    fn list_containers(&self) -> Result<Vec<ContainerStatus>> {
        self.record_command("list");
        self.check_fail("list")?;

        let rows = self
            .containers
            .read()
            .unwrap()
            .iter()
            .map(|c| ContainerStatus {
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state.clone(),
                status: match c.state {
                    ContainerState::Running => "Up".to_string(),
                    _ => "Exited (1)".to_string(),
                },
            })
            .collect();

        self.advance_slow_starts();
        Ok(rows)
    }

    fn stop_container(&self, name: &str) -> Result<Presence> {
        self.record_command(&format!("stop:{}", name));
        self.check_fail("stop")?;

        match self
            .containers
            .write()
            .unwrap()
            .iter_mut()
            .find(|c| c.name == name)
        {
            Some(container) => {
                container.state = ContainerState::Stopped;
                Ok(Presence::Found)
            }
            None => Ok(Presence::Missing),
        }
    }

    fn remove_container(&self, name: &str) -> Result<Presence> {
        self.record_command(&format!("remove:{}", name));
        self.check_fail("remove")?;

        let mut containers = self.containers.write().unwrap();
        let before = containers.len();
        containers.retain(|c| c.name != name);
        Ok(if containers.len() < before {
            Presence::Found
        } else {
            Presence::Missing
        })
    }

    fn pull_image(&self, image: &str, _credentials: &Credentials) -> Result<()> {
        self.record_command(&format!("pull:{}", image));
        self.check_fail("pull")?;

        self.pulled.write().unwrap().push(image.to_string());
        Ok(())
    }

    fn prune_images(&self) -> Result<()> {
        self.record_command("prune:images");
        self.check_fail("prune_images")?;
        Ok(())
    }

    fn compose_up(
        &self,
        compose_file: &Path,
        _project: Option<&str>,
        _env: &DeploymentConfig,
        image: &str,
    ) -> Result<()> {
        self.record_command(&format!("compose_up:{}", compose_file.display()));
        self.check_fail("compose_up")?;

        *self.last_compose_image.write().unwrap() = Some(image.to_string());

        let services = self.compose_services.read().unwrap().clone();
        let crashing = self.crashing.read().unwrap().clone();
        let slow = self.slow_start.read().unwrap().clone();

        let mut containers = self.containers.write().unwrap();
        for name in services {
            let state = if crashing.contains(&name) || slow.get(&name).is_some_and(|n| *n > 0) {
                ContainerState::Stopped
            } else {
                ContainerState::Running
            };
            containers.retain(|c| c.name != name);
            containers.push(MockContainer {
                name,
                image: image.to_string(),
                state,
            });
        }
        Ok(())
    }

    fn logs_tail(&self, name: &str, lines: usize) -> Result<String> {
        self.record_command(&format!("logs:{}", name));
        self.check_fail("logs")?;

        let logs = self.logs.read().unwrap();
        let Some(text) = logs.get(name) else {
            bail!("No such container: {}", name);
        };

        let all: Vec<&str> = text.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].join("\n"))
    }
}

/// Registry client that hands out a fixed token, or fails on demand.
#[derive(Debug, Default)]
pub struct MockRegistry {
    commands: RwLock<Vec<String>>,
    fail: RwLock<bool>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.write().unwrap() = fail;
    }

    pub fn get_commands(&self) -> Vec<String> {
        self.commands.read().unwrap().clone()
    }
}

impl RegistryClient for MockRegistry {
    fn login(&self, account_id: &str, region: &str) -> Result<Credentials> {
        self.commands
            .write()
            .unwrap()
            .push(format!("login:{}:{}", account_id, region));

        if *self.fail.read().unwrap() {
            bail!("Mock failure on: login");
        }

        Ok(Credentials::new(
            crate::domain::config::registry_host(account_id, region),
            "AWS",
            "mock-token".to_string(),
        ))
    }
}
