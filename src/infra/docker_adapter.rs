use crate::domain::config::IMAGE_URI;
use crate::domain::{
    ContainerRuntime, ContainerState, ContainerStatus, Credentials, DeploymentConfig, Presence,
};
use crate::infra::command::{CapturedOutput, CommandRunner};
use anyhow::{Result, bail};
use secrecy::ExposeSecret;
use std::path::Path;
use std::process::Command;

const LIST_FORMAT: &str = "{{.Names}}\t{{.Image}}\t{{.State}}\t{{.Status}}";

/// Container runtime backed by the `docker` CLI (or a compatible binary
/// such as `podman`).
#[derive(Debug, Clone)]
pub struct DockerAdapter {
    binary: String,
    runner: CommandRunner,
}

impl DockerAdapter {
    pub fn new(binary: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    fn run<I, S>(&self, args: I, context: &str) -> Result<CapturedOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.runner.run(self.command().args(args), context)
    }
}

impl ContainerRuntime for DockerAdapter {
    fn list_containers(&self) -> Result<Vec<ContainerStatus>> {
        let out = self.run(
            ["ps", "-a", "--format", LIST_FORMAT],
            "listando containers",
        )?;
        if !out.success() {
            bail!("{} ps falhou: {}", self.binary, out.reason());
        }

        Ok(parse_listing(&out.stdout))
    }

    fn stop_container(&self, name: &str) -> Result<Presence> {
        let out = self.run(["stop", name], &format!("parando container {name}"))?;
        presence_from(out, name, "stop")
    }

    fn remove_container(&self, name: &str) -> Result<Presence> {
        let out = self.run(["rm", "-f", name], &format!("removendo container {name}"))?;
        presence_from(out, name, "rm")
    }

    fn pull_image(&self, image: &str, credentials: &Credentials) -> Result<()> {
        let login = self.runner.run_with_stdin(
            self.command().args([
                "login",
                "--username",
                credentials.username.as_str(),
                "--password-stdin",
                credentials.registry.as_str(),
            ]),
            credentials.password.expose_secret().as_bytes(),
            &format!("login em {}", credentials.registry),
        )?;
        if !login.success() {
            bail!("login em {} recusado: {}", credentials.registry, login.reason());
        }

        let out = self.run(["pull", image], &format!("baixando {image}"))?;
        if !out.success() {
            bail!("{}", out.reason());
        }

        Ok(())
    }

    fn prune_images(&self) -> Result<()> {
        let out = self.run(["image", "prune", "-f"], "removendo imagens órfãs")?;
        if !out.success() {
            bail!("image prune falhou: {}", out.reason());
        }
        Ok(())
    }

    fn compose_up(
        &self,
        compose_file: &Path,
        project: Option<&str>,
        env: &DeploymentConfig,
        image: &str,
    ) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("compose").arg("-f").arg(compose_file);
        if let Some(project) = project {
            cmd.args(["-p", project]);
        }
        cmd.args(["up", "-d", "--remove-orphans"]);

        if let Some(dir) = compose_file.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        cmd.envs(env.iter()).env(IMAGE_URI, image);

        let out = self
            .runner
            .run(&mut cmd, &format!("subindo serviços de {:?}", compose_file))?;
        if !out.success() {
            bail!("compose up falhou: {}", out.reason());
        }

        Ok(())
    }

    fn logs_tail(&self, name: &str, lines: usize) -> Result<String> {
        let lines = lines.to_string();
        let out = self.run(
            ["logs", "--tail", lines.as_str(), name],
            &format!("lendo logs de {name}"),
        )?;
        if !out.success() {
            bail!("logs de {name} indisponíveis: {}", out.reason());
        }

        // docker logs replays the container's stderr on our stderr.
        let mut combined = out.stdout;
        combined.push_str(&out.stderr);
        Ok(combined)
    }
}

fn presence_from(out: CapturedOutput, name: &str, verb: &str) -> Result<Presence> {
    if out.success() {
        return Ok(Presence::Found);
    }
    if is_not_found(&out.stderr) {
        return Ok(Presence::Missing);
    }
    bail!("{verb} {name} falhou: {}", out.reason())
}

fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such container") || stderr.contains("no container with name")
}

fn parse_listing(stdout: &str) -> Vec<ContainerStatus> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let mut cols = line.splitn(4, '\t');
            let name = cols.next()?.trim().to_string();
            let image = cols.next().unwrap_or_default().trim().to_string();
            let state = match cols.next().unwrap_or_default().trim() {
                "running" => ContainerState::Running,
                _ => ContainerState::Stopped,
            };
            let status = cols.next().unwrap_or_default().trim().to_string();
            Some(ContainerStatus {
                name,
                image,
                state,
                status,
            })
        })
        .collect()
}
