//! Runs external commands with their console output captured.
//!
//! Every invocation is logged through `tracing` (debug on success, warn on
//! failure) and, when a transcript file is configured, appended to it so
//! operators can read the full output of a failed deploy afterwards.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Output, Stdio};
use tracing::{debug, warn};

/// Output of a finished command.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Short reason for error messages: stderr when present, else stdout.
    pub fn reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("status {:?}", self.status.code())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    transcript: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(transcript: Option<PathBuf>) -> Self {
        Self { transcript }
    }

    pub fn run(&self, cmd: &mut Command, context: &str) -> Result<CapturedOutput> {
        let line = describe(cmd);
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("{context} ({line})"))?;
        Ok(self.capture(&line, output, false))
    }

    /// Like `run`, but stdout is kept out of logs and the transcript.
    /// For commands that print credentials.
    pub fn run_redacted(&self, cmd: &mut Command, context: &str) -> Result<CapturedOutput> {
        let line = describe(cmd);
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("{context} ({line})"))?;
        Ok(self.capture(&line, output, true))
    }

    /// Like `run`, feeding `input` on stdin. Used for secrets that must not
    /// appear on the command line.
    pub fn run_with_stdin(
        &self,
        cmd: &mut Command,
        input: &[u8],
        context: &str,
    ) -> Result<CapturedOutput> {
        let line = describe(cmd);
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("{context} ({line})"))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .with_context(|| format!("escrevendo stdin de {line}"))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("aguardando {line}"))?;
        Ok(self.capture(&line, output, false))
    }

    fn capture(&self, line: &str, output: Output, redact_stdout: bool) -> CapturedOutput {
        let captured = CapturedOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        let visible = if redact_stdout {
            CapturedOutput {
                stdout: String::new(),
                ..captured.clone()
            }
        } else {
            captured.clone()
        };

        if visible.success() {
            debug!("$ {line}");
            if !visible.stdout.trim().is_empty() {
                debug!("{}", visible.stdout.trim_end());
            }
            if !visible.stderr.trim().is_empty() {
                debug!("{}", visible.stderr.trim_end());
            }
        } else {
            warn!("$ {line} -> {:?}", visible.status.code());
            if !visible.stdout.trim().is_empty() {
                warn!("{}", visible.stdout.trim_end());
            }
            if !visible.stderr.trim().is_empty() {
                warn!("{}", visible.stderr.trim_end());
            }
        }

        self.append_transcript(line, &visible);
        captured
    }

    fn append_transcript(&self, line: &str, captured: &CapturedOutput) {
        let Some(path) = &self.transcript else {
            return;
        };

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| {
                writeln!(file, "$ {line}")?;
                file.write_all(captured.stdout.as_bytes())?;
                file.write_all(captured.stderr.as_bytes())?;
                writeln!(file, "# exit {:?}", captured.status.code())
            });

        if let Err(e) = result {
            warn!("Não foi possível gravar transcript em {:?}: {}", path, e);
        }
    }
}

/// Program and arguments only; environment is left out since it carries
/// configuration values.
fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
