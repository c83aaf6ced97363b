use anyhow::{Context, Result};
use log::debug;
use std::process::ExitStatus;
use tokio::process::Command;
use trait_variant::make;

/// Captured result of a finished external command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    /// stdout followed by stderr
    pub output: Vec<u8>,
}

impl CommandOutput {
    /// Failure description for an unsuccessful command, `None` on success
    pub fn failure(&self) -> Option<String> {
        if self.success {
            return None;
        }

        Some(match self.code {
            Some(code) => format!("exit status: {code}"),
            None => "terminated by signal".to_string(),
        })
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        let status: ExitStatus = output.status;
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Self {
            success: status.success(),
            code: status.code(),
            output: combined,
        }
    }
}

/// Executes external programs on behalf of the action sequencer
///
/// `Err` means the program could not be started or waited for; a program that
/// ran and failed is reported through `CommandOutput::success`.
#[make(Send)]
pub trait CommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs programs on the host
#[derive(Clone, Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!("exec {program} {}", args.join(" "));

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .context(format!("failed to execute {program}"))?;

        Ok(output.into())
    }
}
