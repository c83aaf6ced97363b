//! Ordered system actions applying a freshly installed interfaces file
//!
//! Every action is recorded in the report log. A failing action never stops
//! the sequence: once networking is being reconfigured the device has to reach
//! a reportable end state.

use crate::{
    command_runner::CommandRunner,
    config::{AppConfig, TeardownPolicy},
    services::{
        report::{ActionRecord, ReportLog},
        settings::{Mode, ProvisioningSettings},
        status::{StatusCode, StatusContext},
    },
};
use log::{info, warn};
use std::io::Write;
use tokio::time::{sleep, timeout};

const ETH_INTERFACE: &str = "eth0";
const WIFI_INTERFACE: &str = "wlan0";

/// One external command with the tag it is reported under
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub tag: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Action {
    pub fn new(tag: impl Into<String>, program: &str, args: &[&str]) -> Self {
        Self {
            tag: tag.into(),
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Whether the interface is taken down before the new configuration is applied
pub fn tears_down(policy: TeardownPolicy, mode: Mode) -> bool {
    match policy {
        TeardownPolicy::Always => true,
        TeardownPolicy::Managed => mode != Mode::Leave,
    }
}

/// Interface down/up actions for `settings`, in execution order
pub fn link_actions(config: &AppConfig, settings: &ProvisioningSettings) -> Vec<Action> {
    let commands = &config.commands;
    let mut actions = Vec::new();

    for (name, mode) in [
        (WIFI_INTERFACE, settings.wifi_mode),
        (ETH_INTERFACE, settings.eth_mode),
    ] {
        if tears_down(config.teardown, mode) {
            actions.push(Action::new(format!("ifdown {name}"), &commands.ifdown, &[name]));
            actions.push(Action::new(
                format!("linkdown {name}"),
                &commands.ip,
                &["link", "set", name, "down"],
            ));
        }
    }

    for (name, mode) in [
        (WIFI_INTERFACE, settings.wifi_mode),
        (ETH_INTERFACE, settings.eth_mode),
    ] {
        if mode.brings_up() {
            actions.push(Action::new(format!("ifup {name}"), &commands.ifup, &[name]));
        }
    }

    actions
}

/// Snapshot of the resulting network state
pub fn diagnostic_actions(config: &AppConfig) -> Vec<Action> {
    let commands = &config.commands;

    vec![
        Action::new("ifconfig", &commands.ifconfig, &["-a"]),
        Action::new("iplink", &commands.ip, &["link", "show"]),
        Action::new("iproute", &commands.ip, &["route"]),
    ]
}

pub fn probe_action(config: &AppConfig) -> Action {
    let probe = &config.probe;

    let deadline = format!("-w{}", probe.deadline_secs);
    let interval = format!("-i{}", probe.interval);

    Action::new(
        "ping",
        &config.commands.ping,
        &[deadline.as_str(), interval.as_str(), probe.target.as_str()],
    )
}

pub fn overlay_action(config: &AppConfig) -> Action {
    let source = format!("{}/", config.paths.overlay_dir.display());
    let target = config.paths.overlay_target.display().to_string();

    Action::new(
        "cpfiles",
        &config.commands.cp,
        &["-rT", source.as_str(), target.as_str()],
    )
}

pub fn service_actions(config: &AppConfig) -> Vec<Action> {
    let commands = &config.commands;

    vec![
        Action::new("svcreload", &commands.service, &["supervisor", "restart"]),
        Action::new("svcstatus", &commands.supervisorctl, &["status"]),
    ]
}

/// Runs the fixed action sequence of a provisioning pass
pub struct ActionSequencer<'a, R> {
    config: &'a AppConfig,
    runner: &'a R,
    status: &'a StatusContext,
}

impl<'a, R: CommandRunner> ActionSequencer<'a, R> {
    pub fn new(config: &'a AppConfig, runner: &'a R, status: &'a StatusContext) -> Self {
        Self {
            config,
            runner,
            status,
        }
    }

    /// Apply `settings` and return the terminal status that was posted
    pub async fn run<W: Write>(
        &self,
        settings: &ProvisioningSettings,
        report: &mut ReportLog<W>,
    ) -> StatusCode {
        self.status.post(StatusCode::Busy).await;

        for action in link_actions(self.config, settings) {
            self.observe(&action, report).await;
        }

        info!("waiting {:?} for links to settle", self.config.timing.settle_delay);
        sleep(self.config.timing.settle_delay).await;

        for action in diagnostic_actions(self.config) {
            self.observe(&action, report).await;
        }

        let outcome = if self.probe(report).await {
            StatusCode::Success
        } else {
            StatusCode::NoInternet
        };
        self.status.post(outcome).await;

        if self.config.paths.overlay_dir.is_dir() {
            self.observe(&overlay_action(self.config), report).await;
        } else {
            report.record_note(&format!(
                "cpfiles skipped: no overlay at {}",
                self.config.paths.overlay_dir.display()
            ));
        }

        for action in service_actions(self.config) {
            self.observe(&action, report).await;
        }

        outcome
    }

    /// Run one action and record it
    pub async fn observe<W: Write>(
        &self,
        action: &Action,
        report: &mut ReportLog<W>,
    ) -> ActionRecord {
        let record = self.execute(action).await;
        report.record_action(&record);
        record
    }

    async fn execute(&self, action: &Action) -> ActionRecord {
        let (output, failure) = match self.runner.run(&action.program, &action.args).await {
            Ok(output) => {
                let failure = output.failure();
                (output.output, failure)
            }
            Err(e) => (Vec::new(), Some(format!("{e:#}"))),
        };

        if let Some(failure) = &failure {
            warn!("{} failed: {failure}", action.tag);
        }

        ActionRecord {
            tag: action.tag.clone(),
            command: action.command_line(),
            output,
            failure,
        }
    }

    async fn probe<W: Write>(&self, report: &mut ReportLog<W>) -> bool {
        let action = probe_action(self.config);

        let record = match timeout(self.config.probe.timeout, self.execute(&action)).await {
            Ok(record) => record,
            Err(_) => ActionRecord {
                tag: action.tag.clone(),
                command: action.command_line(),
                output: Vec::new(),
                failure: Some(format!("timed out after {:?}", self.config.probe.timeout)),
            },
        };

        report.record_action(&record);
        record.succeeded()
    }
}
