//! One provisioning pass: mount, load, rewrite, apply, report, unmount
//!
//! Errors up to and including the switch-over of the interfaces file are
//! fatal and returned as [`Fatal`]; everything after that is recorded in the
//! report log by the [`ActionSequencer`].

use crate::{
    command_runner::CommandRunner,
    config::AppConfig,
    services::{
        actions::ActionSequencer,
        fatal::Fatal,
        interfaces::rewrite_into,
        medium::Medium,
        report::ReportLog,
        settings::ProvisioningSettings,
        status::{StatusCode, StatusContext},
    },
};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
};

pub struct Provisioner<'a, R, M> {
    config: &'a AppConfig,
    runner: R,
    medium: M,
}

impl<'a, R: CommandRunner, M: Medium> Provisioner<'a, R, M> {
    pub fn new(config: &'a AppConfig, runner: R, medium: M) -> Self {
        Self {
            config,
            runner,
            medium,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Run a full provisioning pass
    ///
    /// Returns the terminal status posted by the action sequencer. On a fatal
    /// error the medium has already been unmounted and the report closed; the
    /// caller is expected to escalate.
    pub async fn run(&self, status: &StatusContext) -> Result<StatusCode, Fatal> {
        let mount_point = self.medium.mount_point();

        fs::create_dir_all(mount_point)
            .context(format!("failed to create mount point {mount_point:?}"))
            .map_err(|e| Fatal::new(StatusCode::Error, e))?;

        self.medium
            .mount()
            .map_err(|e| Fatal::new(StatusCode::NoConfig, e))?;

        let settings = match self.load_settings() {
            Ok(settings) => settings,
            Err(e) => {
                self.unmount();
                return Err(Fatal::new(StatusCode::NoConfig, e));
            }
        };

        info!("settings: {settings:?}");
        debug!("{} service parameters passed through", settings.service_params.len());

        let mut report = match ReportLog::create(&self.config.paths.report_file) {
            Ok(report) => report,
            Err(e) => {
                self.unmount();
                return Err(Fatal::new(StatusCode::Error, e));
            }
        };

        if let Err(e) = self.install_interfaces(&settings, &mut report) {
            return Err(self.abort(report, "failed to install interfaces", e));
        }

        let outcome = ActionSequencer::new(self.config, &self.runner, status)
            .run(&settings, &mut report)
            .await;

        report.close();
        self.unmount();

        Ok(outcome)
    }

    fn load_settings(&self) -> Result<ProvisioningSettings> {
        let path = &self.config.paths.settings_file;
        let document =
            fs::read_to_string(path).context(format!("failed to read settings {path:?}"))?;

        ProvisioningSettings::from_yaml(&document)
    }

    /// Write the rewritten interfaces file next to the current one and switch over
    fn install_interfaces<W: Write>(
        &self,
        settings: &ProvisioningSettings,
        report: &mut ReportLog<W>,
    ) -> Result<()> {
        let current = &self.config.paths.interfaces_file;
        let staged = &self.config.paths.interfaces_new_file;

        let file = File::create(staged).context(format!("failed to create {staged:?}"))?;
        let source = fs::read(current).context(format!("failed to read {current:?}"))?;

        let mut writer = BufWriter::new(file);
        let mut written = Ok(());

        rewrite_into(&source, settings, |line| {
            report.record_line(current, line);

            if written.is_ok() {
                written = writer
                    .write_all(line)
                    .and_then(|()| writer.write_all(b"\n"));
            }
        });

        written.context(format!("failed to write {staged:?}"))?;
        writer
            .flush()
            .context(format!("failed to flush {staged:?}"))?;
        writer
            .get_ref()
            .sync_all()
            .context(format!("failed to sync {staged:?}"))?;

        fs::rename(staged, current)
            .context(format!("failed to switch over {staged:?} to {current:?}"))?;

        info!("installed new {current:?}");
        Ok(())
    }

    fn abort<W: Write>(&self, mut report: ReportLog<W>, msg: &str, e: anyhow::Error) -> Fatal {
        error!("{msg}: {e:#}");

        report.record_error(msg, &e);
        report.close();
        self.unmount();

        Fatal::new(StatusCode::Error, e.context(msg.to_string()))
    }

    fn unmount(&self) {
        if let Err(e) = self.medium.unmount() {
            error!("failed to unmount medium: {e:#}");
        }
    }
}
