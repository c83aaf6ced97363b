use env_logger::{Builder, Env, Target};
use log::info;
use rpac::{
    command_runner::SystemCommandRunner,
    config::AppConfig,
    services::{
        fatal, hardening,
        medium::BlockDeviceMedium,
        provision::Provisioner,
        status::{SignalController, SysfsLed},
    },
};
use std::io::Write;

#[tokio::main]
async fn main() {
    initialize();

    let config = AppConfig::get();

    let (status, _signal_task) = SignalController::start(
        SysfsLed::new(&config.indicator.led_dir),
        &config.indicator,
        config.timing.final_render_delay,
    );

    hardening::apply(&config.hardening);

    let provisioner = Provisioner::new(
        config,
        SystemCommandRunner,
        BlockDeviceMedium::new(&config.medium),
    );

    match provisioner.run(&status).await {
        Ok(outcome) => {
            info!("provisioning finished: {outcome}");
            match status.idle().await {}
        }
        Err(e) => match fatal::escalate(status, e).await {},
    }
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!(
        "module version: {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHORT_REV")
    );
}
