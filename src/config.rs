use std::{path::PathBuf, sync::OnceLock, time::Duration};

/// Agent configuration
///
/// All values are compiled in: the agent's behavior is driven exclusively by
/// the contents of the removable medium. Tests construct the struct directly
/// and point the paths into a temporary directory.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Removable medium carrying the operator configuration
    pub medium: MediumConfig,

    /// Files read and written during a provisioning pass
    pub paths: PathConfig,

    /// External utilities invoked by the action sequencer
    pub commands: CommandConfig,

    /// Connectivity probe parameters
    pub probe: ProbeConfig,

    /// Status LED configuration
    pub indicator: IndicatorConfig,

    /// Fixed delays of the workflow
    pub timing: TimingConfig,

    /// Best-effort kernel network settings applied before provisioning
    pub hardening: HardeningConfig,

    /// Which interfaces are torn down before the new configuration is brought up
    pub teardown: TeardownPolicy,
}

#[derive(Clone, Debug)]
pub struct MediumConfig {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub settings_file: PathBuf,
    pub report_file: PathBuf,
    pub overlay_dir: PathBuf,
    pub overlay_target: PathBuf,
    pub interfaces_file: PathBuf,
    pub interfaces_new_file: PathBuf,
}

#[derive(Clone, Debug)]
pub struct CommandConfig {
    pub ifdown: String,
    pub ifup: String,
    pub ip: String,
    pub ifconfig: String,
    pub ping: String,
    pub cp: String,
    pub service: String,
    pub supervisorctl: String,
}

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    pub target: String,
    /// Deadline handed to `ping -w`
    pub deadline_secs: u64,
    /// Interval handed to `ping -i`
    pub interval: String,
    /// Hard upper bound on the probe, enforced on top of the ping deadline
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct IndicatorConfig {
    pub led_dir: PathBuf,
    pub queue_capacity: usize,
    pub blink: BlinkTiming,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlinkTiming {
    pub on: Duration,
    pub off: Duration,
    pub idle: Duration,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    /// Pause after bringing links up, for negotiation and DHCP leases
    pub settle_delay: Duration,
    /// Time granted to the LED task to render a terminal code before halting
    pub final_render_delay: Duration,
}

#[derive(Clone, Debug)]
pub struct HardeningConfig {
    /// Kernel attributes and the value written to each of them
    pub sysctls: Vec<(PathBuf, String)>,
}

/// Teardown guard for the interface down actions
///
/// The agent historically guarded the down actions with
/// `mode != leave || mode == down`, which holds for every mode. `Always`
/// keeps that observable behavior, `Managed` restricts teardown to
/// interfaces whose mode is not `leave`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TeardownPolicy {
    #[default]
    Always,
    Managed,
}

impl AppConfig {
    /// Get the process-wide configuration
    ///
    /// Returns a reference to the cached configuration, built on first use.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(Self::default)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let medium = MediumConfig::default();
        let paths = PathConfig::on_medium(&medium.mount_point);

        Self {
            medium,
            paths,
            commands: CommandConfig::default(),
            probe: ProbeConfig::default(),
            indicator: IndicatorConfig::default(),
            timing: TimingConfig::default(),
            hardening: HardeningConfig::default(),
            teardown: TeardownPolicy::default(),
        }
    }
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/sda1"),
            mount_point: PathBuf::from("/mnt/rpac"),
            fs_type: "vfat".to_string(),
        }
    }
}

impl PathConfig {
    /// Paths for a medium mounted at `mount_point`
    pub fn on_medium(mount_point: &std::path::Path) -> Self {
        Self {
            settings_file: mount_point.join("config.yml"),
            report_file: mount_point.join("config.log"),
            overlay_dir: mount_point.join("files"),
            overlay_target: PathBuf::from("/"),
            interfaces_file: PathBuf::from("/etc/network/interfaces"),
            interfaces_new_file: PathBuf::from("/etc/network/interfaces.new"),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            ifdown: "/sbin/ifdown".to_string(),
            ifup: "/sbin/ifup".to_string(),
            ip: "/sbin/ip".to_string(),
            ifconfig: "/sbin/ifconfig".to_string(),
            ping: "/bin/ping".to_string(),
            cp: "/bin/cp".to_string(),
            service: "/usr/sbin/service".to_string(),
            supervisorctl: "/usr/bin/supervisorctl".to_string(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target: "google.com".to_string(),
            deadline_secs: 5,
            interval: "0.5".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            led_dir: PathBuf::from("/sys/class/leds/led0"),
            queue_capacity: 3,
            blink: BlinkTiming::default(),
        }
    }
}

impl Default for BlinkTiming {
    fn default() -> Self {
        Self {
            on: Duration::from_millis(80),
            off: Duration::from_millis(270),
            idle: Duration::from_millis(900),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(5),
            final_render_delay: Duration::from_secs(10),
        }
    }
}

impl Default for HardeningConfig {
    fn default() -> Self {
        Self {
            sysctls: vec![
                (
                    PathBuf::from("/proc/sys/net/ipv6/conf/all/disable_ipv6"),
                    "1".to_string(),
                ),
                (
                    PathBuf::from("/proc/sys/net/ipv6/conf/default/disable_ipv6"),
                    "1".to_string(),
                ),
            ],
        }
    }
}
