//! Operator supplied provisioning settings
//!
//! Decoded from the YAML document on the removable medium. Unknown top-level
//! keys are kept as opaque service parameters.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_valid::Validate;
use std::{collections::BTreeMap, fmt};

/// Requested handling of one network interface
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Static,
    Dhcp,
    #[default]
    Leave,
    Down,
    /// Any value outside the recognized set
    #[serde(other)]
    Other,
}

impl Mode {
    /// Whether the rewriter emits a fresh block for this interface
    pub fn emits_block(self) -> bool {
        !matches!(self, Mode::Leave | Mode::Down)
    }

    /// Whether the interface is brought up after the rewrite
    pub fn brings_up(self) -> bool {
        matches!(self, Mode::Static | Mode::Dhcp)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Static => write!(f, "static"),
            Mode::Dhcp => write!(f, "dhcp"),
            Mode::Leave => write!(f, "leave"),
            Mode::Down => write!(f, "down"),
            Mode::Other => write!(f, "other"),
        }
    }
}

#[derive(Clone, Default, Deserialize, Validate)]
pub struct ProvisioningSettings {
    #[serde(default)]
    pub eth_mode: Mode,
    #[serde(default, alias = "eth_ip")]
    pub eth_address: String,
    #[serde(default)]
    pub eth_gateway: String,

    #[serde(default)]
    pub wifi_mode: Mode,
    #[serde(default, alias = "wifi_ip")]
    pub wifi_address: String,
    #[serde(default)]
    pub wifi_gateway: String,
    #[serde(default)]
    #[validate(max_length = 32)]
    pub wifi_ssid: String,
    #[serde(default)]
    #[validate(max_length = 64)]
    pub wifi_psk: String,

    #[serde(flatten)]
    pub service_params: BTreeMap<String, serde_yaml::Value>,
}

// the pre-shared key never ends up in the system log
impl fmt::Debug for ProvisioningSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningSettings")
            .field("eth_mode", &self.eth_mode)
            .field("eth_address", &self.eth_address)
            .field("eth_gateway", &self.eth_gateway)
            .field("wifi_mode", &self.wifi_mode)
            .field("wifi_address", &self.wifi_address)
            .field("wifi_gateway", &self.wifi_gateway)
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_psk", &"<redacted>")
            .field("service_params", &self.service_params.keys())
            .finish()
    }
}

impl ProvisioningSettings {
    /// Decode and validate a settings document
    pub fn from_yaml(document: &str) -> Result<Self> {
        let settings: Self =
            serde_yaml::from_str(document).context("failed to decode settings document")?;

        settings
            .validate()
            .context("settings validation failed")?;

        Ok(settings)
    }
}
