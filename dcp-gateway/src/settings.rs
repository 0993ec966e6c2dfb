//! Gateway settings

use std::path::{Path, PathBuf};

use anyhow::Context;
use dcp_mux::{FilterConfig, InterfaceId, InterfaceParams, MuxConfig};
use serde::{Deserialize, Serialize};

/// Socket kind used on the message bus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    #[default]
    Dealer,
    Pair,
    Pub,
    Sub,
}

/// Message bus endpoint the switching core is reached through
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSettings {
    /// Connect string, e.g. `tcp://127.0.0.1:5570`
    #[serde(default)]
    pub connect: String,
    /// Socket kind
    #[serde(default)]
    pub socket: SocketKind,
}

/// One configured station interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSettings {
    /// Interface id on the HUA link
    pub id: u16,
    /// Logical channel number
    #[serde(default = "default_lcn")]
    pub lcn: u8,
    /// Hardware name; `dcp<id>` when absent
    #[serde(default)]
    pub hwname: Option<String>,
}

fn default_lcn() -> u8 {
    1
}

impl InterfaceSettings {
    pub fn id(&self) -> InterfaceId {
        InterfaceId(self.id)
    }

    pub fn params(&self) -> InterfaceParams {
        InterfaceParams {
            lcn: self.lcn,
            hwname: self.hwname.clone(),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway name, used in logs and the link-up greeting
    pub name: String,
    /// Transport connect string: `tcp:host:port`, `serial:path[@baud]` or `loopback`
    pub transport: String,
    /// Message bus endpoint
    #[serde(default)]
    pub bus: BusSettings,
    /// Log verbosity when `RUST_LOG` is unset: 0 warn, 1 info, 2 debug, 3 trace
    #[serde(default = "default_debug_level")]
    pub debug_level: u8,
    /// Display text written to a station when its link comes up
    #[serde(default)]
    pub greeting: Option<String>,
    /// Station interfaces to bring up
    #[serde(default)]
    pub interfaces: Vec<InterfaceSettings>,
    /// Station filter
    #[serde(default)]
    pub filter: Option<FilterConfig>,
    /// Multiplexer timing
    #[serde(default)]
    pub mux: MuxConfig,
}

fn default_debug_level() -> u8 {
    1
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "dcp-gateway".to_string(),
            transport: "loopback".to_string(),
            bus: BusSettings::default(),
            debug_level: default_debug_level(),
            greeting: Some("DCP gateway ready".to_string()),
            interfaces: (1..=2)
                .map(|id| InterfaceSettings {
                    id,
                    lcn: default_lcn(),
                    hwname: None,
                })
                .collect(),
            filter: None,
            mux: MuxConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Get the XDG config directory for dcp-gateway
    /// Uses $XDG_CONFIG_HOME/dcp-gateway, falls back to ~/.config/dcp-gateway
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("dcp-gateway"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("dcp-gateway"))
    }

    /// Default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration
    ///
    /// An explicit path must exist. Without one the default path is used if
    /// present, otherwise built-in defaults (a loopback demo).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// Parse configuration from JSON text
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut ids: Vec<u16> = self.interfaces.iter().map(|i| i.id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("interface {} configured twice", pair[0]);
        }
        self.mux.validate().context("mux settings")?;
        Ok(())
    }

    /// Default `EnvFilter` directive for the configured debug level
    pub fn log_directive(&self) -> String {
        let level = match self.debug_level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        format!(
            "dcp_gateway={level},dcp_protocol={level},dcp_mux={level},dcp_sim={level}"
        )
    }
}
