// SPDX-License-Identifier: CEPL-1.0
use std::{fs, io, path::Path};

use lumen_core::Version;
use lumen_platform::WindowSettings;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "lumen.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub version: Version,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: Version::default(),
        }
    }
}

fn default_name() -> String {
    "Unnamed Lumen App".to_owned()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct RenderSection {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            clear_color: default_clear(),
        }
    }
}

fn default_clear() -> [f32; 4] {
    [1.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub render: RenderSection,
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Missing file gives defaults; a malformed one is reported and ignored.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match Self::parse(&text) {
                Ok(cfg) => {
                    info!("config: loaded {}", path.display());
                    cfg
                }
                Err(e) => {
                    warn!("config: {} is malformed, using defaults: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!("config: cannot read {}: {e}", path.display());
                Self::default()
            }
        }
    }
}
