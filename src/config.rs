/// User configuration, read from config.toml
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::imaging::thumbnail::DeliveryMode;
use crate::state::data::MediaType;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Which assets the albums show
    pub media_type: MediaType,
    /// Gap between grid cells, in logical pixels
    pub cell_spacing: f32,
    /// Pixels requested per logical pixel of a cell
    pub scale_factor: f32,
    pub delivery: DeliveryMode,
    /// Catalog database location; the user data directory when unset
    pub catalog_path: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_type: MediaType::Image,
            cell_spacing: 1.0,
            scale_factor: 2.0,
            delivery: DeliveryMode::HighQuality,
            catalog_path: None,
            log_level: None,
        }
    }
}

impl Config {
    /// ~/.config/album-grid/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or(Error::NoDirectory("config"))?;

        path.push("album-grid");
        path.push("config.toml");
        Ok(path)
    }

    /// Read the config at `path`. A missing file gives the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        if config.cell_spacing.is_nan() || config.cell_spacing < 0.0 {
            config.cell_spacing = 0.0;
        }
        if config.scale_factor.is_nan() || config.scale_factor <= 0.0 {
            config.scale_factor = 1.0;
        }

        Ok(config)
    }
}
