// SPDX-License-Identifier: GPL-3.0-or-later
use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use tracing::{debug, warn};

mod cli;
mod colorize;
mod gradient;
mod output;
mod source;

pub(crate) use cli::Args;
pub(crate) use colorize::ColorizeSettings;
pub(crate) use output::{DeviceSettings, OutputSettings};
pub(crate) use source::SourceSettings;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub(crate) struct Settings {
    /// Colorize stage settings.
    #[serde(default)]
    pub(crate) colorize: ColorizeSettings,

    /// Test pattern source settings.
    #[serde(default)]
    pub(crate) source: SourceSettings,

    /// Device memory settings.
    #[serde(default)]
    pub(crate) device: DeviceSettings,

    /// What to do with the colorized frames.
    #[serde(default)]
    pub(crate) output: OutputSettings,
}

impl Settings {
    /// Load settings from a TOML file. A missing file gives the default settings.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                debug!(?path, "loading configuration");
                toml::from_str(&contents)
                    .with_context(|| format!("Error parsing configuration file {:?}", path))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(?path, "configuration file not found, using defaults");
                Ok(Self::default())
            }
            Err(err) => {
                Err(err).with_context(|| format!("Error reading configuration file {:?}", path))
            }
        }
    }
}
