// SPDX-License-Identifier: GPL-3.0-or-later
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::frame::Encoding;

/// Named frame sizes for the test pattern source.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub(crate) enum Resolution {
    #[serde(rename = "16K")]
    Uhd16k,
    #[serde(rename = "8K")]
    Uhd8k,
    #[serde(rename = "4K")]
    Uhd4k,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "480p")]
    Sd480,
}

impl Resolution {
    /// `(width, height)` in pixels.
    pub(crate) fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Uhd16k => (15360, 8640),
            Self::Uhd8k => (7680, 4320),
            Self::Uhd4k => (3840, 2160),
            Self::Hd1080 => (1920, 1080),
            Self::Hd720 => (1280, 720),
            Self::Sd480 => (852, 480),
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Sd480
    }
}

/// The longest wait between frames, used when the frequency is too low to represent.
const MAX_FRAME_DELAY: Duration = Duration::from_secs(3600);

fn default_frequency() -> f64 {
    30.0
}

fn positive_frequency<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let frequency = f64::deserialize(deserializer)?;
    if frequency.is_finite() && frequency > 0.0 {
        Ok(frequency)
    } else {
        Err(de::Error::custom(format!(
            "frequency must be a positive number of frames per second, not {}",
            frequency
        )))
    }
}

fn default_frame_id() -> String {
    "camera".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct SourceSettings {
    #[serde(default)]
    pub(crate) resolution: Resolution,

    /// Frames per second.
    #[serde(default = "default_frequency", deserialize_with = "positive_frequency")]
    pub(crate) frequency: f64,

    /// The encoding tag attached to every frame.
    #[serde(default)]
    pub(crate) encoding: Encoding,

    #[serde(default = "default_frame_id")]
    pub(crate) frame_id: String,
}

impl SourceSettings {
    pub(crate) fn frame_delay(&self) -> Duration {
        let period = 1.0 / self.frequency;
        if period > 0.0 && period < MAX_FRAME_DELAY.as_secs_f64() {
            Duration::from_secs_f64(period)
        } else {
            MAX_FRAME_DELAY
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            frequency: default_frequency(),
            encoding: Encoding::default(),
            frame_id: default_frame_id(),
        }
    }
}
