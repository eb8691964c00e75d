// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;

use super::gradient::NamedGradient;
use crate::colorize::ColorizeParams;

fn default_max_iterations() -> f64 {
    50.0
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub(crate) struct ColorizeSettings {
    /// The iteration count mapped to the end of the gradient. Read once at startup.
    #[serde(default = "default_max_iterations")]
    pub(crate) max_iterations: f64,

    #[serde(default)]
    pub(crate) gradient: NamedGradient,
}

impl Default for ColorizeSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            gradient: NamedGradient::default(),
        }
    }
}

impl From<&ColorizeSettings> for ColorizeParams {
    fn from(settings: &ColorizeSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations as f32,
            gradient: settings.gradient.gradient(),
        }
    }
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;

    use super::ColorizeSettings;
    use crate::colorize::ColorizeParams;

    #[test]
    fn defaults() {
        let parsed: ColorizeSettings = toml::from_str("").unwrap();
        assert_eq!(parsed, ColorizeSettings::default());
        assert!(approx_eq!(f64, parsed.max_iterations, 50.0, ulps = 2));
    }

    #[test]
    fn max_iterations() {
        let parsed: ColorizeSettings = toml::from_str("max_iterations = 120.0").unwrap();
        let params = ColorizeParams::from(&parsed);
        assert!(approx_eq!(f32, params.max_iterations, 120.0, ulps = 2));
    }

    #[test]
    fn gradient() {
        let parsed: ColorizeSettings = toml::from_str("gradient = \"magma\"").unwrap();
        let params = ColorizeParams::from(&parsed);
        assert_eq!(
            format!("{:?}", params.gradient),
            format!("{:?}", colorous::MAGMA)
        );
    }
}
