// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};

const GRADIENTS: &[(&str, colorous::Gradient)] = &[
    ("CIVIDIS", colorous::CIVIDIS),
    ("COOL", colorous::COOL),
    ("CUBEHELIX", colorous::CUBEHELIX),
    ("GREYS", colorous::GREYS),
    ("INFERNO", colorous::INFERNO),
    ("MAGMA", colorous::MAGMA),
    ("PLASMA", colorous::PLASMA),
    ("RAINBOW", colorous::RAINBOW),
    ("SINEBOW", colorous::SINEBOW),
    ("SPECTRAL", colorous::SPECTRAL),
    ("TURBO", colorous::TURBO),
    ("VIRIDIS", colorous::VIRIDIS),
    ("WARM", colorous::WARM),
    ("YELLOW_ORANGE_RED", colorous::YELLOW_ORANGE_RED),
];

/// A [`colorous::Gradient`] that remembers the name it was chosen by.
#[derive(Clone, Copy)]
pub(crate) struct NamedGradient {
    name: &'static str,
    gradient: colorous::Gradient,
}

impl NamedGradient {
    pub(crate) fn gradient(&self) -> colorous::Gradient {
        self.gradient
    }
}

impl Default for NamedGradient {
    fn default() -> Self {
        Self {
            name: "TURBO",
            gradient: colorous::TURBO,
        }
    }
}

impl FromStr for NamedGradient {
    type Err = String;

    /// Gradient names are case-insensitive, and spaces may be used in place of underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "_");
        GRADIENTS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|&(name, gradient)| Self { name, gradient })
            .ok_or_else(|| format!("unknown gradient '{}'", s))
    }
}

impl<'de> Deserialize<'de> for NamedGradient {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(|_| {
            de::Error::invalid_value(de::Unexpected::Str(&name), &"a name of a colorous gradient")
        })
    }
}

impl PartialEq for NamedGradient {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for NamedGradient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("NamedGradient").field(&self.name).finish()
    }
}
