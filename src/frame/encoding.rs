// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// The tag describing how the channels of a pixel are packed.
///
/// Names follow the usual image message conventions (`rgb8`, `bgr8`, `mono8`, ...). Tags this
/// crate doesn't handle are kept verbatim in [`Encoding::Other`].
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(from = "String")]
pub(crate) enum Encoding {
    Rgb8,
    Bgr8,
    Mono8,
    Other(String),
}

impl Encoding {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Rgb8 => "rgb8",
            Self::Bgr8 => "bgr8",
            Self::Mono8 => "mono8",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for Encoding {
    fn from(tag: &str) -> Self {
        match tag {
            "rgb8" => Self::Rgb8,
            "bgr8" => Self::Bgr8,
            "mono8" => Self::Mono8,
            _ => Self::Other(tag.to_string()),
        }
    }
}

impl From<String> for Encoding {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Rgb8
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
