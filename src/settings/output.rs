// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::PathBuf;

use serde::Deserialize;

fn default_snapshot_every() -> u64 {
    100
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct OutputSettings {
    /// Directory to write JPEG snapshots of colorized frames to. Snapshots are disabled if unset.
    #[serde(default)]
    pub(crate) snapshot_dir: Option<PathBuf>,

    /// Write a snapshot of every n-th frame.
    #[serde(default = "default_snapshot_every")]
    pub(crate) snapshot_every: u64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            snapshot_every: default_snapshot_every(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub(crate) struct DeviceSettings {
    /// Upper bound on device memory in use, in bytes. Unlimited if unset.
    #[serde(default)]
    pub(crate) memory_limit: Option<usize>,
}
