// SPDX-License-Identifier: GPL-3.0-or-later
use structopt::StructOpt;

use std::path::PathBuf;

#[derive(Debug, StructOpt)]
#[structopt()]
pub(crate) struct Args {
    /// Path to a configuration file.
    #[structopt(short, long, parse(from_os_str), default_value = "config.toml")]
    pub(crate) config_path: PathBuf,

    /// Increase logging verbosity. May be given more than once.
    #[structopt(short, long, parse(from_occurrences))]
    pub(crate) verbose: u8,

    /// Stop after this many colorized frames.
    #[structopt(short, long)]
    pub(crate) frames: Option<u64>,
}
