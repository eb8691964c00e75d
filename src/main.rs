// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod colorize;
mod device;
mod error;
mod frame;
mod pipeline;
mod pubsub;
mod settings;
mod sink;
mod source;
mod util;

use crate::pipeline::Pipeline;
use crate::settings::{Args, Settings};

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG takes precedence over the command line
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::from_args();
    init_tracing(args.verbose);
    let settings = Settings::load(&args.config_path)?;
    info!(
        max_iterations = settings.colorize.max_iterations,
        "starting colorize pipeline"
    );
    let pipeline = Pipeline::new(settings, args.frames).context("Error creating pipeline")?;
    pipeline.await
}
