// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::{ColorizeParams, ColorizeStage};
use crate::device::Device;
use crate::frame::ImageContainer;
use crate::pubsub::{Publisher, Subscription};

/// Runs a [`ColorizeStage`] between an input and an output topic.
#[derive(Debug)]
pub(crate) struct ColorizeNode {
    stage: ColorizeStage,
    published: u64,
    failed: u64,
}

impl ColorizeNode {
    pub(crate) fn new(device: Device, params: ColorizeParams) -> Self {
        info!(max_iterations = params.max_iterations, "setting up colorize node");
        Self {
            stage: ColorizeStage::new(device, params),
            published: 0,
            failed: 0,
        }
    }

    /// Colorize every image from `input` and publish the result on `output`.
    ///
    /// Returns once `input` ends. A configuration error (an encoding or geometry the stage can't
    /// handle) stops the node with that error; any other failure only drops the image it
    /// happened on.
    pub(crate) async fn run(
        mut self,
        mut input: Subscription<ImageContainer>,
        output: Publisher<ImageContainer>,
    ) -> anyhow::Result<()> {
        while let Some(image) = input.next().await {
            match self.stage.handle_buffer(image) {
                Ok(colorized) => {
                    output.publish(colorized);
                    self.published += 1;
                }
                Err(err) if err.is_fatal() => {
                    error!(
                        %err,
                        initialized = self.stage.is_initialized(),
                        "unable to colorize stream, stopping"
                    );
                    return Err(err).context("Error configuring colorize stage");
                }
                Err(err) => {
                    self.failed += 1;
                    warn!(%err, failed = self.failed, "dropping image");
                }
            }
        }
        debug!(
            descriptor = ?self.stage.descriptor(),
            published = self.published,
            failed = self.failed,
            lagged = input.dropped_count(),
            topic = output.name(),
            "colorize input closed"
        );
        Ok(())
    }
}
