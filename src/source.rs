// SPDX-License-Identifier: GPL-3.0-or-later
//! A stand-in for an upstream stage: publishes synthetic iteration-count fields.
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, warn};

use crate::colorize::classify;
use crate::device::{Device, ExecutionStream};
use crate::error::Error;
use crate::frame::{Header, ImageContainer, ImageMessage};
use crate::settings::SourceSettings;

#[derive(Debug)]
pub(crate) struct PatternSource {
    device: Device,
    settings: SourceSettings,
    max_iterations: f32,
    stream: Arc<ExecutionStream>,
}

impl PatternSource {
    pub(crate) fn new(
        device: Device,
        settings: SourceSettings,
        max_iterations: f32,
    ) -> Result<Self, Error> {
        Ok(Self {
            device,
            settings,
            max_iterations,
            stream: Arc::new(ExecutionStream::new()?),
        })
    }

    /// Scalars per pixel. Encodings the colorize stage can't handle get one, it'll reject them
    /// either way.
    fn channels(&self) -> u32 {
        classify(&self.settings.encoding).map_or(1, |layout| layout.color_step)
    }

    /// A ring pattern of iteration counts that drifts outward with each `sequence` number.
    fn pattern(&self, sequence: u64) -> Bytes {
        let (width, height) = self.settings.resolution.dimensions();
        let channels = self.channels();
        let (center_x, center_y) = (width as f32 / 2.0, height as f32 / 2.0);
        let max_radius = (center_x * center_x + center_y * center_y).sqrt();
        let phase = (sequence % 100) as f32 / 100.0;
        let mut data = BytesMut::with_capacity((width * height * channels) as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let (dx, dy) = (x as f32 - center_x, y as f32 - center_y);
                let distance = (dx * dx + dy * dy).sqrt() / max_radius;
                let iterations = ((distance + phase) % 1.0) * self.max_iterations;
                for _ in 0..channels {
                    data.put_f32_le(iterations);
                }
            }
        }
        data.freeze()
    }

    /// Build frame number `sequence`, already enqueued for upload to the device.
    pub(crate) fn frame(&self, sequence: u64) -> Result<ImageContainer, Error> {
        let (width, height) = self.settings.resolution.dimensions();
        let message = ImageMessage {
            header: Header::now(&self.settings.frame_id),
            height,
            width,
            encoding: self.settings.encoding.clone(),
            is_bigendian: false,
            step: width * self.channels() * 4,
            data: self.pattern(sequence),
        };
        ImageContainer::from_message(&self.device, message, Arc::clone(&self.stream))
    }

    /// Produce frames at the configured frequency, forever.
    pub(crate) fn into_stream(self) -> impl Stream<Item = ImageContainer> {
        let mut interval = tokio::time::interval(self.settings.frame_delay());
        // A source that falls behind drops the frames it missed instead of bursting to catch up
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(
            resolution = ?self.settings.resolution,
            encoding = %self.settings.encoding,
            "starting test pattern source"
        );
        IntervalStream::new(interval)
            .enumerate()
            .filter_map(move |(sequence, _)| {
                let frame = match self.frame(sequence as u64) {
                    Ok(frame) => Some(frame),
                    Err(err) => {
                        warn!(%err, sequence, "unable to create frame");
                        None
                    }
                };
                futures::future::ready(frame)
            })
    }
}
