// SPDX-License-Identifier: GPL-3.0-or-later
//! The end of the pipeline: counts colorized frames and optionally saves snapshots of them.
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context as _};
use bytes::{BufMut, Bytes, BytesMut};
use futures::{FutureExt, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use tokio::task::spawn_blocking;
use tracing::{debug, info, trace};

use crate::frame::{Encoding, ImageContainer, ImageMessage};
use crate::pubsub::Subscription;
use crate::settings::OutputSettings;
use crate::util::flatten_join_result;

const JPEG_QUALITY: u8 = 85;

/// Encode a colorized host image as a JPEG.
pub(crate) fn encode_jpeg(image: &ImageMessage) -> anyhow::Result<Bytes> {
    let width = image.width as usize;
    let (color_type, row_len) = match image.encoding {
        Encoding::Mono8 => (ColorType::L8, width),
        Encoding::Rgb8 | Encoding::Bgr8 => (ColorType::Rgb8, width * 3),
        Encoding::Other(ref tag) => return Err(anyhow!("Unable to encode '{}' as JPEG", tag)),
    };
    let mut pixels = Vec::with_capacity(row_len * image.height as usize);
    for row in image.rows(row_len) {
        if image.encoding == Encoding::Bgr8 {
            for bgr in row.chunks_exact(3) {
                pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
            }
        } else {
            pixels.extend_from_slice(row);
        }
    }
    if pixels.len() != row_len * image.height as usize {
        return Err(anyhow!(
            "Image data is too short for {}x{} {}",
            image.width,
            image.height,
            image.encoding
        ));
    }
    let mut jpeg_buf = BytesMut::new().writer();
    JpegEncoder::new_with_quality(&mut jpeg_buf, JPEG_QUALITY)
        .encode(&pixels, image.width, image.height, color_type)
        .context("Error encoding JPEG")?;
    Ok(jpeg_buf.into_inner().freeze())
}

fn write_snapshot(image: ImageContainer, path: PathBuf) -> anyhow::Result<()> {
    // Waits for the colorize work on the image's stream before copying back
    let message = image.to_message()?;
    let jpeg = encode_jpeg(&message)?;
    fs::write(&path, &jpeg).with_context(|| format!("Error writing snapshot to {:?}", path))?;
    trace!(?path, size = jpeg.len(), "wrote snapshot");
    Ok(())
}

#[derive(Debug)]
pub(crate) struct SnapshotSink {
    settings: OutputSettings,
    received: u64,
}

impl SnapshotSink {
    pub(crate) fn new(settings: OutputSettings) -> anyhow::Result<Self> {
        if let Some(dir) = &settings.snapshot_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("Error creating snapshot directory {:?}", dir))?;
        }
        Ok(Self {
            settings,
            received: 0,
        })
    }

    fn snapshot_path(&self, image: &ImageContainer) -> Option<PathBuf> {
        let dir = self.settings.snapshot_dir.as_ref()?;
        if self.received % self.settings.snapshot_every.max(1) != 0 {
            return None;
        }
        Some(dir.join(format!(
            "{}-{:06}.jpg",
            image.header().frame_id,
            self.received
        )))
    }

    /// Consume colorized frames until `input` ends or `limit` frames have arrived. Returns the
    /// number of frames received.
    pub(crate) async fn run(
        mut self,
        mut input: Subscription<ImageContainer>,
        limit: Option<u64>,
    ) -> anyhow::Result<u64> {
        while let Some(image) = input.next().await {
            self.received += 1;
            trace!(
                received = self.received,
                stamp = ?image.header().stamp,
                "received colorized frame"
            );
            if let Some(path) = self.snapshot_path(&image) {
                spawn_blocking(move || write_snapshot(image, path))
                    .map(flatten_join_result)
                    .await?;
            }
            if limit.map_or(false, |limit| self.received >= limit) {
                info!(frames = self.received, "frame limit reached");
                break;
            }
        }
        debug!(
            frames = self.received,
            lagged = input.dropped_count(),
            "colorized output finished"
        );
        Ok(self.received)
    }
}
