// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use tracing::{info, instrument, trace};

use super::{ColorizeParams, ImageDescriptor, Juliaset, SCALAR_SIZE};
use crate::device::Device;
use crate::error::Error;
use crate::frame::ImageContainer;

/// Whether a stage has seen the first image of its stream yet.
///
/// The only transition is `Uninitialized` to `Initialized`, made with the first image that
/// describes a usable stream. Later images never change the descriptor, even if their geometry or
/// encoding differ.
#[derive(Debug)]
enum StageState {
    Uninitialized,
    Initialized(Juliaset),
}

impl StageState {
    fn get_or_init(
        &mut self,
        image: &ImageContainer,
        params: &ColorizeParams,
    ) -> Result<&Juliaset, Error> {
        if let Self::Uninitialized = self {
            let descriptor = ImageDescriptor::from_image(image)?;
            info!(
                width = descriptor.width,
                height = descriptor.height,
                step = descriptor.row_step,
                encoding = %descriptor.encoding,
                "initializing colorize stage"
            );
            *self = Self::Initialized(Juliaset::new(descriptor, *params));
        }
        match &*self {
            Self::Initialized(juliaset) => Ok(juliaset),
            Self::Uninitialized => unreachable!("stage state was initialized above"),
        }
    }
}

/// Colorizes each incoming image into a new device image.
#[derive(Debug)]
pub(crate) struct ColorizeStage {
    device: Device,
    params: ColorizeParams,
    state: StageState,
}

impl ColorizeStage {
    pub(crate) fn new(device: Device, params: ColorizeParams) -> Self {
        Self {
            device,
            params,
            state: StageState::Uninitialized,
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        matches!(self.state, StageState::Initialized(_))
    }

    /// The descriptor computed from the first image, once there has been one.
    pub(crate) fn descriptor(&self) -> Option<&ImageDescriptor> {
        match &self.state {
            StageState::Initialized(juliaset) => Some(juliaset.descriptor()),
            StageState::Uninitialized => None,
        }
    }

    /// Take ownership of `image` and produce its colorized counterpart.
    ///
    /// The output has the same header, dimensions and encoding as the input, lives in a fresh
    /// allocation, and shares the input's execution stream. The colorize work is only enqueued;
    /// the input allocation is kept alive by that work until it has run.
    #[instrument(level = "trace", skip(self, image), fields(frame_id = %image.header().frame_id))]
    pub(crate) fn handle_buffer(&mut self, image: ImageContainer) -> Result<ImageContainer, Error> {
        let juliaset = self.state.get_or_init(&image, &self.params)?;
        let mut output = ImageContainer::new(
            &self.device,
            image.header().clone(),
            image.height(),
            image.width(),
            image.encoding().clone(),
            image.step() / SCALAR_SIZE,
            Arc::clone(image.stream()),
        )?;
        let stream = Arc::clone(output.stream());
        juliaset.colorize(output.memory_mut(), image.memory(), &stream)?;
        trace!(
            input = image.memory().id(),
            output = output.memory().id(),
            size = output.size_in_bytes(),
            device_in_use = self.device.bytes_in_use(),
            "colorize enqueued"
        );
        Ok(output)
    }
}
