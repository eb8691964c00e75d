// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use tracing::{debug, trace};

use super::{ChannelLayout, ImageDescriptor};
use crate::device::{DeviceMemory, DevicePtr, ExecutionStream};
use crate::error::Error;

/// Number of entries in the color lookup table.
const PALETTE_SIZE: usize = 256;

/// Settings for the colorize kernel.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ColorizeParams {
    /// Iteration count that maps to the top of the gradient.
    pub(crate) max_iterations: f32,
    pub(crate) gradient: colorous::Gradient,
}

impl Default for ColorizeParams {
    fn default() -> Self {
        Self {
            max_iterations: 50.0,
            gradient: colorous::TURBO,
        }
    }
}

/// Colorizes Julia set iteration counts on the device.
///
/// Built once per stream. Construction precomputes the color lookup table; every
/// [`colorize`][Juliaset::colorize] call after that only enqueues work.
#[derive(Debug)]
pub(crate) struct Juliaset {
    descriptor: ImageDescriptor,
    params: ColorizeParams,
    palette: Arc<[[u8; 3]]>,
}

impl Juliaset {
    pub(crate) fn new(descriptor: ImageDescriptor, params: ColorizeParams) -> Self {
        let last = (PALETTE_SIZE - 1) as f64;
        let palette: Arc<[[u8; 3]]> = (0..PALETTE_SIZE)
            .map(|index| {
                let color = params.gradient.eval_continuous(index as f64 / last);
                [color.r, color.g, color.b]
            })
            .collect();
        debug!(
            width = descriptor.width,
            height = descriptor.height,
            encoding = %descriptor.encoding,
            max_iterations = params.max_iterations,
            "configured colorize kernel"
        );
        Self {
            descriptor,
            params,
            palette,
        }
    }

    pub(crate) fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Enqueue colorizing `input`, read as little-endian `f32` iteration counts, into `output` on
    /// `stream`. Returns as soon as the work is enqueued.
    pub(crate) fn colorize(
        &self,
        output: &mut DeviceMemory,
        input: &DeviceMemory,
        stream: &ExecutionStream,
    ) -> Result<(), Error> {
        let kernel = ColorizeKernel {
            output: output.ptr(),
            input: input.ptr(),
            palette: Arc::clone(&self.palette),
            layout: self.descriptor.layout,
            width: self.descriptor.width as usize,
            height: self.descriptor.height as usize,
            input_row_elements: self.descriptor.input_row_elements(),
            output_step: self.descriptor.output_step() as usize,
            max_iterations: self.params.max_iterations,
        };
        kernel.check_bounds()?;
        trace!(
            input = input.id(),
            output = output.id(),
            stream = stream.id(),
            "enqueueing colorize"
        );
        stream.enqueue(move || kernel.run())
    }
}

/// One colorize launch, with everything it needs captured by value.
struct ColorizeKernel {
    output: DevicePtr,
    input: DevicePtr,
    palette: Arc<[[u8; 3]]>,
    layout: ChannelLayout,
    width: usize,
    height: usize,
    input_row_elements: usize,
    output_step: usize,
    max_iterations: f32,
}

impl ColorizeKernel {
    /// Buffers that are smaller than the descriptor says (a stream that changed geometry after
    /// its first image) are refused before anything is enqueued.
    fn check_bounds(&self) -> Result<(), Error> {
        let input_needed = self.height * self.input_row_elements * std::mem::size_of::<f32>();
        if self.input.len() < input_needed {
            return Err(Error::SizeMismatch {
                expected: input_needed,
                actual: self.input.len(),
            });
        }
        let output_needed = self.height * self.output_step;
        if self.output.len() < output_needed {
            return Err(Error::SizeMismatch {
                expected: output_needed,
                actual: self.output.len(),
            });
        }
        Ok(())
    }

    fn color(&self, iterations: f32) -> [u8; 3] {
        let scaled = iterations / self.max_iterations;
        let scaled = if scaled.is_nan() {
            0.0
        } else {
            scaled.max(0.0).min(1.0)
        };
        let index = (scaled * (self.palette.len() - 1) as f32).round() as usize;
        self.palette[index]
    }

    fn run(self) {
        let step = self.layout.color_step as usize;
        self.input.with_bytes(|input| {
            self.output.with_bytes_mut(|output| {
                let scalar = std::mem::size_of::<f32>();
                for row in 0..self.height {
                    let input_row = &input[row * self.input_row_elements * scalar..]
                        [..self.width * step * scalar];
                    let output_row = &mut output[row * self.output_step..][..self.output_step];
                    // Only the first scalar of each pixel is read
                    for (column, pixel_in) in input_row.chunks_exact(step * scalar).enumerate() {
                        let iterations =
                            f32::from_le_bytes([pixel_in[0], pixel_in[1], pixel_in[2], pixel_in[3]]);
                        let [red, green, blue] = self.color(iterations);
                        let pixel = column * step;
                        if self.layout.is_single_channel() {
                            output_row[pixel] = luma(red, green, blue);
                        } else {
                            output_row[pixel + self.layout.red_offset as usize] = red;
                            output_row[pixel + self.layout.green_offset as usize] = green;
                            output_row[pixel + self.layout.blue_offset as usize] = blue;
                        }
                    }
                }
            })
        });
    }
}

/// Rec. 601 luma.
pub(crate) fn luma(red: u8, green: u8, blue: u8) -> u8 {
    (0.299 * red as f32 + 0.587 * green as f32 + 0.114 * blue as f32).round() as u8
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use bytes::{BufMut, BytesMut};

    use super::{luma, ColorizeParams, Juliaset};
    use crate::colorize::ImageDescriptor;
    use crate::device::{Device, ExecutionStream};
    use crate::error::Error;
    use crate::frame::test_support::scalar_image;
    use crate::frame::{Encoding, Header, ImageContainer, ImageMessage};

    fn gradient_end(params: &ColorizeParams, position: f64) -> [u8; 3] {
        let color = params.gradient.eval_continuous(position);
        [color.r, color.g, color.b]
    }

    fn run_colorize(encoding: Encoding, channels: u32, value: f32) -> Vec<u8> {
        let device = Device::default();
        let input = scalar_image(&device, 2, 3, channels, encoding, value);
        let descriptor = ImageDescriptor::from_image(&input).unwrap();
        let params = ColorizeParams::default();
        let juliaset = Juliaset::new(descriptor.clone(), params);
        let mut output = device
            .allocate((descriptor.output_step() * descriptor.height) as usize)
            .unwrap();
        let stream = Arc::clone(input.stream());
        juliaset
            .colorize(&mut output, input.memory(), &stream)
            .unwrap();
        output.download(&stream).unwrap().to_vec()
    }

    #[test]
    fn rgb_channels_in_order() {
        let params = ColorizeParams::default();
        let expected = gradient_end(&params, 1.0);
        let output = run_colorize(Encoding::Rgb8, 3, params.max_iterations);
        assert_eq!(output.len(), 2 * 3 * 3);
        for pixel in output.chunks(3) {
            assert_eq!(pixel, &expected[..]);
        }
    }

    #[test]
    fn bgr_channels_swapped() {
        let params = ColorizeParams::default();
        let [red, green, blue] = gradient_end(&params, 1.0);
        let output = run_colorize(Encoding::Bgr8, 3, params.max_iterations);
        for pixel in output.chunks(3) {
            assert_eq!(pixel, &[blue, green, red][..]);
        }
    }

    #[test]
    fn mono_writes_luma() {
        let params = ColorizeParams::default();
        let [red, green, blue] = gradient_end(&params, 0.0);
        let output = run_colorize(Encoding::Mono8, 1, 0.0);
        assert_eq!(output, vec![luma(red, green, blue); 6]);
    }

    #[test]
    fn out_of_range_values_clamp() {
        let params = ColorizeParams::default();
        let low = run_colorize(Encoding::Rgb8, 3, -10.0);
        let high = run_colorize(Encoding::Rgb8, 3, 1000.0);
        let nan = run_colorize(Encoding::Rgb8, 3, f32::NAN);
        assert_eq!(&low[..3], &gradient_end(&params, 0.0)[..]);
        assert_eq!(&high[..3], &gradient_end(&params, 1.0)[..]);
        assert_eq!(&nan[..3], &gradient_end(&params, 0.0)[..]);
    }

    #[test]
    fn padded_rows() {
        let device = Device::default();
        let params = ColorizeParams::default();
        // Two mono pixels per row, then two scalars of padding
        let mut data = BytesMut::new();
        for value in &[0.0, 50.0, 1000.0, 1000.0, 50.0, 0.0, 1000.0, 1000.0] {
            data.put_f32_le(*value);
        }
        let message = ImageMessage {
            header: Header::default(),
            height: 2,
            width: 2,
            encoding: Encoding::Mono8,
            is_bigendian: false,
            step: 16,
            data: data.freeze(),
        };
        let stream = Arc::new(ExecutionStream::new().unwrap());
        let input = ImageContainer::from_message(&device, message, Arc::clone(&stream)).unwrap();
        let descriptor = ImageDescriptor::from_image(&input).unwrap();
        let juliaset = Juliaset::new(descriptor, params);
        let mut output = device.allocate(2 * 4).unwrap();
        juliaset
            .colorize(&mut output, input.memory(), &stream)
            .unwrap();
        let [r, g, b] = gradient_end(&params, 0.0);
        let low = luma(r, g, b);
        let [r, g, b] = gradient_end(&params, 1.0);
        let high = luma(r, g, b);
        assert_eq!(
            &output.download(&stream).unwrap()[..],
            &[low, high, 0, 0, high, low, 0, 0]
        );
    }

    #[test]
    fn undersized_output_refused() {
        let device = Device::default();
        let input = scalar_image(&device, 2, 3, 1, Encoding::Mono8, 0.0);
        let descriptor = ImageDescriptor::from_image(&input).unwrap();
        let juliaset = Juliaset::new(descriptor, ColorizeParams::default());
        let mut output = device.allocate(2).unwrap();
        let stream = ExecutionStream::new().unwrap();
        let res = juliaset.colorize(&mut output, input.memory(), &stream);
        assert!(matches!(
            res,
            Err(Error::SizeMismatch {
                expected: 6,
                actual: 2
            })
        ));
    }

    #[test]
    fn luma_of_grey_is_grey() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(128, 128, 128), 128);
        assert_eq!(luma(255, 255, 255), 255);
    }
}
