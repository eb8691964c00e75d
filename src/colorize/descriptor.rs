// SPDX-License-Identifier: GPL-3.0-or-later
use crate::error::Error;
use crate::frame::{Encoding, ImageContainer};

use super::SCALAR_SIZE;

/// Where each color channel sits within a pixel, in bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ChannelLayout {
    pub(crate) red_offset: u32,
    pub(crate) green_offset: u32,
    pub(crate) blue_offset: u32,
    /// Bytes per pixel.
    pub(crate) color_step: u32,
}

impl ChannelLayout {
    const fn new(red_offset: u32, green_offset: u32, blue_offset: u32, color_step: u32) -> Self {
        Self {
            red_offset,
            green_offset,
            blue_offset,
            color_step,
        }
    }

    /// All three channels alias the same byte.
    pub(crate) fn is_single_channel(&self) -> bool {
        self.color_step == 1
    }
}

/// Map a pixel encoding to its channel layout.
///
/// Only 8 bit per channel encodings are supported, as colorized output is always stored as one
/// byte per channel.
pub(crate) fn classify(encoding: &Encoding) -> Result<ChannelLayout, Error> {
    match encoding {
        Encoding::Rgb8 => Ok(ChannelLayout::new(0, 1, 2, 3)),
        Encoding::Bgr8 => Ok(ChannelLayout::new(2, 1, 0, 3)),
        Encoding::Mono8 => Ok(ChannelLayout::new(0, 0, 0, 1)),
        Encoding::Other(_) => Err(Error::UnsupportedEncoding(encoding.clone())),
    }
}

/// Geometry and channel layout of a stream, taken from its first image.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ImageDescriptor {
    /// Input row length in bytes.
    pub(crate) row_step: u32,
    pub(crate) height: u32,
    pub(crate) width: u32,
    pub(crate) encoding: Encoding,
    pub(crate) layout: ChannelLayout,
}

impl ImageDescriptor {
    /// Describe a scalar input image.
    ///
    /// The input holds one `f32` per output channel byte, so a row has to fit at least
    /// `width * color_step` of them.
    pub(crate) fn from_image(image: &ImageContainer) -> Result<Self, Error> {
        let layout = classify(image.encoding())?;
        let (height, width, row_step) = (image.height(), image.width(), image.step());
        let invalid = |reason| Error::InvalidGeometry {
            height,
            width,
            step: row_step,
            reason,
        };
        if height == 0 || width == 0 {
            return Err(invalid("image is empty"));
        }
        if row_step % SCALAR_SIZE != 0 {
            return Err(invalid("row step is not a whole number of f32 elements"));
        }
        match width.checked_mul(layout.color_step) {
            Some(needed) if row_step / SCALAR_SIZE >= needed => (),
            _ => return Err(invalid("row step is too short for the image width")),
        }
        Ok(Self {
            row_step,
            height,
            width,
            encoding: image.encoding().clone(),
            layout,
        })
    }

    /// Number of `f32` elements in each input row.
    pub(crate) fn input_row_elements(&self) -> usize {
        (self.row_step / SCALAR_SIZE) as usize
    }

    /// Output row length in bytes.
    pub(crate) fn output_step(&self) -> u32 {
        self.row_step / SCALAR_SIZE
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{classify, ChannelLayout, ImageDescriptor};
    use crate::device::{Device, ExecutionStream};
    use crate::error::Error;
    use crate::frame::test_support::scalar_image;
    use crate::frame::{Encoding, Header, ImageContainer};

    #[test]
    fn rgb8() {
        assert_eq!(
            classify(&Encoding::Rgb8).unwrap(),
            ChannelLayout::new(0, 1, 2, 3)
        );
    }

    #[test]
    fn bgr8() {
        let layout = classify(&Encoding::Bgr8).unwrap();
        assert_eq!(layout.blue_offset, 0);
        assert_eq!(layout.green_offset, 1);
        assert_eq!(layout.red_offset, 2);
        assert_eq!(layout.color_step, 3);
    }

    #[test]
    fn mono8() {
        let layout = classify(&Encoding::Mono8).unwrap();
        assert_eq!(layout, ChannelLayout::new(0, 0, 0, 1));
        assert!(layout.is_single_channel());
    }

    #[test]
    fn deterministic() {
        for encoding in &[Encoding::Rgb8, Encoding::Bgr8, Encoding::Mono8] {
            assert_eq!(classify(encoding).unwrap(), classify(encoding).unwrap());
        }
    }

    #[test]
    fn unsupported() {
        for tag in &["rgb16", "16UC1", "nv12", "yuv422"] {
            let res = classify(&Encoding::from(*tag));
            assert!(
                matches!(res, Err(Error::UnsupportedEncoding(Encoding::Other(ref t))) if t.as_str() == *tag),
                "{} should be unsupported, got {:?}",
                tag,
                res
            );
        }
    }

    #[test]
    fn descriptor_from_rgb_image() {
        let device = Device::default();
        let image = scalar_image(&device, 2, 5, 3, Encoding::Rgb8, 0.0);
        let descriptor = ImageDescriptor::from_image(&image).unwrap();
        assert_eq!(descriptor.height, 2);
        assert_eq!(descriptor.width, 5);
        assert_eq!(descriptor.row_step, 5 * 3 * 4);
        assert_eq!(descriptor.input_row_elements(), 15);
        assert_eq!(descriptor.output_step(), 15);
        assert_eq!(descriptor.layout, ChannelLayout::new(0, 1, 2, 3));
    }

    #[test]
    fn descriptor_rejects_short_rows() {
        let device = Device::default();
        // One scalar per pixel isn't enough for a three channel encoding
        let image = scalar_image(&device, 2, 5, 1, Encoding::Rgb8, 0.0);
        let res = ImageDescriptor::from_image(&image);
        assert!(matches!(res, Err(Error::InvalidGeometry { .. })));
    }

    #[test]
    fn descriptor_rejects_huge_width() {
        let device = Device::default();
        let image = ImageContainer::new(
            &device,
            Header::default(),
            1,
            2_000_000_000,
            Encoding::Rgb8,
            4,
            Arc::new(ExecutionStream::new().unwrap()),
        )
        .unwrap();
        let res = ImageDescriptor::from_image(&image);
        assert!(matches!(
            res,
            Err(Error::InvalidGeometry { reason, .. }) if reason.contains("too short")
        ));
    }

    #[test]
    fn descriptor_rejects_empty_image() {
        let device = Device::default();
        let image = scalar_image(&device, 0, 4, 1, Encoding::Mono8, 0.0);
        let res = ImageDescriptor::from_image(&image);
        assert!(matches!(
            res,
            Err(Error::InvalidGeometry { height: 0, reason: "image is empty", .. })
        ));
    }

    #[test]
    fn descriptor_rejects_partial_scalars() {
        let device = Device::default();
        // 4 mono pixels in 18 byte rows
        let image = ImageContainer::new(
            &device,
            Header::default(),
            2,
            4,
            Encoding::Mono8,
            18,
            Arc::new(ExecutionStream::new().unwrap()),
        )
        .unwrap();
        let res = ImageDescriptor::from_image(&image);
        assert!(matches!(
            res,
            Err(Error::InvalidGeometry {
                step: 18,
                reason: "row step is not a whole number of f32 elements",
                ..
            })
        ));
    }

    #[test]
    fn descriptor_rejects_unsupported_encoding() {
        let device = Device::default();
        let image = scalar_image(&device, 2, 2, 1, Encoding::from("mono16"), 0.0);
        let res = ImageDescriptor::from_image(&image);
        assert!(matches!(res, Err(Error::UnsupportedEncoding(_))));
    }
}
