// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::trace;

use super::{Encoding, ImageMessage};
use crate::device::{Device, DeviceMemory, ExecutionStream};
use crate::error::Error;
use crate::pubsub::Duplicate;

/// Capture metadata carried from one stage to the next.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Header {
    /// Capture time, relative to the Unix epoch.
    pub(crate) stamp: Duration,
    pub(crate) frame_id: String,
}

impl Header {
    pub(crate) fn new(stamp: Duration, frame_id: &str) -> Self {
        Self {
            stamp,
            frame_id: frame_id.to_string(),
        }
    }

    pub(crate) fn now(frame_id: &str) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::new(stamp, frame_id)
    }
}

/// An image whose pixels live in device memory.
///
/// Containers are move-only: whoever holds one owns the memory, and handing it to a publisher or
/// a stage gives that ownership away. The execution stream is shared with any images derived from
/// this one so all of their device work stays in order.
pub(crate) struct ImageContainer {
    header: Header,
    height: u32,
    width: u32,
    encoding: Encoding,
    step: u32,
    stream: Arc<ExecutionStream>,
    memory: DeviceMemory,
}

impl ImageContainer {
    /// Allocate an image of `step * height` bytes on `device`. The contents are unspecified until
    /// something is enqueued on `stream` to fill them.
    pub(crate) fn new(
        device: &Device,
        header: Header,
        height: u32,
        width: u32,
        encoding: Encoding,
        step: u32,
        stream: Arc<ExecutionStream>,
    ) -> Result<Self, Error> {
        let memory = device.allocate(step as usize * height as usize)?;
        Ok(Self {
            header,
            height,
            width,
            encoding,
            step,
            stream,
            memory,
        })
    }

    /// Copy a host image onto the device. The copy is enqueued on `stream`.
    pub(crate) fn from_message(
        device: &Device,
        message: ImageMessage,
        stream: Arc<ExecutionStream>,
    ) -> Result<Self, Error> {
        let ImageMessage {
            header,
            height,
            width,
            encoding,
            is_bigendian,
            step,
            data,
        } = message;
        trace!(
            frame_id = %header.frame_id,
            size = data.len(),
            is_bigendian,
            "uploading image"
        );
        let mut image = Self::new(device, header, height, width, encoding, step, stream)?;
        image.memory.upload(data, &image.stream)?;
        Ok(image)
    }

    /// Copy this image back to the host, waiting for all work on its stream first.
    pub(crate) fn to_message(&self) -> Result<ImageMessage, Error> {
        let data = self.memory.download(&self.stream)?;
        Ok(ImageMessage {
            header: self.header.clone(),
            height: self.height,
            width: self.width,
            encoding: self.encoding.clone(),
            is_bigendian: false,
            step: self.step,
            data,
        })
    }

    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Row length in bytes.
    pub(crate) fn step(&self) -> u32 {
        self.step
    }

    pub(crate) fn stream(&self) -> &Arc<ExecutionStream> {
        &self.stream
    }

    pub(crate) fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    pub(crate) fn memory_mut(&mut self) -> &mut DeviceMemory {
        &mut self.memory
    }

    pub(crate) fn size_in_bytes(&self) -> usize {
        self.memory.len()
    }
}

impl Duplicate for ImageContainer {
    /// Deep copy into a new allocation, ordered on the same stream.
    fn duplicate(&self) -> Result<Self, Error> {
        let mut copy = Self::new(
            &self.memory.device(),
            self.header.clone(),
            self.height,
            self.width,
            self.encoding.clone(),
            self.step,
            Arc::clone(&self.stream),
        )?;
        copy.memory.copy_from(&self.memory, &self.stream)?;
        trace!(
            source = self.memory.id(),
            copy = copy.memory.id(),
            "duplicated image"
        );
        Ok(copy)
    }
}

impl fmt::Debug for ImageContainer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ImageContainer")
            .field("header", &self.header)
            .field("height", &self.height)
            .field("width", &self.width)
            .field("encoding", &self.encoding)
            .field("step", &self.step)
            .field("stream", &self.stream.id())
            .field("memory", &self.memory)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;

    use super::{Header, ImageContainer};
    use crate::device::{Device, ExecutionStream};
    use crate::error::Error;
    use crate::frame::{Encoding, ImageMessage};
    use crate::pubsub::Duplicate;

    fn mono_message() -> ImageMessage {
        ImageMessage {
            header: Header::new(Duration::from_secs(42), "cam"),
            height: 2,
            width: 3,
            encoding: Encoding::Mono8,
            is_bigendian: false,
            step: 3,
            data: Bytes::from_static(&[1, 2, 3, 4, 5, 6]),
        }
    }

    #[test]
    fn message_round_trip() {
        let device = Device::default();
        let stream = Arc::new(ExecutionStream::new().unwrap());
        let image = ImageContainer::from_message(&device, mono_message(), stream).unwrap();
        assert_eq!(image.size_in_bytes(), 6);
        assert_eq!(image.to_message().unwrap(), mono_message());
    }

    #[test]
    fn message_with_short_data() {
        let device = Device::default();
        let stream = Arc::new(ExecutionStream::new().unwrap());
        let message = ImageMessage {
            data: Bytes::from_static(&[1, 2, 3]),
            ..mono_message()
        };
        let res = ImageContainer::from_message(&device, message, stream);
        assert!(matches!(
            res,
            Err(Error::SizeMismatch {
                expected: 6,
                actual: 3
            })
        ));
        // The allocation for the failed upload was released again
        assert_eq!(device.bytes_in_use(), 0);
    }

    #[test]
    fn duplicate_is_a_distinct_copy() {
        let device = Device::default();
        let stream = Arc::new(ExecutionStream::new().unwrap());
        let image = ImageContainer::from_message(&device, mono_message(), stream).unwrap();
        let copy = image.duplicate().unwrap();
        assert_ne!(copy.memory().id(), image.memory().id());
        assert_eq!(copy.stream().id(), image.stream().id());
        drop(image);
        assert_eq!(copy.to_message().unwrap(), mono_message());
    }
}
