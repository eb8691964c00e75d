// SPDX-License-Identifier: GPL-3.0-or-later
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use super::ExecutionStream;
use crate::error::Error;

#[derive(Debug)]
struct DeviceInner {
    limit: Option<usize>,
    in_use: AtomicUsize,
    next_id: AtomicU64,
}

/// An allocator for device memory, with an optional budget.
#[derive(Clone, Debug)]
pub(crate) struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    /// Create a device. With a `limit`, allocations that would take the total in use past that
    /// many bytes fail.
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                limit,
                in_use: AtomicUsize::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub(crate) fn allocate(&self, size: usize) -> Result<DeviceMemory, Error> {
        let limit = self.inner.limit;
        self.inner
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |in_use| match limit {
                Some(limit) if in_use + size > limit => None,
                _ => Some(in_use + size),
            })
            .map_err(|in_use| Error::Allocation {
                requested: size,
                available: limit.map_or(0, |limit| limit.saturating_sub(in_use)),
            })?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(allocation = id, size, "allocated device memory");
        Ok(DeviceMemory {
            allocation: Arc::new(Allocation {
                id,
                len: size,
                bytes: Mutex::new(vec![0u8; size].into_boxed_slice()),
                device: Arc::clone(&self.inner),
            }),
        })
    }

    /// The number of bytes currently allocated from this device.
    pub(crate) fn bytes_in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new(None)
    }
}

struct Allocation {
    id: u64,
    len: usize,
    bytes: Mutex<Box<[u8]>>,
    device: Arc<DeviceInner>,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.device.in_use.fetch_sub(self.len, Ordering::AcqRel);
        trace!(allocation = self.id, size = self.len, "freed device memory");
    }
}

/// An exclusively owned block of device memory.
///
/// The memory itself is only touched by operations running on an [`ExecutionStream`]. Those
/// operations hold a [`DevicePtr`], so the backing storage outlives this handle until any work
/// already enqueued against it has finished.
pub(crate) struct DeviceMemory {
    allocation: Arc<Allocation>,
}

impl DeviceMemory {
    /// Identity of the underlying allocation. Two live handles never share an id.
    pub(crate) fn id(&self) -> u64 {
        self.allocation.id
    }

    pub(crate) fn len(&self) -> usize {
        self.allocation.len
    }

    pub(crate) fn device(&self) -> Device {
        Device {
            inner: Arc::clone(&self.allocation.device),
        }
    }

    /// A pointer for use inside stream operations.
    pub(crate) fn ptr(&self) -> DevicePtr {
        DevicePtr(Arc::clone(&self.allocation))
    }

    /// Enqueue a host to device copy of `data` on `stream`.
    pub(crate) fn upload(&mut self, data: Bytes, stream: &ExecutionStream) -> Result<(), Error> {
        if data.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: data.len(),
            });
        }
        let dest = self.ptr();
        stream.enqueue(move || dest.with_bytes_mut(|bytes| bytes.copy_from_slice(&data)))
    }

    /// Enqueue a device to host copy on `stream` and wait for it to finish.
    pub(crate) fn download(&self, stream: &ExecutionStream) -> Result<Bytes, Error> {
        let host = Arc::new(Mutex::new(None));
        let (source, dest) = (self.ptr(), Arc::clone(&host));
        stream.enqueue(move || {
            *dest.lock() = Some(source.with_bytes(Bytes::copy_from_slice));
        })?;
        stream.synchronize()?;
        let data = host.lock().take();
        data.ok_or(Error::StreamClosed)
    }

    /// Enqueue a device to device copy from `source` on `stream`.
    pub(crate) fn copy_from(
        &mut self,
        source: &DeviceMemory,
        stream: &ExecutionStream,
    ) -> Result<(), Error> {
        if source.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: source.len(),
            });
        }
        let dest = self.ptr();
        let source = source.ptr();
        stream.enqueue(move || {
            source.with_bytes(|src| dest.with_bytes_mut(|dst| dst.copy_from_slice(src)))
        })
    }
}

impl fmt::Debug for DeviceMemory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DeviceMemory")
            .field("id", &self.id())
            .field("len", &self.len())
            .finish()
    }
}

/// A non-owning reference to device memory, handed to stream operations.
#[derive(Clone)]
pub(crate) struct DevicePtr(Arc<Allocation>);

impl DevicePtr {
    pub(crate) fn len(&self) -> usize {
        self.0.len
    }

    pub(crate) fn with_bytes<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        f(&self.0.bytes.lock())
    }

    pub(crate) fn with_bytes_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.0.bytes.lock())
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::Device;
    use crate::device::ExecutionStream;
    use crate::error::Error;

    #[test]
    fn unlimited_device() {
        let device = Device::default();
        let memory = device.allocate(1 << 20).unwrap();
        assert_eq!(memory.len(), 1 << 20);
        assert_eq!(device.bytes_in_use(), 1 << 20);
    }

    #[test]
    fn allocation_over_budget() {
        let device = Device::new(Some(100));
        let _held = device.allocate(64).unwrap();
        let res = device.allocate(64);
        match res {
            Err(Error::Allocation {
                requested,
                available,
            }) => {
                assert_eq!(requested, 64);
                assert_eq!(available, 36);
            }
            other => panic!("expected an allocation failure, got {:?}", other),
        }
        // The failed attempt shouldn't have reserved anything
        assert_eq!(device.bytes_in_use(), 64);
    }

    #[test]
    fn drop_returns_memory() {
        let device = Device::new(Some(64));
        let memory = device.allocate(64).unwrap();
        assert!(device.allocate(1).is_err());
        drop(memory);
        assert_eq!(device.bytes_in_use(), 0);
        assert!(device.allocate(64).is_ok());
    }

    #[test]
    fn unique_ids() {
        let device = Device::default();
        let first = device.allocate(4).unwrap();
        let second = device.allocate(4).unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn upload_download() {
        let device = Device::default();
        let stream = ExecutionStream::new().unwrap();
        let mut memory = device.allocate(4).unwrap();
        memory
            .upload(Bytes::from_static(&[1, 2, 3, 4]), &stream)
            .unwrap();
        let data = memory.download(&stream).unwrap();
        assert_eq!(&data[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn upload_wrong_size() {
        let device = Device::default();
        let stream = ExecutionStream::new().unwrap();
        let mut memory = device.allocate(4).unwrap();
        let res = memory.upload(Bytes::from_static(&[1, 2]), &stream);
        assert!(matches!(
            res,
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn device_copy() {
        let device = Device::default();
        let stream = ExecutionStream::new().unwrap();
        let mut source = device.allocate(3).unwrap();
        source
            .upload(Bytes::from_static(&[7, 8, 9]), &stream)
            .unwrap();
        let mut dest = device.allocate(3).unwrap();
        dest.copy_from(&source, &stream).unwrap();
        // Dropping the source handle right away is fine, the copy holds its own pointer.
        drop(source);
        assert_eq!(&dest.download(&stream).unwrap()[..], &[7, 8, 9]);
    }
}
