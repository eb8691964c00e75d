// SPDX-License-Identifier: GPL-3.0-or-later
use bytes::Bytes;

use super::{Encoding, Header};

/// A host-side image, laid out the way image messages are on the wire.
///
/// `data` holds `step * height` bytes, row after row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ImageMessage {
    pub(crate) header: Header,
    pub(crate) height: u32,
    pub(crate) width: u32,
    pub(crate) encoding: Encoding,
    pub(crate) is_bigendian: bool,
    pub(crate) step: u32,
    pub(crate) data: Bytes,
}

impl ImageMessage {
    /// The rows of the image, without any padding past `row_len` bytes.
    pub(crate) fn rows(&self, row_len: usize) -> impl Iterator<Item = &[u8]> {
        self.data
            .chunks(self.step as usize)
            .take(self.height as usize)
            .map(move |row| &row[..row_len.min(row.len())])
    }
}
