// SPDX-License-Identifier: GPL-3.0-or-later
use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::frame::Encoding;

/// Errors from the colorize stage and the device layer beneath it.
#[derive(Debug)]
pub enum Error {
    /// The pixel encoding of a stream can't be mapped to 8-bit color channels.
    UnsupportedEncoding(Encoding),

    /// The header of the first image in a stream doesn't describe a usable buffer.
    InvalidGeometry {
        height: u32,
        width: u32,
        step: u32,
        reason: &'static str,
    },

    /// Not enough device memory to satisfy an allocation.
    Allocation { requested: usize, available: usize },

    /// A buffer was not the size an operation needed.
    SizeMismatch { expected: usize, actual: usize },

    /// The worker behind an execution stream has gone away.
    StreamClosed,

    /// The worker for a new execution stream couldn't be started.
    StreamCreation(io::Error),
}

impl Error {
    /// Configuration errors stop the stream they were found on. Everything else only costs the
    /// buffer being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEncoding(_) | Self::InvalidGeometry { .. } | Self::StreamClosed
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnsupportedEncoding(encoding) => write!(
                f,
                "unsupported pixel encoding '{}', only rgb8, bgr8 and mono8 are supported",
                encoding
            ),
            Self::InvalidGeometry {
                height,
                width,
                step,
                reason,
            } => write!(
                f,
                "invalid image geometry ({}x{}, step {}): {}",
                width, height, step, reason
            ),
            Self::Allocation {
                requested,
                available,
            } => write!(
                f,
                "unable to allocate {} bytes of device memory ({} available)",
                requested, available
            ),
            Self::SizeMismatch { expected, actual } => write!(
                f,
                "buffer size mismatch: expected {} bytes, found {}",
                expected, actual
            ),
            Self::StreamClosed => write!(f, "execution stream is no longer running"),
            Self::StreamCreation(e) => write!(f, "unable to start execution stream: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::StreamCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::StreamCreation(e)
    }
}
