// SPDX-License-Identifier: GPL-3.0-or-later
mod container;
mod encoding;
mod message;

pub(crate) use container::{Header, ImageContainer};
pub(crate) use encoding::Encoding;
pub(crate) use message::ImageMessage;
