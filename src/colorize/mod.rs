// SPDX-License-Identifier: GPL-3.0-or-later
//! The colorize stage: turns a per-pixel scalar field into a color image without leaving the
//! device.
mod descriptor;
mod juliaset;
mod node;
mod stage;

pub(crate) use descriptor::{classify, ChannelLayout, ImageDescriptor};
pub(crate) use juliaset::{ColorizeParams, Juliaset};
pub(crate) use node::ColorizeNode;
pub(crate) use stage::ColorizeStage;

/// Size of one element of the scalar input buffers.
pub(crate) const SCALAR_SIZE: u32 = std::mem::size_of::<f32>() as u32;
