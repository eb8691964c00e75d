// SPDX-License-Identifier: GPL-3.0-or-later
//! A host-backed emulation of an accelerator runtime.
//!
//! Memory lives behind [`DeviceMemory`] handles and all work on it is enqueued on an
//! [`ExecutionStream`], so callers see the same ordering rules a real device queue gives them:
//! enqueueing never waits, and operations on one stream run in the order they were enqueued.
mod memory;
mod stream;

pub(crate) use memory::{Device, DeviceMemory, DevicePtr};
pub(crate) use stream::ExecutionStream;
