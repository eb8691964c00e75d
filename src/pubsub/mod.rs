// SPDX-License-Identifier: GPL-3.0-or-later
mod topic;

pub(crate) use topic::{Duplicate, Publisher, Subscription};
