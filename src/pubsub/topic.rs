// SPDX-License-Identifier: GPL-3.0-or-later
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures::task::{AtomicWaker, Context, Poll};
use futures::{Sink, Stream};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::error::Error;

/// Items that can be copied for delivery to more than one subscriber.
///
/// Copies can fail (they may need fresh device memory), so this is separate from [`Clone`].
pub(crate) trait Duplicate: Sized {
    fn duplicate(&self) -> Result<Self, Error>;
}

/// A single-item mailbox. Delivering into a full slot drops the older item.
#[derive(Debug)]
struct Slot<T> {
    item: Mutex<Option<T>>,
    waker: AtomicWaker,
    closed: AtomicBool,
    dropped: AtomicUsize,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            item: Mutex::new(None),
            waker: AtomicWaker::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicUsize::new(0),
        }
    }

    fn deliver(&self, item: T) {
        let previous = self.item.lock().replace(item);
        if previous.is_some() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(dropped, "subscriber lagging, dropped oldest message");
        }
        self.waker.wake();
    }

    fn take(&self) -> Option<T> {
        self.item.lock().take()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.waker.wake();
    }
}

#[derive(Debug)]
struct Shared<T> {
    name: String,
    slots: Mutex<Vec<Weak<Slot<T>>>>,
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // The last publisher is gone, let subscribers finish once they drain their slots.
        for slot in self.slots.get_mut().iter().filter_map(Weak::upgrade) {
            slot.close();
        }
    }
}

/// The sending side of a depth-1 topic.
///
/// Publishing never waits. A subscriber that hasn't taken the previous message yet only ever
/// sees the newest one. With several subscribers every one but the last gets a [`Duplicate`],
/// the last gets the published item itself.
#[derive(Debug)]
pub(crate) struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Publisher<T> {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.to_string(),
                slots: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.shared.name
    }

    pub(crate) fn subscribe(&self) -> Subscription<T> {
        let slot = Arc::new(Slot::new());
        self.shared.slots.lock().push(Arc::downgrade(&slot));
        Subscription { slot }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        let mut slots = self.shared.slots.lock();
        slots.retain(|slot| slot.strong_count() > 0);
        slots.len()
    }
}

impl<T: Duplicate> Publisher<T> {
    pub(crate) fn publish(&self, item: T) {
        let slots: Vec<Arc<Slot<T>>> = {
            let mut slots = self.shared.slots.lock();
            slots.retain(|slot| slot.strong_count() > 0);
            slots.iter().filter_map(Weak::upgrade).collect()
        };
        let (last, rest) = match slots.split_last() {
            Some(split) => split,
            None => {
                trace!(topic = %self.shared.name, "no subscribers, dropping message");
                return;
            }
        };
        for slot in rest {
            match item.duplicate() {
                Ok(copy) => slot.deliver(copy),
                Err(err) => warn!(topic = %self.shared.name, %err, "unable to copy message for subscriber"),
            }
        }
        last.deliver(item);
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Duplicate> Sink<T> for Publisher<T> {
    type Error = Infallible;

    fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Older messages are dropped instead of applying backpressure
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: T) -> Result<(), Self::Error> {
        self.publish(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

/// The receiving side of a topic. Ends once every publisher is dropped and the last message has
/// been taken.
#[derive(Debug)]
pub(crate) struct Subscription<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Subscription<T> {
    /// How many messages were replaced before this subscriber got to them.
    pub(crate) fn dropped_count(&self) -> usize {
        self.slot.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(item) = self.slot.take() {
            return Poll::Ready(Some(item));
        }
        // Register, then check again in case something was delivered in between.
        self.slot.waker.register(cx.waker());
        if let Some(item) = self.slot.take() {
            return Poll::Ready(Some(item));
        }
        if self.slot.closed.load(Ordering::Acquire) {
            Poll::Ready(self.slot.take())
        } else {
            Poll::Pending
        }
    }
}
