// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use futures::future::{Future, FutureExt, TryFutureExt};
use futures::ready;
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use pin_project::pin_project;
use tracing::{debug, info_span};
use tracing_futures::Instrument;

use std::pin::Pin;
use std::task::{Context, Poll};

use crate::colorize::{ColorizeNode, ColorizeParams};
use crate::device::Device;
use crate::frame::ImageContainer;
use crate::pubsub::Publisher;
use crate::settings::Settings;
use crate::sink::SnapshotSink;
use crate::source::PatternSource;
use crate::util::flatten_join_result;

type InnerTask = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type TaskList = FuturesUnordered<InnerTask>;

/// The test pattern source, the colorize node and the snapshot sink, wired together through the
/// `image_in` and `image_out` topics.
///
/// Resolves as soon as any one of its tasks finishes.
#[pin_project]
pub(crate) struct Pipeline {
    #[pin]
    tasks: TaskList,
}

impl Pipeline {
    pub(crate) fn new(settings: Settings, frame_limit: Option<u64>) -> anyhow::Result<Self> {
        let device = Device::new(settings.device.memory_limit);
        let params = ColorizeParams::from(&settings.colorize);
        let image_in: Publisher<ImageContainer> = Publisher::new("image_in");
        let image_out: Publisher<ImageContainer> = Publisher::new("image_out");
        // Subscribe before anything starts publishing
        let node_input = image_in.subscribe();
        let sink_input = image_out.subscribe();
        debug!(
            image_in = image_in.subscriber_count(),
            image_out = image_out.subscriber_count(),
            "topics wired"
        );

        let source = PatternSource::new(device.clone(), settings.source, params.max_iterations)
            .context("Error creating test pattern source")?;
        let source_task = source
            .into_stream()
            .map(Ok)
            .forward(image_in)
            .err_into::<anyhow::Error>()
            .instrument(info_span!("pattern_source"))
            .boxed();

        // The node only enqueues device work, so it runs on the pipeline's own task.
        let node = ColorizeNode::new(device, params);
        let node_task = node
            .run(node_input, image_out)
            .instrument(info_span!("colorize_node"))
            .boxed();

        let sink = SnapshotSink::new(settings.output).context("Error creating snapshot sink")?;
        let sink_task = tokio::spawn(
            sink.run(sink_input, frame_limit)
                .instrument(info_span!("snapshot_sink")),
        )
        .map(|res| flatten_join_result(res).map(|_frames| ()))
        .boxed();

        let tasks: TaskList = vec![source_task, node_task, sink_task].into_iter().collect();
        Ok(Self { tasks })
    }
}

impl Future for Pipeline {
    type Output = anyhow::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let res = ready!(this.tasks.poll_next(cx)).unwrap_or(Ok(()));
        debug!(result = ?res, "Pipeline terminating");
        Poll::Ready(res)
    }
}
