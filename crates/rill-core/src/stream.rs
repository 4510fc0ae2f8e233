//! Async driver that feeds a network byte stream through the engine.
//!
//! This is the read loop: the only suspension point is waiting for the next
//! chunk (or for blocks to end once the download is over). Everything else
//! runs synchronously per chunk, in arrival order.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::{PlaybackEngine, PlaybackStats};
use crate::error::{Error, Result};
use crate::sink::OutputSink;

/// How often software sinks are polled while waiting.
pub const SINK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a streamed playback ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The stream ended and all audio played out
    Completed(PlaybackStats),
    /// The caller cancelled; playback was stopped
    Cancelled,
}

/// Play `chunks` to completion on an engine with an active session.
///
/// - upstream errors stop playback and are returned as [`Error::Upstream`]
/// - when `cancel` resolves, playback is stopped and no error is surfaced
/// - sink rejections stop playback and are returned unchanged
pub async fn play_stream<S, St, E, C>(
    engine: &mut PlaybackEngine<S>,
    chunks: St,
    cancel: C,
) -> Result<StreamOutcome>
where
    S: OutputSink,
    St: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
    C: Future<Output = ()>,
{
    let mut chunks = pin!(chunks);
    let mut cancel = pin!(cancel);
    let mut ticker = tokio::time::interval(SINK_POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                info!("Playback cancelled while streaming");
                engine.stop();
                return Ok(StreamOutcome::Cancelled);
            }
            next = chunks.next() => match next {
                Some(Ok(chunk)) => engine.push_chunk(chunk)?,
                Some(Err(e)) => return Err(engine.abort(Error::upstream(e))),
                None => break,
            },
            _ = ticker.tick() => engine.pump_events(),
        }
    }

    debug!("Download finished, draining output queue");
    engine.finish_download()?;

    while !engine.is_complete() {
        tokio::select! {
            biased;
            _ = &mut cancel => {
                info!("Playback cancelled while draining");
                engine.stop();
                return Ok(StreamOutcome::Cancelled);
            }
            _ = engine.wait_for_block_end(SINK_POLL_INTERVAL) => {}
        }
    }

    Ok(StreamOutcome::Completed(engine.stats()))
}
