//! The playback engine: network bytes in, gapless scheduled audio out.
//!
//! All work for a chunk happens synchronously inside [`PlaybackEngine::push_chunk`],
//! in arrival order. Block-end events arrive asynchronously through the
//! sink's notifier and are drained at the top of every operation, so the
//! session has exactly one writer at a time.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cancel::CancellationController;
use super::registry::PlaybackRegistry;
use super::scheduler::{ScheduledBlock, Scheduler, SchedulerConfig};
use super::session::PlaybackSession;
use super::types::{EngineEvent, EngineEvents, PlaybackStats, SessionId};
use crate::audio::{convert, ByteAligner, PrimingBuffer, SampleFrame};
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::sink::{BlockEndNotifier, BlockId, OutputSink};

pub struct PlaybackEngine<S: OutputSink> {
    config: PlaybackConfig,
    sink: S,
    scheduler: Scheduler,
    registry: PlaybackRegistry,
    cancel: CancellationController,
    aligner: ByteAligner,
    priming: PrimingBuffer,
    session: Option<PlaybackSession>,
    notifier: BlockEndNotifier,
    block_ends: mpsc::UnboundedReceiver<BlockId>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl<S: OutputSink> PlaybackEngine<S> {
    /// Build an engine around `sink`, returning it with its notification receiver.
    pub fn new(config: PlaybackConfig, sink: S) -> Result<(Self, EngineEvents)> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (ends_tx, ends_rx) = mpsc::unbounded_channel();

        let engine = Self {
            scheduler: Scheduler::new(SchedulerConfig::from(&config)),
            registry: PlaybackRegistry::new(events_tx.clone()),
            cancel: CancellationController::new(config.stop_grace(), events_tx.clone()),
            aligner: ByteAligner::new(),
            priming: PrimingBuffer::new(config.priming_duration_ms, 0),
            session: None,
            notifier: BlockEndNotifier::new(ends_tx),
            block_ends: ends_rx,
            events: events_tx,
            config,
            sink,
        };
        Ok((engine, EngineEvents::new(events_rx)))
    }

    /// Start playback state for a new generation request.
    ///
    /// Refused while a stop grace window is open, or while the previous
    /// session is still playing and was never stopped.
    pub fn begin_session(&mut self, sample_rate: u32) -> Result<SessionId> {
        if sample_rate == 0 {
            return Err(Error::ConfigError("sample rate must be non-zero".to_string()));
        }
        if self.cancel.is_stop_requested() {
            return Err(Error::SessionBusy(
                "stop grace window has not elapsed".to_string(),
            ));
        }

        self.pump_events();
        if let Some(previous) = &self.session {
            if !previous.is_finished() {
                return Err(Error::SessionBusy(format!(
                    "session {} is still {:?}",
                    previous.id(),
                    previous.phase()
                )));
            }
        }

        let session = PlaybackSession::new(sample_rate, self.cancel.flag());
        let id = session.id();
        self.session = Some(session);
        self.aligner.reset();
        self.priming = PrimingBuffer::new(self.config.priming_duration_ms, sample_rate);

        info!(
            "Session {} started at {} Hz (priming {}ms)",
            id, sample_rate, self.config.priming_duration_ms
        );
        Ok(id)
    }

    /// Process one network read.
    ///
    /// Discarded silently while a stop is pending. A sink rejection is fatal
    /// for the session: playback is stopped and the error returned.
    pub fn push_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.pump_events();
        if self.cancel.is_stop_requested() {
            debug!("Stop pending, dropping {} byte chunk", chunk.len());
            return Ok(());
        }

        let session = self.session.as_mut().ok_or(Error::NoSession)?;
        if session.is_finished() {
            debug!("Session {} is over, dropping {} byte chunk", session.id(), chunk.len());
            return Ok(());
        }
        if session.download_finished {
            warn!("Chunk of {} bytes after download finished, ignoring", chunk.len());
            return Ok(());
        }

        session.bytes_received += chunk.len() as u64;
        let span = self.aligner.push(chunk);

        if let Some(limit) = self.config.max_leftover_chunks {
            let carried = self.aligner.carried_chunks();
            if carried > limit && !session.anomaly_reported {
                session.anomaly_reported = true;
                warn!(
                    "Leftover byte carried across {} chunks, stream may be misaligned",
                    carried
                );
                let _ = self.events.send(EngineEvent::AlignmentAnomaly {
                    session: session.id(),
                    carried_chunks: carried,
                });
            }
        }

        if span.is_empty() {
            return Ok(());
        }
        session.mark_first_audio();

        let frame = convert(&span, session.sample_rate());
        match self.priming.ingest(frame) {
            Some(ready) => self.schedule(ready).map(|_| ()),
            None => Ok(()),
        }
    }

    /// The stream delivered its last byte.
    ///
    /// Audio still held by the priming buffer is flushed and scheduled so a
    /// short utterance is never dropped, then completion is re-evaluated.
    pub fn finish_download(&mut self) -> Result<()> {
        self.pump_events();
        if self.cancel.is_stop_requested() {
            return Ok(());
        }

        let session = self.session.as_mut().ok_or(Error::NoSession)?;
        if session.is_finished() {
            return Ok(());
        }
        self.registry.mark_download_finished(session);
        if self.aligner.finish().is_some() {
            debug!("Dropping trailing odd byte at end of stream");
        }

        if let Some(block) = self.priming.flush() {
            info!(
                "Stream ended inside priming window, flushing {:.1}ms",
                block.duration() * 1000.0
            );
            self.schedule(block)?;
        }

        if let Some(session) = self.session.as_mut() {
            self.registry.check_completion(session);
        }
        Ok(())
    }

    /// Handle one block-end event.
    pub fn handle_block_end(&mut self, block: BlockId) {
        match self.session.as_mut() {
            Some(session) => {
                self.registry.on_block_end(block, session);
            }
            None => debug!("Ignoring end of {} with no session", block),
        }
    }

    /// Let the sink retire finished blocks and drain their end events.
    pub fn pump_events(&mut self) {
        self.sink.poll();
        while let Ok(block) = self.block_ends.try_recv() {
            self.handle_block_end(block);
        }
    }

    /// Wait up to `timeout` for a block to end, then drain events.
    pub async fn wait_for_block_end(&mut self, timeout: Duration) {
        if let Ok(Some(block)) = tokio::time::timeout(timeout, self.block_ends.recv()).await {
            self.handle_block_end(block);
        }
        self.pump_events();
    }

    /// Cancel playback immediately.
    pub fn stop(&mut self) {
        self.cancel.stop(
            self.session.as_mut(),
            &mut self.priming,
            &mut self.aligner,
            &mut self.sink,
        );
    }

    /// Tear down after an upstream failure and hand the error back.
    pub fn abort(&mut self, error: Error) -> Error {
        warn!("Aborting playback: {}", error);
        self.stop();
        error
    }

    /// Allow a new session before the grace window elapses.
    pub fn lift_stop_early(&mut self) {
        self.cancel.lift_early();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_stop_requested()
    }

    /// Whether the current session has played out completely.
    pub fn is_complete(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.completion_fired)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> PlaybackStats {
        let Some(session) = self.session.as_ref() else {
            return PlaybackStats::default();
        };
        let buffered_ahead_seconds = if session.active_blocks.is_empty() {
            0.0
        } else {
            (session.next_start_time - self.sink.now()).max(0.0)
        };

        PlaybackStats {
            bytes_received: session.bytes_received,
            samples_scheduled: session.samples_scheduled,
            blocks_scheduled: session.blocks_scheduled,
            active_blocks: session.active_blocks.len(),
            underruns: session.underruns,
            buffered_ahead_seconds,
            priming_buffered_ms: self.priming.buffered_duration_ms(),
            time_to_first_audio: session.time_to_first_audio,
        }
    }

    fn schedule(&mut self, frame: SampleFrame) -> Result<Option<ScheduledBlock>> {
        let session = self.session.as_mut().ok_or(Error::NoSession)?;
        let result = self.scheduler.schedule_next(
            frame,
            session,
            &mut self.sink,
            &self.registry,
            &self.notifier,
        );
        if let Err(e) = &result {
            warn!("Sink rejected block, stopping session: {}", e);
            self.stop();
        }
        result
    }
}
