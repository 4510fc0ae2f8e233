//! Stop/reset protocol with a post-cancel grace window.
//!
//! `stop()` is synchronous and forceful: it raises the stop flag, ends every
//! registered block and clears all buffering before returning. The flag
//! stays raised for a short grace window so that a frame still in flight
//! from the aborted stream cannot leak into the next session. Lowering the
//! flag is a task owned by the controller; it can be cancelled, and a newer
//! `stop()` supersedes an older one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::session::{PlaybackSession, SessionPhase};
use super::types::{EngineEvent, SessionId};
use crate::audio::{ByteAligner, PrimingBuffer};
use crate::sink::OutputSink;

/// Shared "stop requested" flag, checked before every scheduling attempt.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Lowers the stop flag unless a newer stop or an early lift got there first.
#[derive(Clone)]
struct Lift {
    flag: StopFlag,
    generation: Arc<AtomicU64>,
    expected: u64,
    session: Option<SessionId>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl Lift {
    fn fire(&self) {
        if self.generation.load(Ordering::SeqCst) != self.expected {
            return;
        }
        self.flag.clear();
        debug!("Stop grace window elapsed");
        if let Some(session) = self.session {
            let _ = self.events.send(EngineEvent::Stopped { session });
        }
    }
}

pub struct CancellationController {
    flag: StopFlag,
    grace: Duration,
    generation: Arc<AtomicU64>,
    lift_task: Option<JoinHandle<()>>,
    pending: Option<SessionId>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

impl CancellationController {
    pub fn new(grace: Duration, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            flag: StopFlag::default(),
            grace,
            generation: Arc::new(AtomicU64::new(0)),
            lift_task: None,
            pending: None,
            events,
        }
    }

    /// The flag sessions consult before scheduling.
    pub fn flag(&self) -> StopFlag {
        self.flag.clone()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.is_set()
    }

    /// Force-end all playback for `session` and hold off new scheduling.
    pub fn stop<S: OutputSink>(
        &mut self,
        session: Option<&mut PlaybackSession>,
        priming: &mut PrimingBuffer,
        aligner: &mut ByteAligner,
        sink: &mut S,
    ) {
        if !self.flag.is_set() {
            // Previous grace window already lifted and notified
            self.pending = None;
        }
        self.flag.set();

        let mut session_id = None;
        if let Some(session) = session {
            let ended = session.active_blocks.len();
            for block in std::mem::take(&mut session.active_blocks) {
                sink.force_end(block);
            }
            session.next_start_time = 0.0;
            session.download_finished = false;
            session.phase = SessionPhase::Stopped;
            session_id = Some(session.id());
            info!("Session {} stopped, {} blocks force-ended", session.id(), ended);
        }
        priming.reset();
        aligner.reset();

        self.schedule_lift(session_id);
    }

    /// Lower the flag now, abandoning the pending grace window.
    ///
    /// Only for callers that accept the risk of a straggling frame from the
    /// stopped stream reaching the next session.
    pub fn lift_early(&mut self) {
        if !self.flag.is_set() {
            return;
        }
        let pending = self.pending.take();
        let lift = self.next_lift(pending);
        if let Some(task) = self.lift_task.take() {
            task.abort();
        }
        lift.fire();
    }

    fn next_lift(&mut self, session: Option<SessionId>) -> Lift {
        let expected = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Lift {
            flag: self.flag.clone(),
            generation: self.generation.clone(),
            expected,
            session,
            events: self.events.clone(),
        }
    }

    fn schedule_lift(&mut self, session: Option<SessionId>) {
        if let Some(task) = self.lift_task.take() {
            task.abort();
        }
        // A superseded stop still owes its session a Stopped notification
        let session = session.or(self.pending.take());
        let lift = self.next_lift(session);

        if self.grace.is_zero() {
            lift.fire();
            return;
        }

        self.pending = session;
        let grace = self.grace;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.lift_task = Some(handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    lift.fire();
                }));
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(grace);
                    lift.fire();
                });
            }
        }
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        if let Some(task) = self.lift_task.take() {
            task.abort();
        }
    }
}
