use bytes::Bytes;
use rill_core::engine::StartDecision;
use rill_core::sink::{Clock, ManualClock, OutputSink, TimelineSink};
use rill_core::{EngineEvent, EngineEvents, Error, PlaybackConfig, PlaybackEngine, SessionPhase};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

const RATE: u32 = 1000;

type Engine = PlaybackEngine<TimelineSink<ManualClock>>;

fn config(priming_ms: u32) -> PlaybackConfig {
    PlaybackConfig {
        priming_duration_ms: priming_ms,
        startup_delay_seconds: 0.05,
        underrun_epsilon_seconds: 0.02,
        stop_grace_ms: 100,
        max_leftover_chunks: None,
    }
}

fn engine(config: PlaybackConfig) -> (Engine, EngineEvents, ManualClock) {
    let clock = ManualClock::new();
    let sink = TimelineSink::new(clock.clone(), RATE);
    let (engine, events) = PlaybackEngine::new(config, sink).unwrap();
    (engine, events, clock)
}

fn pcm(samples: usize, value: i16) -> Bytes {
    let mut bytes = Vec::with_capacity(samples * 2);
    for _ in 0..samples {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(bytes)
}

fn completions(events: &mut EngineEvents) -> usize {
    events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::PlaybackComplete { .. }))
        .count()
}

#[test]
fn priming_then_gapless_append() {
    let (mut engine, _events, clock) = engine(config(100));
    engine.begin_session(RATE).unwrap();

    engine.push_chunk(pcm(60, 1000)).unwrap();
    assert!(engine.sink().history().is_empty());
    assert!((engine.stats().priming_buffered_ms - 60.0).abs() < 1e-3);

    engine.push_chunk(pcm(60, 1000)).unwrap();
    clock.set(0.03);
    engine.push_chunk(pcm(50, 1000)).unwrap();
    clock.set(0.1);
    engine.push_chunk(pcm(25, 1000)).unwrap();

    let history = engine.sink().history();
    assert_eq!(history.len(), 3);
    assert!((history[0].start - 0.05).abs() < 1e-9);
    assert!((history[0].duration - 0.12).abs() < 1e-9);
    for pair in history.windows(2) {
        assert!((pair[1].start - pair[0].end()).abs() < 1e-9);
    }
    assert_eq!(engine.stats().underruns, 0);
    assert_eq!(engine.stats().samples_scheduled, 195);
}

#[test]
fn odd_chunk_cuts_render_every_sample() {
    let (mut engine, _events, _clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();

    let body = pcm(100, i16::MAX);
    for cut in body.chunks(7) {
        engine.push_chunk(Bytes::copy_from_slice(cut)).unwrap();
    }
    engine.finish_download().unwrap();

    let rendered: Vec<f32> = engine
        .sink()
        .timeline()
        .iter()
        .copied()
        .filter(|&s| s != 0.0)
        .collect();
    assert_eq!(rendered.len(), 100);
    assert!(rendered.iter().all(|&s| s == 1.0));
}

#[test]
fn underrun_resynchronises_to_clock() {
    let (mut engine, _events, clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();

    engine.push_chunk(pcm(20, 1)).unwrap(); // 0.05..0.07
    clock.set(0.5);
    engine.push_chunk(pcm(20, 1)).unwrap();

    let history = engine.sink().history();
    assert!((history[1].start - 0.52).abs() < 1e-9);
    assert_eq!(engine.stats().underruns, 1);
    assert!((engine.session().unwrap().next_start_time() - 0.54).abs() < 1e-9);
}

#[test]
fn completion_fires_once_when_download_finishes_first() {
    let (mut engine, mut events, clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(50, 1)).unwrap();
    engine.push_chunk(pcm(50, 1)).unwrap();

    engine.finish_download().unwrap();
    assert_eq!(completions(&mut events), 0);

    clock.set(0.1);
    engine.pump_events();
    assert_eq!(completions(&mut events), 0);

    clock.set(1.0);
    engine.pump_events();
    engine.pump_events();
    assert_eq!(completions(&mut events), 1);

    let session = engine.session().unwrap();
    assert_eq!(session.phase(), SessionPhase::Complete);
    assert_eq!(session.active_block_count(), 0);
    assert!(session.download_finished());
}

#[test]
fn completion_fires_once_when_blocks_finish_first() {
    let (mut engine, mut events, clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(50, 1)).unwrap();
    engine.push_chunk(pcm(50, 1)).unwrap();

    clock.set(1.0);
    engine.pump_events();
    assert_eq!(engine.session().unwrap().active_block_count(), 0);
    assert_eq!(completions(&mut events), 0);

    engine.finish_download().unwrap();
    engine.pump_events();
    assert_eq!(completions(&mut events), 1);

    let session = engine.session().unwrap();
    assert_eq!(session.phase(), SessionPhase::Complete);
    assert_eq!(session.active_block_count(), 0);
    assert!(session.download_finished());
    assert!(engine.is_complete());
}

#[test]
fn short_utterance_is_flushed_at_end_of_stream() {
    let (mut engine, mut events, clock) = engine(config(1000));
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(30, 500)).unwrap();
    assert!(engine.sink().history().is_empty());

    engine.finish_download().unwrap();
    let history = engine.sink().history();
    assert_eq!(history.len(), 1);
    assert!((history[0].duration - 0.03).abs() < 1e-9);

    clock.set(0.2);
    engine.pump_events();
    assert_eq!(completions(&mut events), 1);
}

#[test]
fn empty_stream_completes_immediately() {
    let (mut engine, mut events, _clock) = engine(config(500));
    engine.begin_session(RATE).unwrap();
    engine.finish_download().unwrap();
    assert_eq!(completions(&mut events), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_isolates_the_next_session() {
    let (mut engine, mut events, clock) = engine(config(0));
    let first = engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(100, 1)).unwrap();
    engine.push_chunk(pcm(100, 1)).unwrap();
    let stale: Vec<_> = engine.sink().history().iter().map(|r| r.block).collect();

    clock.set(0.06);
    engine.stop();

    let session = engine.session().unwrap();
    assert_eq!(session.active_block_count(), 0);
    assert_eq!(session.next_start_time(), 0.0);
    assert_eq!(session.phase(), SessionPhase::Stopped);
    assert_eq!(engine.sink().live_blocks(), 0);

    // Late end events for released blocks are harmless
    for block in stale {
        engine.handle_block_end(block);
    }
    // A straggling chunk inside the grace window is discarded
    engine.push_chunk(pcm(100, 1)).unwrap();
    assert_eq!(engine.sink().history().len(), 2);
    assert!(matches!(
        engine.begin_session(RATE),
        Err(Error::SessionBusy(_))
    ));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        events.drain(),
        vec![EngineEvent::Stopped { session: first }]
    );

    clock.set(2.0);
    let second = assert_ok!(engine.begin_session(RATE));
    assert_ne!(first, second);
    engine.push_chunk(pcm(10, 1)).unwrap();
    let last = engine.sink().history().last().copied().unwrap();
    assert!((last.start - 2.05).abs() < 1e-9);
    assert_eq!(engine.stats().blocks_scheduled, 1);
}

#[tokio::test(start_paused = true)]
async fn lift_stop_early_allows_immediate_restart() {
    let (mut engine, mut events, _clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(10, 1)).unwrap();
    engine.stop();
    engine.lift_stop_early();

    assert!(!engine.is_stop_requested());
    assert_ok!(engine.begin_session(RATE));
    assert_eq!(events.drain().len(), 1);
}

#[test]
fn new_session_refused_while_previous_plays() {
    let (mut engine, _events, _clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(10, 1)).unwrap();
    assert!(matches!(
        engine.begin_session(RATE),
        Err(Error::SessionBusy(_))
    ));
}

#[test]
fn push_without_session_is_an_error() {
    let (mut engine, _events, _clock) = engine(config(0));
    assert!(matches!(engine.push_chunk(pcm(1, 1)), Err(Error::NoSession)));
}

#[tokio::test]
async fn sink_rejection_stops_the_session() {
    let (mut engine, _events, _clock) = engine(config(0));
    engine.begin_session(RATE * 2).unwrap();
    let err = engine.push_chunk(pcm(10, 1)).unwrap_err();
    assert!(matches!(err, Error::SinkRejected(_)));
    assert!(engine.is_stop_requested());
    assert_eq!(engine.session().unwrap().phase(), SessionPhase::Stopped);
}

#[tokio::test]
async fn abort_stops_and_returns_error() {
    let (mut engine, _events, _clock) = engine(config(0));
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(10, 1)).unwrap();

    let err = engine.abort(Error::upstream("connection reset"));
    assert!(matches!(err, Error::Upstream(ref msg) if msg == "connection reset"));
    assert!(engine.is_stop_requested());
    assert_eq!(engine.sink().live_blocks(), 0);
}

#[test]
fn misaligned_stream_reports_anomaly_once() {
    let (mut engine, mut events, _clock) = engine(PlaybackConfig {
        max_leftover_chunks: Some(2),
        ..config(0)
    });
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(Bytes::from_static(&[0, 0, 0])).unwrap();
    for _ in 0..5 {
        engine.push_chunk(Bytes::from_static(&[0, 0])).unwrap();
    }

    let anomalies: Vec<_> = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::AlignmentAnomaly { .. }))
        .collect();
    assert_eq!(anomalies.len(), 1);
    assert!(matches!(
        anomalies[0],
        EngineEvent::AlignmentAnomaly {
            carried_chunks: 3,
            ..
        }
    ));
}

#[test]
fn first_block_decision_takes_precedence() {
    let (mut engine, _events, clock) = engine(config(0));
    clock.set(5.0);
    engine.begin_session(RATE).unwrap();
    engine.push_chunk(pcm(10, 1)).unwrap();

    let start = engine.sink().history()[0].start;
    assert!((start - 5.05).abs() < 1e-9);
    assert_eq!(engine.stats().underruns, 0);

    let session = engine.session().unwrap();
    let scheduler = rill_core::engine::Scheduler::new((&config(0)).into());
    let (_, decision) = scheduler.decide(session, engine.sink().now());
    assert_eq!(decision, StartDecision::Append);
}

/// A clock that moves forward by a millisecond every time it is read.
#[derive(Clone, Default)]
struct TickingClock(Arc<AtomicU64>);

impl Clock for TickingClock {
    fn now(&self) -> f64 {
        self.0.fetch_add(1, Ordering::SeqCst) as f64 / 1000.0
    }
}

#[test]
fn moving_clock_never_rejects_computed_starts() {
    let sink = TimelineSink::new(TickingClock::default(), RATE);
    let (mut engine, _events) = PlaybackEngine::new(
        PlaybackConfig {
            startup_delay_seconds: 0.0,
            ..config(0)
        },
        sink,
    )
    .unwrap();
    engine.begin_session(RATE).unwrap();

    for _ in 0..3 {
        assert_ok!(engine.push_chunk(pcm(10, 1)));
    }
    assert!(!engine.is_stop_requested());

    let history = engine.sink().history();
    assert_eq!(history.len(), 3);
    for pair in history.windows(2) {
        assert!((pair[1].start - pair[0].end()).abs() < 1e-9);
    }
    let session = engine.session().unwrap();
    assert!((session.next_start_time() - history[2].end()).abs() < 1e-9);
}
