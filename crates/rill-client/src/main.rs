//! Rill - stream synthesized speech from a TTS server and play it gaplessly

use anyhow::Context;
use clap::Parser;
use futures::{Stream, StreamExt};
use rill_core::sink::{TimelineSink, WallClock};
use rill_core::{play_stream, EngineEvent, OutputSink, PlaybackEngine, StreamOutcome};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod request;

use config::ClientConfig;

#[derive(Debug, Parser)]
#[command(name = "rill", version, about = "Stream synthesized speech and play it as it arrives")]
struct Cli {
    /// Text to synthesize
    text: String,

    /// Configuration file (defaults to <config dir>/rill/rill.toml)
    #[arg(short, long, env = "RILL_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL
    #[arg(long)]
    server: Option<String>,

    #[arg(short, long)]
    speaker: Option<String>,

    #[arg(short, long)]
    language: Option<String>,

    /// Sample rate of the server's PCM output (must match the server)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Priming duration in milliseconds (0 disables priming)
    #[arg(long)]
    priming_ms: Option<u32>,

    /// Render to a WAV file in real time instead of the audio device
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(speaker) = &self.speaker {
            config.speaker = speaker.clone();
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(ms) = self.priming_ms {
            config.playback.priming_duration_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rill_client=info,rill_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    info!(
        "Synthesizing via {} ({} @ {} Hz)",
        config.endpoint_url(),
        config.speaker,
        config.sample_rate
    );

    match &cli.output {
        Some(path) => {
            let sink = TimelineSink::new(WallClock::new(), config.sample_rate);
            let (engine, outcome) = speak(sink, &config, &cli.text).await?;
            if outcome == StreamOutcome::Cancelled {
                info!("Cancelled, {} not written", path.display());
                return Ok(());
            }
            engine
                .sink()
                .write_wav(path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => play_on_device(&config, &cli.text).await?,
    }

    Ok(())
}

#[cfg(feature = "device")]
async fn play_on_device(config: &ClientConfig, text: &str) -> anyhow::Result<()> {
    let sink = rill_core::sink::DeviceSink::open(config.sample_rate)?;
    speak(sink, config, text).await?;
    Ok(())
}

#[cfg(not(feature = "device"))]
async fn play_on_device(_config: &ClientConfig, _text: &str) -> anyhow::Result<()> {
    anyhow::bail!("built without the `device` feature; pass --output to render to a WAV file")
}

/// Run one synthesis request through a fresh engine on `sink`.
///
/// Ctrl-C stops playback and is reported as [`StreamOutcome::Cancelled`].
async fn speak<S: OutputSink>(
    sink: S,
    config: &ClientConfig,
    text: &str,
) -> anyhow::Result<(PlaybackEngine<S>, StreamOutcome)> {
    let (mut engine, events) = PlaybackEngine::new(config.playback.clone(), sink)?;
    let event_log = tokio::spawn(log_events(events.into_stream()));
    let session = engine.begin_session(config.sample_rate)?;
    debug!("Session {} started", session);

    let client = reqwest::Client::new();
    let body = match request::open_stream(&client, config, text).await {
        Ok(body) => body,
        Err(e) => {
            engine.stop();
            event_log.abort();
            return Err(e.into());
        }
    };

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Ctrl-C handler unavailable, playback cannot be interrupted");
            futures::future::pending::<()>().await;
        }
    };

    let outcome = play_stream(&mut engine, body, cancel).await;
    // Let the logger catch up before it is torn down
    tokio::task::yield_now().await;
    event_log.abort();
    let outcome = outcome?;
    if let StreamOutcome::Completed(stats) = &outcome {
        if let Some(ttfa) = stats.time_to_first_audio {
            info!("Time to first audio: {:.0} ms", ttfa * 1000.0);
        }
        info!(
            "Played {:.2} s in {} blocks ({} bytes, {} underruns)",
            stats.samples_scheduled as f64 / config.sample_rate as f64,
            stats.blocks_scheduled,
            stats.bytes_received,
            stats.underruns
        );
    }

    Ok((engine, outcome))
}

async fn log_events(mut events: impl Stream<Item = EngineEvent> + Unpin) {
    while let Some(event) = events.next().await {
        match event {
            EngineEvent::PlaybackComplete { session } => {
                debug!("Session {} played out", session)
            }
            EngineEvent::Stopped { session } => debug!("Session {} released", session),
            EngineEvent::AlignmentAnomaly {
                session,
                carried_chunks,
            } => warn!(
                "Session {}: odd byte carried across {} reads, audio may be garbled",
                session, carried_chunks
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "rill",
            "hello there",
            "--server",
            "http://tts.local:9000",
            "--speaker",
            "Daisy Studious",
            "--priming-ms",
            "0",
        ]);
        let mut config = ClientConfig::default();
        cli.apply(&mut config);

        assert_eq!(cli.text, "hello there");
        assert_eq!(config.server_url, "http://tts.local:9000");
        assert_eq!(config.speaker, "Daisy Studious");
        assert_eq!(config.playback.priming_duration_ms, 0);
        assert_eq!(config.language, ClientConfig::default().language);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
