//! Gesture Session
//!
//! Runs the hand-gesture pipeline end to end: a landmark source feeds the
//! gesture classifier at a capped frame rate and classified events are
//! relayed to a room.

mod session;
mod settings;

pub use session::{GestureSession, Pacing, SessionStats};
pub use settings::{SessionConfig, SinkConfig, SourceConfig, ENV_PREFIX};

use std::future::Future;
use std::net::SocketAddr;

use event_relay::{
    generate_room_code, EventEmitter, EventSink, MqttSink, RelayError, RoomCode, WriterSink,
};
use gesture::{GestureClassifier, GestureError};
use hand_landmarks::{JsonLinesSource, LandmarkError, LandmarkSource};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;
use tokio::io::BufReader;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Landmark source error: {0}")]
    Source(#[from] LandmarkError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Gesture error: {0}")]
    Gesture(#[from] GestureError),
}

/// Initialize logging
pub fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

/// Serve counters on a Prometheus scrape endpoint
pub fn init_metrics(addr: SocketAddr) -> Result<(), SessionError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| SessionError::Config(format!("metrics exporter: {}", e)))?;
    info!("Serving metrics on http://{}/metrics", addr);
    Ok(())
}

/// Configured room, or a freshly generated one
pub fn resolve_room(config: &SessionConfig) -> Result<RoomCode, SessionError> {
    match &config.room {
        Some(room) => Ok(RoomCode::new(room.clone())?),
        None => {
            let room = generate_room_code();
            info!("No room configured, generated room code {}", room);
            Ok(room)
        }
    }
}

/// Build the session described by `config` and run it until the source ends
/// or `shutdown` resolves
pub async fn run_session(
    config: &SessionConfig,
    shutdown: impl Future<Output = ()>,
) -> Result<SessionStats, SessionError> {
    let room = resolve_room(config)?;

    match &config.sink {
        SinkConfig::Stdout => {
            info!("Writing gesture events to stdout");
            let (stats, _) = with_source(config, room, WriterSink::stdout(), shutdown).await?;
            Ok(stats)
        }
        SinkConfig::Mqtt(mqtt) => {
            let sink = MqttSink::connect(mqtt)?;
            let (stats, sink) = with_source(config, room, sink, shutdown).await?;
            sink.close().await;
            Ok(stats)
        }
    }
}

async fn with_source<K: EventSink>(
    config: &SessionConfig,
    room: RoomCode,
    sink: K,
    shutdown: impl Future<Output = ()>,
) -> Result<(SessionStats, K), SessionError> {
    match &config.source {
        SourceConfig::Stdin => {
            let source = JsonLinesSource::new(BufReader::new(tokio::io::stdin()));
            let (stats, _, sink) = drive(config, room, source, sink, shutdown).await?;
            Ok((stats, sink))
        }
        SourceConfig::Replay { path } => {
            let source = JsonLinesSource::open(path).await?;
            let (stats, source, sink) = drive(config, room, source, sink, shutdown).await?;
            info!("Replayed {} lines from {}", source.lines_read(), path.display());
            Ok((stats, sink))
        }
        SourceConfig::Detector { program, args } => {
            let source = JsonLinesSource::spawn(program, args)?;
            let (stats, mut source, sink) = drive(config, room, source, sink, shutdown).await?;
            info!("Detector produced {} lines", source.lines_read());
            source.stop().await;
            Ok((stats, sink))
        }
    }
}

/// Run one session; hands the source and sink back so they can be shut down
async fn drive<S: LandmarkSource, K: EventSink>(
    config: &SessionConfig,
    room: RoomCode,
    source: S,
    sink: K,
    shutdown: impl Future<Output = ()>,
) -> Result<(SessionStats, S, K), SessionError> {
    let classifier = GestureClassifier::new(config.gesture.clone())?;
    let emitter = EventEmitter::new(sink, room).with_continuous_interval(config.emit_interval_ms);
    let pacing = if config.is_paced() {
        Pacing::Paced
    } else {
        Pacing::Live
    };

    let mut session = GestureSession::new(source, classifier, emitter, config.max_fps, pacing);
    let stats = session.run(shutdown).await;
    let (source, sink) = session.into_parts();
    Ok((stats, source, sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_room() {
        let config = SessionConfig {
            room: Some("48213".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_room(&config).unwrap().as_str(), "48213");

        let generated = resolve_room(&SessionConfig::default()).unwrap();
        assert_eq!(generated.as_str().len(), 5);
    }

    #[test]
    fn test_resolve_room_rejects_topic_characters() {
        let config = SessionConfig {
            room: Some("rooms/+".to_string()),
            ..Default::default()
        };
        assert!(matches!(resolve_room(&config), Err(SessionError::Relay(_))));
    }

    #[tokio::test]
    async fn test_missing_replay_file() {
        let config = SessionConfig {
            source: SourceConfig::Replay {
                path: "/nonexistent/session.jsonl".into(),
            },
            ..Default::default()
        };
        let result = run_session(&config, std::future::pending()).await;
        assert!(matches!(
            result,
            Err(SessionError::Source(LandmarkError::Open(_)))
        ));
    }
}
