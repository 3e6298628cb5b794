//! Per-frame landmark sources
//!
//! The detector itself is an external black box. A source hands the session
//! one `DetectionResult` per call; `Ok(None)` means the source is exhausted.

use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::frame::DetectionResult;
use crate::LandmarkError;

/// Anything that yields detection results frame by frame
pub trait LandmarkSource {
    /// Wait for the next detection result
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<DetectionResult>, LandmarkError>> + Send;
}

/// Reads one JSON-encoded `DetectionResult` per line
///
/// Used for recorded replays and for detector scripts that print their
/// results to stdout.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: u64,
    /// Detector process, killed when the source is dropped
    child: Option<Child>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    /// Wrap an async line reader
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            child: None,
        }
    }
}

impl JsonLinesSource<BufReader<File>> {
    /// Replay a recorded session from a JSON-lines file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LandmarkError> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .map_err(|e| LandmarkError::Open(format!("{}: {}", path.display(), e)))?;
        info!("Replaying landmarks from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl JsonLinesSource<BufReader<ChildStdout>> {
    /// Launch a detector process and read its stdout
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, LandmarkError> {
        let mut child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                LandmarkError::Detector(format!("Failed to launch detector '{}': {}", program, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LandmarkError::Detector("Detector stdout not captured".to_string()))?;

        info!("Detector process started (pid: {:?}, program: {})", child.id(), program);

        let mut source = Self::new(BufReader::new(stdout));
        source.child = Some(child);
        Ok(source)
    }
}

impl<R> JsonLinesSource<R> {
    /// Number of lines consumed so far
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    /// Stop the detector process, if any
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!("Stopping detector process (pid: {:?})", child.id());
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> LandmarkSource for JsonLinesSource<R> {
    async fn next_frame(&mut self) -> Result<Option<DetectionResult>, LandmarkError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                debug!("Landmark source reached end after {} lines", self.line_no);
                return Ok(None);
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| LandmarkError::Decode {
                    line: self.line_no,
                    reason: e.to_string(),
                });
        }
    }
}

/// Source that plays back a fixed list of results (testing, demos)
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: VecDeque<Result<DetectionResult, LandmarkError>>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Result<DetectionResult, LandmarkError>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Script made only of successful detections
    pub fn from_results(results: Vec<DetectionResult>) -> Self {
        Self::new(results.into_iter().map(Ok).collect())
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<DetectionResult>, LandmarkError> {
        match self.frames.pop_front() {
            Some(Ok(result)) => Ok(Some(result)),
            Some(Err(e)) => {
                warn!("Scripted detector failure: {}", e);
                Err(e)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_lines_source() {
        let data = concat!(
            r#"{"timestamp_ms":0,"hands":[]}"#,
            "\n\n",
            r#"{"timestamp_ms":33}"#,
            "\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(data.as_bytes()));

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.timestamp_ms, 0);

        let second = source.next_frame().await.unwrap().unwrap();
        assert_eq!(second.timestamp_ms, 33);

        assert!(source.next_frame().await.unwrap().is_none());
        assert_eq!(source.lines_read(), 3);
    }

    #[tokio::test]
    async fn test_json_lines_decode_error_is_recoverable() {
        let data = "not json\n{\"timestamp_ms\":5}\n";
        let mut source = JsonLinesSource::new(BufReader::new(data.as_bytes()));

        match source.next_frame().await {
            Err(LandmarkError::Decode { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected decode error, got {:?}", other),
        }

        let next = source.next_frame().await.unwrap().unwrap();
        assert_eq!(next.timestamp_ms, 5);
    }

    #[tokio::test]
    async fn test_scripted_source() {
        let mut source = ScriptedSource::new(vec![
            Ok(DetectionResult::empty(1)),
            Err(LandmarkError::Read("pipe closed".to_string())),
            Ok(DetectionResult::empty(3)),
        ]);

        assert_eq!(source.next_frame().await.unwrap().unwrap().timestamp_ms, 1);
        assert!(matches!(source.next_frame().await, Err(LandmarkError::Read(_))));
        assert_eq!(source.next_frame().await.unwrap().unwrap().timestamp_ms, 3);
        assert!(source.next_frame().await.unwrap().is_none());
        assert_eq!(source.remaining(), 0);
    }
}
