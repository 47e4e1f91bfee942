//! Exec bridge
//!
//! Turns a remote command's stdout/stderr into one pull-based stream of chunks.
//! The stream ends when the remote side closes it; there is no built-in bound
//! on how long that takes, so callers that need one pass a timeout to
//! [`ExecSession::drain`].

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use kube::api::AttachedProcess;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, warn};

use crate::error::{ChaosError, ChaosResult};

const CHUNK_SIZE: usize = 4096;

/// One piece of output from a remote process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutput {
    Stdout(String),
    Stderr(String),
}

impl ExecOutput {
    pub fn text(&self) -> &str {
        match self {
            ExecOutput::Stdout(s) | ExecOutput::Stderr(s) => s,
        }
    }
}

/// A live exec stream bound to a single remote command
pub struct ExecSession {
    output: BoxStream<'static, ChaosResult<ExecOutput>>,
}

impl std::fmt::Debug for ExecSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecSession").finish_non_exhaustive()
    }
}

impl ExecSession {
    pub fn new<S>(output: S) -> Self
    where
        S: Stream<Item = ChaosResult<ExecOutput>> + Send + 'static,
    {
        Self {
            output: output.boxed(),
        }
    }

    /// A session that replays a fixed list of items
    pub fn from_items(items: Vec<ChaosResult<ExecOutput>>) -> Self {
        Self::new(stream::iter(items))
    }

    /// Wrap an attached kube process. The stream yields stdout and stderr as
    /// they arrive and reports a failed join as a trailing error.
    ///
    /// The process must be attached without stdin: kube ends the whole
    /// session as soon as a stdin writer is closed.
    pub(crate) fn from_attached(mut attached: AttachedProcess) -> Self {
        let stdout = match attached.stdout() {
            Some(reader) => read_chunks(reader, ExecOutput::Stdout).boxed(),
            None => stream::empty().boxed(),
        };
        let stderr = match attached.stderr() {
            Some(reader) => read_chunks(reader, ExecOutput::Stderr).boxed(),
            None => stream::empty().boxed(),
        };

        let finished = stream::once(async move { attached.join().await }).filter_map(
            |res| async move {
                res.err()
                    .map(|e| Err::<ExecOutput, _>(ChaosError::ExecStream(e.to_string())))
            },
        );

        Self::new(stream::select(stdout, stderr).chain(finished))
    }

    /// Consume the session, logging every chunk as it arrives.
    ///
    /// A stream error stops the drain; whatever was read before it stays in the
    /// transcript.
    pub async fn drain(mut self, timeout: Option<Duration>) -> ExecTranscript {
        let mut transcript = ExecTranscript::default();

        let collect = async {
            while let Some(item) = self.output.next().await {
                match item {
                    Ok(chunk) => {
                        match &chunk {
                            ExecOutput::Stdout(text) => info!(stream = "stdout", "{}", text.trim_end()),
                            ExecOutput::Stderr(text) => warn!(stream = "stderr", "{}", text.trim_end()),
                        }
                        transcript.chunks.push(chunk);
                    }
                    Err(e) => {
                        warn!(error = %e, "Exec stream failed");
                        transcript.error = Some(e.to_string());
                        break;
                    }
                }
            }
        };

        let timed_out = match timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.is_err(),
            None => {
                collect.await;
                false
            }
        };

        if timed_out {
            warn!(?timeout, "Exec stream did not close in time, abandoning it");
        }
        transcript.timed_out = timed_out;
        transcript
    }
}

impl Stream for ExecSession {
    type Item = ChaosResult<ExecOutput>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.output.poll_next_unpin(cx)
    }
}

fn read_chunks<R>(
    reader: R,
    wrap: fn(String) -> ExecOutput,
) -> impl Stream<Item = ChaosResult<ExecOutput>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match reader.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                Some((Ok(wrap(text)), Some(reader)))
            }
            Err(e) => Some((Err(ChaosError::ExecStream(e.to_string())), None)),
        }
    })
}

/// Everything read from one exec session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecTranscript {
    pub chunks: Vec<ExecOutput>,
    /// Set when the stream could not be opened or broke mid-way
    pub error: Option<String>,
    pub timed_out: bool,
}

impl ExecTranscript {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn stdout(&self) -> String {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                ExecOutput::Stdout(s) => Some(s.as_str()),
                ExecOutput::Stderr(_) => None,
            })
            .collect()
    }

    pub fn stderr(&self) -> String {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                ExecOutput::Stderr(s) => Some(s.as_str()),
                ExecOutput::Stdout(_) => None,
            })
            .collect()
    }

    /// The stream closed on its own without errors
    pub fn completed(&self) -> bool {
        self.error.is_none() && !self.timed_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_collects_both_streams() {
        let session = ExecSession::from_items(vec![
            Ok(ExecOutput::Stdout("hello\n".to_string())),
            Ok(ExecOutput::Stderr("warning\n".to_string())),
            Ok(ExecOutput::Stdout("world\n".to_string())),
        ]);

        let transcript = session.drain(None).await;
        assert!(transcript.completed());
        assert_eq!(transcript.stdout(), "hello\nworld\n");
        assert_eq!(transcript.stderr(), "warning\n");
    }

    #[tokio::test]
    async fn test_drain_keeps_output_before_failure() {
        let session = ExecSession::from_items(vec![
            Ok(ExecOutput::Stdout("partial".to_string())),
            Err(ChaosError::ExecStream("connection reset".to_string())),
            Ok(ExecOutput::Stdout("never read".to_string())),
        ]);

        let transcript = session.drain(None).await;
        assert_eq!(transcript.chunks.len(), 1);
        assert_eq!(transcript.stdout(), "partial");
        assert!(transcript.error.as_deref().unwrap().contains("connection reset"));
        assert!(!transcript.completed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_timeout_abandons_stalled_stream() {
        let stalled = stream::iter(vec![Ok(ExecOutput::Stdout("started".to_string()))])
            .chain(stream::pending());
        let session = ExecSession::new(stalled);

        let transcript = session.drain(Some(Duration::from_secs(5))).await;
        assert!(transcript.timed_out);
        assert_eq!(transcript.stdout(), "started");
    }

    #[tokio::test]
    async fn test_read_chunks_until_eof() {
        let reader: &'static [u8] = b"dd: 10+0 records out";
        let chunks: Vec<_> = read_chunks(reader, ExecOutput::Stderr).collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].as_ref().unwrap(),
            &ExecOutput::Stderr("dd: 10+0 records out".to_string())
        );
    }
}
